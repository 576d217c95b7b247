//! Turns a [`WorkItem`] into node calls. Heights go through the cheap
//! height→hash lookup first because both wire protocols only serve blocks by
//! hash.

use crate::client::{BlockRequest, FetchResult, NodeClient, NodeError, NodeResult, NoHooks};
use crate::traversal::WorkItem;

pub async fn fetch_item(
    client: &dyn NodeClient,
    item: &WorkItem,
    request: BlockRequest,
) -> NodeResult<FetchResult> {
    match item {
        WorkItem::Height(height) => {
            let hash = client
                .block_hash(*height)
                .await?
                .ok_or(NodeError::HeightOutOfRange { height: *height })?;
            client.block(&hash, request, &NoHooks).await
        }
        WorkItem::Hash(hash) => client.block(hash, request, &NoHooks).await,
        WorkItem::TxId(txid) => client.transaction(txid).await,
    }
}
