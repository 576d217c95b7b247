use crate::client::{BlockRequest, FetchResult, NodeClient, NodeError, Verbosity};
use crate::runtime::telemetry::ReportStyle;
use crate::traversal::{Tally, TraversalPolicy, WorkItem};
use anyhow::{Context, Result};

const LOOP_BLOCK_REQUEST: BlockRequest = BlockRequest::new(Verbosity::Full, false);

/// Requests the same block over and over. Measures how the node serves a hot
/// block rather than traversal throughput.
#[derive(Debug)]
pub struct FixedHashLoop {
    hash: String,
}

impl FixedHashLoop {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    /// Resolves the hash at `height` once, before any worker starts.
    pub async fn resolve(client: &dyn NodeClient, height: u64) -> Result<Self> {
        let hash = client
            .block_hash(height)
            .await
            .with_context(|| format!("failed to resolve block hash at height {height}"))?
            .ok_or(NodeError::HeightOutOfRange { height })?;

        tracing::info!(height, %hash, "looping over a single block");
        Ok(Self::new(hash))
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl TraversalPolicy for FixedHashLoop {
    fn next(&self) -> WorkItem {
        WorkItem::Hash(self.hash.clone())
    }

    fn block_request(&self) -> BlockRequest {
        LOOP_BLOCK_REQUEST
    }

    fn on_result(&self, _item: &WorkItem, _result: &FetchResult) -> Result<Tally, NodeError> {
        Ok(Tally::request())
    }

    fn report_style(&self) -> ReportStyle {
        ReportStyle::Requests
    }
}
