//! REST flavour of [`NodeClient`]: resources are fetched with GET below
//! `<base>/rest/`. Bitcoin Core's REST interface is unauthenticated, so no
//! credentials are sent even when the endpoint carries them.

use crate::client::endpoint::Endpoint;
use crate::client::error::{NodeError, NodeResult};
use crate::client::response::FetchResult;
use crate::client::transport::{HttpTransport, NoHooks, ResponseHooks};
use crate::client::{BlockRequest, NodeClient, NodeProtocol, Verbosity};
use anyhow::Result;
use futures::future::BoxFuture;
use reqwest::header::HeaderMap;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct RestNodeClient {
    transport: HttpTransport,
}

impl RestNodeClient {
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        let transport = HttpTransport::new(endpoint, HeaderMap::new())?;
        Ok(Self { transport })
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.transport.endpoint()
    }

    /// Issues a GET for `path` (relative to the endpoint base, starting with `/`).
    pub async fn get(
        &self,
        path: &str,
        parse: bool,
        hooks: &dyn ResponseHooks,
    ) -> NodeResult<FetchResult> {
        let url = self
            .endpoint()
            .url_for(path)
            .map_err(|err| NodeError::malformed(format!("{err:#}")))?;

        tracing::trace!(path, parse, "issuing rest request");
        self.transport.get(url, parse, hooks).await
    }

    async fn get_parsed(&self, path: &str) -> NodeResult<Value> {
        self.get(path, true, &NoHooks)
            .await?
            .into_value()
            .ok_or_else(|| NodeError::malformed(format!("{path} returned no document")))
    }

    pub async fn get_block_hash(&self, height: u64) -> NodeResult<Option<String>> {
        let path = format!("/rest/blockhashbyheight/{height}.json");
        match self.get_parsed(&path).await {
            Ok(Value::String(hash)) if !hash.is_empty() => Ok(Some(hash)),
            Ok(Value::Object(object)) => match object.get("blockhash") {
                Some(Value::String(hash)) => Ok(Some(hash.clone())),
                _ => Err(NodeError::malformed(
                    "blockhashbyheight document has no `blockhash` field",
                )),
            },
            Ok(other) => Err(NodeError::malformed(format!(
                "blockhashbyheight returned unexpected body {other}"
            ))),
            // Only the node's own "Block height out of range" 404 means "not
            // produced yet"; any other 404 (REST disabled, wrong base path) is fatal.
            Err(err) if err.is_height_out_of_range() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn get_block(
        &self,
        hash: &str,
        request: BlockRequest,
        hooks: &dyn ResponseHooks,
    ) -> NodeResult<FetchResult> {
        self.get(&block_path(hash, request.verbosity), request.parse, hooks)
            .await
    }

    pub async fn get_transaction(&self, txid: &str) -> NodeResult<FetchResult> {
        self.get(&format!("/rest/tx/{txid}.json"), true, &NoHooks)
            .await
    }

    pub async fn get_best_height(&self) -> NodeResult<u64> {
        let info = self.get_parsed("/rest/chaininfo.json").await?;
        info.get("blocks")
            .and_then(Value::as_u64)
            .ok_or_else(|| NodeError::malformed("chaininfo document has no `blocks` field"))
    }
}

fn block_path(hash: &str, verbosity: Verbosity) -> String {
    match verbosity {
        Verbosity::Raw => format!("/rest/block/{hash}.hex"),
        Verbosity::TxIds => format!("/rest/block/notxdetails/{hash}.json"),
        Verbosity::Full => format!("/rest/block/{hash}.json"),
    }
}

impl NodeClient for RestNodeClient {
    fn protocol(&self) -> NodeProtocol {
        NodeProtocol::Rest
    }

    fn block_hash<'a>(&'a self, height: u64) -> BoxFuture<'a, NodeResult<Option<String>>> {
        Box::pin(self.get_block_hash(height))
    }

    fn block<'a>(
        &'a self,
        hash: &'a str,
        request: BlockRequest,
        hooks: &'a dyn ResponseHooks,
    ) -> BoxFuture<'a, NodeResult<FetchResult>> {
        Box::pin(self.get_block(hash, request, hooks))
    }

    fn transaction<'a>(&'a self, txid: &'a str) -> BoxFuture<'a, NodeResult<FetchResult>> {
        Box::pin(self.get_transaction(txid))
    }

    fn best_height(&self) -> BoxFuture<'_, NodeResult<u64>> {
        Box::pin(self.get_best_height())
    }
}
