//! JSON-RPC flavour of [`NodeClient`]: every call is a POST of
//! `{"id":0,"method":..,"params":[..]}` to the endpoint path.

use crate::client::auth::build_auth_headers;
use crate::client::endpoint::Endpoint;
use crate::client::error::{NodeError, NodeResult};
use crate::client::response::FetchResult;
use crate::client::transport::{HttpTransport, NoHooks, ResponseHooks};
use crate::client::{BlockRequest, NodeClient, NodeProtocol};
use anyhow::Result;
use futures::future::BoxFuture;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use serde_json::{json, Value};
use url::Url;

#[derive(Serialize)]
struct RpcRequest<'a> {
    id: u64,
    method: &'a str,
    params: &'a [Value],
}

#[derive(Debug, Clone)]
pub struct RpcNodeClient {
    transport: HttpTransport,
    url: Url,
}

impl RpcNodeClient {
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        let mut headers = build_auth_headers(endpoint.credentials())?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let url = endpoint.url_for("")?;
        let transport = HttpTransport::new(endpoint, headers)?;
        Ok(Self { transport, url })
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.transport.endpoint()
    }

    /// Issues a single call. With `parse == false` the body is drained and
    /// [`FetchResult::Discarded`] is returned.
    pub async fn call(
        &self,
        method: &str,
        params: &[Value],
        parse: bool,
        hooks: &dyn ResponseHooks,
    ) -> NodeResult<FetchResult> {
        let body = serde_json::to_vec(&RpcRequest {
            id: 0,
            method,
            params,
        })
        .map_err(|err| NodeError::malformed(format!("failed to encode {method} request: {err}")))?;

        tracing::trace!(method, parse, "issuing rpc call");
        self.transport
            .post(self.url.clone(), body, parse, hooks)
            .await
    }

    async fn call_parsed(&self, method: &str, params: &[Value]) -> NodeResult<Value> {
        self.call(method, params, true, &NoHooks)
            .await?
            .into_value()
            .ok_or_else(|| NodeError::malformed(format!("{method} returned no document")))
    }

    pub async fn get_block_hash(&self, height: u64) -> NodeResult<Option<String>> {
        match self.call_parsed("getblockhash", &[json!(height)]).await {
            Ok(Value::String(hash)) => Ok(Some(hash)),
            Ok(other) => Err(NodeError::malformed(format!(
                "getblockhash returned non-string result {other}"
            ))),
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
        let params = [json!(hash), json!(request.verbosity.as_rpc_param())];
        self.call("getblock", &params, request.parse, hooks).await
    }

    pub async fn get_raw_transaction(&self, txid: &str) -> NodeResult<FetchResult> {
        self.call("getrawtransaction", &[json!(txid), json!(true)], true, &NoHooks)
            .await
    }

    pub async fn get_best_height(&self) -> NodeResult<u64> {
        let info = self.call_parsed("getblockchaininfo", &[]).await?;
        info.get("blocks")
            .and_then(Value::as_u64)
            .ok_or_else(|| NodeError::malformed("getblockchaininfo result has no `blocks` field"))
    }
}

impl NodeClient for RpcNodeClient {
    fn protocol(&self) -> NodeProtocol {
        NodeProtocol::Rpc
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
        Box::pin(self.get_raw_transaction(txid))
    }

    fn best_height(&self) -> BoxFuture<'_, NodeResult<u64>> {
        Box::pin(self.get_best_height())
    }
}
