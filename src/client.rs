//! Node client plumbing: endpoint parsing, authentication, response
//! classification and the two wire flavours (JSON-RPC and REST) behind the
//! [`NodeClient`] trait consumed by workers and the chain watcher.

pub mod auth;
pub mod endpoint;
pub mod error;
pub mod response;
pub mod rest;
pub mod rpc;
pub mod transport;

pub use endpoint::{Credentials, Endpoint};
pub use error::{NodeError, NodeResult, REST_HEIGHT_OUT_OF_RANGE, RPC_HEIGHT_OUT_OF_RANGE};
pub use response::FetchResult;
pub use rest::RestNodeClient;
pub use rpc::RpcNodeClient;
pub use transport::{NoHooks, ResponseHooks};

use anyhow::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Wire protocol used to talk to the node.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum NodeProtocol {
    #[default]
    Rpc,
    Rest,
}

impl fmt::Display for NodeProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeProtocol::Rpc => f.write_str("rpc"),
            NodeProtocol::Rest => f.write_str("rest"),
        }
    }
}

/// Block representation requested from the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Serialized block as hex.
    Raw,
    /// JSON block listing transaction ids only.
    TxIds,
    /// JSON block with every transaction decoded.
    Full,
}

impl Verbosity {
    pub fn as_rpc_param(self) -> u8 {
        match self {
            Verbosity::Raw => 0,
            Verbosity::TxIds => 1,
            Verbosity::Full => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRequest {
    pub verbosity: Verbosity,
    pub parse: bool,
}

impl BlockRequest {
    pub const fn new(verbosity: Verbosity, parse: bool) -> Self {
        Self { verbosity, parse }
    }
}

/// One request per call, no retries. Implementations are cheap to share
/// across workers; connection reuse lives inside them.
pub trait NodeClient: Send + Sync {
    fn protocol(&self) -> NodeProtocol;

    /// Resolves a height to its block hash. `Ok(None)` means the node has not
    /// produced that height yet; every other failure is an error.
    fn block_hash<'a>(&'a self, height: u64) -> BoxFuture<'a, NodeResult<Option<String>>>;

    fn block<'a>(
        &'a self,
        hash: &'a str,
        request: BlockRequest,
        hooks: &'a dyn ResponseHooks,
    ) -> BoxFuture<'a, NodeResult<FetchResult>>;

    fn transaction<'a>(&'a self, txid: &'a str) -> BoxFuture<'a, NodeResult<FetchResult>>;

    /// Height of the node's best block.
    fn best_height(&self) -> BoxFuture<'_, NodeResult<u64>>;
}

/// Builds the client for `protocol` against `endpoint`.
pub fn connect(endpoint: Endpoint, protocol: NodeProtocol) -> Result<Arc<dyn NodeClient>> {
    tracing::debug!(
        endpoint = %endpoint.host_port(),
        %protocol,
        authenticated = endpoint.credentials().is_some(),
        "building node client"
    );

    let client: Arc<dyn NodeClient> = match protocol {
        NodeProtocol::Rpc => Arc::new(RpcNodeClient::new(endpoint)?),
        NodeProtocol::Rest => Arc::new(RestNodeClient::new(endpoint)?),
    };
    Ok(client)
}
