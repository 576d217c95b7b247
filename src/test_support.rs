//! In-memory [`NodeClient`] used by unit tests across the crate.

use crate::client::{
    BlockRequest, FetchResult, NodeClient, NodeError, NodeProtocol, NodeResult, ResponseHooks,
};
use futures::future::BoxFuture;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct MemoryBlock {
    height: u64,
    txids: Vec<String>,
}

/// Chain of blocks served from memory. `tip` is only what `best_height`
/// reports; `block_hash` resolves any height that has a block.
///
/// Every call is recorded as a short label (`best`, `hash:<height>`,
/// `block:<hash>`, `tx:<txid>`) and yields once, so single-threaded tests
/// still interleave tasks.
#[derive(Default)]
pub(crate) struct MemoryNode {
    tip: u64,
    hashes: HashMap<u64, String>,
    blocks: HashMap<String, MemoryBlock>,
    misses: Mutex<HashMap<u64, usize>>,
    failing: HashSet<String>,
    hanging: HashSet<u64>,
    calls: Mutex<Vec<String>>,
    stop_on: Option<(String, CancellationToken)>,
}

impl MemoryNode {
    pub(crate) fn new(tip: u64) -> Self {
        Self {
            tip,
            ..Self::default()
        }
    }

    pub(crate) fn with_block(mut self, height: u64, hash: &str, txids: &[&str]) -> Self {
        self.hashes.insert(height, hash.to_owned());
        self.blocks.insert(
            hash.to_owned(),
            MemoryBlock {
                height,
                txids: txids.iter().map(|txid| (*txid).to_owned()).collect(),
            },
        );
        self
    }

    /// Blocks `from..to` with hash `h<height>` and no transactions.
    pub(crate) fn with_range(mut self, from: u64, to: u64) -> Self {
        for height in from..to {
            self = self.with_block(height, &format!("h{height}"), &[]);
        }
        self
    }

    /// `block_hash(height)` answers "not yet" `count` times before resolving.
    pub(crate) fn with_misses(self, height: u64, count: usize) -> Self {
        self.misses.lock().unwrap().insert(height, count);
        self
    }

    /// Fetching this block or transaction fails with a fatal RPC error.
    pub(crate) fn failing(mut self, key: &str) -> Self {
        self.failing.insert(key.to_owned());
        self
    }

    /// `block_hash(height)` never resolves.
    pub(crate) fn hanging(mut self, height: u64) -> Self {
        self.hanging.insert(height);
        self
    }

    /// Cancels `token` the first time `call` is recorded.
    pub(crate) fn stop_on(mut self, call: &str, token: CancellationToken) -> Self {
        self.stop_on = Some((call.to_owned(), token));
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        if let Some((trigger, token)) = &self.stop_on {
            if *trigger == call {
                token.cancel();
            }
        }
        self.calls.lock().unwrap().push(call);
    }

    fn fail_if_requested(&self, key: &str) -> NodeResult<()> {
        if self.failing.contains(key) {
            return Err(NodeError::Rpc {
                code: Some(-5),
                message: format!("{key} not found"),
            });
        }
        Ok(())
    }
}

impl NodeClient for MemoryNode {
    fn protocol(&self) -> NodeProtocol {
        NodeProtocol::Rpc
    }

    fn block_hash<'a>(&'a self, height: u64) -> BoxFuture<'a, NodeResult<Option<String>>> {
        self.record(format!("hash:{height}"));
        let pending_miss = {
            let mut misses = self.misses.lock().unwrap();
            match misses.get_mut(&height) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        let result = if pending_miss {
            None
        } else {
            self.hashes.get(&height).cloned()
        };
        let hangs = self.hanging.contains(&height);
        Box::pin(async move {
            if hangs {
                futures::future::pending::<()>().await;
            }
            tokio::task::yield_now().await;
            Ok(result)
        })
    }

    fn block<'a>(
        &'a self,
        hash: &'a str,
        request: BlockRequest,
        hooks: &'a dyn ResponseHooks,
    ) -> BoxFuture<'a, NodeResult<FetchResult>> {
        self.record(format!("block:{hash}"));
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.fail_if_requested(hash)?;
            let block = self.blocks.get(hash).cloned().ok_or(NodeError::Rpc {
                code: Some(-5),
                message: "Block not found".into(),
            })?;
            hooks.response_received();
            hooks.body_received();
            if !request.parse {
                return Ok(FetchResult::Discarded);
            }
            Ok(FetchResult::Parsed(json!({
                "hash": hash,
                "height": block.height,
                "tx": block.txids,
            })))
        })
    }

    fn transaction<'a>(&'a self, txid: &'a str) -> BoxFuture<'a, NodeResult<FetchResult>> {
        self.record(format!("tx:{txid}"));
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.fail_if_requested(txid)?;
            Ok(FetchResult::Parsed(json!({ "txid": txid })))
        })
    }

    fn best_height(&self) -> BoxFuture<'_, NodeResult<u64>> {
        self.record("best".to_owned());
        let tip = self.tip;
        Box::pin(async move { Ok(tip) })
    }
}

