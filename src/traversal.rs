//! Traversal policies decide what each worker fetches next and fold
//! completed fetches back into shared state (the block→transaction backlog)
//! and into per-fetch tallies for the metrics window.

pub mod block_then_tx;
pub mod fixed_hash;
pub mod sequential;

pub use block_then_tx::BlockThenTx;
pub use fixed_hash::FixedHashLoop;
pub use sequential::SequentialWalk;

use crate::client::{BlockRequest, FetchResult, NodeError};
use crate::runtime::telemetry::ReportStyle;
use std::fmt;

/// Unit of work handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkItem {
    Height(u64),
    Hash(String),
    TxId(String),
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::Height(height) => write!(f, "height {height}"),
            WorkItem::Hash(hash) => write!(f, "block {hash}"),
            WorkItem::TxId(txid) => write!(f, "tx {txid}"),
        }
    }
}

/// Counter increments produced by one completed unit of work.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub requests: u64,
    pub blocks: u64,
    pub txs: u64,
}

impl Tally {
    pub const fn request() -> Self {
        Self {
            requests: 1,
            blocks: 0,
            txs: 0,
        }
    }

    pub const fn block(txs: u64) -> Self {
        Self {
            requests: 1,
            blocks: 1,
            txs,
        }
    }

    pub const fn transaction() -> Self {
        Self {
            requests: 1,
            blocks: 0,
            txs: 1,
        }
    }
}

/// Shared by every worker; all state mutation must be atomic per call.
pub trait TraversalPolicy: Send + Sync {
    /// Claims the next unit of work.
    fn next(&self) -> WorkItem;

    /// Shape of block fetches issued for this policy.
    fn block_request(&self) -> BlockRequest;

    /// Records follow-up work produced by `result` and returns the counters
    /// the fetch contributes.
    fn on_result(&self, item: &WorkItem, result: &FetchResult) -> Result<Tally, NodeError>;

    fn report_style(&self) -> ReportStyle;
}
