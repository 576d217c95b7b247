use crate::client::{BlockRequest, FetchResult, NodeError, Verbosity};
use crate::runtime::telemetry::ReportStyle;
use crate::traversal::{Tally, TraversalPolicy, WorkItem};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Full-chain crawl: every block's transaction ids are queued and drained
/// before the next height is claimed.
///
/// The drain-first rule is best effort. Two workers can both observe an empty
/// backlog while a third is still expanding a block, so a new height may be
/// claimed with transactions pending. Memory stays bounded by the blocks in
/// flight, at most one per worker.
#[derive(Debug)]
pub struct BlockThenTx {
    cursor: AtomicU64,
    pending: Mutex<VecDeque<String>>,
    full_block: bool,
}

impl BlockThenTx {
    /// With `full_block` the node returns decoded transactions inside the
    /// block, so the block fetch alone is the unit of work and nothing is queued.
    pub fn new(from: u64, full_block: bool) -> Self {
        Self {
            cursor: AtomicU64::new(from),
            pending: Mutex::new(VecDeque::new()),
            full_block,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending().len()
    }

    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::SeqCst)
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expand_block(&self, block: &Value) -> Result<Tally, NodeError> {
        let txs = block
            .get("tx")
            .and_then(Value::as_array)
            .ok_or_else(|| NodeError::malformed("block document has no `tx` array"))?;

        if self.full_block {
            return Ok(Tally::block(txs.len() as u64));
        }

        let txids = txs
            .iter()
            .map(|tx| {
                tx.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| NodeError::malformed(format!("unexpected tx entry {tx}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.pending().extend(txids);
        Ok(Tally::block(0))
    }
}

impl TraversalPolicy for BlockThenTx {
    fn next(&self) -> WorkItem {
        if let Some(txid) = self.pending().pop_front() {
            return WorkItem::TxId(txid);
        }
        WorkItem::Height(self.cursor.fetch_add(1, Ordering::SeqCst))
    }

    fn block_request(&self) -> BlockRequest {
        let verbosity = if self.full_block {
            Verbosity::Full
        } else {
            Verbosity::TxIds
        };
        BlockRequest::new(verbosity, true)
    }

    fn on_result(&self, item: &WorkItem, result: &FetchResult) -> Result<Tally, NodeError> {
        match item {
            WorkItem::TxId(_) => Ok(Tally::transaction()),
            WorkItem::Height(_) | WorkItem::Hash(_) => {
                let block = result
                    .value()
                    .ok_or_else(|| NodeError::malformed("block body was discarded"))?;
                self.expand_block(block)
            }
        }
    }

    fn report_style(&self) -> ReportStyle {
        ReportStyle::BlocksAndTxs
    }
}
