use crate::client::{BlockRequest, FetchResult, NodeError, Verbosity};
use crate::runtime::telemetry::ReportStyle;
use crate::traversal::{Tally, TraversalPolicy, WorkItem};
use std::sync::atomic::{AtomicU64, Ordering};

const WALK_BLOCK_REQUEST: BlockRequest = BlockRequest::new(Verbosity::Full, false);

/// Walks heights upward from a starting point. Each height is claimed by
/// exactly one worker; completion order across workers is unspecified.
#[derive(Debug)]
pub struct SequentialWalk {
    cursor: AtomicU64,
}

impl SequentialWalk {
    pub fn new(from: u64) -> Self {
        Self {
            cursor: AtomicU64::new(from),
        }
    }

    /// Next height that has not been claimed yet.
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl TraversalPolicy for SequentialWalk {
    fn next(&self) -> WorkItem {
        WorkItem::Height(self.cursor.fetch_add(1, Ordering::SeqCst))
    }

    fn block_request(&self) -> BlockRequest {
        WALK_BLOCK_REQUEST
    }

    fn on_result(&self, _item: &WorkItem, _result: &FetchResult) -> Result<Tally, NodeError> {
        Ok(Tally::request())
    }

    fn report_style(&self) -> ReportStyle {
        ReportStyle::Requests
    }
}
