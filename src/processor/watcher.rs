//! Chain tip watcher.
//!
//! Polls for the block right above the last seen height and, once the node
//! produces it, fetches it while timing each stage of the response:
//!
//! ```text
//! Idle -> AwaitingNextBlock -> Fetching -> Reporting -> Idle
//! ```
//!
//! A missing height is the normal case while waiting and is retried after
//! `poll_interval` forever. Any other failure ends the watcher.

use crate::client::{BlockRequest, NodeClient, ResponseHooks, Verbosity};
use anyhow::{Context, Result};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

const WATCH_BLOCK_REQUEST: BlockRequest = BlockRequest::new(Verbosity::Full, true);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    AwaitingNextBlock,
    Fetching,
    Reporting,
}

/// Milestones recorded for every new block, in the order they occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NewBlock,
    ResponseReceived,
    BodyReceived,
    Parsed,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::NewBlock => "new block",
            Stage::ResponseReceived => "block response received",
            Stage::BodyReceived => "block fully received",
            Stage::Parsed => "block parsed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTiming {
    pub stage: Stage,
    /// Since the watcher started waiting for this height.
    pub elapsed: Duration,
    /// Since the previous stage.
    pub delta: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReport {
    pub height: u64,
    pub hash: String,
    pub timings: Vec<StageTiming>,
}

impl BlockReport {
    pub fn total(&self) -> Duration {
        self.timings
            .last()
            .map(|timing| timing.elapsed)
            .unwrap_or_default()
    }
}

/// Stamps stages as they happen. Handed to the client as response hooks so
/// the first-byte and full-body marks come from inside the transport.
struct StageClock {
    height: u64,
    started: Instant,
    marks: Mutex<ClockMarks>,
}

struct ClockMarks {
    last: Instant,
    timings: Vec<StageTiming>,
}

impl StageClock {
    fn new(height: u64, started: Instant) -> Self {
        Self {
            height,
            started,
            marks: Mutex::new(ClockMarks {
                last: started,
                timings: Vec::with_capacity(4),
            }),
        }
    }

    fn mark(&self, stage: Stage) {
        let now = Instant::now();
        let mut marks = self.marks.lock().unwrap_or_else(PoisonError::into_inner);
        let timing = StageTiming {
            stage,
            elapsed: now.saturating_duration_since(self.started),
            delta: now.saturating_duration_since(marks.last),
        };
        marks.last = now;
        marks.timings.push(timing);

        tracing::info!(
            target: "blockperf::watch",
            height = self.height,
            stage = stage.label(),
            elapsed = ?timing.elapsed,
            delta = ?timing.delta,
            "{stage}"
        );
    }

    fn into_timings(self) -> Vec<StageTiming> {
        self.marks
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .timings
    }
}

impl ResponseHooks for StageClock {
    fn response_received(&self) {
        self.mark(Stage::ResponseReceived);
    }

    fn body_received(&self) {
        self.mark(Stage::BodyReceived);
    }
}

pub struct ChainWatcher {
    client: Arc<dyn NodeClient>,
    poll_interval: Duration,
    state: WatchState,
    latest: Option<u64>,
}

impl ChainWatcher {
    pub fn new(client: Arc<dyn NodeClient>, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
            state: WatchState::Idle,
            latest: None,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Highest height reported so far (or the tip seen at start).
    pub fn latest(&self) -> Option<u64> {
        self.latest
    }

    /// Seeds `latest` with the node's current best height.
    pub async fn initialize(&mut self) -> Result<u64> {
        let tip = self
            .client
            .best_height()
            .await
            .context("failed to query best block height")?;
        tracing::info!(target: "blockperf::watch", tip, "watching for new blocks");
        self.latest = Some(tip);
        Ok(tip)
    }

    /// Waits for the block above `latest`, fetches it and reports its stage
    /// timings. Returns `Ok(None)` once `shutdown` is cancelled while waiting.
    pub async fn next_block(&mut self, shutdown: &CancellationToken) -> Result<Option<BlockReport>> {
        let latest = match self.latest {
            Some(latest) => latest,
            None => self.initialize().await?,
        };
        let height = latest + 1;

        self.state = WatchState::AwaitingNextBlock;
        let started = Instant::now();
        let hash = loop {
            let lookup = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.state = WatchState::Idle;
                    return Ok(None);
                }
                lookup = self.client.block_hash(height) => lookup,
            };

            match lookup {
                Ok(Some(hash)) => break hash,
                Ok(None) => {}
                Err(err) if err.is_height_out_of_range() => {}
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("failed to resolve block hash at height {height}"))
                }
            }

            tracing::trace!(target: "blockperf::watch", height, "block not produced yet");
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.state = WatchState::Idle;
                    return Ok(None);
                }
                _ = time::sleep(self.poll_interval) => {}
            }
        };

        self.state = WatchState::Fetching;
        let clock = StageClock::new(height, started);
        clock.mark(Stage::NewBlock);
        self.client
            .block(&hash, WATCH_BLOCK_REQUEST, &clock)
            .await
            .with_context(|| format!("failed to fetch block {hash} at height {height}"))?;
        clock.mark(Stage::Parsed);

        self.state = WatchState::Reporting;
        let report = BlockReport {
            height,
            hash,
            timings: clock.into_timings(),
        };
        tracing::info!(
            target: "blockperf::watch",
            height,
            hash = %report.hash,
            total = ?report.total(),
            "-----"
        );

        self.latest = Some(height);
        self.state = WatchState::Idle;
        Ok(Some(report))
    }

    /// Reports every new block until `shutdown` is cancelled or a fetch fails.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        while self.next_block(&shutdown).await?.is_some() {}
        tracing::info!(target: "blockperf::watch", latest = ?self.latest, "watcher stopped");
        Ok(())
    }
}
