use crate::traversal::Tally;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Default interval used by the metrics reporter task.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(1);

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// How a metrics window is rendered on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStyle {
    /// `<rate> req/s`
    Requests,
    /// `<blocks/s> blk/s, <txs/s> tx/s`
    BlocksAndTxs,
}

/// Shared counters incremented by workers and drained by the reporter.
///
/// Each windowed counter is drained with a single `swap`, so an increment
/// racing with a snapshot lands in exactly one window.
#[derive(Debug)]
pub struct Metrics {
    requests: AtomicU64,
    blocks: AtomicU64,
    txs: AtomicU64,
    window_start: Mutex<Instant>,
    total_requests: AtomicU64,
    total_blocks: AtomicU64,
    total_txs: AtomicU64,
    started_at: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            requests: AtomicU64::new(0),
            blocks: AtomicU64::new(0),
            txs: AtomicU64::new(0),
            window_start: Mutex::new(now),
            total_requests: AtomicU64::new(0),
            total_blocks: AtomicU64::new(0),
            total_txs: AtomicU64::new(0),
            started_at: now,
        }
    }

    pub fn record(&self, tally: Tally) {
        add(&self.requests, &self.total_requests, tally.requests);
        add(&self.blocks, &self.total_blocks, tally.blocks);
        add(&self.txs, &self.total_txs, tally.txs);
    }

    /// Drains the current window and starts the next one.
    pub fn snapshot_and_reset(&self) -> MetricsSnapshot {
        let mut window_start = self
            .window_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let snapshot = MetricsSnapshot {
            requests: self.requests.swap(0, Ordering::SeqCst),
            blocks: self.blocks.swap(0, Ordering::SeqCst),
            txs: self.txs.swap(0, Ordering::SeqCst),
            elapsed: now.saturating_duration_since(*window_start),
        };
        *window_start = now;
        snapshot
    }

    /// Lifetime counters since construction.
    pub fn totals(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.total_requests.load(Ordering::SeqCst),
            blocks: self.total_blocks.load(Ordering::SeqCst),
            txs: self.total_txs.load(Ordering::SeqCst),
            elapsed: self.started_at.elapsed(),
        }
    }
}

fn add(window: &AtomicU64, total: &AtomicU64, value: u64) {
    if value == 0 {
        return;
    }
    window.fetch_add(value, Ordering::SeqCst);
    total.fetch_add(value, Ordering::Relaxed);
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub blocks: u64,
    pub txs: u64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    pub fn request_rate(&self) -> f64 {
        per_second(self.requests, self.elapsed)
    }

    pub fn block_rate(&self) -> f64 {
        per_second(self.blocks, self.elapsed)
    }

    pub fn tx_rate(&self) -> f64 {
        per_second(self.txs, self.elapsed)
    }

    pub fn render(&self, style: ReportStyle) -> String {
        match style {
            ReportStyle::Requests => format!("{:.6} req/s", self.request_rate()),
            ReportStyle::BlocksAndTxs => format!(
                "{:.2} blk/s, {:.2} tx/s",
                self.block_rate(),
                self.tx_rate()
            ),
        }
    }
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let seconds = elapsed.as_secs_f64();
    if seconds <= f64::EPSILON {
        0.0
    } else {
        count as f64 / seconds
    }
}

/// Spawns a background task that prints one rate line per interval until shutdown.
pub fn spawn_metrics_reporter(
    metrics: Arc<Metrics>,
    style: ReportStyle,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!(target: "blockperf::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let snapshot = metrics.snapshot_and_reset();
                    let line = snapshot.render(style);
                    println!("{line}");
                    tracing::debug!(
                        target: "blockperf::metrics",
                        requests = snapshot.requests,
                        blocks = snapshot.blocks,
                        txs = snapshot.txs,
                        elapsed = ?snapshot.elapsed,
                        "{line}"
                    );
                }
            }
        }
    })
}
