use crate::client::{self, NodeClient};
use crate::processor::watcher::ChainWatcher;
use crate::processor::worker_pool::{WorkerPool, WorkerPoolParams};
use crate::runtime::config::BenchConfig;
use crate::runtime::telemetry::{spawn_metrics_reporter, Metrics, ReportStyle};
use crate::traversal::{BlockThenTx, FixedHashLoop, SequentialWalk, TraversalPolicy};
use anyhow::{bail, Result};
use std::fmt;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// What a run measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Block requests per second (sequential walk, or one block on repeat).
    Bench,
    /// Blocks and transactions per second, expanding every block into its
    /// transactions.
    Crawl,
    /// Per-stage latency of each new block at the chain tip.
    Watch,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Bench => f.write_str("bench"),
            Mode::Crawl => f.write_str("crawl"),
            Mode::Watch => f.write_str("watch"),
        }
    }
}

/// Why a run that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown token was cancelled by the embedding caller.
    Cancelled,
    /// Ctrl-C (SIGINT) was received.
    Interrupted,
}

impl StopReason {
    /// Process exit status; an interrupt follows the shell's `128 + SIGINT`.
    pub fn exit_code(self) -> u8 {
        match self {
            StopReason::Cancelled => 0,
            StopReason::Interrupted => 130,
        }
    }
}

/// Wires the node client, traversal policy, worker pool and metrics reporter
/// for one mode, and handles OS signals for graceful shutdowns.
pub struct Runner {
    config: BenchConfig,
    mode: Mode,
    client: Option<Arc<dyn NodeClient>>,
    shutdown: CancellationToken,
}

impl Runner {
    pub fn new(config: BenchConfig, mode: Mode) -> Self {
        Self {
            config,
            mode,
            client: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Uses `client` instead of building one from the configured endpoint.
    pub fn with_client(config: BenchConfig, mode: Mode, client: Arc<dyn NodeClient>) -> Self {
        Self {
            client: Some(client),
            ..Self::new(config, mode)
        }
    }

    /// Returns a clone of the root shutdown token so external callers can integrate
    /// with their own signal handlers or cancellation strategies.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Runs the configured mode until the shutdown token is cancelled (`Ok`) or a
    /// fatal error stops it (`Err`).
    pub async fn run(&self) -> Result<()> {
        let client = match &self.client {
            Some(client) => client.clone(),
            None => client::connect(self.config.endpoint().clone(), self.config.method())?,
        };

        tracing::info!(
            mode = %self.mode,
            endpoint = %self.config.endpoint().host_port(),
            method = %self.config.method(),
            "runner starting"
        );

        let result = match self.mode {
            Mode::Watch => {
                ChainWatcher::new(client, self.config.poll_interval())
                    .run(self.shutdown.clone())
                    .await
            }
            Mode::Bench | Mode::Crawl => self.run_pool(client).await,
        };

        self.shutdown.cancel();
        result
    }

    /// Runs until a Ctrl-C (SIGINT) is received or the run stops on its own.
    /// A fatal error during the shutdown that follows Ctrl-C still wins.
    pub async fn run_until_ctrl_c(&self) -> Result<StopReason> {
        let run = self.run();
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => result.map(|()| StopReason::Cancelled),
            signal = signal::ctrl_c() => {
                match signal {
                    Ok(()) => {
                        tracing::info!("Ctrl-C received; shutting down runner");
                        self.shutdown.cancel();
                        run.await.map(|()| StopReason::Interrupted)
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to listen for Ctrl-C");
                        run.await.map(|()| StopReason::Cancelled)
                    }
                }
            }
        }
    }

    async fn run_pool(&self, client: Arc<dyn NodeClient>) -> Result<()> {
        let policy = self.build_policy(client.as_ref()).await?;
        let style = policy.report_style();
        let metrics = Arc::new(Metrics::new());

        let reporter = spawn_metrics_reporter(
            metrics.clone(),
            style,
            self.shutdown.clone(),
            self.config.metrics_interval(),
        );

        let pool = WorkerPool::new(WorkerPoolParams {
            concurrency: self.config.concurrency(),
            client,
            policy,
            metrics: metrics.clone(),
        });
        let result = pool.run(self.shutdown.clone()).await;

        self.shutdown.cancel();
        if let Err(err) = reporter.await {
            tracing::warn!(error = %err, "metrics reporter task join failed");
        }
        log_totals(&metrics, style);
        result
    }

    async fn build_policy(&self, client: &dyn NodeClient) -> Result<Arc<dyn TraversalPolicy>> {
        let from = self.config.start_height();
        let policy: Arc<dyn TraversalPolicy> = match self.mode {
            Mode::Bench if self.config.loop_block() => {
                Arc::new(FixedHashLoop::resolve(client, from).await?)
            }
            Mode::Bench => Arc::new(SequentialWalk::new(from)),
            Mode::Crawl => Arc::new(BlockThenTx::new(from, self.config.full_block())),
            Mode::Watch => bail!("watch mode does not use a traversal policy"),
        };
        Ok(policy)
    }
}

fn log_totals(metrics: &Metrics, style: ReportStyle) {
    let totals = metrics.totals();
    tracing::info!(
        requests = totals.requests,
        blocks = totals.blocks,
        txs = totals.txs,
        elapsed = ?totals.elapsed,
        average = %totals.render(style),
        "run finished"
    );
}
