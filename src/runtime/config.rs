use crate::client::{Endpoint, NodeProtocol};
use crate::runtime::telemetry;
use anyhow::{bail, Context, Result};
use std::time::Duration;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_START_HEIGHT: u64 = 0;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runtime configuration for a benchmark or watch run.
///
/// All instances must be constructed via [`BenchConfig::builder`] or [`BenchConfig::new`]
/// so invariants are validated before any worker observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    endpoint: Endpoint,
    concurrency: usize,
    start_height: u64,
    method: NodeProtocol,
    loop_block: bool,
    full_block: bool,
    metrics_interval: Duration,
    poll_interval: Duration,
}

pub struct BenchConfigParams {
    pub endpoint: String,
    pub concurrency: usize,
    pub start_height: u64,
    pub method: NodeProtocol,
    pub loop_block: bool,
    pub full_block: bool,
    pub metrics_interval: Duration,
    pub poll_interval: Duration,
}

impl BenchConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> BenchConfigBuilder {
        BenchConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    pub fn new(params: BenchConfigParams) -> Result<Self> {
        let BenchConfigParams {
            endpoint,
            concurrency,
            start_height,
            method,
            loop_block,
            full_block,
            metrics_interval,
            poll_interval,
        } = params;

        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            bail!("endpoint cannot be empty");
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            bail!("endpoint must start with http:// or https://");
        }
        let endpoint = Endpoint::parse(endpoint).context("endpoint is not a valid url")?;

        let config = Self {
            endpoint,
            concurrency,
            start_height,
            method,
            loop_block,
            full_block,
            metrics_interval,
            poll_interval,
        };

        config.validate()?;
        Ok(config)
    }

    /// Parsed node endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Number of concurrent workers.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// First height handed out by height-based traversals.
    pub fn start_height(&self) -> u64 {
        self.start_height
    }

    /// Wire protocol used for block and transaction fetches.
    pub fn method(&self) -> NodeProtocol {
        self.method
    }

    /// Request the block at `start_height` in a loop instead of walking.
    pub fn loop_block(&self) -> bool {
        self.loop_block
    }

    /// Ask for decoded transactions inside block responses.
    pub fn full_block(&self) -> bool {
        self.full_block
    }

    /// Interval between rate lines.
    pub fn metrics_interval(&self) -> Duration {
        self.metrics_interval
    }

    /// Delay between tip polls in watch mode.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be greater than 0");
        }

        if self.metrics_interval.is_zero() {
            bail!("metrics_interval must be greater than 0");
        }

        if self.poll_interval.is_zero() {
            bail!("poll_interval must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct BenchConfigBuilder {
    endpoint: Option<String>,
    concurrency: Option<usize>,
    start_height: Option<u64>,
    method: Option<NodeProtocol>,
    loop_block: Option<bool>,
    full_block: Option<bool>,
    metrics_interval: Option<Duration>,
    poll_interval: Option<Duration>,
}

impl BenchConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    pub fn concurrency(mut self, count: usize) -> Self {
        self.concurrency = Some(count);
        self
    }

    pub fn start_height(mut self, height: u64) -> Self {
        self.start_height = Some(height);
        self
    }

    pub fn method(mut self, method: NodeProtocol) -> Self {
        self.method = Some(method);
        self
    }

    pub fn loop_block(mut self, enabled: bool) -> Self {
        self.loop_block = Some(enabled);
        self
    }

    pub fn full_block(mut self, enabled: bool) -> Self {
        self.full_block = Some(enabled);
        self
    }

    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<BenchConfig> {
        let params = BenchConfigParams {
            endpoint: self.endpoint.context("endpoint is required")?,
            concurrency: self.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            start_height: self.start_height.unwrap_or(DEFAULT_START_HEIGHT),
            method: self.method.unwrap_or_default(),
            loop_block: self.loop_block.unwrap_or(false),
            full_block: self.full_block.unwrap_or(false),
            metrics_interval: self
                .metrics_interval
                .unwrap_or(telemetry::DEFAULT_METRICS_INTERVAL),
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
        };

        BenchConfig::new(params)
    }
}
