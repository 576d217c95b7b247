use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use crate::support::mock_node::MockChain;

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

/// Polls until the mock node has served at least `target` calls whose label
/// starts with `prefix`.
pub async fn wait_for_calls(
    chain: &MockChain,
    prefix: &str,
    target: usize,
    timeout: Duration,
) -> Result<()> {
    let start = Instant::now();
    loop {
        let current = chain.count(prefix);
        if current >= target {
            return Ok(());
        }
        if start.elapsed() > timeout {
            bail!(
                "mock node served {current} `{prefix}` calls within {:?}, expected {target}",
                timeout
            );
        }
        sleep(Duration::from_millis(10)).await;
    }
}

pub fn heights_requested(chain: &MockChain) -> Vec<u64> {
    chain
        .calls()
        .iter()
        .filter_map(|call| call.strip_prefix("hash:"))
        .filter_map(|height| height.parse().ok())
        .collect()
}
