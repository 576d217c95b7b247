use std::time::Duration;

use crate::support::{
    helpers::{init_tracing, wait_for_calls},
    mock_node::{MockChain, MockNodeServer},
};
use anyhow::Result;
use blockperf::{
    connect, BenchConfig, ChainWatcher, Endpoint, Mode, NodeProtocol, Runner, Stage, WatchState,
};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watcher_waits_for_the_tip_to_move() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(10);
    chain.set_tip_limit(5);
    let server = MockNodeServer::start(chain.clone()).await?;

    for protocol in [NodeProtocol::Rpc, NodeProtocol::Rest] {
        chain.set_tip_limit(5);
        let before = chain.count("hash:6");
        let client = connect(Endpoint::parse(server.url())?, protocol)?;
        let mut watcher = ChainWatcher::new(client, Duration::from_millis(5));
        assert_eq!(watcher.initialize().await?, 5);

        let producer = {
            let chain = chain.clone();
            tokio::spawn(async move {
                wait_for_calls(&chain, "hash:6", before + 3, Duration::from_secs(10)).await?;
                chain.set_tip_limit(6);
                anyhow::Ok(())
            })
        };

        let report = timeout(
            Duration::from_secs(10),
            watcher.next_block(&CancellationToken::new()),
        )
        .await??
        .expect("block 6 appears");
        producer.await??;

        assert_eq!(report.height, 6, "{protocol}");
        assert_eq!(report.hash, chain.hash_at(6));
        let stages: Vec<Stage> = report.timings.iter().map(|timing| timing.stage).collect();
        assert_eq!(
            stages,
            [
                Stage::NewBlock,
                Stage::ResponseReceived,
                Stage::BodyReceived,
                Stage::Parsed
            ]
        );
        assert!(report.timings[0].elapsed >= Duration::from_millis(10));
        assert_eq!(watcher.latest(), Some(6));
        assert_eq!(watcher.state(), WatchState::Idle);
    }

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watch_mode_runs_until_cancelled() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(4);
    let server = MockNodeServer::start(chain.clone()).await?;

    let config = BenchConfig::builder()
        .endpoint(server.url())
        .method(NodeProtocol::Rest)
        .poll_interval(Duration::from_millis(2))
        .build()?;
    let runner = Runner::new(config, Mode::Watch);
    let shutdown = runner.cancellation_token();
    let run = tokio::spawn(async move { runner.run().await });

    wait_for_calls(&chain, "hash:4", 2, Duration::from_secs(10)).await?;
    shutdown.cancel();
    timeout(Duration::from_secs(10), run).await???;

    assert_eq!(chain.count("best"), 1);
    assert_eq!(chain.count("block:"), 0);

    server.shutdown().await;
    Ok(())
}
