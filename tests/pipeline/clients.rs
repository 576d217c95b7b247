use blockperf::{
    connect, BlockRequest, Endpoint, FetchResult, NodeClient, NodeError, NodeProtocol,
    ResponseHooks, Verbosity,
};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::support::{
    helpers::init_tracing,
    mock_node::{MockChain, MockNodeOptions, MockNodeServer},
};
use anyhow::Result;

#[derive(Default)]
struct CountingHooks {
    order: AtomicUsize,
    response_at: AtomicUsize,
    body_at: AtomicUsize,
}

impl ResponseHooks for CountingHooks {
    fn response_received(&self) {
        let position = self.order.fetch_add(1, Ordering::SeqCst) + 1;
        self.response_at.store(position, Ordering::SeqCst);
    }

    fn body_received(&self) {
        let position = self.order.fetch_add(1, Ordering::SeqCst) + 1;
        self.body_at.store(position, Ordering::SeqCst);
    }
}

fn client(url: &str, protocol: NodeProtocol) -> Result<std::sync::Arc<dyn NodeClient>> {
    connect(Endpoint::parse(url)?, protocol)
}

#[tokio::test]
async fn rpc_and_rest_agree_on_block_hashes() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(8);
    let server = MockNodeServer::start(chain.clone()).await?;

    for protocol in [NodeProtocol::Rpc, NodeProtocol::Rest] {
        let node = client(server.url(), protocol)?;
        assert_eq!(node.protocol(), protocol);
        assert_eq!(node.best_height().await?, 7);
        assert_eq!(node.block_hash(5).await?, Some(chain.hash_at(5)));
        assert_eq!(node.block_hash(8).await?, None, "{protocol}: height above tip");
    }

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn block_shapes_follow_verbosity() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(6);
    let server = MockNodeServer::start(chain.clone()).await?;
    let hash = chain.hash_at(5);
    let txids = chain.txids_at(5);
    assert_eq!(txids.len(), 2);

    for protocol in [NodeProtocol::Rpc, NodeProtocol::Rest] {
        let node = client(server.url(), protocol)?;
        let hooks = CountingHooks::default();

        let ids = node
            .block(&hash, BlockRequest::new(Verbosity::TxIds, true), &hooks)
            .await?;
        let ids = ids.value().expect("parsed");
        assert_eq!(ids["tx"][0], txids[0].as_str(), "{protocol}");
        assert_eq!(hooks.response_at.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.body_at.load(Ordering::SeqCst), 2);

        let full = node
            .block(&hash, BlockRequest::new(Verbosity::Full, true), &hooks)
            .await?;
        assert_eq!(
            full.value().expect("parsed")["tx"][1]["txid"],
            txids[1].as_str(),
            "{protocol}"
        );

        let raw = node
            .block(&hash, BlockRequest::new(Verbosity::Raw, true), &hooks)
            .await?;
        let hex = raw.value().and_then(|value| value.as_str()).expect("hex");
        assert!(hex.ends_with('5') && hex.len() == 160, "{protocol}: {hex}");

        let drained = node
            .block(&hash, BlockRequest::new(Verbosity::Full, false), &hooks)
            .await?;
        assert_eq!(drained, FetchResult::Discarded);

        let tx = node.transaction(&txids[0]).await?;
        assert_eq!(tx.value().expect("parsed")["blockhash"], hash.as_str());
    }

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn rpc_credentials_are_sent_as_basic_auth() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(3);
    let server = MockNodeServer::start_with_auth(chain.clone(), Some(("alice", "s3cret"))).await?;

    let authed = client(&server.url_with_auth("alice", "s3cret"), NodeProtocol::Rpc)?;
    assert_eq!(authed.best_height().await?, 2);

    let anonymous = client(server.url(), NodeProtocol::Rpc)?;
    let err = anonymous.best_height().await.expect_err("401 must fail");
    assert!(
        matches!(err, NodeError::Status { status: 401, .. }),
        "unexpected error {err:?}"
    );
    assert!(format!("{err}").contains("401"));
    assert_eq!(chain.count("unauthorized"), 1);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn percent_encoded_credentials_are_decoded() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(3);
    let server = MockNodeServer::start_with_auth(chain.clone(), Some(("alice", "p@ss:w0rd"))).await?;

    let node = client(&server.url_with_auth("alice", "p%40ss%3Aw0rd"), NodeProtocol::Rpc)?;
    assert_eq!(node.best_height().await?, 2);
    assert_eq!(chain.count("unauthorized"), 0);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn envelopes_without_id_are_unwrapped() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(4);
    let options = MockNodeOptions {
        bare_envelopes: true,
        ..MockNodeOptions::default()
    };
    let server = MockNodeServer::start_with(chain.clone(), options).await?;
    let node = client(server.url(), NodeProtocol::Rpc)?;

    assert_eq!(node.best_height().await?, 3);
    assert_eq!(node.block_hash(2).await?, Some(chain.hash_at(2)));
    assert_eq!(node.block_hash(4).await?, None, "bare -8 error is out of range");

    let err = node
        .block(
            "00",
            BlockRequest::new(Verbosity::TxIds, true),
            &blockperf::client::NoHooks,
        )
        .await
        .expect_err("missing block");
    assert_eq!(err.rpc_code(), Some(-5));

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn disabled_rest_interface_is_not_a_missing_height() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(4);
    let options = MockNodeOptions {
        rest_disabled: true,
        ..MockNodeOptions::default()
    };
    let server = MockNodeServer::start_with(chain, options).await?;
    let node = client(server.url(), NodeProtocol::Rest)?;

    let err = node
        .block_hash(1)
        .await
        .expect_err("an empty 404 must not read as \"not produced yet\"");
    assert!(matches!(err, NodeError::Status { status: 404, .. }), "{err:?}");
    assert!(!err.is_height_out_of_range());

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unknown_block_is_an_rpc_error_not_out_of_range() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(3);
    let server = MockNodeServer::start(chain).await?;
    let node = client(server.url(), NodeProtocol::Rpc)?;

    let err = node
        .block(
            "00",
            BlockRequest::new(Verbosity::TxIds, true),
            &blockperf::client::NoHooks,
        )
        .await
        .expect_err("missing block");
    assert_eq!(err.rpc_code(), Some(-5));
    assert!(!err.is_height_out_of_range());

    let rest = client(server.url(), NodeProtocol::Rest)?;
    let err = rest.transaction("ff").await.expect_err("missing tx");
    assert!(matches!(err, NodeError::Status { status: 404, .. }));

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unreachable_node_is_a_transport_error() -> Result<()> {
    init_tracing();
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let url = format!("http://{}", listener.local_addr()?);
    drop(listener);

    let node = client(&url, NodeProtocol::Rpc)?;
    let err = node.best_height().await.expect_err("nothing listens");
    assert!(matches!(err, NodeError::Transport(_)), "{err:?}");
    Ok(())
}
