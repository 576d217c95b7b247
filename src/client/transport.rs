//! HTTP plumbing shared by both node clients: one pooled `reqwest` client per
//! endpoint, drain-versus-parse body handling and per-stage callbacks.

use crate::client::endpoint::Endpoint;
use crate::client::error::NodeResult;
use crate::client::response::{decode_body, is_json_content_type, FetchResult};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use std::sync::Arc;
use url::Url;

/// Observes the two transport milestones of a request. Both callbacks fire at
/// most once and always in order.
pub trait ResponseHooks: Send + Sync {
    /// Status line and headers arrived.
    fn response_received(&self) {}

    /// Body fully read (drained or buffered), before any parsing.
    fn body_received(&self) {}
}

/// Hooks that ignore every milestone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl ResponseHooks for NoHooks {}

#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    client: reqwest::Client,
    endpoint: Arc<Endpoint>,
}

impl HttpTransport {
    pub(crate) fn new(endpoint: Endpoint, default_headers: HeaderMap) -> Result<Self> {
        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: Arc::new(endpoint),
        })
    }

    pub(crate) fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub(crate) async fn post(
        &self,
        url: Url,
        body: Vec<u8>,
        parse: bool,
        hooks: &dyn ResponseHooks,
    ) -> NodeResult<FetchResult> {
        self.execute(self.client.post(url).body(body), parse, hooks)
            .await
    }

    pub(crate) async fn get(
        &self,
        url: Url,
        parse: bool,
        hooks: &dyn ResponseHooks,
    ) -> NodeResult<FetchResult> {
        self.execute(self.client.get(url), parse, hooks).await
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        parse: bool,
        hooks: &dyn ResponseHooks,
    ) -> NodeResult<FetchResult> {
        let mut response = request.send().await?;
        hooks.response_received();

        let status = response.status();
        let is_json = is_json_content_type(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
        );

        if !parse && status == StatusCode::OK {
            while response.chunk().await?.is_some() {}
            hooks.body_received();
            return Ok(FetchResult::Discarded);
        }

        let body = response.bytes().await?;
        hooks.body_received();

        let reason = status.canonical_reason().unwrap_or("Unknown Status");
        decode_body(status.as_u16(), reason, is_json, &body).map(FetchResult::Parsed)
    }
}
