//! Fixed-size pool of fetch workers.
//!
//! Every worker loops `next → fetch → on_result → record` with at most one
//! request in flight, so the pool never has more than `concurrency` requests
//! outstanding. The first error (or panic) from any worker is fatal to the
//! whole pool: the others drop whatever request they have in flight and stop.
//! A plain cancel instead lets every worker finish its current step.

use crate::client::NodeClient;
use crate::processor::fetch::fetch_item;
use crate::runtime::fatal::FatalErrorHandler;
use crate::runtime::telemetry::Metrics;
use crate::traversal::TraversalPolicy;
use anyhow::{Context, Result};
use futures::FutureExt;
use std::any::Any;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct WorkerPool {
    concurrency: usize,
    client: Arc<dyn NodeClient>,
    policy: Arc<dyn TraversalPolicy>,
    metrics: Arc<Metrics>,
}

pub struct WorkerPoolParams {
    pub concurrency: usize,
    pub client: Arc<dyn NodeClient>,
    pub policy: Arc<dyn TraversalPolicy>,
    pub metrics: Arc<Metrics>,
}

impl WorkerPool {
    pub fn new(params: WorkerPoolParams) -> Self {
        Self {
            concurrency: params.concurrency.max(1),
            client: params.client,
            policy: params.policy,
            metrics: params.metrics,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs until `shutdown` is cancelled (returns `Ok`) or a worker fails
    /// (cancels `shutdown` and returns that worker's error).
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let fatal_handler = FatalErrorHandler::new(shutdown.clone());
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(self.concurrency);

        tracing::info!(
            workers = self.concurrency,
            protocol = %self.client.protocol(),
            "starting worker pool"
        );

        for worker_id in 0..self.concurrency {
            let worker = Worker {
                id: worker_id,
                client: self.client.clone(),
                policy: self.policy.clone(),
                metrics: self.metrics.clone(),
            };
            let shutdown = shutdown.clone();
            let fatal_handler = fatal_handler.clone();

            handles.push(tokio::spawn(async move {
                let run = std::panic::AssertUnwindSafe(worker.run(shutdown)).catch_unwind();
                let result = tokio::select! {
                    result = run => result,
                    () = fatal_handler.triggered() => {
                        tracing::debug!(worker = worker_id, "dropping in-flight request after fatal error");
                        return;
                    }
                };

                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        let context = format!("worker {worker_id} exited with error");
                        fatal_handler.trigger(&context, err.context(context.clone()));
                    }
                    Err(panic_payload) => {
                        let panic_msg = panic_message(panic_payload.as_ref());
                        let context = format!("worker {worker_id} panicked");
                        fatal_handler.trigger(
                            &context,
                            anyhow::anyhow!("worker {worker_id} panicked: {panic_msg}"),
                        );
                    }
                }
            }));
        }

        for (worker_id, handle) in handles.into_iter().enumerate() {
            if let Err(err) = handle.await {
                tracing::warn!(worker = worker_id, error = %err, "worker task join failed");
            }
        }

        match fatal_handler.error() {
            Some(err) => Err(err),
            None => {
                tracing::info!("worker pool stopped");
                Ok(())
            }
        }
    }
}

struct Worker {
    id: usize,
    client: Arc<dyn NodeClient>,
    policy: Arc<dyn TraversalPolicy>,
    metrics: Arc<Metrics>,
}

impl Worker {
    #[tracing::instrument(name = "worker", skip_all, fields(worker = self.id))]
    async fn run(self, shutdown: CancellationToken) -> Result<()> {
        tracing::debug!("worker task started");

        // In-flight requests are never abandoned; cancellation is observed
        // between steps.
        while !shutdown.is_cancelled() {
            self.step().await?;
        }

        tracing::debug!("worker task stopping");
        Ok(())
    }

    async fn step(&self) -> Result<()> {
        let item = self.policy.next();
        let request = self.policy.block_request();

        let result = fetch_item(self.client.as_ref(), &item, request)
            .await
            .with_context(|| format!("failed to fetch {item}"))?;
        let tally = self
            .policy
            .on_result(&item, &result)
            .with_context(|| format!("failed to process {item}"))?;

        self.metrics.record(tally);
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
