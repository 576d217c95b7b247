pub mod client;
pub mod processor;
pub mod runtime;
pub mod traversal;

#[cfg(test)]
mod test_support;

pub use client::{
    connect, BlockRequest, Endpoint, FetchResult, NodeClient, NodeError, NodeProtocol, NodeResult,
    ResponseHooks, RestNodeClient, RpcNodeClient, Verbosity,
};
pub use processor::watcher::{BlockReport, ChainWatcher, Stage, StageTiming, WatchState};
pub use processor::worker_pool::{WorkerPool, WorkerPoolParams};
pub use runtime::config::{BenchConfig, BenchConfigBuilder, BenchConfigParams};
pub use runtime::fatal::FatalErrorHandler;
pub use runtime::runner::{Mode, Runner, StopReason};
pub use runtime::telemetry::{init_tracing, Metrics, MetricsSnapshot, ReportStyle};
pub use traversal::{
    BlockThenTx, FixedHashLoop, SequentialWalk, Tally, TraversalPolicy, WorkItem,
};
