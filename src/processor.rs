//! Request-driving engines: the concurrent worker pool and the single-loop
//! chain watcher, plus the item-to-call mapping they share.

pub mod fetch;
pub mod watcher;
pub mod worker_pool;
