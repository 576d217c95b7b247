#[path = "../support/mod.rs"]
mod support;

mod clients;
mod watch;
