//! Runtime glue that wires configs, fatal error fan-out, telemetry, and
//! runner orchestration.

pub mod config;
pub mod fatal;
pub mod runner;
pub mod telemetry;
