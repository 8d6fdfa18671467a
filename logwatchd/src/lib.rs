//! logwatch daemon library.
//!
//! Exposes the daemon's building blocks for integration testing. In
//! production `logwatchd` runs as a binary (main.rs).

pub mod cli;
pub mod health;
pub mod logging;
pub mod metrics_server;
pub mod pid_file;
pub mod supervisor;
