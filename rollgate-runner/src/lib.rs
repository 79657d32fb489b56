//! Rollgate runner
//!
//! Zero-downtime configuration rollouts for an Apache-style web server.
//!
//! Architecture:
//! - Process: every external command goes through the `ProcessRunner` seam
//! - Services: validation, health probing, reloads, staged rollouts,
//!   blue-green switches, backup and restore
//! - Controller: wires services from a `Config` and holds the per-service lock
//!
//! All operations run sequentially; the only suspension points are the
//! retry and liveness sleeps and I/O.

pub mod config;
pub mod controller;
pub mod error;
pub mod fsops;
pub mod host;
pub mod lock;
pub mod process;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use controller::RolloutController;
pub use error::{ProcessError, Result, RolloutError};
pub use host::HostFacts;
