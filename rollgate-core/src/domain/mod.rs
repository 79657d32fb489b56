//! Core domain types
//!
//! This module contains the structures shared between the controller (which
//! drives the web server) and the CLI (which renders reports). They carry no
//! I/O of their own.

pub mod backup;
pub mod command;
pub mod environment;
pub mod platform;
pub mod rollout;
pub mod target;
pub mod worker;

pub use backup::{BACKUP_TIMESTAMP_FORMAT, BackupArtifact, BackupMetadata};
pub use command::CommandLine;
pub use environment::{Environment, EnvironmentLayout, SwitchOutcome, SwitchReport};
pub use platform::{AltRootStyle, InitSystem, PlatformFamily, PlatformProfile};
pub use rollout::{RolloutAttempt, RolloutOutcome};
pub use target::ServiceTarget;
pub use worker::WorkerSnapshot;
