//! Service layer
//!
//! Services hold the rollout logic. They drive the managed server through
//! the `ProcessRunner` seam and the target's prebuilt commands, and gate
//! reloads through the `HealthGate` trait so tests can substitute both.

mod backup;
mod blue_green;
mod control;
mod health;
mod reload;
mod rollout;
mod validator;

// Re-export traits
pub use health::HealthGate;

// Re-export implementations
pub use backup::BackupService;
pub use blue_green::{BlueGreenSwitch, LivenessPolicy};
pub use control::ServiceManager;
pub use health::{HealthProbe, is_healthy_response, parse_status_code};
pub use reload::{ReloadPolicy, ReloadReport, ReloadSupervisor};
pub use rollout::StagedRollout;
pub use validator::{Validation, Validator};
