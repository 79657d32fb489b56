//! Rollgate Core
//!
//! Core types for the rollgate configuration rollout controller.
//!
//! This crate contains:
//! - Domain types: platform profile, service target, blue-green layout,
//!   worker snapshots, rollout attempts and backup metadata
//! - Sizing: pure MPM sizing heuristics

pub mod domain;
pub mod sizing;
