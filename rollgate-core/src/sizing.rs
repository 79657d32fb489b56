//! MPM sizing heuristics
//!
//! Pure functions deriving worker and thread counts from host resources.
//! When an input is unknown a conservative default is used and the result is
//! flagged so callers can tell a measured value from a guess.

use serde::{Deserialize, Serialize};

/// Assumed memory when the host does not report it
pub const DEFAULT_MEMORY_MB: u64 = 2048;

/// Assumed CPU count when the host does not report it
pub const DEFAULT_CPU_CORES: u32 = 2;

/// ServerLimit used when ThreadsPerChild is zero
pub const DEFAULT_SERVER_LIMIT: u32 = 16;

/// A computed value and whether any input fell back to a default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Estimate<T> {
    pub value: T,
    pub used_default: bool,
}

impl<T> Estimate<T> {
    pub fn measured(value: T) -> Self {
        Self {
            value,
            used_default: false,
        }
    }

    pub fn defaulted(value: T) -> Self {
        Self {
            value,
            used_default: true,
        }
    }
}

/// Memory in MB, defaulting when unknown or zero
pub fn memory_mb(reported: Option<u64>) -> Estimate<u64> {
    match reported {
        Some(mb) if mb > 0 => Estimate::measured(mb),
        _ => Estimate::defaulted(DEFAULT_MEMORY_MB),
    }
}

/// CPU cores, defaulting when unknown or zero
pub fn cpu_cores(reported: Option<u32>) -> Estimate<u32> {
    match reported {
        Some(cores) if cores > 0 => Estimate::measured(cores),
        _ => Estimate::defaulted(DEFAULT_CPU_CORES),
    }
}

/// MaxRequestWorkers scaled to available memory
pub fn max_request_workers(memory: Option<u64>) -> Estimate<u32> {
    let mem = memory_mb(memory);
    let mb = mem.value;

    let workers = if mb < 1024 {
        (mb / 10).max(15)
    } else if mb < 4096 {
        (mb / 15).max(40)
    } else if mb < 16384 {
        (mb / 20).max(100)
    } else {
        (mb / 40).max(250)
    };

    Estimate {
        value: u32::try_from(workers).unwrap_or(u32::MAX),
        used_default: mem.used_default,
    }
}

/// ThreadsPerChild scaled to CPU count
pub fn threads_per_child(cpus: Option<u32>) -> Estimate<u32> {
    let cores = cpu_cores(cpus);
    let c = cores.value;

    let threads = if c <= 2 {
        (c * 4).min(8)
    } else if c <= 4 {
        (c * 4).min(16)
    } else if c <= 8 {
        25
    } else {
        c.saturating_mul(6).min(50)
    };

    Estimate {
        value: threads,
        used_default: cores.used_default,
    }
}

/// ServerLimit with a 10% buffer over workers / threads
pub fn server_limit(max_request_workers: u32, threads_per_child: u32) -> Estimate<u32> {
    if threads_per_child == 0 {
        return Estimate::defaulted(DEFAULT_SERVER_LIMIT);
    }

    let limit = (f64::from(max_request_workers) / f64::from(threads_per_child) * 1.1).ceil();
    Estimate::measured(limit as u32)
}

/// Full MPM recommendation for one host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpmSizing {
    pub max_request_workers: Estimate<u32>,
    pub threads_per_child: Estimate<u32>,
    pub server_limit: Estimate<u32>,
}

impl MpmSizing {
    pub fn for_host(memory: Option<u64>, cpus: Option<u32>) -> Self {
        let max_request_workers = max_request_workers(memory);
        let threads_per_child = threads_per_child(cpus);
        let server_limit = server_limit(max_request_workers.value, threads_per_child.value);

        Self {
            max_request_workers,
            threads_per_child,
            server_limit,
        }
    }
}
