//! Worker snapshot domain type

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Worker PIDs captured at one point in time
///
/// Only ever compared with another snapshot taken around the same reload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub pids: BTreeSet<u32>,
    pub taken_at: chrono::DateTime<chrono::Utc>,
}

impl WorkerSnapshot {
    /// Parses `pgrep` style output (one PID per line, garbage ignored)
    pub fn from_pgrep_output(stdout: &str) -> Self {
        let pids = stdout
            .lines()
            .filter_map(|line| line.trim().parse::<u32>().ok())
            .collect();

        Self {
            pids,
            taken_at: chrono::Utc::now(),
        }
    }

    /// Snapshot with no workers, used when enumeration fails
    pub fn empty() -> Self {
        Self {
            pids: BTreeSet::new(),
            taken_at: chrono::Utc::now(),
        }
    }

    /// True if any worker appeared or disappeared between the two snapshots
    pub fn replaced_by(&self, later: &WorkerSnapshot) -> bool {
        self.pids.symmetric_difference(&later.pids).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }
}
