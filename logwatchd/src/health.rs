//! Aggregated health reporting.
//!
//! The supervisor reports one [`WatcherHealth`] per spawned watcher; the
//! daemon status is derived from how many of them are still alive.
//!
//! # Aggregation Rule
//!
//! - All alive -> Healthy
//! - Some dead -> Degraded(names of the dead)
//! - None alive (or none spawned) -> Unhealthy

use serde::Serialize;

use logwatch_core::health::HealthStatus;

use crate::supervisor::SupervisorState;

/// Health report for the whole daemon.
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorHealth {
    pub state: SupervisorState,
    /// Worst of all watchers.
    pub status: HealthStatus,
    pub uptime_secs: u64,
    pub watchers: Vec<WatcherHealth>,
}

impl SupervisorHealth {
    pub fn alive(&self) -> usize {
        self.watchers.iter().filter(|w| w.alive).count()
    }
}

/// Health of a single watcher.
#[derive(Debug, Clone, Serialize)]
pub struct WatcherHealth {
    pub name: String,
    /// Whether its thread is still running.
    pub alive: bool,
    /// Watcher lifecycle state (`running`, `stopping`, `stopped`).
    pub state: String,
    pub status: HealthStatus,
}

impl WatcherHealth {
    pub fn new(name: impl Into<String>, alive: bool, state: impl Into<String>) -> Self {
        let state = state.into();
        let status = if alive {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy(format!("thread exited ({state})"))
        };
        Self {
            name: name.into(),
            alive,
            state,
            status,
        }
    }
}

/// Aggregates per-watcher health into the daemon status.
pub fn aggregate_status(watchers: &[WatcherHealth]) -> HealthStatus {
    if watchers.is_empty() {
        return HealthStatus::Unhealthy("no watchers".to_owned());
    }
    let dead: Vec<&str> = watchers
        .iter()
        .filter(|w| !w.alive)
        .map(|w| w.name.as_str())
        .collect();
    let alive = watchers.len() - dead.len();

    if dead.is_empty() {
        HealthStatus::Healthy
    } else if alive == 0 {
        HealthStatus::Unhealthy(format!("all {} watchers stopped", watchers.len()))
    } else {
        HealthStatus::Degraded(format!(
            "{alive}/{} watchers running; stopped: {}",
            watchers.len(),
            dead.join(", ")
        ))
    }
}
