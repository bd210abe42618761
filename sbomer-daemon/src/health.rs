//! Aggregated health check reporting.
//!
//! The overall daemon status is the worst status among all enabled modules.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use serde::Serialize;

use sbomer_core::pipeline::HealthStatus;

/// Aggregated health report for the entire daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall daemon health status (worst of all modules).
    pub status: HealthStatus,
    /// Whether this replica currently holds the leader lease.
    pub leader: bool,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Per-module health reports.
    pub modules: Vec<ModuleHealth>,
}

/// Health status for a single module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleHealth {
    /// Module name (e.g., "resolver", "scheduler").
    pub name: String,
    /// Whether the module is enabled in configuration.
    pub enabled: bool,
    /// Current health status of the module.
    pub status: HealthStatus,
}

/// Aggregate multiple module health statuses into a single status.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy.
/// Only considers enabled modules.
pub fn aggregate_status(modules: &[ModuleHealth]) -> HealthStatus {
    let mut unhealthy = Vec::new();
    let mut degraded = Vec::new();

    for module in modules.iter().filter(|m| m.enabled) {
        match &module.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => degraded.push(format!("{}: {}", module.name, reason)),
            HealthStatus::Unhealthy(reason) => {
                unhealthy.push(format!("{}: {}", module.name, reason));
            }
        }
    }

    if !unhealthy.is_empty() {
        unhealthy.extend(degraded);
        HealthStatus::Unhealthy(unhealthy.join("; "))
    } else if !degraded.is_empty() {
        HealthStatus::Degraded(degraded.join("; "))
    } else {
        HealthStatus::Healthy
    }
}
