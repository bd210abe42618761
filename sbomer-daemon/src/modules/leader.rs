//! Leader elector module initialization.
//!
//! When `[leader] enabled = false` the replica always acts as leader and no
//! module is registered.

use anyhow::Result;

use sbomer_core::config::SbomerConfig;
use sbomer_leader::{ElectionSettings, LeaderElector, LeaderHandle, LeaseBackend};

use super::ModuleHandle;

/// Initialize the leader elector.
///
/// Returns the module (if enabled) and the handle other modules use to
/// check leadership.
pub fn init(config: &SbomerConfig) -> Result<(Option<ModuleHandle>, LeaderHandle)> {
    if !config.leader.enabled {
        tracing::info!("leader election disabled, this replica always leads");
        return Ok((None, LeaderHandle::always()));
    }

    let backend = LeaseBackend::from_config(&config.leader);
    tracing::info!(
        identity = %config.general.identity,
        lease = %config.leader.lease_name,
        store = backend.kind(),
        "initializing leader elector"
    );

    let settings = ElectionSettings::from_config(&config.general.identity, &config.leader);
    let elector = LeaderElector::new(backend, settings)
        .map_err(|e| anyhow::anyhow!("failed to build leader elector: {}", e))?;
    let handle = elector.handle();

    Ok((
        Some(ModuleHandle::new("leader", true, Box::new(elector))),
        handle,
    ))
}
