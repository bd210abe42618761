//! Job reconciler module initialization.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use sbomer_core::bus::MessageBus;
use sbomer_core::config::SbomerConfig;
use sbomer_core::job::JobWatchEvent;
use sbomer_core::store::Store;
use sbomer_reconciler::JobReconcilerBuilder;

use super::ModuleHandle;

/// Initialize the job reconciler.
///
/// Returns the module and the sender job runners report observations on.
pub fn init<S: Store>(
    config: &SbomerConfig,
    store: Arc<S>,
    bus: MessageBus,
) -> Result<(ModuleHandle, mpsc::Sender<JobWatchEvent>)> {
    tracing::info!(
        capacity = config.reconciler.channel_capacity,
        "initializing job reconciler"
    );

    let (reconciler, observations) = JobReconcilerBuilder::new(store, bus)
        .empty_ok_target_types(config.generator.job.empty_ok_target_types.iter().cloned())
        .channel_capacity(config.reconciler.channel_capacity)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build job reconciler: {}", e))?;

    Ok((
        ModuleHandle::new("reconciler", true, Box::new(reconciler)),
        observations,
    ))
}
