//! Scheduler module initialization.

use std::sync::Arc;

use anyhow::Result;

use sbomer_core::bus::MessageBus;
use sbomer_core::config::SbomerConfig;
use sbomer_core::store::Store;
use sbomer_core::worker::WorkerPool;
use sbomer_leader::LeaderHandle;
use sbomer_scheduler::{SchedulerBuilder, SchedulerSettings};

use super::ModuleHandle;

/// Initialize the leader-gated scheduler.
pub fn init<S: Store>(
    config: &SbomerConfig,
    store: Arc<S>,
    bus: MessageBus,
    pool: WorkerPool,
    aggregate_pool: WorkerPool,
    leader: LeaderHandle,
) -> Result<ModuleHandle> {
    let settings = SchedulerSettings::from_config(&config.scheduler);
    tracing::info!(?settings, "initializing scheduler");

    let scheduler = SchedulerBuilder::new(store, bus, leader)
        .settings(settings)
        .worker_pool(pool)
        .aggregate_pool(aggregate_pool)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build scheduler: {}", e))?;

    Ok(ModuleHandle::new("scheduler", true, Box::new(scheduler)))
}
