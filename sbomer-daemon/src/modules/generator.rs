//! Generation service module initialization.
//!
//! # Wiring
//!
//! ```text
//! GenerationService --JobGenerator--> ProcessJobRunner --JobWatchEvent--> JobReconciler
//!                   --CommandGenerator (in-process)
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use sbomer_core::bus::MessageBus;
use sbomer_core::config::SbomerConfig;
use sbomer_core::store::Store;
use sbomer_core::worker::WorkerPool;
use sbomer_generator::{
    CommandGenerator, GenerationServiceBuilder, GeneratorRegistry, JobGenerator, ProcessJobRunner,
};

use super::ModuleHandle;

/// Initialize the generation service with the enabled built-in generators.
pub fn init<S: Store>(
    config: &SbomerConfig,
    store: Arc<S>,
    bus: MessageBus,
    pool: WorkerPool,
    runner: Arc<ProcessJobRunner>,
) -> Result<ModuleHandle> {
    let mut registry = GeneratorRegistry::new();

    if config.generator.job.enabled {
        let generator = JobGenerator::from_config(&config.generator.job, runner)
            .map_err(|e| anyhow::anyhow!("failed to build job generator: {}", e))?;
        registry
            .register(generator)
            .map_err(|e| anyhow::anyhow!("failed to register job generator: {}", e))?;
    }
    if config.generator.command.enabled {
        let generator = CommandGenerator::from_config(&config.generator.command)
            .map_err(|e| anyhow::anyhow!("failed to build command generator: {}", e))?;
        registry
            .register(generator)
            .map_err(|e| anyhow::anyhow!("failed to register command generator: {}", e))?;
    }
    if registry.is_empty() {
        tracing::warn!("no generators enabled, generations will stay NEW");
    }
    tracing::info!(
        generators = ?registry.names(),
        target_types = ?registry.supported_target_types(),
        "initializing generation service"
    );

    let service = GenerationServiceBuilder::new(store, bus)
        .registry(registry)
        .timeout(Duration::from_secs(config.generator.timeout_secs))
        .worker_pool(pool)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build generation service: {}", e))?;

    Ok(ModuleHandle::new("generator", true, Box::new(service)))
}
