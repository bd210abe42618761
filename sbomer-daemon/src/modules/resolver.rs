//! Resolution service module initialization.
//!
//! Builds one [`RouteResolver`] per `[[resolver.routes]]` entry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use sbomer_core::bus::MessageBus;
use sbomer_core::config::SbomerConfig;
use sbomer_core::store::Store;
use sbomer_core::worker::WorkerPool;
use sbomer_resolver::{ResolutionServiceBuilder, ResolverRegistry, RouteResolver};

use super::ModuleHandle;

/// Initialize the resolution service.
pub fn init<S: Store>(
    config: &SbomerConfig,
    store: Arc<S>,
    bus: MessageBus,
    pool: WorkerPool,
) -> Result<ModuleHandle> {
    let mut registry = ResolverRegistry::new();
    for route in &config.resolver.routes {
        let resolver = RouteResolver::from_config(route)
            .map_err(|e| anyhow::anyhow!("invalid resolver route '{}': {}", route.key, e))?;
        registry
            .register(resolver)
            .map_err(|e| anyhow::anyhow!("failed to register resolver: {}", e))?;
    }
    if registry.is_empty() {
        tracing::warn!("no resolver routes configured, every event will be ignored");
    }
    tracing::info!(resolvers = ?registry.names(), "initializing resolution service");

    let service = ResolutionServiceBuilder::new(store, bus)
        .registry(registry)
        .timeout(Duration::from_secs(config.resolver.timeout_secs))
        .worker_pool(pool)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build resolution service: {}", e))?;

    Ok(ModuleHandle::new("resolver", true, Box::new(service)))
}
