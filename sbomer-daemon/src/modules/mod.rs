//! Module registry and initialization.
//!
//! Each SBOMer component is wrapped as a [`ModuleHandle`] that provides
//! uniform lifecycle management via the [`DynPipeline`] trait.
//!
//! The [`ModuleRegistry`] tracks all registered modules, starts them in
//! registration order and stops them in reverse.

pub mod generator;
pub mod leader;
pub mod reconciler;
pub mod resolver;
pub mod scheduler;

use sbomer_core::pipeline::{DynPipeline, HealthStatus};

use crate::health::ModuleHealth;

/// A handle to a registered module.
///
/// Wraps a `Box<dyn DynPipeline>` with metadata (name, enabled flag).
pub struct ModuleHandle {
    /// Module name for logging and health reporting.
    pub name: String,
    /// Whether this module is enabled in configuration.
    pub enabled: bool,
    /// The module's pipeline implementation (start/stop/health_check).
    pub pipeline: Box<dyn DynPipeline>,
}

impl ModuleHandle {
    /// Create a new module handle.
    pub fn new(name: impl Into<String>, enabled: bool, pipeline: Box<dyn DynPipeline>) -> Self {
        Self {
            name: name.into(),
            enabled,
            pipeline,
        }
    }

    /// Check the module's health status.
    ///
    /// Disabled modules always report `Healthy` (they are not expected to run).
    pub async fn health_check(&self) -> HealthStatus {
        if !self.enabled {
            return HealthStatus::Healthy;
        }
        self.pipeline.health_check().await
    }
}

/// Registry of all SBOMer modules.
#[derive(Default)]
pub struct ModuleRegistry {
    /// Modules in registration order (dependencies first).
    modules: Vec<ModuleHandle>,
    /// Number of modules started by the last `start_all`.
    started: usize,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module.
    ///
    /// Modules must be registered in dependency order: a module is started
    /// after, and stopped before, everything registered ahead of it.
    pub fn register(&mut self, handle: ModuleHandle) {
        self.modules.push(handle);
    }

    /// Start all enabled modules in registration order.
    ///
    /// Returns an error on the first module that fails to start.
    /// Already-started modules are NOT rolled back; the caller should
    /// invoke `stop_all` if partial startup is unacceptable.
    pub async fn start_all(&mut self) -> anyhow::Result<()> {
        self.started = 0;
        for handle in &mut self.modules {
            if !handle.enabled {
                tracing::debug!(module = %handle.name, "skipping disabled module");
                self.started += 1;
                continue;
            }

            tracing::info!(module = %handle.name, "starting module");
            handle
                .pipeline
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start module '{}': {}", handle.name, e))?;
            self.started += 1;
            tracing::info!(module = %handle.name, "module started successfully");
        }
        Ok(())
    }

    /// Stop every started module in reverse registration order.
    ///
    /// Logs errors but continues stopping remaining modules.
    pub async fn stop_all(&mut self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        let started = std::mem::take(&mut self.started);
        for handle in self.modules[..started].iter_mut().rev() {
            if !handle.enabled {
                continue;
            }

            tracing::info!(module = %handle.name, "stopping module");
            if let Err(e) = handle.pipeline.stop().await {
                tracing::error!(
                    module = %handle.name,
                    error = %e,
                    "failed to stop module"
                );
                errors.push(format!("{}: {}", handle.name, e));
            } else {
                tracing::info!(module = %handle.name, "module stopped successfully");
            }
        }

        if !errors.is_empty() {
            return Err(anyhow::anyhow!(
                "errors stopping modules: {}",
                errors.join("; ")
            ));
        }

        Ok(())
    }

    /// Get health status for all modules.
    pub async fn health_statuses(&self) -> Vec<ModuleHealth> {
        let mut statuses = Vec::with_capacity(self.modules.len());
        for handle in &self.modules {
            statuses.push(ModuleHealth {
                name: handle.name.clone(),
                enabled: handle.enabled,
                status: handle.health_check().await,
            });
        }
        statuses
    }

    /// Registered module names in start order.
    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    /// Number of registered modules.
    pub fn count(&self) -> usize {
        self.modules.len()
    }

    /// Number of enabled modules.
    pub fn enabled_count(&self) -> usize {
        self.modules.iter().filter(|m| m.enabled).count()
    }
}
