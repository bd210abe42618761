//! Component orchestration -- assembly, wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `sbomer-daemon`.
//! It builds the shared store, bus and stage worker pools, initializes every
//! component, manages startup/shutdown ordering, and waits for a signal.
//!
//! # Startup Order
//!
//! 1. Leader elector (the scheduler reads its handle)
//! 2. Job reconciler (consumes job observations)
//! 3. Scheduler (consumes EventResolved and GenerationStatusChanged)
//! 4. Generation service (consumes GenerationScheduled)
//! 5. Resolution service (consumes ResolveRequested)
//!
//! # Shutdown Order
//!
//! Reverse of startup, so the elector stops last and releases its lease.
//! The stage worker pools and the process job runner are drained afterwards.
//!
//! # Worker Pools
//!
//! Each stage (resolution, scheduling, generation, aggregation) has its own
//! pool. A full pool blocks its dispatcher, which in turn blocks publishers
//! of that stage's topic. Stages only publish downstream and aggregation
//! publishes nothing, so no two full pools can wait on each other.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::broadcast;

use sbomer_core::bus::MessageBus;
use sbomer_core::config::SbomerConfig;
use sbomer_core::intake::EventIntake;
use sbomer_core::metrics as m;
use sbomer_core::store::InMemoryStore;
use sbomer_core::worker::WorkerPool;
use sbomer_generator::ProcessJobRunner;
use sbomer_leader::LeaderHandle;

use crate::health::{DaemonHealth, aggregate_status};
use crate::metrics_server;
use crate::modules::{self, ModuleRegistry};

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: SbomerConfig,
    /// Shared Event/Generation store.
    store: Arc<InMemoryStore>,
    /// Per-stage worker pools for status-changing work.
    pools: StagePools,
    /// Local job runner feeding the reconciler.
    runner: Arc<ProcessJobRunner>,
    /// Components in start order.
    modules: ModuleRegistry,
    /// Current leadership of this replica.
    leader: LeaderHandle,
    /// Inbound notification entry point.
    intake: EventIntake<InMemoryStore>,
    /// Shutdown broadcast sender (signals background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - Any component fails to initialize
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = SbomerConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: SbomerConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let store = Arc::new(InMemoryStore::new());
        let bus = MessageBus::new(config.worker.queue_capacity);
        let pools = StagePools::new(config.worker.max_concurrency);
        let mut registry = ModuleRegistry::new();

        let (elector, leader) = modules::leader::init(&config)?;
        if let Some(elector) = elector {
            registry.register(elector);
        }

        let (reconciler, observations) =
            modules::reconciler::init(&config, Arc::clone(&store), bus.clone())?;
        registry.register(reconciler);
        let runner = Arc::new(ProcessJobRunner::new(observations));

        registry.register(modules::scheduler::init(
            &config,
            Arc::clone(&store),
            bus.clone(),
            pools.scheduling.clone(),
            pools.aggregation.clone(),
            leader.clone(),
        )?);
        registry.register(modules::generator::init(
            &config,
            Arc::clone(&store),
            bus.clone(),
            pools.generation.clone(),
            Arc::clone(&runner),
        )?);
        registry.register(modules::resolver::init(
            &config,
            Arc::clone(&store),
            bus.clone(),
            pools.resolution.clone(),
        )?);

        let intake = EventIntake::new(Arc::clone(&store), bus);
        let (shutdown_tx, _) = broadcast::channel(4);

        tracing::info!(
            identity = %config.general.identity,
            modules = ?registry.names(),
            "orchestrator initialized"
        );

        if config.metrics.enabled {
            metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
        }

        Ok(Self {
            config,
            store,
            pools,
            runner,
            modules: registry,
            leader,
            intake,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start all modules in dependency order.
    ///
    /// On failure, already-started modules are stopped again.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("starting all modules");
        if let Err(e) = self.modules.start_all().await {
            tracing::warn!("startup failed, rolling back already-started modules");
            if let Err(stop_err) = self.modules.stop_all().await {
                tracing::error!(
                    startup_error = %e,
                    rollback_error = %stop_err,
                    "rollback also failed during startup failure cleanup"
                );
            }
            return Err(e);
        }

        if self.config.metrics.enabled {
            spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe());
        }
        Ok(())
    }

    /// Start all modules and block until a shutdown signal is received.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Kubernetes, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        tracing::info!("sbomer-daemon running");
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        self.shutdown().await
    }

    /// Stop all modules in reverse order and drain in-flight work.
    pub async fn shutdown(&mut self) -> Result<()> {
        let _ = self.shutdown_tx.send(());

        tracing::info!("stopping all modules");
        let stopped = self.modules.stop_all().await;

        let grace = Duration::from_secs(self.config.worker.shutdown_grace_secs);
        for pool in self.pools.all() {
            if !pool.shutdown(grace).await {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "worker pool did not drain within grace period"
                );
            }
        }
        if !self.runner.shutdown(grace).await {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "local jobs did not finish within grace period"
            );
        }

        tracing::info!("sbomer-daemon shut down");
        stopped
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let modules = self.modules.health_statuses().await;
        DaemonHealth {
            status: aggregate_status(&modules),
            leader: self.leader.is_leader(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            modules,
        }
    }

    /// Entry point for inbound notifications.
    pub fn intake(&self) -> &EventIntake<InMemoryStore> {
        &self.intake
    }

    /// Shared store, for inspection.
    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    /// Whether this replica currently leads.
    pub fn is_leader(&self) -> bool {
        self.leader.is_leader()
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &SbomerConfig {
        &self.config
    }
}

/// Worker pools, one per pipeline stage.
struct StagePools {
    resolution: WorkerPool,
    scheduling: WorkerPool,
    generation: WorkerPool,
    aggregation: WorkerPool,
}

impl StagePools {
    fn new(max_concurrency: usize) -> Self {
        Self {
            resolution: WorkerPool::new("resolution", max_concurrency),
            scheduling: WorkerPool::new("scheduling", max_concurrency),
            generation: WorkerPool::new("generation", max_concurrency),
            aggregation: WorkerPool::new("aggregation", max_concurrency),
        }
    }

    /// Pools in pipeline order, for draining.
    fn all(&self) -> [&WorkerPool; 4] {
        [
            &self.resolution,
            &self.scheduling,
            &self.generation,
            &self.aggregation,
        ]
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(start_time: Instant, mut shutdown_rx: broadcast::Receiver<()>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    });
}
