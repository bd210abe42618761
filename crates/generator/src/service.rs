//! 생성 서비스 — `GenerationScheduled` 메시지를 받아 Generation을 처리
//!
//! [`GenerationService`]는 core의 [`Pipeline`] trait을 구현합니다.
//!
//! # 처리 순서
//!
//! ```text
//! GenerationScheduled --> dispatcher --> WorkerPool
//!                                           |
//!   (a) 대상 유형으로 generator 선택 (없으면 NEW 유지)
//!   (b) NEW → GENERATING                    --> GenerationStatusChanged
//!   (c) generator.generate()                (격리 태스크 + 제한 시간)
//!   (d) Completed  → FINISHED + Manifest    --> GenerationStatusChanged
//!       Dispatched → GENERATING 유지 (조정 브리지가 종료 상태 설정)
//!       실패       → FAILED + 사유          --> GenerationStatusChanged
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sbomer_core::bus::{MessageBus, spawn_dispatcher};
use sbomer_core::error::{PipelineError, SbomerError, StoreError};
use sbomer_core::message::{GenerationScheduled, GenerationStatusChanged, MODULE_GENERATOR};
use sbomer_core::metrics as m;
use sbomer_core::pipeline::{HealthStatus, Pipeline, ServiceState};
use sbomer_core::status::GenerationStatus;
use sbomer_core::store::{Store, TransitionOutcome};
use sbomer_core::worker::{WorkerPool, run_isolated};

use crate::error::GeneratorError;
use crate::generator::GeneratorOutcome;
use crate::registry::GeneratorRegistry;

/// 기본 generator 호출 제한 시간
pub const DEFAULT_GENERATE_TIMEOUT: Duration = Duration::from_secs(600);

/// 한 번의 생성 시도 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// 외부 잡으로 위임됨 (GENERATING 유지)
    Dispatched { job_name: String },
    /// FINISHED로 전이됨
    Finished { manifests: usize },
    /// FAILED로 전이됨
    Failed { reason: String },
    /// 처리할 generator 없음 (NEW 유지)
    Unsupported,
    /// 이미 진행되었거나 종료된 Generation (변경 없음)
    Skipped { current: GenerationStatus },
}

struct Generating<S> {
    store: Arc<S>,
    bus: MessageBus,
    registry: GeneratorRegistry,
    timeout: Duration,
    dispatched: AtomicU64,
    finished: AtomicU64,
    failed: AtomicU64,
}

impl<S: Store> Generating<S> {
    async fn handle(&self, message: GenerationScheduled) {
        match self.process(&message.generation_id).await {
            Ok(outcome) => {
                debug!(generation_id = %message.generation_id, ?outcome, "generation handled");
            }
            Err(e) => {
                error!(
                    generation_id = %message.generation_id,
                    error = %e,
                    "generation failed to process"
                );
            }
        }
    }

    async fn process(&self, generation_id: &str) -> Result<GenerationOutcome, GeneratorError> {
        let generation = self
            .store
            .get_generation(generation_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                kind: "generation",
                id: generation_id.to_owned(),
            })?;

        let Some(generator) = self.registry.find_for(&generation.request) else {
            debug!(
                generation_id,
                target_type = %generation.target_type(),
                "no generator accepts this request"
            );
            return Ok(GenerationOutcome::Unsupported);
        };
        let generator_name = generator.name().to_owned();
        let event_id = generation.event_id.clone();

        match self
            .store
            .transition_generation(generation_id, GenerationStatus::Generating, None)
            .await?
        {
            TransitionOutcome::Applied { .. } => {
                self.publish(generation_id, &event_id, GenerationStatus::Generating)
                    .await;
            }
            TransitionOutcome::Rejected { current } => {
                return Ok(GenerationOutcome::Skipped { current });
            }
        }
        info!(generation_id, generator = %generator_name, "generating");

        let started = Instant::now();
        let result = run_isolated(self.timeout, async move {
            generator.generate(&generation).await
        })
        .await;
        metrics::histogram!(m::GENERATION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(Ok(GeneratorOutcome::Dispatched { job_name })) => {
                self.dispatched.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::DISPATCHES_TOTAL, m::LABEL_NAME => generator_name.clone())
                    .increment(1);
                info!(generation_id, job = %job_name, "generation dispatched to external job");
                Ok(GenerationOutcome::Dispatched { job_name })
            }
            Ok(Ok(GeneratorOutcome::Completed { manifests })) => {
                let count = manifests.len();
                match self
                    .store
                    .finish_generation(generation_id, manifests, None)
                    .await?
                {
                    TransitionOutcome::Applied { .. } => {
                        self.finished.fetch_add(1, Ordering::Relaxed);
                        record_terminal(GenerationStatus::Finished);
                        info!(generation_id, manifests = count, "generation finished");
                        self.publish(generation_id, &event_id, GenerationStatus::Finished)
                            .await;
                        Ok(GenerationOutcome::Finished { manifests: count })
                    }
                    TransitionOutcome::Rejected { current } => {
                        Ok(GenerationOutcome::Skipped { current })
                    }
                }
            }
            Ok(Err(e)) => self.fail(generation_id, &event_id, e.to_string()).await,
            Err(failure) => {
                let e = GeneratorError::from(failure);
                self.fail(generation_id, &event_id, e.to_string()).await
            }
        }
    }

    async fn fail(
        &self,
        generation_id: &str,
        event_id: &str,
        reason: String,
    ) -> Result<GenerationOutcome, GeneratorError> {
        match self
            .store
            .transition_generation(generation_id, GenerationStatus::Failed, Some(reason.clone()))
            .await?
        {
            TransitionOutcome::Applied { .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                record_terminal(GenerationStatus::Failed);
                warn!(generation_id, reason = %reason, "generation failed");
                self.publish(generation_id, event_id, GenerationStatus::Failed)
                    .await;
                Ok(GenerationOutcome::Failed { reason })
            }
            TransitionOutcome::Rejected { current } => Ok(GenerationOutcome::Skipped { current }),
        }
    }

    async fn publish(&self, generation_id: &str, event_id: &str, status: GenerationStatus) {
        let message =
            GenerationStatusChanged::new(generation_id, event_id, status, MODULE_GENERATOR);
        if let Err(e) = self.bus.generation_status_changed.publish(message).await {
            warn!(generation_id, status = %status, error = %e, "failed to publish status change");
        }
    }
}

fn record_terminal(status: GenerationStatus) {
    metrics::counter!(m::GENERATIONS_TERMINAL_TOTAL, m::LABEL_STATUS => status.as_str())
        .increment(1);
}

/// 생성 서비스
///
/// `stop()` 후 재시작이 필요하면 [`GenerationServiceBuilder`]로 새 인스턴스를 생성해야 합니다.
pub struct GenerationService<S> {
    state: ServiceState,
    inner: Arc<Generating<S>>,
    pool: WorkerPool,
    scheduled: Option<mpsc::Receiver<GenerationScheduled>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<S: Store> GenerationService<S> {
    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        self.state.name()
    }

    /// 외부 잡으로 위임한 Generation 수
    pub fn dispatched_count(&self) -> u64 {
        self.inner.dispatched.load(Ordering::Relaxed)
    }

    /// FINISHED로 전이시킨 Generation 수
    pub fn finished_count(&self) -> u64 {
        self.inner.finished.load(Ordering::Relaxed)
    }

    /// FAILED로 전이시킨 Generation 수
    pub fn failed_count(&self) -> u64 {
        self.inner.failed.load(Ordering::Relaxed)
    }

    /// 지원하는 대상 유형
    pub fn supported_target_types(&self) -> Vec<String> {
        self.inner.registry.supported_target_types()
    }

    /// Generation 하나를 즉시 처리합니다 (버스를 거치지 않는 직접 호출).
    pub async fn process(&self, generation_id: &str) -> Result<GenerationOutcome, GeneratorError> {
        self.inner.process(generation_id).await
    }
}

impl<S: Store> Pipeline for GenerationService<S> {
    async fn start(&mut self) -> Result<(), SbomerError> {
        if self.state == ServiceState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        let scheduled = self
            .scheduled
            .take()
            .ok_or_else(|| PipelineError::ReceiverTaken("generation_scheduled".to_owned()))?;

        info!(generators = ?self.inner.registry.names(), "starting generation service");

        let inner = Arc::clone(&self.inner);
        let task = spawn_dispatcher(
            "generation",
            scheduled,
            self.pool.clone(),
            self.cancel.clone(),
            move |message: GenerationScheduled| {
                let inner = Arc::clone(&inner);
                async move { inner.handle(message).await }
            },
        );
        self.tasks.push(task);

        self.state = ServiceState::Running;
        info!("generation service started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SbomerError> {
        if self.state != ServiceState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping generation service");
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }

        self.state = ServiceState::Stopped;
        info!("generation service stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        if let Some(idle) = self.state.idle_health() {
            return idle;
        }
        if self.tasks.iter().any(JoinHandle::is_finished) {
            return HealthStatus::Unhealthy("dispatcher exited".to_owned());
        }
        if self.inner.registry.is_empty() {
            return HealthStatus::Degraded("no generators registered".to_owned());
        }
        HealthStatus::Healthy
    }
}

/// 생성 서비스 빌더
pub struct GenerationServiceBuilder<S> {
    store: Arc<S>,
    bus: MessageBus,
    registry: GeneratorRegistry,
    timeout: Duration,
    pool: Option<WorkerPool>,
}

impl<S: Store> GenerationServiceBuilder<S> {
    /// 새 빌더를 생성합니다.
    pub fn new(store: Arc<S>, bus: MessageBus) -> Self {
        Self {
            store,
            bus,
            registry: GeneratorRegistry::new(),
            timeout: DEFAULT_GENERATE_TIMEOUT,
            pool: None,
        }
    }

    /// generator 레지스트리를 지정합니다.
    pub fn registry(mut self, registry: GeneratorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// generator 호출 제한 시간을 지정합니다.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 공유 워커 풀을 지정합니다.
    pub fn worker_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// 서비스를 빌드하고 `generation_scheduled` 토픽을 구독합니다.
    pub fn build(self) -> Result<GenerationService<S>, GeneratorError> {
        if self.timeout.is_zero() {
            return Err(GeneratorError::Config {
                field: "generator.timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let scheduled = self.bus.generation_scheduled.subscribe()?;
        let pool = self
            .pool
            .unwrap_or_else(|| WorkerPool::new("generator", 16));

        Ok(GenerationService {
            state: ServiceState::Initialized,
            inner: Arc::new(Generating {
                store: self.store,
                bus: self.bus,
                registry: self.registry,
                timeout: self.timeout,
                dispatched: AtomicU64::new(0),
                finished: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
            pool,
            scheduled: Some(scheduled),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }
}
