//! 해석 서비스 — `ResolveRequested` 메시지를 받아 Event를 해석
//!
//! [`ResolutionService`]는 core의 [`Pipeline`] trait을 구현하여
//! 데몬에서 다른 모듈과 동일한 생명주기로 관리됩니다.
//!
//! # 처리 순서
//!
//! ```text
//! ResolveRequested --> dispatcher --> WorkerPool
//!                                        |
//!            +---------------------------+
//!            |
//!   (a) 라우팅 키로 resolver 선택 (없으면 IGNORED)
//!   (b) NEW → RESOLVING            (짧은 전이)
//!   (c) resolver.resolve()         (트랜잭션 밖, 격리 태스크 + 제한 시간)
//!   (d) RESOLVED + Generation 저장 (짧은 전이) --> EventResolved
//!       실패 시 ERROR + 사유
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
use sbomer_core::message::{EventResolved, ResolveRequested};
use sbomer_core::metrics as m;
use sbomer_core::pipeline::{HealthStatus, Pipeline, ServiceState};
use sbomer_core::status::EventStatus;
use sbomer_core::store::{Store, TransitionOutcome};
use sbomer_core::types::Generation;
use sbomer_core::worker::{WorkerPool, run_isolated};

use crate::error::ResolverError;
use crate::registry::ResolverRegistry;

/// 기본 resolver 호출 제한 시간
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(300);

/// 한 번의 해석 시도 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// RESOLVED로 전이되고 Generation이 생성됨
    Resolved { generation_ids: Vec<String> },
    /// 담당 resolver가 없어 IGNORED로 전이됨
    Ignored,
    /// 이미 진행되었거나 종료된 Event (변경 없음)
    Skipped { current: EventStatus },
    /// ERROR로 전이됨
    Failed { reason: String },
}

/// 서비스와 워커 태스크가 공유하는 상태
struct Resolution<S> {
    store: Arc<S>,
    bus: MessageBus,
    registry: ResolverRegistry,
    timeout: Duration,
    resolved: AtomicU64,
    ignored: AtomicU64,
    failed: AtomicU64,
}

impl<S: Store> Resolution<S> {
    async fn handle(&self, message: ResolveRequested) {
        match self.process(&message.event_id).await {
            Ok(outcome) => {
                debug!(event_id = %message.event_id, ?outcome, "resolve request handled");
            }
            Err(e) => {
                error!(event_id = %message.event_id, error = %e, "resolve request failed");
            }
        }
    }

    async fn process(&self, event_id: &str) -> Result<ResolutionOutcome, ResolverError> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                kind: "event",
                id: event_id.to_owned(),
            })?;

        let Some(resolver) = self.registry.find_for(&event) else {
            let reason = format!(
                "no resolver registered for '{}'",
                event.resolver_key().unwrap_or_default()
            );
            return match self
                .store
                .transition_event(event_id, EventStatus::Ignored, Some(reason.clone()))
                .await?
            {
                TransitionOutcome::Applied { .. } => {
                    self.ignored.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(
                        m::EVENTS_TERMINAL_TOTAL,
                        m::LABEL_STATUS => EventStatus::Ignored.as_str()
                    )
                    .increment(1);
                    info!(event_id, reason = %reason, "event ignored");
                    Ok(ResolutionOutcome::Ignored)
                }
                TransitionOutcome::Rejected { current } => {
                    Ok(ResolutionOutcome::Skipped { current })
                }
            };
        };

        let resolver_name = resolver.name().to_owned();
        let Some(identifier) = event.identifier().map(str::to_owned) else {
            return self
                .fail(event_id, &resolver_name, "event has no identifier".to_owned())
                .await;
        };

        if let TransitionOutcome::Rejected { current } = self
            .store
            .transition_event(event_id, EventStatus::Resolving, None)
            .await?
        {
            debug!(event_id, current = %current, "event already past resolution");
            return Ok(ResolutionOutcome::Skipped { current });
        }
        info!(event_id, resolver = %resolver_name, "resolving event");

        let started = Instant::now();
        let task_event_id = event_id.to_owned();
        let result = run_isolated(self.timeout, async move {
            resolver.resolve(&task_event_id, &identifier).await
        })
        .await;
        metrics::histogram!(m::RESOLUTION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        let requests = match result {
            Ok(Ok(requests)) => requests,
            Ok(Err(e)) => return self.fail(event_id, &resolver_name, e.to_string()).await,
            Err(failure) => {
                let e = ResolverError::from(failure);
                return self.fail(event_id, &resolver_name, e.to_string()).await;
            }
        };

        let generations: Vec<Generation> = requests
            .into_iter()
            .map(|request| Generation::new(event_id, request))
            .collect();
        let generation_ids: Vec<String> = generations.iter().map(|g| g.id.clone()).collect();

        match self.store.resolve_event(event_id, generations, None).await? {
            TransitionOutcome::Applied { .. } => {
                self.resolved.fetch_add(1, Ordering::Relaxed);
                info!(
                    event_id,
                    resolver = %resolver_name,
                    generations = generation_ids.len(),
                    "event resolved"
                );
                if let Err(e) = self
                    .bus
                    .event_resolved
                    .publish(EventResolved::new(event_id, generation_ids.clone()))
                    .await
                {
                    warn!(event_id, error = %e, "failed to publish event resolved");
                }
                Ok(ResolutionOutcome::Resolved { generation_ids })
            }
            TransitionOutcome::Rejected { current } => Ok(ResolutionOutcome::Skipped { current }),
        }
    }

    async fn fail(
        &self,
        event_id: &str,
        resolver: &str,
        reason: String,
    ) -> Result<ResolutionOutcome, ResolverError> {
        metrics::counter!(m::RESOLUTIONS_FAILED_TOTAL, m::LABEL_NAME => resolver.to_owned())
            .increment(1);
        match self
            .store
            .transition_event(event_id, EventStatus::Error, Some(reason.clone()))
            .await?
        {
            TransitionOutcome::Applied { .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(
                    m::EVENTS_TERMINAL_TOTAL,
                    m::LABEL_STATUS => EventStatus::Error.as_str()
                )
                .increment(1);
                warn!(event_id, resolver, reason = %reason, "event resolution failed");
                Ok(ResolutionOutcome::Failed { reason })
            }
            TransitionOutcome::Rejected { current } => Ok(ResolutionOutcome::Skipped { current }),
        }
    }
}

/// 해석 서비스
///
/// `stop()` 후 재시작이 필요하면 [`ResolutionServiceBuilder`]로 새 인스턴스를 생성해야 합니다.
pub struct ResolutionService<S> {
    state: ServiceState,
    inner: Arc<Resolution<S>>,
    pool: WorkerPool,
    requests: Option<mpsc::Receiver<ResolveRequested>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<S: Store> ResolutionService<S> {
    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        self.state.name()
    }

    /// RESOLVED로 전이시킨 Event 수
    pub fn resolved_count(&self) -> u64 {
        self.inner.resolved.load(Ordering::Relaxed)
    }

    /// IGNORED로 전이시킨 Event 수
    pub fn ignored_count(&self) -> u64 {
        self.inner.ignored.load(Ordering::Relaxed)
    }

    /// ERROR로 전이시킨 Event 수
    pub fn failed_count(&self) -> u64 {
        self.inner.failed.load(Ordering::Relaxed)
    }

    /// 등록된 resolver 라우팅 키
    pub fn resolver_names(&self) -> Vec<String> {
        self.inner.registry.names()
    }

    /// Event 하나를 즉시 해석합니다 (버스를 거치지 않는 직접 호출).
    pub async fn process(&self, event_id: &str) -> Result<ResolutionOutcome, ResolverError> {
        self.inner.process(event_id).await
    }
}

impl<S: Store> Pipeline for ResolutionService<S> {
    async fn start(&mut self) -> Result<(), SbomerError> {
        if self.state == ServiceState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        let requests = self
            .requests
            .take()
            .ok_or_else(|| PipelineError::ReceiverTaken("resolve_requested".to_owned()))?;

        info!(resolvers = ?self.inner.registry.names(), "starting resolution service");

        let inner = Arc::clone(&self.inner);
        let task = spawn_dispatcher(
            "resolution",
            requests,
            self.pool.clone(),
            self.cancel.clone(),
            move |message: ResolveRequested| {
                let inner = Arc::clone(&inner);
                async move { inner.handle(message).await }
            },
        );
        self.tasks.push(task);

        self.state = ServiceState::Running;
        info!("resolution service started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SbomerError> {
        if self.state != ServiceState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping resolution service");
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }

        self.state = ServiceState::Stopped;
        info!("resolution service stopped");
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
            return HealthStatus::Degraded("no resolvers registered".to_owned());
        }
        HealthStatus::Healthy
    }
}

/// 해석 서비스 빌더
pub struct ResolutionServiceBuilder<S> {
    store: Arc<S>,
    bus: MessageBus,
    registry: ResolverRegistry,
    timeout: Duration,
    pool: Option<WorkerPool>,
}

impl<S: Store> ResolutionServiceBuilder<S> {
    /// 새 빌더를 생성합니다.
    pub fn new(store: Arc<S>, bus: MessageBus) -> Self {
        Self {
            store,
            bus,
            registry: ResolverRegistry::new(),
            timeout: DEFAULT_RESOLVE_TIMEOUT,
            pool: None,
        }
    }

    /// resolver 레지스트리를 지정합니다.
    pub fn registry(mut self, registry: ResolverRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// resolver 호출 제한 시간을 지정합니다.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 공유 워커 풀을 지정합니다.
    ///
    /// 설정하지 않으면 전용 풀을 생성합니다.
    pub fn worker_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// 서비스를 빌드하고 `resolve_requested` 토픽을 구독합니다.
    pub fn build(self) -> Result<ResolutionService<S>, ResolverError> {
        if self.timeout.is_zero() {
            return Err(ResolverError::Config {
                field: "resolver.timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let requests = self.bus.resolve_requested.subscribe()?;
        let pool = self
            .pool
            .unwrap_or_else(|| WorkerPool::new("resolver", 16));

        Ok(ResolutionService {
            state: ServiceState::Initialized,
            inner: Arc::new(Resolution {
                store: self.store,
                bus: self.bus,
                registry: self.registry,
                timeout: self.timeout,
                resolved: AtomicU64::new(0),
                ignored: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
            pool,
            requests: Some(requests),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }
}
