//! 스케줄러 — 해석된 Event의 Generation을 배정하고 Event 상태를 집계
//!
//! ```text
//! EventResolved ──(리더만)──> schedule
//!     0개      → PROCESSED ("no generations required")
//!     그 외    → INITIALIZING → GenerationScheduled × NEW → INITIALIZED
//!
//! GenerationStatusChanged ──> aggregate → PROCESSING | PROCESSED | ERROR
//!
//! sweep (리더만, 주기적)
//!     오래된 NEW Event          → ResolveRequested 재발행
//!     RESOLVED/INITIALIZING     → schedule
//!     INITIALIZED/PROCESSING    → 오래된 NEW Generation 재배정 + 재집계
//!     오래된 종료 Event         → 보관
//! ```
//!
//! 모든 상태 변경은 상태 가드를 거치므로 리더 인계 중의 중복 실행은 무해합니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sbomer_core::bus::{MessageBus, spawn_dispatcher};
use sbomer_core::config::SchedulerConfig;
use sbomer_core::error::{PipelineError, SbomerError, StoreError};
use sbomer_core::message::{
    EventResolved, GenerationScheduled, GenerationStatusChanged, MODULE_SCHEDULER,
    ResolveRequested,
};
use sbomer_core::metrics as m;
use sbomer_core::pipeline::{HealthStatus, Pipeline, ServiceState};
use sbomer_core::status::{EventStatus, GenerationStatus, LifecycleStatus};
use sbomer_core::store::{Store, TransitionOutcome};
use sbomer_core::types::Event;
use sbomer_core::worker::WorkerPool;
use sbomer_leader::LeaderHandle;

use crate::aggregate::aggregate;
use crate::error::SchedulerError;

/// Generation이 필요 없는 Event의 PROCESSED 사유
pub const NO_GENERATIONS_REASON: &str = "no generations required";

/// 배정 시도 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Generation을 배정하고 INITIALIZED로 전이함
    Scheduled { generations: usize },
    /// Generation이 없어 바로 PROCESSED로 전이함
    NothingToDo,
    /// 배정 단계가 아님 (이미 진행되었거나 종료됨)
    Skipped { current: EventStatus },
    /// 리더가 아님
    NotLeader,
}

/// 스윕 한 번의 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// 해석 요청을 재발행한 Event 수
    pub resolve_requested: usize,
    /// 배정한 Event 수
    pub scheduled: usize,
    /// 재배정한 Generation 수
    pub rescheduled: usize,
    /// 상태가 갱신된 Event 수 (재집계)
    pub aggregated: usize,
    /// 보관한 Event 수
    pub archived: usize,
}

/// 스케줄러 시간 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub sweep_interval: Duration,
    pub stale_after: Duration,
    /// 0이면 보관 비활성
    pub archive_after: Duration,
}

impl SchedulerSettings {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            stale_after: Duration::from_secs(config.stale_after_secs),
            archive_after: Duration::from_secs(config.archive_after_secs),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

fn age(since: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(since).unwrap_or_default()
}

fn record_terminal(status: EventStatus) {
    metrics::counter!(m::EVENTS_TERMINAL_TOTAL, m::LABEL_STATUS => status.as_str()).increment(1);
}

struct Scheduling<S> {
    store: Arc<S>,
    bus: MessageBus,
    leader: LeaderHandle,
    settings: SchedulerSettings,
    scheduled: AtomicU64,
    completed: AtomicU64,
    sweeps: AtomicU64,
}

impl<S: Store> Scheduling<S> {
    async fn on_resolved(&self, message: EventResolved) {
        match self.schedule(&message.event_id).await {
            Ok(outcome) => debug!(event_id = %message.event_id, ?outcome, "resolved event handled"),
            Err(e) => error!(event_id = %message.event_id, error = %e, "failed to schedule event"),
        }
    }

    async fn on_status_changed(&self, message: GenerationStatusChanged) {
        if let Err(e) = self.aggregate(&message.event_id).await {
            error!(
                event_id = %message.event_id,
                generation_id = %message.generation_id,
                error = %e,
                "failed to aggregate event status"
            );
        }
    }

    async fn schedule(&self, event_id: &str) -> Result<ScheduleOutcome, SchedulerError> {
        if !self.leader.is_leader() {
            debug!(event_id, "not leader, leaving event to the leader");
            return Ok(ScheduleOutcome::NotLeader);
        }

        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                kind: "event",
                id: event_id.to_owned(),
            })?;
        if !matches!(event.status, EventStatus::Resolved | EventStatus::Initializing) {
            return Ok(ScheduleOutcome::Skipped {
                current: event.status,
            });
        }

        let generations = self.store.generations_for_event(event_id).await?;
        if generations.is_empty() {
            let outcome = self
                .store
                .transition_event(
                    event_id,
                    EventStatus::Processed,
                    Some(NO_GENERATIONS_REASON.to_owned()),
                )
                .await?;
            return Ok(match outcome {
                TransitionOutcome::Applied { .. } => {
                    self.completed.fetch_add(1, Ordering::Relaxed);
                    record_terminal(EventStatus::Processed);
                    info!(event_id, "event processed, no generations required");
                    ScheduleOutcome::NothingToDo
                }
                TransitionOutcome::Rejected { current } => ScheduleOutcome::Skipped { current },
            });
        }

        // 배정 도중 중단된 INITIALIZING Event는 이어서 진행
        if let TransitionOutcome::Rejected { current } = self
            .store
            .transition_event(event_id, EventStatus::Initializing, None)
            .await?
        {
            if current != EventStatus::Initializing {
                return Ok(ScheduleOutcome::Skipped { current });
            }
        }

        let mut count = 0;
        for generation in generations
            .iter()
            .filter(|g| g.status == GenerationStatus::New)
        {
            self.publish_scheduled(&generation.id, event_id).await;
            count += 1;
        }

        self.store
            .transition_event(event_id, EventStatus::Initialized, None)
            .await?;
        self.scheduled.fetch_add(1, Ordering::Relaxed);
        info!(event_id, generations = count, "event scheduled");
        Ok(ScheduleOutcome::Scheduled { generations: count })
    }

    /// Event 상태를 Generation 상태로부터 다시 계산합니다. 변경되면 `true`.
    async fn aggregate(&self, event_id: &str) -> Result<bool, SchedulerError> {
        let generations = self.store.generations_for_event(event_id).await?;
        let Some(target) = aggregate(&generations) else {
            return Ok(false);
        };

        match self
            .store
            .transition_event(event_id, target.status, target.reason.clone())
            .await?
        {
            TransitionOutcome::Applied { previous } => {
                if target.status.is_terminal() {
                    self.completed.fetch_add(1, Ordering::Relaxed);
                    record_terminal(target.status);
                }
                info!(
                    event_id,
                    from = %previous,
                    to = %target.status,
                    reason = target.reason.as_deref().unwrap_or(""),
                    "event status aggregated"
                );
                Ok(true)
            }
            TransitionOutcome::Rejected { .. } => Ok(false),
        }
    }

    async fn sweep_at(&self, now: SystemTime) -> Result<Option<SweepReport>, SchedulerError> {
        if !self.leader.is_leader() {
            debug!("not leader, skipping sweep");
            return Ok(None);
        }
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        let stale_after = self.settings.stale_after;
        let mut report = SweepReport::default();

        for event in self.store.events_with_status(EventStatus::New).await? {
            if age(event.created_at, now) >= stale_after {
                let message = ResolveRequested::new(&event.id, MODULE_SCHEDULER);
                match self.bus.resolve_requested.publish(message).await {
                    Ok(_) => report.resolve_requested += 1,
                    Err(e) => warn!(event_id = %event.id, error = %e, "failed to republish resolve request"),
                }
            }
        }

        for status in [EventStatus::Resolved, EventStatus::Initializing] {
            for event in self.store.events_with_status(status).await? {
                match self.schedule(&event.id).await {
                    Ok(ScheduleOutcome::Scheduled { .. } | ScheduleOutcome::NothingToDo) => {
                        report.scheduled += 1;
                    }
                    Ok(_) => {}
                    Err(e) => warn!(event_id = %event.id, error = %e, "sweep failed to schedule event"),
                }
            }
        }

        for status in [EventStatus::Initialized, EventStatus::Processing] {
            for event in self.store.events_with_status(status).await? {
                match self.reschedule_stale(&event, now).await {
                    Ok(count) => report.rescheduled += count,
                    Err(e) => warn!(event_id = %event.id, error = %e, "sweep failed to reschedule generations"),
                }
                match self.aggregate(&event.id).await {
                    Ok(true) => report.aggregated += 1,
                    Ok(false) => {}
                    Err(e) => warn!(event_id = %event.id, error = %e, "sweep failed to aggregate event"),
                }
            }
        }

        if !self.settings.archive_after.is_zero() {
            report.archived = self.archive_terminal(now).await?;
        }

        if report != SweepReport::default() {
            info!(?report, "sweep finished");
        } else {
            debug!("sweep found nothing to do");
        }
        Ok(Some(report))
    }

    async fn reschedule_stale(&self, event: &Event, now: SystemTime) -> Result<usize, SchedulerError> {
        let mut count = 0;
        for generation in self.store.generations_for_event(&event.id).await? {
            if generation.status == GenerationStatus::New
                && age(generation.updated_at, now) >= self.settings.stale_after
            {
                debug!(generation_id = %generation.id, "rescheduling stale generation");
                self.publish_scheduled(&generation.id, &event.id).await;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn archive_terminal(&self, now: SystemTime) -> Result<usize, SchedulerError> {
        let mut count = 0;
        for status in EventStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for event in self.store.events_with_status(status).await? {
                if age(event.updated_at, now) < self.settings.archive_after {
                    continue;
                }
                match self.store.archive_event(&event.id).await {
                    Ok(()) => {
                        metrics::counter!(m::EVENTS_ARCHIVED_TOTAL).increment(1);
                        debug!(event_id = %event.id, status = %status, "event archived");
                        count += 1;
                    }
                    Err(e) => warn!(event_id = %event.id, error = %e, "failed to archive event"),
                }
            }
        }
        Ok(count)
    }

    async fn publish_scheduled(&self, generation_id: &str, event_id: &str) {
        let message = GenerationScheduled::new(generation_id, event_id);
        if let Err(e) = self.bus.generation_scheduled.publish(message).await {
            warn!(generation_id, event_id, error = %e, "failed to publish generation schedule");
        }
    }
}

/// 스케줄러
///
/// `stop()` 후 재시작이 필요하면 [`SchedulerBuilder`]로 새 인스턴스를 생성해야 합니다.
pub struct Scheduler<S> {
    state: ServiceState,
    inner: Arc<Scheduling<S>>,
    pool: WorkerPool,
    aggregate_pool: WorkerPool,
    resolved: Option<mpsc::Receiver<EventResolved>>,
    status_changed: Option<mpsc::Receiver<GenerationStatusChanged>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<S: Store> Scheduler<S> {
    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        self.state.name()
    }

    /// 배정한 Event 수
    pub fn scheduled_count(&self) -> u64 {
        self.inner.scheduled.load(Ordering::Relaxed)
    }

    /// 종료 상태로 전이시킨 Event 수
    pub fn completed_count(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }

    /// 실행한 스윕 수 (리더가 아니어서 건너뛴 스윕 제외)
    pub fn sweep_count(&self) -> u64 {
        self.inner.sweeps.load(Ordering::Relaxed)
    }

    /// Event 하나를 즉시 배정합니다.
    pub async fn schedule(&self, event_id: &str) -> Result<ScheduleOutcome, SchedulerError> {
        self.inner.schedule(event_id).await
    }

    /// Event 상태를 즉시 재집계합니다. 변경되면 `true`.
    pub async fn aggregate(&self, event_id: &str) -> Result<bool, SchedulerError> {
        self.inner.aggregate(event_id).await
    }

    /// `now` 시각 기준으로 스윕을 한 번 실행합니다. 리더가 아니면 `None`.
    pub async fn sweep_at(&self, now: SystemTime) -> Result<Option<SweepReport>, SchedulerError> {
        self.inner.sweep_at(now).await
    }
}

impl<S: Store> Pipeline for Scheduler<S> {
    async fn start(&mut self) -> Result<(), SbomerError> {
        if self.state == ServiceState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        let resolved = self
            .resolved
            .take()
            .ok_or_else(|| PipelineError::ReceiverTaken("event_resolved".to_owned()))?;
        let status_changed = self
            .status_changed
            .take()
            .ok_or_else(|| PipelineError::ReceiverTaken("generation_status_changed".to_owned()))?;

        info!(
            sweep_interval_secs = self.inner.settings.sweep_interval.as_secs(),
            "starting scheduler"
        );

        let inner = Arc::clone(&self.inner);
        self.tasks.push(spawn_dispatcher(
            "schedule",
            resolved,
            self.pool.clone(),
            self.cancel.clone(),
            move |message: EventResolved| {
                let inner = Arc::clone(&inner);
                async move { inner.on_resolved(message).await }
            },
        ));

        let inner = Arc::clone(&self.inner);
        self.tasks.push(spawn_dispatcher(
            "aggregate",
            status_changed,
            self.aggregate_pool.clone(),
            self.cancel.clone(),
            move |message: GenerationStatusChanged| {
                let inner = Arc::clone(&inner);
                async move { inner.on_status_changed(message).await }
            },
        ));

        let inner = Arc::clone(&self.inner);
        let cancel = self.cancel.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.settings.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut leader = inner.leader.clone();
            let mut watching = true;
            loop {
                let sweep = tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => true,
                    changed = leader.changed(), if watching => match changed {
                        Some(became_leader) => became_leader,
                        None => {
                            watching = false;
                            false
                        }
                    },
                };
                if sweep {
                    if let Err(e) = inner.sweep_at(SystemTime::now()).await {
                        error!(error = %e, "sweep failed");
                    }
                }
            }
            debug!("sweep loop stopped");
        }));

        self.state = ServiceState::Running;
        info!("scheduler started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SbomerError> {
        if self.state != ServiceState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping scheduler");
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }

        self.state = ServiceState::Stopped;
        info!("scheduler stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        if let Some(idle) = self.state.idle_health() {
            return idle;
        }
        if self.tasks.iter().any(JoinHandle::is_finished) {
            return HealthStatus::Unhealthy("scheduler task exited".to_owned());
        }
        HealthStatus::Healthy
    }
}

/// 스케줄러 빌더
pub struct SchedulerBuilder<S> {
    store: Arc<S>,
    bus: MessageBus,
    leader: LeaderHandle,
    settings: SchedulerSettings,
    pool: Option<WorkerPool>,
    aggregate_pool: Option<WorkerPool>,
}

impl<S: Store> SchedulerBuilder<S> {
    /// 새 빌더를 생성합니다.
    pub fn new(store: Arc<S>, bus: MessageBus, leader: LeaderHandle) -> Self {
        Self {
            store,
            bus,
            leader,
            settings: SchedulerSettings::default(),
            pool: None,
            aggregate_pool: None,
        }
    }

    /// 시간 설정을 지정합니다.
    pub fn settings(mut self, settings: SchedulerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 배정 작업용 워커 풀을 지정합니다.
    pub fn worker_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// 집계 작업용 워커 풀을 지정합니다.
    ///
    /// 집계는 아무것도 발행하지 않으므로 배정 풀과 분리해 두면
    /// 풀이 가득 찬 단계들이 서로를 기다리는 순환이 생기지 않습니다.
    pub fn aggregate_pool(mut self, pool: WorkerPool) -> Self {
        self.aggregate_pool = Some(pool);
        self
    }

    /// 스케줄러를 빌드하고 `event_resolved`, `generation_status_changed` 토픽을 구독합니다.
    pub fn build(self) -> Result<Scheduler<S>, SchedulerError> {
        if self.settings.sweep_interval.is_zero() {
            return Err(SchedulerError::Config {
                field: "scheduler.sweep_interval_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let resolved = self.bus.event_resolved.subscribe()?;
        let status_changed = self.bus.generation_status_changed.subscribe()?;
        let pool = self
            .pool
            .unwrap_or_else(|| WorkerPool::new("scheduler", 16));
        let aggregate_pool = self
            .aggregate_pool
            .unwrap_or_else(|| WorkerPool::new("aggregate", pool.max_concurrency()));

        Ok(Scheduler {
            state: ServiceState::Initialized,
            inner: Arc::new(Scheduling {
                store: self.store,
                bus: self.bus,
                leader: self.leader,
                settings: self.settings,
                scheduled: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                sweeps: AtomicU64::new(0),
            }),
            pool,
            aggregate_pool,
            resolved: Some(resolved),
            status_changed: Some(status_changed),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use sbomer_core::store::InMemoryStore;

    use super::*;

    fn builder() -> SchedulerBuilder<InMemoryStore> {
        SchedulerBuilder::new(
            Arc::new(InMemoryStore::new()),
            MessageBus::new(8),
            LeaderHandle::always(),
        )
    }

    #[test]
    fn settings_from_default_config() {
        let settings = SchedulerSettings::default();
        assert_eq!(settings.sweep_interval, Duration::from_secs(30));
        assert_eq!(settings.stale_after, Duration::from_secs(120));
        assert!(settings.archive_after.is_zero());
    }

    #[test]
    fn builder_rejects_zero_sweep_interval() {
        let settings = SchedulerSettings {
            sweep_interval: Duration::ZERO,
            ..SchedulerSettings::default()
        };
        assert!(matches!(
            builder().settings(settings).build(),
            Err(SchedulerError::Config { .. })
        ));
    }

    #[test]
    fn age_saturates_for_future_timestamps() {
        let now = SystemTime::now();
        assert_eq!(age(now + Duration::from_secs(5), now), Duration::ZERO);
        assert_eq!(age(now, now + Duration::from_secs(5)), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn lifecycle() {
        let mut scheduler = builder().build().unwrap();
        assert!(scheduler.health_check().await.is_unhealthy());

        scheduler.start().await.unwrap();
        assert_eq!(scheduler.state_name(), "running");
        assert!(scheduler.health_check().await.is_healthy());
        assert!(scheduler.start().await.is_err());

        scheduler.stop().await.unwrap();
        assert!(scheduler.start().await.is_err());
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let scheduler = builder().build().unwrap();
        let err = scheduler.schedule("missing").await.unwrap_err();
        assert!(matches!(err, SchedulerError::Store(StoreError::NotFound { .. })));
    }
}
