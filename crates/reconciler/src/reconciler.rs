//! 잡 조정기 — 외부 잡 관측을 Generation 상태 전이로 변환
//!
//! ```text
//! JobRunner --JobWatchEvent--> mpsc --> JobReconciler
//!                                          |
//!   Pending → GENERATING                   --> GenerationStatusChanged
//!   Success → FINISHED + Manifest(결과 항목)  --> GenerationStatusChanged
//!   Failure → FAILED + 잡의 사유              --> GenerationStatusChanged
//!   Deleted → 기록만
//! ```
//!
//! 관측은 도착 순서대로 하나씩 처리합니다. 종료 상태 이후의 재전송은
//! 상태 가드에 의해 거부되므로 Manifest가 중복되지 않습니다.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sbomer_core::bus::MessageBus;
use sbomer_core::error::{PipelineError, SbomerError};
use sbomer_core::job::{GENERATION_ID_LABEL, JobObservation, JobWatchEvent};
use sbomer_core::message::{GenerationStatusChanged, MODULE_RECONCILER};
use sbomer_core::metrics as m;
use sbomer_core::pipeline::{HealthStatus, Pipeline, ServiceState};
use sbomer_core::status::{GenerationStatus, LifecycleStatus};
use sbomer_core::store::{Store, TransitionOutcome};
use sbomer_core::types::{Generation, ManifestContent};

use crate::error::ReconcilerError;
use crate::outcome::JobOutcome;

/// 기본 관측 채널 용량
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// 관측 한 건의 처리 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// 상태가 전이됨
    Applied { status: GenerationStatus },
    /// 가드에 의해 거부됨 (이미 진행되었거나 종료됨)
    Unchanged { current: GenerationStatus },
    /// 상관 레이블이 없거나 알 수 없는 Generation
    Untracked,
    /// 잡 리소스 제거 (기록만)
    Removed,
}

struct Reconciling<S> {
    store: Arc<S>,
    bus: MessageBus,
    empty_ok_target_types: BTreeSet<String>,
    observed: AtomicU64,
    applied: AtomicU64,
}

impl<S: Store> Reconciling<S> {
    async fn reconcile(&self, event: &JobWatchEvent) -> Result<ReconcileOutcome, ReconcilerError> {
        self.observed.fetch_add(1, Ordering::Relaxed);

        let observation = match event {
            JobWatchEvent::Applied(observation) => observation,
            JobWatchEvent::Deleted { job_name, labels } => {
                metrics::counter!(m::RECONCILER_OBSERVATIONS_TOTAL, m::LABEL_KIND => "deleted")
                    .increment(1);
                debug!(
                    job = %job_name,
                    generation_id = labels.get(GENERATION_ID_LABEL).map(String::as_str).unwrap_or("-"),
                    "job resource removed"
                );
                return Ok(ReconcileOutcome::Removed);
            }
        };

        let outcome = JobOutcome::from_conditions(&observation.conditions);
        metrics::counter!(m::RECONCILER_OBSERVATIONS_TOTAL, m::LABEL_KIND => outcome.kind())
            .increment(1);

        let Some(generation_id) = observation.generation_id() else {
            warn!(job = %observation.job_name, "job has no generation label, ignoring");
            return Ok(ReconcileOutcome::Untracked);
        };
        let Some(generation) = self.store.get_generation(generation_id).await? else {
            warn!(job = %observation.job_name, generation_id, "job refers to unknown generation");
            return Ok(ReconcileOutcome::Untracked);
        };

        debug!(
            job = %observation.job_name,
            generation_id,
            outcome = outcome.kind(),
            "reconciling job observation"
        );

        let (status, result) = match outcome {
            JobOutcome::Pending => (
                GenerationStatus::Generating,
                self.store
                    .transition_generation(generation_id, GenerationStatus::Generating, None)
                    .await?,
            ),
            JobOutcome::Success => self.finish(&generation, observation).await?,
            JobOutcome::Failure { reason } => (
                GenerationStatus::Failed,
                self.store
                    .transition_generation(generation_id, GenerationStatus::Failed, Some(reason))
                    .await?,
            ),
        };

        match result {
            TransitionOutcome::Applied { previous } => {
                self.applied.fetch_add(1, Ordering::Relaxed);
                if status.is_terminal() {
                    metrics::counter!(m::GENERATIONS_TERMINAL_TOTAL, m::LABEL_STATUS => status.as_str())
                        .increment(1);
                }
                info!(
                    job = %observation.job_name,
                    generation_id,
                    from = %previous,
                    to = %status,
                    "generation status reconciled"
                );
                let message = GenerationStatusChanged::new(
                    generation_id,
                    &generation.event_id,
                    status,
                    MODULE_RECONCILER,
                );
                if let Err(e) = self.bus.generation_status_changed.publish(message).await {
                    warn!(generation_id, error = %e, "failed to publish status change");
                }
                Ok(ReconcileOutcome::Applied { status })
            }
            TransitionOutcome::Rejected { current } => {
                debug!(generation_id, current = %current, "observation did not change generation");
                Ok(ReconcileOutcome::Unchanged { current })
            }
        }
    }

    async fn finish(
        &self,
        generation: &Generation,
        observation: &JobObservation,
    ) -> Result<(GenerationStatus, TransitionOutcome<GenerationStatus>), ReconcilerError> {
        if observation.results.is_empty()
            && !self
                .empty_ok_target_types
                .contains(generation.target_type())
        {
            let reason = format!("job {} succeeded without results", observation.job_name);
            let result = self
                .store
                .transition_generation(&generation.id, GenerationStatus::Failed, Some(reason))
                .await?;
            return Ok((GenerationStatus::Failed, result));
        }

        let manifests = observation
            .results
            .iter()
            .map(|location| ManifestContent::Reference(location.clone()))
            .collect();
        let result = self
            .store
            .finish_generation(&generation.id, manifests, None)
            .await?;
        Ok((GenerationStatus::Finished, result))
    }
}

/// 잡 조정기
///
/// `stop()` 후 재시작이 필요하면 [`JobReconcilerBuilder`]로 새 인스턴스를 생성해야 합니다.
pub struct JobReconciler<S> {
    state: ServiceState,
    inner: Arc<Reconciling<S>>,
    observations: Option<mpsc::Receiver<JobWatchEvent>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<S: Store> JobReconciler<S> {
    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        self.state.name()
    }

    /// 처리한 관측 수
    pub fn observed_count(&self) -> u64 {
        self.inner.observed.load(Ordering::Relaxed)
    }

    /// 상태 전이를 일으킨 관측 수
    pub fn applied_count(&self) -> u64 {
        self.inner.applied.load(Ordering::Relaxed)
    }

    /// 관측 한 건을 즉시 처리합니다 (채널을 거치지 않는 직접 호출).
    pub async fn reconcile(
        &self,
        event: &JobWatchEvent,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        self.inner.reconcile(event).await
    }
}

impl<S: Store> Pipeline for JobReconciler<S> {
    async fn start(&mut self) -> Result<(), SbomerError> {
        if self.state == ServiceState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        let mut observations = self
            .observations
            .take()
            .ok_or_else(|| PipelineError::ReceiverTaken("job_observations".to_owned()))?;

        info!("starting job reconciler");

        let inner = Arc::clone(&self.inner);
        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = observations.recv() => match event {
                        Some(event) => {
                            if let Err(e) = inner.reconcile(&event).await {
                                error!(job = %event.job_name(), error = %e, "failed to reconcile job");
                            }
                        }
                        None => break,
                    },
                }
            }
            info!("job reconciler loop stopped");
        });
        self.tasks.push(task);

        self.state = ServiceState::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SbomerError> {
        if self.state != ServiceState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping job reconciler");
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }

        self.state = ServiceState::Stopped;
        info!("job reconciler stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        if let Some(idle) = self.state.idle_health() {
            return idle;
        }
        if self.tasks.iter().any(JoinHandle::is_finished) {
            return HealthStatus::Unhealthy("observation channel closed".to_owned());
        }
        HealthStatus::Healthy
    }
}

/// 잡 조정기 빌더
pub struct JobReconcilerBuilder<S> {
    store: Arc<S>,
    bus: MessageBus,
    empty_ok_target_types: BTreeSet<String>,
    channel_capacity: usize,
}

impl<S: Store> JobReconcilerBuilder<S> {
    /// 새 빌더를 생성합니다.
    pub fn new(store: Arc<S>, bus: MessageBus) -> Self {
        Self {
            store,
            bus,
            empty_ok_target_types: BTreeSet::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// 결과 없이 성공해도 FINISHED로 인정할 대상 유형
    pub fn empty_ok_target_types<I, T>(mut self, target_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.empty_ok_target_types = target_types.into_iter().map(Into::into).collect();
        self
    }

    /// 관측 채널 용량
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// 조정기와 관측 송신 채널을 생성합니다.
    pub fn build(
        self,
    ) -> Result<(JobReconciler<S>, mpsc::Sender<JobWatchEvent>), ReconcilerError> {
        if self.channel_capacity == 0 {
            return Err(ReconcilerError::Config {
                field: "reconciler.channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let reconciler = JobReconciler {
            state: ServiceState::Initialized,
            inner: Arc::new(Reconciling {
                store: self.store,
                bus: self.bus,
                empty_ok_target_types: self.empty_ok_target_types,
                observed: AtomicU64::new(0),
                applied: AtomicU64::new(0),
            }),
            observations: Some(rx),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        };
        Ok((reconciler, tx))
    }
}
