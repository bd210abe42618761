//! 리더 선출기
//!
//! 매 주기(`renew_interval`) 리스를 읽고:
//!
//! - 다른 보유자가 있고 만료 전(`now < renew_time + duration`) → 비리더
//! - 그 외 → 자신을 보유자로 기록하고 리더
//! - 읽기/쓰기 실패 → 이번 주기는 비리더 (fail-safe)
//!
//! 현재 리더 여부는 [`LeaderHandle`]로 다른 컴포넌트에 전달됩니다.
//! 정지 시 자신이 보유한 리스는 삭제하여 다음 복제본이 바로 획득할 수 있게 합니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sbomer_core::config::LeaderConfig;
use sbomer_core::error::{PipelineError, SbomerError};
use sbomer_core::metrics as m;
use sbomer_core::pipeline::{HealthStatus, Pipeline, ServiceState};

use crate::error::LeaderError;
use crate::lease::Lease;
use crate::store::LeaseStore;

/// 리더 여부 구독 핸들
///
/// 복제 비용이 낮으며, 선출기가 정지되어도 마지막 값을 유지합니다.
#[derive(Debug, Clone)]
pub struct LeaderHandle {
    rx: watch::Receiver<bool>,
}

impl LeaderHandle {
    /// 항상 리더인 핸들 (리더 선출 비활성화 시)
    pub fn always() -> Self {
        let (_tx, rx) = watch::channel(true);
        Self { rx }
    }

    /// 현재 리더 여부
    pub fn is_leader(&self) -> bool {
        *self.rx.borrow()
    }

    /// 리더 여부가 바뀔 때까지 기다리고 새 값을 반환합니다.
    ///
    /// 선출기가 사라지면 `None`.
    pub async fn changed(&mut self) -> Option<bool> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

/// 선출 설정
#[derive(Debug, Clone)]
pub struct ElectionSettings {
    /// 리스 보유자 식별자
    pub identity: String,
    /// 리스 이름
    pub lease_name: String,
    /// 리스 유효 기간
    pub lease_duration: Duration,
    /// 갱신 주기
    pub renew_interval: Duration,
}

impl ElectionSettings {
    /// 설정 섹션과 인스턴스 식별자로 생성합니다.
    pub fn from_config(identity: impl Into<String>, config: &LeaderConfig) -> Self {
        Self {
            identity: identity.into(),
            lease_name: config.lease_name.clone(),
            lease_duration: Duration::from_secs(config.lease_duration_secs),
            renew_interval: Duration::from_secs(config.renew_interval_secs),
        }
    }

    fn validate(&self) -> Result<(), LeaderError> {
        let invalid = |field: &str, reason: &str| LeaderError::Config {
            field: field.to_owned(),
            reason: reason.to_owned(),
        };
        if self.identity.trim().is_empty() {
            return Err(invalid("general.identity", "must not be empty"));
        }
        if self.lease_name.trim().is_empty() {
            return Err(invalid("leader.lease_name", "must not be empty"));
        }
        if self.renew_interval.is_zero() {
            return Err(invalid("leader.renew_interval_secs", "must be greater than 0"));
        }
        if self.lease_duration <= self.renew_interval {
            return Err(invalid(
                "leader.lease_duration_secs",
                "must be greater than renew_interval_secs",
            ));
        }
        Ok(())
    }
}

struct Election<L> {
    store: L,
    settings: ElectionSettings,
    leader_tx: watch::Sender<bool>,
    store_healthy: AtomicBool,
    cycles: AtomicU64,
}

impl<L: LeaseStore> Election<L> {
    fn set_leader(&self, leader: bool) {
        let changed = self.leader_tx.send_if_modified(|current| {
            let changed = *current != leader;
            *current = leader;
            changed
        });
        if changed {
            if leader {
                metrics::counter!(m::LEADER_ACQUISITIONS_TOTAL).increment(1);
                info!(identity = %self.settings.identity, lease = %self.settings.lease_name, "became leader");
            } else {
                info!(identity = %self.settings.identity, lease = %self.settings.lease_name, "lost leadership");
            }
        }
        metrics::gauge!(m::LEADER_IS_LEADER).set(if leader { 1.0 } else { 0.0 });
    }

    async fn run_cycle_at(&self, now: SystemTime) -> bool {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        let leader = match self.try_cycle(now).await {
            Ok(leader) => {
                self.store_healthy.store(true, Ordering::Relaxed);
                leader
            }
            Err(e) => {
                self.store_healthy.store(false, Ordering::Relaxed);
                warn!(identity = %self.settings.identity, error = %e, "lease cycle failed, acting as non-leader");
                false
            }
        };
        self.set_leader(leader);
        leader
    }

    async fn try_cycle(&self, now: SystemTime) -> Result<bool, LeaderError> {
        let identity = &self.settings.identity;
        let duration_secs = self.settings.lease_duration.as_secs();

        let lease = match self.store.read(&self.settings.lease_name).await? {
            Some(current) if !current.is_held_by(identity) && !current.is_expired_at(now) => {
                debug!(holder = %current.holder_identity, "lease held by another instance");
                return Ok(false);
            }
            Some(current) if current.is_held_by(identity) => current.renewed(now, duration_secs),
            Some(expired) => {
                info!(previous = %expired.holder_identity, identity = %identity, "taking over expired lease");
                Lease::acquire(&self.settings.lease_name, identity, duration_secs, now)
            }
            None => Lease::acquire(&self.settings.lease_name, identity, duration_secs, now),
        };

        self.store.write(&lease).await?;
        Ok(true)
    }

    async fn release(&self) -> Result<(), LeaderError> {
        let held = self
            .store
            .read(&self.settings.lease_name)
            .await?
            .is_some_and(|lease| lease.is_held_by(&self.settings.identity));
        if held {
            self.store.delete(&self.settings.lease_name).await?;
            info!(identity = %self.settings.identity, "lease released");
        }
        self.set_leader(false);
        Ok(())
    }
}

struct DemoteOnExit<L: LeaseStore>(Arc<Election<L>>);

impl<L: LeaseStore> Drop for DemoteOnExit<L> {
    fn drop(&mut self) {
        self.0.set_leader(false);
    }
}

/// 리스 기반 리더 선출기
///
/// `stop()` 후 재시작은 지원하지 않습니다.
pub struct LeaderElector<L> {
    state: ServiceState,
    election: Arc<Election<L>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<L: LeaseStore> LeaderElector<L> {
    /// 리스 저장소와 설정으로 선출기를 생성합니다.
    pub fn new(store: L, settings: ElectionSettings) -> Result<Self, LeaderError> {
        settings.validate()?;
        let (leader_tx, _) = watch::channel(false);
        Ok(Self {
            state: ServiceState::Initialized,
            election: Arc::new(Election {
                store,
                settings,
                leader_tx,
                store_healthy: AtomicBool::new(true),
                cycles: AtomicU64::new(0),
            }),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }

    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        self.state.name()
    }

    /// 리더 여부 구독 핸들
    pub fn handle(&self) -> LeaderHandle {
        LeaderHandle {
            rx: self.election.leader_tx.subscribe(),
        }
    }

    /// 현재 리더 여부
    pub fn is_leader(&self) -> bool {
        *self.election.leader_tx.borrow()
    }

    pub fn identity(&self) -> &str {
        &self.election.settings.identity
    }

    /// 실행한 선출 주기 수
    pub fn cycles(&self) -> u64 {
        self.election.cycles.load(Ordering::Relaxed)
    }

    /// `now` 시각 기준으로 선출 주기를 한 번 실행하고 리더 여부를 반환합니다.
    pub async fn run_cycle_at(&self, now: SystemTime) -> bool {
        self.election.run_cycle_at(now).await
    }

    /// 보유 중인 리스를 반납합니다.
    pub async fn release(&self) -> Result<(), LeaderError> {
        self.election.release().await
    }
}

impl<L: LeaseStore> Pipeline for LeaderElector<L> {
    async fn start(&mut self) -> Result<(), SbomerError> {
        if self.state == ServiceState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        if self.state == ServiceState::Stopped {
            return Err(PipelineError::InitFailed("leader elector cannot be restarted".to_owned()).into());
        }

        let election = Arc::clone(&self.election);
        let cancel = self.cancel.clone();
        let interval = election.settings.renew_interval;
        info!(
            identity = %election.settings.identity,
            lease = %election.settings.lease_name,
            interval_secs = interval.as_secs(),
            "starting leader elector"
        );

        let task = tokio::spawn(async move {
            // 루프가 어떤 이유로든 끝나면 리더 신호를 내림
            let _demote = DemoteOnExit(Arc::clone(&election));
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        election.run_cycle_at(SystemTime::now()).await;
                    }
                }
            }
            debug!("leader election loop stopped");
        });
        self.tasks.push(task);

        self.state = ServiceState::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SbomerError> {
        if self.state != ServiceState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping leader elector");
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        if let Err(e) = self.election.release().await {
            warn!(error = %e, "failed to release lease, it will expire");
            self.election.set_leader(false);
        }

        self.state = ServiceState::Stopped;
        info!("leader elector stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        if let Some(idle) = self.state.idle_health() {
            return idle;
        }
        if self.tasks.iter().any(JoinHandle::is_finished) {
            return HealthStatus::Unhealthy("leader election loop exited".to_owned());
        }
        if !self.election.store_healthy.load(Ordering::Relaxed) {
            return HealthStatus::Degraded("lease store unreachable".to_owned());
        }
        HealthStatus::Healthy
    }
}
