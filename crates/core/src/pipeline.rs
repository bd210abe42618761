//! 파이프라인 trait — 장기 실행 컴포넌트의 생명주기
//!
//! resolver 서비스, generator 서비스, 리더 선출기, 잡 조정기, 스케줄러는
//! 모두 [`Pipeline`]을 구현하며 데몬이 같은 방식으로 시작/정지합니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::error::SbomerError;

/// 박싱된 Send future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 컴포넌트 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 일부 기능 저하
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 서비스 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// 빌드됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

impl ServiceState {
    /// 상태명
    pub fn name(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }

    /// 실행 중이 아닐 때의 건강 상태
    pub fn idle_health(self) -> Option<HealthStatus> {
        match self {
            Self::Running => None,
            Self::Initialized => Some(HealthStatus::Unhealthy("not started".to_owned())),
            Self::Stopped => Some(HealthStatus::Unhealthy("stopped".to_owned())),
        }
    }
}

/// 장기 실행 컴포넌트 생명주기
///
/// ```text
/// Initialized → start() → Running → stop() → Stopped
/// ```
///
/// `stop()` 이후 재시작은 지원하지 않습니다. 새 인스턴스를 빌드해야 합니다.
pub trait Pipeline: Send + Sync {
    /// 백그라운드 태스크를 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), SbomerError>> + Send;

    /// 백그라운드 태스크를 정지하고 자원을 정리합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), SbomerError>> + Send;

    /// 건강 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// dyn-compatible 파이프라인 trait
///
/// `Pipeline`은 RPITIT를 사용하므로 `dyn Pipeline`이 불가합니다.
/// `DynPipeline`은 `BoxFuture`를 반환하여 `Box<dyn DynPipeline>`으로
/// 모듈을 동적으로 관리할 수 있게 합니다.
pub trait DynPipeline: Send + Sync {
    fn start(&mut self) -> BoxFuture<'_, Result<(), SbomerError>>;

    fn stop(&mut self) -> BoxFuture<'_, Result<(), SbomerError>>;

    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

/// Pipeline을 구현한 타입은 자동으로 DynPipeline도 구현됩니다.
impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), SbomerError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), SbomerError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}
