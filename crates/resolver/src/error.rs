//! Resolver 에러 타입
//!
//! [`ResolverError`]는 `From<ResolverError> for SbomerError` 구현을 통해
//! `?` 연산자로 상위 에러 타입으로 전파됩니다.

use sbomer_core::error::{BusError, SbomerError, StoreError};
use sbomer_core::worker::TaskFailure;

/// Resolver 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// resolver 로직 실패
    #[error("resolution failed: {0}")]
    Failed(String),

    /// 해석할 수 없는 이벤트 (식별자 누락 등)
    #[error("invalid event {event_id}: {reason}")]
    InvalidEvent {
        /// 이벤트 ID
        event_id: String,
        /// 사유
        reason: String,
    },

    /// resolver 호출 시간 초과 또는 panic
    #[error("resolver task failed: {0}")]
    Task(#[from] TaskFailure),

    /// 같은 라우팅 키의 resolver가 이미 등록됨
    #[error("resolver already registered: {name}")]
    AlreadyRegistered {
        /// 라우팅 키
        name: String,
    },

    /// 저장소 에러
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 버스 구독 실패
    #[error(transparent)]
    Bus(#[from] BusError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<ResolverError> for SbomerError {
    fn from(err: ResolverError) -> Self {
        match err {
            ResolverError::Store(e) => SbomerError::Store(e),
            ResolverError::Bus(e) => SbomerError::Bus(e),
            other => SbomerError::Resolution(other.to_string()),
        }
    }
}
