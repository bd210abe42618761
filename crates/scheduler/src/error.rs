//! 스케줄러 에러 타입

use sbomer_core::error::{BusError, SbomerError, StoreError};

/// 스케줄러 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
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

impl From<SchedulerError> for SbomerError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Store(e) => SbomerError::Store(e),
            SchedulerError::Bus(e) => SbomerError::Bus(e),
            other => SbomerError::Scheduler(other.to_string()),
        }
    }
}
