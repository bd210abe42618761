//! 조정 브리지 에러 타입

use sbomer_core::error::{SbomerError, StoreError};

/// 조정 브리지 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ReconcilerError {
    /// 저장소 에러
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<ReconcilerError> for SbomerError {
    fn from(err: ReconcilerError) -> Self {
        match err {
            ReconcilerError::Store(e) => SbomerError::Store(e),
            other => SbomerError::Reconcile(other.to_string()),
        }
    }
}
