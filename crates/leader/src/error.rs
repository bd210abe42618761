//! 리더 선출 에러 타입

use sbomer_core::error::SbomerError;

/// 리더 선출 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LeaderError {
    /// 리스 저장소 접근 실패
    #[error("lease store error: {0}")]
    Store(String),

    /// 리스 파일 I/O 실패
    #[error("lease io error: {path}: {source}")]
    Io {
        /// 리스 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 리스 레코드 직렬화/역직렬화 실패
    #[error("invalid lease record: {0}")]
    Serialization(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<LeaderError> for SbomerError {
    fn from(err: LeaderError) -> Self {
        SbomerError::Leader(err.to_string())
    }
}
