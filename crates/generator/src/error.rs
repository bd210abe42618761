//! Generator 에러 타입
//!
//! [`GeneratorError`]는 `From<GeneratorError> for SbomerError` 구현을 통해
//! 상위 에러 타입으로 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **생성 실패**: `Failed`, `Task`, `InvalidOutput`
//! - **외부 실행**: `Dispatch`, `Command`
//! - **등록/설정**: `AlreadyRegistered`, `InvalidVersion`, `Config`
//! - **인프라**: `Store`, `Bus`

use sbomer_core::error::{BusError, SbomerError, StoreError};
use sbomer_core::worker::TaskFailure;

/// Generator 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// generator 로직 실패
    #[error("generation failed: {0}")]
    Failed(String),

    /// generator 호출 시간 초과 또는 panic
    #[error("generator task failed: {0}")]
    Task(#[from] TaskFailure),

    /// 생성 결과가 유효하지 않음
    #[error("invalid generator output: {0}")]
    InvalidOutput(String),

    /// 외부 잡 디스패치 실패
    #[error("failed to dispatch job {job_name}: {reason}")]
    Dispatch {
        /// 잡 이름
        job_name: String,
        /// 실패 사유
        reason: String,
    },

    /// 명령 실행 실패
    #[error("command '{program}' failed: {reason}")]
    Command {
        /// 실행 파일
        program: String,
        /// 실패 사유
        reason: String,
    },

    /// 같은 이름의 generator가 이미 등록됨
    #[error("generator already registered: {name}")]
    AlreadyRegistered {
        /// generator 이름
        name: String,
    },

    /// 버전 문자열 파싱 실패
    #[error("invalid generator version '{version}': {reason}")]
    InvalidVersion {
        /// 파싱 대상 버전 문자열
        version: String,
        /// 파싱 실패 사유
        reason: String,
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

impl From<GeneratorError> for SbomerError {
    fn from(err: GeneratorError) -> Self {
        match err {
            GeneratorError::Store(e) => SbomerError::Store(e),
            GeneratorError::Bus(e) => SbomerError::Bus(e),
            other => SbomerError::Generation(other.to_string()),
        }
    }
}
