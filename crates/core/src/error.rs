//! 에러 타입 — 도메인별 에러 정의
//!
//! 각 라이브러리 크레이트는 자체 에러 enum을 정의하고
//! `From` 구현으로 [`SbomerError`]로 변환합니다.

/// SBOMer 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum SbomerError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 저장소 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// 메시지 버스 에러
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// 파이프라인 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 인바운드 알림 검증 에러
    #[error("intake error: {0}")]
    Intake(#[from] IntakeError),

    /// 이벤트 해석(resolution) 에러
    #[error("resolution error: {0}")]
    Resolution(String),

    /// 생성(generation) 에러
    #[error("generation error: {0}")]
    Generation(String),

    /// 리더 선출 에러
    #[error("leader election error: {0}")]
    Leader(String),

    /// 외부 잡 조정(reconciliation) 에러
    #[error("reconcile error: {0}")]
    Reconcile(String),

    /// 스케줄러 에러
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 인바운드 알림 검증 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    /// 필수 메타데이터 키가 없거나 비어 있음
    #[error("required metadata key '{key}' is missing or blank")]
    MissingMetadata { key: &'static str },
}

/// 저장소 에러
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 대상 레코드가 존재하지 않음
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// 동일 ID 레코드가 이미 존재함
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    /// 종료 상태가 아닌 이벤트는 보관할 수 없음
    #[error("event {id} is not terminal (status: {status})")]
    NotTerminal { id: String, status: String },

    /// 잠금 오염 (다른 스레드가 잠금 보유 중 panic)
    #[error("store lock poisoned")]
    Poisoned,

    /// 백엔드 에러
    #[error("backend error: {0}")]
    Backend(String),
}

/// 메시지 버스 에러
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// 구독자 목록 잠금 오염
    #[error("subscriber list poisoned for {topic}")]
    Poisoned { topic: &'static str },

    /// 구독자가 하나도 없음
    #[error("no subscribers for {topic}")]
    NoSubscribers { topic: &'static str },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline is not running")]
    NotRunning,

    /// 수신 채널이 이미 소비됨 (재시작 불가)
    #[error("receiver already taken: {0}")]
    ReceiverTaken(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}
