//! SBOMer 공통 타입, trait, 에러, 설정
//!
//! 모든 SBOMer 크레이트가 공유하는 기반 계층입니다.
//!
//! - [`status`]: Event/Generation 상태 모델과 전이 가드
//! - [`types`]: Event, Generation, Manifest 도메인 타입
//! - [`store`]: 저장소 trait과 메모리 구현
//! - [`bus`], [`message`]: 프로세스 내 메시지 버스
//! - [`worker`]: 제한된 워커 풀
//! - [`pipeline`]: 컴포넌트 생명주기 trait
//! - [`intake`]: 이벤트 접수
//! - [`job`]: 외부 잡 관측 계약

pub mod bus;
pub mod config;
pub mod error;
pub mod intake;
pub mod job;
pub mod message;
pub mod metrics;
pub mod pipeline;
pub mod status;
pub mod store;
pub mod types;
pub mod worker;

// --- 주요 타입 re-export ---

// 에러
pub use error::{BusError, ConfigError, IntakeError, PipelineError, SbomerError, StoreError};

// 설정
pub use config::SbomerConfig;

// 상태
pub use status::{
    EventStatus, GenerationResult, GenerationStatus, LifecycleStatus, Transition, advance,
};

// 도메인 타입
pub use types::{
    Event, Generation, GenerationRequest, GeneratorSelection, Manifest, ManifestContent, Target,
};

// 저장소, 버스, 워커
pub use bus::{MessageBus, Topic, spawn_dispatcher};
pub use intake::EventIntake;
pub use pipeline::{BoxFuture, DynPipeline, HealthStatus, Pipeline, ServiceState};
pub use store::{InMemoryStore, Store, TransitionOutcome};
pub use worker::{TaskFailure, WorkerPool, run_isolated};
