//! 버스 메시지 — 모듈 간 통신의 기본 단위
//!
//! 상태 변경은 저장소에 기록되고, 후속 작업은 메시지로 알립니다.
//! 메시지는 ID만 전달하며 수신자는 항상 저장소에서 최신 상태를 다시 읽습니다.
//! [`MessageMetadata`]는 모든 메시지에 공통으로 포함되는 추적 정보입니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::status::GenerationStatus;

// --- 모듈명 상수 ---

/// 이벤트 접수 모듈명
pub const MODULE_INTAKE: &str = "intake";
/// resolver 모듈명
pub const MODULE_RESOLVER: &str = "resolver";
/// generator 모듈명
pub const MODULE_GENERATOR: &str = "generator";
/// 잡 조정 모듈명
pub const MODULE_RECONCILER: &str = "reconciler";
/// 스케줄러 모듈명
pub const MODULE_SCHEDULER: &str = "scheduler";

// --- 메시지 타입 상수 ---

pub const MESSAGE_TYPE_RESOLVE_REQUESTED: &str = "resolve_requested";
pub const MESSAGE_TYPE_EVENT_RESOLVED: &str = "event_resolved";
pub const MESSAGE_TYPE_GENERATION_SCHEDULED: &str = "generation_scheduled";
pub const MESSAGE_TYPE_GENERATION_STATUS_CHANGED: &str = "generation_status_changed";

/// 메시지 메타데이터 — 발생 시각, 생성 모듈, 추적 ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// 메시지 발생 시각
    pub timestamp: SystemTime,
    /// 메시지를 생성한 모듈명
    pub source_module: String,
    /// 추적 ID — 같은 Event 흐름의 메시지를 연결합니다
    pub trace_id: String,
}

impl MessageMetadata {
    /// 기존 trace_id를 이어받아 메타데이터를 생성합니다.
    pub fn new(source_module: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: trace_id.into(),
        }
    }

    /// 새 UUID v4 trace_id로 메타데이터를 생성합니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self::new(source_module, uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for MessageMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self
            .timestamp
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs().to_string())
            .unwrap_or_else(|_| "unknown".to_owned());
        write!(
            f,
            "[{secs}] source={} trace={}",
            self.source_module, self.trace_id
        )
    }
}

/// 모든 버스 메시지가 구현하는 trait
///
/// `Clone`은 구독자별 팬아웃에 필요합니다.
pub trait Message: Clone + Send + Sync + 'static {
    /// 메시지 고유 ID
    fn message_id(&self) -> &str;

    /// 메시지 메타데이터
    fn metadata(&self) -> &MessageMetadata;

    /// 메시지 타입명 (로깅 및 토픽 식별에 사용)
    fn message_type(&self) -> &'static str;
}

macro_rules! impl_message {
    ($ty:ty, $kind:expr) => {
        impl Message for $ty {
            fn message_id(&self) -> &str {
                &self.id
            }

            fn metadata(&self) -> &MessageMetadata {
                &self.metadata
            }

            fn message_type(&self) -> &'static str {
                $kind
            }
        }
    };
}

/// 새 Event가 해석(resolution)을 요청함
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequested {
    pub id: String,
    pub metadata: MessageMetadata,
    pub event_id: String,
}

impl ResolveRequested {
    pub fn new(event_id: impl Into<String>, source_module: &str) -> Self {
        let event_id = event_id.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: MessageMetadata::new(source_module, event_id.clone()),
            event_id,
        }
    }
}

impl_message!(ResolveRequested, MESSAGE_TYPE_RESOLVE_REQUESTED);

/// Event가 RESOLVED에 도달하고 Generation이 생성됨
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventResolved {
    pub id: String,
    pub metadata: MessageMetadata,
    pub event_id: String,
    pub generation_ids: Vec<String>,
}

impl EventResolved {
    pub fn new(event_id: impl Into<String>, generation_ids: Vec<String>) -> Self {
        let event_id = event_id.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: MessageMetadata::new(MODULE_RESOLVER, event_id.clone()),
            event_id,
            generation_ids,
        }
    }
}

impl_message!(EventResolved, MESSAGE_TYPE_EVENT_RESOLVED);

/// Generation이 생성 작업에 배정됨
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationScheduled {
    pub id: String,
    pub metadata: MessageMetadata,
    pub generation_id: String,
    pub event_id: String,
}

impl GenerationScheduled {
    pub fn new(generation_id: impl Into<String>, event_id: impl Into<String>) -> Self {
        let event_id = event_id.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: MessageMetadata::new(MODULE_SCHEDULER, event_id.clone()),
            generation_id: generation_id.into(),
            event_id,
        }
    }
}

impl_message!(GenerationScheduled, MESSAGE_TYPE_GENERATION_SCHEDULED);

/// Generation 상태가 변경됨 (저장소 반영 이후에만 발행)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationStatusChanged {
    pub id: String,
    pub metadata: MessageMetadata,
    pub generation_id: String,
    pub event_id: String,
    pub status: GenerationStatus,
}

impl GenerationStatusChanged {
    pub fn new(
        generation_id: impl Into<String>,
        event_id: impl Into<String>,
        status: GenerationStatus,
        source_module: &str,
    ) -> Self {
        let event_id = event_id.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: MessageMetadata::new(source_module, event_id.clone()),
            generation_id: generation_id.into(),
            event_id,
            status,
        }
    }
}

impl_message!(
    GenerationStatusChanged,
    MESSAGE_TYPE_GENERATION_STATUS_CHANGED
);
