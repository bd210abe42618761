//! 도메인 타입 — Event, Generation, Manifest와 생성 요청
//!
//! 소유 관계는 Event → Generation → Manifest 방향으로만 흐릅니다.
//! Event는 Generation ID 목록을, Generation은 Manifest 목록을 보유하며
//! Generation은 소유 Event를 ID로만 참조합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::status::{EventStatus, GenerationResult, GenerationStatus};

/// 라우팅 키 메타데이터 (resolver 선택에 사용)
pub const METADATA_RESOLVER: &str = "resolver";
/// 도메인 식별자 메타데이터
pub const METADATA_IDENTIFIER: &str = "identifier";

/// 새 레코드 ID를 생성합니다 (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ─── Event ───────────────────────────────────────────────────────────

/// 조치가 필요한 인바운드 알림 한 건
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// 고유 ID
    pub id: String,
    /// 생성 시각
    pub created_at: SystemTime,
    /// 마지막 갱신 시각
    pub updated_at: SystemTime,
    /// 키-값 메타데이터 (라우팅 키 + 도메인 식별자)
    pub metadata: BTreeMap<String, String>,
    /// 현재 상태
    pub status: EventStatus,
    /// 상태 사유
    pub reason: Option<String>,
    /// 소속 Generation ID (생성 순)
    pub generation_ids: Vec<String>,
    /// 보관 여부 (삭제 대신 보관)
    pub archived: bool,
}

impl Event {
    /// NEW 상태의 새 이벤트를 생성합니다.
    pub fn new(metadata: BTreeMap<String, String>) -> Self {
        let now = SystemTime::now();
        Self {
            id: new_id(),
            created_at: now,
            updated_at: now,
            metadata,
            status: EventStatus::New,
            reason: None,
            generation_ids: Vec::new(),
            archived: false,
        }
    }

    /// 라우팅 키
    pub fn resolver_key(&self) -> Option<&str> {
        self.metadata.get(METADATA_RESOLVER).map(String::as_str)
    }

    /// 도메인 식별자
    pub fn identifier(&self) -> Option<&str> {
        self.metadata.get(METADATA_IDENTIFIER).map(String::as_str)
    }
}

/// 로그용 ID 앞 8글자 (문자 단위)
fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event[{}] resolver={} status={} generations={}",
            short_id(&self.id),
            self.resolver_key().unwrap_or("-"),
            self.status,
            self.generation_ids.len(),
        )
    }
}

// ─── GenerationRequest ───────────────────────────────────────────────

/// 생성 대상
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// 대상 유형 — generator 선택 키
    #[serde(rename = "type")]
    pub target_type: String,
    /// 대상 식별자
    pub identifier: String,
}

/// 특정 generator 지정 (선택)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorSelection {
    /// generator 이름
    pub name: String,
    /// 버전 요구사항 (semver requirement, 예: `"^1.2"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// generator 옵션
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

/// Generation 요청
///
/// `{ generator: { name, version, options }?, target: { type, identifier } }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<GeneratorSelection>,
    pub target: Target,
}

impl GenerationRequest {
    /// generator 지정 없이 대상만으로 요청을 만듭니다.
    pub fn for_target(target_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            generator: None,
            target: Target {
                target_type: target_type.into(),
                identifier: identifier.into(),
            },
        }
    }

    /// generator 지정을 추가합니다.
    pub fn with_generator(mut self, selection: GeneratorSelection) -> Self {
        self.generator = Some(selection);
        self
    }
}

// ─── Generation ──────────────────────────────────────────────────────

/// Manifest 생성 작업 단위
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// 고유 ID
    pub id: String,
    /// 소유 Event ID
    pub event_id: String,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    /// 종료 상태 도달 시각
    pub finished_at: Option<SystemTime>,
    /// 생성 요청
    pub request: GenerationRequest,
    /// 현재 상태
    pub status: GenerationStatus,
    /// 최종 결과 — 종료 상태에서만 `Some`
    pub result: Option<GenerationResult>,
    /// 상태 사유
    pub reason: Option<String>,
    /// 생성된 Manifest (생성 순)
    pub manifests: Vec<Manifest>,
}

impl Generation {
    /// NEW 상태의 Generation을 생성합니다.
    pub fn new(event_id: impl Into<String>, request: GenerationRequest) -> Self {
        let now = SystemTime::now();
        Self {
            id: new_id(),
            event_id: event_id.into(),
            created_at: now,
            updated_at: now,
            finished_at: None,
            request,
            status: GenerationStatus::New,
            result: None,
            reason: None,
            manifests: Vec::new(),
        }
    }

    /// 대상 유형
    pub fn target_type(&self) -> &str {
        &self.request.target.target_type
    }

    /// 대상 식별자
    pub fn target_identifier(&self) -> &str {
        &self.request.target.identifier
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Generation[{}] target={}:{} status={}",
            short_id(&self.id),
            self.request.target.target_type,
            self.request.target.identifier,
            self.status,
        )
    }
}

// ─── Manifest ────────────────────────────────────────────────────────

/// Manifest 내용 — 본문 또는 외부 위치 참조
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ManifestContent {
    /// 인라인 문서 (JSON)
    Inline(serde_json::Value),
    /// 외부 위치 참조 (URL, 경로 등)
    Reference(String),
}

/// 생성된 산출물. 생성 후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    /// 소유 Generation ID
    pub generation_id: String,
    pub created_at: SystemTime,
    pub content: ManifestContent,
}

impl Manifest {
    /// Generation에 속한 새 Manifest를 만듭니다.
    pub fn new(generation_id: impl Into<String>, content: ManifestContent) -> Self {
        Self {
            id: new_id(),
            generation_id: generation_id.into(),
            created_at: SystemTime::now(),
            content,
        }
    }
}
