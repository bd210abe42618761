//! 외부 잡 관측 타입 — 잡 러너와 조정(reconciliation) 브리지 사이의 계약
//!
//! 잡 러너는 디스패치된 잡의 상태를 [`JobWatchEvent`]로 보고하고,
//! 조정 브리지는 이를 Generation 상태 전이로 변환합니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Generation ID를 담는 상관(correlation) 레이블 키
pub const GENERATION_ID_LABEL: &str = "sbomer.io/generation-id";

/// 조건 상태값
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => f.write_str("True"),
            Self::False => f.write_str("False"),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}

/// 잡 조건 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCondition {
    /// 조건 유형 (예: `Complete`, `Failed`, `Running`)
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl JobCondition {
    pub fn new(condition_type: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            condition_type: condition_type.into(),
            status,
            reason: None,
            message: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// 잡 한 건의 관측 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobObservation {
    /// 잡 이름
    pub job_name: String,
    /// 레이블 (상관 레이블 포함)
    pub labels: BTreeMap<String, String>,
    /// 조건 목록 (순서 유지, 첫 번째 조건이 판정 기준)
    pub conditions: Vec<JobCondition>,
    /// 잡이 보고한 결과 항목 (Manifest 위치 등)
    #[serde(default)]
    pub results: Vec<String>,
}

impl JobObservation {
    /// 상관 레이블에서 Generation ID를 꺼냅니다.
    pub fn generation_id(&self) -> Option<&str> {
        self.labels.get(GENERATION_ID_LABEL).map(String::as_str)
    }
}

/// 잡 감시 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobWatchEvent {
    /// 잡이 생성되거나 갱신됨
    Applied(JobObservation),
    /// 잡 리소스가 제거됨
    Deleted {
        job_name: String,
        labels: BTreeMap<String, String>,
    },
}

impl JobWatchEvent {
    /// 대상 잡 이름
    pub fn job_name(&self) -> &str {
        match self {
            Self::Applied(observation) => &observation.job_name,
            Self::Deleted { job_name, .. } => job_name,
        }
    }
}
