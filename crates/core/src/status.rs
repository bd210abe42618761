//! 상태 모델 — Event/Generation 상태 열거형과 전이 규칙
//!
//! 모든 상태 변경은 [`advance`]를 통과해야 합니다.
//! 서수(ordinal) 비교로 전이를 선형화하므로 잠금 없이도
//! 중복 신호나 순서가 뒤바뀐 갱신이 안전하게 거부됩니다.
//!
//! # 전이 규칙
//! - 종료 상태에서는 어떤 전이도 허용하지 않습니다.
//! - 실패 상태(`ERROR`, `FAILED`)는 모든 비종료 상태에서 도달 가능합니다.
//! - 그 외에는 제안된 상태의 서수가 현재 서수보다 커야 합니다 (같으면 거부).

use std::fmt;

use serde::{Deserialize, Serialize};

/// 서수 순서를 갖는 생명주기 상태
pub trait LifecycleStatus: Copy + Eq + fmt::Display + fmt::Debug {
    /// 전체 순서에서의 위치
    fn ordinal(self) -> u8;

    /// 종료 상태 여부
    fn is_terminal(self) -> bool;

    /// 모든 비종료 상태에서 도달 가능한 실패 상태 여부
    fn is_failure(self) -> bool;

    /// `self`가 `other`보다 앞선(오래된) 상태인지 확인합니다.
    fn is_older_than(self, other: Self) -> bool {
        self.ordinal() < other.ordinal()
    }
}

/// 전이 판정 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// 전이 허용
    Accepted,
    /// 전이 거부 (오래된 갱신, 중복, 또는 종료 상태)
    Rejected,
}

impl Transition {
    /// 허용 여부
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// 현재 상태에서 제안된 상태로의 전이를 판정합니다.
pub fn advance<S: LifecycleStatus>(current: S, proposed: S) -> Transition {
    if current.is_terminal() {
        return Transition::Rejected;
    }
    if proposed.is_failure() || current.is_older_than(proposed) {
        Transition::Accepted
    } else {
        Transition::Rejected
    }
}

// ─── EventStatus ─────────────────────────────────────────────────────

/// Event 상태
///
/// ```text
/// NEW → IGNORED
/// NEW → RESOLVING → RESOLVED → INITIALIZING → INITIALIZED → PROCESSING → PROCESSED
/// (비종료) → ERROR
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    New,
    Ignored,
    Resolving,
    Resolved,
    Initializing,
    Initialized,
    Processing,
    Processed,
    Error,
}

impl EventStatus {
    /// 모든 상태 (서수 순)
    pub const ALL: [EventStatus; 9] = [
        Self::New,
        Self::Ignored,
        Self::Resolving,
        Self::Resolved,
        Self::Initializing,
        Self::Initialized,
        Self::Processing,
        Self::Processed,
        Self::Error,
    ];

    /// 상태명 (와이어 표기)
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Ignored => "IGNORED",
            Self::Resolving => "RESOLVING",
            Self::Resolved => "RESOLVED",
            Self::Initializing => "INITIALIZING",
            Self::Initialized => "INITIALIZED",
            Self::Processing => "PROCESSING",
            Self::Processed => "PROCESSED",
            Self::Error => "ERROR",
        }
    }
}

impl LifecycleStatus for EventStatus {
    fn ordinal(self) -> u8 {
        match self {
            Self::New => 0,
            Self::Ignored => 1,
            Self::Resolving => 2,
            Self::Resolved => 3,
            Self::Initializing => 4,
            Self::Initialized => 5,
            Self::Processing => 6,
            Self::Processed => 7,
            Self::Error => 8,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Error | Self::Ignored)
    }

    fn is_failure(self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── GenerationStatus ────────────────────────────────────────────────

/// Generation 상태
///
/// ```text
/// NEW → GENERATING → FINISHED | FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    New,
    Generating,
    Finished,
    Failed,
}

impl GenerationStatus {
    /// 모든 상태 (서수 순)
    pub const ALL: [GenerationStatus; 4] =
        [Self::New, Self::Generating, Self::Finished, Self::Failed];

    /// 상태명 (와이어 표기)
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Generating => "GENERATING",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
        }
    }

    /// 종료 상태에 대응하는 결과값. 비종료 상태는 `None`.
    pub fn result(self) -> Option<GenerationResult> {
        match self {
            Self::Finished => Some(GenerationResult::Success),
            Self::Failed => Some(GenerationResult::Failure),
            Self::New | Self::Generating => None,
        }
    }
}

impl LifecycleStatus for GenerationStatus {
    fn ordinal(self) -> u8 {
        match self {
            Self::New => 0,
            Self::Generating => 1,
            Self::Finished => 2,
            Self::Failed => 3,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    fn is_failure(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation 최종 결과 — 종료 상태에서만 설정됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationResult {
    Success,
    Failure,
}

impl fmt::Display for GenerationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("SUCCESS"),
            Self::Failure => f.write_str("FAILURE"),
        }
    }
}
