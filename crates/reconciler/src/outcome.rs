//! 잡 판정 — 조건 목록을 세 가지 결과로 축약

use sbomer_core::job::{ConditionStatus, JobCondition};

/// 잡 판정 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// 아직 실행 중 (첫 조건이 `Unknown`이거나 조건 없음)
    Pending,
    /// 성공 종료 (첫 조건이 `True`)
    Success,
    /// 실패 종료 (첫 조건이 `False`)
    Failure { reason: String },
}

impl JobOutcome {
    /// 첫 번째 조건으로 판정합니다.
    pub fn from_conditions(conditions: &[JobCondition]) -> Self {
        let Some(first) = conditions.first() else {
            return Self::Pending;
        };
        match first.status {
            ConditionStatus::Unknown => Self::Pending,
            ConditionStatus::True => Self::Success,
            ConditionStatus::False => Self::Failure {
                reason: failure_reason(first),
            },
        }
    }

    /// 종료 여부
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// 메트릭/로그용 이름
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure { .. } => "failure",
        }
    }
}

fn failure_reason(condition: &JobCondition) -> String {
    match (condition.reason.as_deref(), condition.message.as_deref()) {
        (Some(reason), Some(message)) => format!("{reason}: {message}"),
        (Some(text), None) | (None, Some(text)) => text.to_owned(),
        (None, None) => format!("job condition {} is False", condition.condition_type),
    }
}
