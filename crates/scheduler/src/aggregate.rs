//! Event 상태 집계 — 소속 Generation 상태로부터 Event 목표 상태를 계산
//!
//! | Generation 상태                     | Event 목표   |
//! |-------------------------------------|--------------|
//! | 모두 NEW                            | 없음         |
//! | GENERATING 또는 종료 상태가 하나라도 | PROCESSING   |
//! | 모두 종료, 모두 FINISHED            | PROCESSED    |
//! | 모두 종료, FAILED 포함              | ERROR + 사유 |

use sbomer_core::status::{EventStatus, GenerationStatus, LifecycleStatus};
use sbomer_core::types::Generation;

/// 집계 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    /// Event 목표 상태
    pub status: EventStatus,
    /// 상태 사유 (ERROR일 때 실패한 Generation 목록)
    pub reason: Option<String>,
}

/// Generation 목록으로 Event 목표 상태를 계산합니다.
///
/// Generation이 없거나 모두 NEW이면 `None`.
pub fn aggregate(generations: &[Generation]) -> Option<Aggregate> {
    if generations.is_empty() {
        return None;
    }

    let all_terminal = generations.iter().all(|g| g.status.is_terminal());
    if all_terminal {
        let failed: Vec<&str> = generations
            .iter()
            .filter(|g| g.status == GenerationStatus::Failed)
            .map(|g| g.id.as_str())
            .collect();
        if failed.is_empty() {
            return Some(Aggregate {
                status: EventStatus::Processed,
                reason: None,
            });
        }
        return Some(Aggregate {
            status: EventStatus::Error,
            reason: Some(format!(
                "{} of {} generations failed: {}",
                failed.len(),
                generations.len(),
                failed.join(", ")
            )),
        });
    }

    let started = generations
        .iter()
        .any(|g| g.status != GenerationStatus::New);
    started.then_some(Aggregate {
        status: EventStatus::Processing,
        reason: None,
    })
}

#[cfg(test)]
mod tests {
    use sbomer_core::types::GenerationRequest;

    use super::*;

    fn generation(id: &str, status: GenerationStatus) -> Generation {
        let mut g = Generation::new("e-1", GenerationRequest::for_target("T", "abc"));
        g.id = id.to_owned();
        g.status = status;
        g
    }

    #[test]
    fn empty_or_untouched_generations_have_no_target() {
        assert_eq!(aggregate(&[]), None);
        assert_eq!(
            aggregate(&[
                generation("g1", GenerationStatus::New),
                generation("g2", GenerationStatus::New)
            ]),
            None
        );
    }

    #[test]
    fn any_progress_means_processing() {
        let target = aggregate(&[
            generation("g1", GenerationStatus::New),
            generation("g2", GenerationStatus::Generating),
        ])
        .unwrap();
        assert_eq!(target.status, EventStatus::Processing);

        let target = aggregate(&[
            generation("g1", GenerationStatus::Finished),
            generation("g2", GenerationStatus::New),
        ])
        .unwrap();
        assert_eq!(target.status, EventStatus::Processing);
    }

    #[test]
    fn all_finished_means_processed() {
        let target = aggregate(&[
            generation("g1", GenerationStatus::Finished),
            generation("g2", GenerationStatus::Finished),
        ])
        .unwrap();
        assert_eq!(target.status, EventStatus::Processed);
        assert_eq!(target.reason, None);
    }

    #[test]
    fn any_failure_means_error_naming_failures() {
        let target = aggregate(&[
            generation("g1", GenerationStatus::Failed),
            generation("g2", GenerationStatus::Finished),
            generation("g3", GenerationStatus::Failed),
        ])
        .unwrap();
        assert_eq!(target.status, EventStatus::Error);
        assert_eq!(
            target.reason.as_deref(),
            Some("2 of 3 generations failed: g1, g3")
        );
    }

    #[test]
    fn failure_waits_for_remaining_generations() {
        let target = aggregate(&[
            generation("g1", GenerationStatus::Failed),
            generation("g2", GenerationStatus::Generating),
        ])
        .unwrap();
        assert_eq!(target.status, EventStatus::Processing);
    }
}
