//! 로컬 프로세스 잡 러너
//!
//! 잡 하나를 자식 프로세스 하나로 실행하고, 진행 상황을 조정 브리지의
//! 감시 채널에 [`JobWatchEvent`]로 보고합니다.
//!
//! ```text
//! dispatch ──> spawn ──> Applied [Running=Unknown]
//!                 │
//!              exit 0 ──> Applied [Complete=True]  (stdout 줄 = 결과 항목)
//!              exit ≠0 ─> Applied [Failed=False]   (stderr = 메시지)
//!                 │
//!                 └────> Deleted
//! ```

use std::process::Stdio;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use sbomer_core::job::{ConditionStatus, JobCondition, JobObservation, JobWatchEvent};

use crate::error::GeneratorError;
use crate::job::{JobRunner, JobSpec};

/// stderr 메시지 최대 길이
const MAX_MESSAGE_LEN: usize = 1024;

/// 자식 프로세스 기반 잡 러너
pub struct ProcessJobRunner {
    observations: mpsc::Sender<JobWatchEvent>,
    tracker: TaskTracker,
}

impl ProcessJobRunner {
    /// 감시 채널 송신자로 러너를 생성합니다.
    pub fn new(observations: mpsc::Sender<JobWatchEvent>) -> Self {
        Self {
            observations,
            tracker: TaskTracker::new(),
        }
    }

    /// 아직 끝나지 않은 잡 수
    pub fn running(&self) -> usize {
        self.tracker.len()
    }

    /// 새 잡 제출을 막고 실행 중인 잡이 끝날 때까지 최대 `grace`만큼 기다립니다.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(running = self.tracker.len(), "jobs still running at shutdown");
                false
            }
        }
    }
}

fn observation(spec: &JobSpec, condition: JobCondition, results: Vec<String>) -> JobWatchEvent {
    JobWatchEvent::Applied(JobObservation {
        job_name: spec.name.clone(),
        labels: spec.labels.clone(),
        conditions: vec![condition],
        results,
    })
}

fn truncate(mut message: String) -> String {
    if message.len() > MAX_MESSAGE_LEN {
        let mut end = MAX_MESSAGE_LEN;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
    }
    message
}

async fn report(tx: &mpsc::Sender<JobWatchEvent>, event: JobWatchEvent) {
    let job_name = event.job_name().to_owned();
    if tx.send(event).await.is_err() {
        warn!(job = %job_name, "job watch channel closed, observation dropped");
    }
}

impl JobRunner for ProcessJobRunner {
    async fn dispatch(&self, spec: JobSpec) -> Result<(), GeneratorError> {
        if self.tracker.is_closed() {
            return Err(GeneratorError::Dispatch {
                job_name: spec.name,
                reason: "runner is shutting down".to_owned(),
            });
        }
        let Some((program, args)) = spec.command.split_first() else {
            return Err(GeneratorError::Dispatch {
                job_name: spec.name,
                reason: "job command is empty".to_owned(),
            });
        };

        let child = tokio::process::Command::new(program)
            .args(args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GeneratorError::Dispatch {
                job_name: spec.name.clone(),
                reason: format!("failed to spawn '{program}': {e}"),
            })?;

        debug!(job = %spec.name, image = %spec.image, program = %program, "job process spawned");
        report(
            &self.observations,
            observation(
                &spec,
                JobCondition::new("Running", ConditionStatus::Unknown).with_reason("Started"),
                Vec::new(),
            ),
        )
        .await;

        let tx = self.observations.clone();
        self.tracker.spawn(async move {
            let condition_and_results = match child.wait_with_output().await {
                Ok(output) if output.status.success() => {
                    let results = String::from_utf8_lossy(&output.stdout)
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(str::to_owned)
                        .collect();
                    (
                        JobCondition::new("Complete", ConditionStatus::True)
                            .with_reason("Completed"),
                        results,
                    )
                }
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
                    let message = if stderr.is_empty() {
                        format!("job exited with {}", output.status)
                    } else {
                        truncate(stderr)
                    };
                    (
                        JobCondition::new("Failed", ConditionStatus::False)
                            .with_reason("NonZeroExit")
                            .with_message(message),
                        Vec::new(),
                    )
                }
                Err(e) => (
                    JobCondition::new("Failed", ConditionStatus::False)
                        .with_reason("WaitFailed")
                        .with_message(e.to_string()),
                    Vec::new(),
                ),
            };

            let (condition, results) = condition_and_results;
            info!(
                job = %spec.name,
                condition = %condition.condition_type,
                results = results.len(),
                "job process finished"
            );
            report(&tx, observation(&spec, condition, results)).await;
            report(
                &tx,
                JobWatchEvent::Deleted {
                    job_name: spec.name,
                    labels: spec.labels,
                },
            )
            .await;
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use sbomer_core::job::GENERATION_ID_LABEL;

    use super::*;

    fn spec(command: &[&str]) -> JobSpec {
        JobSpec {
            name: "sbomer-g1".to_owned(),
            labels: BTreeMap::from([(GENERATION_ID_LABEL.to_owned(), "g1".to_owned())]),
            image: String::new(),
            command: command.iter().map(|s| (*s).to_owned()).collect(),
            env: BTreeMap::from([("SBOMER_TARGET_IDENTIFIER".to_owned(), "abc".to_owned())]),
        }
    }

    async fn next(rx: &mut mpsc::Receiver<JobWatchEvent>) -> JobWatchEvent {
        tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("observation in time")
            .expect("channel open")
    }

    fn first_condition(event: &JobWatchEvent) -> &JobCondition {
        match event {
            JobWatchEvent::Applied(observation) => &observation.conditions[0],
            JobWatchEvent::Deleted { .. } => panic!("expected applied observation"),
        }
    }

    #[tokio::test]
    async fn successful_job_reports_running_complete_and_deleted() {
        let (tx, mut rx) = mpsc::channel(8);
        let runner = ProcessJobRunner::new(tx);

        runner
            .dispatch(spec(&["sh", "-c", "echo file:///sbom/$SBOMER_TARGET_IDENTIFIER.json"]))
            .await
            .unwrap();

        let running = next(&mut rx).await;
        assert_eq!(first_condition(&running).status, ConditionStatus::Unknown);

        let complete = next(&mut rx).await;
        assert_eq!(first_condition(&complete).status, ConditionStatus::True);
        match &complete {
            JobWatchEvent::Applied(observation) => {
                assert_eq!(observation.results, vec!["file:///sbom/abc.json"]);
                assert_eq!(observation.generation_id(), Some("g1"));
            }
            JobWatchEvent::Deleted { .. } => unreachable!(),
        }

        assert!(matches!(next(&mut rx).await, JobWatchEvent::Deleted { .. }));
        assert!(runner.shutdown(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn failing_job_reports_false_with_stderr() {
        let (tx, mut rx) = mpsc::channel(8);
        let runner = ProcessJobRunner::new(tx);

        runner
            .dispatch(spec(&["sh", "-c", "echo registry unreachable >&2; exit 3"]))
            .await
            .unwrap();

        let _running = next(&mut rx).await;
        let failed = next(&mut rx).await;
        let condition = first_condition(&failed);
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.message.as_deref(), Some("registry unreachable"));
    }

    #[tokio::test]
    async fn missing_program_fails_dispatch() {
        let (tx, _rx) = mpsc::channel(8);
        let runner = ProcessJobRunner::new(tx);
        let err = runner
            .dispatch(spec(&["/nonexistent/sbomer-generate"]))
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::Dispatch { .. }));
    }

    #[tokio::test]
    async fn empty_command_fails_dispatch() {
        let (tx, _rx) = mpsc::channel(8);
        let runner = ProcessJobRunner::new(tx);
        assert!(runner.dispatch(spec(&[])).await.is_err());
    }

    #[tokio::test]
    async fn closed_runner_rejects_jobs() {
        let (tx, _rx) = mpsc::channel(8);
        let runner = ProcessJobRunner::new(tx);
        assert!(runner.shutdown(Duration::from_millis(10)).await);
        assert!(runner.dispatch(spec(&["true"])).await.is_err());
    }

    #[test]
    fn long_messages_are_truncated() {
        let message = truncate("x".repeat(MAX_MESSAGE_LEN + 10));
        assert_eq!(message.len(), MAX_MESSAGE_LEN);
    }
}
