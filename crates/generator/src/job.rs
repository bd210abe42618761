//! 외부 잡 generator와 잡 러너 추상화
//!
//! [`JobRunner`] trait은 외부 잡 실행 시스템을 추상화하여, 운영에서는
//! [`ProcessJobRunner`](crate::process::ProcessJobRunner)를, 테스트에서는
//! `MockJobRunner`를 사용할 수 있게 합니다.
//!
//! ```text
//! ┌──────────────┐   JobSpec   ┌───────────┐  JobWatchEvent  ┌──────────────┐
//! │ JobGenerator │ ──────────> │ JobRunner │ ──────────────> │ JobReconciler│
//! └──────────────┘             └───────────┘                 └──────────────┘
//! ```
//!
//! [`JobGenerator`]는 디스패치만 하고 `Dispatched`를 반환합니다.
//! Generation의 종료 상태는 조정 브리지가 잡 결과를 보고 설정합니다.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use sbomer_core::config::JobGeneratorConfig;
use sbomer_core::job::GENERATION_ID_LABEL;
use sbomer_core::types::Generation;
use tracing::info;

use crate::error::GeneratorError;
use crate::generator::{Generator, GeneratorOutcome, parse_version, render_placeholders};

/// 잡 이름 접두어
pub const JOB_NAME_PREFIX: &str = "sbomer-";

/// 외부 잡 명세
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// 잡 이름 (`sbomer-<generation id>`)
    pub name: String,
    /// 레이블 (상관 레이블 포함)
    pub labels: BTreeMap<String, String>,
    /// 실행 이미지
    pub image: String,
    /// 명령 (첫 항목이 실행 파일)
    pub command: Vec<String>,
    /// 환경변수
    pub env: BTreeMap<String, String>,
}

impl JobSpec {
    /// Generation에 대한 잡 이름
    pub fn name_for(generation_id: &str) -> String {
        format!("{JOB_NAME_PREFIX}{generation_id}")
    }

    /// 상관 레이블의 Generation ID
    pub fn generation_id(&self) -> Option<&str> {
        self.labels.get(GENERATION_ID_LABEL).map(String::as_str)
    }
}

/// 외부 잡 실행 시스템
///
/// 디스패치된 잡의 진행 상황은 러너가 별도 경로(감시 채널)로 보고합니다.
pub trait JobRunner: Send + Sync + 'static {
    /// 잡을 제출합니다. 잡 완료를 기다리지 않습니다.
    fn dispatch(&self, spec: JobSpec) -> impl Future<Output = Result<(), GeneratorError>> + Send;
}

impl<R: JobRunner> JobRunner for Arc<R> {
    fn dispatch(&self, spec: JobSpec) -> impl Future<Output = Result<(), GeneratorError>> + Send {
        (**self).dispatch(spec)
    }
}

/// 외부 잡으로 위임하는 generator
pub struct JobGenerator<R> {
    name: String,
    version: semver::Version,
    target_types: Vec<String>,
    image: String,
    command: Vec<String>,
    runner: R,
}

impl<R: JobRunner> JobGenerator<R> {
    /// 설정과 러너로 generator를 생성합니다.
    pub fn from_config(config: &JobGeneratorConfig, runner: R) -> Result<Self, GeneratorError> {
        if config.command.is_empty() {
            return Err(GeneratorError::Config {
                field: "generator.job.command".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(Self {
            name: config.name.clone(),
            version: parse_version(&config.version)?,
            target_types: config.target_types.clone(),
            image: config.image.clone(),
            command: config.command.clone(),
            runner,
        })
    }

    /// Generation에 대한 잡 명세를 만듭니다.
    pub fn job_spec(&self, generation: &Generation) -> JobSpec {
        let mut env = BTreeMap::from([
            ("SBOMER_GENERATION_ID".to_owned(), generation.id.clone()),
            (
                "SBOMER_TARGET_TYPE".to_owned(),
                generation.target_type().to_owned(),
            ),
            (
                "SBOMER_TARGET_IDENTIFIER".to_owned(),
                generation.target_identifier().to_owned(),
            ),
        ]);
        if let Some(selection) = &generation.request.generator {
            for (key, value) in &selection.options {
                env.insert(option_env_name(key), value.clone());
            }
        }

        JobSpec {
            name: JobSpec::name_for(&generation.id),
            labels: BTreeMap::from([(GENERATION_ID_LABEL.to_owned(), generation.id.clone())]),
            image: render_placeholders(&self.image, generation),
            command: self
                .command
                .iter()
                .map(|arg| render_placeholders(arg, generation))
                .collect(),
            env,
        }
    }
}

/// generator 옵션 키를 환경변수 이름으로 바꿉니다 (`output-format` → `SBOMER_OPTION_OUTPUT_FORMAT`).
fn option_env_name(key: &str) -> String {
    let normalized: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("SBOMER_OPTION_{normalized}")
}

impl<R: JobRunner> Generator for JobGenerator<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &semver::Version {
        &self.version
    }

    fn supported_target_types(&self) -> &[String] {
        &self.target_types
    }

    async fn generate(&self, generation: &Generation) -> Result<GeneratorOutcome, GeneratorError> {
        let spec = self.job_spec(generation);
        let job_name = spec.name.clone();
        self.runner.dispatch(spec).await?;
        info!(
            generation_id = %generation.id,
            job = %job_name,
            generator = %self.name,
            "job dispatched"
        );
        Ok(GeneratorOutcome::Dispatched { job_name })
    }
}

/// 테스트용 Mock 잡 러너
///
/// 제출된 잡 명세를 기록하고, 설정에 따라 실패를 시뮬레이션합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockJobRunner {
    /// 제출된 잡 명세
    pub dispatched: std::sync::Mutex<Vec<JobSpec>>,
    /// 디스패치 실패를 시뮬레이션할지 여부
    pub fail_dispatch: bool,
}

#[cfg(test)]
impl MockJobRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 디스패치 시 실패하도록 설정합니다.
    pub fn with_failing_dispatch(mut self) -> Self {
        self.fail_dispatch = true;
        self
    }

    /// 제출된 잡 이름 목록
    pub fn job_names(&self) -> Vec<String> {
        self.dispatched
            .lock()
            .map(|jobs| jobs.iter().map(|j| j.name.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl JobRunner for MockJobRunner {
    async fn dispatch(&self, spec: JobSpec) -> Result<(), GeneratorError> {
        if self.fail_dispatch {
            return Err(GeneratorError::Dispatch {
                job_name: spec.name,
                reason: "mock failure".to_owned(),
            });
        }
        if let Ok(mut jobs) = self.dispatched.lock() {
            jobs.push(spec);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sbomer_core::types::{GenerationRequest, GeneratorSelection};

    use super::*;

    fn config() -> JobGeneratorConfig {
        JobGeneratorConfig {
            enabled: true,
            target_types: vec!["container-image".to_owned()],
            image: "quay.io/sbomer/generator:latest".to_owned(),
            command: vec![
                "generate".to_owned(),
                "--type".to_owned(),
                "{target_type}".to_owned(),
                "{identifier}".to_owned(),
            ],
            ..Default::default()
        }
    }

    fn generation() -> Generation {
        let request = GenerationRequest::for_target("container-image", "quay.io/org/app:1.0")
            .with_generator(GeneratorSelection {
                name: "job".to_owned(),
                version: None,
                options: BTreeMap::from([("output-format".to_owned(), "json".to_owned())]),
            });
        Generation::new("e-1", request)
    }

    #[test]
    fn job_spec_carries_correlation_label_and_rendered_command() {
        let generator = JobGenerator::from_config(&config(), MockJobRunner::new()).unwrap();
        let generation = generation();
        let spec = generator.job_spec(&generation);

        assert_eq!(spec.name, format!("sbomer-{}", generation.id));
        assert_eq!(spec.generation_id(), Some(generation.id.as_str()));
        assert_eq!(
            spec.command,
            vec!["generate", "--type", "container-image", "quay.io/org/app:1.0"]
        );
        assert_eq!(spec.env["SBOMER_OPTION_OUTPUT_FORMAT"], "json");
        assert_eq!(spec.env["SBOMER_TARGET_TYPE"], "container-image");
    }

    #[tokio::test]
    async fn generate_dispatches_and_does_not_complete() {
        let runner = Arc::new(MockJobRunner::new());
        let generator = JobGenerator::from_config(&config(), Arc::clone(&runner)).unwrap();
        let generation = generation();

        let outcome = generator.generate(&generation).await.unwrap();

        assert_eq!(
            outcome,
            GeneratorOutcome::Dispatched {
                job_name: JobSpec::name_for(&generation.id)
            }
        );
        assert_eq!(runner.job_names(), vec![JobSpec::name_for(&generation.id)]);
    }

    #[tokio::test]
    async fn dispatch_failure_is_an_error() {
        let generator =
            JobGenerator::from_config(&config(), MockJobRunner::new().with_failing_dispatch())
                .unwrap();
        let err = generator.generate(&generation()).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Dispatch { .. }));
    }

    #[test]
    fn empty_command_is_rejected() {
        let mut config = config();
        config.command.clear();
        assert!(JobGenerator::from_config(&config, MockJobRunner::new()).is_err());
    }

    #[test]
    fn option_keys_become_env_names() {
        assert_eq!(option_env_name("output-format"), "SBOMER_OPTION_OUTPUT_FORMAT");
        assert_eq!(option_env_name("spec.version"), "SBOMER_OPTION_SPEC_VERSION");
    }
}
