//! 프로세스 내 명령 generator
//!
//! 설정된 명령을 제한 시간 안에 실행하고, stdout(JSON 문서)을 인라인
//! Manifest 하나로 저장합니다. 종료 상태는 generator 서비스가 직접 설정합니다.

use std::process::Stdio;
use std::time::Duration;

use sbomer_core::config::CommandGeneratorConfig;
use sbomer_core::types::{Generation, ManifestContent};
use tracing::debug;

use crate::error::GeneratorError;
use crate::generator::{Generator, GeneratorOutcome, parse_version, render_placeholders};

/// 명령 실행 generator
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    name: String,
    version: semver::Version,
    target_types: Vec<String>,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandGenerator {
    /// 설정으로 generator를 생성합니다.
    pub fn from_config(config: &CommandGeneratorConfig) -> Result<Self, GeneratorError> {
        if config.program.trim().is_empty() {
            return Err(GeneratorError::Config {
                field: "generator.command.program".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        if config.timeout_secs == 0 {
            return Err(GeneratorError::Config {
                field: "generator.command.timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(Self {
            name: config.name.clone(),
            version: parse_version(&config.version)?,
            target_types: config.target_types.clone(),
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    async fn run(&self, generation: &Generation) -> Result<Vec<u8>, GeneratorError> {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| render_placeholders(arg, generation))
            .collect();
        debug!(
            generation_id = %generation.id,
            program = %self.program,
            ?args,
            "running generator command"
        );

        let command_error = |reason: String| GeneratorError::Command {
            program: self.program.clone(),
            reason,
        };

        let child = tokio::process::Command::new(&self.program)
            .args(&args)
            .env("SBOMER_GENERATION_ID", &generation.id)
            .env("SBOMER_TARGET_TYPE", generation.target_type())
            .env("SBOMER_TARGET_IDENTIFIER", generation.target_identifier())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| command_error(format!("failed to spawn: {e}")))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| command_error(format!("timed out after {}s", self.timeout.as_secs())))?
            .map_err(|e| command_error(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            let reason = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                format!("exited with {}: {stderr}", output.status)
            };
            return Err(command_error(reason));
        }
        Ok(output.stdout)
    }
}

impl Generator for CommandGenerator {
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
        let stdout = self.run(generation).await?;
        if stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(GeneratorError::InvalidOutput(
                "command produced no output".to_owned(),
            ));
        }
        let document: serde_json::Value = serde_json::from_slice(&stdout)
            .map_err(|e| GeneratorError::InvalidOutput(format!("stdout is not JSON: {e}")))?;

        Ok(GeneratorOutcome::Completed {
            manifests: vec![ManifestContent::Inline(document)],
        })
    }
}
