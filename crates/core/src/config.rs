//! 설정 관리 — sbomer.toml 파싱 및 런타임 설정
//!
//! [`SbomerConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SBOMER_LEADER_LEASE_DURATION_SECS=30` 형식)
//! 3. 설정 파일 (`sbomer.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), sbomer_core::error::SbomerError> {
//! use sbomer_core::config::SbomerConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = SbomerConfig::load("sbomer.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = SbomerConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SbomerError};

/// SBOMer 통합 설정
///
/// `sbomer.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 컴포넌트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SbomerConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub leader: LeaderConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl SbomerConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드와 검증을 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SbomerError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SbomerError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SbomerError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SbomerError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SbomerError> {
        toml::from_str(toml_str).map_err(|e| {
            SbomerError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SBOMER_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SBOMER_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SBOMER_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.identity, "SBOMER_GENERAL_IDENTITY");

        // Worker
        override_usize(
            &mut self.worker.max_concurrency,
            "SBOMER_WORKER_MAX_CONCURRENCY",
        );
        override_usize(
            &mut self.worker.queue_capacity,
            "SBOMER_WORKER_QUEUE_CAPACITY",
        );
        override_u64(
            &mut self.worker.shutdown_grace_secs,
            "SBOMER_WORKER_SHUTDOWN_GRACE_SECS",
        );

        // Resolver
        override_u64(
            &mut self.resolver.timeout_secs,
            "SBOMER_RESOLVER_TIMEOUT_SECS",
        );

        // Generator
        override_u64(
            &mut self.generator.timeout_secs,
            "SBOMER_GENERATOR_TIMEOUT_SECS",
        );
        override_bool(
            &mut self.generator.job.enabled,
            "SBOMER_GENERATOR_JOB_ENABLED",
        );
        override_string(&mut self.generator.job.image, "SBOMER_GENERATOR_JOB_IMAGE");
        override_csv(
            &mut self.generator.job.target_types,
            "SBOMER_GENERATOR_JOB_TARGET_TYPES",
        );
        override_bool(
            &mut self.generator.command.enabled,
            "SBOMER_GENERATOR_COMMAND_ENABLED",
        );
        override_string(
            &mut self.generator.command.program,
            "SBOMER_GENERATOR_COMMAND_PROGRAM",
        );
        override_csv(
            &mut self.generator.command.target_types,
            "SBOMER_GENERATOR_COMMAND_TARGET_TYPES",
        );

        // Leader
        override_bool(&mut self.leader.enabled, "SBOMER_LEADER_ENABLED");
        override_string(&mut self.leader.lease_name, "SBOMER_LEADER_LEASE_NAME");
        override_string(&mut self.leader.lease_dir, "SBOMER_LEADER_LEASE_DIR");
        override_u64(
            &mut self.leader.lease_duration_secs,
            "SBOMER_LEADER_LEASE_DURATION_SECS",
        );
        override_u64(
            &mut self.leader.renew_interval_secs,
            "SBOMER_LEADER_RENEW_INTERVAL_SECS",
        );

        // Reconciler
        override_usize(
            &mut self.reconciler.channel_capacity,
            "SBOMER_RECONCILER_CHANNEL_CAPACITY",
        );

        // Scheduler
        override_u64(
            &mut self.scheduler.sweep_interval_secs,
            "SBOMER_SCHEDULER_SWEEP_INTERVAL_SECS",
        );
        override_u64(
            &mut self.scheduler.stale_after_secs,
            "SBOMER_SCHEDULER_STALE_AFTER_SECS",
        );
        override_u64(
            &mut self.scheduler.archive_after_secs,
            "SBOMER_SCHEDULER_ARCHIVE_AFTER_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "SBOMER_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "SBOMER_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "SBOMER_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SbomerError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.general.identity.trim().is_empty() {
            return Err(invalid("general.identity", "must not be empty"));
        }

        if self.worker.max_concurrency == 0 {
            return Err(invalid("worker.max_concurrency", "must be greater than 0"));
        }
        if self.worker.queue_capacity == 0 {
            return Err(invalid("worker.queue_capacity", "must be greater than 0"));
        }

        if self.resolver.timeout_secs == 0 {
            return Err(invalid("resolver.timeout_secs", "must be greater than 0"));
        }
        let mut keys = HashSet::new();
        for (idx, route) in self.resolver.routes.iter().enumerate() {
            if route.key.trim().is_empty() {
                return Err(invalid(
                    format!("resolver.routes[{idx}].key"),
                    "must not be empty",
                ));
            }
            if route.target_type.trim().is_empty() {
                return Err(invalid(
                    format!("resolver.routes[{idx}].target_type"),
                    "must not be empty",
                ));
            }
            if !keys.insert(route.key.as_str()) {
                return Err(invalid(
                    format!("resolver.routes[{idx}].key"),
                    format!("duplicate routing key '{}'", route.key),
                ));
            }
            if let Some(requirement) = &route.generator_version {
                semver::VersionReq::parse(requirement).map_err(|e| {
                    invalid(
                        format!("resolver.routes[{idx}].generator_version"),
                        e.to_string(),
                    )
                })?;
            }
        }

        if self.generator.timeout_secs == 0 {
            return Err(invalid("generator.timeout_secs", "must be greater than 0"));
        }
        self.generator.job.validate()?;
        self.generator.command.validate()?;

        if self.leader.renew_interval_secs == 0 {
            return Err(invalid("leader.renew_interval_secs", "must be greater than 0"));
        }
        if self.leader.lease_duration_secs <= self.leader.renew_interval_secs {
            return Err(invalid(
                "leader.lease_duration_secs",
                "must be greater than leader.renew_interval_secs",
            ));
        }
        if self.leader.lease_name.trim().is_empty() {
            return Err(invalid("leader.lease_name", "must not be empty"));
        }

        if self.reconciler.channel_capacity == 0 {
            return Err(invalid("reconciler.channel_capacity", "must be greater than 0"));
        }

        if self.scheduler.sweep_interval_secs == 0 {
            return Err(invalid("scheduler.sweep_interval_secs", "must be greater than 0"));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must be greater than 0"));
        }

        Ok(())
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> SbomerError {
    ConfigError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
    .into()
}

/// 인스턴스 식별자 기본값: `HOSTNAME` 또는 임의 UUID
fn default_identity() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| format!("sbomer-{}", uuid::Uuid::new_v4()))
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 리더 선출에 쓰이는 인스턴스 식별자
    pub identity: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            identity: default_identity(),
        }
    }
}

/// 워커 풀 및 버스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// 컴포넌트별 최대 동시 작업 수
    pub max_concurrency: usize,
    /// 구독자 큐 용량
    pub queue_capacity: usize,
    /// 종료 시 진행 중인 작업 대기 시간 (초)
    pub shutdown_grace_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            queue_capacity: 256,
            shutdown_grace_secs: 30,
        }
    }
}

/// 라우팅 테이블 항목 — 라우팅 키 하나에 대상 유형 하나
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// 라우팅 키 (Event 메타데이터 `resolver` 값)
    pub key: String,
    /// 생성할 Generation의 대상 유형
    pub target_type: String,
    /// 특정 generator 이름 (선택)
    #[serde(default)]
    pub generator: Option<String>,
    /// generator 버전 요구사항 (semver requirement, 선택)
    #[serde(default)]
    pub generator_version: Option<String>,
}

/// resolver 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// resolver 호출 제한 시간 (초)
    pub timeout_secs: u64,
    /// 라우팅 테이블
    pub routes: Vec<RouteConfig>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            routes: Vec::new(),
        }
    }
}

/// generator 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// generator 호출 제한 시간 (초)
    pub timeout_secs: u64,
    /// 외부 잡 generator
    pub job: JobGeneratorConfig,
    /// 프로세스 내 명령 generator
    pub command: CommandGeneratorConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            job: JobGeneratorConfig::default(),
            command: CommandGeneratorConfig::default(),
        }
    }
}

/// 외부 잡 generator 설정
///
/// `command`와 `image`의 `{target_type}`, `{identifier}`, `{generation_id}`
/// 자리표시자는 Generation 값으로 치환됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobGeneratorConfig {
    pub enabled: bool,
    /// generator 이름
    pub name: String,
    /// generator 버전 (semver)
    pub version: String,
    /// 처리하는 대상 유형
    pub target_types: Vec<String>,
    /// 잡 이미지
    pub image: String,
    /// 잡 명령 (첫 항목이 실행 파일)
    pub command: Vec<String>,
    /// Manifest 없이 성공해도 되는 대상 유형
    pub empty_ok_target_types: Vec<String>,
}

impl Default for JobGeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "job".to_owned(),
            version: "1.0.0".to_owned(),
            target_types: Vec::new(),
            image: String::new(),
            command: Vec::new(),
            empty_ok_target_types: Vec::new(),
        }
    }
}

impl JobGeneratorConfig {
    fn validate(&self) -> Result<(), SbomerError> {
        semver::Version::parse(&self.version)
            .map_err(|e| invalid("generator.job.version", e.to_string()))?;
        if !self.enabled {
            return Ok(());
        }
        if self.target_types.is_empty() {
            return Err(invalid(
                "generator.job.target_types",
                "must not be empty when the job generator is enabled",
            ));
        }
        if self.command.is_empty() {
            return Err(invalid(
                "generator.job.command",
                "must not be empty when the job generator is enabled",
            ));
        }
        Ok(())
    }
}

/// 프로세스 내 명령 generator 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandGeneratorConfig {
    pub enabled: bool,
    /// generator 이름
    pub name: String,
    /// generator 버전 (semver)
    pub version: String,
    /// 처리하는 대상 유형
    pub target_types: Vec<String>,
    /// 실행 파일
    pub program: String,
    /// 인자 (자리표시자 치환)
    pub args: Vec<String>,
    /// 명령 실행 제한 시간 (초)
    pub timeout_secs: u64,
}

impl Default for CommandGeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "command".to_owned(),
            version: "1.0.0".to_owned(),
            target_types: Vec::new(),
            program: String::new(),
            args: Vec::new(),
            timeout_secs: 300,
        }
    }
}

impl CommandGeneratorConfig {
    fn validate(&self) -> Result<(), SbomerError> {
        semver::Version::parse(&self.version)
            .map_err(|e| invalid("generator.command.version", e.to_string()))?;
        if !self.enabled {
            return Ok(());
        }
        if self.target_types.is_empty() {
            return Err(invalid(
                "generator.command.target_types",
                "must not be empty when the command generator is enabled",
            ));
        }
        if self.program.trim().is_empty() {
            return Err(invalid(
                "generator.command.program",
                "must not be empty when the command generator is enabled",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(invalid(
                "generator.command.timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// 리더 선출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderConfig {
    /// 비활성화하면 이 인스턴스는 항상 리더 (단일 인스턴스 배포)
    pub enabled: bool,
    /// 리스 이름
    pub lease_name: String,
    /// 리스 파일 디렉토리 (빈 문자열이면 메모리 저장소)
    pub lease_dir: String,
    /// 리스 유효 기간 (초)
    pub lease_duration_secs: u64,
    /// 갱신 주기 (초)
    pub renew_interval_secs: u64,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lease_name: "sbomer-leader".to_owned(),
            lease_dir: String::new(),
            lease_duration_secs: 15,
            renew_interval_secs: 5,
        }
    }
}

/// 잡 조정 브리지 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// 잡 관측 채널 용량
    pub channel_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// 스케줄러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 스윕 주기 (초)
    pub sweep_interval_secs: u64,
    /// NEW 상태로 이 시간 이상 머문 레코드는 신호를 재발행 (초)
    pub stale_after_secs: u64,
    /// 종료 후 이 시간이 지난 Event를 보관 (초, 0이면 비활성)
    pub archive_after_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 30,
            stale_after_secs: 120,
            archive_after_secs: 0,
        }
    }
}

/// Prometheus 메트릭 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: String,
    pub port: u16,
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = SbomerConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert!(!config.general.identity.is_empty());
        assert!(config.leader.enabled);
        assert!(config.leader.lease_duration_secs > config.leader.renew_interval_secs);
        assert!(!config.generator.job.enabled);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        SbomerConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = SbomerConfig::parse("").unwrap();
        assert_eq!(config.worker.max_concurrency, 16);
        assert!(config.resolver.routes.is_empty());
    }

    #[test]
    fn parses_route_table_and_generators() {
        let toml = r#"
[general]
identity = "replica-a"

[[resolver.routes]]
key = "X"
target_type = "T"

[[resolver.routes]]
key = "advisory"
target_type = "container-image"
generator = "syft"
generator_version = "^1.0"

[generator.command]
enabled = true
target_types = ["T"]
program = "echo"
args = ["{}"]
"#;
        let config = SbomerConfig::parse(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.general.identity, "replica-a");
        assert_eq!(config.resolver.routes.len(), 2);
        assert_eq!(config.resolver.routes[1].generator.as_deref(), Some("syft"));
        assert!(config.generator.command.enabled);
        assert_eq!(config.generator.command.args, vec!["{}".to_owned()]);
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = SbomerConfig::parse("[general\nlog_level = 1").unwrap_err();
        assert!(matches!(
            err,
            SbomerError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn rejects_invalid_log_level() {
        let mut config = SbomerConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("general.log_level"));
    }

    #[test]
    fn rejects_lease_duration_not_greater_than_renew_interval() {
        let mut config = SbomerConfig::default();
        config.leader.lease_duration_secs = 5;
        config.leader.renew_interval_secs = 5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("leader.lease_duration_secs"));
    }

    #[test]
    fn rejects_duplicate_routing_keys() {
        let mut config = SbomerConfig::default();
        let route = RouteConfig {
            key: "X".to_owned(),
            target_type: "T".to_owned(),
            ..RouteConfig::default()
        };
        config.resolver.routes = vec![route.clone(), route];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate routing key"));
    }

    #[test]
    fn rejects_malformed_generator_versions() {
        let mut config = SbomerConfig::default();
        config.generator.job.version = "one".to_owned();
        assert!(config.validate().is_err());

        let mut config = SbomerConfig::default();
        config.resolver.routes = vec![RouteConfig {
            key: "X".to_owned(),
            target_type: "T".to_owned(),
            generator: Some("job".to_owned()),
            generator_version: Some(">>1".to_owned()),
        }];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("generator_version"));
    }

    #[test]
    fn rejects_enabled_job_generator_without_command() {
        let mut config = SbomerConfig::default();
        config.generator.job.enabled = true;
        config.generator.job.target_types = vec!["T".to_owned()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("generator.job.command"));
    }

    #[test]
    fn rejects_zero_capacities() {
        let mut config = SbomerConfig::default();
        config.worker.max_concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = SbomerConfig::default();
        config.reconciler.channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn from_file_missing_is_file_not_found() {
        let err = SbomerConfig::from_file("/nonexistent/sbomer.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SbomerError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        // SAFETY: serial 테스트에서만 환경변수를 변경함
        unsafe {
            std::env::set_var("SBOMER_LEADER_LEASE_DURATION_SECS", "60");
            std::env::set_var("SBOMER_GENERATOR_JOB_TARGET_TYPES", "maven, npm,");
        }
        let mut config = SbomerConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("SBOMER_LEADER_LEASE_DURATION_SECS");
            std::env::remove_var("SBOMER_GENERATOR_JOB_TARGET_TYPES");
        }
        assert_eq!(config.leader.lease_duration_secs, 60);
        assert_eq!(
            config.generator.job.target_types,
            vec!["maven".to_owned(), "npm".to_owned()]
        );
    }

    #[test]
    #[serial]
    fn invalid_env_override_is_ignored() {
        unsafe {
            std::env::set_var("SBOMER_WORKER_MAX_CONCURRENCY", "many");
        }
        let mut config = SbomerConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("SBOMER_WORKER_MAX_CONCURRENCY");
        }
        assert_eq!(config.worker.max_concurrency, 16);
    }
}
