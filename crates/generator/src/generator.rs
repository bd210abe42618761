//! Generator trait — Generation을 Manifest로 바꾸는 확장 지점
//!
//! generator는 대상 유형(`target.type`)으로 선택됩니다. 요청이 generator를
//! 지정하면 이름이 같고 버전 요구사항을 만족하는 generator만 처리합니다.

use std::future::Future;

use sbomer_core::pipeline::BoxFuture;
use sbomer_core::types::{Generation, GenerationRequest, ManifestContent};

use crate::error::GeneratorError;

/// generator 호출 결과
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorOutcome {
    /// 외부 잡으로 위임됨. 종료 상태는 조정 브리지가 설정합니다.
    Dispatched { job_name: String },
    /// 프로세스 내에서 완료됨
    Completed { manifests: Vec<ManifestContent> },
}

/// Manifest 생성 전략
pub trait Generator: Send + Sync + 'static {
    /// generator 이름
    fn name(&self) -> &str;

    /// generator 버전
    fn version(&self) -> &semver::Version;

    /// 처리하는 대상 유형
    fn supported_target_types(&self) -> &[String];

    /// 대상 유형 지원 여부
    fn supports(&self, target_type: &str) -> bool {
        self.supported_target_types()
            .iter()
            .any(|t| t == target_type)
    }

    /// 요청을 처리할 수 있는지 확인합니다.
    ///
    /// 대상 유형을 지원해야 하며, generator 지정이 있으면 이름이 같고
    /// 버전 요구사항(semver)을 만족해야 합니다. 해석할 수 없는 요구사항은 불일치로 봅니다.
    fn accepts(&self, request: &GenerationRequest) -> bool {
        if !self.supports(&request.target.target_type) {
            return false;
        }
        let Some(selection) = &request.generator else {
            return true;
        };
        if selection.name != self.name() {
            return false;
        }
        match &selection.version {
            None => true,
            Some(req) => semver::VersionReq::parse(req)
                .map(|req| req.matches(self.version()))
                .unwrap_or(false),
        }
    }

    /// Manifest를 생성하거나 외부 잡을 디스패치합니다.
    fn generate(
        &self,
        generation: &Generation,
    ) -> impl Future<Output = Result<GeneratorOutcome, GeneratorError>> + Send;
}

/// dyn-compatible generator trait
pub trait DynGenerator: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn version(&self) -> &semver::Version;

    fn supported_target_types(&self) -> &[String];

    fn accepts(&self, request: &GenerationRequest) -> bool;

    fn generate<'a>(
        &'a self,
        generation: &'a Generation,
    ) -> BoxFuture<'a, Result<GeneratorOutcome, GeneratorError>>;
}

impl<T: Generator> DynGenerator for T {
    fn name(&self) -> &str {
        Generator::name(self)
    }

    fn version(&self) -> &semver::Version {
        Generator::version(self)
    }

    fn supported_target_types(&self) -> &[String] {
        Generator::supported_target_types(self)
    }

    fn accepts(&self, request: &GenerationRequest) -> bool {
        Generator::accepts(self, request)
    }

    fn generate<'a>(
        &'a self,
        generation: &'a Generation,
    ) -> BoxFuture<'a, Result<GeneratorOutcome, GeneratorError>> {
        Box::pin(Generator::generate(self, generation))
    }
}

/// `{target_type}`, `{identifier}`, `{generation_id}` 자리표시자를 치환합니다.
pub fn render_placeholders(template: &str, generation: &Generation) -> String {
    template
        .replace("{target_type}", generation.target_type())
        .replace("{identifier}", generation.target_identifier())
        .replace("{generation_id}", &generation.id)
}

/// 버전 문자열을 파싱합니다.
pub(crate) fn parse_version(version: &str) -> Result<semver::Version, GeneratorError> {
    semver::Version::parse(version).map_err(|e| GeneratorError::InvalidVersion {
        version: version.to_owned(),
        reason: e.to_string(),
    })
}
