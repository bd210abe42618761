//! Generator 레지스트리 — 시작 시 구성되는 generator 목록

use std::sync::Arc;

use sbomer_core::types::GenerationRequest;

use crate::error::GeneratorError;
use crate::generator::{DynGenerator, Generator};

/// 등록 순서를 유지하는 generator 테이블
///
/// 요청을 받아들이는 첫 번째 generator가 선택됩니다.
#[derive(Default, Clone)]
pub struct GeneratorRegistry {
    generators: Vec<Arc<dyn DynGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// generator를 등록합니다. 같은 이름이 이미 있으면 에러입니다.
    pub fn register<G: Generator>(&mut self, generator: G) -> Result<(), GeneratorError> {
        self.register_arc(Arc::new(generator))
    }

    pub fn register_arc(&mut self, generator: Arc<dyn DynGenerator>) -> Result<(), GeneratorError> {
        if self.generators.iter().any(|g| g.name() == generator.name()) {
            return Err(GeneratorError::AlreadyRegistered {
                name: generator.name().to_owned(),
            });
        }
        self.generators.push(generator);
        Ok(())
    }

    /// 요청을 처리할 generator를 찾습니다.
    pub fn find_for(&self, request: &GenerationRequest) -> Option<Arc<dyn DynGenerator>> {
        self.generators
            .iter()
            .find(|g| g.accepts(request))
            .cloned()
    }

    /// 등록된 generator 이름 (등록 순)
    pub fn names(&self) -> Vec<String> {
        self.generators.iter().map(|g| g.name().to_owned()).collect()
    }

    /// 지원하는 모든 대상 유형 (중복 제거, 정렬)
    pub fn supported_target_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .generators
            .iter()
            .flat_map(|g| g.supported_target_types().iter().cloned())
            .collect();
        types.sort();
        types.dedup();
        types
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use sbomer_core::types::{Generation, GeneratorSelection};

    use super::*;
    use crate::generator::GeneratorOutcome;

    struct Named {
        name: &'static str,
        version: semver::Version,
        target_types: Vec<String>,
    }

    impl Named {
        fn new(name: &'static str, target_types: &[&str]) -> Self {
            Self {
                name,
                version: semver::Version::new(1, 0, 0),
                target_types: target_types.iter().map(|t| (*t).to_owned()).collect(),
            }
        }
    }

    impl Generator for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn version(&self) -> &semver::Version {
            &self.version
        }

        fn supported_target_types(&self) -> &[String] {
            &self.target_types
        }

        async fn generate(
            &self,
            _generation: &Generation,
        ) -> Result<GeneratorOutcome, GeneratorError> {
            Ok(GeneratorOutcome::Completed {
                manifests: Vec::new(),
            })
        }
    }

    #[test]
    fn first_accepting_generator_wins() {
        let mut registry = GeneratorRegistry::new();
        registry.register(Named::new("a", &["T"])).unwrap();
        registry.register(Named::new("b", &["T", "U"])).unwrap();

        let plain = GenerationRequest::for_target("T", "x");
        assert_eq!(registry.find_for(&plain).unwrap().name(), "a");

        let pinned = GenerationRequest::for_target("T", "x").with_generator(GeneratorSelection {
            name: "b".to_owned(),
            ..Default::default()
        });
        assert_eq!(registry.find_for(&pinned).unwrap().name(), "b");
    }

    #[test]
    fn unsupported_target_has_no_generator() {
        let mut registry = GeneratorRegistry::new();
        registry.register(Named::new("a", &["T"])).unwrap();
        assert!(registry.find_for(&GenerationRequest::for_target("Z", "x")).is_none());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut registry = GeneratorRegistry::new();
        registry.register(Named::new("a", &["T"])).unwrap();
        assert!(matches!(
            registry.register(Named::new("a", &["U"])),
            Err(GeneratorError::AlreadyRegistered { .. })
        ));
    }

    #[test]
    fn supported_target_types_are_merged() {
        let mut registry = GeneratorRegistry::new();
        registry.register(Named::new("a", &["T", "U"])).unwrap();
        registry.register(Named::new("b", &["U", "V"])).unwrap();
        assert_eq!(registry.supported_target_types(), vec!["T", "U", "V"]);
        assert_eq!(registry.names(), vec!["a", "b"]);
    }
}
