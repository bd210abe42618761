//! 라우트 테이블 resolver
//!
//! `[[resolver.routes]]` 항목 하나가 [`RouteResolver`] 하나가 됩니다.
//! 식별자를 쉼표로 나눠 항목마다 Generation 요청을 하나씩 만듭니다.

use sbomer_core::config::RouteConfig;
use sbomer_core::types::{GenerationRequest, GeneratorSelection};
use tracing::debug;

use crate::error::ResolverError;
use crate::resolver::Resolver;

/// 설정 기반 resolver
#[derive(Debug, Clone)]
pub struct RouteResolver {
    key: String,
    target_type: String,
    generator: Option<GeneratorSelection>,
}

impl RouteResolver {
    /// 라우팅 키와 대상 유형으로 생성합니다.
    pub fn new(key: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            target_type: target_type.into(),
            generator: None,
        }
    }

    /// 요청에 generator 지정을 붙입니다.
    pub fn with_generator(mut self, selection: GeneratorSelection) -> Self {
        self.generator = Some(selection);
        self
    }

    /// 라우트 설정에서 생성합니다.
    pub fn from_config(route: &RouteConfig) -> Result<Self, ResolverError> {
        if route.key.trim().is_empty() {
            return Err(ResolverError::Config {
                field: "resolver.routes.key".to_owned(),
                reason: "routing key must not be empty".to_owned(),
            });
        }
        if route.target_type.trim().is_empty() {
            return Err(ResolverError::Config {
                field: "resolver.routes.target_type".to_owned(),
                reason: format!("route '{}' has no target type", route.key),
            });
        }

        let mut resolver = Self::new(&route.key, &route.target_type);
        if let Some(name) = &route.generator {
            resolver = resolver.with_generator(GeneratorSelection {
                name: name.clone(),
                version: route.generator_version.clone(),
                options: Default::default(),
            });
        }
        Ok(resolver)
    }

    /// 대상 유형
    pub fn target_type(&self) -> &str {
        &self.target_type
    }
}

impl Resolver for RouteResolver {
    fn name(&self) -> &str {
        &self.key
    }

    async fn resolve(
        &self,
        event_id: &str,
        identifier: &str,
    ) -> Result<Vec<GenerationRequest>, ResolverError> {
        let requests: Vec<GenerationRequest> = identifier
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| {
                let request = GenerationRequest::for_target(&self.target_type, id);
                match &self.generator {
                    Some(selection) => request.with_generator(selection.clone()),
                    None => request,
                }
            })
            .collect();

        if requests.is_empty() {
            return Err(ResolverError::InvalidEvent {
                event_id: event_id.to_owned(),
                reason: "identifier is empty".to_owned(),
            });
        }

        debug!(
            event_id,
            route = %self.key,
            requests = requests.len(),
            "route resolved"
        );
        Ok(requests)
    }
}
