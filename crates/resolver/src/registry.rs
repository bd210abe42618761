//! Resolver 레지스트리 — 시작 시 구성되는 라우팅 키 → resolver 테이블

use std::collections::BTreeMap;
use std::sync::Arc;

use sbomer_core::types::Event;

use crate::error::ResolverError;
use crate::resolver::{DynResolver, Resolver};

/// 라우팅 키별 resolver 테이블
#[derive(Default, Clone)]
pub struct ResolverRegistry {
    resolvers: BTreeMap<String, Arc<dyn DynResolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// resolver를 등록합니다. 같은 키가 이미 있으면 에러입니다.
    pub fn register<R: Resolver>(&mut self, resolver: R) -> Result<(), ResolverError> {
        self.register_arc(Arc::new(resolver))
    }

    /// 이미 `Arc`로 감싼 resolver를 등록합니다.
    pub fn register_arc(&mut self, resolver: Arc<dyn DynResolver>) -> Result<(), ResolverError> {
        let name = resolver.name().to_owned();
        if self.resolvers.contains_key(&name) {
            return Err(ResolverError::AlreadyRegistered { name });
        }
        self.resolvers.insert(name, resolver);
        Ok(())
    }

    /// Event의 라우팅 키와 일치하는 resolver를 찾습니다.
    pub fn find_for(&self, event: &Event) -> Option<Arc<dyn DynResolver>> {
        let key = event.resolver_key()?;
        self.resolvers
            .get(key)
            .filter(|resolver| resolver.matches(event))
            .cloned()
    }

    /// 등록된 라우팅 키 (정렬됨)
    pub fn names(&self) -> Vec<String> {
        self.resolvers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}
