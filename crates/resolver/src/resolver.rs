//! Resolver trait — Event를 Generation 요청으로 바꾸는 확장 지점

use std::future::Future;

use sbomer_core::pipeline::BoxFuture;
use sbomer_core::types::{Event, GenerationRequest};

use crate::error::ResolverError;

/// Event 해석 전략
///
/// 라우팅 키(`resolver` 메타데이터)로 선택되며, 하나의 Event는 자신의 키와
/// 일치하는 resolver 하나에 의해서만 변경됩니다.
pub trait Resolver: Send + Sync + 'static {
    /// 라우팅 키
    fn name(&self) -> &str;

    /// 이 resolver가 Event를 담당하는지 확인합니다.
    fn matches(&self, event: &Event) -> bool {
        event.resolver_key() == Some(self.name())
    }

    /// 도메인 식별자를 Generation 요청 목록으로 해석합니다.
    ///
    /// 트랜잭션 밖에서 실행되며 오래 걸릴 수 있습니다.
    fn resolve(
        &self,
        event_id: &str,
        identifier: &str,
    ) -> impl Future<Output = Result<Vec<GenerationRequest>, ResolverError>> + Send;
}

/// dyn-compatible resolver trait
///
/// 레지스트리는 `Arc<dyn DynResolver>`로 resolver를 보관합니다.
pub trait DynResolver: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn matches(&self, event: &Event) -> bool;

    fn resolve<'a>(
        &'a self,
        event_id: &'a str,
        identifier: &'a str,
    ) -> BoxFuture<'a, Result<Vec<GenerationRequest>, ResolverError>>;
}

impl<T: Resolver> DynResolver for T {
    fn name(&self) -> &str {
        Resolver::name(self)
    }

    fn matches(&self, event: &Event) -> bool {
        Resolver::matches(self, event)
    }

    fn resolve<'a>(
        &'a self,
        event_id: &'a str,
        identifier: &'a str,
    ) -> BoxFuture<'a, Result<Vec<GenerationRequest>, ResolverError>> {
        Box::pin(Resolver::resolve(self, event_id, identifier))
    }
}
