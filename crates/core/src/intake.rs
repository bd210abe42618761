//! 이벤트 접수 — 인바운드 알림을 NEW Event로 기록하고 해석을 요청
//!
//! 접수는 Event를 NEW로 저장한 직후 반환합니다. 이후의 모든 처리는
//! `ResolveRequested` 메시지를 통해 비동기적으로 진행됩니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::bus::MessageBus;
use crate::error::{IntakeError, SbomerError, StoreError};
use crate::message::{MODULE_INTAKE, ResolveRequested};
use crate::metrics as m;
use crate::store::Store;
use crate::types::{Event, METADATA_IDENTIFIER, METADATA_RESOLVER};

/// 이벤트 접수 창구
pub struct EventIntake<S> {
    store: Arc<S>,
    bus: MessageBus,
}

impl<S> Clone for EventIntake<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            bus: self.bus.clone(),
        }
    }
}

impl<S: Store> EventIntake<S> {
    pub fn new(store: Arc<S>, bus: MessageBus) -> Self {
        Self { store, bus }
    }

    /// 메타데이터로 새 Event를 접수하고 ID를 반환합니다.
    ///
    /// `resolver`와 `identifier` 키가 모두 있어야 합니다.
    pub async fn submit(&self, metadata: BTreeMap<String, String>) -> Result<String, SbomerError> {
        for key in [METADATA_RESOLVER, METADATA_IDENTIFIER] {
            if metadata.get(key).is_none_or(|v| v.trim().is_empty()) {
                return Err(IntakeError::MissingMetadata { key }.into());
            }
        }

        let event = Event::new(metadata);
        let event_id = event.id.clone();
        let resolver = event.resolver_key().unwrap_or_default().to_owned();
        self.store.insert_event(event).await?;
        metrics::counter!(m::EVENTS_RECEIVED_TOTAL).increment(1);
        info!(event_id = %event_id, resolver = %resolver, "event received");

        // 발행 실패는 스윕이 복구하므로 접수 자체는 성공
        if let Err(e) = self
            .bus
            .resolve_requested
            .publish(ResolveRequested::new(&event_id, MODULE_INTAKE))
            .await
        {
            warn!(event_id = %event_id, error = %e, "failed to publish resolve request");
        }

        Ok(event_id)
    }

    /// 기존 Event와 같은 메타데이터로 새 Event를 접수합니다 (수동 재시도).
    pub async fn resubmit(&self, event_id: &str) -> Result<String, SbomerError> {
        let original = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                kind: "event",
                id: event_id.to_owned(),
            })?;
        let new_id = self.submit(original.metadata).await?;
        info!(original = %event_id, event_id = %new_id, "event resubmitted");
        Ok(new_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::EventStatus;
    use crate::store::InMemoryStore;

    fn metadata(resolver: &str, identifier: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (METADATA_RESOLVER.to_owned(), resolver.to_owned()),
            (METADATA_IDENTIFIER.to_owned(), identifier.to_owned()),
        ])
    }

    #[tokio::test]
    async fn submit_persists_new_event_and_requests_resolution() {
        let store = Arc::new(InMemoryStore::new());
        let bus = MessageBus::new(8);
        let mut requests = bus.resolve_requested.subscribe().unwrap();
        let intake = EventIntake::new(Arc::clone(&store), bus);

        let id = intake.submit(metadata("X", "abc")).await.unwrap();

        let event = store.get_event(&id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::New);
        assert_eq!(requests.recv().await.unwrap().event_id, id);
    }

    #[tokio::test]
    async fn submit_without_subscribers_still_records_event() {
        let store = Arc::new(InMemoryStore::new());
        let intake = EventIntake::new(Arc::clone(&store), MessageBus::new(8));
        let id = intake.submit(metadata("X", "abc")).await.unwrap();
        assert!(store.get_event(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn submit_requires_routing_key_and_identifier() {
        let intake = EventIntake::new(Arc::new(InMemoryStore::new()), MessageBus::new(8));

        let missing_identifier = BTreeMap::from([(METADATA_RESOLVER.to_owned(), "X".to_owned())]);
        let err = intake.submit(missing_identifier).await.unwrap_err();
        assert!(matches!(
            err,
            SbomerError::Intake(IntakeError::MissingMetadata { key: "identifier" })
        ));

        let blank_resolver = metadata("  ", "abc");
        let err = intake.submit(blank_resolver).await.unwrap_err();
        assert!(matches!(
            err,
            SbomerError::Intake(IntakeError::MissingMetadata { key: "resolver" })
        ));
    }

    #[tokio::test]
    async fn resubmit_copies_metadata_into_fresh_event() {
        let store = Arc::new(InMemoryStore::new());
        let intake = EventIntake::new(Arc::clone(&store), MessageBus::new(8));
        let first = intake.submit(metadata("X", "abc")).await.unwrap();
        store
            .transition_event(&first, EventStatus::Error, Some("boom".to_owned()))
            .await
            .unwrap();

        let second = intake.resubmit(&first).await.unwrap();
        assert_ne!(first, second);
        let event = store.get_event(&second).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::New);
        assert_eq!(event.identifier(), Some("abc"));
    }

    #[tokio::test]
    async fn resubmit_unknown_event_fails() {
        let intake = EventIntake::new(Arc::new(InMemoryStore::new()), MessageBus::new(8));
        let err = intake.resubmit("missing").await.unwrap_err();
        assert!(matches!(err, SbomerError::Store(StoreError::NotFound { .. })));
    }
}
