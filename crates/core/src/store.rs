//! 저장소 — Event/Generation 영속화와 상태 전이
//!
//! 생성 이후의 모든 변경은 저장소 내부의 짧은 읽기-수정-쓰기 단위로 수행됩니다.
//! 호출자는 트랜잭션을 열지 않으며, 상태 전이는 [`advance`]로
//! 값 기반 비교-교환(compare-and-swap)됩니다.
//!
//! [`InMemoryStore`]는 단일 프로세스용 구현입니다. 잠금은 한 번의 전이 동안만
//! 보유하며 `.await` 지점을 넘어 유지되지 않습니다.

use std::collections::HashMap;
use std::future::Future;
use std::sync::RwLock;
use std::time::SystemTime;

use tracing::debug;

use crate::error::StoreError;
use crate::metrics as m;
use crate::status::{EventStatus, GenerationStatus, LifecycleStatus, Transition, advance};
use crate::types::{Event, Generation, Manifest, ManifestContent};

/// 전이 시도 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome<S> {
    /// 적용됨 (이전 상태 포함)
    Applied { previous: S },
    /// 거부됨 (현재 상태 포함)
    Rejected { current: S },
}

impl<S> TransitionOutcome<S> {
    /// 적용 여부
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Event/Generation 저장소
///
/// 모든 변경 메서드는 독립적인 원자 단위입니다.
pub trait Store: Send + Sync + 'static {
    /// 새 Event를 저장합니다 (NEW 상태로 기록).
    fn insert_event(&self, event: Event) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Event를 조회합니다.
    fn get_event(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Event>, StoreError>> + Send;

    /// Generation을 조회합니다.
    fn get_generation(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Generation>, StoreError>> + Send;

    /// Event에 속한 Generation을 생성 순서대로 조회합니다.
    fn generations_for_event(
        &self,
        event_id: &str,
    ) -> impl Future<Output = Result<Vec<Generation>, StoreError>> + Send;

    /// 주어진 상태의 보관되지 않은 Event 목록
    fn events_with_status(
        &self,
        status: EventStatus,
    ) -> impl Future<Output = Result<Vec<Event>, StoreError>> + Send;

    /// 주어진 상태의 Generation 목록
    fn generations_with_status(
        &self,
        status: GenerationStatus,
    ) -> impl Future<Output = Result<Vec<Generation>, StoreError>> + Send;

    /// Event 상태 전이를 시도합니다.
    fn transition_event(
        &self,
        id: &str,
        proposed: EventStatus,
        reason: Option<String>,
    ) -> impl Future<Output = Result<TransitionOutcome<EventStatus>, StoreError>> + Send;

    /// Event를 RESOLVED로 전이하고, 적용된 경우에만 Generation을 함께 저장합니다.
    ///
    /// 전이가 거부되면 Generation은 저장되지 않으므로 반복 호출해도
    /// 중복 Generation이 생기지 않습니다.
    fn resolve_event(
        &self,
        id: &str,
        generations: Vec<Generation>,
        reason: Option<String>,
    ) -> impl Future<Output = Result<TransitionOutcome<EventStatus>, StoreError>> + Send;

    /// Generation 상태 전이를 시도합니다. 종료 상태면 결과값도 설정됩니다.
    fn transition_generation(
        &self,
        id: &str,
        proposed: GenerationStatus,
        reason: Option<String>,
    ) -> impl Future<Output = Result<TransitionOutcome<GenerationStatus>, StoreError>> + Send;

    /// Generation을 FINISHED로 전이하고, 적용된 경우에만 Manifest를 추가합니다.
    fn finish_generation(
        &self,
        id: &str,
        manifests: Vec<ManifestContent>,
        reason: Option<String>,
    ) -> impl Future<Output = Result<TransitionOutcome<GenerationStatus>, StoreError>> + Send;

    /// 종료 상태의 Event를 보관 처리합니다.
    fn archive_event(&self, id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ─── InMemoryStore ───────────────────────────────────────────────────

#[derive(Default)]
struct Inner {
    events: HashMap<String, Event>,
    generations: HashMap<String, Generation>,
}

/// 메모리 기반 저장소
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> Result<T, StoreError> {
        let guard = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&guard))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Inner) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        f(&mut guard)
    }
}

fn event_not_found(id: &str) -> StoreError {
    StoreError::NotFound {
        kind: "event",
        id: id.to_owned(),
    }
}

fn generation_not_found(id: &str) -> StoreError {
    StoreError::NotFound {
        kind: "generation",
        id: id.to_owned(),
    }
}

fn record_rejection<S: LifecycleStatus>(kind: &'static str, id: &str, current: S, proposed: S) {
    debug!(
        kind,
        id,
        current = %current,
        proposed = %proposed,
        "stale or duplicate transition rejected"
    );
    metrics::counter!(m::TRANSITIONS_REJECTED_TOTAL, m::LABEL_KIND => kind).increment(1);
}

fn apply_event(
    event: &mut Event,
    proposed: EventStatus,
    reason: Option<String>,
) -> TransitionOutcome<EventStatus> {
    let current = event.status;
    match advance(current, proposed) {
        Transition::Accepted => {
            event.status = proposed;
            event.reason = reason;
            event.updated_at = SystemTime::now();
            TransitionOutcome::Applied { previous: current }
        }
        Transition::Rejected => {
            record_rejection("event", &event.id, current, proposed);
            TransitionOutcome::Rejected { current }
        }
    }
}

fn apply_generation(
    generation: &mut Generation,
    proposed: GenerationStatus,
    reason: Option<String>,
) -> TransitionOutcome<GenerationStatus> {
    let current = generation.status;
    match advance(current, proposed) {
        Transition::Accepted => {
            let now = SystemTime::now();
            generation.status = proposed;
            generation.result = proposed.result();
            generation.reason = reason;
            generation.updated_at = now;
            if proposed.is_terminal() {
                generation.finished_at = Some(now);
            }
            TransitionOutcome::Applied { previous: current }
        }
        Transition::Rejected => {
            record_rejection("generation", &generation.id, current, proposed);
            TransitionOutcome::Rejected { current }
        }
    }
}

impl Store for InMemoryStore {
    async fn insert_event(&self, event: Event) -> Result<(), StoreError> {
        self.write(|inner| {
            if inner.events.contains_key(&event.id) {
                return Err(StoreError::AlreadyExists {
                    kind: "event",
                    id: event.id,
                });
            }
            inner.events.insert(event.id.clone(), event);
            Ok(())
        })
    }

    async fn get_event(&self, id: &str) -> Result<Option<Event>, StoreError> {
        self.read(|inner| inner.events.get(id).cloned())
    }

    async fn get_generation(&self, id: &str) -> Result<Option<Generation>, StoreError> {
        self.read(|inner| inner.generations.get(id).cloned())
    }

    async fn generations_for_event(&self, event_id: &str) -> Result<Vec<Generation>, StoreError> {
        self.read(|inner| {
            inner
                .events
                .get(event_id)
                .map(|event| {
                    event
                        .generation_ids
                        .iter()
                        .filter_map(|id| inner.generations.get(id).cloned())
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    async fn events_with_status(&self, status: EventStatus) -> Result<Vec<Event>, StoreError> {
        self.read(|inner| {
            let mut events: Vec<Event> = inner
                .events
                .values()
                .filter(|e| e.status == status && !e.archived)
                .cloned()
                .collect();
            events.sort_by_key(|e| e.created_at);
            events
        })
    }

    async fn generations_with_status(
        &self,
        status: GenerationStatus,
    ) -> Result<Vec<Generation>, StoreError> {
        self.read(|inner| {
            let mut generations: Vec<Generation> = inner
                .generations
                .values()
                .filter(|g| g.status == status)
                .cloned()
                .collect();
            generations.sort_by_key(|g| g.created_at);
            generations
        })
    }

    async fn transition_event(
        &self,
        id: &str,
        proposed: EventStatus,
        reason: Option<String>,
    ) -> Result<TransitionOutcome<EventStatus>, StoreError> {
        self.write(|inner| {
            let event = inner.events.get_mut(id).ok_or_else(|| event_not_found(id))?;
            Ok(apply_event(event, proposed, reason))
        })
    }

    async fn resolve_event(
        &self,
        id: &str,
        generations: Vec<Generation>,
        reason: Option<String>,
    ) -> Result<TransitionOutcome<EventStatus>, StoreError> {
        self.write(|inner| {
            if let Some(duplicate) = generations
                .iter()
                .find(|g| inner.generations.contains_key(&g.id))
            {
                return Err(StoreError::AlreadyExists {
                    kind: "generation",
                    id: duplicate.id.clone(),
                });
            }
            let event = inner.events.get_mut(id).ok_or_else(|| event_not_found(id))?;
            let outcome = apply_event(event, EventStatus::Resolved, reason);
            if outcome.is_applied() {
                event
                    .generation_ids
                    .extend(generations.iter().map(|g| g.id.clone()));
                for mut generation in generations {
                    generation.event_id = id.to_owned();
                    inner.generations.insert(generation.id.clone(), generation);
                }
            }
            Ok(outcome)
        })
    }

    async fn transition_generation(
        &self,
        id: &str,
        proposed: GenerationStatus,
        reason: Option<String>,
    ) -> Result<TransitionOutcome<GenerationStatus>, StoreError> {
        self.write(|inner| {
            let generation = inner
                .generations
                .get_mut(id)
                .ok_or_else(|| generation_not_found(id))?;
            Ok(apply_generation(generation, proposed, reason))
        })
    }

    async fn finish_generation(
        &self,
        id: &str,
        manifests: Vec<ManifestContent>,
        reason: Option<String>,
    ) -> Result<TransitionOutcome<GenerationStatus>, StoreError> {
        self.write(|inner| {
            let generation = inner
                .generations
                .get_mut(id)
                .ok_or_else(|| generation_not_found(id))?;
            let outcome = apply_generation(generation, GenerationStatus::Finished, reason);
            if outcome.is_applied() {
                generation.manifests.extend(
                    manifests
                        .into_iter()
                        .map(|content| Manifest::new(id, content)),
                );
            }
            Ok(outcome)
        })
    }

    async fn archive_event(&self, id: &str) -> Result<(), StoreError> {
        self.write(|inner| {
            let event = inner.events.get_mut(id).ok_or_else(|| event_not_found(id))?;
            if !event.status.is_terminal() {
                return Err(StoreError::NotTerminal {
                    id: id.to_owned(),
                    status: event.status.to_string(),
                });
            }
            event.archived = true;
            event.updated_at = SystemTime::now();
            Ok(())
        })
    }
}
