//! 생성 서비스 통합 테스트
//!
//! - 지원하지 않는 대상 유형은 NEW 유지
//! - 프로세스 내 generator는 FINISHED/FAILED를 직접 설정
//! - 외부 잡 generator는 GENERATING에서 멈춤 (브리지가 종료 상태 설정)
//! - 상태 변경은 버스로 발행

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sbomer_core::bus::MessageBus;
use sbomer_core::config::JobGeneratorConfig;
use sbomer_core::message::GenerationScheduled;
use sbomer_core::pipeline::Pipeline;
use sbomer_core::status::{EventStatus, GenerationResult, GenerationStatus};
use sbomer_core::store::{InMemoryStore, Store};
use sbomer_core::types::{
    Event, Generation, GenerationRequest, ManifestContent, METADATA_IDENTIFIER, METADATA_RESOLVER,
};
use sbomer_generator::{
    GenerationOutcome, GenerationService, GenerationServiceBuilder, Generator, GeneratorError,
    GeneratorOutcome, GeneratorRegistry, JobGenerator, JobRunner, JobSpec,
};

// =============================================================================
// 테스트용 generator / 러너
// =============================================================================

enum Behavior {
    Succeed,
    Fail,
    Panic,
}

struct InProcess {
    version: semver::Version,
    target_types: Vec<String>,
    behavior: Behavior,
}

impl InProcess {
    fn new(behavior: Behavior) -> Self {
        Self {
            version: semver::Version::new(1, 0, 0),
            target_types: vec!["T".to_owned()],
            behavior,
        }
    }
}

impl Generator for InProcess {
    fn name(&self) -> &str {
        "in-process"
    }

    fn version(&self) -> &semver::Version {
        &self.version
    }

    fn supported_target_types(&self) -> &[String] {
        &self.target_types
    }

    async fn generate(&self, generation: &Generation) -> Result<GeneratorOutcome, GeneratorError> {
        match self.behavior {
            Behavior::Succeed => Ok(GeneratorOutcome::Completed {
                manifests: vec![ManifestContent::Inline(serde_json::json!({
                    "bomFormat": "CycloneDX",
                    "target": generation.target_identifier(),
                }))],
            }),
            Behavior::Fail => Err(GeneratorError::Failed("build log unavailable".to_owned())),
            Behavior::Panic => panic!("generator bug"),
        }
    }
}

#[derive(Default)]
struct RecordingRunner {
    jobs: Mutex<Vec<JobSpec>>,
}

impl JobRunner for RecordingRunner {
    async fn dispatch(&self, spec: JobSpec) -> Result<(), GeneratorError> {
        self.jobs.lock().unwrap().push(spec);
        Ok(())
    }
}

// =============================================================================
// 헬퍼
// =============================================================================

/// RESOLVED Event와 NEW Generation 하나를 저장하고 Generation ID를 반환합니다.
async fn seed(store: &InMemoryStore, target_type: &str) -> String {
    let event = Event::new(BTreeMap::from([
        (METADATA_RESOLVER.to_owned(), "X".to_owned()),
        (METADATA_IDENTIFIER.to_owned(), "abc".to_owned()),
    ]));
    let event_id = event.id.clone();
    store.insert_event(event).await.unwrap();
    store
        .transition_event(&event_id, EventStatus::Resolving, None)
        .await
        .unwrap();
    let generation = Generation::new(&event_id, GenerationRequest::for_target(target_type, "abc"));
    let generation_id = generation.id.clone();
    store
        .resolve_event(&event_id, vec![generation], None)
        .await
        .unwrap();
    generation_id
}

fn build<G: Generator>(
    store: &Arc<InMemoryStore>,
    bus: MessageBus,
    generator: G,
) -> GenerationService<InMemoryStore> {
    let mut registry = GeneratorRegistry::new();
    registry.register(generator).unwrap();
    GenerationServiceBuilder::new(Arc::clone(store), bus)
        .registry(registry)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

// =============================================================================
// 시나리오
// =============================================================================

#[tokio::test]
async fn unsupported_target_type_stays_new() {
    let store = Arc::new(InMemoryStore::new());
    let service = build(&store, MessageBus::default(), InProcess::new(Behavior::Succeed));
    let generation_id = seed(&store, "Z").await;

    let outcome = service.process(&generation_id).await.unwrap();

    assert_eq!(outcome, GenerationOutcome::Unsupported);
    let generation = store.get_generation(&generation_id).await.unwrap().unwrap();
    assert_eq!(generation.status, GenerationStatus::New);
    assert!(generation.result.is_none());
}

#[tokio::test]
async fn in_process_success_finishes_with_manifest() {
    let store = Arc::new(InMemoryStore::new());
    let bus = MessageBus::new(8);
    let mut changes = bus.generation_status_changed.subscribe().unwrap();
    let service = build(&store, bus, InProcess::new(Behavior::Succeed));
    let generation_id = seed(&store, "T").await;

    let outcome = service.process(&generation_id).await.unwrap();

    assert_eq!(outcome, GenerationOutcome::Finished { manifests: 1 });
    let generation = store.get_generation(&generation_id).await.unwrap().unwrap();
    assert_eq!(generation.status, GenerationStatus::Finished);
    assert_eq!(generation.result, Some(GenerationResult::Success));
    assert_eq!(generation.manifests.len(), 1);
    assert!(generation.finished_at.is_some());

    assert_eq!(changes.recv().await.unwrap().status, GenerationStatus::Generating);
    let finished = changes.recv().await.unwrap();
    assert_eq!(finished.status, GenerationStatus::Finished);
    assert_eq!(finished.event_id, generation.event_id);
}

#[tokio::test]
async fn in_process_failure_marks_failed_with_reason() {
    let store = Arc::new(InMemoryStore::new());
    let service = build(&store, MessageBus::default(), InProcess::new(Behavior::Fail));
    let generation_id = seed(&store, "T").await;

    let outcome = service.process(&generation_id).await.unwrap();

    assert!(matches!(outcome, GenerationOutcome::Failed { .. }));
    let generation = store.get_generation(&generation_id).await.unwrap().unwrap();
    assert_eq!(generation.status, GenerationStatus::Failed);
    assert_eq!(generation.result, Some(GenerationResult::Failure));
    assert!(generation.reason.unwrap().contains("build log unavailable"));
    assert_eq!(service.failed_count(), 1);
}

#[tokio::test]
async fn generator_panic_is_contained() {
    let store = Arc::new(InMemoryStore::new());
    let service = build(&store, MessageBus::default(), InProcess::new(Behavior::Panic));
    let generation_id = seed(&store, "T").await;

    let outcome = service.process(&generation_id).await.unwrap();

    assert!(matches!(outcome, GenerationOutcome::Failed { ref reason } if reason.contains("generator bug")));
}

#[tokio::test]
async fn dispatched_job_stays_generating_and_is_not_redispatched() {
    let store = Arc::new(InMemoryStore::new());
    let runner = Arc::new(RecordingRunner::default());
    let config = JobGeneratorConfig {
        enabled: true,
        target_types: vec!["T".to_owned()],
        command: vec!["generate".to_owned(), "{identifier}".to_owned()],
        ..Default::default()
    };
    let generator = JobGenerator::from_config(&config, Arc::clone(&runner)).unwrap();
    let service = build(&store, MessageBus::default(), generator);
    let generation_id = seed(&store, "T").await;

    let first = service.process(&generation_id).await.unwrap();
    let second = service.process(&generation_id).await.unwrap();

    assert_eq!(
        first,
        GenerationOutcome::Dispatched {
            job_name: JobSpec::name_for(&generation_id)
        }
    );
    assert_eq!(
        second,
        GenerationOutcome::Skipped {
            current: GenerationStatus::Generating
        }
    );
    let generation = store.get_generation(&generation_id).await.unwrap().unwrap();
    assert_eq!(generation.status, GenerationStatus::Generating);
    assert!(generation.result.is_none());
    assert_eq!(runner.jobs.lock().unwrap().len(), 1);
    assert_eq!(service.dispatched_count(), 1);
}

// =============================================================================
// 버스 기반 흐름
// =============================================================================

#[tokio::test]
async fn scheduled_message_drives_generation() {
    let store = Arc::new(InMemoryStore::new());
    let bus = MessageBus::new(8);
    let mut changes = bus.generation_status_changed.subscribe().unwrap();
    let mut service = build(&store, bus.clone(), InProcess::new(Behavior::Succeed));
    service.start().await.unwrap();

    let generation_id = seed(&store, "T").await;
    let generation = store.get_generation(&generation_id).await.unwrap().unwrap();
    bus.generation_scheduled
        .publish(GenerationScheduled::new(&generation_id, &generation.event_id))
        .await
        .unwrap();

    let mut last = None;
    for _ in 0..2 {
        let change = tokio::time::timeout(Duration::from_secs(5), changes.recv())
            .await
            .expect("status change in time")
            .expect("bus open");
        last = Some(change.status);
    }
    assert_eq!(last, Some(GenerationStatus::Finished));

    service.stop().await.unwrap();
}
