//! Orchestrator integration tests.
//!
//! Tests the full flow: config -> component init -> start -> event intake
//! -> resolution -> scheduling -> generation -> aggregation -> shutdown.

use std::collections::BTreeMap;
use std::time::Duration;

use sbomer_core::config::SbomerConfig;
use sbomer_core::status::{EventStatus, GenerationResult, GenerationStatus};
use sbomer_core::store::{InMemoryStore, Store};
use sbomer_core::types::{METADATA_IDENTIFIER, METADATA_RESOLVER, ManifestContent};
use sbomer_daemon::orchestrator::Orchestrator;

/// Routes `X` to the in-process command generator and `Y` to the local job runner.
fn pipeline_config() -> SbomerConfig {
    let toml_str = r#"
[general]
log_level = "info"
log_format = "pretty"
identity = "test-0"

[worker]
max_concurrency = 4
queue_capacity = 64
shutdown_grace_secs = 5

[[resolver.routes]]
key = "X"
target_type = "T"

[[resolver.routes]]
key = "Y"
target_type = "J"

[generator.command]
enabled = true
target_types = ["T"]
program = "sh"
args = ["-c", "echo '{\"bomFormat\":\"CycloneDX\",\"name\":\"{identifier}\"}'"]
timeout_secs = 10

[generator.job]
enabled = true
target_types = ["J"]
image = "local"
command = ["sh", "-c", "echo oci://sboms/{identifier}"]

[leader]
enabled = true
lease_duration_secs = 15
renew_interval_secs = 5

[scheduler]
sweep_interval_secs = 1
"#;
    SbomerConfig::parse(toml_str).expect("failed to parse pipeline config")
}

fn metadata(key: &str, identifier: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (METADATA_RESOLVER.to_owned(), key.to_owned()),
        (METADATA_IDENTIFIER.to_owned(), identifier.to_owned()),
    ])
}

async fn wait_for_event(store: &InMemoryStore, event_id: &str, expected: EventStatus) -> EventStatus {
    let mut status = EventStatus::New;
    for _ in 0..200 {
        status = store
            .get_event(event_id)
            .await
            .expect("store read")
            .expect("event exists")
            .status;
        if status == expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    status
}

async fn wait_for_leadership(orchestrator: &Orchestrator) {
    for _ in 0..200 {
        if orchestrator.is_leader() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_orchestrator_registers_modules_in_start_order() {
    // Given: A config with both generators enabled
    let config = pipeline_config();

    // When: Building orchestrator
    let orchestrator = Orchestrator::build_from_config(config)
        .await
        .expect("build should succeed");

    // Then: All components are registered, none running yet
    let health = orchestrator.health().await;
    let names: Vec<&str> = health.modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["leader", "reconciler", "scheduler", "generator", "resolver"]
    );
    assert!(health.status.is_unhealthy(), "modules are not started yet");
    assert!(!health.leader);
}

#[tokio::test]
async fn test_orchestrator_without_leader_election_always_leads() {
    // Given: Leader election disabled
    let mut config = pipeline_config();
    config.leader.enabled = false;

    // When: Building orchestrator
    let orchestrator = Orchestrator::build_from_config(config)
        .await
        .expect("build should succeed");

    // Then: No elector module, replica leads
    let health = orchestrator.health().await;
    assert_eq!(health.modules.len(), 4);
    assert!(orchestrator.is_leader());
}

#[tokio::test]
async fn test_orchestrator_rejects_invalid_config() {
    // Given: A lease duration not longer than the renew interval
    let mut config = pipeline_config();
    config.leader.lease_duration_secs = 5;

    // When: Building orchestrator
    let result = Orchestrator::build_from_config(config).await;

    // Then: Validation fails
    let err = result.err().expect("build should fail");
    assert!(err.to_string().contains("lease_duration_secs"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_event_flows_to_processed_with_command_generator() {
    // Given: A running orchestrator that holds the lease
    let mut orchestrator = Orchestrator::build_from_config(pipeline_config())
        .await
        .expect("build should succeed");
    orchestrator.start().await.expect("start should succeed");
    wait_for_leadership(&orchestrator).await;
    assert!(orchestrator.health().await.status.is_healthy());

    // When: An event routed to the command generator is submitted
    let event_id = orchestrator
        .intake()
        .submit(metadata("X", "abc"))
        .await
        .expect("submit should succeed");

    // Then: The event ends PROCESSED with one finished generation and manifest
    let store = orchestrator.store().clone();
    let status = wait_for_event(&store, &event_id, EventStatus::Processed).await;
    assert_eq!(status, EventStatus::Processed);

    let generations = store.generations_for_event(&event_id).await.unwrap();
    assert_eq!(generations.len(), 1);
    let generation = &generations[0];
    assert_eq!(generation.status, GenerationStatus::Finished);
    assert_eq!(generation.result, Some(GenerationResult::Success));
    assert_eq!(generation.target_type(), "T");
    assert_eq!(generation.manifests.len(), 1);
    let ManifestContent::Inline(document) = &generation.manifests[0].content else {
        panic!("expected inline manifest");
    };
    assert_eq!(document["name"], "abc");

    orchestrator.shutdown().await.expect("shutdown should succeed");
    assert!(!orchestrator.is_leader(), "lease is released on shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_event_flows_to_processed_through_local_job() {
    // Given: A running orchestrator
    let mut orchestrator = Orchestrator::build_from_config(pipeline_config())
        .await
        .expect("build should succeed");
    orchestrator.start().await.expect("start should succeed");
    wait_for_leadership(&orchestrator).await;

    // When: An event routed to the job generator is submitted
    let event_id = orchestrator
        .intake()
        .submit(metadata("Y", "abc"))
        .await
        .expect("submit should succeed");

    // Then: The reconciler finishes the generation with the job's result
    let store = orchestrator.store().clone();
    let status = wait_for_event(&store, &event_id, EventStatus::Processed).await;
    assert_eq!(status, EventStatus::Processed);

    let generations = store.generations_for_event(&event_id).await.unwrap();
    assert_eq!(generations.len(), 1);
    assert_eq!(generations[0].status, GenerationStatus::Finished);
    assert_eq!(
        generations[0].manifests[0].content,
        ManifestContent::Reference("oci://sboms/abc".to_owned())
    );

    orchestrator.shutdown().await.expect("shutdown should succeed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unrouted_event_is_ignored() {
    // Given: A running orchestrator
    let mut orchestrator = Orchestrator::build_from_config(pipeline_config())
        .await
        .expect("build should succeed");
    orchestrator.start().await.expect("start should succeed");

    // When: An event with an unknown routing key is submitted
    let event_id = orchestrator
        .intake()
        .submit(metadata("nobody", "abc"))
        .await
        .expect("submit should succeed");

    // Then: It is IGNORED and never gets generations
    let store = orchestrator.store().clone();
    let status = wait_for_event(&store, &event_id, EventStatus::Ignored).await;
    assert_eq!(status, EventStatus::Ignored);
    assert!(store.generations_for_event(&event_id).await.unwrap().is_empty());

    orchestrator.shutdown().await.expect("shutdown should succeed");
}

#[tokio::test]
async fn test_intake_rejects_missing_metadata() {
    // Given: A built orchestrator
    let orchestrator = Orchestrator::build_from_config(pipeline_config())
        .await
        .expect("build should succeed");

    // When: Submitting without an identifier
    let result = orchestrator
        .intake()
        .submit(BTreeMap::from([(
            METADATA_RESOLVER.to_owned(),
            "X".to_owned(),
        )]))
        .await;

    // Then: Intake refuses it
    assert!(result.is_err());
}

#[tokio::test]
async fn test_orchestrator_builds_from_config_file() {
    // Given: A config file with a single route and the command generator
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sbomer.toml");
    std::fs::write(
        &path,
        r#"
[general]
identity = "file-0"

[[resolver.routes]]
key = "X"
target_type = "T"

[generator.command]
enabled = true
target_types = ["T"]
program = "true"

[leader]
enabled = false
"#,
    )
    .expect("write config");

    // When: Building from the file
    let orchestrator = Orchestrator::build(&path).await.expect("build should succeed");

    // Then: The file values are applied
    assert_eq!(orchestrator.config().general.identity, "file-0");
    assert_eq!(orchestrator.health().await.modules.len(), 4);
}

#[tokio::test]
async fn test_orchestrator_build_fails_for_missing_file() {
    let result = Orchestrator::build(std::path::Path::new("/nonexistent/sbomer.toml")).await;
    let err = result.err().expect("build should fail");
    assert!(err.to_string().contains("failed to load config"));
}
