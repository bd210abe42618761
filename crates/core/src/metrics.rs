//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `sbomer_`
//! - 모듈명: `events_`, `resolver_`, `generator_`, `leader_`, `reconciler_`, `worker_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 최종 상태 레이블 키 (PROCESSED, ERROR, IGNORED, FINISHED, FAILED)
pub const LABEL_STATUS: &str = "status";

/// 레코드 종류 레이블 키 (event, generation)
pub const LABEL_KIND: &str = "kind";

/// resolver/generator 이름 레이블 키
pub const LABEL_NAME: &str = "name";

/// 워커 풀 이름 레이블 키
pub const LABEL_POOL: &str = "pool";

// ─── Event 메트릭 ──────────────────────────────────────────────────

/// 접수된 Event 수 (counter)
pub const EVENTS_RECEIVED_TOTAL: &str = "sbomer_events_received_total";

/// 종료 상태에 도달한 Event 수 (counter, label: status)
pub const EVENTS_TERMINAL_TOTAL: &str = "sbomer_events_terminal_total";

/// 보관 처리된 Event 수 (counter)
pub const EVENTS_ARCHIVED_TOTAL: &str = "sbomer_events_archived_total";

/// 거부된 상태 전이 수 (counter, label: kind)
pub const TRANSITIONS_REJECTED_TOTAL: &str = "sbomer_transitions_rejected_total";

// ─── Resolver 메트릭 ───────────────────────────────────────────────

/// 실패한 해석 수 (counter, label: name)
pub const RESOLUTIONS_FAILED_TOTAL: &str = "sbomer_resolver_resolutions_failed_total";

/// 해석 소요 시간 (histogram, 초)
pub const RESOLUTION_DURATION_SECONDS: &str = "sbomer_resolver_resolution_duration_seconds";

// ─── Generator 메트릭 ──────────────────────────────────────────────

/// 종료 상태에 도달한 Generation 수 (counter, label: status)
pub const GENERATIONS_TERMINAL_TOTAL: &str = "sbomer_generator_generations_terminal_total";

/// 외부 잡 디스패치 수 (counter, label: name)
pub const DISPATCHES_TOTAL: &str = "sbomer_generator_dispatches_total";

/// 생성 소요 시간 (histogram, 초)
pub const GENERATION_DURATION_SECONDS: &str = "sbomer_generator_generation_duration_seconds";

// ─── Leader 메트릭 ─────────────────────────────────────────────────

/// 리더 여부 (gauge, 0 또는 1)
pub const LEADER_IS_LEADER: &str = "sbomer_leader_is_leader";

/// 리스 획득 수 (counter)
pub const LEADER_ACQUISITIONS_TOTAL: &str = "sbomer_leader_acquisitions_total";

// ─── Reconciler 메트릭 ─────────────────────────────────────────────

/// 처리한 잡 관측 수 (counter)
pub const RECONCILER_OBSERVATIONS_TOTAL: &str = "sbomer_reconciler_observations_total";

// ─── Worker 메트릭 ─────────────────────────────────────────────────

/// 실행 중인 작업 수 (gauge, label: pool)
pub const WORKER_IN_FLIGHT: &str = "sbomer_worker_in_flight";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// 데몬 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "sbomer_daemon_uptime_seconds";

/// 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "sbomer_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 해석/생성 소요 시간 버킷 (초)
///
/// 외부 도구 실행을 포함하므로 10ms ~ 30분 범위
pub const DURATION_BUCKETS: [f64; 10] = [
    0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 900.0, 1800.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다. 보통 `sbomer-daemon` 시작 시점입니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(EVENTS_RECEIVED_TOTAL, "Total number of events accepted");
    describe_counter!(
        EVENTS_TERMINAL_TOTAL,
        "Events that reached a terminal status, by status"
    );
    describe_counter!(EVENTS_ARCHIVED_TOTAL, "Total number of archived events");
    describe_counter!(
        TRANSITIONS_REJECTED_TOTAL,
        "Stale or duplicate status transitions rejected by the ordinal guard"
    );

    describe_counter!(
        RESOLUTIONS_FAILED_TOTAL,
        "Resolutions that ended in ERROR, by resolver"
    );
    describe_histogram!(
        RESOLUTION_DURATION_SECONDS,
        "Time spent in resolver logic in seconds"
    );

    describe_counter!(
        GENERATIONS_TERMINAL_TOTAL,
        "Generations that reached a terminal status, by status"
    );
    describe_counter!(DISPATCHES_TOTAL, "External jobs dispatched, by generator");
    describe_histogram!(
        GENERATION_DURATION_SECONDS,
        "Time spent in generator logic in seconds"
    );

    describe_gauge!(LEADER_IS_LEADER, "1 if this instance holds the leader lease");
    describe_counter!(
        LEADER_ACQUISITIONS_TOTAL,
        "Number of times this instance acquired the leader lease"
    );

    describe_counter!(
        RECONCILER_OBSERVATIONS_TOTAL,
        "Job observations processed by the reconciler"
    );

    describe_gauge!(WORKER_IN_FLIGHT, "Tasks currently running, by worker pool");

    describe_gauge!(DAEMON_UPTIME_SECONDS, "SBOMer daemon uptime in seconds");
    describe_gauge!(DAEMON_BUILD_INFO, "Build information (always 1)");
}
