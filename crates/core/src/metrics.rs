//! 메트릭 이름과 설명
//!
//! 파이프라인 크레이트와 데몬이 같은 이름을 쓰도록 모든 메트릭을 여기에
//! 정의합니다. 호출부는 이 상수와 `metrics` 매크로를 사용합니다.
//!
//! # 명명 규칙
//!
//! - 접두사: `logwatch_`
//! - 접미사: counter는 `_total`, gauge는 없음
//!
//! ```ignore
//! metrics::counter!(logwatch_core::metrics::LINES_TOTAL, LABEL_WATCHER => name).increment(1);
//! ```

// ─── Labels ──────────────────────────────────────────────────────────

/// watcher 이름 레이블
pub const LABEL_WATCHER: &str = "watcher";

/// 파이프라인 단계 레이블 (filter, conditioner, consumer, producer)
pub const LABEL_STAGE: &str = "stage";

// ─── Dispatch ────────────────────────────────────────────────────────

/// watcher가 받은 줄 수 (counter)
pub const LINES_TOTAL: &str = "logwatch_lines_total";

/// consumer 단계로 넘어간 레코드 수 (counter)
pub const RECORDS_DISPATCHED_TOTAL: &str = "logwatch_records_dispatched_total";

/// 어떤 필터에도 매칭되지 않은 줄 수 (counter)
pub const RECORDS_FILTERED_OUT_TOTAL: &str = "logwatch_records_filtered_out_total";

/// conditioner가 중단시킨 레코드 수 (counter)
pub const RECORDS_ABORTED_TOTAL: &str = "logwatch_records_aborted_total";

/// 단계별 플러그인 오류 수 (counter)
pub const FAULTS_TOTAL: &str = "logwatch_faults_total";

// ─── Feed bridge ─────────────────────────────────────────────────────

/// 디스패치가 바빠 non-blocking producer가 버린 줄 수 (counter)
pub const BRIDGE_DROPPED_TOTAL: &str = "logwatch_bridge_dropped_total";

/// blocking producer의 busy 재시도 / 대기 타임아웃 횟수 (counter)
pub const BRIDGE_BUSY_TOTAL: &str = "logwatch_bridge_busy_total";

// ─── Lifecycle ───────────────────────────────────────────────────────

/// respawn 정책에 따른 producer 재시작 수 (counter)
pub const PRODUCER_RESPAWNS_TOTAL: &str = "logwatch_producer_respawns_total";

/// 현재 살아 있는 watcher 스레드 수 (gauge)
pub const WATCHERS_RUNNING: &str = "logwatch_watchers_running";

/// 빌드 정보, `version` 레이블과 함께 항상 1 (gauge)
pub const BUILD_INFO: &str = "logwatch_build_info";

/// 설치된 recorder에 모든 메트릭 설명을 등록합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(LINES_TOTAL, "Lines received from producers");
    describe_counter!(
        RECORDS_DISPATCHED_TOTAL,
        "Records handed to the consumer stage"
    );
    describe_counter!(RECORDS_FILTERED_OUT_TOTAL, "Lines matched by no filter");
    describe_counter!(RECORDS_ABORTED_TOTAL, "Records aborted by a conditioner");
    describe_counter!(FAULTS_TOTAL, "Plugin faults by pipeline stage");
    describe_counter!(
        BRIDGE_DROPPED_TOTAL,
        "Lines discarded because dispatch was still busy"
    );
    describe_counter!(
        BRIDGE_BUSY_TOTAL,
        "Busy retries and timed-out waits of blocking producers"
    );
    describe_counter!(PRODUCER_RESPAWNS_TOTAL, "Producer restarts");
    describe_gauge!(WATCHERS_RUNNING, "Watcher threads currently alive");
    describe_gauge!(BUILD_INFO, "Build information");
}
