//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 구성요소는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `hivewatch_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(hivewatch_core::metrics::EVENTS_ACCEPTED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 수집 경로 레이블 키 (watcher, poller, injected)
pub const LABEL_PATH: &str = "path";

/// 공격 종류 레이블 키
pub const LABEL_KIND: &str = "kind";

/// 프로토콜 레이블 키 (ssh, ftp, web, ...)
pub const LABEL_PROTOCOL: &str = "protocol";

// ─── 수집/중복 제거 메트릭 ──────────────────────────────────────────

/// 새로 저장된 이벤트 수 (counter, label: path, kind)
pub const EVENTS_ACCEPTED_TOTAL: &str = "hivewatch_events_accepted_total";

/// 중복으로 버려진 이벤트 수 (counter, label: path)
pub const EVENTS_DUPLICATE_TOTAL: &str = "hivewatch_events_duplicate_total";

/// 저장에 실패한 이벤트 수 (counter, label: path)
pub const EVENTS_FAILED_TOTAL: &str = "hivewatch_events_failed_total";

/// 분류기를 통과한 라인 수 (counter, label: protocol)
pub const LINES_CLASSIFIED_TOTAL: &str = "hivewatch_lines_classified_total";

// ─── Watcher 메트릭 ─────────────────────────────────────────────────

/// 현재 감시 중인 대상 수 (gauge)
pub const WATCHED_TARGETS: &str = "hivewatch_watched_targets";

/// 잘림/교체가 감지되어 처음부터 다시 읽은 파일 수 (counter)
pub const WATCHER_FILE_RESETS_TOTAL: &str = "hivewatch_watcher_file_resets_total";

// ─── Poller 메트릭 ──────────────────────────────────────────────────

/// 완료된 폴링 사이클 수 (counter)
pub const POLL_CYCLES_TOTAL: &str = "hivewatch_poll_cycles_total";

/// 폴링 중 실패한 대상 수 (counter)
pub const POLL_TARGET_FAILURES_TOTAL: &str = "hivewatch_poll_target_failures_total";

/// 폴링 사이클 소요 시간 (histogram, 초)
pub const POLL_CYCLE_DURATION_SECONDS: &str = "hivewatch_poll_cycle_duration_seconds";

// ─── Notifier 메트릭 ────────────────────────────────────────────────

/// 현재 구독자 수 (gauge)
pub const SUBSCRIBERS: &str = "hivewatch_subscribers";

/// 전달 실패로 제거된 구독자 수 (counter)
pub const SUBSCRIBERS_DROPPED_TOTAL: &str = "hivewatch_subscribers_dropped_total";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 폴링 사이클 소요 시간 히스토그램 버킷 (초)
///
/// 10ms ~ 60s 범위 (대상 수와 로그 버퍼 크기에 비례)
pub const POLL_DURATION_BUCKETS: [f64; 9] = [0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다. 일반적으로 `hivewatch-daemon`
/// 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        EVENTS_ACCEPTED_TOTAL,
        "Total number of attack events persisted after deduplication"
    );
    describe_counter!(
        EVENTS_DUPLICATE_TOTAL,
        "Total number of candidate events dropped as duplicates"
    );
    describe_counter!(
        EVENTS_FAILED_TOTAL,
        "Total number of candidate events that could not be persisted"
    );
    describe_counter!(
        LINES_CLASSIFIED_TOTAL,
        "Total number of log lines passed through a classifier"
    );

    describe_gauge!(WATCHED_TARGETS, "Number of targets with an active live watcher");
    describe_counter!(
        WATCHER_FILE_RESETS_TOTAL,
        "Total number of watched files re-read from offset 0 after truncation or rotation"
    );

    describe_counter!(POLL_CYCLES_TOTAL, "Total number of completed poll cycles");
    describe_counter!(
        POLL_TARGET_FAILURES_TOTAL,
        "Total number of per-target failures during poll cycles"
    );
    describe_histogram!(
        POLL_CYCLE_DURATION_SECONDS,
        "Time to complete a single poll cycle in seconds"
    );

    describe_gauge!(SUBSCRIBERS, "Number of currently registered event subscribers");
    describe_counter!(
        SUBSCRIBERS_DROPPED_TOTAL,
        "Total number of subscribers removed after a failed delivery"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        EVENTS_ACCEPTED_TOTAL,
        EVENTS_DUPLICATE_TOTAL,
        EVENTS_FAILED_TOTAL,
        LINES_CLASSIFIED_TOTAL,
        WATCHED_TARGETS,
        WATCHER_FILE_RESETS_TOTAL,
        POLL_CYCLES_TOTAL,
        POLL_TARGET_FAILURES_TOTAL,
        POLL_CYCLE_DURATION_SECONDS,
        SUBSCRIBERS,
        SUBSCRIBERS_DROPPED_TOTAL,
    ];

    #[test]
    fn all_metrics_start_with_hivewatch_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("hivewatch_"),
                "Metric '{}' does not start with 'hivewatch_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in [
            EVENTS_ACCEPTED_TOTAL,
            EVENTS_DUPLICATE_TOTAL,
            LINES_CLASSIFIED_TOTAL,
            WATCHER_FILE_RESETS_TOTAL,
            POLL_CYCLES_TOTAL,
            POLL_TARGET_FAILURES_TOTAL,
            SUBSCRIBERS_DROPPED_TOTAL,
        ] {
            assert!(name.ends_with("_total"), "counter '{}' lacks _total", name);
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더가 설치되지 않아도 패닉하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_PATH, LABEL_KIND, LABEL_PROTOCOL] {
            assert_eq!(label.to_lowercase(), label);
        }
    }

    #[test]
    fn poll_duration_buckets_are_sorted() {
        let buckets = POLL_DURATION_BUCKETS;
        for i in 1..buckets.len() {
            assert!(buckets[i] > buckets[i - 1]);
        }
    }
}
