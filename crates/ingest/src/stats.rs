//! 공격 통계 집계

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use hivewatch_core::error::StoreError;
use hivewatch_core::store::RecordStore;

/// 기간 내 공격 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttackStats {
    /// 전체 이벤트 수
    pub total: u64,
    /// 공격 종류별 수
    pub by_kind: BTreeMap<String, u64>,
    /// 대상별 수
    pub by_target: BTreeMap<String, u64>,
    /// 날짜(UTC)별 수
    pub daily: BTreeMap<NaiveDate, u64>,
}

/// `now - days` 이후에 탐지된 이벤트를 집계합니다.
///
/// 기간이 표현 가능한 범위를 넘으면 전체 이벤트를 집계합니다.
pub fn attack_stats(
    store: &dyn RecordStore,
    now: DateTime<Utc>,
    days: u32,
) -> Result<AttackStats, StoreError> {
    let since = now
        .checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut stats = AttackStats::default();

    // list_events는 최신순이므로 기간을 벗어나면 중단
    for event in store.list_events(None, usize::MAX, 0)? {
        if event.occurred_at < since {
            break;
        }
        stats.total += 1;
        *stats.by_kind.entry(event.kind.to_string()).or_default() += 1;
        *stats.by_target.entry(event.target_id.clone()).or_default() += 1;
        *stats.daily.entry(event.occurred_at.date_naive()).or_default() += 1;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use hivewatch_core::event::{AttackEvent, AttackKind, Attributes};

    fn put(store: &MemoryStore, target: &str, kind: &str, at: DateTime<Utc>) {
        let mut event = AttackEvent::new(
            target,
            "unknown",
            kind,
            Attributes::new().with(Attributes::RAW_LOG, at.to_rfc3339()),
        )
        .with_occurred_at(at);
        event.ensure_fingerprint();
        store.put(&event).unwrap();
    }

    #[test]
    fn aggregates_within_window() {
        let store = MemoryStore::new();
        let now = Utc::now();
        put(&store, "hp-1", AttackKind::LOGIN_ATTEMPT, now - Duration::hours(1));
        put(&store, "hp-1", AttackKind::LOGIN_ATTEMPT, now - Duration::days(1));
        put(&store, "hp-2", AttackKind::SQL_INJECTION, now - Duration::days(2));
        put(&store, "hp-2", AttackKind::SQL_INJECTION, now - Duration::days(30));

        let stats = attack_stats(&store, now, 7).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_kind["login_attempt"], 2);
        assert_eq!(stats.by_kind["sql_injection"], 1);
        assert_eq!(stats.by_target["hp-2"], 1);
        assert_eq!(stats.daily.values().sum::<u64>(), 3);
    }

    #[test]
    fn huge_window_covers_everything() {
        let store = MemoryStore::new();
        let now = Utc::now();
        put(&store, "hp-1", AttackKind::ACTIVITY, now - Duration::days(3650));

        let stats = attack_stats(&store, now, u32::MAX).unwrap();
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn empty_store_has_zero_total() {
        let store = MemoryStore::new();
        let stats = attack_stats(&store, Utc::now(), 7).unwrap();
        assert_eq!(stats, AttackStats::default());
    }
}
