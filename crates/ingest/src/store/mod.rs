//! 레코드 저장소 구현
//!
//! 두 구현체 모두 같은 [`RecordSet`]을 잠금 뒤에 보관합니다.
//! - [`MemoryStore`]: 영속화 없음 (테스트, 데모)
//! - [`JsonFileStore`]: 변경마다 JSON 문서 하나로 영속화

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use hivewatch_core::error::StoreError;
use hivewatch_core::event::AttackEvent;
use hivewatch_core::types::{TargetRecord, TargetStatus};

/// 저장소 문서 -- `{ "targets": {...}, "events": {...} }`
///
/// 지문 인덱스는 직렬화하지 않고 로딩 시 다시 만듭니다.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct RecordSet {
    #[serde(default)]
    targets: BTreeMap<String, TargetRecord>,
    #[serde(default)]
    events: BTreeMap<String, AttackEvent>,
    #[serde(skip)]
    fingerprints: HashSet<String>,
}

impl RecordSet {
    /// 이벤트로부터 지문 인덱스를 다시 만듭니다.
    pub(crate) fn reindex(&mut self) {
        self.fingerprints = self
            .events
            .values()
            .filter_map(|e| e.fingerprint.clone())
            .collect();
    }

    pub(crate) fn exists(&self, fingerprint: &str) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    pub(crate) fn put(&mut self, event: &AttackEvent) -> Result<(), StoreError> {
        let fingerprint = event
            .fingerprint
            .clone()
            .ok_or_else(|| StoreError::MissingFingerprint(event.id.clone()))?;
        self.fingerprints.insert(fingerprint);
        self.events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    pub(crate) fn increment_counter(&mut self, target_id: &str) -> Result<u64, StoreError> {
        let target = self
            .targets
            .get_mut(target_id)
            .ok_or_else(|| StoreError::TargetNotFound(target_id.to_owned()))?;
        target.attack_count += 1;
        Ok(target.attack_count)
    }

    /// 이벤트를 저장하고, 등록된 대상이면 카운터를 올립니다.
    pub(crate) fn record_event(&mut self, event: &AttackEvent) -> Result<Option<u64>, StoreError> {
        self.put(event)?;
        Ok(self.targets.get_mut(&event.target_id).map(|target| {
            target.attack_count += 1;
            target.attack_count
        }))
    }

    pub(crate) fn get_target(&self, target_id: &str) -> Option<TargetRecord> {
        self.targets.get(target_id).cloned()
    }

    pub(crate) fn put_target(&mut self, target: &TargetRecord) {
        self.targets.insert(target.id.clone(), target.clone());
    }

    pub(crate) fn set_target_status(
        &mut self,
        target_id: &str,
        status: TargetStatus,
        instance_ref: Option<&str>,
    ) -> Result<(), StoreError> {
        let target = self
            .targets
            .get_mut(target_id)
            .ok_or_else(|| StoreError::TargetNotFound(target_id.to_owned()))?;
        target.status = status;
        target.instance_ref = instance_ref.map(str::to_owned);
        Ok(())
    }

    pub(crate) fn remove_target(&mut self, target_id: &str) -> bool {
        self.targets.remove(target_id).is_some()
    }

    pub(crate) fn list_targets(&self) -> Vec<TargetRecord> {
        self.targets.values().cloned().collect()
    }

    /// 최신순으로 정렬한 이벤트 페이지를 반환합니다.
    pub(crate) fn list_events(
        &self,
        target_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Vec<AttackEvent> {
        let mut events: Vec<&AttackEvent> = self
            .events
            .values()
            .filter(|e| target_id.is_none_or(|id| e.target_id == id))
            .collect();
        events.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        events
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }
}

/// 특정 사용자명의 이벤트 저장을 거부하는 테스트용 저장소
#[cfg(test)]
pub(crate) struct RejectingStore {
    inner: MemoryStore,
    rejected_user: String,
    rejecting: std::sync::atomic::AtomicBool,
    failures: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl RejectingStore {
    pub(crate) fn new(rejected_user: &str) -> Self {
        Self {
            inner: MemoryStore::new(),
            rejected_user: rejected_user.to_owned(),
            rejecting: std::sync::atomic::AtomicBool::new(true),
            failures: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// 이후로는 모든 이벤트를 받아들입니다.
    pub(crate) fn recover(&self) {
        self.rejecting
            .store(false, std::sync::atomic::Ordering::Relaxed);
    }

    pub(crate) fn failures(&self) -> usize {
        self.failures.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
impl hivewatch_core::store::RecordStore for RejectingStore {
    fn exists(&self, fingerprint: &str) -> Result<bool, StoreError> {
        self.inner.exists(fingerprint)
    }

    fn put(&self, event: &AttackEvent) -> Result<(), StoreError> {
        if self.rejecting.load(std::sync::atomic::Ordering::Relaxed)
            && event.attributes.username() == Some(self.rejected_user.as_str())
        {
            self.failures
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return Err(StoreError::Io {
                path: "records.json".to_owned(),
                reason: "disk full".to_owned(),
            });
        }
        self.inner.put(event)
    }

    fn increment_counter(&self, target_id: &str) -> Result<u64, StoreError> {
        self.inner.increment_counter(target_id)
    }

    fn get_target(&self, target_id: &str) -> Result<Option<TargetRecord>, StoreError> {
        self.inner.get_target(target_id)
    }

    fn put_target(&self, target: &TargetRecord) -> Result<(), StoreError> {
        self.inner.put_target(target)
    }

    fn set_target_status(
        &self,
        target_id: &str,
        status: TargetStatus,
        instance_ref: Option<&str>,
    ) -> Result<(), StoreError> {
        self.inner.set_target_status(target_id, status, instance_ref)
    }

    fn remove_target(&self, target_id: &str) -> Result<bool, StoreError> {
        self.inner.remove_target(target_id)
    }

    fn list_targets(&self) -> Result<Vec<TargetRecord>, StoreError> {
        self.inner.list_targets()
    }

    fn list_events(
        &self,
        target_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AttackEvent>, StoreError> {
        self.inner.list_events(target_id, limit, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use hivewatch_core::event::{AttackKind, Attributes};
    use hivewatch_core::types::ProtocolKind;

    fn event(target: &str, user: &str, age_secs: i64) -> AttackEvent {
        let mut event = AttackEvent::new(
            target,
            "10.0.0.1",
            AttackKind::LOGIN_ATTEMPT,
            Attributes::new().with(Attributes::USERNAME, user),
        )
        .with_occurred_at(Utc::now() - Duration::seconds(age_secs));
        event.ensure_fingerprint();
        event
    }

    #[test]
    fn put_rejects_missing_fingerprint() {
        let mut set = RecordSet::default();
        let event = AttackEvent::new("hp-1", "unknown", "activity", Attributes::new());
        assert!(matches!(
            set.put(&event),
            Err(StoreError::MissingFingerprint(_))
        ));
    }

    #[test]
    fn reindex_restores_fingerprint_lookup() {
        let mut set = RecordSet::default();
        let e = event("hp-1", "root", 0);
        set.put(&e).unwrap();
        set.fingerprints.clear();
        assert!(!set.exists(e.fingerprint.as_deref().unwrap()));
        set.reindex();
        assert!(set.exists(e.fingerprint.as_deref().unwrap()));
    }

    #[test]
    fn increment_counter_requires_target() {
        let mut set = RecordSet::default();
        assert!(matches!(
            set.increment_counter("missing"),
            Err(StoreError::TargetNotFound(_))
        ));
        set.put_target(&TargetRecord::new("hp-1", ProtocolKind::Ssh, "/tmp/hp-1"));
        assert_eq!(set.increment_counter("hp-1").unwrap(), 1);
        assert_eq!(set.increment_counter("hp-1").unwrap(), 2);
    }

    #[test]
    fn list_events_is_newest_first_and_paginated() {
        let mut set = RecordSet::default();
        set.put(&event("hp-1", "a", 30)).unwrap();
        set.put(&event("hp-1", "b", 20)).unwrap();
        set.put(&event("hp-2", "c", 10)).unwrap();

        let all = set.list_events(None, 10, 0);
        let users: Vec<_> = all.iter().filter_map(|e| e.attributes.username()).collect();
        assert_eq!(users, vec!["c", "b", "a"]);

        let page = set.list_events(Some("hp-1"), 1, 1);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].attributes.username(), Some("a"));
    }

    #[test]
    fn set_target_status_replaces_instance_ref() {
        let mut set = RecordSet::default();
        set.put_target(
            &TargetRecord::new("hp-1", ProtocolKind::Web, "/tmp/hp-1").with_instance_ref("abc"),
        );
        set.set_target_status("hp-1", TargetStatus::Error, None)
            .unwrap();
        let target = set.get_target("hp-1").unwrap();
        assert_eq!(target.status, TargetStatus::Error);
        assert!(target.instance_ref.is_none());
        assert!(set.remove_target("hp-1"));
        assert!(!set.remove_target("hp-1"));
    }

    #[test]
    fn record_event_counts_only_registered_targets() {
        let mut set = RecordSet::default();
        set.put_target(&TargetRecord::new("hp-1", ProtocolKind::Ssh, "/tmp/hp-1"));
        assert_eq!(set.record_event(&event("hp-1", "root", 0)).unwrap(), Some(1));
        assert_eq!(set.record_event(&event("hp-9", "root", 0)).unwrap(), None);
        assert_eq!(set.list_events(None, 10, 0).len(), 2);
    }
}
