//! 메모리 저장소 -- 영속화 없는 [`RecordStore`] 구현

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use hivewatch_core::error::StoreError;
use hivewatch_core::event::AttackEvent;
use hivewatch_core::store::RecordStore;
use hivewatch_core::types::{TargetRecord, TargetStatus};

use super::RecordSet;

/// 메모리 저장소
///
/// 프로세스가 종료되면 모든 레코드가 사라집니다.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<RecordSet>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RecordSet>, StoreError> {
        self.records.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RecordSet>, StoreError> {
        self.records.write().map_err(|_| StoreError::Poisoned)
    }
}

impl RecordStore for MemoryStore {
    fn exists(&self, fingerprint: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.exists(fingerprint))
    }

    fn put(&self, event: &AttackEvent) -> Result<(), StoreError> {
        self.write()?.put(event)
    }

    fn increment_counter(&self, target_id: &str) -> Result<u64, StoreError> {
        self.write()?.increment_counter(target_id)
    }

    fn record_event(&self, event: &AttackEvent) -> Result<Option<u64>, StoreError> {
        self.write()?.record_event(event)
    }

    fn get_target(&self, target_id: &str) -> Result<Option<TargetRecord>, StoreError> {
        Ok(self.read()?.get_target(target_id))
    }

    fn put_target(&self, target: &TargetRecord) -> Result<(), StoreError> {
        self.write()?.put_target(target);
        Ok(())
    }

    fn set_target_status(
        &self,
        target_id: &str,
        status: TargetStatus,
        instance_ref: Option<&str>,
    ) -> Result<(), StoreError> {
        self.write()?
            .set_target_status(target_id, status, instance_ref)
    }

    fn remove_target(&self, target_id: &str) -> Result<bool, StoreError> {
        Ok(self.write()?.remove_target(target_id))
    }

    fn list_targets(&self) -> Result<Vec<TargetRecord>, StoreError> {
        Ok(self.read()?.list_targets())
    }

    fn list_events(
        &self,
        target_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AttackEvent>, StoreError> {
        Ok(self.read()?.list_events(target_id, limit, offset))
    }
}
