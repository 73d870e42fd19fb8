//! 레코드 저장소 trait -- 중복 제거의 기준이 되는 영속 계층 경계
//!
//! 저장소는 동기(synchronous) 인터페이스이며, 지문 존재 여부에 대해 권위를 갖습니다.
//! 구현체는 `hivewatch-ingest`의 `JsonFileStore`, `MemoryStore`를 참조하세요.

use crate::error::StoreError;
use crate::event::AttackEvent;
use crate::types::{TargetRecord, TargetStatus};

/// 이벤트/대상 레코드 저장소
pub trait RecordStore: Send + Sync {
    /// 지문이 이미 저장되어 있는지 확인합니다.
    fn exists(&self, fingerprint: &str) -> Result<bool, StoreError>;

    /// 이벤트를 저장합니다.
    ///
    /// 지문이 없는 이벤트는 [`StoreError::MissingFingerprint`]로 거부합니다.
    fn put(&self, event: &AttackEvent) -> Result<(), StoreError>;

    /// 대상의 공격 카운터를 1 증가시키고 새 값을 반환합니다.
    fn increment_counter(&self, target_id: &str) -> Result<u64, StoreError>;

    /// 이벤트 저장과 대상 카운터 증가를 한 번에 수행합니다.
    ///
    /// 대상이 등록되어 있지 않으면 이벤트만 저장하고 `None`을 반환합니다.
    /// 실패하면 어느 쪽 변경도 남지 않아야 합니다. 기본 구현은 원자성을 보장하지
    /// 않으므로, 영속 저장소는 이 메서드를 재정의해야 합니다.
    fn record_event(&self, event: &AttackEvent) -> Result<Option<u64>, StoreError> {
        self.put(event)?;
        match self.increment_counter(&event.target_id) {
            Ok(count) => Ok(Some(count)),
            Err(StoreError::TargetNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 대상 레코드를 조회합니다.
    fn get_target(&self, target_id: &str) -> Result<Option<TargetRecord>, StoreError>;

    /// 대상 레코드를 삽입하거나 교체합니다.
    fn put_target(&self, target: &TargetRecord) -> Result<(), StoreError>;

    /// 대상 상태와 인스턴스 참조를 갱신합니다.
    fn set_target_status(
        &self,
        target_id: &str,
        status: TargetStatus,
        instance_ref: Option<&str>,
    ) -> Result<(), StoreError>;

    /// 대상 레코드를 삭제합니다. 존재하지 않으면 false를 반환합니다.
    fn remove_target(&self, target_id: &str) -> Result<bool, StoreError>;

    /// 모든 대상 레코드를 반환합니다.
    fn list_targets(&self) -> Result<Vec<TargetRecord>, StoreError>;

    /// 이벤트를 최신순으로 반환합니다.
    fn list_events(
        &self,
        target_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AttackEvent>, StoreError>;
}
