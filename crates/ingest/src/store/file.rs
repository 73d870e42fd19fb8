//! JSON 파일 저장소
//!
//! 전체 레코드를 메모리에 두고, 변경이 있을 때마다 임시 파일에 쓴 뒤
//! `rename`으로 교체합니다. 쓰기 도중 중단되어도 이전 문서가 남습니다.
//!
//! # 사용 예시
//! ```ignore
//! use hivewatch_ingest::store::JsonFileStore;
//!
//! let store = JsonFileStore::open("/var/lib/hivewatch/records.json")?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};

use tracing::{debug, info};

use hivewatch_core::error::StoreError;
use hivewatch_core::event::AttackEvent;
use hivewatch_core::store::RecordStore;
use hivewatch_core::types::{TargetRecord, TargetStatus};

use super::RecordSet;

/// JSON 문서 하나로 영속화하는 저장소
pub struct JsonFileStore {
    path: PathBuf,
    records: RwLock<RecordSet>,
}

impl JsonFileStore {
    /// 저장 파일을 엽니다.
    ///
    /// 파일이 없으면 빈 저장소로 시작하고(부모 디렉토리는 생성),
    /// 형식이 손상된 파일은 [`StoreError::Corrupted`]로 거부합니다.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_error(parent, &e))?;
            }
        }

        let records = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => RecordSet::default(),
            Ok(bytes) => {
                let mut records: RecordSet =
                    serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupted {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                records.reindex();
                records
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "store file not found, starting empty");
                RecordSet::default()
            }
            Err(e) => return Err(io_error(&path, &e)),
        };

        info!(
            path = %path.display(),
            targets = records.list_targets().len(),
            "record store opened"
        );

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// 저장 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RecordSet>, StoreError> {
        self.records.read().map_err(|_| StoreError::Poisoned)
    }

    /// 쓰기 잠금 안에서 사본을 변경하고, 파일 기록이 성공한 뒤에만 교체합니다.
    ///
    /// 변경이나 기록이 실패하면 메모리 상태도 그대로 남습니다.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut RecordSet) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        let mut next = records.clone();
        let value = f(&mut next)?;
        self.persist(&next)?;
        *records = next;
        Ok(value)
    }

    fn persist(&self, records: &RecordSet) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(records).map_err(|e| StoreError::Io {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, &bytes).map_err(|e| io_error(&tmp, &e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io_error(&self.path, &e))
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

impl RecordStore for JsonFileStore {
    fn exists(&self, fingerprint: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.exists(fingerprint))
    }

    fn put(&self, event: &AttackEvent) -> Result<(), StoreError> {
        self.mutate(|records| records.put(event))
    }

    fn increment_counter(&self, target_id: &str) -> Result<u64, StoreError> {
        self.mutate(|records| records.increment_counter(target_id))
    }

    fn record_event(&self, event: &AttackEvent) -> Result<Option<u64>, StoreError> {
        self.mutate(|records| records.record_event(event))
    }

    fn get_target(&self, target_id: &str) -> Result<Option<TargetRecord>, StoreError> {
        Ok(self.read()?.get_target(target_id))
    }

    fn put_target(&self, target: &TargetRecord) -> Result<(), StoreError> {
        self.mutate(|records| {
            records.put_target(target);
            Ok(())
        })
    }

    fn set_target_status(
        &self,
        target_id: &str,
        status: TargetStatus,
        instance_ref: Option<&str>,
    ) -> Result<(), StoreError> {
        self.mutate(|records| records.set_target_status(target_id, status, instance_ref))
    }

    fn remove_target(&self, target_id: &str) -> Result<bool, StoreError> {
        self.mutate(|records| Ok(records.remove_target(target_id)))
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

#[cfg(test)]
mod tests {
    use super::*;
    use hivewatch_core::event::{AttackKind, Attributes};
    use hivewatch_core::types::ProtocolKind;

    fn login(user: &str) -> AttackEvent {
        let mut event = AttackEvent::new(
            "hp-1",
            "unknown",
            AttackKind::LOGIN_ATTEMPT,
            Attributes::new().with(Attributes::USERNAME, user),
        );
        event.ensure_fingerprint();
        event
    }

    #[test]
    fn missing_file_opens_empty_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/records.json");
        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.list_targets().unwrap().is_empty());
        assert!(path.parent().unwrap().is_dir());
        assert!(!path.exists());
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let event = login("root");
        let fingerprint = event.fingerprint.clone().unwrap();

        {
            let store = JsonFileStore::open(&path).unwrap();
            store
                .put_target(&TargetRecord::new("hp-1", ProtocolKind::Ssh, "/tmp/hp-1"))
                .unwrap();
            store.put(&event).unwrap();
            store.increment_counter("hp-1").unwrap();
        }

        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.exists(&fingerprint).unwrap());
        assert_eq!(store.get_target("hp-1").unwrap().unwrap().attack_count, 1);
        assert_eq!(store.list_events(Some("hp-1"), 10, 0).unwrap(), vec![event]);
    }

    #[test]
    fn document_has_targets_and_events_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.put(&login("admin")).unwrap();

        let doc: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(doc["targets"].is_object());
        assert_eq!(doc["events"].as_object().unwrap().len(), 1);
        assert!(!dir.path().join("records.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let result = JsonFileStore::open(&path);
        assert!(matches!(result, Err(StoreError::Corrupted { .. })));
    }

    #[test]
    fn empty_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, b"\n").unwrap();
        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.list_events(None, 10, 0).unwrap().is_empty());
    }

    #[test]
    fn failed_mutation_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let store = JsonFileStore::open(&path).unwrap();
        let err = store.increment_counter("missing").unwrap_err();
        assert!(matches!(err, StoreError::TargetNotFound(_)));
        assert!(!path.exists());
    }

    #[test]
    fn failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let store = JsonFileStore::open(&path).unwrap();
        store
            .put_target(&TargetRecord::new("hp-1", ProtocolKind::Ssh, "/tmp/hp-1"))
            .unwrap();

        // 임시 파일 자리에 디렉토리가 있으면 기록이 실패함
        let tmp = dir.path().join("records.json.tmp");
        std::fs::create_dir(&tmp).unwrap();
        let event = login("root");
        let fingerprint = event.fingerprint.clone().unwrap();
        assert!(matches!(
            store.record_event(&event),
            Err(StoreError::Io { .. })
        ));
        assert!(!store.exists(&fingerprint).unwrap());
        assert_eq!(store.get_target("hp-1").unwrap().unwrap().attack_count, 0);

        std::fs::remove_dir(&tmp).unwrap();
        assert_eq!(store.record_event(&event).unwrap(), Some(1));
        assert!(store.exists(&fingerprint).unwrap());
    }

    #[test]
    fn record_event_for_unknown_target_stores_event_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("records.json")).unwrap();
        assert_eq!(store.record_event(&login("admin")).unwrap(), None);
        assert_eq!(store.list_events(None, 10, 0).unwrap().len(), 1);
    }
}
