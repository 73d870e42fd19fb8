//! 수집 진입점 -- 지문 기반 중복 제거와 저장, 알림
//!
//! 실시간 감시, 폴링, 외부 주입의 세 경로가 모두 [`Ingestor::ingest`]를 거칩니다.
//! 존재 확인과 저장은 하나의 잠금 안에서 수행되므로, 같은 지문을 가진 이벤트가
//! 동시에 들어와도 한 번만 저장됩니다.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info};

use hivewatch_core::event::AttackEvent;
use hivewatch_core::metrics as m;
use hivewatch_core::store::RecordStore;

use crate::error::IngestError;
use crate::notifier::Notifier;

/// 이벤트가 들어온 경로
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestPath {
    /// 로그 파일 실시간 감시
    Watcher,
    /// 컨테이너 로그 폴링
    Poller,
    /// 외부 주입 (테스트, 시뮬레이션)
    Injected,
}

impl IngestPath {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Watcher => "watcher",
            Self::Poller => "poller",
            Self::Injected => "injected",
        }
    }
}

impl fmt::Display for IngestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 수집 결과
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// 새로 저장됨 (저장된 이벤트)
    Accepted(AttackEvent),
    /// 이미 저장된 지문 (부수 효과 없음)
    Duplicate,
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// 단일 기록 경로
pub struct Ingestor {
    store: Arc<dyn RecordStore>,
    notifier: Arc<Notifier>,
    /// 존재 확인 + 저장 + 카운터 증가를 원자적으로 묶는 잠금
    write_lock: Mutex<()>,
    accepted: AtomicU64,
    duplicates: AtomicU64,
}

impl Ingestor {
    pub fn new(store: Arc<dyn RecordStore>, notifier: Arc<Notifier>) -> Self {
        Self {
            store,
            notifier,
            write_lock: Mutex::new(()),
            accepted: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
        }
    }

    /// 후보 이벤트를 수집합니다.
    ///
    /// 1. 지문이 없으면 계산합니다.
    /// 2. 저장소에 같은 지문이 있으면 `Duplicate`를 반환합니다.
    /// 3. 없으면 저장하고, 대상의 공격 카운터를 올린 뒤 구독자에게 알립니다.
    ///
    /// 알림은 잠금을 해제한 뒤 보냅니다.
    pub async fn ingest(
        &self,
        mut candidate: AttackEvent,
        path: IngestPath,
    ) -> Result<IngestOutcome, IngestError> {
        if candidate.target_id.is_empty() {
            return Err(IngestError::InvalidEvent("empty target_id".to_owned()));
        }
        if candidate.kind.is_empty() {
            return Err(IngestError::InvalidEvent("empty kind".to_owned()));
        }
        let fingerprint = candidate.ensure_fingerprint().to_owned();

        {
            let _guard = self.write_lock.lock().await;

            if self.store.exists(&fingerprint)? {
                self.duplicates.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::EVENTS_DUPLICATE_TOTAL, m::LABEL_PATH => path.as_str())
                    .increment(1);
                debug!(
                    target_id = %candidate.target_id,
                    kind = %candidate.kind,
                    path = %path,
                    "duplicate event dropped"
                );
                return Ok(IngestOutcome::Duplicate);
            }

            let recorded = self.store.record_event(&candidate).inspect_err(|_| {
                metrics::counter!(m::EVENTS_FAILED_TOTAL, m::LABEL_PATH => path.as_str())
                    .increment(1);
            })?;
            if recorded.is_none() {
                debug!(
                    target_id = %candidate.target_id,
                    "event for unregistered target, counter skipped"
                );
            }
        }

        self.accepted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            m::EVENTS_ACCEPTED_TOTAL,
            m::LABEL_PATH => path.as_str(),
            m::LABEL_KIND => candidate.kind.to_string()
        )
        .increment(1);
        info!(
            target_id = %candidate.target_id,
            kind = %candidate.kind,
            source = %candidate.source_address,
            path = %path,
            "attack event recorded"
        );

        self.notifier.broadcast(&candidate).await;
        Ok(IngestOutcome::Accepted(candidate))
    }

    /// 지금까지 저장된 이벤트 수
    pub fn accepted_count(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// 지금까지 버려진 중복 이벤트 수
    pub fn duplicate_count(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use hivewatch_core::event::{AttackKind, Attributes, UNKNOWN_ADDRESS};
    use hivewatch_core::types::{ProtocolKind, TargetRecord};

    fn setup() -> (Arc<MemoryStore>, Ingestor) {
        let store = Arc::new(MemoryStore::new());
        store
            .put_target(&TargetRecord::new("hp-ssh", ProtocolKind::Ssh, "/tmp/hp-ssh"))
            .unwrap();
        let ingestor = Ingestor::new(store.clone(), Arc::new(Notifier::new(16)));
        (store, ingestor)
    }

    fn admin_login() -> AttackEvent {
        AttackEvent::new(
            "hp-ssh",
            UNKNOWN_ADDRESS,
            AttackKind::LOGIN_ATTEMPT,
            Attributes::new()
                .with(Attributes::USERNAME, "admin")
                .with(Attributes::PASSWORD, "admin123"),
        )
    }

    #[tokio::test]
    async fn second_ingest_is_duplicate() {
        let (store, ingestor) = setup();

        let first = ingestor
            .ingest(admin_login(), IngestPath::Watcher)
            .await
            .unwrap();
        assert!(first.is_accepted());

        let retimed = admin_login().with_occurred_at(chrono::Utc::now() - Duration::minutes(5));
        let second = ingestor.ingest(retimed, IngestPath::Poller).await.unwrap();
        assert_eq!(second, IngestOutcome::Duplicate);

        assert_eq!(store.list_events(None, 10, 0).unwrap().len(), 1);
        assert_eq!(store.get_target("hp-ssh").unwrap().unwrap().attack_count, 1);
        assert_eq!(ingestor.accepted_count(), 1);
        assert_eq!(ingestor.duplicate_count(), 1);
    }

    #[tokio::test]
    async fn accepted_event_is_broadcast() {
        let (_, ingestor) = setup();
        let (_, mut rx) = ingestor.notifier().subscribe().await;

        ingestor
            .ingest(admin_login(), IngestPath::Injected)
            .await
            .unwrap();
        let delivered = rx.recv().await.unwrap();
        assert!(delivered.fingerprint.is_some());
        assert_eq!(delivered.attributes.username(), Some("admin"));

        ingestor
            .ingest(admin_login(), IngestPath::Injected)
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregistered_target_is_still_stored() {
        let (store, ingestor) = setup();
        let event = AttackEvent::new("hp-other", "10.0.0.1", AttackKind::ACTIVITY, Attributes::new());
        let outcome = ingestor.ingest(event, IngestPath::Injected).await.unwrap();
        assert!(outcome.is_accepted());
        assert_eq!(store.list_events(Some("hp-other"), 10, 0).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_target_is_rejected() {
        let (_, ingestor) = setup();
        let event = AttackEvent::new("", "10.0.0.1", AttackKind::ACTIVITY, Attributes::new());
        let err = ingestor.ingest(event, IngestPath::Injected).await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidEvent(_)));
    }

    #[tokio::test]
    async fn retry_after_failed_write_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            Arc::new(crate::store::JsonFileStore::open(dir.path().join("records.json")).unwrap());
        store
            .put_target(&TargetRecord::new("hp-ssh", ProtocolKind::Ssh, "/tmp/hp-ssh"))
            .unwrap();
        let ingestor = Ingestor::new(store.clone(), Arc::new(Notifier::new(16)));
        let (_, mut rx) = ingestor.notifier().subscribe().await;

        let blocker = dir.path().join("records.json.tmp");
        std::fs::create_dir(&blocker).unwrap();
        let err = ingestor
            .ingest(admin_login(), IngestPath::Watcher)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Store(_)));
        assert!(rx.try_recv().is_err());

        std::fs::remove_dir(&blocker).unwrap();
        let retry = ingestor
            .ingest(admin_login(), IngestPath::Watcher)
            .await
            .unwrap();
        assert!(retry.is_accepted());
        assert_eq!(store.get_target("hp-ssh").unwrap().unwrap().attack_count, 1);
        assert_eq!(store.list_events(None, 10, 0).unwrap().len(), 1);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn concurrent_duplicates_are_stored_once() {
        let (store, ingestor) = setup();
        let ingestor = Arc::new(ingestor);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ingestor = Arc::clone(&ingestor);
            handles.push(tokio::spawn(async move {
                ingestor.ingest(admin_login(), IngestPath::Poller).await
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_accepted() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(store.list_events(None, 10, 0).unwrap().len(), 1);
        assert_eq!(store.get_target("hp-ssh").unwrap().unwrap().attack_count, 1);
    }
}
