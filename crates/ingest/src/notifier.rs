//! 알림 모듈 -- 새로 저장된 이벤트를 구독자에게 전달
//!
//! [`Notifier`]는 구독자 집합을 보관하며, [`broadcast`](Notifier::broadcast)는
//! 각 구독자에게 블로킹 없이 한 번씩 전달을 시도합니다.
//! 전달에 실패한 구독자(채널 가득 참, 수신측 종료)는 즉시 제거됩니다.
//!
//! # 사용 예시
//! ```ignore
//! use hivewatch_ingest::notifier::Notifier;
//!
//! let notifier = Notifier::new(256);
//! let (id, mut rx) = notifier.subscribe().await;
//! while let Some(event) = rx.recv().await {
//!     println!("{event}");
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use hivewatch_core::event::AttackEvent;
use hivewatch_core::metrics as m;

/// 전달 실패 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// 구독자 버퍼가 가득 참 (느린 구독자)
    #[error("subscriber buffer is full")]
    Full,
    /// 구독자가 연결을 끊음
    #[error("subscriber is closed")]
    Closed,
}

/// 구독자 전송 핸들
///
/// 구현체는 블로킹하지 않아야 합니다. 전달할 수 없으면 즉시 에러를 반환합니다.
pub trait EventSink: Send + Sync {
    fn send(&self, event: &AttackEvent) -> Result<(), DeliveryError>;
}

impl EventSink for mpsc::Sender<AttackEvent> {
    fn send(&self, event: &AttackEvent) -> Result<(), DeliveryError> {
        self.try_send(event.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// 구독자 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// 이벤트 브로드캐스터
pub struct Notifier {
    subscribers: Mutex<HashMap<SubscriberId, Box<dyn EventSink>>>,
    next_id: AtomicU64,
    /// `subscribe()`가 만드는 채널의 용량
    capacity: usize,
    closed: AtomicBool,
}

impl Notifier {
    /// 새 알림기를 생성합니다. 용량 0은 1로 올립니다.
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            closed: AtomicBool::new(false),
        }
    }

    /// 기본 용량의 채널로 구독합니다.
    pub async fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<AttackEvent>) {
        self.subscribe_with_capacity(self.capacity).await
    }

    /// 지정한 용량의 채널로 구독합니다.
    pub async fn subscribe_with_capacity(
        &self,
        capacity: usize,
    ) -> (SubscriberId, mpsc::Receiver<AttackEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = self.register(Box::new(tx)).await;
        (id, rx)
    }

    /// 임의의 전송 핸들을 등록합니다.
    ///
    /// 닫힌 알림기에 등록한 핸들은 즉시 버려집니다.
    pub async fn register(&self, sink: Box<dyn EventSink>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if self.closed.load(Ordering::Acquire) {
            debug!(subscriber = %id, "notifier closed, dropping new subscriber");
            return id;
        }

        let mut subscribers = self.subscribers.lock().await;
        subscribers.insert(id, sink);
        metrics::gauge!(m::SUBSCRIBERS).set(subscribers.len() as f64);
        debug!(subscriber = %id, "subscriber registered");
        id
    }

    /// 구독을 해제합니다. 이미 없으면 false를 반환합니다.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock().await;
        let removed = subscribers.remove(&id).is_some();
        metrics::gauge!(m::SUBSCRIBERS).set(subscribers.len() as f64);
        removed
    }

    /// 모든 구독자에게 이벤트를 전달합니다.
    ///
    /// 전달에 성공한 구독자 수를 반환합니다. 실패한 구독자는 제거되며,
    /// 한 구독자의 실패가 나머지 전달을 막지 않습니다.
    pub async fn broadcast(&self, event: &AttackEvent) -> usize {
        let mut subscribers = self.subscribers.lock().await;
        if subscribers.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        subscribers.retain(|id, sink| match sink.send(event) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(e) => {
                warn!(subscriber = %id, error = %e, "dropping subscriber");
                metrics::counter!(m::SUBSCRIBERS_DROPPED_TOTAL).increment(1);
                false
            }
        });

        metrics::gauge!(m::SUBSCRIBERS).set(subscribers.len() as f64);
        delivered
    }

    /// 모든 구독자를 해제하고 이후 등록을 거부합니다.
    ///
    /// 채널 구독자는 남은 이벤트를 모두 받은 뒤 `None`을 받습니다.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut subscribers = self.subscribers.lock().await;
        subscribers.clear();
        metrics::gauge!(m::SUBSCRIBERS).set(0.0);
    }

    /// 현재 구독자 수
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivewatch_core::event::{AttackKind, Attributes};

    fn event() -> AttackEvent {
        AttackEvent::new(
            "hp-1",
            "10.0.0.1",
            AttackKind::CONNECTION,
            Attributes::new().with(Attributes::RAW_LOG, "New connection"),
        )
    }

    struct FailingSink;

    impl EventSink for FailingSink {
        fn send(&self, _event: &AttackEvent) -> Result<(), DeliveryError> {
            Err(DeliveryError::Closed)
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers() {
        let notifier = Notifier::new(8);
        let (_, mut rx1) = notifier.subscribe().await;
        let (_, mut rx2) = notifier.subscribe().await;

        assert_eq!(notifier.broadcast(&event()).await, 2);
        assert_eq!(rx1.recv().await.unwrap().target_id, "hp-1");
        assert_eq!(rx2.recv().await.unwrap().target_id, "hp-1");
    }

    #[tokio::test]
    async fn failed_subscriber_is_removed_without_affecting_others() {
        let notifier = Notifier::new(8);
        notifier.register(Box::new(FailingSink)).await;
        let (_, mut rx) = notifier.subscribe().await;

        assert_eq!(notifier.broadcast(&event()).await, 1);
        assert_eq!(notifier.subscriber_count().await, 1);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn dropped_receiver_is_removed() {
        let notifier = Notifier::new(8);
        let (_, rx) = notifier.subscribe().await;
        drop(rx);

        assert_eq!(notifier.broadcast(&event()).await, 0);
        assert_eq!(notifier.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn slow_subscriber_is_dropped_instead_of_blocking() {
        let notifier = Notifier::new(8);
        let (_, mut slow) = notifier.subscribe_with_capacity(1).await;

        assert_eq!(notifier.broadcast(&event()).await, 1);
        // 두 번째 전달은 버퍼가 가득 차서 실패
        assert_eq!(notifier.broadcast(&event()).await, 0);
        assert_eq!(notifier.subscriber_count().await, 0);

        assert!(slow.recv().await.is_some());
        assert!(slow.recv().await.is_none());
    }

    #[tokio::test]
    async fn unsubscribe_and_close() {
        let notifier = Notifier::new(8);
        let (id, _rx) = notifier.subscribe().await;
        assert!(notifier.unsubscribe(id).await);
        assert!(!notifier.unsubscribe(id).await);

        let (_, mut rx) = notifier.subscribe().await;
        notifier.close().await;
        assert!(rx.recv().await.is_none());

        let (_, mut late) = notifier.subscribe().await;
        assert_eq!(notifier.subscriber_count().await, 0);
        assert!(late.recv().await.is_none());
    }
}
