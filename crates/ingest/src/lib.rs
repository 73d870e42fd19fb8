//! hivewatch 수집 파이프라인
//!
//! 허니팟 로그를 두 경로로 읽어 공격 이벤트로 분류하고, 지문 기반으로 중복을 제거해
//! 한 번만 저장한 뒤 구독자에게 알립니다.
//!
//! # 모듈 구성
//!
//! - [`classifier`]: 프로토콜별 로그 라인 분류기 (SSH, FTP, Web, 범용)
//! - [`watcher`]: 로그 디렉토리 실시간 감시 (증분 읽기, 회전/잘림 감지)
//! - [`poller`]: 컨테이너 로그 주기적 폴링
//! - [`ingestor`]: 중복 제거 + 저장 + 알림의 단일 기록 경로
//! - [`notifier`]: 새 이벤트 구독/브로드캐스트
//! - [`store`]: 레코드 저장소 구현 (메모리, JSON 파일)
//! - [`stats`]: 기간별 공격 통계
//! - [`coordinator`]: 대상 생명주기와 전체 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! log files --LiveWatcher--\
//!                           +--> ClassifierSet --> Ingestor --> RecordStore
//! runtime logs --Poller----/                          |
//!                                                  Notifier --> subscribers
//! ```

pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod ingestor;
pub mod notifier;
pub mod poller;
pub mod stats;
pub mod store;
pub mod watcher;

// --- 주요 타입 re-export ---

// 코디네이터
pub use coordinator::{
    CoordinatorState, IngestCoordinator, IngestCoordinatorBuilder, RecoveryReport, SyncReport,
};

// 설정
pub use config::{IngestConfig, IngestConfigBuilder, PollerConfig, WatcherConfig};

// 에러
pub use error::IngestError;

// 분류기
pub use classifier::{Classifier, ClassifierSet};

// 수집 경로
pub use ingestor::{IngestOutcome, IngestPath, Ingestor};
pub use poller::{CycleReport, Poller, TargetPollReport};
pub use watcher::LiveWatcher;

// 알림
pub use notifier::{DeliveryError, EventSink, Notifier, SubscriberId};

// 저장소
pub use store::{JsonFileStore, MemoryStore};

// 통계
pub use stats::{AttackStats, attack_stats};
