//! hivewatch 공통 크레이트
//!
//! 허니팟 공격 이벤트 수집 파이프라인의 모든 크레이트가 공유하는 타입을 정의합니다.
//!
//! - [`event`]: 공격 이벤트 ([`AttackEvent`])와 속성
//! - [`fingerprint`]: 수집 경로 간 중복 제거 키
//! - [`store`]: 레코드 저장소 경계 ([`RecordStore`])
//! - [`pipeline`]: 생명주기 trait ([`Pipeline`])
//! - [`config`]: `hivewatch.toml` 설정
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod event;
pub mod fingerprint;
pub mod metrics;
pub mod pipeline;
pub mod store;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, HivewatchError, PipelineError, StoreError};

// 설정
pub use config::HivewatchConfig;

// 이벤트
pub use event::{AttackEvent, AttackKind, Attributes, UNKNOWN_ADDRESS};

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline};

// 저장소
pub use store::RecordStore;

// 도메인 타입
pub use types::{ProtocolKind, TargetRecord, TargetStatus};
