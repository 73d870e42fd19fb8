//! 수집 파이프라인 에러 타입
//!
//! [`IngestError`]는 분류, 실시간 감시, 폴링, 저장 과정에서 발생하는 에러를 표현합니다.
//! `From<IngestError> for HivewatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use hivewatch_core::error::{ConfigError, HivewatchError, PipelineError, StoreError};
use hivewatch_runtime::RuntimeError;

/// 수집 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 분류기 초기화 실패
    #[error("classifier error: {0}")]
    Classifier(String),

    /// 파일 감시 에러
    #[error("watcher error: {path}: {reason}")]
    Watcher {
        /// 대상 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 폴링 에러
    #[error("poll error: target '{target_id}': {reason}")]
    Poll {
        /// 대상 ID
        target_id: String,
        /// 에러 사유
        reason: String,
    },

    /// 저장소 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// 컨테이너 런타임 에러
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// 저장 조건을 만족하지 않는 이벤트
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// 이미 정지된 코디네이터에 대한 요청
    #[error("coordinator is stopped")]
    Stopped,
}

impl From<IngestError> for HivewatchError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Store(e) => HivewatchError::Store(e),
            IngestError::Runtime(e) => HivewatchError::from(e),
            IngestError::Config { field, reason } => {
                HivewatchError::Config(ConfigError::InvalidValue { field, reason })
            }
            IngestError::Io(e) => HivewatchError::Io(e),
            IngestError::Stopped => HivewatchError::Pipeline(PipelineError::NotRunning),
            other => HivewatchError::Pipeline(PipelineError::Processing(other.to_string())),
        }
    }
}
