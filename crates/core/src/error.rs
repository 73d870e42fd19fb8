//! 에러 타입 -- 도메인별 에러 정의

/// hivewatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum HivewatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인(수집/분류/중복제거) 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 레코드 저장소 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// 컨테이너 런타임 에러
    #[error("runtime error: {0}")]
    Runtime(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("not running")]
    NotRunning,

    /// 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 종료 타임아웃
    #[error("shutdown timed out after {0}s")]
    ShutdownTimeout(u64),

    /// 수집 처리 중 에러
    #[error("processing failed: {0}")]
    Processing(String),
}

/// 레코드 저장소 에러
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 저장 파일 읽기/쓰기 실패
    #[error("store io failed at {path}: {reason}")]
    Io { path: String, reason: String },

    /// 저장 파일 형식 손상
    #[error("store corrupted at {path}: {reason}")]
    Corrupted { path: String, reason: String },

    /// 대상(target)을 찾을 수 없음
    #[error("target not found: {0}")]
    TargetNotFound(String),

    /// 지문이 없는 이벤트 저장 시도
    #[error("event {0} has no fingerprint")]
    MissingFingerprint(String),

    /// 잠금 오염 (다른 스레드 패닉)
    #[error("store lock poisoned")]
    Poisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_to_top_level() {
        let err: HivewatchError = StoreError::TargetNotFound("hp-1".to_owned()).into();
        assert!(matches!(err, HivewatchError::Store(_)));
        assert!(err.to_string().contains("hp-1"));
    }

    #[test]
    fn config_error_display_names_field() {
        let err = ConfigError::InvalidValue {
            field: "poller.interval_secs".to_owned(),
            reason: "must be greater than 0".to_owned(),
        };
        assert!(err.to_string().contains("poller.interval_secs"));
    }

    #[test]
    fn shutdown_timeout_display() {
        let err = PipelineError::ShutdownTimeout(10);
        assert_eq!(err.to_string(), "shutdown timed out after 10s");
    }
}
