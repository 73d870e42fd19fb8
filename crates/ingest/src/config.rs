//! 수집 파이프라인 설정
//!
//! [`IngestConfig`]는 core의 [`HivewatchConfig`]에서 watcher/poller/notifier 섹션을
//! 가져와 파이프라인 내부에서 쓰는 형태로 변환합니다.
//!
//! # 사용 예시
//! ```ignore
//! use hivewatch_core::config::HivewatchConfig;
//! use hivewatch_ingest::config::IngestConfig;
//!
//! let core_config = HivewatchConfig::default();
//! let config = IngestConfig::from_core(&core_config);
//! ```

use std::time::Duration;

use hivewatch_core::config::HivewatchConfig;

use crate::error::IngestError;

/// 실시간 로그 감시 설정
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 파일 상태 체크 주기 (밀리초)
    pub scan_interval_ms: u64,
    /// 감시할 확장자 (점 제외, 소문자)
    pub extensions: Vec<String>,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 한 번에 읽을 최대 바이트
    pub max_read_bytes: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_ms: 1000,
            extensions: vec!["log".to_owned(), "json".to_owned()],
            max_line_length: 64 * 1024,      // 64KB
            max_read_bytes: 4 * 1024 * 1024, // 4MB
        }
    }
}

impl WatcherConfig {
    /// core 설정에서 감시 설정을 생성합니다.
    pub fn from_core(core: &HivewatchConfig) -> Self {
        Self {
            enabled: core.watcher.enabled,
            scan_interval_ms: core.watcher.scan_interval_ms,
            extensions: core
                .watcher
                .extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            max_line_length: core.watcher.max_line_length,
            max_read_bytes: core.watcher.max_read_bytes,
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    /// 경로의 확장자가 감시 대상인지 확인합니다.
    pub fn matches_extension(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_ascii_lowercase();
                self.extensions.iter().any(|allowed| *allowed == e)
            })
            .unwrap_or(false)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.scan_interval_ms == 0 {
            return Err(config_error("scan_interval_ms", "must be greater than 0"));
        }
        if self.extensions.is_empty() {
            return Err(config_error("extensions", "must not be empty"));
        }
        if self.max_line_length == 0 {
            return Err(config_error("max_line_length", "must be greater than 0"));
        }
        if self.max_read_bytes < self.max_line_length {
            return Err(config_error(
                "max_read_bytes",
                "must be at least max_line_length",
            ));
        }
        Ok(())
    }
}

/// 컨테이너 로그 폴링 설정
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 폴링 주기 (초)
    pub interval_secs: u64,
    /// 사이클 실패 시 주기 배수
    pub backoff_multiplier: u32,
    /// 가져올 최근 로그 라인 수
    pub tail_lines: usize,
    /// 대상 ID를 담는 컨테이너 라벨
    pub target_label: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            backoff_multiplier: 2,
            tail_lines: 200,
            target_label: "honeypot.id".to_owned(),
        }
    }
}

impl PollerConfig {
    /// core 설정에서 폴링 설정을 생성합니다.
    pub fn from_core(core: &HivewatchConfig) -> Self {
        Self {
            enabled: core.poller.enabled,
            interval_secs: core.poller.interval_secs,
            backoff_multiplier: core.poller.backoff_multiplier,
            tail_lines: core.poller.tail_lines,
            target_label: core.poller.target_label.clone(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// 사이클 실패 후 다음 사이클까지의 대기 시간
    pub fn backoff_interval(&self) -> Duration {
        self.interval().saturating_mul(self.backoff_multiplier.max(1))
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.interval_secs == 0 {
            return Err(config_error("interval_secs", "must be greater than 0"));
        }
        if self.backoff_multiplier == 0 {
            return Err(config_error("backoff_multiplier", "must be at least 1"));
        }
        if self.tail_lines == 0 {
            return Err(config_error("tail_lines", "must be greater than 0"));
        }
        if self.target_label.is_empty() {
            return Err(config_error("target_label", "must not be empty"));
        }
        Ok(())
    }
}

/// 수집 파이프라인 전체 설정
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    pub watcher: WatcherConfig,
    pub poller: PollerConfig,
    /// 구독자별 채널 용량
    pub subscriber_capacity: usize,
    /// 종료 대기 시간 (초)
    pub shutdown_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            watcher: WatcherConfig::default(),
            poller: PollerConfig::default(),
            subscriber_capacity: 256,
            shutdown_timeout_secs: 10,
        }
    }
}

impl IngestConfig {
    /// core 설정에서 수집 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &HivewatchConfig) -> Self {
        Self {
            watcher: WatcherConfig::from_core(core),
            poller: PollerConfig::from_core(core),
            subscriber_capacity: core.notifier.subscriber_capacity,
            shutdown_timeout_secs: core.shutdown_timeout_secs,
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// 설정값의 유효성을 검증합니다. 비활성화된 구성요소는 건너뜁니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.watcher.enabled {
            self.watcher.validate()?;
        }
        if self.poller.enabled {
            self.poller.validate()?;
        }
        if self.subscriber_capacity == 0 {
            return Err(config_error("subscriber_capacity", "must be greater than 0"));
        }
        if self.shutdown_timeout_secs == 0 {
            return Err(config_error(
                "shutdown_timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn config_error(field: &str, reason: &str) -> IngestError {
    IngestError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

/// 수집 파이프라인 설정 빌더
///
/// 테스트에서 짧은 주기로 파이프라인을 구성할 때 주로 사용합니다.
#[derive(Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 실시간 감시 활성화 여부를 설정합니다.
    pub fn watcher_enabled(mut self, enabled: bool) -> Self {
        self.config.watcher.enabled = enabled;
        self
    }

    /// 파일 상태 체크 주기(밀리초)를 설정합니다.
    pub fn scan_interval_ms(mut self, ms: u64) -> Self {
        self.config.watcher.scan_interval_ms = ms;
        self
    }

    /// 감시 확장자를 설정합니다.
    pub fn extensions(mut self, extensions: Vec<String>) -> Self {
        self.config.watcher.extensions = extensions;
        self
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn max_line_length(mut self, bytes: usize) -> Self {
        self.config.watcher.max_line_length = bytes;
        self
    }

    /// 한 번에 읽을 최대 바이트를 설정합니다.
    pub fn max_read_bytes(mut self, bytes: usize) -> Self {
        self.config.watcher.max_read_bytes = bytes;
        self
    }

    /// 폴링 활성화 여부를 설정합니다.
    pub fn poller_enabled(mut self, enabled: bool) -> Self {
        self.config.poller.enabled = enabled;
        self
    }

    /// 폴링 주기(초)를 설정합니다.
    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.poller.interval_secs = secs;
        self
    }

    /// 폴링 실패 시 주기 배수를 설정합니다.
    pub fn backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.config.poller.backoff_multiplier = multiplier;
        self
    }

    /// 가져올 로그 라인 수를 설정합니다.
    pub fn tail_lines(mut self, lines: usize) -> Self {
        self.config.poller.tail_lines = lines;
        self
    }

    /// 대상 라벨을 설정합니다.
    pub fn target_label(mut self, label: impl Into<String>) -> Self {
        self.config.poller.target_label = label.into();
        self
    }

    /// 구독자 채널 용량을 설정합니다.
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.config.subscriber_capacity = capacity;
        self
    }

    /// 종료 대기 시간(초)을 설정합니다.
    pub fn shutdown_timeout_secs(mut self, secs: u64) -> Self {
        self.config.shutdown_timeout_secs = secs;
        self
    }

    /// 설정을 검증하고 `IngestConfig`를 생성합니다.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
