//! 설정 관리 -- hivewatch.toml 파싱 및 런타임 설정
//!
//! [`HivewatchConfig`]는 모든 구성요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`HIVEWATCH_POLLER_INTERVAL_SECS=15` 형식)
//! 3. 설정 파일 (`hivewatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), hivewatch_core::error::HivewatchError> {
//! use hivewatch_core::config::HivewatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = HivewatchConfig::load("hivewatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = HivewatchConfig::parse("[poller]\ninterval_secs = 10")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, HivewatchError};

/// 기본 레코드 파일 이름 (`data_dir` 하위)
pub const DEFAULT_STORE_FILE: &str = "records.json";

/// Hivewatch 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HivewatchConfig {
    /// 종료 대기 시간 (초)
    pub shutdown_timeout_secs: u64,
    /// 일반 설정
    pub general: GeneralConfig,
    /// 실시간 로그 감시 설정
    pub watcher: WatcherSection,
    /// 컨테이너 로그 폴링 설정
    pub poller: PollerSection,
    /// 구독자 알림 설정
    pub notifier: NotifierSection,
    /// 컨테이너 런타임 설정
    pub runtime: RuntimeSection,
    /// 레코드 저장소 설정
    pub store: StoreSection,
    /// Prometheus 메트릭 설정
    pub metrics: MetricsSection,
}

impl Default for HivewatchConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: 10,
            general: GeneralConfig::default(),
            watcher: WatcherSection::default(),
            poller: PollerSection::default(),
            notifier: NotifierSection::default(),
            runtime: RuntimeSection::default(),
            store: StoreSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

impl HivewatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, HivewatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    ///
    /// 값 검증은 하지 않습니다. 오버라이드를 모두 적용한 뒤 [`validate`](Self::validate)를 호출하세요.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, HivewatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HivewatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                HivewatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, HivewatchError> {
        toml::from_str(toml_str).map_err(|e| {
            HivewatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `HIVEWATCH_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        override_u64(
            &mut self.shutdown_timeout_secs,
            "HIVEWATCH_SHUTDOWN_TIMEOUT_SECS",
        );

        // General
        override_string(&mut self.general.log_level, "HIVEWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "HIVEWATCH_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "HIVEWATCH_GENERAL_DATA_DIR");

        // Watcher
        override_bool(&mut self.watcher.enabled, "HIVEWATCH_WATCHER_ENABLED");
        override_u64(
            &mut self.watcher.scan_interval_ms,
            "HIVEWATCH_WATCHER_SCAN_INTERVAL_MS",
        );
        override_csv(&mut self.watcher.extensions, "HIVEWATCH_WATCHER_EXTENSIONS");
        override_usize(
            &mut self.watcher.max_line_length,
            "HIVEWATCH_WATCHER_MAX_LINE_LENGTH",
        );
        override_usize(
            &mut self.watcher.max_read_bytes,
            "HIVEWATCH_WATCHER_MAX_READ_BYTES",
        );

        // Poller
        override_bool(&mut self.poller.enabled, "HIVEWATCH_POLLER_ENABLED");
        override_u64(
            &mut self.poller.interval_secs,
            "HIVEWATCH_POLLER_INTERVAL_SECS",
        );
        override_u32(
            &mut self.poller.backoff_multiplier,
            "HIVEWATCH_POLLER_BACKOFF_MULTIPLIER",
        );
        override_usize(&mut self.poller.tail_lines, "HIVEWATCH_POLLER_TAIL_LINES");
        override_string(
            &mut self.poller.target_label,
            "HIVEWATCH_POLLER_TARGET_LABEL",
        );

        // Notifier
        override_usize(
            &mut self.notifier.subscriber_capacity,
            "HIVEWATCH_NOTIFIER_SUBSCRIBER_CAPACITY",
        );

        // Runtime
        override_string(
            &mut self.runtime.docker_socket,
            "HIVEWATCH_RUNTIME_DOCKER_SOCKET",
        );

        // Store
        override_string(&mut self.store.path, "HIVEWATCH_STORE_PATH");

        // Metrics
        override_bool(&mut self.metrics.enabled, "HIVEWATCH_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "HIVEWATCH_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "HIVEWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), HivewatchError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.shutdown_timeout_secs == 0 {
            return Err(invalid("shutdown_timeout_secs", "must be greater than 0"));
        }

        if self.watcher.enabled {
            if self.watcher.scan_interval_ms == 0 {
                return Err(invalid("watcher.scan_interval_ms", "must be greater than 0"));
            }
            if self.watcher.extensions.iter().all(|e| e.trim().is_empty()) {
                return Err(invalid("watcher.extensions", "must not be empty"));
            }
            if self.watcher.max_line_length == 0 {
                return Err(invalid("watcher.max_line_length", "must be greater than 0"));
            }
            if self.watcher.max_read_bytes < self.watcher.max_line_length {
                return Err(invalid(
                    "watcher.max_read_bytes",
                    "must be at least watcher.max_line_length",
                ));
            }
        }

        if self.poller.enabled {
            if self.poller.interval_secs == 0 {
                return Err(invalid("poller.interval_secs", "must be greater than 0"));
            }
            if self.poller.backoff_multiplier < 1 {
                return Err(invalid("poller.backoff_multiplier", "must be at least 1"));
            }
            if self.poller.target_label.is_empty() {
                return Err(invalid("poller.target_label", "must not be empty"));
            }
        }

        if self.notifier.subscriber_capacity == 0 {
            return Err(invalid(
                "notifier.subscriber_capacity",
                "must be greater than 0",
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must be greater than 0"));
        }

        Ok(())
    }

    /// 레코드 파일 경로. `store.path`가 비어 있으면 `data_dir/records.json`.
    pub fn store_path(&self) -> PathBuf {
        if self.store.path.is_empty() {
            Path::new(&self.general.data_dir).join(DEFAULT_STORE_FILE)
        } else {
            PathBuf::from(&self.store.path)
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> HivewatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/hivewatch".to_owned(),
        }
    }
}

/// 실시간 로그 감시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSection {
    /// 활성화 여부
    pub enabled: bool,
    /// 파일 메타데이터 확인 주기 (밀리초)
    pub scan_interval_ms: u64,
    /// 감시할 파일 확장자 (점 제외)
    pub extensions: Vec<String>,
    /// 최대 라인 길이 (바이트, 초과분은 건너뜀)
    pub max_line_length: usize,
    /// 한 번에 읽을 최대 바이트
    pub max_read_bytes: usize,
}

impl Default for WatcherSection {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_ms: 1000,
            extensions: vec!["log".to_owned(), "json".to_owned()],
            max_line_length: 64 * 1024,     // 64KB
            max_read_bytes: 4 * 1024 * 1024, // 4MB
        }
    }
}

/// 컨테이너 로그 폴링 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSection {
    /// 활성화 여부
    pub enabled: bool,
    /// 폴링 주기 (초)
    pub interval_secs: u64,
    /// 사이클 실패 시 주기 배수
    pub backoff_multiplier: u32,
    /// 컨테이너에서 가져올 최근 로그 라인 수
    pub tail_lines: usize,
    /// 대상 ID를 담는 컨테이너 라벨
    pub target_label: String,
}

impl Default for PollerSection {
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

/// 구독자 알림 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierSection {
    /// 구독자별 채널 용량
    pub subscriber_capacity: usize,
}

impl Default for NotifierSection {
    fn default() -> Self {
        Self {
            subscriber_capacity: 256,
        }
    }
}

/// 컨테이너 런타임 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Docker 소켓 경로
    pub docker_socket: String,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            docker_socket: "/var/run/docker.sock".to_owned(),
        }
    }
}

/// 레코드 저장소 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// 레코드 파일 경로 (비어 있으면 data_dir 하위)
    pub path: String,
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9102,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
