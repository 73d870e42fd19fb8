//! 도메인 타입 -- 감시 대상(target) 레코드와 상태

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 허니팟 프로토콜 종류 -- 분류기 선택 기준
///
/// 알 수 없는 값은 에러가 아닌 [`ProtocolKind::Other`]로 보존되며,
/// fallback 분류기로 처리됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProtocolKind {
    /// SSH (cowrie 계열)
    Ssh,
    /// FTP
    Ftp,
    /// 웹 (HTTP)
    Web,
    /// 그 외 (소문자 정규화된 원본 이름)
    Other(String),
}

impl ProtocolKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ssh => "ssh",
            Self::Ftp => "ftp",
            Self::Web => "web",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for ProtocolKind {
    fn from(value: &str) -> Self {
        let lower = value.trim().to_ascii_lowercase();
        match lower.as_str() {
            "ssh" => Self::Ssh,
            "ftp" => Self::Ftp,
            "web" | "http" => Self::Web,
            _ => Self::Other(lower),
        }
    }
}

impl From<String> for ProtocolKind {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<ProtocolKind> for String {
    fn from(kind: ProtocolKind) -> Self {
        kind.as_str().to_owned()
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 감시 대상 상태
///
/// `created → active → error | removed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    /// 등록됨 (아직 감시 전)
    Created,
    /// 감시/폴링 중
    Active,
    /// 런타임 인스턴스 소실
    Error,
    /// 명시적으로 제거됨
    Removed,
}

impl TargetStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Error => "error",
            Self::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// 감시 대상 레코드 (저장소에 보관)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    /// 대상 ID
    pub id: String,
    /// 표시 이름
    pub name: String,
    /// 프로토콜 종류
    pub protocol_kind: ProtocolKind,
    /// 로그 디렉토리 경로
    pub log_location: String,
    /// 현재 상태
    pub status: TargetStatus,
    /// 런타임 인스턴스 참조 (컨테이너 ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_ref: Option<String>,
    /// 누적 공격 수
    #[serde(default)]
    pub attack_count: u64,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
}

impl TargetRecord {
    /// `created` 상태의 새 레코드를 생성합니다. 이름은 ID로 초기화됩니다.
    pub fn new(
        id: impl Into<String>,
        protocol_kind: ProtocolKind,
        log_location: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            protocol_kind,
            log_location: log_location.into(),
            status: TargetStatus::Created,
            instance_ref: None,
            attack_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_instance_ref(mut self, instance_ref: impl Into<String>) -> Self {
        self.instance_ref = Some(instance_ref.into());
        self
    }

    pub fn with_status(mut self, status: TargetStatus) -> Self {
        self.status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_kind_parses_case_insensitively() {
        assert_eq!(ProtocolKind::from("SSH"), ProtocolKind::Ssh);
        assert_eq!(ProtocolKind::from(" ftp "), ProtocolKind::Ftp);
        assert_eq!(ProtocolKind::from("HTTP"), ProtocolKind::Web);
    }

    #[test]
    fn unknown_protocol_kind_is_preserved() {
        let kind = ProtocolKind::from("Telnet");
        assert_eq!(kind, ProtocolKind::Other("telnet".to_owned()));
        assert_eq!(kind.to_string(), "telnet");
    }

    #[test]
    fn protocol_kind_serializes_as_string() {
        let json = serde_json::to_string(&ProtocolKind::Web).unwrap();
        assert_eq!(json, "\"web\"");
        let back: ProtocolKind = serde_json::from_str("\"smb\"").unwrap();
        assert_eq!(back, ProtocolKind::Other("smb".to_owned()));
    }

    #[test]
    fn target_status_serializes_lowercase() {
        let json = serde_json::to_string(&TargetStatus::Removed).unwrap();
        assert_eq!(json, "\"removed\"");
        assert!(TargetStatus::Active.is_active());
        assert!(!TargetStatus::Error.is_active());
    }

    #[test]
    fn new_target_record_starts_created() {
        let record = TargetRecord::new("hp-1", ProtocolKind::Ssh, "/tmp/hp-1/logs")
            .with_name("cowrie-1")
            .with_instance_ref("abc123");
        assert_eq!(record.status, TargetStatus::Created);
        assert_eq!(record.name, "cowrie-1");
        assert_eq!(record.instance_ref.as_deref(), Some("abc123"));
        assert_eq!(record.attack_count, 0);
    }
}
