//! SSH 분류기 (cowrie 계열)
//!
//! 구조화된 JSON 레코드를 먼저 시도하고, 실패하면 자유 텍스트 패턴으로 넘어갑니다.
//!
//! # 인식하는 형식
//! - `{"eventid": "cowrie.login.failed", ...}` -> `login_attempt`
//! - `{"eventid": "cowrie.session.connect", ...}` -> `connection`
//! - `login attempt [user/pass] failed` -> `login_attempt`
//! - `login attempt [user/pass] succeeded` -> `login_success`
//! - `"username": "...", ... "password": "..."` -> `login_attempt`
//! - `New connection: 1.2.3.4:5678` -> `connection`

use serde::Deserialize;

use hivewatch_core::event::{AttackEvent, AttackKind, Attributes, UNKNOWN_ADDRESS};

use super::{AddressExtractor, Classifier, Pattern};
use crate::error::IngestError;

const COWRIE_LOGIN_FAILED: &str = "cowrie.login.failed";
const COWRIE_SESSION_CONNECT: &str = "cowrie.session.connect";
const DEFAULT_PROTOCOL: &str = "ssh";

/// cowrie JSON 로그 레코드 중 분류에 필요한 필드
#[derive(Debug, Deserialize)]
struct CowrieRecord {
    #[serde(default)]
    eventid: Option<String>,
    #[serde(default)]
    src_ip: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    protocol: Option<String>,
}

/// SSH 로그 분류기
pub struct SshClassifier {
    patterns: Vec<Pattern>,
    addresses: AddressExtractor,
}

impl SshClassifier {
    pub fn new(addresses: AddressExtractor) -> Result<Self, IngestError> {
        let patterns = vec![
            Pattern::new(r"login attempt \[(.+?)/(.+?)\] failed", AttackKind::LOGIN_ATTEMPT)?,
            Pattern::new(
                r"login attempt \[(.+?)/(.+?)\] succeeded",
                AttackKind::LOGIN_SUCCESS,
            )?,
            Pattern::new(
                r#""username": "([^"]+)".*"password": "([^"]+)""#,
                AttackKind::LOGIN_ATTEMPT,
            )?,
            Pattern::new(r"New connection: ([0-9.]+):(\d+)", AttackKind::CONNECTION)?,
        ];
        Ok(Self {
            patterns,
            addresses,
        })
    }

    /// 잘 형성된 JSON 레코드를 분류합니다. 파싱 실패는 `None`입니다.
    fn classify_structured(&self, target_id: &str, line: &str) -> Option<AttackEvent> {
        let record: CowrieRecord = serde_json::from_str(line).ok()?;
        let source = record
            .src_ip
            .unwrap_or_else(|| UNKNOWN_ADDRESS.to_owned());
        let protocol = record
            .protocol
            .unwrap_or_else(|| DEFAULT_PROTOCOL.to_owned());

        match record.eventid.as_deref() {
            Some(COWRIE_LOGIN_FAILED) => Some(AttackEvent::new(
                target_id,
                source,
                AttackKind::LOGIN_ATTEMPT,
                Attributes::new()
                    .with(Attributes::USERNAME, record.username.unwrap_or_default())
                    .with(Attributes::PASSWORD, record.password.unwrap_or_default())
                    .with(Attributes::PROTOCOL, protocol),
            )),
            Some(COWRIE_SESSION_CONNECT) => Some(AttackEvent::new(
                target_id,
                source,
                AttackKind::CONNECTION,
                Attributes::new().with(Attributes::PROTOCOL, protocol),
            )),
            _ => None,
        }
    }

    fn classify_text(&self, target_id: &str, line: &str) -> Option<AttackEvent> {
        let (pattern, caps) = self
            .patterns
            .iter()
            .find_map(|p| p.regex.captures(line).map(|caps| (p, caps)))?;

        let attributes = match (pattern.kind, caps.get(1), caps.get(2)) {
            (AttackKind::LOGIN_ATTEMPT, Some(user), Some(pass)) => Attributes::new()
                .with(Attributes::USERNAME, unwrap_byte_literal(user.as_str()))
                .with(Attributes::PASSWORD, unwrap_byte_literal(pass.as_str())),
            _ => Attributes::new().with(Attributes::RAW_LOG, line.trim()),
        };

        Some(AttackEvent::new(
            target_id,
            self.addresses.extract(line),
            pattern.kind,
            attributes,
        ))
    }
}

impl Classifier for SshClassifier {
    fn protocol(&self) -> &'static str {
        "ssh"
    }

    fn classify(&self, target_id: &str, line: &str) -> Option<AttackEvent> {
        let trimmed = line.trim();
        if trimmed.starts_with('{') && trimmed.ends_with('}') {
            if let Some(event) = self.classify_structured(target_id, trimmed) {
                return Some(event);
            }
        }
        self.classify_text(target_id, line)
    }
}

/// `b'root'` 또는 `b"root"` 형태의 바이트 리터럴 표기를 벗겨 냅니다.
fn unwrap_byte_literal(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix('b')
            .and_then(|v| v.strip_prefix(quote))
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
