//! FTP 분류기
//!
//! 명시적 패턴(인증 실패, 로그인 성공, 연결)을 먼저 시도합니다.
//! 매칭되지 않더라도 인증 관련 키워드가 있으면 `login_attempt`를 만들고,
//! 사용자명을 찾지 못하면 `"unknown"`으로 채웁니다. 정밀도보다 재현율을 우선합니다.

use regex::{Regex, RegexBuilder};

use hivewatch_core::event::{AttackEvent, AttackKind, Attributes};

use super::{AddressExtractor, Classifier, Pattern};
use crate::error::IngestError;

const PROTOCOL: &str = "ftp";

/// 인증 시도로 간주하는 키워드 (소문자 비교)
const AUTH_KEYWORDS: [&str; 5] = [
    "authentication failed",
    "user",
    "password required",
    "unable to read",
    "indexed puredb",
];

/// FTP 로그 분류기
pub struct FtpClassifier {
    patterns: Vec<Pattern>,
    /// 키워드 fallback에서 사용자명을 찾는 패턴 (대소문자 무시, 순서대로)
    username_patterns: Vec<Regex>,
    addresses: AddressExtractor,
}

impl FtpClassifier {
    pub fn new(addresses: AddressExtractor) -> Result<Self, IngestError> {
        let patterns = vec![
            Pattern::new(
                r#"Authentication failed for user "([^"]+)""#,
                AttackKind::LOGIN_ATTEMPT,
            )?,
            Pattern::new(r#"Client "([0-9.]+)".*logged in"#, AttackKind::LOGIN_SUCCESS)?,
            Pattern::new(r"Connection from ([0-9.]+)", AttackKind::CONNECTION)?,
        ];

        let username_patterns = [
            r"User\s+(\S+)\s+OK",
            r"User\s+(\S+)",
            r"user\[([^\]]+)\]",
            r"username[=:\s]+(\S+)",
        ]
        .iter()
        .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns,
            username_patterns,
            addresses,
        })
    }

    fn classify_pattern(&self, target_id: &str, line: &str) -> Option<AttackEvent> {
        let (pattern, caps) = self
            .patterns
            .iter()
            .find_map(|p| p.regex.captures(line).map(|caps| (p, caps)))?;

        let attributes = if pattern.kind == AttackKind::LOGIN_ATTEMPT {
            let username = caps.get(1).map_or("unknown", |m| m.as_str());
            Attributes::new()
                .with(Attributes::USERNAME, username)
                .with(Attributes::PROTOCOL, PROTOCOL)
        } else {
            Attributes::new()
                .with(Attributes::RAW_LOG, line.trim())
                .with(Attributes::PROTOCOL, PROTOCOL)
        };

        Some(AttackEvent::new(
            target_id,
            self.addresses.extract(line),
            pattern.kind,
            attributes,
        ))
    }

    fn classify_keywords(&self, target_id: &str, line: &str) -> Option<AttackEvent> {
        let lower = line.to_lowercase();
        if !AUTH_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return None;
        }

        let username = self
            .username_patterns
            .iter()
            .find_map(|re| re.captures(line).and_then(|caps| caps.get(1)))
            .map(|m| m.as_str())
            .unwrap_or("unknown");

        Some(AttackEvent::new(
            target_id,
            self.addresses.extract(line),
            AttackKind::LOGIN_ATTEMPT,
            Attributes::new()
                .with(Attributes::USERNAME, username)
                .with(Attributes::PROTOCOL, PROTOCOL)
                .with(Attributes::RAW_LOG, line.trim()),
        ))
    }
}

impl Classifier for FtpClassifier {
    fn protocol(&self) -> &'static str {
        PROTOCOL
    }

    fn classify(&self, target_id: &str, line: &str) -> Option<AttackEvent> {
        self.classify_pattern(target_id, line)
            .or_else(|| self.classify_keywords(target_id, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivewatch_core::event::UNKNOWN_ADDRESS;

    fn classifier() -> FtpClassifier {
        FtpClassifier::new(AddressExtractor::new().unwrap()).unwrap()
    }

    #[test]
    fn authentication_failure_captures_username() {
        let line = r#"[pure-ftpd] (?@192.0.2.10) Authentication failed for user "anonymous""#;
        let event = classifier().classify("hp-ftp", line).unwrap();
        assert_eq!(event.kind, AttackKind::LOGIN_ATTEMPT);
        assert_eq!(event.attributes.username(), Some("anonymous"));
        assert_eq!(event.attributes.protocol(), Some("ftp"));
        assert_eq!(event.attributes.raw_log(), None);
        assert_eq!(event.source_address, "192.0.2.10");
    }

    #[test]
    fn successful_login() {
        let line = r#"Client "192.0.2.20", "admin" logged in"#;
        let event = classifier().classify("hp-ftp", line).unwrap();
        assert_eq!(event.kind, AttackKind::LOGIN_SUCCESS);
        assert_eq!(event.source_address, "192.0.2.20");
        assert_eq!(event.attributes.raw_log(), Some(line));
    }

    #[test]
    fn bare_connection() {
        let event = classifier()
            .classify("hp-ftp", "Connection from 192.0.2.30")
            .unwrap();
        assert_eq!(event.kind, AttackKind::CONNECTION);
        assert_eq!(event.attributes.protocol(), Some("ftp"));
    }

    #[test]
    fn keyword_fallback_extracts_username() {
        let event = classifier()
            .classify("hp-ftp", "pure-ftpd: User devraj OK")
            .unwrap();
        assert_eq!(event.kind, AttackKind::LOGIN_ATTEMPT);
        assert_eq!(event.attributes.username(), Some("devraj"));
        assert!(event.attributes.raw_log().is_some());
    }

    #[test]
    fn keyword_fallback_without_username_uses_unknown() {
        let event = classifier()
            .classify("hp-ftp", "Password required for this session")
            .unwrap();
        assert_eq!(event.kind, AttackKind::LOGIN_ATTEMPT);
        assert_eq!(event.attributes.username(), Some("unknown"));
        assert_eq!(event.source_address, UNKNOWN_ADDRESS);
    }

    #[test]
    fn keyword_fallback_bracketed_username() {
        let event = classifier()
            .classify("hp-ftp", "Indexed PureDB lookup failed")
            .unwrap();
        assert_eq!(event.attributes.username(), Some("unknown"));

        let event = classifier()
            .classify("hp-ftp", "unable to read user[guest] entry")
            .unwrap();
        assert_eq!(event.attributes.username(), Some("guest"));
    }

    #[test]
    fn unrelated_line_yields_nothing() {
        assert!(classifier().classify("hp-ftp", "server listening on port 21").is_none());
    }
}
