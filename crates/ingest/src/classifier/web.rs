//! 웹(HTTP) 분류기
//!
//! 명시적 패턴 목록을 먼저 시도한 뒤, 아무것도 매칭되지 않은 경우에만
//! 두 가지 휴리스틱을 순서대로 적용합니다.
//! - 대소문자 무시 `SELECT ... FROM` -> `sql_injection`
//! - `<script>` -> `xss_attempt`

use hivewatch_core::event::{AttackEvent, AttackKind, Attributes};

use super::{AddressExtractor, Classifier, Pattern};
use crate::error::IngestError;

const PROTOCOL_ATTRIBUTE: &str = "http";

/// 웹 로그 분류기
pub struct WebClassifier {
    patterns: Vec<Pattern>,
    addresses: AddressExtractor,
}

impl WebClassifier {
    pub fn new(addresses: AddressExtractor) -> Result<Self, IngestError> {
        let patterns = vec![
            Pattern::new(
                r#""(?:GET|POST|PUT|DELETE) ([^ ]*) HTTP"#,
                AttackKind::HTTP_REQUEST,
            )?,
            Pattern::new(r#"SQL injection attempt: ([^"]+)"#, AttackKind::SQL_INJECTION)?,
            Pattern::new(r#"XSS attempt: ([^"]+)"#, AttackKind::XSS_ATTEMPT)?,
        ];
        Ok(Self {
            patterns,
            addresses,
        })
    }

    fn heuristic_kind(line: &str) -> Option<&'static str> {
        let upper = line.to_uppercase();
        if upper.contains("SELECT") && upper.contains("FROM") {
            return Some(AttackKind::SQL_INJECTION);
        }
        if line.to_lowercase().contains("<script>") {
            return Some(AttackKind::XSS_ATTEMPT);
        }
        None
    }
}

impl Classifier for WebClassifier {
    fn protocol(&self) -> &'static str {
        "web"
    }

    fn classify(&self, target_id: &str, line: &str) -> Option<AttackEvent> {
        let raw = line.trim();

        let matched = self.patterns.iter().find_map(|p| {
            p.regex
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|path| (p.kind, path.as_str()))
        });

        let (kind, attributes) = match matched {
            Some((kind, path)) => (
                kind,
                Attributes::new()
                    .with(Attributes::PATH, path)
                    .with(Attributes::RAW_LOG, raw)
                    .with(Attributes::PROTOCOL, PROTOCOL_ATTRIBUTE),
            ),
            None => (
                Self::heuristic_kind(line)?,
                Attributes::new()
                    .with(Attributes::RAW_LOG, raw)
                    .with(Attributes::PROTOCOL, PROTOCOL_ATTRIBUTE),
            ),
        };

        Some(AttackEvent::new(
            target_id,
            self.addresses.extract(line),
            kind,
            attributes,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> WebClassifier {
        WebClassifier::new(AddressExtractor::new().unwrap()).unwrap()
    }

    #[test]
    fn access_log_request_line() {
        let line = r#"203.0.113.7 - - [15/Jan/2024:12:00:00 +0000] "GET /wp-login.php HTTP/1.1" 404 512"#;
        let event = classifier().classify("hp-web", line).unwrap();
        assert_eq!(event.kind, AttackKind::HTTP_REQUEST);
        assert_eq!(event.attributes.path(), Some("/wp-login.php"));
        assert_eq!(event.attributes.protocol(), Some("http"));
        assert_eq!(event.source_address, "203.0.113.7");
    }

    #[test]
    fn explicit_sql_injection_marker() {
        let event = classifier()
            .classify("hp-web", "WARN SQL injection attempt: 1' OR '1'='1")
            .unwrap();
        assert_eq!(event.kind, AttackKind::SQL_INJECTION);
        assert_eq!(event.attributes.path(), Some("1' OR '1'='1"));
    }

    #[test]
    fn uppercase_select_from_heuristic() {
        let event = classifier()
            .classify("hp-web", "SELECT * FROM users WHERE id=1 OR 1=1")
            .unwrap();
        assert_eq!(event.kind, AttackKind::SQL_INJECTION);
        assert_eq!(event.attributes.path(), None);
        assert_eq!(
            event.attributes.raw_log(),
            Some("SELECT * FROM users WHERE id=1 OR 1=1")
        );
    }

    #[test]
    fn select_from_heuristic_is_case_insensitive() {
        let event = classifier()
            .classify("hp-web", "q=union select password from admins")
            .unwrap();
        assert_eq!(event.kind, AttackKind::SQL_INJECTION);
    }

    #[test]
    fn script_tag_heuristic() {
        let event = classifier()
            .classify("hp-web", "comment=<SCRIPT>alert(1)</SCRIPT>")
            .unwrap();
        assert_eq!(event.kind, AttackKind::XSS_ATTEMPT);
    }

    #[test]
    fn explicit_pattern_wins_over_heuristics() {
        let line = r#"10.0.0.1 "GET /search?q=SELECT+1+FROM+dual HTTP/1.1" 200"#;
        let event = classifier().classify("hp-web", line).unwrap();
        assert_eq!(event.kind, AttackKind::HTTP_REQUEST);
    }

    #[test]
    fn plain_line_yields_nothing() {
        assert!(classifier().classify("hp-web", "nginx started").is_none());
    }
}
