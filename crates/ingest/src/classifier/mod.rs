//! 분류기 모듈 -- 프로토콜별 로그 라인 분류
//!
//! 각 분류기는 로그 한 줄을 받아 0개 또는 1개의 [`AttackEvent`]를 만듭니다.
//! 분류기 안의 패턴은 선언 순서대로 시도하며, 첫 번째 매칭이 이깁니다.
//! 매칭되지 않는 라인은 에러가 아니라 `None`입니다.
//!
//! # 지원 프로토콜
//! - SSH ([`SshClassifier`]): cowrie JSON 레코드 + 자유 텍스트
//! - FTP ([`FtpClassifier`]): 자유 텍스트 + 인증 키워드 fallback
//! - 웹 ([`WebClassifier`]): HTTP 요청 라인 + SQL 인젝션/XSS 휴리스틱
//! - 그 외 ([`GenericClassifier`]): IPv4 주소가 있는 모든 라인
//!
//! # 사용 예시
//! ```ignore
//! use hivewatch_core::ProtocolKind;
//! use hivewatch_ingest::classifier::ClassifierSet;
//!
//! let classifiers = ClassifierSet::new()?;
//! let events = classifiers.classify_buffer(&ProtocolKind::Ssh, "hp-1", raw_logs);
//! ```

pub mod ftp;
pub mod generic;
pub mod ssh;
pub mod web;

pub use ftp::FtpClassifier;
pub use generic::GenericClassifier;
pub use ssh::SshClassifier;
pub use web::WebClassifier;

use regex::Regex;

use hivewatch_core::event::{AttackEvent, UNKNOWN_ADDRESS};
use hivewatch_core::metrics as m;
use hivewatch_core::types::ProtocolKind;

use crate::error::IngestError;

/// 로그 라인 분류기
///
/// 구현체는 상태를 갖지 않는 순수 함수처럼 동작해야 합니다.
/// 같은 라인에 대해 항상 같은 종류/속성의 이벤트를 만들어야 지문이 일치합니다.
pub trait Classifier: Send + Sync {
    /// 분류기가 담당하는 프로토콜 이름
    fn protocol(&self) -> &'static str;

    /// 로그 한 줄을 분류합니다.
    fn classify(&self, target_id: &str, line: &str) -> Option<AttackEvent>;
}

/// 출발지 주소 추출기
///
/// 라인 어디에서든 처음 나타나는 IPv4 리터럴을 찾습니다.
/// 없으면 [`UNKNOWN_ADDRESS`]를 반환합니다.
#[derive(Debug, Clone)]
pub struct AddressExtractor {
    ipv4: Regex,
}

impl AddressExtractor {
    pub fn new() -> Result<Self, IngestError> {
        Ok(Self {
            ipv4: Regex::new(r"(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})")?,
        })
    }

    /// 라인에 IPv4 리터럴이 있는지 확인합니다.
    pub fn contains_address(&self, line: &str) -> bool {
        self.ipv4.is_match(line)
    }

    pub fn extract(&self, line: &str) -> String {
        self.ipv4
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_owned())
            .unwrap_or_else(|| UNKNOWN_ADDRESS.to_owned())
    }
}

/// 선언 순서를 갖는 패턴 항목
#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    pub(crate) regex: Regex,
    pub(crate) kind: &'static str,
}

impl Pattern {
    pub(crate) fn new(pattern: &str, kind: &'static str) -> Result<Self, IngestError> {
        let regex = Regex::new(pattern).map_err(|e| {
            IngestError::Classifier(format!("invalid pattern for '{kind}': {e}"))
        })?;
        Ok(Self { regex, kind })
    }
}

/// 프로토콜별 분류기 묶음
///
/// 모든 정규식은 생성 시 한 번만 컴파일됩니다. 여러 수집 경로가
/// `Arc<ClassifierSet>`으로 공유합니다.
pub struct ClassifierSet {
    ssh: SshClassifier,
    ftp: FtpClassifier,
    web: WebClassifier,
    generic: GenericClassifier,
}

impl ClassifierSet {
    /// 기본 분류기 세트를 생성합니다.
    pub fn new() -> Result<Self, IngestError> {
        let addresses = AddressExtractor::new()?;
        Ok(Self {
            ssh: SshClassifier::new(addresses.clone())?,
            ftp: FtpClassifier::new(addresses.clone())?,
            web: WebClassifier::new(addresses.clone())?,
            generic: GenericClassifier::new(addresses),
        })
    }

    /// 프로토콜 종류에 맞는 분류기를 선택합니다.
    ///
    /// 알 수 없는 프로토콜은 fallback 분류기로 처리합니다.
    pub fn for_protocol(&self, kind: &ProtocolKind) -> &dyn Classifier {
        match kind {
            ProtocolKind::Ssh => &self.ssh,
            ProtocolKind::Ftp => &self.ftp,
            ProtocolKind::Web => &self.web,
            ProtocolKind::Other(_) => &self.generic,
        }
    }

    /// 한 줄을 분류합니다.
    pub fn classify_line(
        &self,
        kind: &ProtocolKind,
        target_id: &str,
        line: &str,
    ) -> Option<AttackEvent> {
        self.for_protocol(kind).classify(target_id, line)
    }

    /// 여러 줄로 된 텍스트를 분류합니다.
    ///
    /// 빈 라인은 건너뛰며, 결과는 라인 순서를 유지합니다.
    pub fn classify_buffer(
        &self,
        kind: &ProtocolKind,
        target_id: &str,
        text: &str,
    ) -> Vec<AttackEvent> {
        let classifier = self.for_protocol(kind);
        let mut lines = 0u64;
        let events: Vec<AttackEvent> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                lines += 1;
                classifier.classify(target_id, line)
            })
            .collect();

        if lines > 0 {
            metrics::counter!(m::LINES_CLASSIFIED_TOTAL, m::LABEL_PROTOCOL => classifier.protocol())
                .increment(lines);
        }
        events
    }
}
