//! 공격 이벤트 -- 수집 파이프라인의 정규 출력 단위
//!
//! [`AttackEvent`]는 분류기(classifier)가 로그 한 줄에서 만들어 내는 결과이며,
//! 중복 제거를 거쳐 저장소에 기록된 뒤에는 변경되지 않습니다.
//!
//! - [`AttackKind`]: 열린 태그 집합 (새 분류기가 새 종류를 추가할 수 있음)
//! - [`Attributes`]: 프로토콜별 필드의 정렬된 키-값 맵
//!
//! 레코드 ID(`id`)는 주소 지정용이고, 지문(`fingerprint`)은 중복 제거용입니다.
//! 두 값은 서로 독립적입니다.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint;

/// 출발지 주소를 알 수 없을 때 사용하는 값
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// 공격 종류 태그
///
/// 닫힌 enum이 아닌 문자열 래퍼입니다. 잘 알려진 종류는 연관 상수로 제공합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttackKind(String);

impl AttackKind {
    /// 로그인 시도 (실패 포함)
    pub const LOGIN_ATTEMPT: &'static str = "login_attempt";
    /// 로그인 성공
    pub const LOGIN_SUCCESS: &'static str = "login_success";
    /// 연결 수립
    pub const CONNECTION: &'static str = "connection";
    /// HTTP 요청
    pub const HTTP_REQUEST: &'static str = "http_request";
    /// SQL 인젝션 시도
    pub const SQL_INJECTION: &'static str = "sql_injection";
    /// XSS 시도
    pub const XSS_ATTEMPT: &'static str = "xss_attempt";
    /// 분류되지 않은 활동 (fallback 분류기)
    pub const ACTIVITY: &'static str = "activity";

    /// 새 공격 종류를 생성합니다.
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// 문자열 표현을 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 빈 태그인지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for AttackKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

impl PartialEq<&str> for AttackKind {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 프로토콜별 이벤트 속성
///
/// 정렬된 맵(`BTreeMap`)이므로 순회 순서가 결정적이며, 지문 계산에 그대로 사용됩니다.
///
/// # 종류별 필드
/// - `login_attempt`: `username` (필수), `password` (있을 경우), `protocol`
/// - `http_request` / `sql_injection` / `xss_attempt`: `raw_log`, `protocol`, `path` (있을 경우)
/// - `connection` / `login_success` / `activity`: `raw_log`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    /// 사용자명 키
    pub const USERNAME: &'static str = "username";
    /// 비밀번호 키
    pub const PASSWORD: &'static str = "password";
    /// 요청 경로 키
    pub const PATH: &'static str = "path";
    /// 원본 로그 라인 키
    pub const RAW_LOG: &'static str = "raw_log";
    /// 프로토콜 이름 키
    pub const PROTOCOL: &'static str = "protocol";

    /// 빈 속성 맵을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 필드를 추가한 속성 맵을 반환합니다 (빌더 스타일).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// 필드를 삽입합니다.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// 필드 값을 조회합니다.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn username(&self) -> Option<&str> {
        self.get(Self::USERNAME)
    }

    pub fn password(&self) -> Option<&str> {
        self.get(Self::PASSWORD)
    }

    pub fn path(&self) -> Option<&str> {
        self.get(Self::PATH)
    }

    pub fn raw_log(&self) -> Option<&str> {
        self.get(Self::RAW_LOG)
    }

    pub fn protocol(&self) -> Option<&str> {
        self.get(Self::PROTOCOL)
    }

    /// 필드를 키 순서대로 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 지문 계산용 정규 표현을 만듭니다.
    ///
    /// 각 키와 값에 길이 접두사를 붙여 경계가 모호해지지 않도록 합니다.
    pub fn canonical_form(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.0 {
            out.push_str(&format!("{}:{}{}:{};", key.len(), key, value.len(), value));
        }
        out
    }
}

/// 공격 이벤트
///
/// `occurred_at`은 탐지 시각입니다. 원본 로그에 타임스탬프가 없는 경우가 있으므로
/// 실제 발생 시각과 다를 수 있으며, 지문 계산에서 제외됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackEvent {
    /// 레코드 ID (UUID v4)
    pub id: String,
    /// 감시 대상 허니팟 ID
    pub target_id: String,
    /// 출발지 IPv4 리터럴 또는 `"unknown"`
    pub source_address: String,
    /// 공격 종류
    pub kind: AttackKind,
    /// 탐지 시각
    pub occurred_at: DateTime<Utc>,
    /// 프로토콜별 속성
    pub attributes: Attributes,
    /// 중복 제거 키 (계산 전에는 None)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl AttackEvent {
    /// 현재 시각으로 새 이벤트를 생성합니다. 지문은 아직 계산하지 않습니다.
    pub fn new(
        target_id: impl Into<String>,
        source_address: impl Into<String>,
        kind: impl Into<AttackKind>,
        attributes: Attributes,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            target_id: target_id.into(),
            source_address: source_address.into(),
            kind: kind.into(),
            occurred_at: Utc::now(),
            attributes,
            fingerprint: None,
        }
    }

    /// 탐지 시각을 지정합니다.
    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// 의미 필드로부터 지문을 계산합니다 (저장하지 않음).
    pub fn compute_fingerprint(&self) -> String {
        fingerprint::fingerprint(
            &self.target_id,
            &self.source_address,
            self.kind.as_str(),
            &self.attributes,
        )
    }

    /// 지문이 없으면 계산하여 채우고, 지문을 반환합니다.
    pub fn ensure_fingerprint(&mut self) -> &str {
        let fingerprint = match self.fingerprint.take() {
            Some(existing) => existing,
            None => self.compute_fingerprint(),
        };
        self.fingerprint.insert(fingerprint).as_str()
    }

    /// 저장 가능한 상태인지 확인합니다.
    ///
    /// target_id와 kind가 비어 있지 않고 지문이 있어야 합니다.
    pub fn is_persistable(&self) -> bool {
        !self.target_id.is_empty() && !self.kind.is_empty() && self.fingerprint.is_some()
    }
}

impl fmt::Display for AttackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AttackEvent[{}] {} target={} src={}",
            &self.id[..8.min(self.id.len())],
            self.kind,
            self.target_id,
            self.source_address,
        )
    }
}
