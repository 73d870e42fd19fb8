//! 지문(fingerprint) 계산 -- 수집 경로 간 중복 제거 키
//!
//! 실시간 감시(watcher)와 주기적 폴링(poller)은 같은 로그 라인을 서로 다른 시각에
//! 관찰할 수 있습니다. 두 경로가 만든 이벤트가 같은 지문을 갖도록 타임스탬프와
//! 레코드 ID는 입력에서 제외합니다.
//!
//! 정규 형식: `target_id ␟ source_address ␟ kind ␟ username ␟ password ␟ attributes`
//! (␟ = U+001F unit separator) 를 SHA-256으로 해시한 64자리 소문자 hex 문자열.

use sha2::{Digest, Sha256};

use crate::event::Attributes;

/// 필드 구분자 (ASCII unit separator)
const FIELD_SEPARATOR: u8 = 0x1f;

/// 이벤트의 의미 필드로부터 결정적 지문을 계산합니다.
pub fn fingerprint(
    target_id: &str,
    source_address: &str,
    kind: &str,
    attributes: &Attributes,
) -> String {
    let mut hasher = Sha256::new();
    let username = attributes.username().unwrap_or_default();
    let password = attributes.password().unwrap_or_default();

    for field in [target_id, source_address, kind, username, password] {
        hasher.update(field.as_bytes());
        hasher.update([FIELD_SEPARATOR]);
    }
    hasher.update(attributes.canonical_form().as_bytes());

    hex::encode(hasher.finalize())
}
