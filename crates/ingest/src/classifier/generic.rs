//! Fallback 분류기 -- IPv4 주소가 보이는 모든 라인을 `activity`로 기록합니다.

use hivewatch_core::event::{AttackEvent, AttackKind, Attributes};

use super::{AddressExtractor, Classifier};

/// 알 수 없는 프로토콜용 분류기
pub struct GenericClassifier {
    addresses: AddressExtractor,
}

impl GenericClassifier {
    pub fn new(addresses: AddressExtractor) -> Self {
        Self { addresses }
    }
}

impl Classifier for GenericClassifier {
    fn protocol(&self) -> &'static str {
        "generic"
    }

    fn classify(&self, target_id: &str, line: &str) -> Option<AttackEvent> {
        if !self.addresses.contains_address(line) {
            return None;
        }
        Some(AttackEvent::new(
            target_id,
            self.addresses.extract(line),
            AttackKind::ACTIVITY,
            Attributes::new().with(Attributes::RAW_LOG, line.trim()),
        ))
    }
}
