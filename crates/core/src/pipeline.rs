//! 파이프라인 trait -- 장기 실행 구성요소의 생명주기

use std::future::Future;

use serde::Serialize;

use crate::error::HivewatchError;

/// 시작/정지/상태 확인이 가능한 파이프라인
///
/// `start`를 두 번 호출하면 `PipelineError::AlreadyRunning`을 반환해야 하며,
/// `stop`은 멱등이어야 합니다.
pub trait Pipeline: Send + Sync {
    /// 파이프라인을 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), HivewatchError>> + Send;

    /// 파이프라인을 정지합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), HivewatchError>> + Send;

    /// 현재 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// 구성요소 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 부분 장애 (동작은 계속됨)
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded("runtime".into()).is_healthy());
        assert!(!HealthStatus::Degraded("runtime".into()).is_unhealthy());
        assert!(HealthStatus::Unhealthy("stopped".into()).is_unhealthy());
    }
}
