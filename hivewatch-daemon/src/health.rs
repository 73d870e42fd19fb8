//! Aggregated health reporting.
//!
//! Combines the coordinator's own [`HealthStatus`] with a per-status
//! summary of registered targets into a single [`DaemonHealth`] report.
//!
//! # Aggregation Rule
//!
//! - Coordinator Unhealthy -> Unhealthy
//! - Coordinator Degraded -> Degraded(reason)
//! - Coordinator Healthy, some targets in `error` -> Degraded(reason)
//! - Otherwise -> Healthy

use serde::Serialize;

use hivewatch_core::pipeline::HealthStatus;
use hivewatch_core::types::{TargetRecord, TargetStatus};

/// Aggregated health report for the daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall daemon health.
    pub status: HealthStatus,
    /// Seconds since the daemon started.
    pub uptime_secs: u64,
    /// Registered targets grouped by status.
    pub targets: TargetSummary,
    /// Current number of event subscribers.
    pub subscribers: usize,
}

/// Target counts by lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TargetSummary {
    pub created: usize,
    pub active: usize,
    pub error: usize,
    pub removed: usize,
    /// Sum of `attack_count` over all targets.
    pub attacks: u64,
}

impl TargetSummary {
    pub fn from_targets(targets: &[TargetRecord]) -> Self {
        targets.iter().fold(Self::default(), |mut summary, t| {
            match t.status {
                TargetStatus::Created => summary.created += 1,
                TargetStatus::Active => summary.active += 1,
                TargetStatus::Error => summary.error += 1,
                TargetStatus::Removed => summary.removed += 1,
            }
            summary.attacks += t.attack_count;
            summary
        })
    }
}

/// Combine the coordinator status with the target summary.
pub fn aggregate_status(coordinator: HealthStatus, targets: &TargetSummary) -> HealthStatus {
    match coordinator {
        HealthStatus::Healthy if targets.error > 0 => {
            HealthStatus::Degraded(format!("{} target(s) in error state", targets.error))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivewatch_core::types::ProtocolKind;

    fn target(id: &str, status: TargetStatus, attacks: u64) -> TargetRecord {
        let mut record = TargetRecord::new(id, ProtocolKind::Ssh, "/tmp").with_status(status);
        record.attack_count = attacks;
        record
    }

    #[test]
    fn summary_counts_by_status() {
        let summary = TargetSummary::from_targets(&[
            target("a", TargetStatus::Active, 3),
            target("b", TargetStatus::Active, 1),
            target("c", TargetStatus::Error, 2),
            target("d", TargetStatus::Removed, 0),
        ]);
        assert_eq!(summary.active, 2);
        assert_eq!(summary.error, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.created, 0);
        assert_eq!(summary.attacks, 6);
    }

    #[test]
    fn error_targets_degrade_healthy_coordinator() {
        let summary = TargetSummary {
            error: 2,
            ..TargetSummary::default()
        };
        assert_eq!(
            aggregate_status(HealthStatus::Healthy, &summary),
            HealthStatus::Degraded("2 target(s) in error state".to_owned())
        );
    }

    #[test]
    fn coordinator_status_wins_otherwise() {
        let summary = TargetSummary {
            error: 1,
            ..TargetSummary::default()
        };
        let unhealthy = HealthStatus::Unhealthy("stopped".to_owned());
        assert_eq!(aggregate_status(unhealthy.clone(), &summary), unhealthy);
        assert!(aggregate_status(HealthStatus::Healthy, &TargetSummary::default()).is_healthy());
    }

    #[test]
    fn report_serializes_to_json() {
        let report = DaemonHealth {
            status: HealthStatus::Degraded("runtime unreachable".to_owned()),
            uptime_secs: 42,
            targets: TargetSummary::default(),
            subscribers: 1,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"]["status"], "degraded");
        assert_eq!(json["status"]["reason"], "runtime unreachable");
        assert_eq!(json["uptime_secs"], 42);
    }
}
