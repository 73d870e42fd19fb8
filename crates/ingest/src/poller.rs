//! 컨테이너 로그 폴러
//!
//! 일정 주기마다 활성 대상의 컨테이너 로그 버퍼 전체를 가져와 처음부터 다시 분류합니다.
//! 읽기 오프셋을 두지 않으므로 재시작해도 잃는 상태가 없으며,
//! 이미 본 이벤트는 지문 기반 중복 제거가 걸러 냅니다.
//!
//! # 실패 처리
//! - 대상 하나의 실패(런타임 연결 불가, 컨테이너 소실)는 같은 사이클의 다른 대상을 막지 않습니다.
//! - 컨테이너가 사라진 대상은 `error` 상태로 바뀝니다.
//! - 사이클 전체 실패(저장소 조회 실패 등)는 주기에 배수를 곱해 재시도합니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use hivewatch_core::event::AttackEvent;
use hivewatch_core::metrics as m;
use hivewatch_core::types::{TargetRecord, TargetStatus};
use hivewatch_runtime::ContainerRuntime;

use crate::classifier::ClassifierSet;
use crate::config::PollerConfig;
use crate::error::IngestError;
use crate::ingestor::{IngestOutcome, IngestPath, Ingestor};

/// 대상 하나를 폴링한 결과
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TargetPollReport {
    /// 분류된 후보 이벤트 수
    pub candidates: usize,
    /// 새로 저장된 이벤트 수
    pub new_events: usize,
    /// 중복으로 버려진 이벤트 수
    pub duplicates: usize,
    /// 저장에 실패한 이벤트 수 (다음 사이클에 다시 시도됨)
    pub failed: usize,
}

/// 폴링 사이클 하나의 결과
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub targets_polled: usize,
    pub targets_failed: usize,
    pub new_events: usize,
    pub duplicates: usize,
    pub failed_events: usize,
}

/// 컨테이너 로그 폴러
pub struct Poller<R: ContainerRuntime> {
    config: PollerConfig,
    runtime: Arc<R>,
    classifiers: Arc<ClassifierSet>,
    ingestor: Arc<Ingestor>,
    cycles: AtomicU64,
}

impl<R: ContainerRuntime> Poller<R> {
    pub fn new(
        config: PollerConfig,
        runtime: Arc<R>,
        classifiers: Arc<ClassifierSet>,
        ingestor: Arc<Ingestor>,
    ) -> Self {
        Self {
            config,
            runtime,
            classifiers,
            ingestor,
            cycles: AtomicU64::new(0),
        }
    }

    /// 대상의 로그 버퍼 전체를 가져와 분류합니다. 저장은 하지 않습니다.
    pub async fn poll_once(&self, target: &TargetRecord) -> Result<Vec<AttackEvent>, IngestError> {
        let instance_ref = target
            .instance_ref
            .as_deref()
            .ok_or_else(|| IngestError::Poll {
                target_id: target.id.clone(),
                reason: "no runtime instance".to_owned(),
            })?;

        let logs = self
            .runtime
            .get_logs(instance_ref, self.config.tail_lines)
            .await?;
        Ok(self
            .classifiers
            .classify_buffer(&target.protocol_kind, &target.id, &logs))
    }

    /// 대상 하나를 폴링하고 결과를 수집 경로로 보냅니다.
    ///
    /// 분류가 끝난 시점에 대상이 더 이상 활성 상태가 아니면 결과를 버립니다.
    /// 이벤트 하나의 저장 실패는 나머지 이벤트 처리를 막지 않습니다.
    pub async fn poll_target(&self, target: &TargetRecord) -> Result<TargetPollReport, IngestError> {
        let candidates = self.poll_once(target).await?;
        let mut report = TargetPollReport {
            candidates: candidates.len(),
            ..TargetPollReport::default()
        };

        let still_active = self
            .ingestor
            .store()
            .get_target(&target.id)?
            .is_some_and(|t| t.status.is_active());
        if !still_active {
            debug!(target_id = %target.id, "target removed during poll, discarding results");
            return Ok(report);
        }

        for candidate in candidates {
            match self.ingestor.ingest(candidate, IngestPath::Poller).await {
                Ok(IngestOutcome::Accepted(_)) => report.new_events += 1,
                Ok(IngestOutcome::Duplicate) => report.duplicates += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(target_id = %target.id, error = %e, "failed to ingest polled event");
                }
            }
        }
        Ok(report)
    }

    /// 활성 대상 전체를 순서대로 한 번 폴링합니다.
    ///
    /// 대상별 실패는 격리되며, 저장소 조회 실패만 사이클 에러로 반환합니다.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport, IngestError> {
        let targets: Vec<TargetRecord> = self
            .ingestor
            .store()
            .list_targets()?
            .into_iter()
            .filter(|t| t.status.is_active() && t.instance_ref.is_some())
            .collect();

        let mut report = CycleReport::default();
        for target in &targets {
            if cancel.is_cancelled() {
                debug!("poll cycle cancelled");
                break;
            }

            match self.poll_target(target).await {
                Ok(target_report) => {
                    report.targets_polled += 1;
                    report.new_events += target_report.new_events;
                    report.duplicates += target_report.duplicates;
                    report.failed_events += target_report.failed;
                }
                Err(e) => {
                    report.targets_failed += 1;
                    metrics::counter!(m::POLL_TARGET_FAILURES_TOTAL).increment(1);
                    self.handle_target_failure(target, &e);
                }
            }
        }

        self.cycles.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::POLL_CYCLES_TOTAL).increment(1);
        Ok(report)
    }

    fn handle_target_failure(&self, target: &TargetRecord, err: &IngestError) {
        let instance_gone = matches!(err, IngestError::Runtime(e) if e.is_not_found());
        if !instance_gone {
            warn!(target_id = %target.id, error = %err, "poll failed, retrying next cycle");
            return;
        }

        warn!(
            target_id = %target.id,
            instance = target.instance_ref.as_deref().unwrap_or_default(),
            "runtime instance gone, marking target as error"
        );
        if let Err(e) = self
            .ingestor
            .store()
            .set_target_status(&target.id, TargetStatus::Error, None)
        {
            warn!(target_id = %target.id, error = %e, "failed to update target status");
        }
    }

    /// 취소될 때까지 폴링 루프를 실행합니다.
    ///
    /// 첫 사이클은 즉시 시작하며, 사이클끼리는 겹치지 않습니다.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.config.interval_secs,
            tail_lines = self.config.tail_lines,
            "poller started"
        );

        let mut delay = Duration::ZERO;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            let started = Instant::now();
            delay = match self.run_cycle(&cancel).await {
                Ok(report) => {
                    if report.new_events > 0 || report.targets_failed > 0 || report.failed_events > 0
                    {
                        info!(
                            polled = report.targets_polled,
                            failed = report.targets_failed,
                            new_events = report.new_events,
                            duplicates = report.duplicates,
                            failed_events = report.failed_events,
                            "poll cycle complete"
                        );
                    } else {
                        debug!(polled = report.targets_polled, "poll cycle found no new events");
                    }
                    self.config.interval()
                }
                Err(e) => {
                    let backoff = self.config.backoff_interval();
                    error!(
                        error = %e,
                        retry_in_secs = backoff.as_secs(),
                        "poll cycle failed, backing off"
                    );
                    backoff
                }
            };
            metrics::histogram!(m::POLL_CYCLE_DURATION_SECONDS)
                .record(started.elapsed().as_secs_f64());
        }

        info!("poller stopped");
    }

    /// 완료된 사이클 수
    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }
}
