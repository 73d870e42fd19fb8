//! 수집 코디네이터 -- 감시 대상 생명주기와 백그라운드 폴링 관리
//!
//! [`IngestCoordinator`]는 두 수집 경로(실시간 감시, 폴링)가 모이는 곳입니다.
//! 대상 등록/해제, 재시작 시 대상 복구, 단일 대상 동기화, 통계 조회를 제공하며
//! [`Pipeline`] trait으로 시작/정지/상태 확인을 지원합니다.
//!
//! # 대상 상태 전이
//! ```text
//! created --(감시 등록 성공)--> active --(런타임 인스턴스 소실)--> error
//!    \__________________________________(명시적 해제)_________--> removed
//! ```
//!
//! # 사용 예시
//! ```ignore
//! use hivewatch_ingest::{IngestConfig, IngestCoordinatorBuilder};
//!
//! let mut coordinator = IngestCoordinatorBuilder::new()
//!     .config(IngestConfig::from_core(&core_config))
//!     .store(store)
//!     .runtime(runtime)
//!     .build()?;
//!
//! coordinator.start().await?;
//! coordinator.register_target("hp-1", ProtocolKind::Ssh, "/var/lib/honeypots/hp-1/logs").await?;
//! let (_, mut events) = coordinator.subscribe().await;
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hivewatch_core::error::{HivewatchError, PipelineError};
use hivewatch_core::event::AttackEvent;
use hivewatch_core::pipeline::{HealthStatus, Pipeline};
use hivewatch_core::store::RecordStore;
use hivewatch_core::types::{ProtocolKind, TargetRecord, TargetStatus};
use hivewatch_runtime::{ContainerRuntime, InstanceInfo};

use crate::classifier::ClassifierSet;
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::ingestor::{IngestOutcome, IngestPath, Ingestor};
use crate::notifier::{Notifier, SubscriberId};
use crate::poller::Poller;
use crate::stats::{self, AttackStats};
use crate::watcher::LiveWatcher;

/// 코디네이터 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// 생성됨 (시작 전)
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 재시작 복구 결과
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// 실행 중인 인스턴스와 다시 연결된 대상 수
    pub recovered: usize,
    /// 검사한 대상 수 (제거된 대상 제외)
    pub total: usize,
}

/// 단일 대상 동기화 결과
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// 이번 동기화로 새로 저장된 이벤트 수
    pub new_events: usize,
    /// 대상의 누적 공격 수
    pub total_events: u64,
}

/// 수집 코디네이터
pub struct IngestCoordinator<R: ContainerRuntime> {
    config: IngestConfig,
    state: CoordinatorState,
    store: Arc<dyn RecordStore>,
    runtime: Arc<R>,
    notifier: Arc<Notifier>,
    ingestor: Arc<Ingestor>,
    watcher: Arc<LiveWatcher>,
    poller: Arc<Poller<R>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<R: ContainerRuntime> IngestCoordinator<R> {
    /// 감시 대상을 등록하고 `active` 상태로 만듭니다.
    ///
    /// 같은 ID의 기존 레코드가 있으면 누적 공격 수와 생성 시각을 유지합니다.
    /// 감시 시작에 실패하면 레코드는 `created` 상태로 남고 에러를 반환합니다.
    pub async fn register(&self, target: TargetRecord) -> Result<TargetRecord, IngestError> {
        if self.state == CoordinatorState::Stopped {
            return Err(IngestError::Stopped);
        }

        let mut record = target.with_status(TargetStatus::Created);
        if let Some(existing) = self.store.get_target(&record.id)? {
            record.attack_count = existing.attack_count;
            record.created_at = existing.created_at;
        }
        self.store.put_target(&record)?;

        if self.config.watcher.enabled {
            self.watcher
                .start_watching(&record.id, record.protocol_kind.clone(), &record.log_location)
                .await?;
        }

        self.store.set_target_status(
            &record.id,
            TargetStatus::Active,
            record.instance_ref.as_deref(),
        )?;
        record.status = TargetStatus::Active;

        info!(
            target_id = %record.id,
            protocol = %record.protocol_kind,
            instance = record.instance_ref.as_deref().unwrap_or("-"),
            "target registered"
        );
        Ok(record)
    }

    /// ID, 프로토콜, 로그 경로만으로 대상을 등록합니다.
    pub async fn register_target(
        &self,
        target_id: &str,
        protocol_kind: ProtocolKind,
        log_location: impl AsRef<Path>,
    ) -> Result<TargetRecord, IngestError> {
        let location = log_location.as_ref().display().to_string();
        self.register(TargetRecord::new(target_id, protocol_kind, location))
            .await
    }

    /// 대상 감시를 해제하고 `removed` 상태로 만듭니다.
    ///
    /// 저장소에 대상이 없으면 `false`를 반환합니다.
    pub async fn unregister_target(&self, target_id: &str) -> Result<bool, IngestError> {
        self.watcher.stop_watching(target_id).await;

        if self.store.get_target(target_id)?.is_none() {
            debug!(target_id, "unregister requested for unknown target");
            return Ok(false);
        }
        self.store
            .set_target_status(target_id, TargetStatus::Removed, None)?;
        info!(target_id, "target removed");
        Ok(true)
    }

    /// 외부에서 만든 이벤트를 실제 수집과 같은 중복 제거 경로로 보냅니다.
    pub async fn ingest(&self, event: AttackEvent) -> Result<IngestOutcome, IngestError> {
        self.ingestor.ingest(event, IngestPath::Injected).await
    }

    /// 새로 저장되는 이벤트를 구독합니다.
    pub async fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<AttackEvent>) {
        self.notifier.subscribe().await
    }

    /// 실행 중인 런타임 인스턴스와 저장된 대상을 다시 연결합니다.
    ///
    /// - 라벨이 일치하는 인스턴스가 있으면 `instance_ref`를 갱신하고,
    ///   실행 중이면 `active`, 아니면 `error`로 바꿉니다.
    /// - 인스턴스를 가졌던 `active` 대상의 인스턴스가 사라졌으면 `error`로 바꿉니다.
    pub async fn recover_targets(&self) -> Result<RecoveryReport, IngestError> {
        let label = &self.config.poller.target_label;
        let instances: HashMap<String, InstanceInfo> = self
            .runtime
            .list_labeled_instances(label)
            .await?
            .into_iter()
            .filter_map(|info| info.label(label).map(str::to_owned).map(|id| (id, info)))
            .collect();

        let mut report = RecoveryReport::default();
        for target in self.store.list_targets()? {
            if target.status == TargetStatus::Removed {
                continue;
            }
            report.total += 1;

            match instances.get(&target.id) {
                Some(instance) => {
                    let status = if instance.running {
                        report.recovered += 1;
                        TargetStatus::Active
                    } else {
                        TargetStatus::Error
                    };
                    self.store
                        .set_target_status(&target.id, status, Some(&instance.id))?;
                    debug!(target_id = %target.id, instance = %instance.id, %status, "target recovered");
                }
                None if target.status.is_active() && target.instance_ref.is_some() => {
                    warn!(target_id = %target.id, "runtime instance missing, marking target as error");
                    self.store
                        .set_target_status(&target.id, TargetStatus::Error, None)?;
                }
                None => {}
            }
        }

        info!(
            recovered = report.recovered,
            total = report.total,
            "target recovery complete"
        );
        Ok(report)
    }

    /// 활성 대상 하나를 즉시 폴링합니다.
    pub async fn sync_target(&self, target_id: &str) -> Result<SyncReport, IngestError> {
        let target = self
            .store
            .get_target(target_id)?
            .ok_or_else(|| IngestError::Poll {
                target_id: target_id.to_owned(),
                reason: "target not found".to_owned(),
            })?;
        if !target.status.is_active() {
            return Err(IngestError::Poll {
                target_id: target_id.to_owned(),
                reason: format!("target is {}", target.status),
            });
        }

        let polled = self.poller.poll_target(&target).await?;
        let total_events = self
            .store
            .get_target(target_id)?
            .map_or(0, |t| t.attack_count);

        info!(target_id, new_events = polled.new_events, "target synced");
        Ok(SyncReport {
            new_events: polled.new_events,
            total_events,
        })
    }

    /// 최근 `days`일 동안의 공격 통계를 집계합니다.
    pub fn attack_stats(&self, days: u32) -> Result<AttackStats, IngestError> {
        Ok(stats::attack_stats(self.store.as_ref(), Utc::now(), days)?)
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            CoordinatorState::Initialized => "initialized",
            CoordinatorState::Running => "running",
            CoordinatorState::Stopped => "stopped",
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn watcher(&self) -> &Arc<LiveWatcher> {
        &self.watcher
    }

    pub fn poller(&self) -> &Arc<Poller<R>> {
        &self.poller
    }

    /// 활성 대상의 감시를 다시 시작합니다 (재시작 후 복구용).
    async fn resume_watchers(&self) {
        if !self.config.watcher.enabled {
            return;
        }
        let targets = match self.store.list_targets() {
            Ok(targets) => targets,
            Err(e) => {
                warn!(error = %e, "failed to list targets, watchers not resumed");
                return;
            }
        };

        for target in targets.into_iter().filter(|t| t.status.is_active()) {
            if let Err(e) = self
                .watcher
                .start_watching(&target.id, target.protocol_kind.clone(), &target.log_location)
                .await
            {
                warn!(target_id = %target.id, error = %e, "failed to resume watcher");
            }
        }
    }
}

impl<R: ContainerRuntime> Pipeline for IngestCoordinator<R> {
    async fn start(&mut self) -> Result<(), HivewatchError> {
        match self.state {
            CoordinatorState::Running => return Err(PipelineError::AlreadyRunning.into()),
            CoordinatorState::Stopped => {
                return Err(PipelineError::InitFailed(
                    "coordinator was stopped, build a new one to restart".to_owned(),
                )
                .into());
            }
            CoordinatorState::Initialized => {}
        }

        info!("starting ingest coordinator");

        if let Err(e) = self.runtime.ping().await {
            warn!(error = %e, "container runtime not reachable, polling will retry");
        }

        if let Err(e) = self.recover_targets().await {
            warn!(error = %e, "target recovery failed, continuing with stored state");
        }

        self.resume_watchers().await;

        if self.config.poller.enabled {
            let poller = Arc::clone(&self.poller);
            let cancel = self.cancel.clone();
            self.tasks
                .push(tokio::spawn(async move { poller.run(cancel).await }));
        }

        self.state = CoordinatorState::Running;
        let watched = self.watcher.watched_count().await;
        info!(
            watched,
            poller = self.config.poller.enabled,
            "ingest coordinator started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), HivewatchError> {
        if self.state == CoordinatorState::Stopped {
            debug!("ingest coordinator already stopped");
            return Ok(());
        }

        info!("stopping ingest coordinator");
        self.cancel.cancel();

        let timeout = self.config.shutdown_timeout();
        let mut tasks: Vec<JoinHandle<()>> = self.tasks.drain(..).collect();
        let watcher = Arc::clone(&self.watcher);
        let drained = tokio::time::timeout(timeout, async {
            watcher.stop_all().await;
            for task in tasks.iter_mut() {
                let _ = task.await;
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                timeout_secs = timeout.as_secs(),
                "shutdown timed out, aborting remaining tasks"
            );
            for task in &tasks {
                task.abort();
            }
        }

        self.notifier.close().await;
        self.state = CoordinatorState::Stopped;
        info!("ingest coordinator stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            CoordinatorState::Running => match self.runtime.ping().await {
                Ok(()) => HealthStatus::Healthy,
                Err(e) => HealthStatus::Degraded(format!("container runtime unreachable: {e}")),
            },
            CoordinatorState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            CoordinatorState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 수집 코디네이터 빌더
pub struct IngestCoordinatorBuilder<R: ContainerRuntime> {
    config: IngestConfig,
    store: Option<Arc<dyn RecordStore>>,
    runtime: Option<Arc<R>>,
}

impl<R: ContainerRuntime> IngestCoordinatorBuilder<R> {
    pub fn new() -> Self {
        Self {
            config: IngestConfig::default(),
            store: None,
            runtime: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    /// 레코드 저장소를 지정합니다 (필수).
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 컨테이너 런타임을 지정합니다 (필수).
    pub fn runtime(mut self, runtime: Arc<R>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// 설정을 검증하고 코디네이터를 생성합니다.
    pub fn build(self) -> Result<IngestCoordinator<R>, IngestError> {
        self.config.validate()?;

        let store = self.store.ok_or_else(|| IngestError::Config {
            field: "store".to_owned(),
            reason: "record store is required".to_owned(),
        })?;
        let runtime = self.runtime.ok_or_else(|| IngestError::Config {
            field: "runtime".to_owned(),
            reason: "container runtime is required".to_owned(),
        })?;

        let classifiers = Arc::new(ClassifierSet::new()?);
        let notifier = Arc::new(Notifier::new(self.config.subscriber_capacity));
        let ingestor = Arc::new(Ingestor::new(Arc::clone(&store), Arc::clone(&notifier)));
        let watcher = Arc::new(LiveWatcher::new(
            self.config.watcher.clone(),
            Arc::clone(&classifiers),
            Arc::clone(&ingestor),
        ));
        let poller = Arc::new(Poller::new(
            self.config.poller.clone(),
            Arc::clone(&runtime),
            classifiers,
            Arc::clone(&ingestor),
        ));

        Ok(IngestCoordinator {
            config: self.config,
            state: CoordinatorState::Initialized,
            store,
            runtime,
            notifier,
            ingestor,
            watcher,
            poller,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }
}

impl<R: ContainerRuntime> Default for IngestCoordinatorBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}
