//! Daemon orchestration -- configuration, assembly, and lifecycle.
//!
//! The [`Orchestrator`] loads configuration, opens the record store,
//! connects to the container runtime, builds the [`IngestCoordinator`],
//! and runs it until a shutdown signal arrives.
//!
//! # Startup
//!
//! 1. Load `hivewatch.toml`, apply environment then CLI overrides, validate
//! 2. Install the Prometheus recorder (when `[metrics].enabled`)
//! 3. Open the JSON record store and connect to Docker
//! 4. Start the coordinator (target recovery, watchers, poller)
//!
//! # Shutdown
//!
//! `SIGTERM` or `SIGINT` stops the coordinator, which cancels watchers and
//! the poller within `shutdown_timeout_secs` and closes all subscribers.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use hivewatch_core::config::HivewatchConfig;
use hivewatch_core::pipeline::{HealthStatus, Pipeline};
use hivewatch_core::store::RecordStore;
use hivewatch_ingest::{IngestConfig, IngestCoordinator, IngestCoordinatorBuilder, JsonFileStore};
use hivewatch_runtime::{BollardRuntime, ContainerRuntime};

use crate::cli::DaemonCli;
use crate::health::{DaemonHealth, TargetSummary, aggregate_status};
use crate::metrics_server;

/// Interval between periodic health log lines.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Load the configuration file, then apply environment and CLI overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the final
/// configuration fails validation.
pub async fn load_config(cli: &DaemonCli) -> Result<HivewatchConfig> {
    let mut config = HivewatchConfig::from_file(&cli.config)
        .await
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .context("config validation failed after overrides")?;
    Ok(config)
}

/// The daemon orchestrator.
pub struct Orchestrator<R: ContainerRuntime> {
    config: HivewatchConfig,
    coordinator: IngestCoordinator<R>,
    start_time: Instant,
}

impl Orchestrator<BollardRuntime> {
    /// Build the production orchestrator from a loaded configuration.
    ///
    /// Installs the metrics recorder, opens the JSON record store at
    /// [`HivewatchConfig::store_path`], and connects to Docker.
    pub async fn build_from_config(config: HivewatchConfig) -> Result<Self> {
        config.validate().context("config validation failed")?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let store_path = config.store_path();
        let store = JsonFileStore::open(&store_path)
            .with_context(|| format!("failed to open record store {}", store_path.display()))?;
        let runtime = BollardRuntime::from_config(&config.runtime)
            .context("failed to create container runtime client")?;

        Self::with_parts(config, Arc::new(store), Arc::new(runtime))
    }
}

impl<R: ContainerRuntime> Orchestrator<R> {
    /// Build with an explicit store and runtime.
    pub fn with_parts(
        config: HivewatchConfig,
        store: Arc<dyn RecordStore>,
        runtime: Arc<R>,
    ) -> Result<Self> {
        let coordinator = IngestCoordinatorBuilder::new()
            .config(IngestConfig::from_core(&config))
            .store(store)
            .runtime(runtime)
            .build()
            .context("failed to build ingest coordinator")?;

        tracing::info!(
            watcher = config.watcher.enabled,
            poller = config.poller.enabled,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            coordinator,
            start_time: Instant::now(),
        })
    }

    /// Start the coordinator.
    pub async fn start(&mut self) -> Result<()> {
        self.coordinator
            .start()
            .await
            .context("failed to start ingest coordinator")?;
        Ok(())
    }

    /// Start, then run until `SIGTERM` or `SIGINT`.
    pub async fn run(&mut self) -> Result<()> {
        let mut signals = ShutdownSignals::install()?;
        self.run_until(async move {
            let signal = signals.recv().await;
            tracing::info!(signal, "shutdown signal received");
        })
        .await
    }

    /// Start, then run until `shutdown` completes, logging health periodically.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;

        let mut health_tick = tokio::time::interval_at(
            tokio::time::Instant::now() + HEALTH_LOG_INTERVAL,
            HEALTH_LOG_INTERVAL,
        );
        tokio::pin!(shutdown);

        tracing::info!("hivewatch-daemon running");
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = health_tick.tick() => self.log_health().await,
            }
        }

        self.shutdown().await
    }

    /// Stop the coordinator. Safe to call more than once.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping ingest coordinator");
        self.coordinator
            .stop()
            .await
            .context("failed to stop ingest coordinator")?;
        Ok(())
    }

    /// Current aggregated health.
    pub async fn health(&self) -> Result<DaemonHealth> {
        let targets = self
            .coordinator
            .store()
            .list_targets()
            .context("failed to list targets")?;
        let summary = TargetSummary::from_targets(&targets);
        let status = aggregate_status(self.coordinator.health_check().await, &summary);

        Ok(DaemonHealth {
            status,
            uptime_secs: self.start_time.elapsed().as_secs(),
            targets: summary,
            subscribers: self.coordinator.notifier().subscriber_count().await,
        })
    }

    async fn log_health(&self) {
        match self.health().await {
            Ok(report) => match &report.status {
                HealthStatus::Healthy => tracing::debug!(
                    uptime_secs = report.uptime_secs,
                    active = report.targets.active,
                    attacks = report.targets.attacks,
                    "health check"
                ),
                HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
                    tracing::warn!(
                        reason = %reason,
                        active = report.targets.active,
                        error = report.targets.error,
                        "daemon not healthy"
                    );
                }
            },
            Err(e) => tracing::warn!(error = %e, "health check failed"),
        }
    }

    pub fn config(&self) -> &HivewatchConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &IngestCoordinator<R> {
        &self.coordinator
    }
}

/// `SIGTERM` / `SIGINT` listeners.
struct ShutdownSignals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    fn install() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigterm: signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?,
            sigint: signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?,
        })
    }

    /// Wait for either signal and return its name.
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}
