//! Exporter lifecycle: start-up checks and per-notification processing.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gateway_common::{CacheHandle, Notification, Update};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::collector::{MetricCollector, SharedCollector};
use crate::config::ExporterConfig;
use crate::http::{FatalHandler, MetricsServer, exit_process};
use crate::inventory::{InventoryClient, SyncPayload};
use crate::mapping::translate;
use crate::schema::{SchemaError, SchemaLoader, YangModuleLoader};
use crate::slug::Endpoint;
use crate::state::{InterfaceStateStore, StatusField};
use crate::sync::{SyncError, Synchronizer};

/// Registered name of this exporter.
pub const NAME: &str = "nautobot";

/// Errors that prevent the exporter from starting.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unable to load OpenConfig modules: {0}")]
    Schema(#[from] SchemaError),
}

/// A consumer of gNMI notifications.
#[async_trait]
pub trait Exporter: Send + Sync {
    fn name(&self) -> &str;

    /// Validate configuration and launch background tasks.
    async fn start(&mut self, cache: CacheHandle) -> Result<(), ExporterError>;

    /// Process one notification. Never fails; per-update errors are logged.
    async fn export(&self, notification: &Notification);
}

/// What happened to a single update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateOutcome {
    Numeric,
    Unsynchronizable,
    NonString,
    Synced,
}

/// Synchronizes interface status telemetry into Nautobot.
pub struct NautobotExporter {
    config: ExporterConfig,
    synchronizer: Synchronizer,
    states: InterfaceStateStore,
    collector: SharedCollector,
    schema_loader: Box<dyn SchemaLoader>,
    fatal_handler: FatalHandler,
    cache: Option<CacheHandle>,
    modules: Vec<String>,
}

impl NautobotExporter {
    pub fn new(config: ExporterConfig, client: Arc<dyn InventoryClient>) -> Self {
        let collector = Arc::new(MetricCollector::new(
            config.metrics.prefix.clone(),
            config.cache.clone(),
            &config.filters,
        ));
        let synchronizer = Synchronizer::new(client, config.inventory.timeout());

        Self {
            config,
            synchronizer,
            states: InterfaceStateStore::new(),
            collector,
            schema_loader: Box::new(YangModuleLoader),
            fatal_handler: exit_process(),
            cache: None,
            modules: Vec::new(),
        }
    }

    pub fn with_schema_loader(mut self, loader: impl SchemaLoader + 'static) -> Self {
        self.schema_loader = Box::new(loader);
        self
    }

    /// Replace the handler invoked when the metrics server gives up.
    pub fn with_fatal_handler(mut self, handler: FatalHandler) -> Self {
        self.fatal_handler = handler;
        self
    }

    pub fn collector(&self) -> &SharedCollector {
        &self.collector
    }

    pub fn states(&self) -> &InterfaceStateStore {
        &self.states
    }

    /// Module names found by the schema loader during `start`.
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// The cache handle retained by `start`.
    pub fn cache_handle(&self) -> Option<&CacheHandle> {
        self.cache.as_ref()
    }

    fn spawn_metrics_server(&self) -> Result<(), ExporterError> {
        let addr = self
            .config
            .listen_addr()
            .map_err(|e| ExporterError::Configuration(e.to_string()))?;

        let server = MetricsServer::new(self.collector.clone(), addr, self.config.metrics.path.clone())
            .with_max_consecutive_failures(self.config.metrics.max_consecutive_failures)
            .with_restart_backoff(self.config.metrics.restart_backoff())
            .with_fatal_handler(self.fatal_handler.clone());
        tokio::spawn(server.run());

        Ok(())
    }

    fn spawn_cleanup(&self) {
        let collector = self.collector.clone();
        let period = Duration::from_secs(self.config.cache.cleanup_interval_secs);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                collector.cleanup_stale();
            }
        });
    }

    async fn export_update(
        &self,
        target: Option<&str>,
        update: &Update,
    ) -> Result<UpdateOutcome, SyncError> {
        let val = update.val.as_ref();
        if val.is_some_and(|v| v.is_number()) {
            return Ok(UpdateOutcome::Numeric);
        }

        let identity = translate(target, &update.path.elem);
        let text = val.and_then(|v| v.as_str());
        if let Some(text) = text {
            self.collector.record(&identity, text);
        }

        let endpoint = match Endpoint::from_labels(&identity.labels) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                debug!(metric = %identity.name, error = %e, "Skipping update");
                return Ok(UpdateOutcome::Unsynchronizable);
            }
        };

        let Some(text) = text else {
            return Ok(UpdateOutcome::NonString);
        };

        let state = match StatusField::from_metric_name(&identity.name) {
            Some(field) => {
                debug!(endpoint = %endpoint, field = field.as_str(), status = text, "Interface status");
                self.states.merge(&endpoint, field, text)
            }
            None => self.states.snapshot(&endpoint).unwrap_or_default(),
        };
        let tracked = self.states.len() as u64;
        self.collector.update_stats(|s| s.interfaces_tracked = tracked);

        let payload = SyncPayload::from_labels(&identity.labels, &state);
        self.synchronizer
            .sync_interface_status(&payload, &endpoint.to_string())
            .await?;

        Ok(UpdateOutcome::Synced)
    }
}

#[async_trait]
impl Exporter for NautobotExporter {
    fn name(&self) -> &str {
        NAME
    }

    async fn start(&mut self, cache: CacheHandle) -> Result<(), ExporterError> {
        info!("Starting Nautobot exporter");

        if self.config.openconfig_directory.is_empty() {
            return Err(ExporterError::Configuration(
                "value is not set for openconfig_directory configuration".to_string(),
            ));
        }

        let directory = Path::new(&self.config.openconfig_directory);
        self.modules = self.schema_loader.load(directory).map_err(|e| {
            error!(
                directory = %directory.display(),
                error = %e,
                "Unable to load OpenConfig modules"
            );
            e
        })?;
        info!(modules = self.modules.len(), "OpenConfig modules loaded");

        self.cache = Some(cache);

        self.spawn_metrics_server()?;
        self.spawn_cleanup();

        Ok(())
    }

    async fn export(&self, notification: &Notification) {
        let target = notification.target();

        for update in &notification.update {
            self.collector.update_stats(|s| s.updates_received += 1);

            match self.export_update(target, update).await {
                Ok(UpdateOutcome::Numeric) => {
                    self.collector.update_stats(|s| s.updates_numeric += 1);
                }
                Ok(UpdateOutcome::Unsynchronizable) => {
                    self.collector
                        .update_stats(|s| s.updates_unsynchronizable += 1);
                }
                Ok(UpdateOutcome::NonString) => {
                    self.collector.update_stats(|s| s.updates_non_string += 1);
                }
                Ok(UpdateOutcome::Synced) => {
                    self.collector.update_stats(|s| s.sync_succeeded += 1);
                }
                Err(e) => {
                    let created = matches!(e, SyncError::NotFound { created: true, .. });
                    self.collector.update_stats(|s| {
                        s.sync_failed += 1;
                        if created {
                            s.interfaces_created += 1;
                        }
                    });
                    error!(path = %update.path, error = %e, "Interface synchronization failed");
                }
            }
        }
    }
}
