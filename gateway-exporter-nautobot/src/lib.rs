//! Nautobot inventory exporter for gNMI interface telemetry.
//!
//! Each update of a notification is translated into a flat metric identity
//! (name plus labels). Interface status updates are folded into a
//! per-interface state record and pushed to Nautobot with an update-else-create
//! upsert. The latest string samples are exposed on a Prometheus `/metrics`
//! endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Notification │──>│ Translator │──>│ State store │──>│ Synchronizer │──> Nautobot
//! └──────────────┘   └────────────┘   └─────────────┘   └──────────────┘
//!                          │
//!                          v
//!                    ┌───────────┐   ┌─────────────┐
//!                    │ Collector │──>│ HTTP server │ (/metrics)
//!                    └───────────┘   └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! NAUTOBOT_URL=https://nautobot.example.com NAUTOBOT_TOKEN=... \
//!     gateway-exporter-nautobot --config config.json5 --replay notifications.json
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod exporter;
pub mod fingerprint;
pub mod http;
pub mod inventory;
pub mod mapping;
pub mod schema;
pub mod slug;
pub mod state;
pub mod sync;

pub use collector::{MetricCollector, SharedCollector};
pub use config::ExporterConfig;
pub use exporter::{Exporter, ExporterError, NautobotExporter};
pub use http::{MetricsServer, RestartPolicy};
pub use inventory::{InventoryClient, InventoryError, NautobotClient, SyncPayload};
pub use sync::{SyncError, Synchronizer};
