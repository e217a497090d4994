//! gNMI Gateway Common Library
//!
//! Shared types and utilities for gateway exporters:
//!
//! - [`gnmi`] - gNMI notification data model (`Notification`, `Path`, `TypedValue`)
//! - [`serialization`] - JSON/CBOR decoding of notification streams
//! - [`logging`] - Logging settings and `tracing` initialization
//! - [`error`] - Error types

pub mod error;
pub mod gnmi;
pub mod logging;
pub mod serialization;

// Re-export commonly used types at the crate root
pub use error::{Error, Result};
pub use gnmi::{Decimal64, Notification, Path, PathElem, TypedValue, Update};
pub use logging::{LogFormat, LoggingConfig, init_tracing};
pub use serialization::{Format, decode, decode_auto, decode_many, encode};

/// Opaque handle to the shared notification cache.
///
/// Exporters receive it on start and may retain it; this crate never looks
/// inside.
pub type CacheHandle = std::sync::Arc<dyn std::any::Any + Send + Sync>;
