//! Cache of the latest status samples, keyed by fingerprint, and the
//! exporter statistics rendered on the metrics endpoint.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::config::{CacheConfig, FilterConfig};
use crate::fingerprint::Fingerprint;
use crate::mapping::{MetricIdentity, TARGET_LABEL, sanitize_label_name, sanitize_metric_name};

/// A cached string-valued sample.
#[derive(Debug, Clone)]
pub struct CachedMetric {
    pub identity: MetricIdentity,
    pub value: String,
    pub last_updated: Instant,
}

impl CachedMetric {
    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.last_updated.elapsed() > timeout
    }
}

/// What `record` did with a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First sample for this identity.
    Inserted,
    /// Identity known, value changed.
    Updated,
    /// Identity known, same value; only the freshness was refreshed.
    Unchanged,
    /// Rejected by the configured filters.
    Filtered,
    /// New identity rejected because the cache is full.
    Dropped,
}

/// Filter for cached samples.
pub struct MetricFilter {
    include_metrics: Vec<glob::Pattern>,
    exclude_metrics: Vec<glob::Pattern>,
    include_targets: Vec<String>,
    exclude_targets: Vec<String>,
}

impl MetricFilter {
    /// Create a new filter from configuration. Invalid patterns are skipped.
    pub fn new(config: &FilterConfig) -> Self {
        let compile = |patterns: &[String]| {
            patterns
                .iter()
                .filter_map(|p| match glob::Pattern::new(p) {
                    Ok(pattern) => Some(pattern),
                    Err(e) => {
                        warn!(pattern = %p, error = %e, "Ignoring invalid metric pattern");
                        None
                    }
                })
                .collect()
        };

        Self {
            include_metrics: compile(&config.include_metrics),
            exclude_metrics: compile(&config.exclude_metrics),
            include_targets: config.include_targets.clone(),
            exclude_targets: config.exclude_targets.clone(),
        }
    }

    pub fn should_include(&self, identity: &MetricIdentity) -> bool {
        let target = identity.labels.get(TARGET_LABEL);

        if !self.include_targets.is_empty()
            && !target.is_some_and(|t| self.include_targets.contains(t))
        {
            return false;
        }
        if target.is_some_and(|t| self.exclude_targets.contains(t)) {
            return false;
        }

        if !self.include_metrics.is_empty()
            && !self
                .include_metrics
                .iter()
                .any(|p| p.matches(&identity.name))
        {
            return false;
        }
        if self
            .exclude_metrics
            .iter()
            .any(|p| p.matches(&identity.name))
        {
            return false;
        }

        true
    }
}

impl Default for MetricFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

/// Exporter statistics.
#[derive(Debug, Clone, Default)]
pub struct ExporterStats {
    /// Updates seen by `export`.
    pub updates_received: u64,
    /// Updates skipped because their value is numeric.
    pub updates_numeric: u64,
    /// Updates skipped because no endpoint could be formed.
    pub updates_unsynchronizable: u64,
    /// Updates skipped because their value is neither numeric nor a string.
    pub updates_non_string: u64,
    /// Successful inventory updates.
    pub sync_succeeded: u64,
    /// Failed synchronization attempts (including not-found ones).
    pub sync_failed: u64,
    /// Interfaces created in the inventory after a not-found update.
    pub interfaces_created: u64,
    /// Endpoints with known interface state.
    pub interfaces_tracked: u64,
    /// Samples rejected because max_series was reached.
    pub samples_dropped_max_series: u64,
    /// Stale samples removed.
    pub stale_samples_removed: u64,
}

/// Thread-safe sample cache and statistics.
pub struct MetricCollector {
    samples: RwLock<HashMap<Fingerprint, CachedMetric>>,
    prefix: String,
    cache_config: CacheConfig,
    filter: MetricFilter,
    stats: RwLock<ExporterStats>,
}

impl MetricCollector {
    pub fn new(prefix: impl Into<String>, cache_config: CacheConfig, filter: &FilterConfig) -> Self {
        Self {
            samples: RwLock::new(HashMap::new()),
            prefix: prefix.into(),
            cache_config,
            filter: MetricFilter::new(filter),
            stats: RwLock::new(ExporterStats::default()),
        }
    }

    /// Record the latest string value of a metric.
    pub fn record(&self, identity: &MetricIdentity, value: &str) -> RecordOutcome {
        if !self.filter.should_include(identity) {
            trace!(metric = %identity.name, "Sample filtered out");
            return RecordOutcome::Filtered;
        }

        let fingerprint = Fingerprint::of_identity(identity);
        let mut samples = self.samples.write();

        if let Some(existing) = samples.get_mut(&fingerprint) {
            existing.last_updated = Instant::now();
            if existing.value == value {
                return RecordOutcome::Unchanged;
            }
            existing.value = value.to_string();
            return RecordOutcome::Updated;
        }

        if samples.len() >= self.cache_config.max_series {
            drop(samples);
            self.stats.write().samples_dropped_max_series += 1;
            warn!(
                max_series = self.cache_config.max_series,
                metric = %identity.name,
                "Max series limit reached, dropping new sample"
            );
            return RecordOutcome::Dropped;
        }

        samples.insert(
            fingerprint,
            CachedMetric {
                identity: identity.clone(),
                value: value.to_string(),
                last_updated: Instant::now(),
            },
        );
        RecordOutcome::Inserted
    }

    /// Look up a cached sample.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CachedMetric> {
        self.samples.read().get(fingerprint).cloned()
    }

    /// Remove samples not refreshed within the stale timeout.
    pub fn cleanup_stale(&self) -> usize {
        let timeout = Duration::from_secs(self.cache_config.stale_timeout_secs);
        self.cleanup_older_than(timeout)
    }

    fn cleanup_older_than(&self, timeout: Duration) -> usize {
        let mut samples = self.samples.write();
        let before = samples.len();

        samples.retain(|_, m| !m.is_stale(timeout));

        let removed = before - samples.len();
        if removed > 0 {
            debug!(
                removed,
                remaining = samples.len(),
                "Cleaned up stale samples"
            );
            self.stats.write().stale_samples_removed += removed as u64;
        }

        removed
    }

    pub fn series_count(&self) -> usize {
        self.samples.read().len()
    }

    pub fn stats(&self) -> ExporterStats {
        self.stats.read().clone()
    }

    /// Apply a change to the statistics.
    pub fn update_stats(&self, f: impl FnOnce(&mut ExporterStats)) {
        f(&mut self.stats.write());
    }

    /// Render samples and statistics in Prometheus text exposition format.
    ///
    /// Each sample is an info-style gauge: the status text is carried in a
    /// `value` label and the sample value is always 1.
    pub fn render(&self) -> String {
        let samples = self.samples.read();
        let mut output = String::with_capacity(samples.len() * 128);

        let mut by_name: HashMap<String, Vec<&CachedMetric>> = HashMap::new();
        for sample in samples.values() {
            by_name
                .entry(sanitize_metric_name(&sample.identity.name))
                .or_default()
                .push(sample);
        }

        let mut names: Vec<_> = by_name.keys().cloned().collect();
        names.sort();

        for name in names {
            writeln!(output, "# TYPE {} gauge", name).ok();

            let mut lines: Vec<String> = by_name[&name]
                .iter()
                .map(|sample| {
                    let mut labels: Vec<(String, String)> = sample
                        .identity
                        .labels
                        .iter()
                        .map(|(k, v)| (sanitize_label_name(k), v.clone()))
                        .filter(|(k, _)| k != "value")
                        .collect();
                    labels.push(("value".to_string(), sample.value.clone()));
                    labels.sort();
                    format!("{}{} 1", name, format_labels(&labels))
                })
                .collect();
            lines.sort();
            for line in lines {
                writeln!(output, "{}", line).ok();
            }
        }

        let series = samples.len();
        drop(samples);
        let stats = self.stats();
        let counters = [
            ("updates_received_total", stats.updates_received),
            ("updates_numeric_total", stats.updates_numeric),
            ("updates_unsynchronizable_total", stats.updates_unsynchronizable),
            ("updates_non_string_total", stats.updates_non_string),
            ("sync_succeeded_total", stats.sync_succeeded),
            ("sync_failed_total", stats.sync_failed),
            ("interfaces_created_total", stats.interfaces_created),
            ("samples_dropped_total", stats.samples_dropped_max_series),
            ("stale_samples_removed_total", stats.stale_samples_removed),
        ];
        let gauges = [
            ("series_total", series as u64),
            ("interfaces_tracked", stats.interfaces_tracked),
        ];

        writeln!(output).ok();
        for (name, value) in gauges {
            writeln!(output, "# TYPE {}_{} gauge", self.prefix, name).ok();
            writeln!(output, "{}_{} {}", self.prefix, name, value).ok();
        }
        for (name, value) in counters {
            writeln!(output, "# TYPE {}_{} counter", self.prefix, name).ok();
            writeln!(output, "{}_{} {}", self.prefix, name, value).ok();
        }

        output
    }
}

/// Create a shareable collector handle.
pub type SharedCollector = Arc<MetricCollector>;

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format labels for Prometheus exposition format.
fn format_labels(labels: &[(String, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}
