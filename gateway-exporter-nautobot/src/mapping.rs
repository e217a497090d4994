//! Mapping from gNMI update paths to flat metric identities.

use std::collections::HashMap;

use gateway_common::PathElem;

/// Flat label set of a metric.
pub type Labels = HashMap<String, String>;

/// Label carrying the notification prefix target (the device).
pub const TARGET_LABEL: &str = "target";

/// Label carrying the interface name key of `interfaces/interface[name=...]`.
pub const INTERFACE_NAME_LABEL: &str = "interfaces_interface_name";

/// Canonical identity of a metric derived from an update path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricIdentity {
    pub name: String,
    pub labels: Labels,
}

/// Translate an update path and optional prefix target into a metric identity.
///
/// The name is the underscore-joined element names with hyphens rewritten to
/// underscores. Each key of an element becomes a label named after the
/// metric name built so far, e.g. `interfaces/interface[name=eth0]` yields
/// `interfaces_interface_name = eth0`. A later duplicate label overwrites an
/// earlier one.
pub fn translate(prefix_target: Option<&str>, path: &[PathElem]) -> MetricIdentity {
    let mut name = String::new();
    let mut labels = Labels::new();

    if let Some(target) = prefix_target.filter(|t| !t.is_empty()) {
        labels.insert(TARGET_LABEL.to_string(), target.to_string());
    }

    for elem in path {
        if !name.is_empty() {
            name.push('_');
        }
        name.push_str(&elem.name.replace('-', "_"));

        for (key, value) in &elem.key {
            let label = format!("{}_{}", name, key.replace('-', "_"));
            labels.insert(label, value.clone());
        }
    }

    MetricIdentity { name, labels }
}

/// Sanitize a metric name to be Prometheus-compatible.
///
/// Prometheus metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`. Invalid
/// characters become underscores and runs of underscores collapse.
pub fn sanitize_metric_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 1);
    let mut last_was_underscore = false;

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        result.push('_');
        last_was_underscore = true;
    }

    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == ':' {
            result.push(c);
            last_was_underscore = false;
        } else if !last_was_underscore {
            result.push('_');
            last_was_underscore = true;
        }
    }

    while result.ends_with('_') {
        result.pop();
    }

    if result.is_empty() {
        result.push_str("unnamed");
    }

    result
}

/// Sanitize a label name to be Prometheus-compatible.
///
/// Label names must match `[a-zA-Z_][a-zA-Z0-9_]*`; names starting with `__`
/// are reserved and get a `z` prefix.
pub fn sanitize_label_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut last_was_underscore = false;

    for (i, c) in name.chars().enumerate() {
        let valid = if i == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };

        if valid {
            result.push(c);
            last_was_underscore = c == '_';
        } else if !last_was_underscore {
            result.push('_');
            last_was_underscore = true;
        }
    }

    while result.ends_with('_') {
        result.pop();
    }

    if result.is_empty() {
        return "label".to_string();
    }

    if result.starts_with("__") {
        result.insert(0, 'z');
    }

    result
}
