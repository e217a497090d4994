//! Device and interface identity slugs.

use std::fmt;

use thiserror::Error;

use crate::mapping::{INTERFACE_NAME_LABEL, Labels, TARGET_LABEL};

/// An expected label is absent from a metric's label set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No label: {label}")]
pub struct MissingLabelError {
    pub label: String,
}

/// Normalize a raw label value into a URL-safe slug.
///
/// Transliterates non-ASCII text to ASCII, lower-cases, spells out `&` and
/// `@`, drops quotes and replaces everything outside `[a-z0-9_-]` with a
/// single hyphen. Leading and trailing `-`/`_` are trimmed.
pub fn slugify(value: &str) -> String {
    let mut out = String::with_capacity(value.len());

    for c in value.chars() {
        if c.is_ascii() || c == '\u{2019}' {
            push_slug_char(&mut out, c);
            continue;
        }
        match deunicode::deunicode_char(c) {
            Some(folded) => folded.chars().for_each(|f| push_slug_char(&mut out, f)),
            None => push_slug_char(&mut out, '-'),
        }
    }

    out.trim_matches(|c| c == '-' || c == '_').to_string()
}

fn push_slug_char(out: &mut String, c: char) {
    match c.to_ascii_lowercase() {
        '"' | '\'' | '\u{2019}' => {}
        '&' => out.push_str("and"),
        '@' => out.push_str("at"),
        c if c.is_ascii_alphanumeric() || c == '_' => out.push(c),
        _ if !out.ends_with('-') => out.push('-'),
        _ => {}
    }
}

/// Slug of the value stored under `key`.
pub fn slug(labels: &Labels, key: &str) -> Result<String, MissingLabelError> {
    labels
        .get(key)
        .map(|value| slugify(value))
        .ok_or_else(|| MissingLabelError {
            label: key.to_string(),
        })
}

/// Synchronization key of one (device, interface) pair.
///
/// Renders as `<device-slug>__<interface-slug>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    device: String,
    interface: String,
}

impl Endpoint {
    pub fn new(device_slug: impl Into<String>, interface_slug: impl Into<String>) -> Self {
        Self {
            device: device_slug.into(),
            interface: interface_slug.into(),
        }
    }

    /// Resolve the endpoint from the `target` and interface name labels.
    pub fn from_labels(labels: &Labels) -> Result<Self, MissingLabelError> {
        let device = slug(labels, TARGET_LABEL)?;
        let interface = slug(labels, INTERFACE_NAME_LABEL)?;
        Ok(Self { device, interface })
    }

    pub fn device_slug(&self) -> &str {
        &self.device
    }

    pub fn interface_slug(&self) -> &str {
        &self.interface
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}__{}", self.device, self.interface)
    }
}
