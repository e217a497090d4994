//! gNMI notification data model.
//!
//! Mirrors the subset of the gNMI `Notification` message that exporters
//! consume. Field names follow the protobuf JSON mapping so notifications
//! replayed from a gNMI cache dump deserialize directly.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One telemetry event: an optional prefix and an ordered list of updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Nanoseconds since Unix epoch.
    #[serde(default)]
    pub timestamp: i64,

    /// Prefix applied to all paths in this notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<Path>,

    /// Updated values, in delivery order.
    #[serde(default)]
    pub update: Vec<Update>,

    /// Deleted paths.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<Path>,
}

impl Notification {
    /// Create an empty notification for the given target.
    pub fn for_target(target: impl Into<String>) -> Self {
        Self {
            prefix: Some(Path {
                target: target.into(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Append an update.
    pub fn with_update(mut self, path: Path, val: TypedValue) -> Self {
        self.update.push(Update {
            path,
            val: Some(val),
            duplicates: 0,
        });
        self
    }

    /// The prefix target, if one is set and non-empty.
    pub fn target(&self) -> Option<&str> {
        self.prefix
            .as_ref()
            .map(|p| p.target.as_str())
            .filter(|t| !t.is_empty())
    }
}

/// A single path/value pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub path: Path,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<TypedValue>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub duplicates: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// A hierarchical gNMI path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin: String,

    #[serde(default)]
    pub elem: Vec<PathElem>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
}

/// One named, optionally keyed, segment of a path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathElem {
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub key: BTreeMap<String, String>,
}

impl PathElem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: BTreeMap::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.key.insert(key.into(), value.into());
        self
    }
}

impl Path {
    /// Parse an XPath-like path such as `/interfaces/interface[name=eth0]/state`.
    ///
    /// Keys may be given as `[a=1][b=2]` or `[a=1,b=2]`. Slashes inside
    /// brackets are part of the key value (`interface[name=Ethernet1/1]`).
    pub fn parse(path: &str) -> Result<Self> {
        let mut elem = Vec::new();
        for segment in split_segments(path)? {
            elem.push(parse_segment(segment)?);
        }
        Ok(Self {
            elem,
            ..Default::default()
        })
    }
}

fn split_segments(path: &str) -> Result<Vec<&str>> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in path.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::Path(format!("unbalanced ']' in '{}'", path)))?;
            }
            '/' if depth == 0 => {
                if i > start {
                    segments.push(&path[start..i]);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(Error::Path(format!("unbalanced '[' in '{}'", path)));
    }
    if start < path.len() {
        segments.push(&path[start..]);
    }
    Ok(segments)
}

fn parse_segment(segment: &str) -> Result<PathElem> {
    let Some(bracket_pos) = segment.find('[') else {
        return Ok(PathElem::new(segment));
    };

    let mut elem = PathElem::new(&segment[..bracket_pos]);
    let mut rest = &segment[bracket_pos..];

    while let Some(stripped) = rest.strip_prefix('[') {
        let end = stripped
            .find(']')
            .ok_or_else(|| Error::Path(format!("unterminated key in '{}'", segment)))?;
        for key_val in stripped[..end].split(',') {
            let (k, v) = key_val
                .split_once('=')
                .ok_or_else(|| Error::Path(format!("key without value in '{}'", segment)))?;
            elem.key.insert(k.trim().to_string(), v.trim().to_string());
        }
        rest = &stripped[end + 1..];
    }

    if !rest.is_empty() {
        return Err(Error::Path(format!("trailing characters in '{}'", segment)));
    }
    Ok(elem)
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, elem) in self.elem.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(&elem.name)?;
            for (k, v) in &elem.key {
                write!(f, "[{}={}]", k, v)?;
            }
        }
        Ok(())
    }
}

/// Fixed-point decimal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decimal64 {
    pub digits: i64,
    pub precision: u32,
}

impl Decimal64 {
    pub fn to_f64(self) -> f64 {
        self.digits as f64 * 10f64.powi(-(self.precision as i32))
    }
}

/// A typed gNMI value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypedValue {
    StringVal(String),
    IntVal(i64),
    UintVal(u64),
    BoolVal(bool),
    BytesVal(Vec<u8>),
    FloatVal(f32),
    DoubleVal(f64),
    DecimalVal(Decimal64),
    LeaflistVal(Vec<TypedValue>),
    AnyVal(Vec<u8>),
    JsonVal(Vec<u8>),
    JsonIetfVal(Vec<u8>),
    AsciiVal(String),
    ProtoBytes(Vec<u8>),
}

impl TypedValue {
    /// Numeric interpretation of the value.
    ///
    /// Booleans count as numbers (1 or 0), matching how telemetry exporters
    /// expose them as gauges.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            TypedValue::IntVal(i) => Some(*i as f64),
            TypedValue::UintVal(u) => Some(*u as f64),
            TypedValue::BoolVal(b) => Some(if *b { 1.0 } else { 0.0 }),
            TypedValue::FloatVal(f) => Some(*f as f64),
            TypedValue::DoubleVal(d) => Some(*d),
            TypedValue::DecimalVal(d) => Some(d.to_f64()),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        self.as_number().is_some()
    }

    /// String interpretation of the value, for string and ASCII values only.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::StringVal(s) | TypedValue::AsciiVal(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        TypedValue::StringVal(v.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        TypedValue::StringVal(v)
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        TypedValue::IntVal(v)
    }
}

impl From<u64> for TypedValue {
    fn from(v: u64) -> Self {
        TypedValue::UintVal(v)
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        TypedValue::DoubleVal(v)
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        TypedValue::BoolVal(v)
    }
}
