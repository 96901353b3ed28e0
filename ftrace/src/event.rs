//! Decoded trace events
//!
//! A [`ParsedEvent`] is an ordered field-name → [`Value`] mapping: the five
//! standard fields first, then the declared parameters in declaration order
//! (or a single `address` field for socket events).

use std::fmt;

use ftrace_common::{FIELD_CALLER_NAME, FIELD_CALLER_PID, FIELD_PROBE_HANDLE, FIELD_TIMESTAMP};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::domain::Pid;

/// Resolved socket address of a connect/accept style event
///
/// Address and port resolve independently; either may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Endpoint {
    pub address: Option<String>,
    pub port: Option<u16>,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address = self.address.as_deref().unwrap_or("?");
        match self.port {
            Some(port) if address.contains(':') => write!(f, "[{address}]:{port}"),
            Some(port) => write!(f, "{address}:{port}"),
            None => write!(f, "{address}:?"),
        }
    }
}

/// Typed value of one decoded field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Address(Endpoint),
}

impl Value {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::UInt(v) => Some(v),
            Value::Int(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Address(endpoint) => write!(f, "{endpoint}"),
        }
    }
}

/// One decoded trace line
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedEvent {
    fields: Vec<(String, Value)>,
}

impl ParsedEvent {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field; insertion order is preserved
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.fields.push((name.into(), value));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Field names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn caller_name(&self) -> Option<&str> {
        self.get(FIELD_CALLER_NAME).and_then(Value::as_str)
    }

    #[must_use]
    pub fn caller_pid(&self) -> Option<Pid> {
        self.get(FIELD_CALLER_PID)
            .and_then(Value::as_u64)
            .and_then(|pid| u32::try_from(pid).ok())
            .map(Pid)
    }

    #[must_use]
    pub fn timestamp(&self) -> Option<f64> {
        match self.get(FIELD_TIMESTAMP) {
            Some(Value::Float(ts)) => Some(*ts),
            _ => None,
        }
    }

    #[must_use]
    pub fn probe_handle(&self) -> Option<&str> {
        self.get(FIELD_PROBE_HANDLE).and_then(Value::as_str)
    }
}

impl Serialize for ParsedEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
