//! Mutable JSON document representation of a job.
//!
//! A [`JobRecord`] is an insertion-ordered JSON object. The engine reads and
//! writes a handful of well-known keys and leaves everything else alone, so a
//! record forwarded from another system is stored with all of its fields intact.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::JobDescriptor;

/// Errors raised while decoding or encoding a whole record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid job record json: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("job record must be a json object, got {0}")]
    NotAnObject(&'static str),

    #[error("failed to encode job record: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Why a single field could not be read with the requested type.
///
/// `Missing` and `TypeMismatch` are kept apart so callers can supply a default for
/// an absent field while still rejecting a malformed one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("key `{key}` not found")]
    Missing { key: String },

    #[error("key `{key}` is {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl FieldError {
    #[inline]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}

/// Name of a JSON value's variant, for error messages.
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Typed view of one key of a [`JobRecord`], returned by [`JobRecord::get`].
#[derive(Debug, Clone, Copy)]
pub struct Field<'a> {
    key: &'a str,
    value: Option<&'a Value>,
}

impl<'a> Field<'a> {
    /// Whether the key exists, regardless of its type.
    #[inline]
    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    /// The raw JSON value.
    pub fn value(&self) -> Result<&'a Value, FieldError> {
        self.value.ok_or_else(|| FieldError::Missing {
            key: self.key.to_owned(),
        })
    }

    fn typed<T>(
        &self,
        expected: &'static str,
        extract: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<T, FieldError> {
        let value = self.value()?;
        extract(value).ok_or_else(|| FieldError::TypeMismatch {
            key: self.key.to_owned(),
            expected,
            found: kind_of(value),
        })
    }

    pub fn as_str(&self) -> Result<&'a str, FieldError> {
        self.typed("a string", Value::as_str)
    }

    /// Any JSON number, integers included.
    pub fn as_f64(&self) -> Result<f64, FieldError> {
        self.typed("a number", Value::as_f64)
    }

    /// A JSON number without a fractional part that fits in `i64`.
    pub fn as_i64(&self) -> Result<i64, FieldError> {
        self.typed("an integer", Value::as_i64)
    }

    pub fn as_u64(&self) -> Result<u64, FieldError> {
        self.typed("a non-negative integer", Value::as_u64)
    }

    pub fn as_bool(&self) -> Result<bool, FieldError> {
        self.typed("a boolean", Value::as_bool)
    }

    pub fn as_object(&self) -> Result<&'a Map<String, Value>, FieldError> {
        self.typed("an object", Value::as_object)
    }

    pub fn as_array(&self) -> Result<&'a Vec<Value>, FieldError> {
        self.typed("an array", Value::as_array)
    }
}

/// Ordered, mutable key/value document describing one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobRecord {
    fields: Map<String, Value>,
}

impl JobRecord {
    /// An empty record.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a record from raw JSON bytes. The document must be an object.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RecordError> {
        let value: Value = serde_json::from_slice(bytes).map_err(RecordError::Decode)?;
        Self::try_from(value)
    }

    /// Typed accessor for `key`. Never fails by itself; the error surfaces when a
    /// concrete type is requested.
    #[inline]
    pub fn get<'a>(&'a self, key: &'a str) -> Field<'a> {
        Field {
            key,
            value: self.fields.get(key),
        }
    }

    /// Insert or overwrite `key`. An overwritten key keeps its position; a new key
    /// is appended.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Remove `key`, keeping the relative order of the remaining keys.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    #[inline]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    #[inline]
    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    /// Compact JSON bytes reflecting the current state, unknown fields included.
    pub fn encode(&self) -> Result<Vec<u8>, RecordError> {
        serde_json::to_vec(&self.fields).map_err(RecordError::Encode)
    }

    /// Project the record onto the fields the engine knows about.
    pub fn to_descriptor(&self) -> Result<JobDescriptor, RecordError> {
        JobDescriptor::deserialize(&Value::Object(self.fields.clone())).map_err(RecordError::Decode)
    }
}

impl From<Map<String, Value>> for JobRecord {
    #[inline]
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl TryFrom<Value> for JobRecord {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(RecordError::NotAnObject(kind_of(&other))),
        }
    }
}

impl FromStr for JobRecord {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slice(s.as_bytes())
    }
}

impl fmt::Display for JobRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.fields).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
