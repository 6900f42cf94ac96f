//! Key registry for the change/get endpoints
//!
//! Provides [`KeyRegistry`], a lookup table from short logical keys to a
//! document [`Field`] and the coercion rule that field implies.

use crate::document::{Field, FieldUpdate, Sensor, StatusDocument};
use crate::error::{StatusError, StatusResult, ValidationError};
use serde_json::Value;
use std::collections::HashMap;

/// One registered key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    /// Key accepted on the wire
    pub key: &'static str,
    /// Field the key writes and reads
    pub field: Field,
    /// Name used in read responses
    pub label: &'static str,
}

/// Registry of writable/readable keys
#[derive(Debug, Default, Clone)]
pub struct KeyRegistry {
    keys: HashMap<&'static str, KeySpec>,
}

impl KeyRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    /// Create registry with the built-in keys
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("open", Field::Open, "open");
        registry.register("message", Field::Message, "message");
        registry.register("temperature", Field::Sensor(Sensor::Temperature), "temperature");
        registry.register("humidity", Field::Sensor(Sensor::Humidity), "humidity");
        registry.register("power", Field::Sensor(Sensor::PowerConsumption), "power");
        registry.register(
            "net_conn",
            Field::Sensor(Sensor::NetworkConnections),
            "network_connections",
        );
        registry.register(
            "net_traffic",
            Field::Sensor(Sensor::NetworkTraffic),
            "network_traffic",
        );
        registry
    }

    /// Register a key
    pub fn register(&mut self, key: &'static str, field: Field, label: &'static str) {
        self.keys.insert(key, KeySpec { key, field, label });
    }

    /// Look up a key
    ///
    /// # Errors
    /// `ValidationError::UnknownKey` if the key is not registered
    pub fn lookup(&self, key: &str) -> Result<&KeySpec, ValidationError> {
        self.keys
            .get(key)
            .ok_or_else(|| ValidationError::UnknownKey(key.to_string()))
    }

    /// Check if key exists
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    /// Turn a raw `(key, value)` pair into a typed update
    ///
    /// Nothing is read or written here, so a rejected pair never reaches the
    /// store.
    ///
    /// # Errors
    /// - `ValidationError::UnknownKey` if the key is not registered
    /// - `ValidationError::InvalidValue` if the value does not coerce
    pub fn resolve(&self, key: &str, raw: &str) -> Result<FieldUpdate, ValidationError> {
        let entry = self.lookup(key)?;
        let invalid = || ValidationError::invalid_value(key, raw);

        Ok(match entry.field {
            Field::Open => FieldUpdate::Open(parse_bool(raw).ok_or_else(invalid)?),
            Field::Message => FieldUpdate::Message(raw.to_string()),
            Field::Sensor(sensor) => FieldUpdate::Sensor(sensor, parse_int(raw).ok_or_else(invalid)?),
        })
    }

    /// Read a key from the document, returning `(label, value)`
    ///
    /// # Errors
    /// - `ValidationError::UnknownKey` if the key is not registered
    /// - `StatusError::MissingPath` if the document lacks the field
    pub fn read(&self, document: &StatusDocument, key: &str) -> StatusResult<(&'static str, Value)> {
        let entry = self.lookup(key)?;
        let value = document
            .get(entry.field)
            .ok_or_else(|| StatusError::MissingPath(entry.field.to_string()))?;
        Ok((entry.label, value))
    }

    /// List all registered keys, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.keys.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Boolean rule shared by every surface
///
/// Case-insensitive, surrounding whitespace ignored.
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Integer rule for sensor values
#[must_use]
pub fn parse_int(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// Boolean rule applied to a JSON value (booleans or boolean-like strings)
#[must_use]
pub fn bool_from_json(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => parse_bool(s),
        _ => None,
    }
}

/// Integer rule applied to a JSON value
///
/// Accepts integers, floats without a fractional part, and integer strings.
#[must_use]
pub fn int_from_json(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => parse_int(s),
        _ => None,
    }
}
