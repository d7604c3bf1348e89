//! Binding metadata.
//!
//! Contract declarations carry default metadata and service declarations
//! carry their own. The resolved binding starts from the contract defaults
//! and lets the winning service overwrite them key by key.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Int(i64::from(value))
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Str(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Str(value)
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(value) => write!(f, "{value}"),
            MetadataValue::Int(value) => write!(f, "{value}"),
            MetadataValue::Float(value) => write!(f, "{value}"),
            MetadataValue::Str(value) => write!(f, "{value:?}"),
        }
    }
}

/// Ordered string-keyed metadata.
///
/// # Examples
/// ```
/// use sijill_registry::metadata::Metadata;
///
/// let mut defaults = Metadata::new();
/// defaults.insert("format", "text");
/// defaults.insert("level", 1);
///
/// let mut own = Metadata::new();
/// own.insert("format", "json");
///
/// let merged = defaults.merged(&own);
/// assert_eq!(merged.get("format").and_then(|v| v.as_str()), Some("json"));
/// assert_eq!(merged.get("level").and_then(|v| v.as_int()), Some(1));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous one for `key`.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Option<MetadataValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, MetadataValue> {
        self.0.iter()
    }

    /// Overwrites entries of `self` with every entry of `other`.
    ///
    /// Merging the same metadata twice yields the same result as merging
    /// it once.
    pub fn merge(&mut self, other: &Metadata) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Returns a copy of `self` with `other` merged over it.
    pub fn merged(&self, other: &Metadata) -> Metadata {
        let mut result = self.clone();
        result.merge(other);
        result
    }
}

impl<K: Into<String>, V: Into<MetadataValue>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Metadata(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = (&'a String, &'a MetadataValue);
    type IntoIter = btree_map::Iter<'a, String, MetadataValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overwrites_existing_keys() {
        let mut base: Metadata = [("a", 1), ("b", 2)].into_iter().collect();
        let other: Metadata = [("b", 20), ("c", 30)].into_iter().collect();

        base.merge(&other);

        assert_eq!(base.get("a"), Some(&MetadataValue::Int(1)));
        assert_eq!(base.get("b"), Some(&MetadataValue::Int(20)));
        assert_eq!(base.get("c"), Some(&MetadataValue::Int(30)));
    }

    #[test]
    fn merge_is_idempotent() {
        let base: Metadata = [("name", "console"), ("format", "text")].into_iter().collect();
        let other: Metadata = [("format", "json"), ("color", "auto")].into_iter().collect();

        let once = base.merged(&other);
        let twice = once.merged(&other);

        assert_eq!(once, twice);
    }

    #[test]
    fn merge_empty_is_noop() {
        let base: Metadata = [("k", true)].into_iter().collect();
        assert_eq!(base.merged(&Metadata::new()), base);
    }

    #[test]
    fn values_deserialize_untagged() {
        let metadata: Metadata =
            serde_json::from_str(r#"{"enabled": true, "weight": 3, "ratio": 0.5, "name": "x"}"#)
                .unwrap();
        assert_eq!(metadata.get("enabled"), Some(&MetadataValue::Bool(true)));
        assert_eq!(metadata.get("weight"), Some(&MetadataValue::Int(3)));
        assert_eq!(metadata.get("ratio"), Some(&MetadataValue::Float(0.5)));
        assert_eq!(metadata.get("name").and_then(MetadataValue::as_str), Some("x"));
    }
}
