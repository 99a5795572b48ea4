//! Configuration value types and conversion utilities.

use crate::callable::Callable;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Represents a value that can be stored in, or produced by, a configuration tree.
///
/// Only the scalar variants are stored directly in a node. Arrays and objects
/// are unfolded into child sections when assigned, and callables are handed to
/// the modifier registered for [`ValueKind::Callable`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// String value
    String(String),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// Sequence of values
    Array(Vec<ConfigValue>),
    /// Ordered key-value pairs
    Object(Vec<(String, ConfigValue)>),
    /// Reference to a registered constructor or function
    Callable(Callable),
    /// Null value, also the placeholder for gaps in sequences
    Null,
}

/// The kind of a [`ConfigValue`], used to pick a modifier for a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Object,
    Callable,
    Null,
}

impl ConfigValue {
    /// Returns the value as a string reference if it's a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an i64 if it's an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as an f64 if it's a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the value as a bool if it's a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as a slice if it's an array.
    pub fn as_array(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Returns the entries if the value is an object.
    pub fn as_object(&self) -> Option<&[(String, ConfigValue)]> {
        match self {
            ConfigValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Returns the callable if the value is one.
    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            ConfigValue::Callable(c) => Some(c),
            _ => None,
        }
    }

    /// Looks up an entry of an object value by key.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.as_object()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Checks if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    /// Returns true for values stored directly in a node.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            ConfigValue::String(_)
                | ConfigValue::Integer(_)
                | ConfigValue::Float(_)
                | ConfigValue::Boolean(_)
                | ConfigValue::Null
        )
    }

    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::String(_) => ValueKind::String,
            ConfigValue::Integer(_) => ValueKind::Integer,
            ConfigValue::Float(_) => ValueKind::Float,
            ConfigValue::Boolean(_) => ValueKind::Boolean,
            ConfigValue::Array(_) => ValueKind::Array,
            ConfigValue::Object(_) => ValueKind::Object,
            ConfigValue::Callable(_) => ValueKind::Callable,
            ConfigValue::Null => ValueKind::Null,
        }
    }

    /// Returns the type name of the ConfigValue variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::String(_) => "String",
            ConfigValue::Integer(_) => "Integer",
            ConfigValue::Float(_) => "Float",
            ConfigValue::Boolean(_) => "Boolean",
            ConfigValue::Array(_) => "Array",
            ConfigValue::Object(_) => "Object",
            ConfigValue::Callable(_) => "Callable",
            ConfigValue::Null => "Null",
        }
    }

    /// Coerces the value to a string representation.
    pub fn coerce_to_string(&self) -> String {
        match self {
            ConfigValue::String(s) => s.clone(),
            ConfigValue::Integer(i) => i.to_string(),
            ConfigValue::Float(f) => f.to_string(),
            ConfigValue::Boolean(b) => b.to_string(),
            ConfigValue::Callable(c) => c.path(),
            ConfigValue::Array(_) => "[array]".to_string(),
            ConfigValue::Object(_) => "[object]".to_string(),
            ConfigValue::Null => "".to_string(),
        }
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Integer(i)
    }
}

impl From<i32> for ConfigValue {
    fn from(i: i32) -> Self {
        ConfigValue::Integer(i as i64)
    }
}

impl From<u32> for ConfigValue {
    fn from(i: u32) -> Self {
        ConfigValue::Integer(i as i64)
    }
}

impl From<f64> for ConfigValue {
    fn from(f: f64) -> Self {
        ConfigValue::Float(f)
    }
}

impl From<f32> for ConfigValue {
    fn from(f: f32) -> Self {
        ConfigValue::Float(f as f64)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Boolean(b)
    }
}

impl From<Callable> for ConfigValue {
    fn from(c: Callable) -> Self {
        ConfigValue::Callable(c)
    }
}

impl<T: Into<ConfigValue>> From<Vec<T>> for ConfigValue {
    fn from(arr: Vec<T>) -> Self {
        ConfigValue::Array(arr.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ConfigValue>> From<Option<T>> for ConfigValue {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(ConfigValue::Null)
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for ConfigValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ConfigValue::Object(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConfigValue::String(s) => serializer.serialize_str(s),
            ConfigValue::Integer(i) => serializer.serialize_i64(*i),
            ConfigValue::Float(f) => serializer.serialize_f64(*f),
            ConfigValue::Boolean(b) => serializer.serialize_bool(*b),
            ConfigValue::Callable(c) => serializer.serialize_str(&c.path()),
            ConfigValue::Null => serializer.serialize_unit(),
            ConfigValue::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for item in arr {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ConfigValue::Object(obj) => {
                let mut map = serializer.serialize_map(Some(obj.len()))?;
                for (k, v) in obj {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_value_creation() {
        let string_val = ConfigValue::from("test");
        assert_eq!(string_val.as_str(), Some("test"));

        let int_val = ConfigValue::from(42i64);
        assert_eq!(int_val.as_i64(), Some(42));

        let bool_val = ConfigValue::from(true);
        assert_eq!(bool_val.as_bool(), Some(true));

        let list_val = ConfigValue::from(vec![10, 8, 9, 1]);
        assert_eq!(list_val.as_array().map(|a| a.len()), Some(4));
    }

    #[test]
    fn test_kind_and_scalar() {
        assert_eq!(ConfigValue::from(1).kind(), ValueKind::Integer);
        assert_eq!(ConfigValue::from(1.5).kind(), ValueKind::Float);
        assert_eq!(ConfigValue::Null.kind(), ValueKind::Null);
        assert!(ConfigValue::from("x").is_scalar());
        assert!(!ConfigValue::from(vec![1]).is_scalar());
        assert!(!ConfigValue::Object(vec![]).is_scalar());
    }

    #[test]
    fn test_object_from_iter_keeps_order() {
        let obj: ConfigValue = vec![("b", 2), ("a", 1)].into_iter().collect();
        let keys: Vec<&str> = obj
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(obj.get("a"), Some(&ConfigValue::Integer(1)));
    }

    #[test]
    fn test_serde_serialization() {
        let obj: ConfigValue = vec![("host", ConfigValue::from("localhost"))]
            .into_iter()
            .collect();
        assert_eq!(
            serde_json::to_string(&obj).unwrap(),
            r#"{"host":"localhost"}"#
        );
        assert_eq!(serde_json::to_string(&ConfigValue::Null).unwrap(), "null");
        assert_eq!(
            serde_json::to_string(&ConfigValue::from(vec![1, 2])).unwrap(),
            "[1,2]"
        );
    }
}
