//! Key normalization.
//!
//! Keys are case-insensitive and must be usable as identifiers. Integer keys
//! stand for sequence positions and are stored as `list<n>`.

use crate::error::{ConfigError, ConfigResult};
use std::borrow::Cow;
use std::fmt;

/// Prefix of keys produced from sequence indices.
pub const SEQUENCE_PREFIX: &str = "list";

/// Names reserved for node metadata. They can be read with `get` but never bound.
pub const METADATA_FIELDS: &[&str] = &[
    "owner",
    "back",
    "root",
    "sub_path",
    "modifier",
    "key",
    "config_file_path",
];

/// An admissible key before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key<'a> {
    /// A named key
    Name(Cow<'a, str>),
    /// A sequence position
    Index(usize),
}

impl<'a> From<&'a str> for Key<'a> {
    fn from(s: &'a str) -> Self {
        Key::Name(Cow::Borrowed(s))
    }
}

impl<'a> From<&'a String> for Key<'a> {
    fn from(s: &'a String) -> Self {
        Key::Name(Cow::Borrowed(s.as_str()))
    }
}

impl From<String> for Key<'_> {
    fn from(s: String) -> Self {
        Key::Name(Cow::Owned(s))
    }
}

impl From<usize> for Key<'_> {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

impl fmt::Display for Key<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(i) => write!(f, "{i}"),
        }
    }
}

impl Key<'_> {
    /// Maps the key to its canonical identifier.
    pub fn normalize(&self) -> ConfigResult<String> {
        let raw = match self {
            Key::Name(name) => name.to_string(),
            Key::Index(i) => index_key(*i),
        };

        let key: String = raw
            .to_lowercase()
            .chars()
            .map(|c| match c {
                '-' | ' ' | '.' => '_',
                other => other,
            })
            .collect();

        match key.chars().next() {
            None => Err(ConfigError::invalid_key("Key must not be empty")),
            Some(c) if c.is_ascii_digit() => Err(ConfigError::invalid_key(format!(
                "'{raw}' cannot start with a digit"
            ))),
            Some(_) if !is_identifier(&key) => Err(ConfigError::invalid_key(format!(
                "'{raw}' is not a valid identifier"
            ))),
            Some(_) => Ok(key),
        }
    }
}

/// Normalizes any admissible key.
pub fn normalize<'a>(key: impl Into<Key<'a>>) -> ConfigResult<String> {
    key.into().normalize()
}

/// Returns the stored key for a sequence position.
pub fn index_key(index: usize) -> String {
    format!("{SEQUENCE_PREFIX}{index}")
}

/// Returns the position encoded in a sequence key, if the key has that shape.
pub fn sequence_index(key: &str) -> Option<usize> {
    let digits = key.strip_prefix(SEQUENCE_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Checks the identifier grammar `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns true if the key is reserved for metadata.
pub fn is_metadata(key: &str) -> bool {
    METADATA_FIELDS.contains(&key)
}
