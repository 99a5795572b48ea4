//! Error types and utilities for nestcfg configuration trees.

/// Result type alias for nestcfg operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Comprehensive error types for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Loading text failed on a specific line
    #[error("[LINE {line}] ({kind}) {message}")]
    Parse {
        line: usize,
        kind: &'static str,
        message: String,
    },

    /// A line does not follow the format grammar or indentation rules
    #[error("{0}")]
    Syntax(String),

    /// A key is already bound, or is reserved for metadata
    #[error("Key collision: {0}")]
    KeyCollision(String),

    /// A key cannot be used as an identifier
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The operation is not allowed on this node
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// No literal form matches a value token
    #[error("Cannot decode value: {0}")]
    ValueDecode(String),

    /// Type conversion failed
    #[error("Type conversion error: cannot convert {from} to {to}")]
    TypeConversion { from: String, to: String },

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Requested key was not found
    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    /// Saving without a target file
    #[error("No file path specified")]
    MissingFilePath,
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ValueDecode(err.to_string())
    }
}

impl ConfigError {
    /// Creates a new parse error for a 1-based line number.
    pub fn parse_error(line: usize, kind: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            kind,
            message: message.into(),
        }
    }

    /// Creates a new syntax error.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    /// Creates a new key collision error.
    pub fn key_collision(message: impl Into<String>) -> Self {
        Self::KeyCollision(message.into())
    }

    /// Creates a new invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey(message.into())
    }

    /// Creates a new unsupported operation error.
    pub fn unsupported_operation(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation(message.into())
    }

    /// Creates the error reported by a frozen node for the attempted operation.
    pub fn immutable(operation: &str) -> Self {
        Self::UnsupportedOperation(format!(
            "Immutable configuration does not support {operation}"
        ))
    }

    /// Creates a new value decode error.
    pub fn value_decode(message: impl Into<String>) -> Self {
        Self::ValueDecode(message.into())
    }

    /// Creates a new type conversion error.
    pub fn type_conversion(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::TypeConversion {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Creates a new invalid value error.
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }

    /// Creates a new key not found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Returns the variant name, used as the error kind in parse reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigError::Io(_) => "Io",
            ConfigError::Parse { .. } => "Parse",
            ConfigError::Syntax(_) => "Syntax",
            ConfigError::KeyCollision(_) => "KeyCollision",
            ConfigError::InvalidKey(_) => "InvalidKey",
            ConfigError::UnsupportedOperation(_) => "UnsupportedOperation",
            ConfigError::ValueDecode(_) => "ValueDecode",
            ConfigError::TypeConversion { .. } => "TypeConversion",
            ConfigError::InvalidValue(_) => "InvalidValue",
            ConfigError::KeyNotFound { .. } => "KeyNotFound",
            ConfigError::MissingFilePath => "MissingFilePath",
        }
    }

    /// Returns true if this error is a line-level parse failure.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, ConfigError::Parse { .. })
    }

    /// Returns the line number of a parse failure.
    pub fn line(&self) -> Option<usize> {
        match self {
            ConfigError::Parse { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// Returns true if this error is a key collision.
    pub fn is_key_collision(&self) -> bool {
        matches!(self, ConfigError::KeyCollision(_))
    }

    /// Returns true if this error is an invalid key.
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, ConfigError::InvalidKey(_))
    }

    /// Returns true if this error is an unsupported operation, including frozen nodes.
    pub fn is_unsupported_operation(&self) -> bool {
        matches!(self, ConfigError::UnsupportedOperation(_))
    }

    /// Returns true if this error is related to IO operations.
    pub fn is_io_error(&self) -> bool {
        matches!(self, ConfigError::Io(_))
    }
}

/// Extension trait for adding context to Results.
pub trait ConfigResultExt<T> {
    /// Wraps a failure into a `Parse` error located at `line`.
    fn at_line(self, line: usize) -> ConfigResult<T>;
}

impl<T> ConfigResultExt<T> for ConfigResult<T> {
    fn at_line(self, line: usize) -> ConfigResult<T> {
        self.map_err(|err| match err {
            already @ ConfigError::Parse { .. } => already,
            ConfigError::Syntax(message) => ConfigError::parse_error(line, "Syntax", message),
            other => ConfigError::parse_error(line, other.kind(), other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        let error = ConfigError::key_collision("level1");
        assert_eq!(error.to_string(), "Key collision: level1");

        let error = ConfigError::type_conversion("section", "sequence");
        assert_eq!(
            error.to_string(),
            "Type conversion error: cannot convert section to sequence"
        );

        let error = ConfigError::parse_error(5, "Syntax", "Unexpected indentation");
        assert_eq!(error.to_string(), "[LINE 5] (Syntax) Unexpected indentation");
    }

    #[test]
    fn test_immutable_names_operation() {
        let error = ConfigError::immutable("loads");
        assert!(error.is_unsupported_operation());
        assert!(error.to_string().contains("loads"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let config_error: ConfigError = io_error.into();
        assert!(config_error.is_io_error());
        assert_eq!(config_error.kind(), "Io");
    }

    #[test]
    fn test_at_line_wraps_once() {
        let result: ConfigResult<()> = Err(ConfigError::syntax("Unexpected indentation"));
        let err = result.at_line(7).unwrap_err();
        assert_eq!(err.line(), Some(7));
        assert_eq!(err.to_string(), "[LINE 7] (Syntax) Unexpected indentation");

        // An already located error keeps its line
        let rewrapped: ConfigResult<()> = Err(err);
        assert_eq!(rewrapped.at_line(9).unwrap_err().line(), Some(7));
    }

    #[test]
    fn test_at_line_keeps_kind() {
        let result: ConfigResult<()> = Err(ConfigError::key_collision("a"));
        let err = result.at_line(3).unwrap_err();
        if let ConfigError::Parse { line, kind, message } = err {
            assert_eq!(line, 3);
            assert_eq!(kind, "KeyCollision");
            assert!(message.contains("a"));
        } else {
            panic!("Expected Parse error variant");
        }
    }

    #[test]
    fn test_error_type_checking() {
        let collision = ConfigError::key_collision("k");
        assert!(collision.is_key_collision());
        assert!(!collision.is_invalid_key());
        assert!(!collision.is_parse_error());

        let invalid = ConfigError::invalid_key("1abc");
        assert!(invalid.is_invalid_key());
        assert!(!invalid.is_unsupported_operation());
    }
}
