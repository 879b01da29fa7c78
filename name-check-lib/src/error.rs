//! Error handling for name checking operations.
//!
//! Per-name failures never travel as errors: they become typed outcomes
//! (see [`crate::Outcome`] and [`crate::RunStatus`]). This type covers the
//! failures that callers of the library do see, such as unreadable
//! configuration, a snapshot that cannot be written, or a provider client
//! that cannot be built.

use thiserror::Error;

/// Main error type for name checking operations.
#[derive(Debug, Clone, Error)]
pub enum NameCheckError {
    /// Network-related errors (connection, DNS, etc.)
    #[error("Network error: {message}")]
    Network { message: String },

    /// Progress snapshot could not be read or written
    #[error("Persistence error at '{path}': {message}")]
    Persistence { path: String, message: String },

    /// JSON parsing errors
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Configuration errors (invalid settings, etc.)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File I/O errors when reading name lists or config files
    #[error("File error at '{path}': {message}")]
    File { path: String, message: String },
}

impl NameCheckError {
    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new persistence error.
    pub fn persistence<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::Persistence {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::File {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for NameCheckError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            message: format!("JSON parsing failed: {}", err),
        }
    }
}

impl From<toml::de::Error> for NameCheckError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("Failed to parse TOML configuration: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = NameCheckError::persistence("progress.json", "disk full");
        assert_eq!(
            err.to_string(),
            "Persistence error at 'progress.json': disk full"
        );

        let err = NameCheckError::file_error("names.txt", "not found");
        assert_eq!(err.to_string(), "File error at 'names.txt': not found");
    }

    #[test]
    fn test_from_toml_error_is_config() {
        let err: NameCheckError = toml::from_str::<toml::Table>("[defaults")
            .unwrap_err()
            .into();
        assert!(matches!(err, NameCheckError::Config { .. }));
    }
}
