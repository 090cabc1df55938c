//! Error types for ttyscribe.

use thiserror::Error;

/// Main error type for recorder operations.
#[derive(Debug, Error)]
pub enum Error {
    /// PTY allocation or PTY I/O failure
    #[error("PTY error: {0}")]
    Pty(String),

    /// The child command could not be started
    #[error("Spawn failed: {0}")]
    Spawn(String),

    /// Failure while querying or configuring the user's terminal
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Invalid input or parameters (generic)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A strftime output template could not be expanded
    #[error("Invalid output template: {0}")]
    Template(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parse errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pty_error() {
        let err = Error::Pty("openpty failed".to_string());
        assert_eq!(err.to_string(), "PTY error: openpty failed");
    }

    #[test]
    fn test_spawn_error() {
        let err = Error::Spawn("No such file or directory".to_string());
        assert_eq!(err.to_string(), "Spawn failed: No such file or directory");
    }

    #[test]
    fn test_terminal_error() {
        let err = Error::Terminal("tcgetattr: ENOTTY".to_string());
        assert_eq!(err.to_string(), "Terminal error: tcgetattr: ENOTTY");
    }

    #[test]
    fn test_template_error() {
        let err = Error::Template("%Q".to_string());
        assert_eq!(err.to_string(), "Invalid output template: %Q");
    }

    #[test]
    fn test_config_error() {
        let err = Error::Config("session.idle_timeout_ms must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: session.idle_timeout_ms must be > 0"
        );
    }

    #[test]
    fn test_other_error() {
        let err = Error::Other("unknown error".to_string());
        assert_eq!(err.to_string(), "unknown error");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<i32>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_err = serde_yaml::from_str::<Vec<i32>>("{ not: a list").unwrap_err();
        let err: Error = yaml_err.into();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn test_error_debug() {
        let err = Error::InvalidInput("empty command".to_string());
        let debug_str = format!("{err:?}");
        assert!(debug_str.contains("InvalidInput"));
    }
}
