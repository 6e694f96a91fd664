use thiserror::Error;

/// Errors shared by every crate that sits below the HTTP boundary.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Access tracker lookup/update failed in a way the caller must see.
    #[error("access tracker error: {0}")]
    Tracker(String),

    /// Configuration value missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML (de)serialization failure.
    #[error("deserialization error: {0}")]
    Deserialization(#[from] serde_yaml::Error),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for `gbox-core` operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_error_display() {
        let err = CoreError::Tracker("box not tracked".to_string());
        assert_eq!(err.to_string(), "access tracker error: box not tracked");
    }

    #[test]
    fn config_error_display() {
        let err = CoreError::Config("missing cluster.mode".to_string());
        assert_eq!(err.to_string(), "configuration error: missing cluster.mode");
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CoreError = io_err.into();
        assert!(matches!(err, CoreError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn serde_json_error_conversion() {
        let result: std::result::Result<serde_json::Value, _> =
            serde_json::from_str("{ invalid json }");
        let err: CoreError = result.unwrap_err().into();
        assert!(matches!(err, CoreError::Serialization(_)));
    }

    #[test]
    fn serde_yaml_error_conversion() {
        let result: std::result::Result<serde_yaml::Value, _> =
            serde_yaml::from_str("invalid: yaml: content:");
        let err: CoreError = result.unwrap_err().into();
        assert!(matches!(err, CoreError::Deserialization(_)));
    }

    #[test]
    fn result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }
        fn returns_err() -> Result<i32> {
            Err(CoreError::Tracker("nope".to_string()))
        }

        assert_eq!(returns_ok().unwrap(), 42);
        assert!(returns_err().is_err());
    }
}
