//! Error types for the metrics pipeline.

use thiserror::Error;

/// Errors raised by the pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// The tracker could not be reached, rejected the credentials, or the
    /// dump standing in for it could not be read.
    #[error("issue source unavailable: {0}")]
    SourceUnavailable(String),

    /// A single raw record could not be normalized. Batches skip these.
    #[error("malformed record{}: {reason}", key.as_deref().map(|k| format!(" {k}")).unwrap_or_default())]
    RecordMalformed { key: Option<String>, reason: String },

    #[error("export failed: {0}")]
    Export(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn malformed(key: Option<&str>, reason: impl Into<String>) -> Self {
        Error::RecordMalformed {
            key: key.map(str::to_string),
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_message_includes_key_when_known() {
        let err = Error::malformed(Some("OPS-7"), "summary is missing");
        assert_eq!(err.to_string(), "malformed record OPS-7: summary is missing");
    }

    #[test]
    fn malformed_message_without_key() {
        let err = Error::malformed(None, "key is missing");
        assert_eq!(err.to_string(), "malformed record: key is missing");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
