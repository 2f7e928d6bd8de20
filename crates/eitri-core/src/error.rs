//! Error types for eitri
//!
//! All errors are managed centrally here.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// eitri error type
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or unreadable YAML after the fallback-encoding retry
    #[error("Configuration error: {0}")]
    Config(String),

    /// Container engine unreachable, unparsable, or compose missing
    #[error("Environment error: {0}")]
    Environment(String),

    /// No toolkit could be resolved from the storage directory
    #[error("No toolkit available: {0}")]
    NoToolkit(String),

    /// Toolkit compose document is malformed
    #[error("Invalid toolkit: {0}")]
    InvalidToolkit(String),

    /// The build verb exited nonzero. Recoverable: the loop reports it
    /// and keeps prompting; the run verb is never attempted.
    #[error("Build failed with status {status}")]
    BuildFailure { status: i32, output: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether the command loop can recover from this error and keep
    /// prompting. Everything else is fatal to the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::BuildFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_failure_is_recoverable() {
        let err = Error::BuildFailure {
            status: 1,
            output: String::new(),
        };
        assert!(err.is_recoverable());
        assert!(!Error::Config("bad".into()).is_recoverable());
        assert!(!Error::NoToolkit("empty".into()).is_recoverable());
    }
}
