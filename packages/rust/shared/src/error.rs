//! Error types for coachkb.
//!
//! Library crates use [`CoachKbError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all coachkb operations.
#[derive(Debug, thiserror::Error)]
pub enum CoachKbError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the page source or the LLM provider.
    #[error("network error: {0}")]
    Network(String),

    /// Response body or file content could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The LLM provider rejected or failed a completion request.
    #[error("llm error: {0}")]
    Llm(String),

    /// The LLM response did not contain the expected field.
    #[error("malformed LLM response: {0}")]
    MalformedResponse(String),

    /// The requested title resolves to a disambiguation page.
    #[error("ambiguous title: {title}")]
    AmbiguousTitle { title: String },

    /// The requested title does not exist at the source.
    #[error("page not found: {title}")]
    PageNotFound { title: String },

    /// Writing or reading the knowledge-base export failed.
    #[error("export error: {0}")]
    Export(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (empty keyword set, bad chunk sizes, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CoachKbError>;

impl CoachKbError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CoachKbError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = CoachKbError::AmbiguousTitle {
            title: "Mercury".into(),
        };
        assert_eq!(err.to_string(), "ambiguous title: Mercury");

        let err = CoachKbError::MalformedResponse("no choices".into());
        assert!(err.to_string().contains("no choices"));
    }
}
