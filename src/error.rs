//! Error types for the sync service.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=config, 3=fetch, 4=mutation, etc.)
//! - Retryability flags so the scheduler can tell transient API failures
//!   apart from configuration problems that need a human

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Monitoring matches on the string; shell scripts on the
/// exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Configuration (exit 2)
    ConfigError,

    // Snapshot fetch (exit 3)
    FetchError,

    // Remote mutation (exit 4)
    MutationError,

    // Persisted state (exit 5)
    StateError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::ConfigError => "CONFIG_ERROR",
            Self::FetchError => "FETCH_ERROR",
            Self::MutationError => "MUTATION_ERROR",
            Self::StateError => "STATE_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::ConfigError => 2,
            Self::FetchError => 3,
            Self::MutationError => 4,
            Self::StateError => 5,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the next scheduled pass can be expected to succeed
    /// without operator intervention.
    ///
    /// True for transient API failures (network, rate limits). False
    /// for configuration and state-file problems.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchError | Self::MutationError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in sync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Notion API error: {0}")]
    Notion(String),

    #[error("GitHub API error: {0}")]
    Github(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("State file error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingEnv(_) | Self::Config(_) => ErrorCode::ConfigError,
            Self::Notion(_) | Self::Github(_) => ErrorCode::MutationError,
            Self::Http(_) => ErrorCode::FetchError,
            Self::State(_) => ErrorCode::StateError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Whether a subsequent pass should retry after this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.error_code().is_retryable()
    }

    /// Context-aware recovery hint for operators.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::MissingEnv(var) => Some(format!(
                "Set {var} in the environment or in a .env file next to the binary."
            )),
            Self::Config(_) => Some(
                "Check the user/status mapping tables and environment configuration.".to_string(),
            ),
            Self::State(_) => Some(
                "The state file may be corrupt. Move it aside to start from an empty state \
                 (the next pass will recover pairings by title or embedded Notion id)."
                    .to_string(),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_have_stable_strings() {
        assert_eq!(ErrorCode::ConfigError.as_str(), "CONFIG_ERROR");
        assert_eq!(ErrorCode::FetchError.as_str(), "FETCH_ERROR");
    }

    #[test]
    fn config_errors_are_fatal_not_retryable() {
        let err = Error::MissingEnv("NOTION_API_KEY");
        assert_eq!(err.exit_code(), 2);
        assert!(!err.is_retryable());
    }

    #[test]
    fn api_errors_are_retryable() {
        assert!(Error::Notion("timeout".into()).is_retryable());
        assert!(Error::Github("rate limited".into()).is_retryable());
    }

    #[test]
    fn missing_env_has_hint() {
        let err = Error::MissingEnv("GITHUB_TOKEN");
        assert!(err.hint().unwrap().contains("GITHUB_TOKEN"));
    }
}
