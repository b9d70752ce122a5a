//! Error types

use thiserror::Error;

/// Failure fetching one window from upstream
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Transport error for window {window}: {message}")]
    Transport { window: String, message: String },

    #[error("Upstream returned HTTP {status} for window {window}")]
    Status { window: String, status: u16 },

    #[error("Upstream returned no records for window {window}")]
    Empty { window: String },

    #[error("Unexpected payload shape for window {window}: {message}")]
    UnexpectedShape { window: String, message: String },
}

impl FetchError {
    /// Rate-limit failures back off faster than other failures
    pub fn is_rate_limited(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => *status == 429,
            FetchError::Transport { message, .. } => message.contains("429"),
            _ => false,
        }
    }

    pub fn window(&self) -> &str {
        match self {
            FetchError::Transport { window, .. }
            | FetchError::Status { window, .. }
            | FetchError::Empty { window }
            | FetchError::UnexpectedShape { window, .. } => window,
        }
    }
}

/// Failure of a whole aggregation cycle
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("All {windows} windows failed; keeping previous snapshot")]
    AllWindowsFailed { windows: usize },
}

/// Undecodable pagination cursor
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("Cursor is not valid base64: {0}")]
    Encoding(String),

    #[error("Cursor does not hold an offset: {0}")]
    Offset(String),
}

/// Configuration errors, fatal at startup only
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias
pub type FetchResult<T> = Result<T, FetchError>;
pub type CycleResult<T> = Result<T, CycleError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        let status = FetchError::Status { window: "1h".into(), status: 429 };
        assert!(status.is_rate_limited());
        assert!(status.to_string().contains("429"));

        let transport = FetchError::Transport {
            window: "5m".into(),
            message: "upstream said 429 Too Many Requests".into(),
        };
        assert!(transport.is_rate_limited());

        let server = FetchError::Status { window: "1h".into(), status: 503 };
        assert!(!server.is_rate_limited());
        assert!(!FetchError::Empty { window: "24h".into() }.is_rate_limited());
    }

    #[test]
    fn test_window_accessor() {
        let err = FetchError::UnexpectedShape { window: "6h".into(), message: "number".into() };
        assert_eq!(err.window(), "6h");
    }
}
