use std::{error::Error as StdError, time::Duration};

/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed channel errors shared across channel implementations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input payload or parameter is invalid.
    #[error("invalid channel input: {message}")]
    InvalidInput { message: String },

    /// Operation is currently unavailable (not configured/ready).
    #[error("channel operation unavailable: {message}")]
    Unavailable { message: String },

    /// The platform refused the request and repeating it will not help.
    #[error("channel rejected request: {message}")]
    Rejected { message: String },

    /// The platform asked us to slow down.
    #[error("channel rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Wrapped source error from an external dependency.
    #[error("channel operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// Integer parsing failed.
    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn rejected(message: impl std::fmt::Display) -> Self {
        Self::Rejected {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self::RateLimited { retry_after }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::RateLimited { .. } | Self::External { .. }
        )
    }

    /// Wait requested by the platform, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::unavailable("not started").is_transient());
        assert!(Error::rate_limited(Duration::from_secs(3)).is_transient());
        assert!(Error::external("send", std::io::Error::other("reset")).is_transient());
        assert!(!Error::invalid_input("bad chat id").is_transient());
        assert!(!Error::rejected("chat not found").is_transient());
    }

    #[test]
    fn retry_after_only_for_rate_limits() {
        assert_eq!(
            Error::rate_limited(Duration::from_secs(7)).retry_after(),
            Some(Duration::from_secs(7))
        );
        assert_eq!(Error::unavailable("x").retry_after(), None);
    }

    #[test]
    fn external_display_includes_context() {
        let err = Error::external("edit message", std::io::Error::other("boom"));
        assert_eq!(err.to_string(), "channel operation failed: edit message: boom");
    }
}
