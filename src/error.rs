use std::sync::Arc;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the Sixpack client.
///
/// Validation errors indicate a programming mistake and are returned before any request is made.
/// Network, server and decoding errors are recovered: the client still hands out a usable
/// alternative and reports the error alongside it (see [`Error::is_recoverable()`]).
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Experiment name does not match the naming grammar.
    #[error("bad experiment name: {0:?}")]
    InvalidExperimentName(String),

    /// Alternative name does not match the naming grammar.
    #[error("bad alternative name: {0:?}")]
    InvalidAlternativeName(String),

    /// Forced alternative does not match the naming grammar.
    #[error("bad force value: {0:?}")]
    InvalidForce(String),

    /// Fewer than two alternatives were provided.
    #[error("must specify at least 2 alternatives")]
    NotEnoughAlternatives,

    /// The same alternative was listed twice.
    #[error("duplicate alternative: {0:?}")]
    DuplicateAlternative(String),

    /// Traffic fraction is not a number in `[0, 1]`.
    #[error("traffic fraction must be between 0 and 1, got {0}")]
    InvalidTrafficFraction(f64),

    /// An option-based call was made without any options.
    #[error("at least one request option is required")]
    NoOptions,

    /// Invalid base URL configuration.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// The random generator failed to produce a client id.
    #[error("unable to generate client id")]
    IdentityGeneration(#[source] Arc<rand::Error>),

    /// Network error (connection timeout, DNS failure, connection refused, ...).
    #[error(transparent)]
    // reqwest::Error is not clonable, so we're wrapping it in an Arc.
    Network(Arc<reqwest::Error>),

    /// The server responded with an internal server error.
    #[error("sixpack server error (status {0})")]
    ServerError(u16),

    /// Response body is not a valid Sixpack response.
    #[error("error parsing sixpack response")]
    Decode(#[source] Arc<serde_json::Error>),
}

impl Error {
    /// Returns `true` for runtime failures that the client recovers from by falling back to the
    /// default alternative.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::ServerError(_) | Error::Decode(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Decode(Arc::new(value))
    }
}

impl From<rand::Error> for Error {
    fn from(value: rand::Error) -> Self {
        Error::IdentityGeneration(Arc::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn only_runtime_failures_are_recoverable() {
        assert!(Error::ServerError(500).is_recoverable());
        assert!(!Error::NotEnoughAlternatives.is_recoverable());
        assert!(!Error::InvalidForce("B".to_owned()).is_recoverable());
    }
}
