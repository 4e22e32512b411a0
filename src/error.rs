/// Error type returned by every service in this crate.
///
/// Each variant is a stable kind; the payload is a human-readable detail
/// message and should not be matched on. Use [`Error::kind`] to branch.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Request target was empty or could not be turned into a usable URL.
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    /// The underlying HTTP request could not be constructed.
    #[error("request construction failed: {0}")]
    RequestConstructionFailed(String),
    /// The transport could not complete the exchange (connect, timeout, I/O).
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// No usable response object was received.
    #[error("no response: {0}")]
    NoResponse(String),
    /// The rate limiter's wait budget ran out before a token was available.
    #[error("rate limit timeout: {0}")]
    RateLimitTimeout(String),
    /// The rate limiter rejected the call without waiting.
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),
    /// Explicit typed decoding of a response body failed.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Discriminant of [`Error`], for branching without looking at messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::InvalidTarget`].
    InvalidTarget,
    /// See [`Error::RequestConstructionFailed`].
    RequestConstructionFailed,
    /// See [`Error::ConnectionFailed`].
    ConnectionFailed,
    /// See [`Error::NoResponse`].
    NoResponse,
    /// See [`Error::RateLimitTimeout`].
    RateLimitTimeout,
    /// See [`Error::RateLimitExceeded`].
    RateLimitExceeded,
    /// See [`Error::Decode`].
    Decode,
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTarget(_) => ErrorKind::InvalidTarget,
            Self::RequestConstructionFailed(_) => ErrorKind::RequestConstructionFailed,
            Self::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
            Self::NoResponse(_) => ErrorKind::NoResponse,
            Self::RateLimitTimeout(_) => ErrorKind::RateLimitTimeout,
            Self::RateLimitExceeded(_) => ErrorKind::RateLimitExceeded,
            Self::Decode(_) => ErrorKind::Decode,
        }
    }

    /// Returns the detail message attached to this error.
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidTarget(message)
            | Self::RequestConstructionFailed(message)
            | Self::ConnectionFailed(message)
            | Self::NoResponse(message)
            | Self::RateLimitTimeout(message)
            | Self::RateLimitExceeded(message)
            | Self::Decode(message) => message,
        }
    }

    /// Maps a `reqwest` failure raised while sending onto an error kind.
    pub(crate) fn from_send(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::RequestConstructionFailed(err.to_string())
        } else {
            Self::ConnectionFailed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn kind_ignores_message_text() {
        let a = Error::ConnectionFailed("refused".to_owned());
        let b = Error::ConnectionFailed("reset by peer".to_owned());
        assert_eq!(a.kind(), b.kind());
        assert_ne!(a, b);
        assert_eq!(a.kind(), ErrorKind::ConnectionFailed);
    }

    #[test]
    fn display_includes_message() {
        let err = Error::RateLimitTimeout("waited 1s".to_owned());
        assert_eq!(err.to_string(), "rate limit timeout: waited 1s");
        assert_eq!(err.message(), "waited 1s");
    }
}
