//! Image acquisition error types.

use thiserror::Error;

/// Result type for image acquisition.
pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Errors raised while fetching, decoding or producing images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum LoadError {
    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("decode error: {message}")]
    Decode { message: String },

    #[error("invalid locator: {locator}")]
    InvalidLocator { locator: String },

    #[error("unknown thumbnail format: {name}")]
    UnknownFormat { name: String },

    #[error("thumbnail production failed: {0}")]
    CacheProductionFailed(Box<LoadError>),
}

impl LoadError {
    /// Creates transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates invalid locator error.
    #[must_use]
    pub fn invalid_locator(locator: impl Into<String>) -> Self {
        Self::InvalidLocator {
            locator: locator.into(),
        }
    }

    /// Creates unknown format error.
    #[must_use]
    pub fn unknown_format(name: impl Into<String>) -> Self {
        Self::UnknownFormat { name: name.into() }
    }

    /// Wraps a source failure for delivery to thumbnail waiters.
    #[must_use]
    pub fn production_failed(cause: Self) -> Self {
        match cause {
            Self::CacheProductionFailed(_) => cause,
            other => Self::CacheProductionFailed(Box::new(other)),
        }
    }

    /// Returns the underlying cause, unwrapping production failures.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::CacheProductionFailed(inner) => inner.root_cause(),
            other => other,
        }
    }

    /// Returns whether the error came from the transport layer.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::Transport { .. } | Self::InvalidLocator { .. }
        )
    }

    /// Returns whether the bytes could not be decoded.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self.root_cause(), Self::Decode { .. })
    }
}
