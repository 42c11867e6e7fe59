//! Image identity and source locators.

use std::path::PathBuf;

use crate::domain::errors::LoadError;

/// Unique identifier for a gallery image.
/// Generated from a hash of the locator string, so it is stable across positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub String);

impl ImageId {
    /// Creates a new `ImageId` from any string-like input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates an `ImageId` from a locator string by hashing it.
    #[must_use]
    pub fn from_locator(locator: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(locator.as_bytes());
        let result = hasher.finalize();
        Self(hex::encode(&result[..16]))
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ImageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ImageId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Where the bytes of an image live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorScheme {
    /// `http` or `https` URL.
    Remote(String),
    /// Local file, from a `file://` URL or a bare path.
    File(PathBuf),
}

/// Source locator of an image: a URL or a file path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(String);

impl Locator {
    /// Wraps a raw locator string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw locator string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity derived from this locator.
    #[must_use]
    pub fn identity(&self) -> ImageId {
        ImageId::from_locator(&self.0)
    }

    /// Resolves the scheme of this locator.
    ///
    /// # Errors
    /// Returns `LoadError::InvalidLocator` for empty locators and unsupported schemes.
    pub fn scheme(&self) -> Result<LocatorScheme, LoadError> {
        let raw = self.0.trim();
        if raw.is_empty() {
            return Err(LoadError::invalid_locator(&self.0));
        }

        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(LocatorScheme::Remote(raw.to_string()));
        }
        if lower.starts_with("file://") {
            let path = &raw["file://".len()..];
            if path.is_empty() {
                return Err(LoadError::invalid_locator(&self.0));
            }
            return Ok(LocatorScheme::File(PathBuf::from(path)));
        }
        if raw.contains("://") {
            return Err(LoadError::invalid_locator(&self.0));
        }

        Ok(LocatorScheme::File(PathBuf::from(raw)))
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Locator {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
