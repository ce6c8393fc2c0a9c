//! Secret-holding types used throughout GenPwd.
//!
//! Secrets are owned, mutable-until-dropped buffers that zeroize
//! their memory on drop and never appear in Debug output.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// A secret string (password, OTP seed, secured field value).
///
/// Zeroizes on drop and serializes transparently so the wire format
/// sees a plain JSON string.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap an owned string as a secret.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret for immediate use.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Get the length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED; {} bytes])", self.0.len())
    }
}

/// Sensitive byte buffer that zeroizes on drop.
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([REDACTED; {} bytes])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_debug_redacted() {
        let secret = SecretString::new("hunter2");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_secret_string_serde_transparent() {
        let secret = SecretString::new("correct horse");
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, "\"correct horse\"");

        let back: SecretString = serde_json::from_str(&json).unwrap();
        assert_eq!(back.expose(), "correct horse");
    }

    #[test]
    fn test_secret_bytes_debug_redacted() {
        let secret = SecretBytes::new(vec![1, 2, 3]);
        let debug = format!("{:?}", secret);
        assert!(debug.contains("REDACTED"));
        assert!(debug.contains("3 bytes"));
    }
}
