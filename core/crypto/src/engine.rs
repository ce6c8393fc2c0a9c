//! The crypto engine wrapping the entry-level keyset.
//!
//! The keyset is never persisted or transmitted unencrypted: it is
//! wrapped under a passphrase-derived KEK in a versioned binary
//! envelope so future re-encryption schemes can be added without
//! breaking old envelopes.
//!
//! Envelope layout: `[version:1][nonce:12][ciphertext || tag]`.

use zeroize::Zeroizing;

use crate::aead;
use crate::keys::{Keyset, MasterKey, KEY_LENGTH};
use genpwd_common::{Error, Result};

/// Current keyset envelope version.
pub const ENVELOPE_VERSION: u8 = 1;

/// AEAD engine holding the entry-level keyset.
pub struct CryptoEngine {
    keyset: Keyset,
}

impl CryptoEngine {
    /// Create an engine with a fresh random keyset.
    pub fn generate() -> Self {
        Self {
            keyset: Keyset::generate(),
        }
    }

    /// Create an engine from an existing keyset.
    pub fn from_keyset(keyset: Keyset) -> Self {
        Self { keyset }
    }

    /// Encrypt a payload under the keyset.
    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        aead::encrypt(self.keyset.as_bytes(), plaintext, aad)
    }

    /// Decrypt a payload under the keyset.
    ///
    /// # Errors
    /// - Returns `Authentication` when the tag does not verify
    pub fn decrypt(&self, data: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        aead::decrypt(self.keyset.as_bytes(), data, aad)
    }

    /// Wrap the keyset under a KEK into the versioned envelope.
    ///
    /// # Postconditions
    /// - Output is `[version:1][nonce:12][ciphertext || tag]`
    /// - The keyset never appears unencrypted in the output
    pub fn to_encrypted_keyset(&self, kek: &MasterKey, aad: &[u8]) -> Result<Vec<u8>> {
        let sealed = aead::encrypt(kek.as_bytes(), self.keyset.as_bytes(), aad)?;

        let mut envelope = Vec::with_capacity(1 + sealed.len());
        envelope.push(ENVELOPE_VERSION);
        envelope.extend_from_slice(&sealed);
        Ok(envelope)
    }

    /// Unwrap a keyset envelope and build an engine around it.
    ///
    /// # Errors
    /// - Returns `Format` when the version byte is unsupported;
    ///   decryption is refused outright, no silent downgrade
    /// - Returns `Authentication` when the KEK is wrong or the
    ///   envelope is corrupted
    ///
    /// # Security
    /// - Intermediate plaintext keyset bytes are zeroized on both
    ///   success and failure paths
    pub fn from_encrypted_keyset(envelope: &[u8], kek: &MasterKey, aad: &[u8]) -> Result<Self> {
        let (&version, sealed) = envelope
            .split_first()
            .ok_or_else(|| Error::Format("Empty keyset envelope".to_string()))?;

        if version != ENVELOPE_VERSION {
            return Err(Error::Format(format!(
                "Unsupported keyset envelope version: {}",
                version
            )));
        }

        let plaintext = Zeroizing::new(aead::decrypt(kek.as_bytes(), sealed, aad)?);
        if plaintext.len() != KEY_LENGTH {
            return Err(Error::Authentication);
        }

        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&plaintext);
        Ok(Self {
            keyset: Keyset::from_bytes(key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kek(byte: u8) -> MasterKey {
        MasterKey::from_bytes([byte; KEY_LENGTH])
    }

    #[test]
    fn test_engine_encrypt_decrypt() {
        let engine = CryptoEngine::generate();

        let ciphertext = engine.encrypt(b"entry secret", b"entry-1").unwrap();
        let plaintext = engine.decrypt(&ciphertext, b"entry-1").unwrap();

        assert_eq!(plaintext, b"entry secret");
    }

    #[test]
    fn test_keyset_envelope_roundtrip() {
        let engine = CryptoEngine::generate();
        let ciphertext = engine.encrypt(b"payload", b"").unwrap();

        let envelope = engine.to_encrypted_keyset(&kek(1), b"keyset").unwrap();
        assert_eq!(envelope[0], ENVELOPE_VERSION);

        let restored = CryptoEngine::from_encrypted_keyset(&envelope, &kek(1), b"keyset").unwrap();
        let plaintext = restored.decrypt(&ciphertext, b"").unwrap();

        assert_eq!(plaintext, b"payload");
    }

    #[test]
    fn test_envelope_wrong_kek_fails() {
        let engine = CryptoEngine::generate();
        let envelope = engine.to_encrypted_keyset(&kek(1), b"").unwrap();

        let result = CryptoEngine::from_encrypted_keyset(&envelope, &kek(2), b"");
        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn test_envelope_unknown_version_refused() {
        let engine = CryptoEngine::generate();
        let mut envelope = engine.to_encrypted_keyset(&kek(1), b"").unwrap();
        envelope[0] = 99;

        // Unknown version is a format error, not an authentication error
        let result = CryptoEngine::from_encrypted_keyset(&envelope, &kek(1), b"");
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_empty_envelope_refused() {
        let result = CryptoEngine::from_encrypted_keyset(&[], &kek(1), b"");
        assert!(matches!(result, Err(Error::Format(_))));
    }
}
