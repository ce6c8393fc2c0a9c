//! Authenticated encryption using AES-256-GCM.
//!
//! AES-256-GCM provides both confidentiality and authenticity and is
//! the algorithm pinned by the vault file format. Associated data
//! binds ciphertexts to their context so they cannot be transplanted.

use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm,
};

use crate::keys::KEY_LENGTH;
use genpwd_common::{Error, Result};

/// Nonce size for AES-256-GCM (12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// An AEAD ciphertext split into its wire components.
///
/// The vault file format stores nonce, ciphertext, and tag as
/// separate base64 fields.
#[derive(Debug, Clone)]
pub struct DetachedCiphertext {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
}

fn cipher_for(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_LENGTH {
        return Err(Error::Crypto(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Ok(Aes256Gcm::new(GenericArray::from_slice(key)))
}

/// Encrypt plaintext using AES-256-GCM.
///
/// # Postconditions
/// - Returns nonce || ciphertext || tag
/// - The nonce is randomly generated
///
/// # Errors
/// - Returns `Crypto` if the key length is incorrect or encryption fails
pub fn encrypt(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Decrypt ciphertext produced by [`encrypt`].
///
/// # Preconditions
/// - Ciphertext format: nonce || encrypted_data || tag
///
/// # Errors
/// - Returns `Crypto` if the key length is incorrect
/// - Returns `Authentication` if the data is too short or the tag
///   does not verify (wrong key, tampered or truncated data)
pub fn decrypt(key: &[u8], data: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;

    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::Authentication);
    }

    let (nonce_bytes, encrypted) = data.split_at(NONCE_SIZE);
    let nonce = GenericArray::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, Payload { msg: encrypted, aad })
        .map_err(|_| Error::Authentication)
}

/// Encrypt plaintext and return the (nonce, ciphertext, tag) triple.
pub fn encrypt_detached(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<DetachedCiphertext> {
    let combined = encrypt(key, plaintext, aad)?;

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&combined[..NONCE_SIZE]);

    let body = &combined[NONCE_SIZE..];
    let split = body.len() - TAG_SIZE;
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&body[split..]);

    Ok(DetachedCiphertext {
        nonce,
        ciphertext: body[..split].to_vec(),
        tag,
    })
}

/// Decrypt a (nonce, ciphertext, tag) triple.
pub fn decrypt_detached(key: &[u8], parts: &DetachedCiphertext, aad: &[u8]) -> Result<Vec<u8>> {
    let mut combined =
        Vec::with_capacity(NONCE_SIZE + parts.ciphertext.len() + TAG_SIZE);
    combined.extend_from_slice(&parts.nonce);
    combined.extend_from_slice(&parts.ciphertext);
    combined.extend_from_slice(&parts.tag);

    decrypt(key, &combined, aad)
}
