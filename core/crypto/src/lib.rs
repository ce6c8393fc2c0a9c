//! Cryptographic primitives for GenPwd.
//!
//! This module provides:
//! - Key derivation using Argon2id
//! - Authenticated encryption using AES-256-GCM
//! - Secure key management with automatic zeroization
//! - The versioned keyset envelope used to wrap the entry-level
//!   keyset under a password-derived key-encryption-key
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Constant-time operations for sensitive comparisons

pub mod aead;
pub mod engine;
pub mod kdf;
pub mod keys;

pub use aead::{decrypt, decrypt_detached, encrypt, encrypt_detached, DetachedCiphertext};
pub use engine::{CryptoEngine, ENVELOPE_VERSION};
pub use kdf::{derive_key, verify_derived, KdfAlgorithm, KdfOverrides, KdfParams};
pub use keys::{Keyset, MasterKey, Salt, KEY_LENGTH};
