//! Key derivation using Argon2id.
//!
//! Argon2id is a memory-hard password hashing function that provides
//! resistance to both GPU and time-memory trade-off attacks.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::keys::{MasterKey, Salt, KEY_LENGTH};
use genpwd_common::{Error, Result};

/// Supported key derivation algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfAlgorithm {
    Argon2id,
}

impl KdfAlgorithm {
    /// Wire name of the algorithm as stored in the vault file.
    pub fn as_str(&self) -> &'static str {
        match self {
            KdfAlgorithm::Argon2id => "argon2id",
        }
    }

    /// Parse the wire name back into an algorithm.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "argon2id" => Ok(KdfAlgorithm::Argon2id),
            other => Err(Error::Format(format!("Unknown KDF algorithm: {}", other))),
        }
    }
}

/// Parameters for key derivation.
///
/// The salt is part of the parameters: identical passphrase and
/// params always yield identical key bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    /// Derivation algorithm.
    pub algorithm: KdfAlgorithm,
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_kb: u32,
    /// Number of iterations.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
    /// Per-vault random salt.
    pub salt: Salt,
}

/// Explicit overrides for [`KdfParams::generate`].
///
/// Every recognized field is enumerated here; unset fields fall back
/// to the safe defaults.
#[derive(Debug, Clone, Default)]
pub struct KdfOverrides {
    pub memory_kb: Option<u32>,
    pub iterations: Option<u32>,
    pub parallelism: Option<u32>,
}

impl KdfParams {
    /// Default memory cost: 64 MiB.
    pub const DEFAULT_MEMORY_KB: u32 = 65536;
    /// Default iteration count.
    pub const DEFAULT_ITERATIONS: u32 = 3;
    /// Default parallelism.
    pub const DEFAULT_PARALLELISM: u32 = 4;

    /// Create parameters from explicit values.
    ///
    /// # Errors
    /// - Returns `Validation` if any numeric field is zero. The check
    ///   runs before any CPU-heavy work is attempted.
    pub fn new(
        algorithm: KdfAlgorithm,
        memory_kb: u32,
        iterations: u32,
        parallelism: u32,
        salt: Salt,
    ) -> Result<Self> {
        if memory_kb == 0 {
            return Err(Error::Validation("KDF memory cost must be > 0".to_string()));
        }
        if iterations == 0 {
            return Err(Error::Validation("KDF iterations must be > 0".to_string()));
        }
        if parallelism == 0 {
            return Err(Error::Validation("KDF parallelism must be > 0".to_string()));
        }

        Ok(Self {
            algorithm,
            memory_kb,
            iterations,
            parallelism,
            salt,
        })
    }

    /// Create parameters with a fresh random salt and safe defaults
    /// for any work factor not overridden.
    pub fn generate(overrides: KdfOverrides) -> Result<Self> {
        Self::new(
            KdfAlgorithm::Argon2id,
            overrides.memory_kb.unwrap_or(Self::DEFAULT_MEMORY_KB),
            overrides.iterations.unwrap_or(Self::DEFAULT_ITERATIONS),
            overrides.parallelism.unwrap_or(Self::DEFAULT_PARALLELISM),
            Salt::generate(),
        )
    }

    /// Moderate parameters for mobile devices.
    pub fn moderate() -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            memory_kb: 32768, // 32 MiB
            iterations: 3,
            parallelism: 2,
            salt: Salt::generate(),
        }
    }
}

/// Derive a master key from a passphrase using Argon2id.
///
/// # Preconditions
/// - `passphrase` must not be empty
/// - `params` must have valid work factors
///
/// # Postconditions
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - Returns `Validation` if the passphrase is empty
/// - Returns `Crypto` if the Argon2id parameters are rejected
///
/// # Security
/// - The passphrase is not stored or logged
pub fn derive_key(passphrase: &[u8], params: &KdfParams) -> Result<MasterKey> {
    if passphrase.is_empty() {
        return Err(Error::Validation("Passphrase cannot be empty".to_string()));
    }

    let argon2_params = Params::new(
        params.memory_kb,
        params.iterations,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(passphrase, params.salt.as_bytes(), &mut key_bytes)
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(MasterKey::from_bytes(key_bytes))
}

/// Verify that a passphrase derives the expected key.
///
/// The comparison is constant-time to prevent timing attacks.
pub fn verify_derived(
    passphrase: &[u8],
    params: &KdfParams,
    expected: &MasterKey,
) -> Result<bool> {
    let derived = derive_key(passphrase, params)?;
    Ok(derived.as_bytes().ct_eq(expected.as_bytes()).into())
}
