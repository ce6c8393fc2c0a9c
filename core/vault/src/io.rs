//! The versioned encrypted vault file format (`.gpdb`).
//!
//! A vault file is a JSON envelope: format tag, integer version,
//! timestamps, a `kdf` block (algorithm, work factors, salt), and an
//! `encrypted` block (AES-256-GCM nonce/ciphertext/tag, base64).
//! The decrypted payload is `{ metadata, entries[], groups[], tags[] }`.
//!
//! Version 1 files are refused with a needs-migration error; the
//! migration is a documented external step, never attempted inline.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use genpwd_common::{Error, Result};
use genpwd_crypto::{
    aead::{decrypt_detached, encrypt_detached, DetachedCiphertext, NONCE_SIZE, TAG_SIZE},
    derive_key, KdfAlgorithm, KdfOverrides, KdfParams, Salt,
};

use crate::model::{EntryKind, Tag, VaultEntry, VaultGroup};

/// Format tag of the vault file.
pub const FORMAT_TAG: &str = "gpdb";

/// Current vault file version.
pub const FORMAT_VERSION: u32 = 2;

/// Associated data binding the ciphertext to the file envelope.
const FILE_AAD: &[u8] = b"gpdb.v2";

/// Wire name of the AEAD algorithm pinned by version 2.
const AEAD_ALGORITHM: &str = "AES-256-GCM";

/// The decrypted vault payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultPayload {
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub entries: Vec<VaultEntry>,
    pub groups: Vec<VaultGroup>,
    pub tags: Vec<Tag>,
}

/// Lenient mirror of [`VaultPayload`] used on import so a single
/// malformed entry does not abort the whole read.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPayload {
    #[serde(default)]
    metadata: serde_json::Value,
    #[serde(default)]
    entries: Vec<serde_json::Value>,
    #[serde(default)]
    groups: Vec<VaultGroup>,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KdfBlock {
    algorithm: String,
    iterations: u32,
    #[serde(default = "default_memory_kb")]
    memory_kb: u32,
    #[serde(default = "default_parallelism")]
    parallelism: u32,
    /// Digest family of the KDF; informational (Argon2id hashes
    /// internally with BLAKE2b).
    hash: String,
    salt: String,
}

fn default_memory_kb() -> u32 {
    KdfParams::DEFAULT_MEMORY_KB
}

fn default_parallelism() -> u32 {
    KdfParams::DEFAULT_PARALLELISM
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncryptedBlock {
    algorithm: String,
    nonce: String,
    ciphertext: String,
    tag: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VaultFile {
    format: String,
    version: u32,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    kdf: KdfBlock,
    encrypted: EncryptedBlock,
}

/// Leading fields readable regardless of version.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileHeader {
    format: String,
    version: u32,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    modified_at: Option<DateTime<Utc>>,
}

/// Explicit export configuration.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// KDF work-factor overrides; a fresh salt is always generated.
    pub kdf: KdfOverrides,
    /// File creation timestamp to preserve across re-exports.
    pub created_at: Option<DateTime<Utc>>,
}

/// Result of an import: the payload plus per-entry failures that were
/// retained as marker entries instead of aborting the read.
#[derive(Debug)]
pub struct ImportOutcome {
    pub payload: VaultPayload,
    pub entry_errors: Vec<String>,
}

/// File facts readable without decryption.
#[derive(Debug, Clone)]
pub struct VaultFileInfo {
    pub format: String,
    pub version: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub kdf_algorithm: Option<String>,
    pub kdf_iterations: Option<u32>,
}

fn parse_header(data: &[u8]) -> Result<FileHeader> {
    let header: FileHeader = serde_json::from_slice(data)
        .map_err(|_| Error::Format("Not a gpdb vault file".to_string()))?;
    if header.format != FORMAT_TAG {
        return Err(Error::Format(format!(
            "Unknown format tag: {}",
            header.format
        )));
    }
    Ok(header)
}

fn check_version(version: u32) -> Result<()> {
    match version {
        FORMAT_VERSION => Ok(()),
        1 => Err(Error::NeedsMigration(1)),
        other => Err(Error::Format(format!(
            "Unsupported vault file version: {}",
            other
        ))),
    }
}

fn kdf_params_from_block(block: &KdfBlock) -> Result<KdfParams> {
    let algorithm = KdfAlgorithm::parse(&block.algorithm)?;

    let salt_bytes = BASE64
        .decode(&block.salt)
        .map_err(|_| Error::Format("Invalid salt encoding".to_string()))?;
    let salt: [u8; 32] = salt_bytes
        .try_into()
        .map_err(|_| Error::Format("Invalid salt length".to_string()))?;

    KdfParams::new(
        algorithm,
        block.memory_kb,
        block.iterations,
        block.parallelism,
        Salt::from_bytes(salt),
    )
}

fn encrypted_block_to_parts(block: &EncryptedBlock) -> Result<DetachedCiphertext> {
    if block.algorithm != AEAD_ALGORITHM {
        return Err(Error::Format(format!(
            "Unsupported encryption algorithm: {}",
            block.algorithm
        )));
    }

    let decode = |label: &str, field: &str| -> Result<Vec<u8>> {
        BASE64
            .decode(field)
            .map_err(|_| Error::Format(format!("Invalid {} encoding", label)))
    };

    let nonce: [u8; NONCE_SIZE] = decode("nonce", &block.nonce)?
        .try_into()
        .map_err(|_| Error::Format("Invalid nonce length".to_string()))?;
    let tag: [u8; TAG_SIZE] = decode("tag", &block.tag)?
        .try_into()
        .map_err(|_| Error::Format("Invalid tag length".to_string()))?;

    Ok(DetachedCiphertext {
        nonce,
        ciphertext: decode("ciphertext", &block.ciphertext)?,
        tag,
    })
}

/// Decrypt the payload bytes of a parsed vault file.
fn decrypt_file(file: &VaultFile, password: &str) -> Result<Zeroizing<Vec<u8>>> {
    let params = kdf_params_from_block(&file.kdf)?;
    let key = derive_key(password.as_bytes(), &params)?;
    let parts = encrypted_block_to_parts(&file.encrypted)?;
    Ok(Zeroizing::new(decrypt_detached(
        key.as_bytes(),
        &parts,
        FILE_AAD,
    )?))
}

/// Serialize and encrypt a payload into a `.gpdb` buffer.
///
/// A fresh random salt is generated for every export, so two exports
/// of the same vault never share a KEK.
///
/// # Errors
/// - `Validation` if the password is empty or KDF overrides are invalid
pub fn export_to_buffer(
    payload: &VaultPayload,
    password: &str,
    options: &ExportOptions,
) -> Result<Vec<u8>> {
    let params = KdfParams::generate(options.kdf.clone())?;
    let key = derive_key(password.as_bytes(), &params)?;

    let plaintext = Zeroizing::new(
        serde_json::to_vec(payload).map_err(|e| Error::Serialization(e.to_string()))?,
    );
    let parts = encrypt_detached(key.as_bytes(), &plaintext, FILE_AAD)?;

    let now = Utc::now();
    let file = VaultFile {
        format: FORMAT_TAG.to_string(),
        version: FORMAT_VERSION,
        created_at: options.created_at.unwrap_or(now),
        modified_at: now,
        kdf: KdfBlock {
            algorithm: params.algorithm.as_str().to_string(),
            iterations: params.iterations,
            memory_kb: params.memory_kb,
            parallelism: params.parallelism,
            hash: "blake2b".to_string(),
            salt: BASE64.encode(params.salt.as_bytes()),
        },
        encrypted: EncryptedBlock {
            algorithm: AEAD_ALGORITHM.to_string(),
            nonce: BASE64.encode(parts.nonce),
            ciphertext: BASE64.encode(&parts.ciphertext),
            tag: BASE64.encode(parts.tag),
        },
    };

    info!(
        entries = payload.entries.len(),
        groups = payload.groups.len(),
        "Vault exported"
    );
    serde_json::to_vec(&file).map_err(|e| Error::Serialization(e.to_string()))
}

/// Build a placeholder for an entry that failed to reconstruct.
fn stub_entry(raw: &serde_json::Value, reason: &str) -> Result<VaultEntry> {
    let title = raw
        .get("title")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("(unreadable entry)");

    let mut entry = VaultEntry::new(title, EntryKind::Login)?;
    if let Some(id) = raw
        .get("id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
    {
        entry = entry.with_id(id)?;
    }
    entry.deserialize_error = Some(reason.to_string());
    Ok(entry)
}

/// Decrypt and deserialize a `.gpdb` buffer.
///
/// # Errors
/// - `Format` for an unknown format tag or version
/// - `NeedsMigration` for version-1 files
/// - `Authentication` for a wrong password or corrupted ciphertext
///
/// A malformed individual entry does not abort the import: it is
/// retained as a stub carrying a `_deserializeError` marker and
/// reported in [`ImportOutcome::entry_errors`].
pub fn import_from_buffer(data: &[u8], password: &str) -> Result<ImportOutcome> {
    let header = parse_header(data)?;
    check_version(header.version)?;

    let file: VaultFile = serde_json::from_slice(data)
        .map_err(|e| Error::Format(format!("Malformed vault file: {}", e)))?;

    let plaintext = decrypt_file(&file, password)?;
    let raw: RawPayload = serde_json::from_slice(&plaintext)
        .map_err(|e| Error::Serialization(format!("Malformed vault payload: {}", e)))?;

    let mut entries = Vec::with_capacity(raw.entries.len());
    let mut entry_errors = Vec::new();
    for (index, value) in raw.entries.into_iter().enumerate() {
        match serde_json::from_value::<VaultEntry>(value.clone()) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                let reason = e.to_string();
                warn!(index, error = %reason, "Entry failed to reconstruct, kept as stub");
                entries.push(stub_entry(&value, &reason)?);
                entry_errors.push(format!("entry {}: {}", index, reason));
            }
        }
    }

    debug!(
        entries = entries.len(),
        failed = entry_errors.len(),
        "Vault imported"
    );
    Ok(ImportOutcome {
        payload: VaultPayload {
            metadata: raw.metadata,
            entries,
            groups: raw.groups,
            tags: raw.tags,
        },
        entry_errors,
    })
}

/// Check a password against a vault file without returning plaintext.
pub fn verify_password(data: &[u8], password: &str) -> Result<bool> {
    let header = parse_header(data)?;
    check_version(header.version)?;

    let file: VaultFile = serde_json::from_slice(data)
        .map_err(|e| Error::Format(format!("Malformed vault file: {}", e)))?;

    match decrypt_file(&file, password) {
        Ok(_) => Ok(true),
        Err(Error::Authentication) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Read format, version, and timestamps without decrypting.
pub fn read_metadata(data: &[u8]) -> Result<VaultFileInfo> {
    let header = parse_header(data)?;

    // KDF details are best-effort: older versions may shape the
    // block differently.
    let file: Option<VaultFile> = serde_json::from_slice(data).ok();

    Ok(VaultFileInfo {
        format: header.format,
        version: header.version,
        created_at: header.created_at,
        modified_at: header.modified_at,
        kdf_algorithm: file.as_ref().map(|f| f.kdf.algorithm.clone()),
        kdf_iterations: file.as_ref().map(|f| f.kdf.iterations),
    })
}
