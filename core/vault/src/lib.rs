//! Vault engine for GenPwd.
//!
//! This module provides:
//! - The immutable entry/group domain model
//! - An in-memory repository with a small search query language
//! - Session management with TTL, duress mode, and biometric gating
//! - The versioned encrypted `.gpdb` file format
//!
//! # Architecture
//! The vault module sits between the user interface and the crypto
//! layer; it owns the decrypted repository for the lifetime of one
//! unlock session and never hands out live references to its state.

pub mod io;
pub mod model;
pub mod query;
pub mod repository;
pub mod session;

pub use io::{
    export_to_buffer, import_from_buffer, read_metadata, verify_password, ExportOptions,
    ImportOutcome, VaultFileInfo, VaultPayload, FORMAT_TAG, FORMAT_VERSION,
};
pub use model::{
    CustomField, EntryKind, EntryMetadata, FieldKind, OtpAlgorithm, OtpConfig, Tag, VaultEntry,
    VaultGroup,
};
pub use query::{SearchFilter, SearchQuery};
pub use repository::{GroupNode, VaultRepository};
pub use session::{BiometricGate, SessionManager};
