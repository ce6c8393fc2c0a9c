//! Immutable domain model for vault entries and groups.
//!
//! Entries and groups are value types: once constructed they are not
//! patched in place, a mutation produces a new instance. Secret
//! fields zeroize on drop. Wire names are camelCase to match the
//! `.gpdb` payload schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use genpwd_common::{Error, Result, SecretString};

/// Kind of vault entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    Login,
    Note,
    Card,
    Identity,
}

impl EntryKind {
    /// Parse a query-language token into a kind.
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "login" => Some(EntryKind::Login),
            "note" => Some(EntryKind::Note),
            "card" => Some(EntryKind::Card),
            "identity" => Some(EntryKind::Identity),
            _ => None,
        }
    }
}

/// Hash algorithm for TOTP generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OtpAlgorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

/// TOTP configuration attached to an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpConfig {
    #[serde(default)]
    pub algorithm: OtpAlgorithm,
    pub digits: u8,
    pub period: u32,
    pub secret: SecretString,
}

/// Kind of a custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Url,
    Email,
    Number,
}

/// A user-defined field on an entry.
///
/// Secured fields expose only their label to search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomField {
    pub label: String,
    pub value: SecretString,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(rename = "isSecured", default)]
    pub secured: bool,
}

/// Bookkeeping timestamps and counters for an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage_count: u64,
}

impl Default for EntryMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            modified_at: now,
            last_used_at: None,
            expires_at: None,
            usage_count: 0,
        }
    }
}

/// A single vault entry (login, note, card, identity).
///
/// # Invariants
/// - `id` and `title` are non-empty
/// - Instances are immutable: the `with_*` builders return a new value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultEntry {
    pub id: String,
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: EntryKind,
    #[serde(default)]
    pub username: String,
    /// Ordered credential history; the current secret is first.
    #[serde(default)]
    pub secret: Vec<SecretString>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(rename = "otpConfig", default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<OtpConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default)]
    pub fields: Vec<CustomField>,
    #[serde(default)]
    pub metadata: EntryMetadata,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Set on import when the stored entry could not be reconstructed.
    #[serde(
        rename = "_deserializeError",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub deserialize_error: Option<String>,
}

impl VaultEntry {
    /// Create a new entry with a generated id.
    ///
    /// # Errors
    /// - Returns `Validation` if the title is empty
    pub fn new(title: impl Into<String>, kind: EntryKind) -> Result<Self> {
        let title = title.into();
        if title.is_empty() {
            return Err(Error::Validation("Entry title cannot be empty".to_string()));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            title,
            kind,
            username: String::new(),
            secret: Vec::new(),
            notes: String::new(),
            uri: String::new(),
            tags: BTreeSet::new(),
            otp: None,
            group_id: None,
            fields: Vec::new(),
            metadata: EntryMetadata::default(),
            favorite: false,
            color: None,
            icon: None,
            deserialize_error: None,
        })
    }

    /// Replace the id.
    ///
    /// # Errors
    /// - Returns `Validation` if the id is empty
    pub fn with_id(mut self, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::Validation("Entry id cannot be empty".to_string()));
        }
        self.id = id;
        Ok(self)
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_secret(mut self, secret: SecretString) -> Self {
        self.secret = vec![secret];
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_otp(mut self, otp: OtpConfig) -> Self {
        self.otp = Some(otp);
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_fields(mut self, fields: Vec<CustomField>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.metadata.expires_at = Some(expires_at);
        self
    }

    pub fn with_favorite(mut self, favorite: bool) -> Self {
        self.favorite = favorite;
        self
    }

    /// The current secret, if any.
    pub fn current_secret(&self) -> Option<&SecretString> {
        self.secret.first()
    }

    /// Whether the entry has passed its expiry timestamp.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.metadata.expires_at.map(|t| t < now).unwrap_or(false)
    }
}

/// A folder in the vault group tree.
///
/// # Invariants
/// - `id` and `name` are non-empty
/// - No group may be its own ancestor (enforced by the repository)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultGroup {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl VaultGroup {
    /// Create a new group with a generated id.
    ///
    /// # Errors
    /// - Returns `Validation` if the name is empty
    pub fn new(name: impl Into<String>, parent_id: Option<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Validation("Group name cannot be empty".to_string()));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            parent_id,
        })
    }

    /// Replace the id.
    ///
    /// # Errors
    /// - Returns `Validation` if the id is empty
    pub fn with_id(mut self, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::Validation("Group id cannot be empty".to_string()));
        }
        self.id = id;
        Ok(self)
    }

    /// Rename, producing a new instance.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reparent, producing a new instance. The repository validates
    /// the cycle invariant on apply.
    pub fn with_parent(mut self, parent_id: Option<String>) -> Self {
        self.parent_id = parent_id;
        self
    }
}

/// A tag definition carried through the file payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}
