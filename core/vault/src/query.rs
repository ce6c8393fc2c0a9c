//! The search query mini-language.
//!
//! Free text with embedded operators:
//! - `key:value` or `key:"quoted value"`: recognized keys are `tag`,
//!   `type`, `folder`/`group`, and `has` (`totp`/`2fa`, `notes`,
//!   `url`/`uri`, `fields`, `expired`)
//! - `-token`: excludes entries whose title/username/notes/uri
//!   contains the token
//! - remaining text matches title, username, notes, uri, tags, and
//!   non-secured custom field label+value as a case-insensitive
//!   substring; secured fields expose only their label
//!
//! All operator categories are AND-ed together.

use chrono::{DateTime, Utc};

use crate::model::{EntryKind, VaultEntry};

/// Structured filters AND-ed with the parsed query.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Entry must carry every listed tag.
    pub tags: Vec<String>,
    /// Entry must belong to this group.
    pub group_id: Option<String>,
    /// Entry must be of this kind.
    pub kind: Option<EntryKind>,
}

/// `has:` operator targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HasToken {
    Totp,
    Notes,
    Uri,
    Fields,
    Expired,
}

impl HasToken {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "totp" | "2fa" => Some(HasToken::Totp),
            "notes" => Some(HasToken::Notes),
            "url" | "uri" => Some(HasToken::Uri),
            "fields" => Some(HasToken::Fields),
            "expired" => Some(HasToken::Expired),
            _ => None,
        }
    }
}

/// A parsed search query.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    tags: Vec<String>,
    kinds: Vec<EntryKind>,
    folders: Vec<String>,
    has: Vec<HasToken>,
    exclusions: Vec<String>,
    terms: Vec<String>,
}

/// Split input into tokens, honoring double-quoted segments so that
/// `folder:"Personal Finance"` and `"two words"` stay single tokens.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in input.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

impl SearchQuery {
    /// Parse free text into a query.
    ///
    /// Unrecognized `key:value` pairs and unknown `has:`/`type:`
    /// values degrade to free-text terms rather than failing.
    pub fn parse(input: &str) -> Self {
        let mut query = Self::default();

        for token in tokenize(input) {
            if let Some(stripped) = token.strip_prefix('-') {
                if !stripped.is_empty() {
                    query.exclusions.push(stripped.to_lowercase());
                }
                continue;
            }

            let lowered = token.to_lowercase();
            if let Some((key, value)) = lowered.split_once(':') {
                if !value.is_empty() {
                    match key {
                        "tag" => {
                            query.tags.push(value.to_string());
                            continue;
                        }
                        "type" => {
                            if let Some(kind) = EntryKind::parse(value) {
                                query.kinds.push(kind);
                                continue;
                            }
                        }
                        "folder" | "group" => {
                            query.folders.push(value.to_string());
                            continue;
                        }
                        "has" => {
                            if let Some(has) = HasToken::parse(value) {
                                query.has.push(has);
                                continue;
                            }
                        }
                        _ => {}
                    }
                }
            }

            query.terms.push(lowered);
        }

        query
    }

    /// Whether the query has no criteria at all.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
            && self.kinds.is_empty()
            && self.folders.is_empty()
            && self.has.is_empty()
            && self.exclusions.is_empty()
            && self.terms.is_empty()
    }

    /// Test an entry against the query.
    ///
    /// `group_name` is the resolved name of the entry's group, used
    /// by the `folder:`/`group:` operators alongside the raw id.
    pub fn matches(&self, entry: &VaultEntry, group_name: Option<&str>, now: DateTime<Utc>) -> bool {
        let entry_tags: Vec<String> = entry.tags.iter().map(|t| t.to_lowercase()).collect();
        if !self.tags.iter().all(|t| entry_tags.iter().any(|e| e == t)) {
            return false;
        }

        if !self.kinds.iter().all(|k| entry.kind == *k) {
            return false;
        }

        if !self.folders.iter().all(|f| {
            group_name.map(|n| n.to_lowercase() == *f).unwrap_or(false)
                || entry.group_id.as_deref().map(|id| id.to_lowercase() == *f).unwrap_or(false)
        }) {
            return false;
        }

        if !self.has.iter().all(|h| match h {
            HasToken::Totp => entry.otp.is_some(),
            HasToken::Notes => !entry.notes.is_empty(),
            HasToken::Uri => !entry.uri.is_empty(),
            HasToken::Fields => !entry.fields.is_empty(),
            HasToken::Expired => entry.is_expired(now),
        }) {
            return false;
        }

        let excludable = [
            entry.title.to_lowercase(),
            entry.username.to_lowercase(),
            entry.notes.to_lowercase(),
            entry.uri.to_lowercase(),
        ];
        if self
            .exclusions
            .iter()
            .any(|x| excludable.iter().any(|field| field.contains(x)))
        {
            return false;
        }

        if self.terms.is_empty() {
            return true;
        }

        let mut haystack = excludable.join("\n");
        for tag in &entry_tags {
            haystack.push('\n');
            haystack.push_str(tag);
        }
        for field in &entry.fields {
            haystack.push('\n');
            haystack.push_str(&field.label.to_lowercase());
            // Secured fields expose only their label to search
            if !field.secured {
                haystack.push('\n');
                haystack.push_str(&field.value.expose().to_lowercase());
            }
        }

        self.terms.iter().all(|term| haystack.contains(term))
    }
}

/// Test an entry against structured filters.
pub(crate) fn filter_matches(entry: &VaultEntry, filter: &SearchFilter) -> bool {
    if !filter.tags.iter().all(|t| {
        entry
            .tags
            .iter()
            .any(|e| e.eq_ignore_ascii_case(t))
    }) {
        return false;
    }

    if let Some(group_id) = &filter.group_id {
        if entry.group_id.as_deref() != Some(group_id.as_str()) {
            return false;
        }
    }

    if let Some(kind) = filter.kind {
        if entry.kind != kind {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CustomField, FieldKind, OtpAlgorithm, OtpConfig};
    use genpwd_common::SecretString;

    fn entry(title: &str) -> VaultEntry {
        VaultEntry::new(title, EntryKind::Login).unwrap()
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(
            tokenize(r#"folder:"Personal Finance" -bank github"#),
            vec!["folder:Personal Finance", "-bank", "github"]
        );
    }

    #[test]
    fn test_tag_operator() {
        let query = SearchQuery::parse("tag:dev");
        let github = entry("GitHub").with_tags(["dev"]);
        let bank = entry("Bank").with_tags(["finance"]);

        let now = Utc::now();
        assert!(query.matches(&github, None, now));
        assert!(!query.matches(&bank, None, now));
    }

    #[test]
    fn test_multiple_tags_are_anded() {
        let query = SearchQuery::parse("tag:dev tag:work");
        let both = entry("A").with_tags(["dev", "work"]);
        let one = entry("B").with_tags(["dev"]);

        let now = Utc::now();
        assert!(query.matches(&both, None, now));
        assert!(!query.matches(&one, None, now));
    }

    #[test]
    fn test_exclusion() {
        let query = SearchQuery::parse("-bank");
        let now = Utc::now();

        assert!(!query.matches(&entry("Bank"), None, now));
        assert!(!query.matches(&entry("X").with_notes("my bank notes"), None, now));
        assert!(query.matches(&entry("GitHub"), None, now));
    }

    #[test]
    fn test_has_totp() {
        let query = SearchQuery::parse("has:totp");
        let with_otp = entry("GitHub").with_otp(OtpConfig {
            algorithm: OtpAlgorithm::Sha1,
            digits: 6,
            period: 30,
            secret: SecretString::new("JBSWY3DP"),
        });

        let now = Utc::now();
        assert!(query.matches(&with_otp, None, now));
        assert!(!query.matches(&entry("Bank"), None, now));

        // 2fa is an alias
        let alias = SearchQuery::parse("has:2fa");
        assert!(alias.matches(&with_otp, None, now));
    }

    #[test]
    fn test_has_expired() {
        let now = Utc::now();
        let query = SearchQuery::parse("has:expired");

        let expired = entry("Old").with_expiry(now - chrono::Duration::days(2));
        assert!(query.matches(&expired, None, now));
        assert!(!query.matches(&entry("New"), None, now));
    }

    #[test]
    fn test_folder_operator_matches_group_name() {
        let query = SearchQuery::parse("folder:work");
        let e = entry("GitHub").with_group("g1");

        let now = Utc::now();
        assert!(query.matches(&e, Some("Work"), now));
        assert!(!query.matches(&e, Some("Personal"), now));

        // group: is an alias and the raw id also matches
        let by_id = SearchQuery::parse("group:g1");
        assert!(by_id.matches(&e, Some("Work"), now));
    }

    #[test]
    fn test_free_text_matches_fields_but_not_secured_values() {
        let e = entry("Router").with_fields(vec![
            CustomField {
                label: "Admin URL".to_string(),
                value: SecretString::new("http://192.168.1.1"),
                kind: FieldKind::Url,
                secured: false,
            },
            CustomField {
                label: "WiFi Password".to_string(),
                value: SecretString::new("sup3rs3cret"),
                kind: FieldKind::Text,
                secured: true,
            },
        ]);

        let now = Utc::now();
        assert!(SearchQuery::parse("192.168").matches(&e, None, now));
        // Secured value is invisible to search
        assert!(!SearchQuery::parse("sup3rs3cret").matches(&e, None, now));
        // But its label is searchable
        assert!(SearchQuery::parse("wifi").matches(&e, None, now));
    }

    #[test]
    fn test_quoted_value() {
        let query = SearchQuery::parse(r#"folder:"Personal Finance""#);
        let e = entry("Bank").with_group("g2");

        let now = Utc::now();
        assert!(query.matches(&e, Some("Personal Finance"), now));
        assert!(!query.matches(&e, Some("Work"), now));
    }

    #[test]
    fn test_unknown_operator_degrades_to_free_text() {
        let query = SearchQuery::parse("site:github");
        let e = entry("X").with_notes("see site:github for details");

        let now = Utc::now();
        assert!(query.matches(&e, None, now));
        assert!(!query.matches(&entry("Y"), None, now));
    }

    #[test]
    fn test_type_operator() {
        let query = SearchQuery::parse("type:note");
        let note = VaultEntry::new("Memo", EntryKind::Note).unwrap();

        let now = Utc::now();
        assert!(query.matches(&note, None, now));
        assert!(!query.matches(&entry("Login"), None, now));
    }
}
