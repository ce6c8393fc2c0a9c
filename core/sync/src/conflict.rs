//! Snapshot conflict resolution.
//!
//! Resolution is a pure decision over two immutable snapshots. The
//! resolver never mutates either side; the caller applies the
//! decision (persist, upload, or surface both for a manual merge).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use genpwd_vault::{VaultEntry, VaultPayload};

/// A decrypted vault state paired with its modification time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultSnapshot {
    pub payload: VaultPayload,
    pub modified_at: DateTime<Utc>,
}

/// How conflicting snapshots are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictStrategy {
    /// The strictly later `modifiedAt` wins; a tie keeps local.
    NewestWins,
    /// Surface both snapshots for a user-driven merge.
    Manual,
}

/// Per-entry pick for a manual merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryChoice {
    Local,
    Remote,
}

/// Outcome of resolving two snapshots.
#[derive(Debug, Clone)]
pub enum Resolution {
    UseLocal,
    UseRemote,
    /// Manual strategy: nothing decided yet, both sides go to the user.
    Pending,
    /// A merged snapshot built from per-entry choices.
    Merged(VaultSnapshot),
}

/// Decide between two snapshots.
///
/// `NewestWins` is deterministic: the same pair of timestamps always
/// yields the same decision, and equal timestamps keep local so a
/// no-op sync never rewrites anything.
pub fn resolve(
    local: &VaultSnapshot,
    remote: &VaultSnapshot,
    strategy: ConflictStrategy,
) -> Resolution {
    match strategy {
        ConflictStrategy::NewestWins => {
            if remote.modified_at > local.modified_at {
                debug!(
                    local = %local.modified_at,
                    remote = %remote.modified_at,
                    "Conflict resolved: remote is newer"
                );
                Resolution::UseRemote
            } else {
                Resolution::UseLocal
            }
        }
        ConflictStrategy::Manual => Resolution::Pending,
    }
}

/// Build a merged snapshot from per-entry picks.
///
/// Entries present on only one side are kept. Entries present on both
/// sides follow the choice for that id, defaulting to local. Groups,
/// tags, and metadata come from the newer snapshot since they have no
/// per-item choice surface. Neither input is modified.
pub fn merge_with_choices(
    local: &VaultSnapshot,
    remote: &VaultSnapshot,
    choices: &HashMap<String, EntryChoice>,
) -> Resolution {
    let remote_by_id: HashMap<&str, &VaultEntry> = remote
        .payload
        .entries
        .iter()
        .map(|e| (e.id.as_str(), e))
        .collect();

    let mut entries: Vec<VaultEntry> = Vec::new();
    for entry in &local.payload.entries {
        let picked = match (remote_by_id.get(entry.id.as_str()), choices.get(&entry.id)) {
            (Some(remote_entry), Some(EntryChoice::Remote)) => (*remote_entry).clone(),
            _ => entry.clone(),
        };
        entries.push(picked);
    }

    // Remote-only entries come after, preserving remote order
    for entry in &remote.payload.entries {
        if !local.payload.entries.iter().any(|e| e.id == entry.id) {
            entries.push(entry.clone());
        }
    }

    let newer = if remote.modified_at > local.modified_at {
        remote
    } else {
        local
    };

    Resolution::Merged(VaultSnapshot {
        payload: VaultPayload {
            metadata: newer.payload.metadata.clone(),
            entries,
            groups: newer.payload.groups.clone(),
            tags: newer.payload.tags.clone(),
        },
        modified_at: local.modified_at.max(remote.modified_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use genpwd_common::SecretString;
    use genpwd_vault::EntryKind;

    fn entry(id: &str, title: &str, secret: &str) -> VaultEntry {
        VaultEntry::new(title, EntryKind::Login)
            .unwrap()
            .with_id(id)
            .unwrap()
            .with_secret(SecretString::new(secret))
    }

    fn snapshot(entries: Vec<VaultEntry>, modified_at: DateTime<Utc>) -> VaultSnapshot {
        VaultSnapshot {
            payload: VaultPayload {
                metadata: serde_json::json!({}),
                entries,
                groups: vec![],
                tags: vec![],
            },
            modified_at,
        }
    }

    #[test]
    fn test_newest_wins_prefers_later_remote() {
        let now = Utc::now();
        let local = snapshot(vec![], now);
        let remote = snapshot(vec![], now + Duration::seconds(5));

        assert!(matches!(
            resolve(&local, &remote, ConflictStrategy::NewestWins),
            Resolution::UseRemote
        ));
    }

    #[test]
    fn test_newest_wins_prefers_later_local() {
        let now = Utc::now();
        let local = snapshot(vec![], now + Duration::seconds(5));
        let remote = snapshot(vec![], now);

        assert!(matches!(
            resolve(&local, &remote, ConflictStrategy::NewestWins),
            Resolution::UseLocal
        ));
    }

    #[test]
    fn test_tie_keeps_local() {
        let now = Utc::now();
        let local = snapshot(vec![], now);
        let remote = snapshot(vec![], now);

        assert!(matches!(
            resolve(&local, &remote, ConflictStrategy::NewestWins),
            Resolution::UseLocal
        ));
    }

    #[test]
    fn test_newest_wins_is_deterministic() {
        let now = Utc::now();
        let local = snapshot(vec![], now);
        let remote = snapshot(vec![], now + Duration::seconds(1));

        for _ in 0..10 {
            assert!(matches!(
                resolve(&local, &remote, ConflictStrategy::NewestWins),
                Resolution::UseRemote
            ));
        }
    }

    #[test]
    fn test_manual_strategy_is_pending() {
        let now = Utc::now();
        let local = snapshot(vec![], now);
        let remote = snapshot(vec![], now + Duration::seconds(5));

        assert!(matches!(
            resolve(&local, &remote, ConflictStrategy::Manual),
            Resolution::Pending
        ));
    }

    #[test]
    fn test_merge_with_choices_picks_per_entry() {
        let now = Utc::now();
        let local = snapshot(
            vec![entry("e1", "GitHub", "local-1"), entry("e2", "Mail", "local-2")],
            now,
        );
        let remote = snapshot(
            vec![
                entry("e1", "GitHub", "remote-1"),
                entry("e2", "Mail", "remote-2"),
                entry("e3", "Bank", "remote-3"),
            ],
            now + Duration::seconds(5),
        );

        let mut choices = HashMap::new();
        choices.insert("e1".to_string(), EntryChoice::Remote);
        choices.insert("e2".to_string(), EntryChoice::Local);

        let Resolution::Merged(merged) = merge_with_choices(&local, &remote, &choices) else {
            panic!("expected merged snapshot");
        };

        let secrets: Vec<&str> = merged
            .payload
            .entries
            .iter()
            .map(|e| e.current_secret().map(|s| s.expose()).unwrap_or(""))
            .collect();
        assert_eq!(secrets, vec!["remote-1", "local-2", "remote-3"]);
    }

    #[test]
    fn test_merge_defaults_to_local() {
        let now = Utc::now();
        let local = snapshot(vec![entry("e1", "GitHub", "local-1")], now);
        let remote = snapshot(vec![entry("e1", "GitHub", "remote-1")], now);

        let Resolution::Merged(merged) = merge_with_choices(&local, &remote, &HashMap::new())
        else {
            panic!("expected merged snapshot");
        };

        assert_eq!(
            merged.payload.entries[0].current_secret().map(|s| s.expose()),
            Some("local-1")
        );
    }

    #[test]
    fn test_merge_never_mutates_inputs() {
        let now = Utc::now();
        let local = snapshot(vec![entry("e1", "GitHub", "local-1")], now);
        let remote = snapshot(
            vec![entry("e1", "GitHub", "remote-1"), entry("e2", "Mail", "r2")],
            now + Duration::seconds(1),
        );
        let local_before = local.payload.entries.clone();
        let remote_before = remote.payload.entries.clone();

        let mut choices = HashMap::new();
        choices.insert("e1".to_string(), EntryChoice::Remote);
        let _ = merge_with_choices(&local, &remote, &choices);

        assert_eq!(local.payload.entries, local_before);
        assert_eq!(remote.payload.entries, remote_before);
    }
}
