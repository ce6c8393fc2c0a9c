//! Vault-wide health scoring.
//!
//! The score starts at 100 and subtracts capped penalties for weak,
//! reused, stale, and empty passwords, then adds back small bonuses
//! for 2FA coverage and high average entropy. Reuse detection groups
//! entries by a BLAKE2b hash of the secret so two plaintexts are
//! never compared side by side.

use std::collections::HashMap;

use blake2::{Blake2b512, Digest};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use genpwd_vault::VaultEntry;

use crate::strength::{analyze_password, StrengthBucket};

/// Days without a secret change after which an entry counts as stale.
pub const STALE_AFTER_DAYS: i64 = 180;

/// Vault-wide audit summary.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    /// Final score, clamped to [0, 100].
    pub score: u8,
    pub total: usize,
    /// Entries whose secret bucketed critical or weak.
    pub weak: usize,
    /// Groups of two or more entries sharing one secret.
    pub reused_groups: usize,
    /// Entries whose secret has not changed in [`STALE_AFTER_DAYS`].
    pub stale: usize,
    /// Entries with no secret at all.
    pub empty: usize,
    /// Entries carrying a TOTP configuration.
    pub with_totp: usize,
    /// Mean adjusted entropy of non-empty secrets, in bits.
    pub average_entropy: f64,
}

fn secret_fingerprint(secret: &str) -> Vec<u8> {
    let mut hasher = Blake2b512::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

/// Score a set of entries.
pub fn vault_health(entries: &[VaultEntry], now: DateTime<Utc>) -> HealthReport {
    let total = entries.len();
    let stale_cutoff = now - Duration::days(STALE_AFTER_DAYS);

    let mut weak = 0usize;
    let mut stale = 0usize;
    let mut empty = 0usize;
    let mut with_totp = 0usize;
    let mut entropy_sum = 0.0f64;
    let mut scored = 0usize;
    let mut fingerprints: HashMap<Vec<u8>, usize> = HashMap::new();

    for entry in entries {
        if entry.otp.is_some() {
            with_totp += 1;
        }

        let secret = entry.current_secret().map(|s| s.expose()).unwrap_or("");
        if secret.is_empty() {
            empty += 1;
            continue;
        }

        let analysis = analyze_password(secret);
        if analysis.bucket <= StrengthBucket::Weak {
            weak += 1;
        }
        entropy_sum += analysis.entropy;
        scored += 1;

        *fingerprints.entry(secret_fingerprint(secret)).or_insert(0) += 1;

        if entry.metadata.modified_at < stale_cutoff {
            stale += 1;
        }
    }

    let reused_groups = fingerprints.values().filter(|&&count| count >= 2).count();
    let average_entropy = if scored > 0 {
        entropy_sum / scored as f64
    } else {
        0.0
    };

    let mut score: i64 = 100;
    score -= (5 * weak as i64).min(40);
    score -= (10 * reused_groups as i64).min(30);
    score -= (2 * stale as i64).min(20);
    score -= (3 * empty as i64).min(15);

    if total > 0 {
        let totp_bonus = (10.0 * with_totp as f64 / total as f64).round() as i64;
        score += totp_bonus.min(10);
    }
    let entropy_bonus = (5.0 * average_entropy / 80.0).round() as i64;
    score += entropy_bonus.min(5);

    let score = score.clamp(0, 100) as u8;
    debug!(score, total, weak, reused_groups, stale, empty, "Vault health computed");

    HealthReport {
        score,
        total,
        weak,
        reused_groups,
        stale,
        empty,
        with_totp,
        average_entropy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genpwd_common::SecretString;
    use genpwd_vault::{EntryKind, OtpAlgorithm, OtpConfig};

    fn entry(title: &str, secret: &str) -> VaultEntry {
        let e = VaultEntry::new(title, EntryKind::Login).unwrap();
        if secret.is_empty() {
            e
        } else {
            e.with_secret(SecretString::new(secret))
        }
    }

    fn totp() -> OtpConfig {
        OtpConfig {
            algorithm: OtpAlgorithm::Sha1,
            digits: 6,
            period: 30,
            secret: SecretString::new("JBSWY3DP"),
        }
    }

    #[test]
    fn test_empty_vault_scores_cleanly() {
        let report = vault_health(&[], Utc::now());
        assert_eq!(report.score, 100);
        assert_eq!(report.total, 0);
    }

    #[test]
    fn test_strong_vault_scores_high() {
        let entries = vec![
            entry("a", "kV9#mT2$wQ8@pL5^xR7&"),
            entry("b", "zF4!nH6*bJ1(cK3)dM8+"),
        ];
        let report = vault_health(&entries, Utc::now());
        assert!(report.score >= 95);
        assert_eq!(report.weak, 0);
        assert_eq!(report.reused_groups, 0);
    }

    #[test]
    fn test_weak_passwords_penalized() {
        let entries = vec![entry("a", "monkey"), entry("b", "dragon")];
        let report = vault_health(&entries, Utc::now());
        assert_eq!(report.weak, 2);
        assert!(report.score < 100);
    }

    #[test]
    fn test_reuse_detected_by_fingerprint() {
        let entries = vec![
            entry("a", "Shared-Secret-42!xyz"),
            entry("b", "Shared-Secret-42!xyz"),
            entry("c", "kV9#mT2$wQ8@pL5^xR7&"),
        ];
        let report = vault_health(&entries, Utc::now());
        assert_eq!(report.reused_groups, 1);
    }

    #[test]
    fn test_reuse_cap() {
        // Five distinct reused pairs only ever cost 30 points
        let mut entries = Vec::new();
        for i in 0..5 {
            let secret = format!("Reused-Pair-{i}-Aa1!xxxx");
            entries.push(entry("a", &secret));
            entries.push(entry("b", &secret));
        }
        let report = vault_health(&entries, Utc::now());
        assert_eq!(report.reused_groups, 5);
        assert!(report.score >= 100 - 30 + 0 - 5 * 0);
    }

    #[test]
    fn test_stale_entries_counted() {
        let mut old = entry("a", "kV9#mT2$wQ8@pL5^xR7&");
        old.metadata.modified_at = Utc::now() - Duration::days(STALE_AFTER_DAYS + 10);
        let fresh = entry("b", "zF4!nH6*bJ1(cK3)dM8+");

        let report = vault_health(&[old, fresh], Utc::now());
        assert_eq!(report.stale, 1);
    }

    #[test]
    fn test_empty_secrets_counted() {
        let entries = vec![entry("a", ""), entry("b", "kV9#mT2$wQ8@pL5^xR7&")];
        let report = vault_health(&entries, Utc::now());
        assert_eq!(report.empty, 1);
    }

    #[test]
    fn test_totp_bonus() {
        let plain = vec![entry("a", "monkey"), entry("b", "monkey2024")];
        let without = vault_health(&plain, Utc::now());

        let covered: Vec<VaultEntry> = plain
            .into_iter()
            .map(|e| e.with_otp(totp()))
            .collect();
        let with = vault_health(&covered, Utc::now());

        assert!(with.score > without.score);
        assert_eq!(with.with_totp, 2);
    }

    #[test]
    fn test_score_never_leaves_range() {
        let mut entries = Vec::new();
        for _ in 0..30 {
            entries.push(entry("a", "123456"));
        }
        for _ in 0..10 {
            entries.push(entry("b", ""));
        }
        let report = vault_health(&entries, Utc::now());
        assert!(report.score <= 100);
    }
}
