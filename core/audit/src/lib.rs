//! Password auditing for GenPwd vaults.
//!
//! This crate provides:
//! - Per-password strength analysis (entropy estimate with pattern
//!   penalties, bucketed into five levels)
//! - Vault-wide health scoring (weak/reused/stale/empty penalties,
//!   2FA and entropy bonuses)
//! - k-anonymity breach checking against an external range oracle

pub mod breach;
pub mod health;
pub mod strength;

pub use breach::{BreachChecker, BreachOracle};
pub use health::{vault_health, HealthReport, STALE_AFTER_DAYS};
pub use strength::{analyze_password, PasswordAnalysis, PasswordIssue, StrengthBucket};
