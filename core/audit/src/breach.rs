//! k-anonymity breach checking.
//!
//! Only the first five hex characters of the secret's SHA-1 hash ever
//! leave the process. The oracle returns the whole matching range and
//! the suffix comparison happens locally. Results are cached by full
//! hash so re-opening an audit view never re-queries the network, and
//! the rate-limit delay is paid only when a new query actually goes
//! out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use tokio::sync::Mutex;
use tracing::debug;

use genpwd_common::Result;

/// Length of the hash prefix disclosed to the oracle.
const PREFIX_LEN: usize = 5;

/// Default pause between consecutive oracle queries.
const DEFAULT_QUERY_DELAY: Duration = Duration::from_millis(100);

/// Range-query seam for a haveibeenpwned-style service.
///
/// Implementations receive a 5-hex-character SHA-1 prefix and return
/// the newline-delimited `SUFFIX:count` range for it. Transport
/// failures should surface as `Error::TransientNetwork` so callers
/// can retry.
#[async_trait]
pub trait BreachOracle: Send + Sync {
    async fn lookup_range(&self, prefix: &str) -> Result<String>;
}

/// Caching breach checker over a [`BreachOracle`].
pub struct BreachChecker {
    oracle: Arc<dyn BreachOracle>,
    /// Breach counts keyed by full uppercase SHA-1 hex.
    cache: Mutex<HashMap<String, u64>>,
    query_delay: Duration,
}

impl BreachChecker {
    pub fn new(oracle: Arc<dyn BreachOracle>) -> Self {
        Self::with_delay(oracle, DEFAULT_QUERY_DELAY)
    }

    pub fn with_delay(oracle: Arc<dyn BreachOracle>, query_delay: Duration) -> Self {
        Self {
            oracle,
            cache: Mutex::new(HashMap::new()),
            query_delay,
        }
    }

    /// Return how many times the secret appears in known breaches,
    /// `0` if it does not.
    ///
    /// # Security
    /// - Only the 5-character hash prefix is sent to the oracle
    /// - Repeat checks of one secret are served from the cache and
    ///   skip both the oracle and the rate-limit delay
    ///
    /// # Errors
    /// - `TransientNetwork` when the oracle is unreachable (retryable)
    pub async fn check(&self, secret: &str) -> Result<u64> {
        let hash = sha1_hex_upper(secret);

        // The lock is held across the lookup so concurrent checks of
        // the same secret still hit the oracle exactly once.
        let mut cache = self.cache.lock().await;
        if let Some(&count) = cache.get(&hash) {
            debug!(prefix = &hash[..PREFIX_LEN], "Breach check served from cache");
            return Ok(count);
        }

        tokio::time::sleep(self.query_delay).await;
        let range = self.oracle.lookup_range(&hash[..PREFIX_LEN]).await?;
        let count = match_suffix(&range, &hash[PREFIX_LEN..]);

        cache.insert(hash, count);
        Ok(count)
    }
}

fn sha1_hex_upper(secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(secret.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Scan a `SUFFIX:count` range for the local suffix.
fn match_suffix(range: &str, suffix: &str) -> u64 {
    for line in range.lines() {
        let Some((candidate, count)) = line.trim().split_once(':') else {
            continue;
        };
        if candidate.eq_ignore_ascii_case(suffix) {
            return count.trim().parse().unwrap_or(0);
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use genpwd_common::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// SHA-1("password") = 5BAA61E4C9B93F3F0682250B6CF8331B7EE68FD8
    const PASSWORD_SUFFIX: &str = "1E4C9B93F3F0682250B6CF8331B7EE68FD8";

    struct FixedOracle {
        calls: AtomicUsize,
        body: String,
    }

    impl FixedOracle {
        fn new(body: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                body: body.into(),
            })
        }
    }

    #[async_trait]
    impl BreachOracle for FixedOracle {
        async fn lookup_range(&self, prefix: &str) -> Result<String> {
            assert_eq!(prefix.len(), PREFIX_LEN);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    struct DownOracle;

    #[async_trait]
    impl BreachOracle for DownOracle {
        async fn lookup_range(&self, _prefix: &str) -> Result<String> {
            Err(Error::TransientNetwork("connection refused".to_string()))
        }
    }

    fn checker(oracle: Arc<dyn BreachOracle>) -> BreachChecker {
        BreachChecker::with_delay(oracle, Duration::from_millis(0))
    }

    #[tokio::test]
    async fn test_breached_secret_found() {
        let body = format!("00AABBCCDDEEFF00112233445566778899A:3\n{}:42", PASSWORD_SUFFIX);
        let oracle = FixedOracle::new(body);
        let checker = checker(oracle);

        assert_eq!(checker.check("password").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_clean_secret_reports_zero() {
        let oracle = FixedOracle::new("00AABBCCDDEEFF00112233445566778899A:3");
        let checker = checker(oracle);

        assert_eq!(checker.check("password").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_repeat_checks_hit_oracle_once() {
        let oracle = FixedOracle::new(format!("{}:7", PASSWORD_SUFFIX));
        let checker = checker(oracle.clone());

        for _ in 0..5 {
            assert_eq!(checker.check("password").await.unwrap(), 7);
        }
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_negative_result_is_cached_too() {
        let oracle = FixedOracle::new("");
        let checker = checker(oracle.clone());

        assert_eq!(checker.check("password").await.unwrap(), 0);
        assert_eq!(checker.check("password").await.unwrap(), 0);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_oracle_failure_is_transient() {
        let checker = checker(Arc::new(DownOracle));

        let err = checker.check("password").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_suffix_match_is_case_insensitive() {
        let body = format!("{}:9", PASSWORD_SUFFIX.to_lowercase());
        let checker = checker(FixedOracle::new(body));

        assert_eq!(checker.check("password").await.unwrap(), 9);
    }
}
