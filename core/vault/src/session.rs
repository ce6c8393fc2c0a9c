//! Session management for the decrypted master key.
//!
//! A session holds the key in memory for a bounded time, supports a
//! duress mode that swaps in a decoy key while making the real key
//! unreachable, and can gate key release behind an asynchronous
//! biometric check. Key buffers are zeroized on every destruction
//! path, including drop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use zeroize::Zeroizing;

use genpwd_common::{Error, Result, SecretBytes};

/// The yes/no result of a platform biometric prompt.
///
/// The prompt UI itself is external; only the asynchronous gate is
/// consumed here.
#[async_trait]
pub trait BiometricGate: Send + Sync {
    async fn authorize(&self) -> Result<bool>;
}

#[derive(Default)]
struct KeySlot {
    real: Option<Zeroizing<Vec<u8>>>,
    decoy: Option<Zeroizing<Vec<u8>>>,
    duress: bool,
    expires_at: Option<Instant>,
}

impl KeySlot {
    fn active(&self) -> Option<&Zeroizing<Vec<u8>>> {
        if self.duress {
            self.decoy.as_ref()
        } else {
            self.real.as_ref()
        }
    }

    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(deadline) => Instant::now() >= deadline,
            None => true,
        }
    }

    fn is_unlocked(&self) -> bool {
        self.active().is_some() && !self.is_expired()
    }

    /// Zeroize both buffers and reset to the locked state.
    fn wipe(&mut self) {
        self.real.take();
        self.decoy.take();
        self.duress = false;
        self.expires_at = None;
    }
}

/// Holds the derived master key for one unlock session.
///
/// Exclusive owner of the key material: other components receive a
/// copy scoped to a single operation and must not retain it.
pub struct SessionManager {
    slot: Mutex<KeySlot>,
    gate: Option<Arc<dyn BiometricGate>>,
}

impl SessionManager {
    /// Create a session manager without a biometric gate.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(KeySlot::default()),
            gate: None,
        }
    }

    /// Create a session manager whose key release is gated.
    pub fn with_gate(gate: Arc<dyn BiometricGate>) -> Self {
        Self {
            slot: Mutex::new(KeySlot::default()),
            gate: Some(gate),
        }
    }

    /// Store a key for `ttl`.
    ///
    /// With `is_duress` set the key becomes the decoy key, duress
    /// mode activates, and any real key is discarded; the real
    /// vault stays cryptographically unreachable for this process
    /// lifetime. Otherwise the key becomes the real key and duress
    /// state is cleared.
    ///
    /// The supplied bytes are copied; the caller keeps ownership of
    /// its own buffer. The state swap is complete before this
    /// returns, so a subsequent `get_key` never sees a half-updated
    /// session.
    pub async fn store_key(&self, key: &[u8], ttl: Duration, is_duress: bool) {
        let mut slot = self.slot.lock().await;
        if is_duress {
            slot.decoy = Some(Zeroizing::new(key.to_vec()));
            // Drop the real key so it cannot coexist with the decoy
            slot.real.take();
            slot.duress = true;
            debug!("Duress key stored, real key discarded");
        } else {
            slot.real = Some(Zeroizing::new(key.to_vec()));
            slot.decoy.take();
            slot.duress = false;
            debug!("Session key stored");
        }
        slot.expires_at = Some(Instant::now() + ttl);
    }

    /// Release a copy of the active key, or `None` when the session
    /// is locked or expired.
    ///
    /// When a biometric gate is registered it must pass first, and
    /// expiry is re-checked *after* the gate resolves: the gate is
    /// asynchronous and the session may expire while it is pending.
    pub async fn get_key(&self) -> Result<Option<SecretBytes>> {
        {
            let mut slot = self.slot.lock().await;
            if slot.is_expired() {
                slot.wipe();
                return Ok(None);
            }
            if slot.active().is_none() {
                return Ok(None);
            }
        }

        if let Some(gate) = &self.gate {
            if !gate.authorize().await? {
                debug!("Biometric gate refused key release");
                return Ok(None);
            }
        }

        // Re-check expiry: the gate may have taken long enough for
        // the session to expire while we were waiting.
        let mut slot = self.slot.lock().await;
        if slot.is_expired() {
            slot.wipe();
            return Ok(None);
        }
        Ok(slot.active().map(|k| SecretBytes::new(k.to_vec())))
    }

    /// Zeroize all key material and lock the session.
    pub async fn clear(&self) {
        let mut slot = self.slot.lock().await;
        slot.wipe();
        debug!("Session cleared");
    }

    /// Push the expiry out by `ttl`.
    ///
    /// # Errors
    /// - `Validation` if no key is currently held
    pub async fn extend(&self, ttl: Duration) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if slot.active().is_none() || slot.is_expired() {
            return Err(Error::Validation(
                "Cannot extend: no active session key".to_string(),
            ));
        }
        slot.expires_at = Some(Instant::now() + ttl);
        Ok(())
    }

    /// Whether a key (real or decoy) is present and unexpired.
    pub async fn is_unlocked(&self) -> bool {
        self.slot.lock().await.is_unlocked()
    }

    /// Whether duress mode is active.
    pub async fn is_duress_active(&self) -> bool {
        let slot = self.slot.lock().await;
        slot.duress && slot.is_unlocked()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const TTL: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn test_store_and_get_key() {
        let session = SessionManager::new();
        session.store_key(b"real-key", TTL, false).await;

        assert!(session.is_unlocked().await);
        let key = session.get_key().await.unwrap().unwrap();
        assert_eq!(key.as_bytes(), b"real-key");
    }

    #[tokio::test]
    async fn test_session_expiry() {
        let session = SessionManager::new();
        session.store_key(b"real-key", TTL, false).await;

        sleep(Duration::from_millis(150)).await;

        assert!(!session.is_unlocked().await);
        assert!(session.get_key().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duress_isolation() {
        let session = SessionManager::new();
        session.store_key(b"real-key", TTL, false).await;
        session.store_key(b"decoy-key", TTL, true).await;

        assert!(session.is_duress_active().await);
        let key = session.get_key().await.unwrap().unwrap();
        assert_eq!(key.as_bytes(), b"decoy-key");

        // Leaving duress mode must not resurrect the real key
        let mut slot = session.slot.lock().await;
        assert!(slot.real.is_none());
        slot.duress = false;
        assert!(slot.active().is_none());
    }

    #[tokio::test]
    async fn test_real_key_clears_duress() {
        let session = SessionManager::new();
        session.store_key(b"decoy-key", TTL, true).await;
        session.store_key(b"real-key", TTL, false).await;

        assert!(!session.is_duress_active().await);
        let key = session.get_key().await.unwrap().unwrap();
        assert_eq!(key.as_bytes(), b"real-key");
    }

    #[tokio::test]
    async fn test_clear_locks_session() {
        let session = SessionManager::new();
        session.store_key(b"real-key", TTL, false).await;
        session.clear().await;

        assert!(!session.is_unlocked().await);
        assert!(session.get_key().await.unwrap().is_none());
        assert!(session.extend(TTL).await.is_err());
    }

    #[tokio::test]
    async fn test_extend_requires_active_key() {
        let session = SessionManager::new();
        assert!(session.extend(TTL).await.is_err());

        session.store_key(b"real-key", Duration::from_millis(50), false).await;
        session.extend(Duration::from_millis(500)).await.unwrap();

        sleep(Duration::from_millis(100)).await;
        // Still unlocked: extend pushed the deadline past the old TTL
        assert!(session.is_unlocked().await);
    }

    struct AllowGate;

    #[async_trait]
    impl BiometricGate for AllowGate {
        async fn authorize(&self) -> Result<bool> {
            Ok(true)
        }
    }

    struct DenyGate;

    #[async_trait]
    impl BiometricGate for DenyGate {
        async fn authorize(&self) -> Result<bool> {
            Ok(false)
        }
    }

    struct SlowGate(Duration);

    #[async_trait]
    impl BiometricGate for SlowGate {
        async fn authorize(&self) -> Result<bool> {
            sleep(self.0).await;
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_gate_pass_releases_key() {
        let session = SessionManager::with_gate(Arc::new(AllowGate));
        session.store_key(b"real-key", TTL, false).await;

        let key = session.get_key().await.unwrap().unwrap();
        assert_eq!(key.as_bytes(), b"real-key");
    }

    #[tokio::test]
    async fn test_gate_refusal_withholds_key() {
        let session = SessionManager::with_gate(Arc::new(DenyGate));
        session.store_key(b"real-key", TTL, false).await;

        assert!(session.get_key().await.unwrap().is_none());
        // Session itself stays unlocked; only release was refused
        assert!(session.is_unlocked().await);
    }

    #[tokio::test]
    async fn test_expiry_rechecked_after_gate() {
        // The gate outlives the TTL: the pre-gate check passes, the
        // post-gate check must catch the expiry.
        let session = SessionManager::with_gate(Arc::new(SlowGate(Duration::from_millis(120))));
        session.store_key(b"real-key", Duration::from_millis(50), false).await;

        assert!(session.get_key().await.unwrap().is_none());
    }
}
