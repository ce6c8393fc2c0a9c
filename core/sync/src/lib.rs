//! Synchronization for GenPwd vaults.
//!
//! The cloud transport itself lives outside this crate. What lives
//! here is the deterministic part: snapshot conflict resolution,
//! entry-level merging, retrying of transient transport failures,
//! and the [`RemoteStore`] seam a transport plugs into.

pub mod conflict;
pub mod remote;
pub mod retry;

pub use conflict::{
    merge_with_choices, resolve, ConflictStrategy, EntryChoice, Resolution, VaultSnapshot,
};
pub use remote::{sync_once, RemoteStore, SyncReport};
pub use retry::{retry, RetryConfig, RetryExecutor};
