//! Remote store seam and single-shot sync.
//!
//! The transport (WebDAV, S3, a folder watched by a desktop client)
//! lives behind [`RemoteStore`]. `sync_once` fetches through the
//! retry executor, resolves against the local snapshot, and reports
//! the decision. Persisting or uploading the decided snapshot is the
//! caller's job.

use async_trait::async_trait;
use tracing::{debug, info};

use genpwd_common::Result;

use crate::conflict::{resolve, ConflictStrategy, Resolution, VaultSnapshot};
use crate::retry::RetryExecutor;

/// Transport seam for a synchronized vault snapshot.
///
/// Implementations should report unreachable backends as
/// `Error::TransientNetwork` so the retry layer can do its work.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the remote snapshot, `None` if the remote is empty.
    async fn fetch_snapshot(&self) -> Result<Option<VaultSnapshot>>;

    /// Replace the remote snapshot.
    async fn upload_snapshot(&self, snapshot: &VaultSnapshot) -> Result<()>;
}

/// What a sync pass decided.
#[derive(Debug)]
pub struct SyncReport {
    pub resolution: Resolution,
    /// The fetched remote snapshot, if one existed.
    pub remote: Option<VaultSnapshot>,
}

/// Run one sync pass against a remote.
///
/// An empty remote resolves to `UseLocal`. An unreachable remote is a
/// transient failure surfaced to the caller after retries are
/// exhausted, never a conflict.
pub async fn sync_once(
    local: &VaultSnapshot,
    remote: &dyn RemoteStore,
    strategy: ConflictStrategy,
    retry: &RetryExecutor,
) -> Result<SyncReport> {
    let fetched = retry.execute(|| remote.fetch_snapshot()).await?;

    let resolution = match &fetched {
        None => {
            debug!("Remote is empty, local snapshot stands");
            Resolution::UseLocal
        }
        Some(remote_snapshot) => resolve(local, remote_snapshot, strategy),
    };

    info!(?strategy, decision = resolution_name(&resolution), "Sync pass resolved");
    Ok(SyncReport {
        resolution,
        remote: fetched,
    })
}

fn resolution_name(resolution: &Resolution) -> &'static str {
    match resolution {
        Resolution::UseLocal => "use-local",
        Resolution::UseRemote => "use-remote",
        Resolution::Pending => "pending",
        Resolution::Merged(_) => "merged",
    }
}
