//! Job store seam and the watcher registry lookup built on top of it.

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Address, Job, JobId, Watcher, WatcherKind};

/// External persistence boundary for jobs and their watchers.
///
/// The store manages its own concurrency; every method here is a read-only
/// query and the listener never mutates persisted state.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Load the current set of jobs.
    async fn jobs(&self) -> Result<Vec<Job>>;

    /// Look up a single job by id. Errors cover both unreachable storage
    /// and a job that no longer exists.
    async fn find_job(&self, id: &JobId) -> Result<Job>;

    /// Query persisted watchers filtered by exact address equality and
    /// kind, in the store's insertion order.
    async fn watchers_at(&self, address: Address, kind: WatcherKind) -> Result<Vec<Watcher>>;
}

/// Resolve the watchers interested in log events at `address`.
///
/// A query failure is reported and treated as an empty result; a transient
/// store error must not take down the dispatch stream.
pub async fn matching_watchers(store: &dyn JobStore, address: Address) -> Vec<Watcher> {
    match store.watchers_at(address, WatcherKind::RawLog).await {
        Ok(watchers) => watchers,
        Err(error) => {
            tracing::warn!(
                target: "chainwatch::registry",
                address = %format!("{address:#x}"),
                error = %error,
                "watcher query failed, treating as no matches"
            );
            Vec::new()
        }
    }
}
