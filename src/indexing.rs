//! Indexing orchestration.
//!
//! Uploads every queued document the backend has not indexed yet, then asks
//! the backend to rebuild its index. A run is all-or-nothing: uploads fan
//! out concurrently but are joined as a barrier, and a single failed upload
//! (or a failed build) leaves the indexed set exactly as it was.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use anyhow::{Context, Result};
use futures::future::join_all;

use crate::backend::IndexBackend;
use crate::guard::{self, FlightGuard};
use crate::models::FileEntry;
use crate::progress::{IndexProgressEvent, IndexProgressReporter};

/// How an accepted or rejected call to [`Indexer::run`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Another run holds the guard; nothing happened.
    AlreadyRunning,
    /// Every queued name is already indexed; no network calls were made.
    UpToDate,
    /// `uploaded` documents were sent and the index was rebuilt.
    Indexed { uploaded: usize },
}

#[derive(Debug, Default)]
pub struct Indexer {
    indexed: RwLock<BTreeSet<String>>,
    guard: FlightGuard,
}

impl Indexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_indexing(&self) -> bool {
        self.guard.is_busy()
    }

    pub fn indexed_names(&self) -> BTreeSet<String> {
        guard::read(&self.indexed).clone()
    }

    pub fn is_indexed(&self, name: &str) -> bool {
        guard::read(&self.indexed).contains(name)
    }

    pub fn has_indexed(&self) -> bool {
        !guard::read(&self.indexed).is_empty()
    }

    /// Index `snapshot`, the queue as it stood when the run was requested.
    ///
    /// On success the indexed set is replaced by the names in `snapshot`,
    /// which drops names that have since left the queue. Documents added to
    /// the queue after the snapshot are not uploaded and not marked indexed.
    pub async fn run(
        &self,
        backend: &dyn IndexBackend,
        snapshot: &[FileEntry],
        progress: &dyn IndexProgressReporter,
    ) -> Result<IndexOutcome> {
        self.run_with(backend, progress, || snapshot.to_vec()).await
    }

    /// Like [`Indexer::run`], but the snapshot is produced by `on_start`,
    /// which is called only once this run holds the guard. A rejected run
    /// has no side effects.
    pub async fn run_with<F>(
        &self,
        backend: &dyn IndexBackend,
        progress: &dyn IndexProgressReporter,
        on_start: F,
    ) -> Result<IndexOutcome>
    where
        F: FnOnce() -> Vec<FileEntry>,
    {
        let Some(_permit) = self.guard.try_acquire() else {
            tracing::debug!("indexing already running, ignoring request");
            return Ok(IndexOutcome::AlreadyRunning);
        };
        let snapshot = on_start();
        let snapshot = snapshot.as_slice();

        let pending: Vec<&FileEntry> = {
            let indexed = guard::read(&self.indexed);
            snapshot
                .iter()
                .filter(|entry| !indexed.contains(&entry.name))
                .collect()
        };

        if pending.is_empty() {
            // Every snapshot name is already indexed, so narrowing the set to
            // the snapshot needs no backend confirmation.
            *guard::write(&self.indexed) = snapshot_names(snapshot);
            tracing::debug!("all queued files already indexed");
            return Ok(IndexOutcome::UpToDate);
        }

        let total = pending.len() as u64;
        tracing::info!(pending = total, "uploading files for indexing");

        let settled = AtomicU64::new(0);
        let uploads = pending.iter().map(|entry| {
            let settled = &settled;
            async move {
                let result = async {
                    let bytes = entry.content.read().await?;
                    backend.upload(&entry.name, bytes).await
                }
                .await;
                let n = settled.fetch_add(1, Ordering::SeqCst) + 1;
                progress.report(IndexProgressEvent::Uploading { n, total });
                result.with_context(|| format!("Failed to upload '{}'", entry.name))
            }
        });

        let failures: Vec<anyhow::Error> = join_all(uploads)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();

        if let Some(first) = failures.into_iter().next() {
            tracing::warn!(error = %format!("{:#}", first), "upload failed, index not rebuilt");
            return Err(first.context("Indexing aborted: not every upload succeeded"));
        }

        progress.report(IndexProgressEvent::Building);
        backend
            .build_index()
            .await
            .context("Indexing failed on the server")?;

        let names = snapshot_names(snapshot);
        let indexed = names.len() as u64;
        *guard::write(&self.indexed) = names;

        progress.report(IndexProgressEvent::Done { indexed });
        tracing::info!(uploaded = pending.len(), indexed, "indexing complete");

        Ok(IndexOutcome::Indexed {
            uploaded: pending.len(),
        })
    }
}

fn snapshot_names(snapshot: &[FileEntry]) -> BTreeSet<String> {
    snapshot.iter().map(|e| e.name.clone()).collect()
}
