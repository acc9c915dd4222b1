//! Per-repository git status cache.
//!
//! # Record Layout (352 bytes, little-endian)
//!
//! ```text
//! index_mtime_secs  i64
//! index_mtime_nsecs i64
//! modified          u32
//! staged            u32
//! ahead             u32
//! behind            u32
//! branch            [u8; 64]   NUL-padded
//! repo_path         [u8; 256]  NUL-padded, detects hash collisions
//! ```
//!
//! The record's own age comes from the cache file's mtime, not a stored field.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::record::{truncate_to_boundary, FixedRecord, RecordReader, RecordWriter};
use crate::storage::{CacheKey, RecordStore, Stored};

use super::{GitCounts, IndexStamp, RefreshLauncher, Repository, StatusProvider};

pub const BRANCH_BYTES: usize = 64;
pub const REPO_PATH_BYTES: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitCacheRecord {
    pub index_mtime: IndexStamp,
    pub counts: GitCounts,
    pub branch: String,
    pub repo_path: String,
}

impl FixedRecord for GitCacheRecord {
    const SIZE: usize = 2 * 8 + 4 * 4 + BRANCH_BYTES + REPO_PATH_BYTES;

    fn encode(&self) -> Vec<u8> {
        let mut writer = RecordWriter::with_capacity(Self::SIZE);
        writer
            .i64(self.index_mtime.secs)
            .i64(self.index_mtime.nanos)
            .u32(self.counts.modified)
            .u32(self.counts.staged)
            .u32(self.counts.ahead)
            .u32(self.counts.behind)
            .text(&self.branch, BRANCH_BYTES)
            .text(&self.repo_path, REPO_PATH_BYTES);
        writer.finish()
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::SIZE {
            return None;
        }
        let mut reader = RecordReader::new(bytes);
        Some(GitCacheRecord {
            index_mtime: IndexStamp {
                secs: reader.i64(),
                nanos: reader.i64(),
            },
            counts: GitCounts {
                modified: reader.u32(),
                staged: reader.u32(),
                ahead: reader.u32(),
                behind: reader.u32(),
            },
            branch: reader.text(BRANCH_BYTES),
            repo_path: reader.text(REPO_PATH_BYTES),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Miss,
    Stale,
    Valid,
}

impl CacheState {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheState::Miss => "miss",
            CacheState::Stale => "stale",
            CacheState::Valid => "valid",
        }
    }
}

/// Decides how far a cached record can be trusted.
///
/// Valid requires all of: the record belongs to `repo_key`, it is no older
/// than `ttl`, the index still has the recorded mtime, and (when both are
/// known) HEAD still names the recorded branch.
pub fn classify(
    stored: Option<&Stored<GitCacheRecord>>,
    repo_key: &str,
    current_index: Option<IndexStamp>,
    current_branch: Option<&str>,
    now: SystemTime,
    ttl: Duration,
) -> CacheState {
    let Some(stored) = stored else {
        return CacheState::Miss;
    };
    let record = &stored.record;
    if record.repo_path != truncate_to_boundary(repo_key, REPO_PATH_BYTES - 1) {
        return CacheState::Miss;
    }

    // A write time in the future (clock skew) counts as age zero.
    let age = now
        .duration_since(stored.written_at)
        .unwrap_or(Duration::ZERO);
    if age > ttl {
        return CacheState::Stale;
    }

    match current_index {
        Some(stamp) if stamp == record.index_mtime => {}
        _ => return CacheState::Stale,
    }

    match current_branch {
        Some(branch) if !record.branch.is_empty() && record.branch != branch => {
            CacheState::Stale
        }
        _ => CacheState::Valid,
    }
}

/// Recomputes a repository's status and overwrites its cache entry.
///
/// Shared by the synchronous miss path and the detached refresh.
pub struct Refresher<S> {
    store: Arc<S>,
    provider: Arc<dyn StatusProvider>,
}

impl<S> Clone for Refresher<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<S: RecordStore> Refresher<S> {
    pub fn new(store: Arc<S>, provider: Arc<dyn StatusProvider>) -> Self {
        Self { store, provider }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn refresh(&self, repo: &Repository) -> GitCounts {
        let counts = self.provider.status(repo);

        // Stamp after the query: git status may itself rewrite the index.
        let Some(index_mtime) = repo.index_stamp() else {
            tracing::debug!(repo = %repo.root().display(), "No index; git status not cached");
            return counts;
        };

        let key = repo.cache_key();
        let record = GitCacheRecord {
            index_mtime,
            counts,
            branch: repo
                .branch()
                .map(|b| truncate_to_boundary(&b, BRANCH_BYTES - 1).to_string())
                .unwrap_or_default(),
            repo_path: truncate_to_boundary(&key, REPO_PATH_BYTES - 1).to_string(),
        };
        if let Err(err) = self.store.put(&CacheKey::Repository(key), &record) {
            tracing::warn!(error = %err, repo = %repo.root().display(), "Failed to write git cache");
        }
        counts
    }
}

/// Serves git counts from the cache, refreshing as the state machine dictates.
pub struct GitStatusCache<S> {
    refresher: Refresher<S>,
    launcher: Box<dyn RefreshLauncher>,
    ttl: Duration,
}

impl<S: RecordStore> GitStatusCache<S> {
    pub fn new(refresher: Refresher<S>, launcher: Box<dyn RefreshLauncher>, ttl: Duration) -> Self {
        Self {
            refresher,
            launcher,
            ttl,
        }
    }

    pub fn query(&self, repo: &Repository, branch: Option<&str>) -> (GitCounts, CacheState) {
        self.query_at(repo, branch, SystemTime::now())
    }

    pub fn query_at(
        &self,
        repo: &Repository,
        branch: Option<&str>,
        now: SystemTime,
    ) -> (GitCounts, CacheState) {
        let key = repo.cache_key();
        let stored = self
            .refresher
            .store()
            .get::<GitCacheRecord>(&CacheKey::Repository(key.clone()));
        let state = classify(
            stored.as_ref(),
            &key,
            repo.index_stamp(),
            branch,
            now,
            self.ttl,
        );
        tracing::debug!(repo = %key, state = state.as_str(), "git cache lookup");

        match (state, stored) {
            (CacheState::Valid, Some(stored)) => (stored.record.counts, state),
            (CacheState::Stale, Some(stored)) => {
                self.launcher.launch(repo);
                (stored.record.counts, state)
            }
            _ => (self.refresher.refresh(repo), CacheState::Miss),
        }
    }
}
