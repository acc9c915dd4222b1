//! Cache storage: path layout and the record store.
//!
//! All cache identity is scoped to two keys, the owning session and the
//! repository path. [`CacheLayout`] is the single place that turns those keys
//! (and the sweep sentinel and debug logs) into file paths, so tests can point
//! everything at a temp directory.
//!
//! ## Files
//!
//! ```text
//! <cache_dir>/statusline-cache.<session>   session state record
//! <cache_dir>/claude-git-<md5(repo)>       git status record
//! <cache_dir>/statusline-cleanup           sweep sentinel (mtime only)
//! <log_dir>/<session>.log                  debug timing log
//! ```
//!
//! ## Concurrency
//!
//! There is no locking. Each record is small and written with a single
//! `write` call, and readers reject any file whose length is not exactly the
//! record size. A lost race between two invocations is repaired by the next
//! merge.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::config::StatuslineConfig;
use crate::error::{Result, StatuslineError};
use crate::record::FixedRecord;
use crate::session::SessionId;

pub const SESSION_CACHE_PREFIX: &str = "statusline-cache.";
pub const GIT_CACHE_PREFIX: &str = "claude-git-";
pub const SWEEP_SENTINEL_NAME: &str = "statusline-cleanup";
pub const DEBUG_LOG_SUFFIX: &str = ".log";

/// Identity of one cached record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Session(SessionId),
    /// Normalized absolute repository path.
    Repository(String),
}

/// Central path management for cache files.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    cache_dir: PathBuf,
    log_dir: PathBuf,
}

impl CacheLayout {
    pub fn new(cache_dir: PathBuf, log_dir: PathBuf) -> Self {
        Self { cache_dir, log_dir }
    }

    pub fn from_config(config: &StatuslineConfig) -> Self {
        Self::new(config.cache_dir.clone(), config.log_dir.clone())
    }

    /// Places both the cache and log directories under `root`.
    /// Used for testing with temp directories.
    pub fn with_root(root: &Path) -> Self {
        Self::new(root.join("cache"), root.join("logs"))
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        match key {
            CacheKey::Session(id) => self.session_cache_file(*id),
            CacheKey::Repository(repo) => self.git_cache_file(repo),
        }
    }

    pub fn session_cache_file(&self, session: SessionId) -> PathBuf {
        self.cache_dir
            .join(format!("{}{}", SESSION_CACHE_PREFIX, session))
    }

    pub fn git_cache_file(&self, repo_path: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}{}", GIT_CACHE_PREFIX, repo_path_hash(repo_path)))
    }

    pub fn sweep_sentinel(&self) -> PathBuf {
        self.cache_dir.join(SWEEP_SENTINEL_NAME)
    }

    pub fn debug_log_file(&self, session: SessionId) -> PathBuf {
        self.log_dir
            .join(format!("{}{}", session, DEBUG_LOG_SUFFIX))
    }
}

/// Strips trailing slashes except for root "/".
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// MD5 of the normalized repository path, as lowercase hex.
pub fn repo_path_hash(repo_path: &str) -> String {
    format!("{:x}", md5::compute(normalize_path(repo_path)))
}

/// A record together with the time it was last written.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<R> {
    pub record: R,
    pub written_at: SystemTime,
}

/// Key-value access to cached records.
///
/// `get` never fails: a missing, short or unreadable entry is `None`.
pub trait RecordStore: Send + Sync {
    fn get<R: FixedRecord>(&self, key: &CacheKey) -> Option<Stored<R>>;
    fn put<R: FixedRecord>(&self, key: &CacheKey, record: &R) -> Result<()>;
}

/// One file per key, written whole.
#[derive(Debug, Clone)]
pub struct FileStore {
    layout: CacheLayout,
}

impl FileStore {
    pub fn new(layout: CacheLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }
}

impl RecordStore for FileStore {
    fn get<R: FixedRecord>(&self, key: &CacheKey) -> Option<Stored<R>> {
        let path = self.layout.path_for(key);
        let file = std::fs::File::open(&path).ok()?;
        let written_at = file.metadata().and_then(|m| m.modified()).ok()?;

        // One byte of slack detects oversized files without reading them whole.
        let mut bytes = Vec::with_capacity(R::SIZE + 1);
        file.take(R::SIZE as u64 + 1).read_to_end(&mut bytes).ok()?;

        let record = R::decode(&bytes)?;
        Some(Stored { record, written_at })
    }

    fn put<R: FixedRecord>(&self, key: &CacheKey, record: &R) -> Result<()> {
        let path = self.layout.path_for(key);
        let bytes = record.encode();

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = match options.open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                fs_err::create_dir_all(self.layout.cache_dir())
                    .map_err(|e| StatuslineError::io("create cache directory", e))?;
                options
                    .open(&path)
                    .map_err(|e| StatuslineError::io(format!("open {}", path.display()), e))?
            }
            Err(err) => {
                return Err(StatuslineError::io(format!("open {}", path.display()), err));
            }
        };

        file.write_all(&bytes)
            .map_err(|e| StatuslineError::io(format!("write {}", path.display()), e))
    }
}

/// In-memory store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<CacheKey, (Vec<u8>, SystemTime)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` as if it had been written at `written_at`.
    pub fn put_at<R: FixedRecord>(&self, key: &CacheKey, record: &R, written_at: SystemTime) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.clone(), (record.encode(), written_at));
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }
}

impl RecordStore for MemoryStore {
    fn get<R: FixedRecord>(&self, key: &CacheKey) -> Option<Stored<R>> {
        let entries = self.entries.lock().ok()?;
        let (bytes, written_at) = entries.get(key)?;
        Some(Stored {
            record: R::decode(bytes)?,
            written_at: *written_at,
        })
    }

    fn put<R: FixedRecord>(&self, key: &CacheKey, record: &R) -> Result<()> {
        self.put_at(key, record, SystemTime::now());
        Ok(())
    }
}

/// Lets the session cache and the git cache share one store.
impl<S: RecordStore> RecordStore for Arc<S> {
    fn get<R: FixedRecord>(&self, key: &CacheKey) -> Option<Stored<R>> {
        (**self).get(key)
    }

    fn put<R: FixedRecord>(&self, key: &CacheKey, record: &R) -> Result<()> {
        (**self).put(key, record)
    }
}
