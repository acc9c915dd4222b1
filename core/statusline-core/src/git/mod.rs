//! Git status, cached per repository.
//!
//! # State Machine
//!
//! ```text
//! Miss  (no usable record)          → run `git status` now, write, return
//! Stale (TTL expired / index moved) → return cached counts, refresh detached
//! Valid (young + same index mtime)  → return cached counts, nothing else
//! ```
//!
//! The `.git/index` mtime is the freshness oracle: staging, committing and
//! checking out all rewrite it, so a matching stamp means the cached counts
//! still describe the working tree (up to the TTL).
//!
//! # Module Structure
//!
//! - [`repo`]: repository discovery, HEAD/branch, stash count, index stamp
//! - [`status`]: the `git status --porcelain` query and its parser
//! - [`cache`]: the cached record, classification, and the query entry point
//! - [`refresh`]: fire-and-forget launchers for the stale path

mod cache;
mod refresh;
mod repo;
mod status;

pub use cache::{
    classify, CacheState, GitCacheRecord, GitStatusCache, Refresher, BRANCH_BYTES,
    REPO_PATH_BYTES,
};
pub use refresh::{
    spawn_worker, DetachedProcess, RefreshLauncher, ThreadLauncher, REFRESH_SUBCOMMAND,
};
pub use repo::{parse_head, IndexStamp, Repository};
pub use status::{parse_porcelain, GitCli, GitCounts, StatusProvider};
