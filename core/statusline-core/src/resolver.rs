//! Status resolution: session cache + payload + git cache → display state.
//!
//! Resolution order within one invocation is fixed: the session record is
//! merged first (it supplies the working directory), then the repository under
//! that directory is looked up in the git cache, then both are composed.

use std::path::Path;
use std::sync::Arc;

use crate::git::{CacheState, GitCounts, GitStatusCache, Repository};
use crate::input::Payload;
use crate::session::{SessionCache, SessionId, SessionRecord};
use crate::storage::RecordStore;

/// Everything the renderer needs, fully resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    pub working_directory: String,
    pub model: String,
    /// Present only when the current payload carries one; never cached.
    pub vim_mode: Option<String>,
    pub cost_usd: f64,
    pub lines_added: i64,
    pub lines_removed: i64,
    pub duration_ms: i64,
    pub used_percent: i64,
    pub context_size: i64,
    pub last_update_secs: i64,
    pub git: Option<GitDisplay>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitDisplay {
    pub branch: String,
    pub counts: GitCounts,
    pub stashes: u64,
    pub cache_state: CacheState,
}

/// Builds the display state from an already-merged session record.
///
/// Numbers come from the record, i.e. the session's high-water mark, so a
/// payload that lags behind an earlier one cannot make them go backwards.
/// The last-update stamp is "now" whenever a payload arrived.
pub fn compose(
    record: &SessionRecord,
    payload: Option<&Payload>,
    git: Option<GitDisplay>,
    now_secs: i64,
) -> DisplayState {
    let vim_mode = payload
        .and_then(|payload| payload.mode.as_deref())
        .filter(|mode| !mode.is_empty())
        .map(str::to_string);

    DisplayState {
        working_directory: record.working_directory.clone(),
        model: record.model.clone(),
        vim_mode,
        cost_usd: record.cost_usd,
        lines_added: record.lines_added,
        lines_removed: record.lines_removed,
        duration_ms: record.duration_ms,
        used_percent: record.used_percent,
        context_size: record.context_size,
        last_update_secs: if payload.is_some() {
            now_secs
        } else {
            record.last_update_secs
        },
        git,
    }
}

pub struct StatusResolver<S> {
    sessions: SessionCache<Arc<S>>,
    git: GitStatusCache<S>,
}

impl<S: RecordStore> StatusResolver<S> {
    pub fn new(sessions: SessionCache<Arc<S>>, git: GitStatusCache<S>) -> Self {
        Self { sessions, git }
    }

    pub fn resolve(
        &self,
        session: SessionId,
        payload: Option<&Payload>,
        now_secs: i64,
    ) -> DisplayState {
        let record = self.session_state(session, payload, now_secs);
        let git = self.git_state(&record.working_directory);
        compose(&record, payload, git, now_secs)
    }

    /// Reads, merges and (if changed) persists the session record.
    pub fn session_state(
        &self,
        session: SessionId,
        payload: Option<&Payload>,
        now_secs: i64,
    ) -> SessionRecord {
        self.sessions.update(session, payload, now_secs)
    }

    /// Git details for the repository containing `working_directory`.
    ///
    /// `None` outside a repository, or when HEAD names no branch.
    pub fn git_state(&self, working_directory: &str) -> Option<GitDisplay> {
        if working_directory.is_empty() {
            return None;
        }
        let repo = Repository::discover(Path::new(working_directory))?;
        let branch = repo.branch()?;
        let stashes = repo.stash_count();
        let (counts, cache_state) = self.git.query(&repo, Some(&branch));

        Some(GitDisplay {
            branch,
            counts,
            stashes,
            cache_state,
        })
    }
}
