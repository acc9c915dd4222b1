//! Background refresh of a stale git cache entry.
//!
//! The render path must never wait on `git status`. In production the refresh
//! runs in a fully detached process: the statusline binary re-executes itself
//! as a short-lived intermediary, which starts the real worker in its own
//! process group and exits at once. The caller only reaps the intermediary,
//! so no zombie survives and the worker is adopted by init.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Result, StatuslineError};
use crate::storage::RecordStore;

use super::{Refresher, Repository};

/// Subcommand the statusline binary exposes for detached refreshes.
pub const REFRESH_SUBCOMMAND: &str = "refresh-git";

/// Starts a refresh without blocking the caller on its completion.
pub trait RefreshLauncher: Send + Sync {
    fn launch(&self, repo: &Repository);
}

/// Launches the refresh in a detached process.
#[derive(Debug, Clone)]
pub struct DetachedProcess {
    program: PathBuf,
    cache_dir: PathBuf,
}

impl DetachedProcess {
    pub fn new(program: PathBuf, cache_dir: PathBuf) -> Self {
        Self { program, cache_dir }
    }

    /// Uses the running executable as the refresh program.
    pub fn current_exe(cache_dir: PathBuf) -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|err| StatuslineError::io("resolve current executable", err))?;
        Ok(Self::new(program, cache_dir))
    }

    fn spawn_intermediary(&self, repo: &Repository) -> Result<()> {
        let mut child = refresh_command(&self.program, repo.root(), &self.cache_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| StatuslineError::Spawn {
                command: REFRESH_SUBCOMMAND.to_string(),
                source,
            })?;
        // The intermediary exits as soon as the worker is started.
        child
            .wait()
            .map_err(|err| StatuslineError::io("wait for refresh intermediary", err))?;
        Ok(())
    }
}

impl RefreshLauncher for DetachedProcess {
    fn launch(&self, repo: &Repository) {
        match self.spawn_intermediary(repo) {
            Ok(()) => tracing::debug!(repo = %repo.root().display(), "Spawned git refresh"),
            Err(err) => {
                tracing::debug!(error = %err, repo = %repo.root().display(), "Git refresh not started")
            }
        }
    }
}

/// Starts the refresh worker and returns without waiting for it.
///
/// Called from the intermediary. The worker gets its own process group so a
/// terminal signal aimed at the statusline's group does not reach it.
pub fn spawn_worker(program: &Path, repo_root: &Path, cache_dir: &Path) -> Result<()> {
    let mut command = refresh_command(program, repo_root, cache_dir);
    command
        .arg("--worker")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    command.spawn().map_err(|source| StatuslineError::Spawn {
        command: format!("{REFRESH_SUBCOMMAND} --worker"),
        source,
    })?;
    Ok(())
}

fn refresh_command(program: &Path, repo_root: &Path, cache_dir: &Path) -> Command {
    let mut command = Command::new(program);
    command
        .arg(REFRESH_SUBCOMMAND)
        .arg("--repo")
        .arg(repo_root)
        .arg("--cache-dir")
        .arg(cache_dir);
    command
}

/// Runs the refresh on a detached thread in the current process.
///
/// For library callers and tests that have no statusline binary to re-exec.
pub struct ThreadLauncher<S> {
    refresher: Refresher<S>,
}

impl<S> ThreadLauncher<S> {
    pub fn new(refresher: Refresher<S>) -> Self {
        Self { refresher }
    }
}

impl<S: RecordStore + 'static> RefreshLauncher for ThreadLauncher<S> {
    fn launch(&self, repo: &Repository) {
        let refresher = self.refresher.clone();
        let repo = repo.clone();
        let spawned = std::thread::Builder::new()
            .name("git-refresh".to_string())
            .spawn(move || {
                refresher.refresh(&repo);
            });
        if let Err(err) = spawned {
            tracing::debug!(error = %err, "Git refresh thread not started");
        }
    }
}
