//! statusline: single-line Claude Code status renderer.
//!
//! Configured as Claude Code's `statusLine` command and executed on every
//! prompt draw. Reads the JSON payload from stdin (briefly), prints one
//! ANSI-styled line without a trailing newline, and always exits 0.
//!
//! ## Subcommands
//!
//! - (none): render the statusline
//! - `refresh-git`: recompute one repository's git cache (spawned internally
//!   for the detached stale-cache refresh)

mod logging;
mod stdin;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use statusline_core::git::{spawn_worker, GitCli, Refresher};
use statusline_core::{
    resolve_session_id, CacheLayout, FileStore, Invocation, Repository, StatuslineConfig,
};

#[derive(Parser)]
#[command(name = "statusline")]
#[command(about = "Claude Code statusline renderer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute a repository's cached git status (spawned internally)
    #[command(hide = true)]
    RefreshGit {
        /// Repository root
        #[arg(long)]
        repo: PathBuf,

        /// Cache directory to write into
        #[arg(long)]
        cache_dir: PathBuf,

        /// Run the refresh here instead of spawning a detached worker
        #[arg(long)]
        worker: bool,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        // Unknown arguments must not cost the user their prompt.
        Err(_) => Cli { command: None },
    };
    let config = StatuslineConfig::load();

    match cli.command {
        None => render(&config),
        Some(Commands::RefreshGit {
            repo,
            cache_dir,
            worker,
        }) => refresh_git(&config, &repo, cache_dir, worker),
    }
}

fn render(config: &StatuslineConfig) {
    let session = resolve_session_id();
    let _logging_guard = logging::init(config, session);

    let invocation = Invocation::from_config(config, session);
    let rendered = invocation
        .run(|| stdin::read_payload(config.stdin_timeout(), config.stdin_max_bytes));

    let mut stdout = std::io::stdout().lock();
    if let Err(err) = stdout
        .write_all(rendered.line.as_bytes())
        .and_then(|()| stdout.flush())
    {
        tracing::debug!(error = %err, "Failed to write statusline");
    }

    if config.debug {
        rendered.log_timings();
    }
}

fn refresh_git(config: &StatuslineConfig, repo: &Path, cache_dir: PathBuf, worker: bool) {
    if !worker {
        // Intermediary: start the worker and exit so the caller can reap us.
        let program = match std::env::current_exe() {
            Ok(program) => program,
            Err(err) => {
                tracing::debug!(error = %err, "Cannot locate statusline executable");
                return;
            }
        };
        if let Err(err) = spawn_worker(&program, repo, &cache_dir) {
            tracing::debug!(error = %err, "Failed to spawn git refresh worker");
        }
        return;
    }

    let Some(repository) = Repository::discover(repo) else {
        return;
    };
    let layout = CacheLayout::new(cache_dir, config.log_dir.clone());
    let refresher = Refresher::new(
        Arc::new(FileStore::new(layout)),
        Arc::new(GitCli::new(config.git_capture_bytes)),
    );
    refresher.refresh(&repository);
}
