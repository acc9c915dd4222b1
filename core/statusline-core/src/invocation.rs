//! One statusline draw, end to end.
//!
//! ```text
//! sweep (rate-limited) → read payload → session cache → git cache → render
//! ```
//!
//! Every phase degrades instead of failing, so [`Invocation::run`] always
//! produces a line.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::StatuslineConfig;
use crate::git::{CacheState, DetachedProcess, GitCli, GitStatusCache, Refresher};
use crate::input::Payload;
use crate::process::{ProcessProbe, SignalProbe};
use crate::render::{render_into, write_timing_suffix, RenderOptions};
use crate::resolver::{compose, StatusResolver};
use crate::session::{SessionCache, SessionId};
use crate::storage::{CacheLayout, FileStore, RecordStore};
use crate::sweep::Sweeper;

const LINE_CAPACITY: usize = 4_096;

/// Time spent in each phase of one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    pub cleanup: Duration,
    pub read: Duration,
    pub parse: Duration,
    pub git: Duration,
    pub build: Duration,
    pub total: Duration,
}

/// The rendered line plus what happened while producing it.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub line: String,
    pub had_input: bool,
    /// `None` when the working directory is not inside a repository.
    pub git_cache: Option<CacheState>,
    pub timings: PhaseTimings,
}

impl Rendered {
    /// Emits the per-invocation timing line in microseconds.
    pub fn log_timings(&self) {
        let t = &self.timings;
        tracing::info!(
            cleanup = t.cleanup.as_micros() as u64,
            read = t.read.as_micros() as u64,
            stdin = if self.had_input { "ok" } else { "timeout" },
            parse = t.parse.as_micros() as u64,
            git = t.git.as_micros() as u64,
            git_cache = self.git_cache.map_or("none", CacheState::as_str),
            build = t.build.as_micros() as u64,
            total = t.total.as_micros() as u64,
            "timing"
        );
    }
}

pub struct Invocation<S, P> {
    session: SessionId,
    sweeper: Sweeper<P>,
    resolver: StatusResolver<S>,
    render: RenderOptions,
}

impl Invocation<FileStore, SignalProbe> {
    /// Production wiring: file-backed caches, the `git` CLI, detached
    /// refresh processes, and signal-based liveness probes.
    pub fn from_config(config: &StatuslineConfig, session: SessionId) -> Self {
        let layout = CacheLayout::from_config(config);
        let store = Arc::new(FileStore::new(layout.clone()));
        let provider = Arc::new(GitCli::new(config.git_capture_bytes));
        let launcher = DetachedProcess::current_exe(config.cache_dir.clone()).unwrap_or_else(
            |err| {
                tracing::warn!(error = %err, "Falling back to statusline on PATH for git refresh");
                DetachedProcess::new("statusline".into(), config.cache_dir.clone())
            },
        );

        let git = GitStatusCache::new(
            Refresher::new(Arc::clone(&store), provider),
            Box::new(launcher),
            config.git_cache_ttl(),
        );
        let resolver = StatusResolver::new(SessionCache::new(store), git);
        let sweeper = Sweeper::new(layout, SignalProbe, config.sweep_interval());

        Self::new(session, sweeper, resolver, RenderOptions::from_config(config))
    }
}

impl<S: RecordStore, P: ProcessProbe> Invocation<S, P> {
    pub fn new(
        session: SessionId,
        sweeper: Sweeper<P>,
        resolver: StatusResolver<S>,
        render: RenderOptions,
    ) -> Self {
        Self {
            session,
            sweeper,
            resolver,
            render,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Runs one draw. `read_input` is called after the sweep and returns the
    /// raw payload, or `None` if nothing arrived in time.
    pub fn run(&self, read_input: impl FnOnce() -> Option<Vec<u8>>) -> Rendered {
        let start = Instant::now();

        self.sweeper.run_if_due();
        let cleanup_done = Instant::now();

        let input = read_input();
        let read_done = Instant::now();

        let payload = input.as_deref().map(Payload::decode);
        let now_secs = chrono::Utc::now().timestamp();
        let record = self
            .resolver
            .session_state(self.session, payload.as_ref(), now_secs);
        let parse_done = Instant::now();

        let git = self.resolver.git_state(&record.working_directory);
        let git_cache = git.as_ref().map(|git| git.cache_state);
        let git_done = Instant::now();

        let state = compose(&record, payload.as_ref(), git, now_secs);
        let mut line = String::with_capacity(LINE_CAPACITY);
        // fmt::Write into a String cannot fail.
        let _ = render_into(&mut line, &state, &self.render);
        let build_done = Instant::now();

        let _ = write_timing_suffix(&mut line, build_done - start);
        let timings = PhaseTimings {
            cleanup: cleanup_done - start,
            read: read_done - cleanup_done,
            parse: parse_done - read_done,
            git: git_done - parse_done,
            build: build_done - git_done,
            total: start.elapsed(),
        };

        Rendered {
            line,
            had_input: input.is_some(),
            git_cache,
            timings,
        }
    }
}
