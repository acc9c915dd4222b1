//! Periodic removal of caches left behind by dead sessions.
//!
//! A session cache is named after the process that owns it, so once that
//! process is gone the file can never be read again. The sweep runs at most
//! once per interval, gated on the sentinel's mtime, and touches the sentinel
//! before scanning so overlapping invocations mostly skip. Git caches are
//! keyed by repository and are never swept.

use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::error::{Result, StatuslineError};
use crate::process::ProcessProbe;
use crate::session::SessionId;
use crate::storage::{CacheLayout, DEBUG_LOG_SUFFIX, SESSION_CACHE_PREFIX};

/// Results from a sweep attempt.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepStats {
    /// False when the interval had not elapsed and nothing was scanned.
    pub ran: bool,
    /// Session cache files removed (dead owner).
    pub session_caches_removed: u32,
    /// Debug logs removed (dead owner).
    pub logs_removed: u32,
    /// Errors encountered while sweeping.
    pub errors: Vec<String>,
}

/// True when no sweep has run yet or the last one is at least `interval` old.
/// A sentinel stamped in the future counts as recent.
pub fn is_due(last_run: Option<SystemTime>, now: SystemTime, interval: Duration) -> bool {
    match last_run {
        None => true,
        Some(last) => now
            .duration_since(last)
            .map_or(false, |elapsed| elapsed >= interval),
    }
}

pub struct Sweeper<P> {
    layout: CacheLayout,
    probe: P,
    interval: Duration,
}

impl<P: ProcessProbe> Sweeper<P> {
    pub fn new(layout: CacheLayout, probe: P, interval: Duration) -> Self {
        Self {
            layout,
            probe,
            interval,
        }
    }

    pub fn run_if_due(&self) -> SweepStats {
        self.run_if_due_at(SystemTime::now())
    }

    pub fn run_if_due_at(&self, now: SystemTime) -> SweepStats {
        let sentinel = self.layout.sweep_sentinel();
        let last_run = std::fs::metadata(&sentinel)
            .and_then(|metadata| metadata.modified())
            .ok();
        if !is_due(last_run, now, self.interval) {
            return SweepStats::default();
        }

        let mut stats = SweepStats {
            ran: true,
            ..SweepStats::default()
        };
        if let Err(err) = touch(&sentinel, now) {
            stats.errors.push(err.to_string());
        }

        stats.session_caches_removed = self.reap(
            self.layout.cache_dir(),
            |name| name.strip_prefix(SESSION_CACHE_PREFIX),
            &mut stats.errors,
        );
        stats.logs_removed = self.reap(
            self.layout.log_dir(),
            |name| name.strip_suffix(DEBUG_LOG_SUFFIX),
            &mut stats.errors,
        );

        tracing::debug!(
            sessions = stats.session_caches_removed,
            logs = stats.logs_removed,
            "Sweep complete"
        );
        stats
    }

    /// Removes every file in `dir` whose name yields the PID of a dead process.
    fn reap(
        &self,
        dir: &Path,
        owner_of: impl Fn(&str) -> Option<&str>,
        errors: &mut Vec<String>,
    ) -> u32 {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(owner) = name.to_str().and_then(|name| owner_of(name)) else {
                continue;
            };
            let Some(session) = SessionId::parse(owner) else {
                continue;
            };
            if self.probe.is_alive(session.pid()) {
                continue;
            }
            match fs_err::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                // Another invocation's sweep got there first.
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => errors.push(err.to_string()),
            }
        }
        removed
    }
}

fn touch(path: &Path, now: SystemTime) -> Result<()> {
    let open = || {
        std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
    };
    let file = match open() {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                fs_err::create_dir_all(parent)
                    .map_err(|e| StatuslineError::io("create cache directory", e))?;
            }
            open()
        }
        other => other,
    }
    .map_err(|err| StatuslineError::io(format!("touch {}", path.display()), err))?;
    file.set_modified(now)
        .map_err(|err| StatuslineError::io(format!("stamp {}", path.display()), err))
}
