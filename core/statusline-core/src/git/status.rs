//! The working-tree status query.
//!
//! Runs `git status --porcelain -b -uno` directly (no shell) and counts what
//! it prints. Output beyond the capture limit is dropped; the pipe is closed
//! and git exits on its own. Any failure yields zero counts, since the git
//! segment is best-effort.

use std::io::Read;
use std::process::{Command, Stdio};

use crate::error::{Result, StatuslineError};

use super::Repository;

const STATUS_ARGS: [&str; 4] = ["status", "--porcelain", "-b", "-uno"];

/// Working-tree counts shown in the git segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GitCounts {
    pub modified: u32,
    pub staged: u32,
    pub ahead: u32,
    pub behind: u32,
}

impl GitCounts {
    pub fn is_dirty(&self) -> bool {
        self.modified > 0 || self.staged > 0
    }
}

/// Source of fresh status counts.
pub trait StatusProvider: Send + Sync {
    fn status(&self, repo: &Repository) -> GitCounts;
}

/// Queries the `git` binary on `PATH`.
#[derive(Debug, Clone)]
pub struct GitCli {
    capture_limit: usize,
}

impl GitCli {
    pub fn new(capture_limit: usize) -> Self {
        Self { capture_limit }
    }

    fn run(&self, repo: &Repository) -> Result<Vec<u8>> {
        let mut child = Command::new("git")
            .args(STATUS_ARGS)
            .current_dir(repo.root())
            // Never contend with the user's own git commands for index.lock.
            .env("GIT_OPTIONAL_LOCKS", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| StatuslineError::Spawn {
                command: "git status".to_string(),
                source,
            })?;

        let mut output = Vec::with_capacity(self.capture_limit);
        let read = match child.stdout.take() {
            Some(stdout) => stdout
                .take(self.capture_limit as u64)
                .read_to_end(&mut output)
                .map(|_| ()),
            None => Ok(()),
        };
        // stdout is closed by now, so an over-long listing can't block git.
        let _ = child.wait();

        read.map_err(|err| StatuslineError::io("read git status output", err))?;
        Ok(output)
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(4_096)
    }
}

impl StatusProvider for GitCli {
    fn status(&self, repo: &Repository) -> GitCounts {
        match self.run(repo) {
            Ok(output) => parse_porcelain(&output),
            Err(err) => {
                tracing::debug!(error = %err, repo = %repo.root().display(), "git status failed");
                GitCounts::default()
            }
        }
    }
}

/// Counts porcelain v1 output.
///
/// The `## branch...upstream [ahead N, behind M]` header carries the
/// divergence. For file lines, column one non-blank means staged and column
/// two non-blank means modified; `?` counts as blank in both.
pub fn parse_porcelain(output: &[u8]) -> GitCounts {
    let mut counts = GitCounts::default();

    for line in output.split(|&b| b == b'\n') {
        if line.len() < 2 {
            continue;
        }
        if line.starts_with(b"##") {
            if let Some(bracket) = line.iter().position(|&b| b == b'[') {
                let tracking = &line[bracket..];
                counts.ahead = number_after(tracking, b"ahead ").unwrap_or(0);
                counts.behind = number_after(tracking, b"behind ").unwrap_or(0);
            }
            continue;
        }
        if !matches!(line[0], b' ' | b'?') {
            counts.staged += 1;
        }
        if !matches!(line[1], b' ' | b'?') {
            counts.modified += 1;
        }
    }

    counts
}

fn number_after(haystack: &[u8], needle: &[u8]) -> Option<u32> {
    let start = haystack
        .windows(needle.len())
        .position(|window| window == needle)?
        + needle.len();
    let digits = haystack[start..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    std::str::from_utf8(&haystack[start..start + digits])
        .ok()?
        .parse()
        .ok()
}
