//! Repository discovery and cheap reads from the git directory.
//!
//! Everything here reads files directly; nothing spawns git.

use std::path::{Path, PathBuf};

use crate::storage::normalize_path;

const HEADS_PREFIX: &str = "ref: refs/heads/";
const SHORT_SHA_LEN: usize = 7;

/// Modification time of `.git/index`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStamp {
    pub secs: i64,
    pub nanos: i64,
}

/// A working tree and the git directory that backs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    root: PathBuf,
    git_dir: PathBuf,
}

impl Repository {
    /// Walks from `start` up to the first directory containing `.git`.
    ///
    /// A `.git` directory is used as-is; a `.git` file (worktrees,
    /// submodules) is followed through its `gitdir:` line. A directory without
    /// a readable `HEAD` is not treated as a repository.
    pub fn discover(start: &Path) -> Option<Repository> {
        for dir in start.ancestors() {
            let dot_git = dir.join(".git");
            let git_dir = if dot_git.is_dir() {
                dot_git
            } else if dot_git.is_file() {
                match read_gitdir_file(&dot_git, dir) {
                    Some(path) => path,
                    None => continue,
                }
            } else {
                continue;
            };

            if !git_dir.join("HEAD").is_file() {
                return None;
            }
            return Some(Repository {
                root: dir.to_path_buf(),
                git_dir,
            });
        }
        None
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Normalized root path; the identity of this repository's cache entry.
    pub fn cache_key(&self) -> String {
        normalize_path(&self.root.to_string_lossy())
    }

    pub fn index_stamp(&self) -> Option<IndexStamp> {
        let metadata = std::fs::metadata(self.git_dir.join("index")).ok()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Some(IndexStamp {
                secs: metadata.mtime(),
                nanos: metadata.mtime_nsec(),
            })
        }
        #[cfg(not(unix))]
        {
            let since_epoch = metadata
                .modified()
                .ok()?
                .duration_since(std::time::UNIX_EPOCH)
                .ok()?;
            Some(IndexStamp {
                secs: since_epoch.as_secs() as i64,
                nanos: i64::from(since_epoch.subsec_nanos()),
            })
        }
    }

    /// Current branch name, or a short SHA when HEAD is detached.
    pub fn branch(&self) -> Option<String> {
        let head = std::fs::read_to_string(self.git_dir.join("HEAD")).ok()?;
        parse_head(&head)
    }

    /// Entries in the stash reflog.
    pub fn stash_count(&self) -> u64 {
        let path = self.git_dir.join("logs").join("refs").join("stash");
        match std::fs::read(path) {
            Ok(bytes) => bytes.iter().filter(|&&b| b == b'\n').count() as u64,
            Err(_) => 0,
        }
    }
}

/// Extracts the branch from the contents of a HEAD file.
pub fn parse_head(contents: &str) -> Option<String> {
    let head = contents.trim_end_matches(['\n', '\r', ' ']);

    if let Some(branch) = head.strip_prefix(HEADS_PREFIX) {
        return (!branch.is_empty()).then(|| branch.to_string());
    }
    if let Some(reference) = head.strip_prefix("ref: ") {
        return reference.rsplit('/').next().map(str::to_string);
    }
    head.get(..SHORT_SHA_LEN).map(str::to_string)
}

fn read_gitdir_file(dot_git: &Path, worktree: &Path) -> Option<PathBuf> {
    let contents = std::fs::read_to_string(dot_git).ok()?;
    let target = contents
        .lines()
        .find_map(|line| line.strip_prefix("gitdir:"))?
        .trim();
    if target.is_empty() {
        return None;
    }
    let target = Path::new(target);
    Some(if target.is_absolute() {
        target.to_path_buf()
    } else {
        worktree.join(target)
    })
}
