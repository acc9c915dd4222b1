//! # statusline-core
//!
//! Core library for the Claude Code statusline: cross-invocation caching and
//! staleness resolution for a program that is re-executed on every prompt
//! draw.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. The only background work is the
//!   detached git refresh, which the caller never awaits.
//! - **Graceful degradation**: Missing or corrupt cache files read as absent,
//!   a failed `git status` reads as zero counts. Every draw renders a line.
//! - **Two cache keys**: the owning session (a PID) and the repository path.
//!   [`storage::CacheLayout`] maps both to files; [`storage::RecordStore`]
//!   abstracts the storage so policies stay testable.
//! - **Lock-free**: records are small, fixed-size and written whole. Merges
//!   only move values upward, so a lost race is repaired on the next draw.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use statusline_core::{resolve_session_id, Invocation, StatuslineConfig};
//!
//! let config = StatuslineConfig::load();
//! let invocation = Invocation::from_config(&config, resolve_session_id());
//! let rendered = invocation.run(|| Some(br#"{"model":{"display_name":"Opus"}}"#.to_vec()));
//! print!("{}", rendered.line);
//! ```

pub mod config;
pub mod error;
pub mod git;
pub mod input;
pub mod invocation;
pub mod process;
pub mod record;
pub mod render;
pub mod resolver;
pub mod session;
pub mod storage;
pub mod sweep;

pub use config::StatuslineConfig;
pub use error::{Result, StatuslineError};
pub use git::{CacheState, GitCounts, GitStatusCache, Repository};
pub use input::Payload;
pub use invocation::{Invocation, PhaseTimings, Rendered};
pub use resolver::{DisplayState, GitDisplay, StatusResolver};
pub use session::{resolve_session_id, SessionCache, SessionId, SessionRecord};
pub use storage::{CacheLayout, FileStore, MemoryStore, RecordStore};
pub use sweep::{SweepStats, Sweeper};
