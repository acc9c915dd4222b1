//! Per-session state.
//!
//! A statusline process lives for one prompt draw. The "session" is the
//! interactive context that spawns those draws, identified by a stable
//! ancestor PID. Each session owns one fixed-size record holding the
//! high-water mark of everything the payloads have reported so far.
//!
//! - [`identity`]: resolves the owning session's PID
//! - [`cache`]: the record, its monotonic merge, and read/write

mod cache;
mod identity;

pub use cache::{merge, SessionCache, SessionRecord, MODEL_BYTES, WORKING_DIRECTORY_BYTES};
pub use identity::{resolve_session_id, SessionId};
