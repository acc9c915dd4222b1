//! Session identity.
//!
//! The statusline is spawned per draw through a throwaway shell, so our own
//! parent changes every time. The grandparent (the process that launches that
//! shell) is stable for the whole interactive session.
//!
//! ```text
//! claude (session, stable) → sh -c (per draw) → statusline (per draw)
//! ```

use std::fmt;

use crate::process::{parent_of, parent_pid};

/// PID of the process that owns a session's caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u32);

impl SessionId {
    pub fn new(pid: u32) -> Self {
        SessionId(pid)
    }

    pub fn pid(self) -> u32 {
        self.0
    }

    /// Parses a positive decimal PID, e.g. a cache file suffix.
    pub fn parse(value: &str) -> Option<Self> {
        value.parse::<u32>().ok().filter(|&pid| pid > 0).map(SessionId)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolves the current invocation's session.
///
/// Falls back to the immediate parent when the process table can't be read;
/// session scoping gets weaker, never fails.
pub fn resolve_session_id() -> SessionId {
    resolve_with(parent_pid(), parent_of)
}

fn resolve_with(parent: u32, lookup_parent: impl Fn(u32) -> Option<u32>) -> SessionId {
    match lookup_parent(parent) {
        Some(grandparent) if grandparent > 0 => SessionId(grandparent),
        _ => {
            tracing::debug!(parent, "Grandparent unavailable; scoping session to parent");
            SessionId(parent)
        }
    }
}
