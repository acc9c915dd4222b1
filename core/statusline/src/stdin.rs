//! Bounded, deadline-limited read of the payload on stdin.
//!
//! Claude Code writes the payload into a pipe and closes it. When the
//! statusline is run by hand (or the writer is slow) nothing may arrive at
//! all; after `timeout` without data the draw proceeds from cache.

use std::io::Read;
use std::time::{Duration, Instant};

/// Reads at most `max_bytes`. `None` if nothing arrived within `timeout`.
///
/// `timeout` bounds the whole read, not each chunk: a writer trickling bytes
/// cannot hold the draw past the deadline. Whatever arrived by then is kept.
pub fn read_payload(timeout: Duration, max_bytes: usize) -> Option<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut buffer = vec![0u8; max_bytes];
    let mut filled = 0;
    let mut stdin = std::io::stdin().lock();

    while filled < max_bytes {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || !wait_readable(remaining) {
            break;
        }
        match stdin.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                tracing::debug!(error = %err, "stdin read failed");
                break;
            }
        }
    }

    if filled == 0 {
        return None;
    }
    buffer.truncate(filled);
    Some(buffer)
}

#[cfg(unix)]
fn wait_readable(timeout: Duration) -> bool {
    let mut fd = libc::pollfd {
        fd: libc::STDIN_FILENO,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
    // SAFETY: `fd` is a valid pollfd and the count matches.
    #[allow(unsafe_code)]
    let ready = unsafe { libc::poll(&mut fd, 1, millis) };
    // POLLHUP with no data still lets read() return 0, which ends the loop.
    ready > 0 && fd.revents & (libc::POLLIN | libc::POLLHUP) != 0
}

#[cfg(not(unix))]
fn wait_readable(_timeout: Duration) -> bool {
    true
}
