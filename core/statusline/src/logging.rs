//! Opt-in debug logging.
//!
//! The statusline is silent unless `STATUSLINE_DEBUG` is set. When it is, all
//! events go to `<log_dir>/<session>.log` through a non-blocking writer; the
//! sweep reaps the file once the session's process is gone.

use std::fs::{DirBuilder, File, OpenOptions};
use std::path::Path;

use statusline_core::{CacheLayout, SessionId, StatuslineConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Installs the file subscriber if debugging is enabled.
///
/// The returned guard must live until exit so buffered lines are flushed.
pub fn init(config: &StatuslineConfig, session: SessionId) -> Option<WorkerGuard> {
    if !config.debug {
        return None;
    }

    let layout = CacheLayout::from_config(config);
    let file = open_log_file(layout.log_dir(), &layout.debug_log_file(session))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init();

    installed.ok().map(|()| guard)
}

fn open_log_file(dir: &Path, path: &Path) -> Option<File> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).ok()?;

    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path).ok()
}
