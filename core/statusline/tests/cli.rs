use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use statusline_core::git::GitCacheRecord;
use statusline_core::record::FixedRecord;
use statusline_core::{CacheLayout, Repository};
use tempfile::TempDir;

/// Kills the child if a test bails out before reaping it.
struct ChildGuard {
    child: Child,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

struct Sandbox {
    temp: TempDir,
}

impl Sandbox {
    fn new(extra_config: &str) -> Self {
        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let config = format!(
            "cache_dir = \"{}\"\nlog_dir = \"{}\"\nstdin_timeout_ms = 100\n{extra_config}",
            temp.path().join("cache").display(),
            temp.path().join("logs").display(),
        );
        std::fs::write(temp.path().join("config.toml"), config).expect("Failed to write config");
        Self { temp }
    }

    fn cache_dir(&self) -> PathBuf {
        self.temp.path().join("cache")
    }

    fn log_dir(&self) -> PathBuf {
        self.temp.path().join("logs")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_statusline"));
        command
            .env("STATUSLINE_CONFIG", self.temp.path().join("config.toml"))
            .env_remove("STATUSLINE_CACHE_DIR")
            .env_remove("STATUSLINE_DEBUG")
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        command
    }

    fn repo(&self) -> PathBuf {
        let root = self.temp.path().join("project");
        std::fs::create_dir_all(root.join(".git")).expect("Failed to create .git");
        std::fs::write(root.join(".git/HEAD"), "ref: refs/heads/main\n")
            .expect("Failed to write HEAD");
        std::fs::write(root.join(".git/index"), b"DIRC").expect("Failed to write index");
        root
    }
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait().expect("Failed to poll child") {
            return Some(status);
        }
        sleep(Duration::from_millis(10));
    }
    None
}

fn wait_for_file(dir: &Path, prefix: &str, timeout: Duration) -> PathBuf {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                if entry.file_name().to_string_lossy().starts_with(prefix) {
                    return entry.path();
                }
            }
        }
        sleep(Duration::from_millis(25));
    }
    panic!("Timed out waiting for {prefix}* in {}", dir.display());
}

#[test]
fn test_render_prints_one_line_without_newline() {
    let sandbox = Sandbox::new("");
    let mut child = sandbox
        .command()
        .stdin(Stdio::piped())
        .spawn()
        .expect("Failed to spawn statusline");

    let mut stdin = child.stdin.take().expect("stdin piped");
    stdin
        .write_all(br#"{"model":{"display_name":"Opus"},"cost":{"total_cost_usd":1.25}}"#)
        .expect("Failed to write payload");
    drop(stdin);

    let output = child.wait_with_output().expect("Failed to wait for statusline");
    let line = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(line.contains("Opus"), "unexpected line: {line}");
    assert!(!line.ends_with('\n'));
    assert!(!line.contains('\n'));
}

#[test]
fn test_idle_stdin_pipe_does_not_block_render() {
    let sandbox = Sandbox::new("");
    let mut guard = ChildGuard {
        child: sandbox
            .command()
            .stdin(Stdio::piped())
            .spawn()
            .expect("Failed to spawn statusline"),
    };
    // Hold the write end open without sending anything.
    let _stdin = guard.child.stdin.take().expect("stdin piped");

    let start = Instant::now();
    let status = wait_with_deadline(&mut guard.child, Duration::from_secs(5))
        .expect("statusline blocked on an idle stdin pipe");

    assert!(status.success());
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_trickling_writer_cannot_extend_the_stdin_deadline() {
    let sandbox = Sandbox::new("");
    let mut guard = ChildGuard {
        child: sandbox
            .command()
            .stdin(Stdio::piped())
            .spawn()
            .expect("Failed to spawn statusline"),
    };
    let mut stdin = guard.child.stdin.take().expect("stdin piped");

    // One byte every 40 ms, well inside the 100 ms timeout, for up to 5 s.
    let writer = std::thread::spawn(move || {
        for _ in 0..125 {
            if stdin.write_all(b" ").and_then(|()| stdin.flush()).is_err() {
                return;
            }
            sleep(Duration::from_millis(40));
        }
    });

    let start = Instant::now();
    let status = wait_with_deadline(&mut guard.child, Duration::from_secs(4))
        .expect("statusline kept reading a trickling stdin");
    let elapsed = start.elapsed();

    assert!(status.success());
    assert!(elapsed < Duration::from_secs(2), "render took {elapsed:?}");
    writer.join().expect("writer thread panicked");
}

#[test]
fn test_payload_beyond_read_cap_is_ignored() {
    let sandbox = Sandbox::new("stdin_max_bytes = 64\n");
    let mut child = sandbox
        .command()
        .stdin(Stdio::piped())
        .spawn()
        .expect("Failed to spawn statusline");

    let padding = "x".repeat(200);
    let payload = format!(r#"{{"padding":"{padding}","model":{{"display_name":"Haiku"}}}}"#);
    let mut stdin = child.stdin.take().expect("stdin piped");
    // The reader may exit before taking everything.
    let _ = stdin.write_all(payload.as_bytes());
    drop(stdin);

    let output = child.wait_with_output().expect("Failed to wait for statusline");

    assert!(output.status.success());
    assert!(!String::from_utf8_lossy(&output.stdout).contains("Haiku"));
}

#[test]
fn test_unknown_arguments_still_render_and_exit_zero() {
    let sandbox = Sandbox::new("");
    let output = sandbox
        .command()
        .arg("--bogus")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to run statusline");

    assert!(output.status.success());
    assert!(!output.stdout.is_empty());
}

#[test]
fn test_debug_log_written_only_when_enabled() {
    let sandbox = Sandbox::new("");

    let quiet = sandbox
        .command()
        .stdin(Stdio::null())
        .output()
        .expect("Failed to run statusline");
    assert!(quiet.status.success());
    let has_logs = std::fs::read_dir(sandbox.log_dir())
        .map(|entries| entries.count() > 0)
        .unwrap_or(false);
    assert!(!has_logs, "log written without STATUSLINE_DEBUG");

    let debug = sandbox
        .command()
        .env("STATUSLINE_DEBUG", "1")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to run statusline");
    assert!(debug.status.success());

    let log = wait_for_file(&sandbox.log_dir(), "", Duration::from_secs(2));
    assert!(log.to_string_lossy().ends_with(".log"));
    let content = std::fs::read_to_string(&log).expect("Failed to read debug log");
    assert!(content.contains("timing"), "unexpected log: {content}");
    assert!(content.contains("stdin=\"timeout\"") || content.contains("stdin=timeout"));
}

#[test]
fn test_refresh_git_returns_promptly_and_worker_writes_cache() {
    let sandbox = Sandbox::new("");
    let root = sandbox.repo();

    let mut guard = ChildGuard {
        child: sandbox
            .command()
            .arg("refresh-git")
            .arg("--repo")
            .arg(&root)
            .arg("--cache-dir")
            .arg(sandbox.cache_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .expect("Failed to spawn refresh-git"),
    };

    let status = wait_with_deadline(&mut guard.child, Duration::from_secs(5))
        .expect("refresh-git intermediary did not exit");
    assert!(status.success());

    let record_path = wait_for_file(&sandbox.cache_dir(), "claude-git-", Duration::from_secs(10));
    let repo = Repository::discover(&root).expect("repository");
    let layout = CacheLayout::new(sandbox.cache_dir(), sandbox.log_dir());
    assert_eq!(record_path, layout.git_cache_file(&repo.cache_key()));

    // The worker writes the record in one call; wait until it is whole.
    let deadline = Instant::now() + Duration::from_secs(5);
    let record = loop {
        let bytes = std::fs::read(&record_path).expect("Failed to read git cache");
        if let Some(record) = GitCacheRecord::decode(&bytes) {
            break record;
        }
        assert!(Instant::now() < deadline, "git cache never became readable");
        sleep(Duration::from_millis(25));
    };
    assert_eq!(record.branch, "main");
    assert_eq!(record.repo_path, repo.cache_key());
}
