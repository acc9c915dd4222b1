use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use statusline_core::git::{
    GitCounts, GitStatusCache, RefreshLauncher, Refresher, Repository, StatusProvider,
};
use statusline_core::process::ProcessProbe;
use statusline_core::render::RenderOptions;
use statusline_core::{
    CacheLayout, CacheState, FileStore, Invocation, Payload, SessionCache, SessionId,
    StatusResolver, Sweeper,
};
use tempfile::TempDir;

struct FixedProvider {
    calls: Arc<AtomicUsize>,
}

impl StatusProvider for FixedProvider {
    fn status(&self, _repo: &Repository) -> GitCounts {
        self.calls.fetch_add(1, Ordering::SeqCst);
        GitCounts {
            modified: 1,
            staged: 0,
            ahead: 2,
            behind: 0,
        }
    }
}

struct NoLaunch;

impl RefreshLauncher for NoLaunch {
    fn launch(&self, _repo: &Repository) {}
}

struct CountingProbe {
    alive: HashSet<u32>,
    calls: Arc<AtomicUsize>,
}

impl ProcessProbe for CountingProbe {
    fn is_alive(&self, pid: u32) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.alive.contains(&pid)
    }
}

struct Harness {
    temp: TempDir,
    layout: CacheLayout,
    git_calls: Arc<AtomicUsize>,
    probe_calls: Arc<AtomicUsize>,
}

impl Harness {
    fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let layout = CacheLayout::with_root(&temp.path().join("state"));
        Self {
            temp,
            layout,
            git_calls: Arc::new(AtomicUsize::new(0)),
            probe_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn resolver(&self) -> StatusResolver<FileStore> {
        let store = Arc::new(FileStore::new(self.layout.clone()));
        let provider = Arc::new(FixedProvider {
            calls: Arc::clone(&self.git_calls),
        });
        let git = GitStatusCache::new(
            Refresher::new(Arc::clone(&store), provider),
            Box::new(NoLaunch),
            Duration::from_secs(5),
        );
        StatusResolver::new(SessionCache::new(store), git)
    }

    fn invocation(&self, session: u32, alive: &[u32]) -> Invocation<FileStore, CountingProbe> {
        let probe = CountingProbe {
            alive: alive.iter().copied().collect(),
            calls: Arc::clone(&self.probe_calls),
        };
        Invocation::new(
            SessionId::new(session),
            Sweeper::new(self.layout.clone(), probe, Duration::from_secs(300)),
            self.resolver(),
            RenderOptions::default(),
        )
    }

    fn repo(&self) -> String {
        let root = self.temp.path().join("project");
        fs_err::create_dir_all(root.join(".git/logs/refs")).unwrap();
        fs_err::write(root.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        fs_err::write(root.join(".git/index"), b"DIRC").unwrap();
        fs_err::write(root.join(".git/logs/refs/stash"), "one\ntwo\n").unwrap();
        root.to_string_lossy().into_owned()
    }
}

fn payload(json: &str) -> Payload {
    Payload::decode(json.as_bytes())
}

fn input(json: &str) -> impl FnOnce() -> Option<Vec<u8>> + '_ {
    move || Some(json.as_bytes().to_vec())
}

#[test]
fn test_transient_cost_drop_keeps_high_water_mark() {
    let harness = Harness::new();
    let resolver = harness.resolver();
    let session = SessionId::new(4242);

    let first = resolver.resolve(
        session,
        Some(&payload(r#"{"total_cost_usd": 2.5, "total_lines_added": 10}"#)),
        1_000,
    );
    assert_eq!(first.cost_usd, 2.5);
    assert_eq!(first.lines_added, 10);

    let second = resolver.resolve(session, Some(&payload(r#"{"total_cost_usd": 1.0}"#)), 1_001);
    assert_eq!(second.cost_usd, 2.5);
    assert_eq!(second.lines_added, 10);
}

#[test]
fn test_numeric_fields_never_decrease_across_payloads() {
    let harness = Harness::new();
    let resolver = harness.resolver();
    let session = SessionId::new(77);
    let payloads = [
        r#"{"cost":{"total_cost_usd":0.4,"total_duration_ms":1000}}"#,
        r#"{"context_window":{"used_percentage":12,"context_window_size":200000}}"#,
        r#"{"cost":{"total_cost_usd":0.2,"total_lines_added":5,"total_lines_removed":1}}"#,
        r#"{}"#,
        r#"{"cost":{"total_duration_ms":500},"context_window":{"used_percentage":3}}"#,
        r#"{"cost":{"total_cost_usd":1.7,"total_lines_added":4,"total_duration_ms":9000}}"#,
        r#"not json at all"#,
        r#"{"context_window":{"used_percentage":55,"context_window_size":0}}"#,
    ];

    let mut previous = resolver.session_state(session, None, 0);
    for (step, json) in payloads.iter().enumerate() {
        let next = resolver.session_state(session, Some(&payload(json)), step as i64 + 1);
        assert!(next.cost_usd >= previous.cost_usd, "cost dropped at {step}");
        assert!(next.lines_added >= previous.lines_added, "added dropped at {step}");
        assert!(next.lines_removed >= previous.lines_removed, "removed dropped at {step}");
        assert!(next.duration_ms >= previous.duration_ms, "duration dropped at {step}");
        assert!(next.used_percent >= previous.used_percent, "percent dropped at {step}");
        assert!(next.context_size >= previous.context_size, "size dropped at {step}");
        previous = next;
    }
    assert_eq!(previous.cost_usd, 1.7);
    assert_eq!(previous.used_percent, 55);
    assert_eq!(previous.context_size, 200_000);
}

#[test]
fn test_missing_input_renders_from_cache() {
    let harness = Harness::new();
    let invocation = harness.invocation(500, &[500]);

    let drawn = invocation.run(input(
        r#"{"model":{"display_name":"Opus"},"workspace":{"current_dir":"/tmp/nowhere"},"cost":{"total_cost_usd":3.25}}"#,
    ));
    assert!(drawn.had_input);
    assert!(drawn.line.contains("Opus"));

    let redrawn = invocation.run(|| None);
    assert!(!redrawn.had_input);
    assert!(redrawn.line.contains("Opus"));
    assert!(redrawn.line.contains("3.25"));
    assert_eq!(redrawn.git_cache, None);
}

#[test]
fn test_repository_draws_use_git_cache() {
    let harness = Harness::new();
    let repo = harness.repo();
    let invocation = harness.invocation(600, &[600]);
    let json = format!(r#"{{"workspace":{{"current_dir":"{repo}"}},"model":{{"display_name":"Sonnet"}}}}"#);

    let first = invocation.run(input(&json));
    let second = invocation.run(input(&json));

    assert_eq!(first.git_cache, Some(CacheState::Miss));
    assert_eq!(second.git_cache, Some(CacheState::Valid));
    assert_eq!(harness.git_calls.load(Ordering::SeqCst), 1);
    assert!(second.line.contains("main"));
    assert!(second.line.contains("\u{2191}2"));
    assert!(second.line.contains("\u{f01c}2"));
}

#[test]
fn test_sweep_runs_once_per_interval_and_reaps_dead_sessions() {
    let harness = Harness::new();
    let resolver = harness.resolver();
    for pid in [700, 701] {
        resolver.session_state(SessionId::new(pid), Some(&payload(r#"{"total_cost_usd":1}"#)), 1);
    }

    let invocation = harness.invocation(700, &[700]);
    invocation.run(|| None);
    let probes = harness.probe_calls.load(Ordering::SeqCst);
    assert!(probes >= 2);

    for _ in 0..10 {
        invocation.run(|| None);
    }
    assert_eq!(harness.probe_calls.load(Ordering::SeqCst), probes);

    assert!(harness
        .layout
        .session_cache_file(SessionId::new(700))
        .exists());
    assert!(!harness
        .layout
        .session_cache_file(SessionId::new(701))
        .exists());
}
