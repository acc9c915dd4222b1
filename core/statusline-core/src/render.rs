//! Powerline-style rendering of a [`DisplayState`].
//!
//! Segments are written straight into one pre-sized `String`; each segment's
//! body is a closure over that buffer, so nothing is formatted twice and no
//! intermediate strings are built. Colors follow the Dracula palette.

use std::fmt::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, TimeZone};

use crate::config::StatuslineConfig;
use crate::git::GitCounts;
use crate::resolver::{DisplayState, GitDisplay};

const LINE_CAPACITY: usize = 4_096;
const BAR_WIDTH: i64 = 10;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const SEPARATOR: char = '\u{e0b4}';

const ICON_BRANCH: char = '\u{f126}';
const ICON_FOLDER: char = '\u{f07c}';
const ICON_DOLLAR: char = '\u{f155}';
const ICON_CLOCK: char = '\u{f017}';
const ICON_DIFF: char = '\u{f440}';
const ICON_STASH: char = '\u{f01c}';
const ICON_INSERT: char = '\u{f040}';
const ICON_NORMAL: char = '\u{e7c5}';
const ICON_STAGED: char = '\u{f00c}';
const ICON_MODIFIED: char = '\u{f040}';
const ICON_WARN: char = '\u{f071}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rgb(u8, u8, u8);

const PURPLE: Rgb = Rgb(189, 147, 249);
const ORANGE: Rgb = Rgb(255, 184, 108);
const DARK: Rgb = Rgb(68, 71, 90);
const GREEN_BG: Rgb = Rgb(72, 209, 104);
const MINT: Rgb = Rgb(40, 167, 69);
const RED: Rgb = Rgb(255, 85, 85);
const YELLOW: Rgb = Rgb(241, 250, 140);
const CYAN: Rgb = Rgb(139, 233, 253);
const BLACK: Rgb = Rgb(40, 42, 54);
const WHITE: Rgb = Rgb(248, 248, 242);
const GREEN: Rgb = Rgb(80, 250, 123);
const COMMENT: Rgb = Rgb(98, 114, 164);

struct Fg(Rgb);
struct Bg(Rgb);

impl fmt::Display for Fg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Rgb(r, g, b) = self.0;
        write!(f, "\x1b[38;2;{r};{g};{b}m")
    }
}

impl fmt::Display for Bg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Rgb(r, g, b) = self.0;
        write!(f, "\x1b[48;2;{r};{g};{b}m")
    }
}

/// Knobs the renderer takes from the environment.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub branch_max_chars: usize,
    /// Replaced by `~` in the path segment.
    pub home: Option<PathBuf>,
}

impl RenderOptions {
    pub fn from_config(config: &StatuslineConfig) -> Self {
        Self {
            branch_max_chars: config.branch_max_chars,
            home: dirs::home_dir(),
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            branch_max_chars: 20,
            home: None,
        }
    }
}

/// Writes segments, drawing the rounded transition between neighbours.
struct Line<'a> {
    out: &'a mut String,
    previous: Option<Rgb>,
}

impl<'a> Line<'a> {
    fn new(out: &'a mut String) -> Self {
        Self {
            out,
            previous: None,
        }
    }

    fn segment(
        &mut self,
        background: Rgb,
        foreground: Option<Rgb>,
        body: impl FnOnce(&mut String) -> fmt::Result,
    ) -> fmt::Result {
        if let Some(previous) = self.previous {
            write!(self.out, "{}{}{SEPARATOR}{RESET}", Bg(background), Fg(previous))?;
        }
        write!(self.out, "{}", Bg(background))?;
        if let Some(foreground) = foreground {
            write!(self.out, "{}", Fg(foreground))?;
        }
        self.out.push(' ');
        body(&mut *self.out)?;
        self.out.push(' ');
        self.out.push_str(RESET);
        self.previous = Some(background);
        Ok(())
    }

    fn finish(self) -> fmt::Result {
        if let Some(previous) = self.previous {
            write!(self.out, "{}{SEPARATOR}{RESET}", Fg(previous))?;
        }
        Ok(())
    }
}

/// Renders the full statusline (without the timing suffix).
pub fn render(state: &DisplayState, options: &RenderOptions) -> String {
    let mut out = String::with_capacity(LINE_CAPACITY);
    // fmt::Write into a String cannot fail.
    let _ = render_into(&mut out, state, options);
    out
}

pub fn render_into(out: &mut String, state: &DisplayState, options: &RenderOptions) -> fmt::Result {
    let mut line = Line::new(out);

    if let Some(mode) = &state.vim_mode {
        if mode == "INSERT" {
            line.segment(GREEN_BG, Some(BLACK), |out| {
                write!(out, "{BOLD}{ICON_INSERT} {mode}")
            })?;
        } else {
            line.segment(DARK, Some(WHITE), |out| write!(out, "{ICON_NORMAL} {mode}"))?;
        }
    }

    line.segment(PURPLE, Some(BLACK), |out| write!(out, "{BOLD}{}", state.model))?;

    line.segment(DARK, Some(WHITE), |out| {
        write!(
            out,
            "{ICON_FOLDER} {}",
            abbreviate_path(&state.working_directory, options.home.as_deref())
        )
    })?;

    if let Some(git) = &state.git {
        git_segments(&mut line, git, options.branch_max_chars)?;
    }

    line.segment(cost_background(state.cost_usd), Some(BLACK), |out| {
        write!(out, "{ICON_DOLLAR} {:.2}", state.cost_usd)
    })?;

    if state.lines_added > 0 || state.lines_removed > 0 {
        line.segment(DARK, None, |out| {
            write!(
                out,
                "{}{ICON_DIFF} {}+{} {}-{}",
                Fg(WHITE),
                Fg(GREEN),
                state.lines_added,
                Fg(RED),
                state.lines_removed
            )
        })?;
    }

    if state.duration_ms > 0 {
        line.segment(DARK, Some(WHITE), |out| {
            write!(out, "{ICON_CLOCK} ")?;
            write_duration(out, state.duration_ms)?;
            if state.last_update_secs > 0 {
                write!(out, " {}| {}", Fg(COMMENT), Fg(WHITE))?;
                write_clock(out, state.last_update_secs)?;
            }
            Ok(())
        })?;
    }

    line.segment(DARK, None, |out| {
        write_context_bar(out, state.used_percent, state.context_size)
    })?;

    if let Some((background, bold, label)) = context_warning(state.used_percent) {
        line.segment(background, Some(BLACK), |out| {
            if bold {
                out.push_str(BOLD);
            }
            write!(out, "{ICON_WARN} {label}")
        })?;
    }

    line.finish()
}

fn git_segments(line: &mut Line<'_>, git: &GitDisplay, branch_max_chars: usize) -> fmt::Result {
    let background = if git.counts.is_dirty() { ORANGE } else { GREEN_BG };
    line.segment(background, Some(BLACK), |out| {
        out.push(ICON_BRANCH);
        out.push(' ');
        write_truncated_branch(out, &git.branch, branch_max_chars);
        Ok(())
    })?;

    let GitCounts {
        modified,
        staged,
        ahead,
        behind,
    } = git.counts;
    let items = [
        (ahead, Fg(GREEN), '\u{2191}'),
        (behind, Fg(RED), '\u{2193}'),
        (staged, Fg(GREEN), ICON_STAGED),
        (modified, Fg(ORANGE), ICON_MODIFIED),
    ];
    if items.iter().all(|(count, ..)| *count == 0) && git.stashes == 0 {
        return Ok(());
    }

    line.segment(DARK, None, |out| {
        let mut first = true;
        for (count, color, icon) in &items {
            if *count == 0 {
                continue;
            }
            if !first {
                out.push(' ');
            }
            write!(out, "{color}{icon}{count}")?;
            first = false;
        }
        if git.stashes > 0 {
            if !first {
                out.push(' ');
            }
            write!(out, "{}{ICON_STASH}{}", Fg(PURPLE), git.stashes)?;
        }
        Ok(())
    })
}

fn write_truncated_branch(out: &mut String, branch: &str, max_chars: usize) {
    if branch.chars().count() <= max_chars {
        out.push_str(branch);
        return;
    }
    out.extend(branch.chars().take(max_chars.saturating_sub(3)));
    out.push_str("...");
}

fn cost_background(cost_usd: f64) -> Rgb {
    if cost_usd >= 10.0 {
        RED
    } else if cost_usd >= 5.0 {
        ORANGE
    } else if cost_usd >= 1.0 {
        CYAN
    } else {
        MINT
    }
}

fn context_warning(used_percent: i64) -> Option<(Rgb, bool, &'static str)> {
    match used_percent {
        p if p >= 95 => Some((RED, true, "CRITICAL COMPACT")),
        p if p >= 90 => Some((RED, true, "LOW CTX COMPACT")),
        p if p >= 80 => Some((YELLOW, false, "CTX 80%+")),
        _ => None,
    }
}

fn fill_color(percent: i64) -> Rgb {
    match percent {
        p if p >= 90 => RED,
        p if p >= 80 => ORANGE,
        p if p >= 50 => YELLOW,
        _ => GREEN,
    }
}

/// `Nk ╺━━━ P% ┄┄┄┄┄┄┄╸ 200k`
fn write_context_bar(out: &mut String, used_percent: i64, context_size: i64) -> fmt::Result {
    let clamped = used_percent.clamp(0, 100);
    let filled = clamped * BAR_WIDTH / 100;
    let color = Fg(fill_color(clamped));

    let used_tokens = used_percent.saturating_mul(context_size) / 100;
    write!(out, "{color}{}k \u{257a}", (used_tokens + 500) / 1000)?;
    for _ in 0..filled {
        out.push('\u{2501}');
    }
    write!(out, " {clamped}% {}", Fg(COMMENT))?;
    for _ in filled..BAR_WIDTH {
        out.push('\u{2504}');
    }
    write!(out, "\u{2578}{color} ")?;
    if context_size >= 1_000_000 {
        write!(out, "{}M", context_size / 1_000_000)
    } else {
        write!(out, "{}k", context_size / 1_000)
    }
}

fn write_duration(out: &mut String, ms: i64) -> fmt::Result {
    match ms {
        ms if ms < 1_000 => write!(out, "{ms}ms"),
        ms if ms < 60_000 => write!(out, "{:.1}s", ms as f64 / 1_000.0),
        ms if ms < 3_600_000 => write!(out, "{}m{}s", ms / 60_000, (ms % 60_000) / 1_000),
        ms => write!(out, "{}h{}m", ms / 3_600_000, (ms % 3_600_000) / 60_000),
    }
}

/// `h:mm:ss AM` in local time.
fn write_clock(out: &mut String, unix_secs: i64) -> fmt::Result {
    match Local.timestamp_opt(unix_secs, 0).single() {
        Some(time) => write!(out, "{}", time.format("%-I:%M:%S %p")),
        None => Ok(()),
    }
}

/// Shortens a path for display.
///
/// The home directory becomes `~`; every component except the last is cut to
/// its first character (`~` itself is kept): `/usr/local/bin` → `/u/l/bin`.
pub fn abbreviate_path(path: &str, home: Option<&std::path::Path>) -> String {
    let home = home
        .and_then(|home| home.to_str())
        .map(|home| home.trim_end_matches('/'))
        .filter(|home| !home.is_empty());
    let working = match home.and_then(|home| path.strip_prefix(home)) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => format!("~{rest}"),
        _ => path.to_string(),
    };

    if working.len() <= 1 || !working.contains('/') {
        return working;
    }

    let mut out = String::with_capacity(working.len());
    let mut components = working.split('/').peekable();
    while let Some(component) = components.next() {
        let is_last = components.peek().is_none();
        if is_last || component.starts_with('~') {
            out.push_str(component);
        } else if let Some(first) = component.chars().next() {
            out.push(first);
        }
        if !is_last {
            out.push('/');
        }
    }
    out
}

/// Appends the dim render-time suffix: `123us` below a millisecond, else `1.2ms`.
pub fn write_timing_suffix(out: &mut String, elapsed: Duration) -> fmt::Result {
    let micros = elapsed.as_micros();
    write!(out, "  {}", Fg(COMMENT))?;
    if micros >= 1_000 {
        write!(out, "{:.1}ms", micros as f64 / 1_000.0)?;
    } else {
        write!(out, "{micros}us")?;
    }
    out.push_str(RESET);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::CacheState;
    use std::path::Path;

    /// Drops ANSI escape sequences, leaving the visible text.
    fn visible(line: &str) -> String {
        let mut out = String::new();
        let mut chars = line.chars();
        while let Some(c) = chars.next() {
            if c == '\x1b' {
                for c in chars.by_ref() {
                    if c == 'm' {
                        break;
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    fn state() -> DisplayState {
        DisplayState {
            working_directory: "/work/app".to_string(),
            model: "Opus".to_string(),
            cost_usd: 2.5,
            used_percent: 42,
            context_size: 200_000,
            ..DisplayState::default()
        }
    }

    #[test]
    fn abbreviates_all_but_last_component() {
        assert_eq!(abbreviate_path("/usr/local/bin", None), "/u/l/bin");
        assert_eq!(abbreviate_path("/", None), "/");
        assert_eq!(abbreviate_path("relative", None), "relative");
        assert_eq!(abbreviate_path("/usr/", None), "/u/");
    }

    #[test]
    fn substitutes_home_on_component_boundary() {
        let home = Path::new("/home/dev");
        assert_eq!(abbreviate_path("/home/dev", Some(home)), "~");
        assert_eq!(abbreviate_path("/home/dev/code/project", Some(home)), "~/c/project");
        assert_eq!(abbreviate_path("/home/devon/code", Some(home)), "/h/d/code");
    }

    #[test]
    fn formats_durations() {
        let cases = [
            (450, "450ms"),
            (1_500, "1.5s"),
            (125_000, "2m5s"),
            (7_500_000, "2h5m"),
        ];
        for (ms, expected) in cases {
            let mut out = String::new();
            write_duration(&mut out, ms).unwrap();
            assert_eq!(out, expected);
        }
    }

    #[test]
    fn context_bar_shows_usage_and_size() {
        let mut out = String::new();
        write_context_bar(&mut out, 42, 200_000).unwrap();
        assert_eq!(visible(&out), "84k ╺━━━━ 42% ┄┄┄┄┄┄╸ 200k");

        let mut out = String::new();
        write_context_bar(&mut out, 130, 1_000_000).unwrap();
        assert_eq!(visible(&out), "1300k ╺━━━━━━━━━━ 100% ╸ 1M");
    }

    #[test]
    fn truncates_long_branch_names() {
        let mut out = String::new();
        write_truncated_branch(&mut out, "feature/very-long-branch-name", 20);
        assert_eq!(out, "feature/very-long...");
        assert_eq!(out.chars().count(), 20);

        let mut out = String::new();
        write_truncated_branch(&mut out, "main", 20);
        assert_eq!(out, "main");
    }

    #[test]
    fn renders_segments_in_order() {
        let mut state = state();
        state.vim_mode = Some("INSERT".to_string());
        state.lines_added = 12;
        state.lines_removed = 4;
        state.git = Some(GitDisplay {
            branch: "main".to_string(),
            counts: GitCounts {
                modified: 2,
                staged: 1,
                ahead: 3,
                behind: 0,
            },
            stashes: 1,
            cache_state: CacheState::Valid,
        });

        let text = visible(&render(&state, &RenderOptions::default()));
        let insert = text.find("INSERT").unwrap();
        let model = text.find("Opus").unwrap();
        let path = text.find("/w/app").unwrap();
        let branch = text.find("main").unwrap();
        let cost = text.find("2.50").unwrap();
        let lines = text.find("+12 -4").unwrap();
        let bar = text.find("42%").unwrap();
        assert!(insert < model && model < path && path < branch);
        assert!(branch < cost && cost < lines && lines < bar);
        assert!(text.contains("↑3 \u{f00c}1 \u{f040}2 \u{f01c}1"));
        assert!(!text.contains('↓'));
        assert!(text.ends_with(SEPARATOR));
    }

    #[test]
    fn clean_repository_has_no_counts_segment() {
        let mut state = state();
        state.git = Some(GitDisplay {
            branch: "main".to_string(),
            counts: GitCounts::default(),
            stashes: 0,
            cache_state: CacheState::Miss,
        });
        let line = render(&state, &RenderOptions::default());
        assert!(line.contains(&Bg(GREEN_BG).to_string()));
        assert!(!line.contains(&Bg(ORANGE).to_string()));
    }

    #[test]
    fn warning_thresholds() {
        assert_eq!(context_warning(79), None);
        assert_eq!(context_warning(80).map(|w| w.2), Some("CTX 80%+"));
        assert_eq!(context_warning(90).map(|w| w.2), Some("LOW CTX COMPACT"));
        assert_eq!(context_warning(99).map(|w| w.2), Some("CRITICAL COMPACT"));
    }

    #[test]
    fn cost_colors_by_threshold() {
        assert_eq!(cost_background(0.5), MINT);
        assert_eq!(cost_background(1.0), CYAN);
        assert_eq!(cost_background(5.0), ORANGE);
        assert_eq!(cost_background(12.0), RED);
    }

    #[test]
    fn duration_segment_includes_local_clock() {
        let mut state = state();
        state.duration_ms = 45_000;
        state.last_update_secs = 1_700_000_000;
        let expected = Local
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .unwrap()
            .format("%-I:%M:%S %p")
            .to_string();

        let text = visible(&render(&state, &RenderOptions::default()));
        assert!(text.contains(&format!("45.0s | {expected}")));
    }

    #[test]
    fn timing_suffix_switches_units() {
        let mut out = String::new();
        write_timing_suffix(&mut out, Duration::from_micros(850)).unwrap();
        assert_eq!(visible(&out), "  850us");

        let mut out = String::new();
        write_timing_suffix(&mut out, Duration::from_micros(1_240)).unwrap();
        assert_eq!(visible(&out), "  1.2ms");
    }
}
