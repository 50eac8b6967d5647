//! Terminal logging with colored prefixes and progress display.
//!
//! - `log!` / `debug!` for prefixed lines (`debug!` only after [`set_verbose`])
//! - `status_*` for the single status block of a dev session
//! - [`ProgressLine`] for the per-kind emit counters of a build
//!
//! # Example
//!
//! ```ignore
//! log!("build"; "cooked {} urls", count);
//! status_success("hot update: util.js");
//!
//! let progress = ProgressLine::new(&[("html", 3), ("js_module", 12)]);
//! progress.inc("html");
//! progress.finish();
//! ```

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    io::{Write, stdout},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// A progress line owns the bottom terminal line; `log` prints above it.
static PROGRESS_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Enable `debug!` output.
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macros
// ============================================================================

/// Log a message with a colored module prefix
///
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Like `log!`, but only in verbose mode. Arguments are not evaluated otherwise.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module);
    let mut stdout = stdout().lock();

    if PROGRESS_ACTIVE.load(Ordering::SeqCst) {
        execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
    }
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

fn colorize_prefix(module: &str) -> String {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "dev" => prefix.bright_blue().bold().to_string(),
        "reload" => prefix.bright_green().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        "warning" => prefix.bright_magenta().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Dev Status Block
// ============================================================================

/// Lines printed by the previous status message; the next one replaces them.
static STATUS_LINES: Mutex<usize> = parking_lot::const_mutex(0);

/// `secs` since the epoch as UTC `HH:MM:SS`.
fn clock(secs: u64) -> String {
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

fn line_count(message: &str) -> usize {
    message.matches('\n').count() + 1
}

fn show_status(symbol: Option<String>, message: &str) {
    use std::time::SystemTime;

    let mut previous = STATUS_LINES.lock();
    let mut stdout = stdout().lock();
    if *previous > 0 {
        let lines = u16::try_from(*previous).unwrap_or(u16::MAX);
        execute!(stdout, cursor::MoveUp(lines), Clear(ClearType::FromCursorDown)).ok();
    }

    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    let timestamp = format!("[{}]", clock(secs)).dimmed().to_string();
    match symbol {
        Some(symbol) => writeln!(stdout, "{timestamp} {symbol} {message}").ok(),
        None => writeln!(stdout, "{timestamp} {message}").ok(),
    };
    stdout.flush().ok();

    *previous = line_count(message);
}

pub fn status_success(message: &str) {
    show_status(Some("✓".green().to_string()), message);
}

/// Dimmed, no symbol.
pub fn status_unchanged(message: &str) {
    show_status(None, &message.dimmed().to_string());
}

pub fn status_error(summary: &str, detail: &str) {
    let message = if detail.is_empty() {
        summary.to_string()
    } else {
        format!("{summary}\n{detail}")
    };
    show_status(Some("✗".red().to_string()), &message);
}

pub fn status_warning(detail: &str) {
    show_status(Some("⚠".yellow().to_string()), detail);
}

// ============================================================================
// Progress Line
// ============================================================================

/// Single-line counters, updated in place: `[build] html(2/3) js_module(10/12)`
///
/// Updates from worker tasks use `try_lock`; a busy display skips a refresh.
pub struct ProgressLine {
    counters: Vec<Counter>,
    lock: Mutex<()>,
}

struct Counter {
    name: &'static str,
    total: usize,
    current: AtomicUsize,
}

impl ProgressLine {
    /// Counters with a zero total are left out.
    pub fn new(items: &[(&'static str, usize)]) -> Self {
        let counters = items
            .iter()
            .filter(|(_, total)| *total > 0)
            .map(|(name, total)| Counter {
                name,
                total: *total,
                current: AtomicUsize::new(0),
            })
            .collect();

        PROGRESS_ACTIVE.store(true, Ordering::SeqCst);
        let progress = Self {
            counters,
            lock: Mutex::new(()),
        };
        progress.draw(false);
        progress
    }

    pub fn inc(&self, name: &str) {
        let Some(counter) = self.counters.iter().find(|c| c.name == name) else {
            return;
        };
        counter.current.fetch_add(1, Ordering::Relaxed);
        if let Some(_guard) = self.lock.try_lock() {
            self.draw(false);
        }
    }

    /// Keep the final counts on screen.
    pub fn finish(self) {
        {
            let _guard = self.lock.lock();
            self.draw(true);
        }
        PROGRESS_ACTIVE.store(false, Ordering::SeqCst);
        std::mem::forget(self);
    }

    fn render(&self) -> String {
        self.counters
            .iter()
            .map(|c| format!("{}({}/{})", c.name, c.current.load(Ordering::Relaxed), c.total))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn draw(&self, last: bool) {
        let line = format!("{} {}", colorize_prefix("build"), self.render());
        let mut stdout = stdout().lock();
        execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
        if last {
            writeln!(stdout, "{line}").ok();
        } else {
            write!(stdout, "{line}").ok();
        }
        stdout.flush().ok();
    }
}

impl Drop for ProgressLine {
    fn drop(&mut self) {
        PROGRESS_ACTIVE.store(false, Ordering::SeqCst);
        let mut stdout = stdout().lock();
        execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
        stdout.flush().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock() {
        assert_eq!(clock(0), "00:00:00");
        assert_eq!(clock(3600 * 25 + 61), "01:01:01");
    }

    #[test]
    fn test_status_line_count() {
        assert_eq!(line_count("hot update: util.js"), 1);
        let error = "failed to cook main.js\nresolution error in file:///project/main.js:3:8\n  referenced by index.html";
        assert_eq!(line_count(error), 3);
    }

    #[test]
    fn test_prefix_contains_module() {
        assert!(colorize_prefix("reload").contains("[reload]"));
        assert!(colorize_prefix("kitchen").contains("[kitchen]"));
    }

    #[test]
    fn test_progress_render_skips_empty_counters() {
        let progress = ProgressLine::new(&[("html", 2), ("css", 0), ("js_module", 3)]);
        progress.inc("html");
        progress.inc("js_module");
        progress.inc("css");
        assert_eq!(progress.render(), "html(1/2) js_module(1/3)");
        progress.finish();
        assert!(!PROGRESS_ACTIVE.load(Ordering::SeqCst));
    }
}
