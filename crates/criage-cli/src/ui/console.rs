//! Terminal [`Reporter`] for the CLI.

use std::io::{Write, stderr};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use criage_core::Reporter;
use criage_schema::{PackageName, Version};
use crossterm::style::Stylize;

use super::theme::{Theme, format_size};

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

/// Writes progress to stderr and results to stdout.
#[derive(Debug)]
pub struct ConsoleReporter {
    theme: Theme,
    last_draw: Mutex<Option<Instant>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            theme: Theme::default(),
            last_draw: Mutex::new(None),
        }
    }

    fn status(&self, icon: &str, name: &PackageName, version: &Version, detail: &str) {
        let t = &self.theme;
        let line = format!(
            "  {} {} {} {}",
            icon.with(t.colors.active),
            name.as_str().with(t.colors.package_name),
            version.as_str().with(t.colors.version),
            detail.with(t.colors.secondary)
        );
        let mut err = stderr();
        let _ = write!(err, "\r\x1b[2K{line}");
        let _ = err.flush();
    }

    fn last_draw(&self) -> MutexGuard<'_, Option<Instant>> {
        self.last_draw.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_drawn(&self) {
        *self.last_draw() = Some(Instant::now());
    }

    /// Terminate an in-place status line, if one is showing.
    fn end_status_line(&self) {
        if self.last_draw().take().is_some() {
            let _ = writeln!(stderr());
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        self.end_status_line();
        println!();
        println!("{}", title.bold());
    }

    fn downloading(&self, name: &PackageName, version: &Version, current: u64, total: Option<u64>) {
        let finished = total.is_some_and(|t| current >= t);
        {
            let mut last = self.last_draw();
            let due = last.is_none_or(|at| at.elapsed() >= REDRAW_INTERVAL);
            if !due && !finished {
                return;
            }
            *last = Some(Instant::now());
        }
        let detail = match total {
            Some(t) if t > 0 => format!(
                "{} / {} ({}%)",
                format_size(current),
                format_size(t),
                current * 100 / t
            ),
            _ => format_size(current),
        };
        self.status(self.theme.icons.active, name, version, &detail);
    }

    fn extracting(&self, name: &PackageName, version: &Version) {
        self.status(self.theme.icons.active, name, version, "extracting");
        self.mark_drawn();
    }

    fn installing(&self, name: &PackageName, version: &Version) {
        self.status(self.theme.icons.active, name, version, "installing");
        self.mark_drawn();
    }

    fn removing(&self, name: &PackageName, version: &Version) {
        self.status(self.theme.icons.active, name, version, "removing");
        self.mark_drawn();
    }

    fn done(&self, name: &PackageName, version: &Version, detail: &str, size: Option<u64>) {
        self.end_status_line();
        let t = &self.theme;
        let size = size.map(format_size).unwrap_or_default();
        println!(
            "  {} {} {} {} {}",
            t.icons.success.with(t.colors.success),
            name.as_str().with(t.colors.package_name),
            version.as_str().with(t.colors.version),
            detail.with(t.colors.secondary),
            size.with(t.colors.secondary)
        );
    }

    fn failed(&self, name: &PackageName, reason: &str) {
        self.end_status_line();
        let t = &self.theme;
        eprintln!(
            "  {} {} {}",
            t.icons.error.with(t.colors.error),
            name.as_str().with(t.colors.package_name),
            reason.with(t.colors.error)
        );
    }

    fn info(&self, msg: &str) {
        self.end_status_line();
        println!("  {} {msg}", self.theme.icons.info.with(self.theme.colors.active));
    }

    fn success(&self, msg: &str) {
        self.end_status_line();
        println!("  {} {msg}", self.theme.icons.success.with(self.theme.colors.success));
    }

    fn warning(&self, msg: &str) {
        self.end_status_line();
        eprintln!("  {} {msg}", self.theme.icons.warning.with(self.theme.colors.warning));
    }

    fn error(&self, msg: &str) {
        self.end_status_line();
        eprintln!("  {} {msg}", self.theme.icons.error.with(self.theme.colors.error));
    }
}
