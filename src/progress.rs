//! Progress math and the fixed-height terminal display for long runs.

use std::io::{self, Write};
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};

/// Every rendered report is exactly this many lines.
pub const REPORT_LINES: usize = 4;

/// Counters of one pipeline run. Passed by value; `record` returns the
/// advanced state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    pub starting_complete: i64,
    pub current_complete: i64,
    /// Advisory total from a prior COUNT; `None` means unknown.
    pub total_expected: Option<i64>,
    pub cumulative_elapsed: Duration,
}

impl ProgressState {
    pub fn new(starting_complete: i64, total_expected: Option<i64>) -> Self {
        Self {
            starting_complete,
            current_complete: starting_complete,
            total_expected,
            cumulative_elapsed: Duration::ZERO,
        }
    }

    /// One more item done, which took `elapsed`.
    #[must_use]
    pub fn record(self, elapsed: Duration) -> Self {
        Self {
            current_complete: self.current_complete + 1,
            cumulative_elapsed: self.cumulative_elapsed + elapsed,
            ..self
        }
    }

    pub fn items_done_this_run(&self) -> i64 {
        self.current_complete - self.starting_complete
    }

    pub fn cumulative_elapsed_millis(&self) -> f64 {
        self.cumulative_elapsed.as_nanos() as f64 / 1_000_000.0
    }
}

/// Derived figures for one report.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub item_label: String,
    pub current_id: Option<i64>,
    pub current_complete: i64,
    pub total_expected: Option<i64>,
    pub percent: Option<f64>,
    pub average_millis: f64,
    pub estimated_remaining_millis: Option<f64>,
}

/// Compute a report; `None` until at least one item was done this run.
pub fn report(
    state: &ProgressState,
    item_label: &str,
    current_id: Option<i64>,
) -> Option<ProgressReport> {
    let done = state.items_done_this_run();
    if done <= 0 {
        return None;
    }
    let average_millis = state.cumulative_elapsed_millis() / done as f64;

    let (percent, estimated_remaining_millis) = match state.total_expected {
        Some(total) if total > 0 => {
            // Counted against this run's items only; resumed runs over-estimate.
            let remaining = (total - done).max(0);
            (
                Some(state.current_complete as f64 * 100.0 / total as f64),
                Some(average_millis * remaining as f64),
            )
        }
        _ => (None, None),
    };

    Some(ProgressReport {
        item_label: item_label.to_string(),
        current_id,
        current_complete: state.current_complete,
        total_expected: state.total_expected,
        percent,
        average_millis,
        estimated_remaining_millis,
    })
}

impl ProgressReport {
    /// The four display lines. `now` anchors the finish-time estimate.
    pub fn lines(&self, now: DateTime<Local>) -> [String; REPORT_LINES] {
        let current = match self.current_id {
            Some(id) => format!("Processed {} {}", self.item_label, id),
            None => format!("Processed {} (row id unreadable)", self.item_label),
        };
        let completed = match (self.total_expected, self.percent) {
            (Some(total), Some(pct)) => {
                format!("Completed {} of {} ({:.2}%)", self.current_complete, total, pct)
            }
            _ => format!("Completed {} (total unknown)", self.current_complete),
        };
        let average = format!("Average {:.2} ms per {}", self.average_millis, self.item_label);
        let remaining = match self.estimated_remaining_millis {
            Some(ms) => {
                let finish = TimeDelta::try_milliseconds(ms.round() as i64)
                    .and_then(|d| now.checked_add_signed(d))
                    .map(|t| t.format(" (finishes %Y-%m-%d %H:%M:%S)").to_string())
                    .unwrap_or_default();
                format!("Estimated remaining {}{}", format_millis(ms), finish)
            }
            None => "Estimated remaining unknown".to_string(),
        };
        [current, completed, average, remaining]
    }
}

/// `3723004.0` -> `1h 02m 03s`.
pub fn format_millis(ms: f64) -> String {
    let total_secs = (ms.max(0.0) / 1000.0).round() as u64;
    let (h, m, s) = (total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60);
    format!("{h}h {m:02}m {s:02}s")
}

/// How reports reach the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProgressMode {
    /// Overwrite the previous report (ANSI cursor movement).
    InPlace,
    /// Print every report below the last one.
    Append,
    /// Render nothing.
    Off,
}

/// Fixed-height report renderer over any writer.
pub struct ProgressDisplay<W> {
    out: W,
    mode: ProgressMode,
    lines_drawn: usize,
}

impl<W: Write> ProgressDisplay<W> {
    pub fn new(out: W, mode: ProgressMode) -> Self {
        Self {
            out,
            mode,
            lines_drawn: 0,
        }
    }

    pub fn render(&mut self, report: &ProgressReport) -> io::Result<()> {
        self.render_at(report, Local::now())
    }

    pub fn render_at(&mut self, report: &ProgressReport, now: DateTime<Local>) -> io::Result<()> {
        match self.mode {
            ProgressMode::Off => return Ok(()),
            ProgressMode::InPlace if self.lines_drawn > 0 => {
                // Move to the first line of the previous report and clear below.
                write!(self.out, "\x1b[{}F\x1b[J", self.lines_drawn)?;
            }
            _ => {}
        }
        for line in report.lines(now) {
            writeln!(self.out, "{line}")?;
        }
        self.lines_drawn = REPORT_LINES;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
