//! Console reporter (pytest-style)
//!
//! Workers finish in any order, so lines are written whole from inside the handle's lock and failure details are held
//! back until [`ConsoleHandle::finish`] prints the FAILURES section and the summary bar.

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::host::{FrameworkHandle, MessageLevel, MessageLogger};
use crate::model::{ResultRecord, TestOutcome, UnitDescriptor};

use super::RunSummary;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Status text for one result.
///
/// Verbose mode prints a full line per unit; otherwise a single character, like pytest's progress dots.
pub fn render_status(record: &ResultRecord, verbose: bool) -> String {
    let (color, word, dot) = match record.outcome {
        TestOutcome::Passed => (GREEN, "PASSED", "."),
        TestOutcome::Failed => (RED, "FAILED", "F"),
        TestOutcome::Skipped => (YELLOW, "SKIPPED", "s"),
    };
    if !verbose {
        return format!("{color}{dot}{RESET}");
    }
    let detail = match (record.outcome, record.start_time) {
        (_, Some(_)) => format!(" ({}ms)", record.duration.as_millis()),
        (TestOutcome::Skipped, None) => {
            let reason = record.error_message.as_deref().unwrap_or("");
            if reason.is_empty() { String::new() } else { format!(" ({reason})") }
        }
        _ => String::new(),
    };
    format!("{} {color}{word}{RESET}{detail}", record.unit.id)
}

/// The closing `====== ... ======` line.
pub fn render_summary(summary: &RunSummary, elapsed: Duration) -> String {
    let mut parts = Vec::new();
    if summary.passed > 0 {
        parts.push(format!("{GREEN}{} passed{RESET}", summary.passed));
    }
    if summary.failed > 0 {
        parts.push(format!("{RED}{} failed{RESET}", summary.failed));
    }
    if summary.skipped > 0 {
        parts.push(format!("{YELLOW}{} skipped{RESET}", summary.skipped));
    }
    if summary.not_run > 0 {
        parts.push(format!("{YELLOW}{} not run{RESET}", summary.not_run));
    }
    if parts.is_empty() {
        parts.push("no tests ran".to_string());
    }
    format!("====== {} in {:.2}s ======", parts.join(", "), elapsed.as_secs_f64())
}

#[derive(Default)]
struct ConsoleState {
    failures: Vec<ResultRecord>,
    dots: usize,
}

/// Framework handle that writes to stderr.
#[derive(Default)]
pub struct ConsoleHandle {
    verbose: bool,
    state: Mutex<ConsoleState>,
}

impl ConsoleHandle {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            state: Mutex::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Print held-back failure details and the summary bar.
    pub fn finish(&self, summary: &RunSummary, elapsed: Duration) {
        let state = self.lock();
        let mut err = io::stderr().lock();
        if state.dots > 0 {
            let _ = writeln!(err);
        }
        if !state.failures.is_empty() {
            let _ = writeln!(err);
            let _ = writeln!(err, "{BOLD}{RED}=================== FAILURES ==================={RESET}");
            for record in &state.failures {
                let _ = writeln!(err);
                let _ = writeln!(err, "{BOLD}___________ {} ___________{RESET}", record.unit.display_name);
                if let Some(message) = &record.error_message {
                    let _ = writeln!(err);
                    let _ = writeln!(err, "    {}", message);
                }
                let output = record.captured_output();
                if !output.is_empty() {
                    let _ = writeln!(err, "    captured output:");
                    for line in output.lines() {
                        let _ = writeln!(err, "      {}", line);
                    }
                }
                let _ = writeln!(err);
                let _ = writeln!(err, "    {}::{}", record.unit.artifact, record.unit.id);
            }
        }
        let _ = writeln!(err);
        let _ = writeln!(err, "{}", render_summary(summary, elapsed));
    }
}

impl MessageLogger for ConsoleHandle {
    fn send_message(&self, level: MessageLevel, text: &str) {
        let _state = self.lock();
        match level {
            MessageLevel::Informational if self.verbose => eprintln!("{text}"),
            MessageLevel::Informational => {}
            MessageLevel::Warning => eprintln!("{YELLOW}warning:{RESET} {text}"),
            MessageLevel::Error => eprintln!("{RED}error:{RESET} {text}"),
        }
    }
}

impl FrameworkHandle for ConsoleHandle {
    fn record_start(&self, _unit: &UnitDescriptor) {}

    fn record_end(&self, _unit: &UnitDescriptor, _outcome: TestOutcome) {}

    fn record_result(&self, record: ResultRecord) {
        let mut state = self.lock();
        let status = render_status(&record, self.verbose);
        if self.verbose {
            eprintln!("{status}");
        } else {
            eprint!("{status}");
            state.dots += 1;
        }
        if record.outcome == TestOutcome::Failed {
            state.failures.push(record);
        }
    }
}
