//! Result reporting
//!
//! [`Reporter`] turns what happened to a unit into a [`ResultRecord`] and forwards it to the host's
//! [`FrameworkHandle`], keeping a running tally for the [`RunSummary`]. Host-side renderings of those events live in
//! `console` (pytest-style terminal output) and `json` (one JSON object per line).

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod console;
pub mod json;
pub mod policy;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use spindle_core::{CancellationToken, Fault};

use crate::host::{FrameworkHandle, MessageLevel};
use crate::model::{MessageCategory, ResultMessage, ResultRecord, TestOutcome, UnitDescriptor};
use crate::scheduler::clock::duration_to_ticks;

pub use console::ConsoleHandle;
pub use json::JsonLinesHandle;
pub use policy::{ClassificationPolicy, NameRule};

/// Placeholder for an empty fault message or stack trace.
pub const MISSING: &str = "<missing>";

/// The stage at which a unit could not be set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    Artifact,
    Class,
    Method,
    Instance,
    Prepare,
}

impl SetupStage {
    /// Fixed diagnostic attached to setup-skipped records.
    pub fn message(self) -> &'static str {
        match self {
            SetupStage::Artifact => "Test host failed to load the test artifact.",
            SetupStage::Class => "Test host failed to set up the test class.",
            SetupStage::Method => "Test host failed to set up this test.",
            SetupStage::Instance => "Test cancelled because test class instance was not constructed successfully.",
            SetupStage::Prepare => "Test cancelled because test method was not able to be prepared.",
        }
    }
}

/// Wall-clock and monotonic timestamps around one invocation.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub started_at: SystemTime,
    pub ended_at: SystemTime,
    pub started: Instant,
    pub ended: Instant,
}

impl Timing {
    pub fn elapsed(&self) -> Duration {
        self.ended.saturating_duration_since(self.started)
    }
}

/// Totals for one execution request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Units that produced no record (cancelled before they started).
    pub not_run: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.not_run
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

fn or_missing(text: &str) -> String {
    if text.is_empty() { MISSING.to_string() } else { text.to_string() }
}

/// Builds result records and forwards them to the host.
pub struct Reporter<'h> {
    handle: &'h dyn FrameworkHandle,
    policy: &'h ClassificationPolicy,
    passed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl<'h> Reporter<'h> {
    pub fn new(handle: &'h dyn FrameworkHandle, policy: &'h ClassificationPolicy) -> Self {
        Self {
            handle,
            policy,
            passed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        }
    }

    pub fn info(&self, text: &str) {
        self.handle.send_message(MessageLevel::Informational, text);
    }

    pub fn warn(&self, text: &str) {
        self.handle.send_message(MessageLevel::Warning, text);
    }

    fn tally(&self, outcome: TestOutcome) {
        let counter = match outcome {
            TestOutcome::Passed => &self.passed,
            TestOutcome::Failed => &self.failed,
            TestOutcome::Skipped => &self.skipped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Report a unit that could not be set up.
    pub fn setup_skipped(&self, unit: &UnitDescriptor, stage: SetupStage, message: &str, stack_trace: Option<&str>) {
        tracing::debug!(unit = %unit.id, stage = ?stage, error = message, "setup skipped");
        let mut record = ResultRecord::new(unit.clone(), TestOutcome::Skipped);
        record.error_message = Some(message.to_string());
        record.error_stack_trace = stack_trace.filter(|s| !s.is_empty()).map(str::to_string);
        record
            .messages
            .push(ResultMessage::new(MessageCategory::StandardError, stage.message()));
        self.tally(TestOutcome::Skipped);
        self.handle.record_result(record);
    }

    /// Report a setup failure caused by a fault.
    pub fn setup_faulted(&self, unit: &UnitDescriptor, stage: SetupStage, fault: &Fault) {
        self.setup_skipped(unit, stage, fault.message(), Some(fault.stack_trace()));
    }

    pub fn started(&self, unit: &UnitDescriptor) {
        self.handle.record_start(unit);
    }

    /// Classify and report a unit that ran.
    pub fn finished(
        &self,
        unit: &UnitDescriptor,
        timing: Timing,
        fault: Option<&Fault>,
        token: &CancellationToken,
        output: String,
    ) -> TestOutcome {
        let outcome = self.policy.classify(fault, token);
        self.handle.record_end(unit, outcome);

        let elapsed = timing.elapsed();
        let ticks = duration_to_ticks(elapsed);
        tracing::debug!(unit = %unit.id, %outcome, ticks, "unit finished");

        let mut record = ResultRecord::new(unit.clone(), outcome);
        record.start_time = Some(timing.started_at);
        record.end_time = Some(timing.ended_at);
        record.duration = elapsed;
        if let Some(fault) = fault {
            record.error_message = Some(or_missing(fault.message()));
            record.error_stack_trace = Some(or_missing(fault.stack_trace()));
        }
        record.messages = vec![
            ResultMessage::new(MessageCategory::StandardOutput, output),
            ResultMessage::new(MessageCategory::AdditionalInfo, format!("{} ticks", ticks)),
        ];

        self.tally(outcome);
        self.handle.record_result(record);
        outcome
    }

    /// Report a disposer fault. The unit's recorded outcome is left alone.
    pub fn disposal_failed(&self, unit: &UnitDescriptor, fault: &Fault) {
        tracing::warn!(unit = %unit.id, fault = %fault, "disposal failed");
        self.handle.send_message(
            MessageLevel::Error,
            &format!("Failed to dispose test class instance for {}: {}", unit.id, fault),
        );
    }

    pub fn summary(&self, not_run: usize) -> RunSummary {
        RunSummary {
            passed: self.passed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            not_run,
        }
    }

    /// Units reported so far.
    pub fn reported(&self) -> usize {
        let s = self.summary(0);
        s.passed + s.failed + s.skipped
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::host::RecordingHandle;

    fn unit() -> UnitDescriptor {
        UnitDescriptor::new("Demo.Tests.ATests.run", "run", "demo")
    }

    fn timing(ms: u64) -> Timing {
        let started = Instant::now();
        let started_at = SystemTime::now();
        Timing {
            started_at,
            ended_at: started_at + Duration::from_millis(ms),
            started,
            ended: started + Duration::from_millis(ms),
        }
    }

    #[test]
    fn test_setup_messages_are_fixed() {
        insta::assert_snapshot!(SetupStage::Artifact.message(), @"Test host failed to load the test artifact.");
        insta::assert_snapshot!(SetupStage::Class.message(), @"Test host failed to set up the test class.");
        insta::assert_snapshot!(SetupStage::Method.message(), @"Test host failed to set up this test.");
    }

    #[test]
    fn test_setup_skipped_record() {
        let handle = RecordingHandle::new();
        let policy = ClassificationPolicy::default();
        let reporter = Reporter::new(&handle, &policy);
        reporter.setup_skipped(&unit(), SetupStage::Method, "no such method", None);

        let record = handle.result_for("Demo.Tests.ATests.run").unwrap();
        assert_eq!(record.outcome, TestOutcome::Skipped);
        assert_eq!(record.error_message.as_deref(), Some("no such method"));
        assert_eq!(record.message(MessageCategory::StandardError), Some(SetupStage::Method.message()));
        assert!(record.start_time.is_none());
        assert!(handle.starts().is_empty());
        assert_eq!(reporter.summary(0).skipped, 1);
    }

    #[test]
    fn test_finished_passed_record() {
        let handle = RecordingHandle::new();
        let policy = ClassificationPolicy::default();
        let reporter = Reporter::new(&handle, &policy);
        let outcome = reporter.finished(&unit(), timing(3), None, &CancellationToken::none(), "out\n".into());

        assert_eq!(outcome, TestOutcome::Passed);
        let record = handle.result_for("Demo.Tests.ATests.run").unwrap();
        assert_eq!(record.duration, Duration::from_millis(3));
        assert_eq!(record.captured_output(), "out\n");
        assert_eq!(record.message(MessageCategory::AdditionalInfo), Some("30000 ticks"));
        assert!(record.end_time.unwrap() >= record.start_time.unwrap());
        assert!(record.error_message.is_none());
    }

    #[test]
    fn test_finished_fault_uses_placeholders() {
        let handle = RecordingHandle::new();
        let policy = ClassificationPolicy::default();
        let reporter = Reporter::new(&handle, &policy);
        let fault = Fault::new("Boom", "");
        let outcome = reporter.finished(&unit(), timing(0), Some(&fault), &CancellationToken::none(), String::new());

        assert_eq!(outcome, TestOutcome::Failed);
        let record = handle.result_for("Demo.Tests.ATests.run").unwrap();
        assert_eq!(record.error_message.as_deref(), Some(MISSING));
        assert!(record.error_stack_trace.is_some());
        assert_eq!(reporter.summary(2), RunSummary { passed: 0, failed: 1, skipped: 0, not_run: 2 });
    }

    #[test]
    fn test_disposal_failure_is_a_side_message() {
        let handle = RecordingHandle::new();
        let policy = ClassificationPolicy::default();
        let reporter = Reporter::new(&handle, &policy);
        reporter.disposal_failed(&unit(), &Fault::new("Leak", "handle still open"));
        let errors = handle.messages(MessageLevel::Error);
        insta::assert_snapshot!(&errors[0], @"Failed to dispose test class instance for Demo.Tests.ATests.run: Leak: handle still open");
        assert!(handle.results().is_empty());
        assert_eq!(reporter.reported(), 0);
    }

    #[test]
    fn test_summary_totals() {
        let summary = RunSummary {
            passed: 2,
            failed: 1,
            skipped: 1,
            not_run: 1,
        };
        assert_eq!(summary.total(), 5);
        assert!(!summary.is_success());
        assert!(RunSummary::default().is_success());
    }
}
