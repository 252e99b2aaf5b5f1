//! End-to-end execution tests: lifecycle ordering, cancellation, classification and disposal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use spindle::demo::{DEMO_ARTIFACT, demo_registry};
use spindle::{
    ArtifactRegistry, FanOutPolicy, FrameworkHandle, HostEvent, MessageCategory, MessageLevel, MessageLogger,
    RecordingHandle, ResultRecord, RunContext, RunSummary, RunnerConfig, TestOutcome, TestRunner, UnitDescriptor,
    test_class,
};
use spindle_core::{ArtifactInfo, CancellationToken, Dispose, Fault, TestLog, TestResult};

fn sequential() -> RunnerConfig {
    RunnerConfig::default().with_fan_out(FanOutPolicy::Sequential)
}

fn outcome(handle: &RecordingHandle, id: &str) -> Option<TestOutcome> {
    handle.result_for(id).map(|r| r.outcome)
}

// ============================================================================
// Five-unit scenario
// ============================================================================

#[derive(Default)]
pub struct ScenarioTests;

#[test_class(namespace = "Scenario.Tests")]
impl ScenarioTests {
    pub fn a_passes(&mut self) {}

    pub fn b_throws(&mut self, log: &mut TestLog) -> TestResult {
        log.line("about to fail");
        Err(Fault::new("InvalidOperation", "operation is not valid"))
    }

    pub fn c_inconclusive(&mut self, _token: &CancellationToken) -> TestResult {
        Err(Fault::new("AssertInconclusive", "could not decide"))
    }

    pub fn d_observes_cancellation(&mut self, log: &mut TestLog, token: &CancellationToken) -> TestResult {
        log.line("checking the signal");
        token.error_if_cancelled()
    }

    pub fn e_never_starts(&mut self) {}
}

fn scenario_artifact() -> ArtifactInfo {
    ArtifactInfo::new("scenario").export::<ScenarioTests>()
}

/// Records everything and cancels the runner when the named unit starts.
struct CancelOnStart {
    inner: RecordingHandle,
    trigger: &'static str,
    runner: Mutex<Option<Arc<TestRunner>>>,
}

impl MessageLogger for CancelOnStart {
    fn send_message(&self, level: MessageLevel, text: &str) {
        self.inner.send_message(level, text);
    }
}

impl FrameworkHandle for CancelOnStart {
    fn record_start(&self, unit: &UnitDescriptor) {
        self.inner.record_start(unit);
        if unit.method_name() == self.trigger {
            if let Some(runner) = self.runner.lock().unwrap().as_ref() {
                runner.cancel();
            }
        }
    }

    fn record_end(&self, unit: &UnitDescriptor, outcome: TestOutcome) {
        self.inner.record_end(unit, outcome);
    }

    fn record_result(&self, record: ResultRecord) {
        self.inner.record_result(record);
    }
}

#[test]
fn five_unit_scenario() {
    let registry = ArtifactRegistry::new().with_artifact("scenario", scenario_artifact);
    let runner = Arc::new(TestRunner::with_config(registry, sequential()));
    let handle = CancelOnStart {
        inner: RecordingHandle::new(),
        trigger: "d_observes_cancellation",
        runner: Mutex::new(Some(Arc::clone(&runner))),
    };

    let summary = runner.run_artifacts(["scenario"], &RunContext::default(), &handle);
    let h = &handle.inner;

    assert_eq!(outcome(h, "Scenario.Tests.ScenarioTests.a_passes"), Some(TestOutcome::Passed));
    assert_eq!(outcome(h, "Scenario.Tests.ScenarioTests.b_throws"), Some(TestOutcome::Failed));
    assert_eq!(outcome(h, "Scenario.Tests.ScenarioTests.c_inconclusive"), Some(TestOutcome::Skipped));
    assert_eq!(outcome(h, "Scenario.Tests.ScenarioTests.d_observes_cancellation"), Some(TestOutcome::Failed));
    assert_eq!(outcome(h, "Scenario.Tests.ScenarioTests.e_never_starts"), None);
    assert_eq!(summary, RunSummary { passed: 1, failed: 2, skipped: 1, not_run: 1 });

    let failed = h.result_for("Scenario.Tests.ScenarioTests.b_throws").unwrap();
    assert_eq!(failed.error_message.as_deref(), Some("operation is not valid"));
    assert_eq!(failed.captured_output(), "about to fail\n");

    let cancelled = h.result_for("Scenario.Tests.ScenarioTests.d_observes_cancellation").unwrap();
    assert_eq!(cancelled.captured_output(), "checking the signal\n");
    assert!(cancelled.error_message.is_some());

    // Break the handle -> runner cycle.
    handle.runner.lock().unwrap().take();
}

#[test]
fn every_record_follows_its_start_and_end() {
    let registry = ArtifactRegistry::new().with_artifact("scenario", scenario_artifact);
    let runner = TestRunner::new(registry);
    let handle = RecordingHandle::new();
    let summary = runner.run_artifacts(["scenario"], &RunContext::default(), &handle);
    assert_eq!(summary.total(), 5);

    let events = handle.events();
    for record in handle.results() {
        let id = &record.unit.id;
        let start = events
            .iter()
            .position(|e| matches!(e, HostEvent::Start { unit } if &unit.id == id))
            .unwrap();
        let end = events
            .iter()
            .position(|e| matches!(e, HostEvent::End { unit, .. } if &unit.id == id))
            .unwrap();
        let result = events
            .iter()
            .position(|e| matches!(e, HostEvent::Result { record } if &record.unit.id == id))
            .unwrap();
        assert!(start < end && end < result, "{id}: start/end/result out of order");
        assert!(record.end_time.unwrap() >= record.start_time.unwrap());
        let ticks = record.message(MessageCategory::AdditionalInfo).unwrap();
        assert!(ticks.ends_with(" ticks"));
    }
    assert_eq!(handle.results().len(), 5);
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn cancel_before_run_emits_nothing() {
    let runner = TestRunner::new(demo_registry());
    runner.cancel();
    let handle = RecordingHandle::new();

    let summary = runner.run_artifacts([DEMO_ARTIFACT], &RunContext::default(), &handle);

    assert!(handle.results().is_empty());
    assert!(handle.starts().is_empty());
    assert_eq!(summary.not_run, 14);
    assert_eq!(summary.total(), 14);
    assert!(handle.messages(MessageLevel::Informational).contains(&"Test host finished.".to_string()));
}

#[test]
fn cancel_is_idempotent_across_threads() {
    let runner = Arc::new(TestRunner::new(ArtifactRegistry::new()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let runner = Arc::clone(&runner);
            thread::spawn(move || runner.cancel())
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert!(runner.cancellation_token().is_cancellation_requested());
}

// ============================================================================
// Lifecycle
// ============================================================================

static MODULE_INITS_A: AtomicUsize = AtomicUsize::new(0);
static MODULE_INITS_B: AtomicUsize = AtomicUsize::new(0);
static CLASS_INITS: AtomicUsize = AtomicUsize::new(0);
static INIT_THREADS: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn note_thread() {
    let name = thread::current().name().unwrap_or_default().to_string();
    INIT_THREADS.lock().unwrap().push(name);
}

#[derive(Default)]
pub struct FirstTests;

#[test_class(namespace = "Life.Tests", static_init = "Self::init")]
impl FirstTests {
    fn init() {
        note_thread();
        CLASS_INITS.fetch_add(1, Ordering::SeqCst);
    }

    pub fn one(&mut self) -> TestResult {
        if CLASS_INITS.load(Ordering::SeqCst) == 0 {
            return Err(Fault::new("AssertFailed", "class initializer has not run"));
        }
        Ok(())
    }

    pub fn two(&mut self) {}
}

#[derive(Default)]
pub struct SecondTests;

#[test_class(namespace = "Life.Tests")]
impl SecondTests {
    pub fn three(&mut self, log: &mut TestLog) {
        log.line(thread::current().name().unwrap_or_default());
    }
}

fn life_a() -> ArtifactInfo {
    ArtifactInfo::new("life-a")
        .with_module_initializer(|| {
            note_thread();
            MODULE_INITS_A.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .export::<FirstTests>()
        .export::<SecondTests>()
}

fn life_b() -> ArtifactInfo {
    ArtifactInfo::new("life-b")
        .with_module_initializer(|| {
            MODULE_INITS_B.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .export::<SecondTests>()
}

#[test]
fn initializers_run_once_per_request_on_named_threads() {
    let registry = ArtifactRegistry::new()
        .with_artifact("life-a", life_a)
        .with_artifact("life-b", life_b);
    let runner = TestRunner::new(registry);
    let handle = RecordingHandle::new();

    let summary = runner.run_artifacts(["life-a", "life-b"], &RunContext::default(), &handle);

    assert_eq!(summary, RunSummary { passed: 4, failed: 0, skipped: 0, not_run: 0 });
    assert_eq!(MODULE_INITS_A.load(Ordering::SeqCst), 1);
    assert_eq!(MODULE_INITS_B.load(Ordering::SeqCst), 1);
    assert_eq!(CLASS_INITS.load(Ordering::SeqCst), 1);

    let threads = INIT_THREADS.lock().unwrap().clone();
    assert!(threads.contains(&"init module life-a".to_string()));
    assert!(threads.contains(&"init static Life.Tests.FirstTests".to_string()));

    let three = handle
        .results()
        .into_iter()
        .find(|r| r.unit.id == "Life.Tests.SecondTests.three" && r.unit.artifact == "life-a")
        .unwrap();
    assert_eq!(three.captured_output(), "Test: Life.Tests.SecondTests.three\n");
}

#[test]
fn failing_static_initializer_does_not_gate_its_units() {
    let runner = TestRunner::with_config(demo_registry(), sequential());
    let handle = RecordingHandle::new();
    runner.run_artifacts([DEMO_ARTIFACT], &RunContext::default(), &handle);

    assert_eq!(outcome(&handle, "Demo.Tests.StaticFailureTests.still_runs"), Some(TestOutcome::Passed));
    let warnings = handle.messages(MessageLevel::Warning);
    assert!(
        warnings
            .iter()
            .any(|w| w.contains("init static Demo.Tests.StaticFailureTests") && w.contains("static setup failed")),
        "{warnings:?}"
    );
}

// ============================================================================
// Demo artifact outcomes
// ============================================================================

#[test]
fn demo_artifact_outcomes() {
    let runner = TestRunner::new(demo_registry());
    let handle = RecordingHandle::new();
    let summary = runner.run_artifacts([DEMO_ARTIFACT], &RunContext::default(), &handle);

    let expected = [
        ("ActualTests.Passing_test", TestOutcome::Passed),
        ("ActualTests.Failing_test", TestOutcome::Failed),
        ("ActualTests.Panicking_test", TestOutcome::Failed),
        ("ActualTests.Inconclusive_test", TestOutcome::Skipped),
        ("ActualTests.Skipped_test", TestOutcome::Skipped),
        ("ActualTests.Logging_test", TestOutcome::Passed),
        ("ActualTests.Cancellable_test", TestOutcome::Passed),
        ("ActualTests.Logging_cancellable_test", TestOutcome::Passed),
        ("ActualTests.Framework_thread_test", TestOutcome::Passed),
        ("MyTests.runs", TestOutcome::Passed),
        ("MyTests.writes_output", TestOutcome::Passed),
        ("DisposableTests.uses_resource", TestOutcome::Passed),
        ("DisposableTests.fails_with_resource", TestOutcome::Failed),
        ("StaticFailureTests.still_runs", TestOutcome::Passed),
    ];
    for (id, want) in expected {
        assert_eq!(outcome(&handle, &format!("Demo.Tests.{id}")), Some(want), "{id}");
    }
    assert_eq!(summary, RunSummary { passed: 9, failed: 3, skipped: 2, not_run: 0 });

    let panicked = handle.result_for("Demo.Tests.ActualTests.Panicking_test").unwrap();
    assert_eq!(panicked.error_message.as_deref(), Some("values should have been populated"));
    let logged = handle.result_for("Demo.Tests.ActualTests.Logging_test").unwrap();
    assert_eq!(logged.captured_output(), "first line\nsecond line\n");
    assert!(spindle::demo::my_tests_initializations() >= 1);
}

// ============================================================================
// Disposal
// ============================================================================

static DISPOSED: AtomicUsize = AtomicUsize::new(0);
static CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);

pub struct CountedTests;

impl CountedTests {
    fn create() -> Result<Self, Fault> {
        CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
        Ok(Self)
    }
}

#[test_class(namespace = "Counted.Tests", disposable, constructor = "Self::create")]
impl CountedTests {
    pub fn passes(&mut self) {}

    pub fn fails(&mut self) -> TestResult {
        Err(Fault::new("AssertFailed", "nope"))
    }

    pub fn panics(&mut self) {
        panic!("kaboom");
    }

    pub fn skips(&mut self) -> TestResult {
        Err(Fault::skip("later"))
    }
}

impl Dispose for CountedTests {
    fn dispose(&mut self) -> TestResult {
        assert!(spindle::executing_from_framework_thread());
        DISPOSED.fetch_add(1, Ordering::SeqCst);
        Err(Fault::new("ObjectDisposed", "dispose always complains"))
    }
}

#[test]
fn disposal_runs_once_per_instance_and_never_changes_outcomes() {
    let registry = ArtifactRegistry::new()
        .with_artifact("counted", || ArtifactInfo::new("counted").export::<CountedTests>());
    let runner = TestRunner::new(registry);
    let handle = RecordingHandle::new();

    let summary = runner.run_artifacts(["counted"], &RunContext::default(), &handle);

    assert_eq!(summary, RunSummary { passed: 1, failed: 2, skipped: 1, not_run: 0 });
    assert_eq!(CONSTRUCTED.load(Ordering::SeqCst), 4);
    assert_eq!(DISPOSED.load(Ordering::SeqCst), 4);
    let errors = handle.messages(MessageLevel::Error);
    assert_eq!(errors.len(), 4);
    assert!(errors.iter().all(|e| e.starts_with("Failed to dispose test class instance for Counted.Tests.CountedTests.")));
}

// ============================================================================
// Setup failures
// ============================================================================

pub struct BrokenCtorTests;

impl BrokenCtorTests {
    fn create() -> Result<Self, Fault> {
        Err(Fault::new("InvalidOperation", "constructor refused"))
    }
}

#[test_class(namespace = "Broken.Tests", constructor = "Self::create")]
impl BrokenCtorTests {
    pub fn never_runs(&mut self) {}
}

#[test]
fn constructor_failure_is_a_setup_skip() {
    let registry = ArtifactRegistry::new()
        .with_artifact("broken", || ArtifactInfo::new("broken").export::<BrokenCtorTests>());
    let runner = TestRunner::new(registry);
    let handle = RecordingHandle::new();
    runner.run_artifacts(["broken"], &RunContext::default(), &handle);

    let record = handle.result_for("Broken.Tests.BrokenCtorTests.never_runs").unwrap();
    assert_eq!(record.outcome, TestOutcome::Skipped);
    assert_eq!(record.error_message.as_deref(), Some("constructor refused"));
    insta::assert_snapshot!(
        record.message(MessageCategory::StandardError).unwrap(),
        @"Test cancelled because test class instance was not constructed successfully."
    );
    assert!(handle.starts().is_empty());
}

#[test]
fn stale_units_are_setup_skips() {
    let runner = TestRunner::new(demo_registry());
    let handle = RecordingHandle::new();
    let units = vec![
        UnitDescriptor::new("Demo.Tests.ActualTests.Removed_test", "Removed test", DEMO_ARTIFACT),
        UnitDescriptor::new("Demo.Tests.GoneTests.anything", "anything", DEMO_ARTIFACT),
        UnitDescriptor::new("Demo.Tests.ActualTests.Passing_test", "Passing test", "not-built"),
    ];
    let summary = runner.run_tests(units, &RunContext::default(), &handle);

    assert_eq!(summary, RunSummary { passed: 0, failed: 0, skipped: 3, not_run: 0 });
    let stage = |id: &str, artifact: &str| {
        handle
            .results()
            .into_iter()
            .find(|r| r.unit.id == id && r.unit.artifact == artifact)
            .and_then(|r| r.message(MessageCategory::StandardError).map(str::to_string))
            .unwrap()
    };
    assert_eq!(stage("Demo.Tests.ActualTests.Removed_test", DEMO_ARTIFACT), "Test host failed to set up this test.");
    assert_eq!(stage("Demo.Tests.GoneTests.anything", DEMO_ARTIFACT), "Test host failed to set up the test class.");
    assert_eq!(stage("Demo.Tests.ActualTests.Passing_test", "not-built"), "Test host failed to load the test artifact.");
}
