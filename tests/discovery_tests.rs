//! Discovery against the built-in demo artifact and hand-built artifacts.

use spindle::demo::{DEMO_ARTIFACT, demo_registry};
use spindle::{
    ArtifactRegistry, CollectingSink, DiscoveryContext, DiscoverySink, MessageLevel, RecordingHandle, RunnerConfig,
    TestRunner, UnitDescriptor,
};
use spindle_core::{ArtifactInfo, TypeInfo};

fn discover(runner: &TestRunner, artifacts: &[&str]) -> (Vec<UnitDescriptor>, RecordingHandle) {
    let logger = RecordingHandle::new();
    let mut sink = CollectingSink::new();
    runner.discover_tests(artifacts, &DiscoveryContext::default(), Some(&logger), &mut sink);
    (sink.into_units(), logger)
}

#[test]
fn demo_artifact_units() {
    let runner = TestRunner::new(demo_registry());
    let (units, _) = discover(&runner, &[DEMO_ARTIFACT]);
    let ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
    insta::assert_debug_snapshot!(ids, @r#"
    [
        "Demo.Tests.ActualTests.Passing_test",
        "Demo.Tests.ActualTests.Failing_test",
        "Demo.Tests.ActualTests.Panicking_test",
        "Demo.Tests.ActualTests.Inconclusive_test",
        "Demo.Tests.ActualTests.Skipped_test",
        "Demo.Tests.ActualTests.Logging_test",
        "Demo.Tests.ActualTests.Cancellable_test",
        "Demo.Tests.ActualTests.Logging_cancellable_test",
        "Demo.Tests.ActualTests.Framework_thread_test",
        "Demo.Tests.MyTests.runs",
        "Demo.Tests.MyTests.writes_output",
        "Demo.Tests.DisposableTests.uses_resource",
        "Demo.Tests.DisposableTests.fails_with_resource",
        "Demo.Tests.StaticFailureTests.still_runs",
    ]
    "#);
    assert!(units.iter().all(|u| u.artifact == DEMO_ARTIFACT));
}

#[test]
fn display_names_use_override_or_transform() {
    let runner = TestRunner::new(demo_registry());
    let (units, _) = discover(&runner, &[DEMO_ARTIFACT]);
    let name_of = |id: &str| {
        units
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.display_name.clone())
            .unwrap_or_default()
    };
    assert_eq!(name_of("Demo.Tests.ActualTests.Passing_test"), "Passing test");
    assert_eq!(name_of("Demo.Tests.ActualTests.Logging_cancellable_test"), "Logs and honours cancellation");
    assert_eq!(name_of("Demo.Tests.MyTests.runs"), "runs");
}

#[test]
fn non_qualifying_types_and_methods_are_not_discovered() {
    let runner = TestRunner::new(demo_registry());
    let (units, _) = discover(&runner, &[DEMO_ARTIFACT]);
    for absent in [
        "UnsealedTests",
        "AbstractTests",
        "BadClassTests",
        "Helpers",
        "returns_value",
        "takes_count",
        "reversed_params",
        "associated_helper",
        "private_test",
    ] {
        assert!(!units.iter().any(|u| u.id.contains(absent)), "{absent} should not be discovered");
    }
}

#[test]
fn informational_messages_name_classes_and_methods() {
    let runner = TestRunner::new(demo_registry());
    let (_, logger) = discover(&runner, &[DEMO_ARTIFACT]);
    let info = logger.messages(MessageLevel::Informational);
    assert_eq!(info[0], format!("class {}!Demo.Tests.ActualTests", DEMO_ARTIFACT));
    assert_eq!(info[1], "method Passing_test");
    assert!(info.contains(&format!("class {}!Demo.Tests.StaticFailureTests", DEMO_ARTIFACT)));
}

#[test]
fn failing_artifact_does_not_abort_discovery() {
    let registry = demo_registry().with_artifact("broken", || -> ArtifactInfo { panic!("bad image format") });
    let runner = TestRunner::new(registry);
    let (units, logger) = discover(&runner, &["broken", "missing", DEMO_ARTIFACT]);

    assert_eq!(units.len(), 14);
    let warnings = logger.messages(MessageLevel::Warning);
    assert_eq!(warnings.len(), 2);
    insta::assert_snapshot!(&warnings[0], @"Failed to load broken: artifact broken failed while loading: bad image format");
    insta::assert_snapshot!(&warnings[1], @"Failed to load missing: no artifact is registered for missing");
}

#[test]
fn configured_suffixes_change_what_qualifies() {
    let registry = ArtifactRegistry::new().with_artifact("specs", || {
        ArtifactInfo::new("specs")
            .export_type(
                TypeInfo::class("Demo.Specs", "ParserSpec")
                    .with_sealed(true)
                    .with_method(spindle_core::MethodInfo::new("parses")),
            )
            .export_type(
                TypeInfo::class("Demo.Tests", "ParserTests")
                    .with_sealed(true)
                    .with_method(spindle_core::MethodInfo::new("parses")),
            )
    });
    let runner = TestRunner::with_config(
        registry,
        RunnerConfig::default().with_class_suffix("Spec").with_namespace_suffix(".Specs"),
    );
    let (units, _) = discover(&runner, &["specs"]);
    let ids: Vec<_> = units.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, ["Demo.Specs.ParserSpec.parses"]);
}

/// Sink that records how many units had arrived at each push.
struct CountingSink(Vec<usize>);

impl DiscoverySink for CountingSink {
    fn send_test_case(&mut self, _unit: UnitDescriptor) {
        let seen = self.0.len();
        self.0.push(seen + 1);
    }
}

#[test]
fn units_are_streamed_one_at_a_time() {
    let runner = TestRunner::new(demo_registry());
    let mut sink = CountingSink(Vec::new());
    let found = runner.discover_tests([DEMO_ARTIFACT], &DiscoveryContext::default(), None, &mut sink);
    assert_eq!(found, sink.0.len());
    assert_eq!(sink.0, (1..=found).collect::<Vec<_>>());
}
