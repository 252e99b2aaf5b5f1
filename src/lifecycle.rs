//! Two-phase lifecycle initializer
//!
//! Before any unit runs, every artifact referenced by the request gets its module initializer run on a dedicated
//! thread, then every referenced class gets its static initializer run the same way. Each phase is a barrier: all of
//! its threads are joined before the next phase (or the fan-out) starts.
//!
//! A failing initializer only ends its own worker. It is logged, forwarded to the host as a warning, and the units of
//! that artifact or class are still scheduled.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use spindle_core::{CancellationToken, Fault, TestResult};

use crate::load::{LoadedArtifact, LoadedClass};
use crate::reporter::Reporter;

/// What one phase did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseReport {
    /// Initializer threads started
    pub workers: usize,
    /// Initializers that returned a fault or panicked
    pub failures: usize,
}

struct InitTask<'a> {
    thread_name: String,
    run: Box<dyn FnOnce() -> Option<TestResult> + Send + 'a>,
}

/// Run every distinct artifact's module initializer, one thread per artifact.
#[tracing::instrument(skip_all, fields(artifacts = artifacts.len()))]
pub fn run_artifact_phase(artifacts: &[Arc<LoadedArtifact>], reporter: &Reporter<'_>, token: &CancellationToken) -> PhaseReport {
    let mut seen = HashSet::new();
    let tasks = artifacts
        .iter()
        .filter(|a| seen.insert(a.location().to_string()))
        .map(|artifact| InitTask {
            thread_name: format!("init module {}", artifact.name()),
            run: Box::new(move || artifact.initialize()),
        })
        .collect();
    run_phase(tasks, reporter, token)
}

/// Run every distinct class's static initializer, one thread per class.
#[tracing::instrument(skip_all, fields(classes = classes.len()))]
pub fn run_class_phase(classes: &[Arc<LoadedClass>], reporter: &Reporter<'_>, token: &CancellationToken) -> PhaseReport {
    let mut seen = HashSet::new();
    let tasks = classes
        .iter()
        .filter(|c| seen.insert((c.artifact().to_string(), c.full_name())))
        .map(|class| InitTask {
            thread_name: format!("init static {}", class.full_name()),
            run: Box::new(move || class.initialize()),
        })
        .collect();
    run_phase(tasks, reporter, token)
}

fn run_phase(tasks: Vec<InitTask<'_>>, reporter: &Reporter<'_>, token: &CancellationToken) -> PhaseReport {
    let mut report = PhaseReport::default();

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            if token.is_cancellation_requested() {
                tracing::debug!("cancellation requested, not starting further initializers");
                break;
            }
            let name = task.thread_name;
            let run = task.run;
            match thread::Builder::new().name(name.clone()).spawn_scoped(scope, run) {
                Ok(handle) => {
                    report.workers += 1;
                    handles.push((name, handle));
                }
                Err(e) => {
                    report.failures += 1;
                    initializer_failed(reporter, &name, &Fault::from(e));
                }
            }
        }

        for (name, handle) in handles {
            let outcome = match handle.join() {
                Ok(outcome) => outcome,
                Err(payload) => Some(Err(Fault::from_panic(payload))),
            };
            if let Some(Err(fault)) = outcome {
                report.failures += 1;
                initializer_failed(reporter, &name, &fault);
            }
        }
    });

    tracing::debug!(workers = report.workers, failures = report.failures, "phase finished");
    report
}

fn initializer_failed(reporter: &Reporter<'_>, thread_name: &str, fault: &Fault) {
    tracing::error!(
        thread = thread_name,
        fault_type = fault.type_name(),
        message = fault.message(),
        stack = fault.stack_trace(),
        "initializer failed"
    );
    reporter.warn(&format!("Initializer on thread '{}' failed: {}", thread_name, fault));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::host::{MessageLevel, RecordingHandle};
    use crate::load::{ArtifactRegistry, LoadContext};
    use crate::reporter::ClassificationPolicy;
    use spindle_core::{ArtifactInfo, CancellationSource, TypeInfo};
    use std::sync::Mutex;

    static THREAD_NAMES: Mutex<Vec<String>> = Mutex::new(Vec::new());

    fn record_thread() -> TestResult {
        let name = thread::current().name().unwrap_or_default().to_string();
        THREAD_NAMES.lock().unwrap().push(name);
        Ok(())
    }

    fn artifact() -> ArtifactInfo {
        ArtifactInfo::new("lifecycle")
            .with_module_initializer(record_thread)
            .export_type(TypeInfo::class("Life.Tests", "GoodTests").with_static_initializer(record_thread))
            .export_type(
                TypeInfo::class("Life.Tests", "BadTests")
                    .with_static_initializer(|| Err(Fault::new("TypeInitialization", "static ctor threw"))),
            )
    }

    #[test]
    fn test_phases_run_each_initializer_once_on_named_threads() {
        let registry = ArtifactRegistry::new().with_artifact("life", artifact);
        let mut ctx = LoadContext::new("life-ctx", &registry);
        let loaded = ctx.load("life").unwrap();
        let handle = RecordingHandle::new();
        let policy = ClassificationPolicy::default();
        let reporter = Reporter::new(&handle, &policy);
        let token = CancellationToken::none();

        let artifacts = vec![Arc::clone(&loaded), Arc::clone(&loaded)];
        let report = run_artifact_phase(&artifacts, &reporter, &token);
        assert_eq!(report, PhaseReport { workers: 1, failures: 0 });

        let good = loaded.class("Life.Tests.GoodTests").unwrap();
        let bad = loaded.class("Life.Tests.BadTests").unwrap();
        let classes = vec![Arc::clone(&good), Arc::clone(&bad), Arc::clone(&good)];
        let report = run_class_phase(&classes, &reporter, &token);
        assert_eq!(report, PhaseReport { workers: 2, failures: 1 });

        let names = THREAD_NAMES.lock().unwrap().clone();
        assert!(names.contains(&"init module lifecycle".to_string()));
        assert!(names.contains(&"init static Life.Tests.GoodTests".to_string()));

        let warnings = handle.messages(MessageLevel::Warning);
        assert_eq!(warnings.len(), 1);
        insta::assert_snapshot!(
            &warnings[0],
            @"Initializer on thread 'init static Life.Tests.BadTests' failed: TypeInitialization: static ctor threw"
        );

        // Already initialized in this context.
        let again = run_class_phase(&classes, &reporter, &token);
        assert_eq!(again, PhaseReport { workers: 2, failures: 0 });
    }

    #[test]
    fn test_panicking_initializer_is_contained() {
        let registry = ArtifactRegistry::new().with_artifact("boom", || {
            ArtifactInfo::new("boom").with_module_initializer(|| -> TestResult { panic!("module init exploded") })
        });
        let mut ctx = LoadContext::new("boom-ctx", &registry);
        let loaded = ctx.load("boom").unwrap();
        let handle = RecordingHandle::new();
        let policy = ClassificationPolicy::default();
        let reporter = Reporter::new(&handle, &policy);

        let report = run_artifact_phase(&[loaded], &reporter, &CancellationToken::none());
        assert_eq!(report.failures, 1);
        assert!(handle.messages(MessageLevel::Warning)[0].contains("module init exploded"));
    }

    #[test]
    fn test_cancelled_phase_starts_nothing() {
        let registry = ArtifactRegistry::new().with_artifact("life", artifact);
        let mut ctx = LoadContext::new("cancel-ctx", &registry);
        let loaded = ctx.load("life").unwrap();
        let handle = RecordingHandle::new();
        let policy = ClassificationPolicy::default();
        let reporter = Reporter::new(&handle, &policy);
        let source = CancellationSource::new();
        source.cancel();

        let report = run_artifact_phase(&[loaded], &reporter, &source.token());
        assert_eq!(report, PhaseReport::default());
    }
}
