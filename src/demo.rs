//! Built-in demo artifact
//!
//! A small artifact the CLI runs against, and that the integration tests use as a realistic fixture. It exercises
//! every calling convention, both kinds of skip, a failing static initializer, a disposable class and a handful of
//! types that must not be discovered.

use std::sync::atomic::{AtomicUsize, Ordering};

use spindle_core::{ArtifactInfo, CancellationToken, Dispose, Fault, TestLog, TestResult};
use spindle_derive::test_class;

use crate::load::ArtifactRegistry;
use crate::scheduler::executing_from_framework_thread;

/// Location the demo artifact is registered under.
pub const DEMO_ARTIFACT: &str = "spindle-demo";

static DISPOSALS: AtomicUsize = AtomicUsize::new(0);
static MY_TESTS_INITIALIZED: AtomicUsize = AtomicUsize::new(0);

/// How many `DisposableTests` instances have been disposed in this process.
pub fn disposals() -> usize {
    DISPOSALS.load(Ordering::SeqCst)
}

/// How many times the `MyTests` static initializer has run in this process.
pub fn my_tests_initializations() -> usize {
    MY_TESTS_INITIALIZED.load(Ordering::SeqCst)
}

// ============================================================================
// Discoverable classes
// ============================================================================

#[derive(Default)]
pub struct ActualTests {
    calls: usize,
}

#[allow(non_snake_case)]
#[test_class(namespace = "Demo.Tests")]
impl ActualTests {
    pub fn Passing_test(&mut self) {
        self.calls += 1;
    }

    pub fn Failing_test(&mut self) -> TestResult {
        Err(Fault::new("AssertFailed", "expected 4, got 5"))
    }

    pub fn Panicking_test(&mut self) {
        let values: Vec<u32> = Vec::new();
        assert!(!values.is_empty(), "values should have been populated");
    }

    pub fn Inconclusive_test(&mut self) -> TestResult {
        Err(Fault::inconclusive("the backing service is not reachable"))
    }

    pub fn Skipped_test(&mut self) -> TestResult {
        Err(Fault::skip("not supported on this platform"))
    }

    pub fn Logging_test(&mut self, log: &mut TestLog) {
        log.line("first line");
        log.line("second line");
    }

    pub fn Cancellable_test(&mut self, token: &CancellationToken) -> TestResult {
        token.error_if_cancelled()
    }

    #[display_name = "Logs and honours cancellation"]
    pub fn Logging_cancellable_test(&mut self, log: &mut TestLog, token: &CancellationToken) -> TestResult {
        log.line(format!("cancelled: {}", token.is_cancellation_requested()));
        token.error_if_cancelled()
    }

    pub fn Framework_thread_test(&self) -> TestResult {
        if executing_from_framework_thread() {
            Ok(())
        } else {
            Err(Fault::new("AssertFailed", "not running on a framework thread"))
        }
    }

    // Not discovered: wrong return type, unsupported parameters, no receiver, not public.

    pub fn returns_value(&mut self) -> bool {
        self.calls > 0
    }

    pub fn takes_count(&mut self, count: u32) {
        self.calls += count as usize;
    }

    pub fn reversed_params(&mut self, _token: &CancellationToken, _log: &mut TestLog) {}

    pub fn associated_helper() {}

    #[allow(dead_code)]
    fn private_test(&mut self) {
        self.calls += 1;
    }
}

#[derive(Default)]
pub struct MyTests;

#[test_class(namespace = "Demo.Tests", static_init = "Self::init")]
impl MyTests {
    fn init() {
        MY_TESTS_INITIALIZED.fetch_add(1, Ordering::SeqCst);
    }

    pub fn runs(&mut self) {}

    pub fn writes_output(&self, log: &mut TestLog) {
        log.line("hello from MyTests");
    }
}

pub struct DisposableTests {
    open: bool,
}

#[test_class(namespace = "Demo.Tests", disposable, constructor = "Self::open")]
impl DisposableTests {
    fn open() -> Result<Self, Fault> {
        Ok(Self { open: true })
    }

    pub fn uses_resource(&mut self) -> TestResult {
        if self.open {
            Ok(())
        } else {
            Err(Fault::new("AssertFailed", "resource was not opened"))
        }
    }

    pub fn fails_with_resource(&mut self) -> TestResult {
        Err(Fault::new("AssertFailed", "resource misbehaved"))
    }
}

impl Dispose for DisposableTests {
    fn dispose(&mut self) -> TestResult {
        self.open = false;
        DISPOSALS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct StaticFailureTests;

#[test_class(namespace = "Demo.Tests", static_init = "Self::explode")]
impl StaticFailureTests {
    fn explode() -> TestResult {
        Err(Fault::new("TypeInitialization", "static setup failed"))
    }

    pub fn still_runs(&mut self) {}
}

// ============================================================================
// Non-qualifying classes
// ============================================================================

#[derive(Default)]
pub struct UnsealedTests;

#[test_class(namespace = "Demo.Tests", unsealed)]
impl UnsealedTests {
    pub fn never_discovered(&mut self) {}
}

#[derive(Default)]
pub struct AbstractTests;

#[test_class(namespace = "Demo.Tests", is_abstract)]
impl AbstractTests {
    pub fn never_discovered(&mut self) {}
}

#[derive(Default)]
pub struct BadClassTests;

#[test_class(namespace = "Demo.Fixtures")]
impl BadClassTests {
    pub fn never_discovered(&mut self) {}
}

#[derive(Default)]
pub struct Helpers;

#[test_class(namespace = "Demo.Tests")]
impl Helpers {
    pub fn never_discovered(&mut self) {}
}

// ============================================================================
// Artifact
// ============================================================================

/// The demo artifact's reflection metadata.
pub fn demo_artifact() -> ArtifactInfo {
    ArtifactInfo::new(DEMO_ARTIFACT)
        .with_module_initializer(|| {
            tracing::debug!("demo module initialized");
            Ok(())
        })
        .export::<ActualTests>()
        .export::<MyTests>()
        .export::<DisposableTests>()
        .export::<StaticFailureTests>()
        .export::<UnsealedTests>()
        .export::<AbstractTests>()
        .export::<BadClassTests>()
        .export::<Helpers>()
}

/// Registry with the demo artifact registered under [`DEMO_ARTIFACT`].
pub fn demo_registry() -> ArtifactRegistry {
    ArtifactRegistry::new().with_artifact(DEMO_ARTIFACT, demo_artifact)
}
