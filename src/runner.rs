//! The host-facing entry point.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::sync::atomic::{AtomicU64, Ordering};

use spindle_core::{CancellationSource, CancellationToken};

use crate::config::RunnerConfig;
use crate::discovery;
use crate::host::{CollectingSink, DiscoveryContext, DiscoverySink, FrameworkHandle, MessageLevel, MessageLogger, RunContext};
use crate::load::ArtifactLoader;
use crate::model::UnitDescriptor;
use crate::reporter::RunSummary;
use crate::scheduler::Scheduler;

/// Forwards discovery diagnostics to a framework handle.
struct HandleLogger<'h>(&'h dyn FrameworkHandle);

impl MessageLogger for HandleLogger<'_> {
    fn send_message(&self, level: MessageLevel, text: &str) {
        self.0.send_message(level, text);
    }
}

/// Discovers and runs test units from the artifacts a loader can produce.
///
/// A runner owns one cancellation signal for its whole lifetime: once [`TestRunner::cancel`] has been called, every
/// later request on the same runner is cancelled as well.
pub struct TestRunner {
    loader: Box<dyn ArtifactLoader>,
    config: RunnerConfig,
    cancellation: CancellationSource,
    contexts: AtomicU64,
}

impl TestRunner {
    pub fn new(loader: impl ArtifactLoader + 'static) -> Self {
        Self::with_config(loader, RunnerConfig::default())
    }

    pub fn with_config(loader: impl ArtifactLoader + 'static, config: RunnerConfig) -> Self {
        Self {
            loader: Box::new(loader),
            config,
            cancellation: CancellationSource::new(),
            contexts: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Stream every unit found in `artifacts` to `sink`.
    pub fn discover_tests<I, S>(
        &self,
        artifacts: I,
        _context: &DiscoveryContext,
        logger: Option<&dyn MessageLogger>,
        sink: &mut dyn DiscoverySink,
    ) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        discovery::discover(self.loader.as_ref(), &self.config, artifacts, logger, sink)
    }

    /// Run the given units.
    pub fn run_tests<I>(&self, units: I, _context: &RunContext, handle: &dyn FrameworkHandle) -> RunSummary
    where
        I: IntoIterator<Item = UnitDescriptor>,
    {
        let context_name = self.next_context_name();
        tracing::debug!(context = %context_name, "starting execution request");
        Scheduler::new(self.loader.as_ref(), &self.config, self.cancellation.token()).execute(&context_name, units, handle)
    }

    /// Discover everything in `artifacts`, then run it.
    pub fn run_artifacts<I, S>(&self, artifacts: I, context: &RunContext, handle: &dyn FrameworkHandle) -> RunSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sink = CollectingSink::new();
        let logger = HandleLogger(handle);
        self.discover_tests(artifacts, &DiscoveryContext::default(), Some(&logger), &mut sink);
        self.run_tests(sink.into_units(), context, handle)
    }

    /// Request cancellation of the current and all later requests. Idempotent.
    pub fn cancel(&self) {
        tracing::info!("cancellation requested");
        self.cancellation.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.token()
    }

    pub fn should_attach_debugger(&self, units: &[UnitDescriptor]) -> bool {
        !units.is_empty()
    }

    pub fn should_attach_debugger_to_artifacts<S: AsRef<str>>(&self, artifacts: &[S]) -> bool {
        !artifacts.is_empty()
    }

    fn next_context_name(&self) -> String {
        let n = self.contexts.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.config.context_prefix, n)
    }
}

impl std::fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRunner")
            .field("config", &self.config)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}
