//! Runner configuration
//!
//! Discovery filters, fan-out policy and outcome classification are all plain data here, so hosts and the CLI can
//! tune them without touching the engine.

use crate::reporter::ClassificationPolicy;

/// How the scheduler starts unit workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanOutPolicy {
    /// Start every worker before joining any of them.
    #[default]
    Unbounded,
    /// Join each worker before starting the next one (debugging aid).
    Sequential,
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Suffix a class's simple name must end with to be discovered
    pub class_suffix: String,
    /// Suffix a class's namespace must end with to be discovered
    pub namespace_suffix: String,
    pub fan_out: FanOutPolicy,
    /// Spin until the monotonic clock ticks over before starting each unit
    pub align_timestamps: bool,
    pub classification: ClassificationPolicy,
    /// Prefix for execution load-context names; a per-runner counter is appended
    pub context_prefix: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            class_suffix: "Tests".to_string(),
            namespace_suffix: ".Tests".to_string(),
            fan_out: FanOutPolicy::Unbounded,
            align_timestamps: true,
            classification: ClassificationPolicy::default(),
            context_prefix: "spindle-executor".to_string(),
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.class_suffix = suffix.into();
        self
    }

    pub fn with_namespace_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.namespace_suffix = suffix.into();
        self
    }

    pub fn with_fan_out(mut self, policy: FanOutPolicy) -> Self {
        self.fan_out = policy;
        self
    }

    pub fn with_align_timestamps(mut self, align: bool) -> Self {
        self.align_timestamps = align;
        self
    }

    pub fn with_classification(mut self, policy: ClassificationPolicy) -> Self {
        self.classification = policy;
        self
    }

    pub fn with_context_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.context_prefix = prefix.into();
        self
    }
}
