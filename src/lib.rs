#![forbid(unsafe_code)]
//! spindle: reflection-driven test discovery and execution
//!
//! Test artifacts describe their types through `spindle_core`'s reflection vocabulary (usually generated by
//! `#[test_class]`). The engine discovers qualifying classes and methods, groups them, runs artifact and class
//! initializers in two barrier phases, and then runs every unit on its own named thread, reporting each outcome to a
//! host-provided [`host::FrameworkHandle`].
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. Engine modules enforce
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Code under test**: panics raised by test methods, constructors, initializers and disposers are caught at the
//!   engine boundary and turned into faults.

pub mod cli;
pub mod config;
pub mod demo;
pub mod discovery;
pub mod hierarchy;
pub mod host;
pub mod invoke;
pub mod lifecycle;
pub mod load;
pub mod model;
pub mod reporter;
pub mod runner;
pub mod scheduler;

pub use config::{FanOutPolicy, RunnerConfig};
pub use hierarchy::Hierarchy;
pub use host::{
    CollectingSink, DiscoveryContext, DiscoverySink, FrameworkHandle, HostEvent, MessageLevel, MessageLogger,
    RecordingHandle, RunContext,
};
pub use load::{ArtifactLoader, ArtifactRegistry, LoadError};
pub use model::{MessageCategory, ResultMessage, ResultRecord, TestOutcome, UnitDescriptor};
pub use reporter::{ClassificationPolicy, ConsoleHandle, JsonLinesHandle, NameRule, RunSummary};
pub use runner::TestRunner;
pub use scheduler::executing_from_framework_thread;

pub use spindle_core::{CancellationSource, CancellationToken, Dispose, Fault, TestLog, TestResult};
pub use spindle_derive::test_class;
