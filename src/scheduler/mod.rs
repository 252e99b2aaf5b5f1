//! Request execution
//!
//! One execution request goes through four stages:
//! 1. build the hierarchy, load each artifact into the request's [`LoadContext`] and resolve one [`Job`] per unit
//! 2. run the two lifecycle phases
//! 3. fan out one named thread per job
//! 4. join everything and unload the context
//!
//! Setup failures in stage 1 are reported per unit and never block siblings. Cancellation is checked after each
//! lifecycle phase, before each worker is started, and by each worker right before it invokes its method.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod clock;
pub mod worker;

use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};

use spindle_core::{CancellationToken, Fault, MethodInfo};
use thiserror::Error;

use crate::config::{FanOutPolicy, RunnerConfig};
use crate::hierarchy::Hierarchy;
use crate::host::FrameworkHandle;
use crate::invoke::{Invoker, ResolveError};
use crate::lifecycle;
use crate::load::{ArtifactLoader, LoadContext, LoadedArtifact, LoadedClass};
use crate::model::UnitDescriptor;
use crate::reporter::{Reporter, RunSummary, SetupStage};

use clock::MonotonicClock;
pub use worker::{Job, WorkerEnv, WorkerExit, executing_from_framework_thread};

/// Why a unit could not be turned into a job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("method {method} was not found on {class}")]
    MethodNotFound { class: String, method: String },

    #[error("method {method} on {class} is overloaded")]
    Ambiguous { class: String, method: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// The jobs of one class, keyed by artifact location and class full name.
#[derive(Debug)]
pub struct ClassJobGroup {
    pub class: Arc<LoadedClass>,
    pub jobs: Vec<Job>,
}

/// Resolve `unit` against `class` into a job.
pub fn build_job(unit: &UnitDescriptor, class: &Arc<LoadedClass>) -> Result<Job, JobError> {
    let method_name = unit.method_name();
    let candidates: Vec<&MethodInfo> = class.methods_named(method_name).collect();
    let method = match candidates.as_slice() {
        [] => {
            return Err(JobError::MethodNotFound {
                class: class.full_name(),
                method: method_name.to_string(),
            });
        }
        [only] => *only,
        _ => {
            return Err(JobError::Ambiguous {
                class: class.full_name(),
                method: method_name.to_string(),
            });
        }
    };
    Ok(Job {
        unit: unit.clone(),
        invoker: Invoker::resolve(method)?,
        class: Arc::clone(class),
    })
}

/// Executes requests against one loader and configuration.
pub struct Scheduler<'a> {
    loader: &'a dyn ArtifactLoader,
    config: &'a RunnerConfig,
    token: CancellationToken,
}

struct Plan {
    artifacts: Vec<Arc<LoadedArtifact>>,
    groups: Vec<ClassJobGroup>,
}

impl<'a> Scheduler<'a> {
    pub fn new(loader: &'a dyn ArtifactLoader, config: &'a RunnerConfig, token: CancellationToken) -> Self {
        Self { loader, config, token }
    }

    /// Run `units` in a fresh load context named `context_name`, reporting to `handle`.
    #[tracing::instrument(skip_all, fields(context = %context_name))]
    pub fn execute<I>(&self, context_name: &str, units: I, handle: &dyn FrameworkHandle) -> RunSummary
    where
        I: IntoIterator<Item = UnitDescriptor>,
    {
        let hierarchy = Hierarchy::build(units);
        let total = hierarchy.unit_count();
        let reporter = Reporter::new(handle, &self.config.classification);
        let mut context = LoadContext::new(context_name, self.loader);

        let plan = self.plan(&hierarchy, &mut context, &reporter);
        tracing::debug!(total, classes = plan.groups.len(), "request planned");

        if self.initialize(&plan, &reporter) {
            self.fan_out(&plan, &reporter);
            reporter.info("All tests finished.");
        } else {
            tracing::info!("request cancelled during initialization");
        }

        context.unload();
        reporter.info("Test host finished.");
        reporter.summary(total.saturating_sub(reporter.reported()))
    }

    fn plan(&self, hierarchy: &Hierarchy, context: &mut LoadContext<'_>, reporter: &Reporter<'_>) -> Plan {
        let mut plan = Plan {
            artifacts: Vec::new(),
            groups: Vec::new(),
        };

        for (location, classes) in hierarchy.artifacts() {
            reporter.info(&format!("Loading {}", location));
            let artifact = match context.load(location) {
                Ok(artifact) => artifact,
                Err(e) => {
                    tracing::warn!(artifact = location, error = %e, "artifact failed to load");
                    let message = e.to_string();
                    for unit in classes.values().flatten() {
                        reporter.setup_skipped(unit, SetupStage::Artifact, &message, None);
                    }
                    continue;
                }
            };
            reporter.info(&format!("Loaded {} classes from {}", classes.len(), location));

            let mut any_jobs = false;
            for (class_name, units) in classes {
                let Some(class) = artifact.class(class_name) else {
                    let message = format!("class {} was not found in {}", class_name, location);
                    for unit in units {
                        reporter.setup_skipped(unit, SetupStage::Class, &message, None);
                    }
                    continue;
                };
                reporter.info(&format!("Running {} tests in {}.", units.len(), class_name));

                let mut jobs = Vec::with_capacity(units.len());
                for unit in units {
                    match build_job(unit, &class) {
                        Ok(job) => jobs.push(job),
                        Err(e) => reporter.setup_skipped(unit, SetupStage::Method, &e.to_string(), None),
                    }
                }
                if !jobs.is_empty() {
                    any_jobs = true;
                    plan.groups.push(ClassJobGroup { class, jobs });
                }
            }
            if any_jobs {
                plan.artifacts.push(artifact);
            }
        }
        plan
    }

    /// Run both lifecycle phases. Returns `false` when cancellation was observed.
    fn initialize(&self, plan: &Plan, reporter: &Reporter<'_>) -> bool {
        lifecycle::run_artifact_phase(&plan.artifacts, reporter, &self.token);
        if self.token.is_cancellation_requested() {
            return false;
        }
        let classes: Vec<Arc<LoadedClass>> = plan.groups.iter().map(|g| Arc::clone(&g.class)).collect();
        lifecycle::run_class_phase(&classes, reporter, &self.token);
        !self.token.is_cancellation_requested()
    }

    fn fan_out(&self, plan: &Plan, reporter: &Reporter<'_>) {
        let env = WorkerEnv {
            reporter,
            token: &self.token,
            clock: MonotonicClock::new(),
            align: self.config.align_timestamps,
        };

        reporter.info("Starting tests.");
        thread::scope(|scope| {
            let mut running = Vec::new();
            for job in plan.groups.iter().flat_map(|g| g.jobs.iter()) {
                if self.token.is_cancellation_requested() {
                    tracing::debug!(unit = %job.unit.id, "cancellation requested, not starting further workers");
                    break;
                }
                let spawned = thread::Builder::new()
                    .name(format!("Test: {}", job.unit.id))
                    .spawn_scoped(scope, move || worker::run_job(job, env));
                match spawned {
                    Ok(handle) => match self.config.fan_out {
                        FanOutPolicy::Unbounded => running.push((job, handle)),
                        FanOutPolicy::Sequential => join_worker(job, handle, reporter),
                    },
                    Err(e) => {
                        tracing::warn!(unit = %job.unit.id, error = %e, "failed to start worker thread");
                        reporter.setup_skipped(&job.unit, SetupStage::Method, &e.to_string(), None);
                    }
                }
            }
            reporter.info("All tests started.");

            for (job, handle) in running {
                join_worker(job, handle, reporter);
            }
        });
    }
}

fn join_worker(job: &Job, handle: ScopedJoinHandle<'_, WorkerExit>, reporter: &Reporter<'_>) {
    match handle.join() {
        Ok(exit) => tracing::trace!(unit = %job.unit.id, ?exit, "worker joined"),
        Err(payload) => {
            // The worker itself catches test panics; this is a panicking host collaborator.
            let fault = Fault::from_panic(payload);
            tracing::error!(unit = %job.unit.id, fault = %fault, "worker thread panicked");
            reporter.warn(&format!("Worker for {} terminated unexpectedly: {}", job.unit.id, fault));
        }
    }
}
