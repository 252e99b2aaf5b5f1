//! The per-unit worker.
//!
//! Runs on the unit's own thread: construct, prepare, align, check cancellation, invoke, report, dispose. Everything
//! here is local to the worker; the only shared state it touches is the job, the token and the reporter.

use std::cell::Cell;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use spindle_core::{CancellationToken, Instance, TestLog, catch_fault};

use crate::invoke::Invoker;
use crate::load::LoadedClass;
use crate::model::{TestOutcome, UnitDescriptor};
use crate::reporter::{Reporter, SetupStage, Timing};

use super::clock::MonotonicClock;

thread_local! {
    static FRAMEWORK_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Whether the calling thread is a unit worker started by the engine.
pub fn executing_from_framework_thread() -> bool {
    FRAMEWORK_THREAD.with(Cell::get)
}

/// One schedulable unit with its resolved entry point.
#[derive(Debug)]
pub struct Job {
    pub unit: UnitDescriptor,
    pub invoker: Invoker,
    pub class: Arc<LoadedClass>,
}

/// How a worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Skipped before it could run
    SetupSkipped,
    /// Cancelled before start; nothing was reported
    NotStarted,
    /// Ran to a terminal outcome
    Finished(TestOutcome),
}

/// Shared, read-only inputs of every worker in a request.
#[derive(Clone, Copy)]
pub struct WorkerEnv<'a> {
    pub reporter: &'a Reporter<'a>,
    pub token: &'a CancellationToken,
    pub clock: MonotonicClock,
    pub align: bool,
}

/// Run `job` to completion on the current thread.
pub fn run_job(job: &Job, env: WorkerEnv<'_>) -> WorkerExit {
    FRAMEWORK_THREAD.with(|flag| flag.set(true));

    let mut instance = match job.class.construct() {
        Ok(instance) => instance,
        Err(fault) => {
            env.reporter.setup_faulted(&job.unit, SetupStage::Instance, &fault);
            return WorkerExit::SetupSkipped;
        }
    };

    let exit = run_constructed(job, env, &mut instance);
    dispose(job, env, &mut instance);
    exit
}

fn run_constructed(job: &Job, env: WorkerEnv<'_>, instance: &mut Instance) -> WorkerExit {
    if let Err(e) = job.invoker.prepare(instance) {
        env.reporter.setup_skipped(&job.unit, SetupStage::Prepare, &e.to_string(), None);
        return WorkerExit::SetupSkipped;
    }

    if env.align {
        env.clock.align();
    }

    if env.token.is_cancellation_requested() {
        tracing::debug!(unit = %job.unit.id, "cancelled before start");
        return WorkerExit::NotStarted;
    }

    let mut log = TestLog::new();
    env.reporter.started(&job.unit);
    let started_at = SystemTime::now();
    let started = Instant::now();

    let result = catch_fault(|| job.invoker.invoke(instance, &mut log, env.token));

    let ended = Instant::now();
    let ended_at = SystemTime::now();
    let timing = Timing {
        started_at,
        ended_at,
        started,
        ended,
    };
    let outcome = env
        .reporter
        .finished(&job.unit, timing, result.err().as_ref(), env.token, log.into_string());
    WorkerExit::Finished(outcome)
}

fn dispose(job: &Job, env: WorkerEnv<'_>, instance: &mut Instance) {
    if !instance.is_disposable() {
        return;
    }
    if let Err(fault) = catch_fault(|| instance.dispose()) {
        env.reporter.disposal_failed(&job.unit, &fault);
    }
}
