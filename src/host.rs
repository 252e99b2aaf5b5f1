//! Host collaborator interfaces
//!
//! The engine talks to whatever drives it (an IDE adapter, the CLI, a test) only through these traits:
//! - `MessageLogger`: free-form diagnostics with a severity
//! - `DiscoverySink`: receives each discovered unit as soon as it is found
//! - `FrameworkHandle`: receives start/end events and result records during a run
//!
//! `FrameworkHandle` is shared by every worker thread, so implementations must be `Send + Sync` and tolerate
//! concurrent calls.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::model::{ResultRecord, TestOutcome, UnitDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Informational,
    Warning,
    Error,
}

pub trait MessageLogger {
    fn send_message(&self, level: MessageLevel, text: &str);
}

pub trait DiscoverySink {
    fn send_test_case(&mut self, unit: UnitDescriptor);
}

pub trait FrameworkHandle: MessageLogger + Send + Sync {
    fn record_start(&self, unit: &UnitDescriptor);
    fn record_end(&self, unit: &UnitDescriptor, outcome: TestOutcome);
    fn record_result(&self, record: ResultRecord);
}

/// Host-provided discovery context. Carried through for hosts; the engine does not read it.
#[derive(Debug, Default, Clone)]
#[non_exhaustive]
pub struct DiscoveryContext {}

/// Host-provided run context. Carried through for hosts; the engine does not read it.
#[derive(Debug, Default, Clone)]
#[non_exhaustive]
pub struct RunContext {}

// ============================================================================
// Collectors
// ============================================================================

/// Discovery sink that keeps every unit in arrival order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    units: Vec<UnitDescriptor>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> &[UnitDescriptor] {
        &self.units
    }

    pub fn into_units(self) -> Vec<UnitDescriptor> {
        self.units
    }
}

impl DiscoverySink for CollectingSink {
    fn send_test_case(&mut self, unit: UnitDescriptor) {
        self.units.push(unit);
    }
}

/// One call made on a host collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    Message { level: MessageLevel, text: String },
    Start { unit: UnitDescriptor },
    End { unit: UnitDescriptor, outcome: TestOutcome },
    Result { record: ResultRecord },
}

/// Framework handle that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingHandle {
    events: Mutex<Vec<HostEvent>>,
}

impl RecordingHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HostEvent>> {
        // A panicking host thread must not hide the events recorded before it.
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, event: HostEvent) {
        self.lock().push(event);
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.lock().clone()
    }

    pub fn results(&self) -> Vec<ResultRecord> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                HostEvent::Result { record } => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    /// The result recorded for the unit with `id`, if any.
    pub fn result_for(&self, id: &str) -> Option<ResultRecord> {
        self.results().into_iter().find(|r| r.unit.id == id)
    }

    pub fn starts(&self) -> Vec<UnitDescriptor> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                HostEvent::Start { unit } => Some(unit.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self, level: MessageLevel) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                HostEvent::Message { level: l, text } if *l == level => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl MessageLogger for RecordingHandle {
    fn send_message(&self, level: MessageLevel, text: &str) {
        self.push(HostEvent::Message {
            level,
            text: text.to_string(),
        });
    }
}

impl FrameworkHandle for RecordingHandle {
    fn record_start(&self, unit: &UnitDescriptor) {
        self.push(HostEvent::Start { unit: unit.clone() });
    }

    fn record_end(&self, unit: &UnitDescriptor, outcome: TestOutcome) {
        self.push(HostEvent::End {
            unit: unit.clone(),
            outcome,
        });
    }

    fn record_result(&self, record: ResultRecord) {
        self.push(HostEvent::Result { record });
    }
}
