//! Data that crosses the host boundary: unit descriptors, outcomes and result records.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// One discovered test unit.
///
/// `id` is the fully-qualified `Namespace.Class.method`; it identifies the unit within its artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitDescriptor {
    pub id: String,
    pub display_name: String,
    pub artifact: String,
}

impl UnitDescriptor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            artifact: artifact.into(),
        }
    }

    /// The qualifier before the last `.` of the id, or `""` when there is none.
    pub fn class_name(&self) -> &str {
        self.id.rsplit_once('.').map_or("", |(class, _)| class)
    }

    /// The part of the id after the last `.`.
    pub fn method_name(&self) -> &str {
        self.id.rsplit_once('.').map_or(self.id.as_str(), |(_, method)| method)
    }
}

impl fmt::Display for UnitDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Terminal outcome of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed,
    Skipped,
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestOutcome::Passed => "passed",
            TestOutcome::Failed => "failed",
            TestOutcome::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Category of a message attached to a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    StandardOutput,
    StandardError,
    AdditionalInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub category: MessageCategory,
    pub text: String,
}

impl ResultMessage {
    pub fn new(category: MessageCategory, text: impl Into<String>) -> Self {
        Self {
            category,
            text: text.into(),
        }
    }
}

/// The result reported for one unit.
///
/// Records for units that ran carry wall-clock start/end, the monotonic duration and the captured output. Records for
/// units that could not be set up carry only the outcome, the fault and a standard-error message naming the stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub unit: UnitDescriptor,
    pub outcome: TestOutcome,
    pub start_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
    pub duration: Duration,
    pub error_message: Option<String>,
    pub error_stack_trace: Option<String>,
    pub messages: Vec<ResultMessage>,
}

impl ResultRecord {
    pub fn new(unit: UnitDescriptor, outcome: TestOutcome) -> Self {
        Self {
            unit,
            outcome,
            start_time: None,
            end_time: None,
            duration: Duration::ZERO,
            error_message: None,
            error_stack_trace: None,
            messages: Vec::new(),
        }
    }

    /// Text of the first message in `category`.
    pub fn message(&self, category: MessageCategory) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.category == category)
            .map(|m| m.text.as_str())
    }

    /// Output the unit wrote to its logger.
    pub fn captured_output(&self) -> &str {
        self.message(MessageCategory::StandardOutput).unwrap_or("")
    }
}
