//! JSON-lines event stream.
//!
//! Every host call becomes one [`HostEvent`] serialized on its own line, for editors and CI tooling that prefer to
//! parse rather than scrape the console.

use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use crate::host::{FrameworkHandle, HostEvent, MessageLevel, MessageLogger};
use crate::model::{ResultRecord, TestOutcome, UnitDescriptor};

pub struct JsonLinesHandle<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesHandle<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    fn lock(&self) -> MutexGuard<'_, W> {
        self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: &HostEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize host event");
                return;
            }
        };
        let mut out = self.lock();
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            tracing::warn!(error = %e, "failed to write host event");
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> MessageLogger for JsonLinesHandle<W> {
    fn send_message(&self, level: MessageLevel, text: &str) {
        self.emit(&HostEvent::Message {
            level,
            text: text.to_string(),
        });
    }
}

impl<W: Write + Send> FrameworkHandle for JsonLinesHandle<W> {
    fn record_start(&self, unit: &UnitDescriptor) {
        self.emit(&HostEvent::Start { unit: unit.clone() });
    }

    fn record_end(&self, unit: &UnitDescriptor, outcome: TestOutcome) {
        self.emit(&HostEvent::End {
            unit: unit.clone(),
            outcome,
        });
    }

    fn record_result(&self, record: ResultRecord) {
        self.emit(&HostEvent::Result { record });
    }
}
