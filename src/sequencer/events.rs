//! Progress events emitted while a plan runs.
//!
//! The sequencer never prints. Presentation layers implement [`EventSink`]
//! and render these however they like.

use crate::models::{ApplyResult, PhaseStatus};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// How a phase is being stabilized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitKind {
    /// Fixed wall-clock pause
    Fixed(Duration),
    /// Polling a readiness command until it succeeds
    Readiness { command: String, timeout: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceEvent {
    PhaseStarted {
        /// 1-based position in the plan
        index: usize,
        total: usize,
        name: String,
        files: usize,
    },
    FileStarted {
        file: PathBuf,
    },
    FileFinished {
        result: ApplyResult,
    },
    WaitStarted {
        phase: String,
        kind: WaitKind,
    },
    ReadinessPolled {
        phase: String,
        attempt: u32,
        ready: bool,
    },
    WaitFinished {
        phase: String,
    },
    PhaseFinished {
        name: String,
        status: PhaseStatus,
        succeeded: usize,
        failed: usize,
    },
    RunFinished {
        total: usize,
        succeeded: usize,
        failed: usize,
    },
}

pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &SequenceEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&self, _event: &SequenceEvent) {}
}

/// Keeps every event in memory, in order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SequenceEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SequenceEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn on_event(&self, event: &SequenceEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.on_event(&SequenceEvent::FileStarted { file: "a.yaml".into() });
        sink.on_event(&SequenceEvent::WaitFinished { phase: "db".into() });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SequenceEvent::FileStarted { .. }));
        assert!(matches!(events[1], SequenceEvent::WaitFinished { .. }));
    }
}
