//! Event types for the APEX event system
//!
//! Detection progress is broadcast through [`EventBus`] so HTTP clients can
//! follow a job over SSE instead of polling status.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// APEX event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Payload fields are camelCase, matching the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ApexEvent {
    /// Detection job seeded and scheduling began
    DetectionStarted {
        job_id: String,
        total: usize,
    },

    /// One report finished both tiers; values are already terminal
    ReportResolved {
        job_id: String,
        report_key: String,
        fields_mapped: bool,
        attributes_mapped: bool,
        done: usize,
        total: usize,
    },

    /// All reports processed
    DetectionCompleted {
        job_id: String,
        fields_all_yes: bool,
        fields_any_no: bool,
        attributes_all_yes: bool,
        attributes_any_no: bool,
    },

    /// A tier failed and the job was terminated
    DetectionFailed {
        job_id: String,
        message: String,
    },
}

impl ApexEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            ApexEvent::DetectionStarted { .. } => "DetectionStarted",
            ApexEvent::ReportResolved { .. } => "ReportResolved",
            ApexEvent::DetectionCompleted { .. } => "DetectionCompleted",
            ApexEvent::DetectionFailed { .. } => "DetectionFailed",
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            ApexEvent::DetectionStarted { job_id, .. }
            | ApexEvent::ReportResolved { job_id, .. }
            | ApexEvent::DetectionCompleted { job_id, .. }
            | ApexEvent::DetectionFailed { job_id, .. } => job_id,
        }
    }
}

/// Broadcast bus for [`ApexEvent`]s
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ApexEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before slow receivers
    /// start lagging and lose the oldest events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ApexEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ApexEvent,
    ) -> Result<usize, broadcast::error::SendError<ApexEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ApexEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
