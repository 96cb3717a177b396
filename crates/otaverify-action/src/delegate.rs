//! Observers notified by the action processor.

use otaverify_events::{Event, EventBus};
use otaverify_telemetry::Metrics;

use crate::action::Action;
use crate::code::ErrorCode;

/// Receives lifecycle notifications from an [`ActionProcessor`](crate::ActionProcessor).
///
/// Every method defaults to a no-op so observers implement only what they need.
pub trait ActionProcessorDelegate: Send + Sync {
    /// The queue drained, or was aborted by a failing action.
    fn processing_done(&self, code: ErrorCode) {
        let _ = code;
    }

    /// Processing was stopped before the queue drained.
    fn processing_stopped(&self) {}

    /// `action` finished with `code`.
    fn action_completed(&self, action: &dyn Action, code: ErrorCode) {
        let _ = (action, code);
    }

    /// `action` was handed control.
    fn action_started(&self, action: &dyn Action) {
        let _ = action;
    }

    /// Processing was suspended.
    fn processing_suspended(&self) {}

    /// Processing resumed.
    fn processing_resumed(&self) {}
}

/// Delegate that republishes processor notifications on an [`EventBus`].
#[derive(Clone)]
pub struct EventBusDelegate {
    events: EventBus,
    metrics: Option<Metrics>,
}

impl EventBusDelegate {
    /// Publish notifications to `events`.
    #[must_use]
    pub const fn new(events: EventBus) -> Self {
        Self {
            events,
            metrics: None,
        }
    }

    /// Also count completions in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl ActionProcessorDelegate for EventBusDelegate {
    fn processing_done(&self, code: ErrorCode) {
        let _ = self.events.publish(Event::ProcessingDone {
            code: code.as_str().to_string(),
        });
    }

    fn processing_stopped(&self) {
        let _ = self.events.publish(Event::ProcessingStopped);
    }

    fn action_completed(&self, action: &dyn Action, code: ErrorCode) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_action_completed(action.type_name(), code.as_str());
        }
        let _ = self.events.publish(Event::ActionCompleted {
            action: action.type_name().to_string(),
            code: code.as_str().to_string(),
        });
    }

    fn action_started(&self, action: &dyn Action) {
        let _ = self.events.publish(Event::ActionStarted {
            action: action.type_name().to_string(),
        });
    }

    fn processing_suspended(&self) {
        let _ = self.events.publish(Event::ProcessingSuspended);
    }

    fn processing_resumed(&self) {
        let _ = self.events.publish(Event::ProcessingResumed);
    }
}
