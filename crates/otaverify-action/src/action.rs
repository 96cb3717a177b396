//! The `Action` capability set and the completion handle passed to `perform`.

use tokio::sync::mpsc::UnboundedSender;

use crate::code::ErrorCode;

/// Identifier the processor assigns each time it starts an action.
pub type ActionId = u64;

/// One unit of asynchronous work run by an [`ActionProcessor`](crate::ActionProcessor).
///
/// `perform` must eventually resolve the completer it receives, either by
/// calling [`ActionCompleter::complete`] or by dropping it (which reports
/// [`ErrorCode::Error`]). Actions without a suspend capability inherit the
/// no-op `suspend`/`resume`.
pub trait Action: Send {
    /// Stable type label used in logs, events and metrics.
    fn type_name(&self) -> &'static str;

    /// Begin the action's work.
    fn perform(&mut self, completer: ActionCompleter);

    /// Request cancellation of in-flight work.
    ///
    /// The processor has already forgotten the action when this runs, so any
    /// completion reported afterwards is discarded.
    fn terminate(&mut self) {}

    /// Pause in-flight work at the next safe point.
    fn suspend(&mut self) {}

    /// Continue work paused by [`Action::suspend`].
    fn resume(&mut self) {}
}

pub(crate) struct Completion {
    pub(crate) id: ActionId,
    pub(crate) code: ErrorCode,
}

/// Single-use handle an action resolves to report its completion code.
///
/// Dropping the handle without calling [`complete`](Self::complete) or
/// [`abandon`](Self::abandon) reports [`ErrorCode::Error`].
#[must_use = "an action must resolve its completer"]
pub struct ActionCompleter {
    id: ActionId,
    sender: Option<UnboundedSender<Completion>>,
}

impl ActionCompleter {
    pub(crate) const fn new(id: ActionId, sender: UnboundedSender<Completion>) -> Self {
        Self {
            id,
            sender: Some(sender),
        }
    }

    /// Identifier of the action run this completer belongs to.
    #[must_use]
    pub const fn action_id(&self) -> ActionId {
        self.id
    }

    /// Report `code` to the owning processor.
    pub fn complete(mut self, code: ErrorCode) {
        self.send(code);
    }

    /// Consume the completer without reporting, after a cancelled run.
    pub fn abandon(mut self) {
        self.sender = None;
    }

    fn send(&mut self, code: ErrorCode) {
        if let Some(sender) = self.sender.take() {
            // The processor may already be gone; nothing is left to notify then.
            let _ = sender.send(Completion { id: self.id, code });
        }
    }
}

impl Drop for ActionCompleter {
    fn drop(&mut self) {
        self.send(ErrorCode::Error);
    }
}

impl std::fmt::Debug for ActionCompleter {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ActionCompleter")
            .field("id", &self.id)
            .field("resolved", &self.sender.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn complete_reports_code_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        ActionCompleter::new(7, tx).complete(ErrorCode::Success);

        let completion = rx.try_recv().ok();
        assert!(matches!(
            completion,
            Some(Completion {
                id: 7,
                code: ErrorCode::Success
            })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_completer_reports_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        drop(ActionCompleter::new(3, tx));
        assert!(matches!(
            rx.try_recv().ok(),
            Some(Completion {
                code: ErrorCode::Error,
                ..
            })
        ));
    }

    #[test]
    fn abandoned_completer_stays_silent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        ActionCompleter::new(1, tx).abandon();
        assert!(rx.try_recv().is_err());
    }
}
