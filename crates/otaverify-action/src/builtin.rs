//! Feeder and collector actions used at the ends of a bonded chain.

use tracing::debug;

use crate::action::{Action, ActionCompleter};
use crate::code::ErrorCode;
use crate::pipe::{ActionPipe, ActionPipes, TypedAction};

/// Emits a preset object into its output pipe and succeeds.
pub struct FeederAction<T> {
    object: T,
    pipes: ActionPipes<(), T>,
}

impl<T> FeederAction<T> {
    /// Feed `object` to the next action.
    #[must_use]
    pub const fn new(object: T) -> Self {
        Self {
            object,
            pipes: ActionPipes::new(),
        }
    }
}

impl<T: Clone + Send + 'static> Action for FeederAction<T> {
    fn type_name(&self) -> &'static str {
        "FeederAction"
    }

    fn perform(&mut self, completer: ActionCompleter) {
        if !self.pipes.set_output_object(self.object.clone()) {
            debug!("feeder has no output pipe");
        }
        completer.complete(ErrorCode::Success);
    }
}

impl<T: Clone + Send + 'static> TypedAction for FeederAction<T> {
    type Input = ();
    type Output = T;

    fn pipes_mut(&mut self) -> &mut ActionPipes<(), T> {
        &mut self.pipes
    }
}

/// Shared handle to the object captured by a [`CollectorAction`].
pub struct CollectedObject<T> {
    slot: ActionPipe<T>,
}

impl<T> CollectedObject<T> {
    /// Whether the collector captured an object.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.slot.has_object()
    }

    /// Take the captured object.
    #[must_use]
    pub fn take(&self) -> Option<T> {
        self.slot.take_object()
    }
}

impl<T> Clone for CollectedObject<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

/// Captures its input object and succeeds, even when nothing arrived.
pub struct CollectorAction<T> {
    collected: CollectedObject<T>,
    pipes: ActionPipes<T, ()>,
}

impl<T> CollectorAction<T> {
    /// Create a collector with an empty capture slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            collected: CollectedObject {
                slot: ActionPipe::new(),
            },
            pipes: ActionPipes::new(),
        }
    }

    /// Handle that observes the captured object after processing.
    #[must_use]
    pub fn collected(&self) -> CollectedObject<T> {
        self.collected.clone()
    }
}

impl<T> Default for CollectorAction<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Action for CollectorAction<T> {
    fn type_name(&self) -> &'static str {
        "CollectorAction"
    }

    fn perform(&mut self, completer: ActionCompleter) {
        match self.pipes.take_input_object() {
            Some(object) => self.collected.slot.set_object(object),
            None => debug!("collector received no input object"),
        }
        completer.complete(ErrorCode::Success);
    }
}

impl<T: Send + 'static> TypedAction for CollectorAction<T> {
    type Input = T;
    type Output = ();

    fn pipes_mut(&mut self) -> &mut ActionPipes<T, ()> {
        &mut self.pipes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActionProcessor;
    use crate::pipe::bond_actions;

    #[tokio::test]
    async fn feeder_hands_object_to_collector() {
        let mut feeder = FeederAction::new(vec![1_u8, 2, 3]);
        let mut collector = CollectorAction::new();
        bond_actions(&mut feeder, &mut collector);
        let collected = collector.collected();

        let mut processor = ActionProcessor::new();
        processor.enqueue_action(Box::new(feeder));
        processor.enqueue_action(Box::new(collector));
        processor.start_processing();
        processor.run_to_completion().await;

        assert!(collected.is_set());
        assert_eq!(collected.take(), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn unbonded_collector_still_succeeds() {
        let collector: CollectorAction<String> = CollectorAction::new();
        let collected = collector.collected();

        let mut processor = ActionProcessor::new();
        processor.enqueue_action(Box::new(collector));
        processor.start_processing();
        processor.run_to_completion().await;

        assert!(!processor.is_running());
        assert!(!collected.is_set());
    }
}
