//! Single-slot handoff between bonded actions.
//!
//! # Design
//! - A pipe holds at most one object; setting overwrites, taking consumes.
//! - Two stages never hold the object at the same time: the producer gives it
//!   up on `set_object`, the consumer owns it after `take_object`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::action::Action;

/// Typed single-slot pipe shared by exactly one producer and one consumer.
pub struct ActionPipe<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> ActionPipe<T> {
    /// Create an empty pipe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Store `value`, replacing any unread object.
    pub fn set_object(&self, value: T) {
        *self.lock() = Some(value);
    }

    /// Whether an unread object is waiting.
    #[must_use]
    pub fn has_object(&self) -> bool {
        self.lock().is_some()
    }

    /// Take the waiting object, leaving the pipe empty.
    #[must_use]
    pub fn take_object(&self) -> Option<T> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for ActionPipe<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for ActionPipe<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Input and output pipe ends owned by one action.
pub struct ActionPipes<I, O> {
    input: Option<ActionPipe<I>>,
    output: Option<ActionPipe<O>>,
}

impl<I, O> ActionPipes<I, O> {
    /// Pipe ends with nothing bonded yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            input: None,
            output: None,
        }
    }

    /// Attach the upstream pipe.
    pub fn set_input_pipe(&mut self, pipe: ActionPipe<I>) {
        self.input = Some(pipe);
    }

    /// Attach the downstream pipe.
    pub fn set_output_pipe(&mut self, pipe: ActionPipe<O>) {
        self.output = Some(pipe);
    }

    /// Whether the upstream pipe holds an object.
    #[must_use]
    pub fn has_input_object(&self) -> bool {
        self.input.as_ref().is_some_and(ActionPipe::has_object)
    }

    /// Take the upstream object, if any.
    #[must_use]
    pub fn take_input_object(&self) -> Option<I> {
        self.input.as_ref().and_then(ActionPipe::take_object)
    }

    /// Whether a downstream pipe is attached.
    #[must_use]
    pub const fn has_output_pipe(&self) -> bool {
        self.output.is_some()
    }

    /// Hand `value` downstream. Returns `false` when no pipe is attached.
    pub fn set_output_object(&self, value: O) -> bool {
        self.output.as_ref().is_some_and(|pipe| {
            pipe.set_object(value);
            true
        })
    }

    /// Clone of the downstream pipe end, for work that outlives `perform`.
    #[must_use]
    pub fn output_pipe(&self) -> Option<ActionPipe<O>> {
        self.output.clone()
    }
}

impl<I, O> Default for ActionPipes<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

/// An action with declared input and output object types.
pub trait TypedAction: Action {
    /// Object consumed from the upstream pipe.
    type Input: Send + 'static;
    /// Object produced into the downstream pipe.
    type Output: Send + 'static;

    /// Mutable access to the action's pipe ends.
    fn pipes_mut(&mut self) -> &mut ActionPipes<Self::Input, Self::Output>;
}

/// Wire `first`'s output to `second`'s input through a fresh pipe.
pub fn bond_actions<A, B>(first: &mut A, second: &mut B)
where
    A: TypedAction,
    B: TypedAction<Input = A::Output>,
{
    let pipe = ActionPipe::new();
    first.pipes_mut().set_output_pipe(pipe.clone());
    second.pipes_mut().set_input_pipe(pipe);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_and_take_consumes() {
        let pipe = ActionPipe::new();
        pipe.set_object(1_u32);
        pipe.set_object(2_u32);
        assert!(pipe.has_object());
        assert_eq!(pipe.take_object(), Some(2));
        assert!(!pipe.has_object());
        assert_eq!(pipe.take_object(), None);
    }

    #[test]
    fn pipes_without_ends_are_inert() {
        let pipes: ActionPipes<u8, u8> = ActionPipes::new();
        assert!(!pipes.has_input_object());
        assert!(pipes.take_input_object().is_none());
        assert!(!pipes.has_output_pipe());
        assert!(!pipes.set_output_object(5));
    }

    #[test]
    fn bonded_ends_share_one_slot() {
        let pipe = ActionPipe::new();
        let mut upstream: ActionPipes<(), String> = ActionPipes::new();
        let mut downstream: ActionPipes<String, ()> = ActionPipes::new();
        upstream.set_output_pipe(pipe.clone());
        downstream.set_input_pipe(pipe);

        assert!(upstream.set_output_object("plan".to_string()));
        assert!(downstream.has_input_object());
        assert_eq!(downstream.take_input_object().as_deref(), Some("plan"));
        assert!(!downstream.has_input_object());
    }
}
