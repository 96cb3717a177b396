//! Event bus routing.
//!
//! # Design
//! - Publishing never blocks and never fails; with no subscribers the event is
//!   only retained in the replay ring.
//! - When the broadcast channel overflows the oldest events are dropped for
//!   lagging subscribers, which then continue from the newest retained event.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast::{self, Receiver, Sender, error::RecvError};

use crate::payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    state: Arc<Mutex<BusState>>,
    replay_capacity: usize,
}

struct BusState {
    next_id: EventId,
    replay: VecDeque<EventEnvelope>,
}

impl EventBus {
    /// Construct a bus with a custom replay capacity.
    ///
    /// A capacity of zero is bumped to one; `tokio::broadcast` rejects empty channels.
    #[must_use]
    pub fn with_capacity(replay_capacity: usize) -> Self {
        let replay_capacity = replay_capacity.max(1);
        let (sender, _) = broadcast::channel(replay_capacity);
        Self {
            sender,
            state: Arc::new(Mutex::new(BusState {
                next_id: 1,
                replay: VecDeque::with_capacity(replay_capacity),
            })),
            replay_capacity,
        }
    }

    /// Construct a bus with the default replay capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish an event to all subscribers and return its assigned id.
    pub fn publish(&self, event: Event) -> EventId {
        let envelope = {
            let mut state = self.lock_state();
            let id = state.next_id;
            state.next_id = state.next_id.saturating_add(1);
            let envelope = EventEnvelope {
                id,
                timestamp: Utc::now(),
                event,
            };
            if state.replay.len() == self.replay_capacity {
                let _ = state.replay.pop_front();
            }
            state.replay.push_back(envelope.clone());
            envelope
        };
        let id = envelope.id;
        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to the bus, replaying buffered events newer than `since_id` first.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let state = self.lock_state();
        let backlog = since_id.map_or_else(VecDeque::new, |since| {
            state
                .replay
                .iter()
                .filter(|envelope| envelope.id > since)
                .cloned()
                .collect()
        });
        let last_replayed = backlog.back().map(|envelope: &EventEnvelope| envelope.id);
        let receiver = self.sender.subscribe();
        drop(state);
        EventStream {
            backlog,
            receiver,
            last_replayed,
        }
    }

    /// Last event id retained in the replay buffer.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.lock_state().replay.back().map(|envelope| envelope.id)
    }

    /// Collect retained events emitted after the specified id.
    #[must_use]
    pub fn backlog_since(&self, id: EventId) -> Vec<EventEnvelope> {
        self.lock_state()
            .replay
            .iter()
            .filter(|envelope| envelope.id > id)
            .cloned()
            .collect()
    }

    fn lock_state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriber handle yielding replayed events first, then live ones.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
    last_replayed: Option<EventId>,
}

impl EventStream {
    /// Receive the next event, or `None` once every bus handle is gone.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(envelope) = self.backlog.pop_front() {
            return Some(envelope);
        }

        loop {
            match self.receiver.recv().await {
                Ok(envelope) => {
                    if self.last_replayed.is_some_and(|last| envelope.id <= last) {
                        continue;
                    }
                    return Some(envelope);
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Receive an event that is already available without waiting.
    pub fn try_next(&mut self) -> Option<EventEnvelope> {
        if let Some(envelope) = self.backlog.pop_front() {
            return Some(envelope);
        }

        loop {
            match self.receiver.try_recv() {
                Ok(envelope) => {
                    if self.last_replayed.is_some_and(|last| envelope.id <= last) {
                        continue;
                    }
                    return Some(envelope);
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}
