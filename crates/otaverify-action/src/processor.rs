//! Sequential action scheduler.
//!
//! # Design
//! - Exactly one action is current at a time; the queue drains FIFO.
//! - Actions report through an [`ActionCompleter`] that posts onto an internal
//!   channel, so completion is never re-entrant with `perform`.
//! - Completions tagged with a stale action id (a stopped or replaced action)
//!   are discarded.
//! - While suspended, a completion is latched in full and replayed to the
//!   delegate on resume.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::action::{Action, ActionCompleter, ActionId, Completion};
use crate::code::ErrorCode;
use crate::delegate::ActionProcessorDelegate;

/// Runs a queue of actions one at a time.
pub struct ActionProcessor {
    queue: VecDeque<Box<dyn Action>>,
    current: Option<(ActionId, Box<dyn Action>)>,
    suspended: bool,
    latched: Option<Completion>,
    next_id: ActionId,
    delegate: Option<Arc<dyn ActionProcessorDelegate>>,
    completion_tx: UnboundedSender<Completion>,
    completion_rx: UnboundedReceiver<Completion>,
}

impl ActionProcessor {
    /// Create an idle processor with an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            queue: VecDeque::new(),
            current: None,
            suspended: false,
            latched: None,
            next_id: 1,
            delegate: None,
            completion_tx,
            completion_rx,
        }
    }

    /// Install the observer notified of lifecycle changes.
    pub fn set_delegate(&mut self, delegate: Arc<dyn ActionProcessorDelegate>) {
        self.delegate = Some(delegate);
    }

    /// Append `action` to the queue without starting it.
    pub fn enqueue_action(&mut self, action: Box<dyn Action>) {
        debug!(action = action.type_name(), "action enqueued");
        self.queue.push_back(action);
    }

    /// Start the first queued action. Does nothing if already processing.
    pub fn start_processing(&mut self) {
        if self.current.is_some() {
            warn!("start requested while already processing");
            return;
        }
        if self.queue.is_empty() {
            debug!("start requested with an empty queue");
            return;
        }
        info!(queued = self.queue.len(), "action processing started");
        self.start_next_action();
    }

    /// Terminate the current action, drop the queue and notify `processing_stopped`.
    pub fn stop_processing(&mut self) {
        let dropped = self.queue.len();
        self.queue.clear();
        self.suspended = false;
        self.latched = None;
        let Some((id, mut action)) = self.current.take() else {
            debug!(dropped, "stop requested while idle");
            return;
        };
        info!(action = action.type_name(), id, dropped, "action processing stopped");
        action.terminate();
        if let Some(delegate) = &self.delegate {
            delegate.processing_stopped();
        }
    }

    /// Pause the current action. Idempotent.
    pub fn suspend_processing(&mut self) {
        let Some((_, action)) = self.current.as_mut() else {
            warn!("suspend requested while idle");
            return;
        };
        if self.suspended {
            debug!("processing already suspended");
            return;
        }
        self.suspended = true;
        info!(action = action.type_name(), "action processing suspended");
        action.suspend();
        if let Some(delegate) = &self.delegate {
            delegate.processing_suspended();
        }
    }

    /// Resume a suspended action and surface any latched completion. Idempotent.
    pub fn resume_processing(&mut self) {
        if !self.suspended {
            warn!("resume requested while not suspended");
            return;
        }
        self.suspended = false;
        if let Some((_, action)) = self.current.as_mut() {
            info!(action = action.type_name(), "action processing resumed");
            action.resume();
        }
        if let Some(delegate) = &self.delegate {
            delegate.processing_resumed();
        }
        if let Some(completion) = self.latched.take() {
            self.finish_current(completion.code);
        }
    }

    /// Whether an action is current, including while suspended.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.current.is_some()
    }

    /// Whether processing is suspended.
    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Type name of the current action.
    #[must_use]
    pub fn current_action_type(&self) -> Option<&'static str> {
        self.current.as_ref().map(|(_, action)| action.type_name())
    }

    /// Number of actions waiting behind the current one.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Wait for the next completion report and apply it.
    pub async fn next_completion(&mut self) {
        if let Some(completion) = self.completion_rx.recv().await {
            self.handle_completion(completion);
        }
    }

    /// Drive completions until the queue finishes, stops or is suspended.
    pub async fn run_to_completion(&mut self) {
        while self.is_running() && !self.suspended {
            self.next_completion().await;
        }
    }

    /// Apply every completion already reported, without waiting.
    pub fn drain_ready(&mut self) {
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.handle_completion(completion);
        }
    }

    fn start_next_action(&mut self) {
        let Some(mut action) = self.queue.pop_front() else {
            return;
        };
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        debug!(action = action.type_name(), id, "action started");
        if let Some(delegate) = &self.delegate {
            delegate.action_started(action.as_ref());
        }
        action.perform(ActionCompleter::new(id, self.completion_tx.clone()));
        self.current = Some((id, action));
    }

    fn handle_completion(&mut self, completion: Completion) {
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|(id, _)| *id == completion.id);
        if !is_current {
            debug!(id = completion.id, code = completion.code.as_str(), "stale completion ignored");
            return;
        }
        if self.suspended {
            debug!(
                id = completion.id,
                code = completion.code.as_str(),
                "completion latched while suspended"
            );
            self.latched = Some(completion);
            return;
        }
        self.finish_current(completion.code);
    }

    fn finish_current(&mut self, code: ErrorCode) {
        let Some((id, action)) = self.current.take() else {
            return;
        };
        info!(action = action.type_name(), id, code = code.as_str(), "action completed");
        if let Some(delegate) = &self.delegate {
            delegate.action_completed(action.as_ref(), code);
        }
        drop(action);

        if !code.is_success() {
            let aborted = self.queue.len();
            self.queue.clear();
            warn!(code = code.as_str(), aborted, "action failed; remaining queue aborted");
            self.notify_done(code);
            return;
        }
        if self.queue.is_empty() {
            info!("action processing done");
            self.notify_done(ErrorCode::Success);
        } else {
            self.start_next_action();
        }
    }

    fn notify_done(&self, code: ErrorCode) {
        if let Some(delegate) = &self.delegate {
            delegate.processing_done(code);
        }
    }
}

impl Default for ActionProcessor {
    fn default() -> Self {
        Self::new()
    }
}
