//! Lifecycle of one verification pass.

use tokio::sync::watch;

/// Where a verification pass stands.
///
/// `Active`, `Suspended` and `CancelRequested` own an open stream; callers must
/// not free resources the pass reads until it reaches `Cleaned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationState {
    /// Not yet performed.
    Idle,
    /// Reading and hashing partitions.
    Active,
    /// Paused at a read boundary until resumed.
    Suspended,
    /// Cancellation requested; the next read boundary tears the pass down.
    CancelRequested,
    /// Stream and hasher released.
    Cleaned,
}

impl VerificationState {
    /// Whether the pass still holds its stream and hasher.
    #[must_use]
    pub const fn is_cleanup_pending(self) -> bool {
        matches!(self, Self::Active | Self::Suspended | Self::CancelRequested)
    }

    /// Snake-case label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::CancelRequested => "cancel_requested",
            Self::Cleaned => "cleaned",
        }
    }
}

/// Observer of a pass's [`VerificationState`] that outlives the action itself.
#[derive(Debug, Clone)]
pub struct CleanupMonitor {
    receiver: watch::Receiver<VerificationState>,
}

impl CleanupMonitor {
    pub(crate) const fn new(receiver: watch::Receiver<VerificationState>) -> Self {
        Self { receiver }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> VerificationState {
        *self.receiver.borrow()
    }

    /// Whether the pass still holds its stream and hasher.
    #[must_use]
    pub fn is_cleanup_pending(&self) -> bool {
        self.state().is_cleanup_pending()
    }

    /// Wait until no cleanup is pending.
    pub async fn wait_cleaned(&mut self) {
        // An error means the pass and its action are both gone, so nothing is held.
        let _ = self
            .receiver
            .wait_for(|state| !state.is_cleanup_pending())
            .await;
    }
}
