//! Event payload types emitted while verifying an update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to each published event.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 256;

/// Typed events surfaced by the action pipeline and its stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The processor handed control to an action.
    ActionStarted {
        /// Type name of the action.
        action: String,
    },
    /// An action reported its completion code.
    ActionCompleted {
        /// Type name of the action.
        action: String,
        /// Label of the completion code.
        code: String,
    },
    /// The processor drained its queue, or aborted it after a failure.
    ProcessingDone {
        /// Label of the final completion code.
        code: String,
    },
    /// Processing was stopped before the queue drained.
    ProcessingStopped,
    /// Processing was suspended.
    ProcessingSuspended,
    /// Processing resumed after a suspension.
    ProcessingResumed,
    /// A partition finished hashing during filesystem verification.
    PartitionHashed {
        /// Partition name from the install plan.
        partition: String,
        /// Which image was hashed (`target` or `source`).
        step: String,
        /// Whether the digest matched the expected value.
        matched: bool,
    },
    /// Payload metadata passed signature validation.
    MetadataVerified {
        /// Major payload version read from the header.
        major_version: u64,
        /// Header plus manifest length in bytes.
        metadata_size: u64,
    },
}

impl Event {
    /// Machine-friendly discriminator for subscribers and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ActionStarted { .. } => "action_started",
            Self::ActionCompleted { .. } => "action_completed",
            Self::ProcessingDone { .. } => "processing_done",
            Self::ProcessingStopped => "processing_stopped",
            Self::ProcessingSuspended => "processing_suspended",
            Self::ProcessingResumed => "processing_resumed",
            Self::PartitionHashed { .. } => "partition_hashed",
            Self::MetadataVerified { .. } => "metadata_verified",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier assigned at publish time.
    pub id: EventId,
    /// Time the event was published.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_maps_pipeline_variants() {
        assert_eq!(
            Event::ActionStarted {
                action: "FilesystemVerifierAction".into()
            }
            .kind(),
            "action_started"
        );
        assert_eq!(
            Event::ProcessingDone {
                code: "success".into()
            }
            .kind(),
            "processing_done"
        );
        assert_eq!(Event::ProcessingStopped.kind(), "processing_stopped");
        assert_eq!(Event::ProcessingSuspended.kind(), "processing_suspended");
        assert_eq!(Event::ProcessingResumed.kind(), "processing_resumed");
    }

    #[test]
    fn event_kind_maps_stage_variants() {
        assert_eq!(
            Event::PartitionHashed {
                partition: "system".into(),
                step: "target".into(),
                matched: true,
            }
            .kind(),
            "partition_hashed"
        );
        assert_eq!(
            Event::MetadataVerified {
                major_version: 2,
                metadata_size: 128,
            }
            .kind(),
            "metadata_verified"
        );
    }

    #[test]
    fn events_serialize_with_type_tag() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(Event::ActionCompleted {
            action: "FeederAction".into(),
            code: "success".into(),
        })?;
        assert_eq!(value["type"], "action_completed");
        assert_eq!(value["code"], "success");

        let decoded: Event = serde_json::from_value(value)?;
        assert_eq!(decoded.kind(), "action_completed");
        Ok(())
    }
}
