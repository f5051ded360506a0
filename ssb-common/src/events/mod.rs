//! Event types for the squad save bot event system
//!
//! Provides shared event definitions and the EventBus used by ssb-api
//! to push realtime updates to connected clients over SSE.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// squad save bot event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// All events use this central enum for type safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SsbEvent {
    /// Bill extraction started for the live session
    ///
    /// Triggers:
    /// - SSE: Show "reading your bill" progress state
    ExtractionStarted {
        /// Bill session UUID
        session_id: Uuid,
        /// Monotonic extraction request id (stale-response discard)
        request_id: u64,
        /// When extraction started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Bill extraction completed and items replaced the session contents
    ///
    /// Triggers:
    /// - SSE: Refresh the bill view; an item_count of 0 means
    ///   "found 0 items", not an error
    ExtractionCompleted {
        /// Bill session UUID
        session_id: Uuid,
        /// Request id this outcome belongs to
        request_id: u64,
        /// Number of normalized items seeded into the session
        item_count: usize,
        /// When extraction completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Bill extraction failed (gateway error, network fault, or timeout)
    ///
    /// Triggers:
    /// - SSE: Show the failure message and offer retry
    ExtractionFailed {
        /// Bill session UUID
        session_id: Uuid,
        /// Request id this outcome belongs to
        request_id: u64,
        /// Failure classification ("rate_limited", "quota_exceeded", "generic")
        kind: String,
        /// User-facing failure message
        message: String,
        /// When extraction failed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Bill session reset back to Idle
    BillSessionReset {
        /// UUID of the session that was discarded
        session_id: Uuid,
        /// When the reset happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Savings goal created
    GoalCreated {
        /// Goal UUID
        goal_id: Uuid,
        /// Goal title
        title: String,
        /// When the goal was created
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Savings goal fields edited or money added
    GoalUpdated {
        /// Goal UUID
        goal_id: Uuid,
        /// When the goal changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Savings goal deleted
    GoalDeleted {
        /// Goal UUID
        goal_id: Uuid,
        /// When the goal was deleted
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Savings goal crossed its target (fires only on the false→true edge)
    ///
    /// Triggers:
    /// - SSE: Celebration animation, exactly once per completion
    GoalCompleted {
        /// Goal UUID
        goal_id: Uuid,
        /// Goal title for the celebration message
        title: String,
        /// When the goal completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SsbEvent {
    /// Event type name for SSE event framing
    pub fn event_type(&self) -> &str {
        match self {
            SsbEvent::ExtractionStarted { .. } => "ExtractionStarted",
            SsbEvent::ExtractionCompleted { .. } => "ExtractionCompleted",
            SsbEvent::ExtractionFailed { .. } => "ExtractionFailed",
            SsbEvent::BillSessionReset { .. } => "BillSessionReset",
            SsbEvent::GoalCreated { .. } => "GoalCreated",
            SsbEvent::GoalUpdated { .. } => "GoalUpdated",
            SsbEvent::GoalDeleted { .. } => "GoalDeleted",
            SsbEvent::GoalCompleted { .. } => "GoalCompleted",
        }
    }
}

/// Broadcast bus for SsbEvent distribution
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SsbEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive all events emitted after
    /// subscription. Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SsbEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SsbEvent,
    ) -> Result<usize, broadcast::error::SendError<SsbEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Used for events where it is acceptable if no client is currently
    /// connected; the authoritative state lives in the session or database.
    pub fn emit_lossy(&self, event: SsbEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
