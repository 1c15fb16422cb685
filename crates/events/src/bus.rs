//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the pipeline and any
//! number of observers (progress bars, loggers, UIs).

use chrono::{DateTime, Utc};
use imagegen_core::{Archetype, ErrorKind};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// GenerationEvent
// ---------------------------------------------------------------------------

/// Something observable that happened during generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// A batch was accepted and is about to process `total` items.
    BatchStarted { batch_id: Uuid, total: usize },

    /// One batch item reached a terminal outcome.
    ///
    /// `completed` counts attempted items; it is never decremented and
    /// reaches `total` unless the run is cancelled.
    ItemCompleted {
        batch_id: Uuid,
        index: usize,
        completed: usize,
        total: usize,
        succeeded: usize,
        failed: usize,
        /// `None` when the item succeeded.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure: Option<ErrorKind>,
    },

    /// The batch ended, normally or by cancellation.
    BatchFinished {
        batch_id: Uuid,
        succeeded: usize,
        failed: usize,
        cancelled: bool,
    },

    /// An image was produced and added to history.
    ImageGenerated {
        history_id: String,
        archetype: Archetype,
    },
}

impl GenerationEvent {
    /// Dot-separated event name, e.g. `"batch.item_completed"`.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::BatchStarted { .. } => "batch.started",
            Self::ItemCompleted { .. } => "batch.item_completed",
            Self::BatchFinished { .. } => "batch.finished",
            Self::ImageGenerated { .. } => "image.generated",
        }
    }

    /// The batch this event belongs to, if any.
    pub fn batch_id(&self) -> Option<Uuid> {
        match self {
            Self::BatchStarted { batch_id, .. }
            | Self::ItemCompleted { batch_id, .. }
            | Self::BatchFinished { batch_id, .. } => Some(*batch_id),
            Self::ImageGenerated { .. } => None,
        }
    }
}

/// A [`GenerationEvent`] stamped with the time it was published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(flatten)]
    pub event: GenerationEvent,
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: GenerationEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published event.
///
/// ```rust
/// use imagegen_events::{EventBus, GenerationEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(GenerationEvent::BatchStarted {
///     batch_id: uuid::Uuid::nil(),
///     total: 3,
/// });
/// ```
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped.
    pub fn publish(&self, event: GenerationEvent) {
        tracing::trace!(event_type = event.event_type(), "Publishing event");
        // SendError only means there are zero receivers.
        let _ = self.sender.send(EventEnvelope::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
