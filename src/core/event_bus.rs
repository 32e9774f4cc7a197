use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::review::ReviewEvent;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("event sink unavailable: {0}")]
    Unavailable(String),
    #[error("event {event_type} rejected: {reason}")]
    Rejected {
        event_type: &'static str,
        reason: String,
    },
}

/// Destination for events drained from an aggregate after it was saved.
pub trait EventSink: Send + Sync {
    fn publish(&self, events: Vec<ReviewEvent>) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub id: Uuid,
    pub event: ReviewEvent,
    pub published_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: ReviewEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            event,
            published_at: Utc::now(),
        }
    }
}

pub type SubscriberId = Uuid;

struct Subscriber {
    student_id: Option<String>,
    event_types: Option<Vec<&'static str>>,
    sender: broadcast::Sender<EventEnvelope>,
}

impl Subscriber {
    fn matches(&self, envelope: &EventEnvelope) -> bool {
        if let Some(ref student_id) = self.student_id {
            if envelope.event.student_id() != student_id {
                return false;
            }
        }

        if let Some(ref event_types) = self.event_types {
            if !event_types.contains(&envelope.event.event_type()) {
                return false;
            }
        }

        true
    }
}

/// In-process fan-out of review events over broadcast channels.
///
/// Slow receivers lag and lose the oldest envelopes; publishing never blocks.
pub struct EventBus {
    global_sender: broadcast::Sender<EventEnvelope>,
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    event_count: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        let (global_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            global_sender,
            subscribers: RwLock::new(HashMap::new()),
            event_count: AtomicU64::new(0),
        }
    }

    pub fn publish_one(&self, event: ReviewEvent) {
        let envelope = EventEnvelope::new(event);
        self.event_count.fetch_add(1, Ordering::Relaxed);

        let mut sent_count = 0usize;
        for subscriber in self.subscribers.read().values() {
            if subscriber.matches(&envelope) && subscriber.sender.send(envelope.clone()).is_ok() {
                sent_count += 1;
            }
        }

        if self.global_sender.send(envelope.clone()).is_err() {
            debug!("No global subscribers for event");
        }

        debug!(
            event_type = envelope.event.event_type(),
            schedule_id = %envelope.event.schedule_id(),
            student_id = envelope.event.student_id(),
            sent_to = sent_count,
            "Event published"
        );
    }

    pub fn subscribe_global(&self) -> broadcast::Receiver<EventEnvelope> {
        self.global_sender.subscribe()
    }

    pub fn subscribe_filtered(
        &self,
        student_id: Option<String>,
        event_types: Option<Vec<&'static str>>,
    ) -> (SubscriberId, broadcast::Receiver<EventEnvelope>) {
        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        let subscriber_id = Uuid::new_v4();

        self.subscribers.write().insert(
            subscriber_id,
            Subscriber {
                student_id,
                event_types,
                sender,
            },
        );

        debug!(subscriber_id = %subscriber_id, "New filtered subscription created");

        (subscriber_id, receiver)
    }

    /// Everything published about one student.
    pub fn subscribe_student(
        &self,
        student_id: impl Into<String>,
    ) -> (SubscriberId, broadcast::Receiver<EventEnvelope>) {
        self.subscribe_filtered(Some(student_id.into()), None)
    }

    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        if self.subscribers.write().remove(&subscriber_id).is_some() {
            debug!(subscriber_id = %subscriber_id, "Subscription removed");
        }
    }

    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> EventBusStats {
        let filtered_subscribers = self.subscribers.read().len();
        let global_subscribers = self.global_sender.receiver_count();
        EventBusStats {
            total_events: self.event_count(),
            subscriber_count: filtered_subscribers + global_subscribers,
            global_subscribers,
            filtered_subscribers,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBus {
    fn publish(&self, events: Vec<ReviewEvent>) -> Result<(), SinkError> {
        for event in events {
            self.publish_one(event);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBusStats {
    pub total_events: u64,
    pub subscriber_count: usize,
    pub global_subscribers: usize,
    pub filtered_subscribers: usize,
}
