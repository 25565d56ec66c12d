/// Event emitter for monitoring and host integrations
use crate::messenger_types::MessagingEvent;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

const DEFAULT_CAPACITY: usize = 256;

/// Outbound port for domain events; called after a mutation has committed
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &MessagingEvent);
}

/// Logs every event and fans it out to broadcast subscribers
pub struct EventEmitter {
    tx: broadcast::Sender<MessagingEvent>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Slow subscribers lag and lose the oldest events; publishing never blocks
    pub fn subscribe(&self) -> broadcast::Receiver<MessagingEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventEmitter {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl EventSink for EventEmitter {
    fn publish(&self, event: &MessagingEvent) {
        info!(event = event.name(), "{:?}", event);
        // Err only means nobody is listening
        if self.tx.send(event.clone()).is_err() {
            debug!("No subscribers for {}", event.name());
        }
    }
}

/// Keeps every published event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MessagingEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MessagingEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Drain everything recorded so far
    pub fn take(&self) -> Vec<MessagingEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: &MessagingEvent) {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).push(event.clone());
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: &MessagingEvent) {}
}
