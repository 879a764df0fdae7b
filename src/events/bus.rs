//! Event bus for broadcasting store events to views

use super::{EventEmitter, StoreEvent};
use tokio::sync::broadcast;
use tracing::debug;

/// Default broadcast channel capacity
const DEFAULT_CAPACITY: usize = 1024;

/// Event bus that distributes StoreEvents via `tokio::sync::broadcast`
///
/// Fire-and-forget: emitting never blocks, never panics.
/// If no subscribers are connected, events are silently dropped.
/// The top-level view owns the bus and hands clones to its children.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventEmitter for EventBus {
    fn emit(&self, event: StoreEvent) {
        let label = match &event {
            StoreEvent::Changed { kind, action, .. } => format!("{} {:?}", kind, action),
            StoreEvent::OpenNote { .. } => "open_note".to_string(),
        };
        if let Ok(n) = self.sender.send(event) {
            debug!(event = %label, subscribers = n, "StoreEvent emitted");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeAction;
    use crate::models::EntityKind;

    #[test]
    fn test_emit_without_subscriber_no_panic() {
        let bus = EventBus::default();
        bus.emit_changed(EntityKind::Notes, ChangeAction::Created, "n1");
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_multi_subscribers() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit_open_note("n1");

        assert_eq!(rx1.try_recv().unwrap(), StoreEvent::open_note("n1"));
        assert_eq!(rx2.try_recv().unwrap(), StoreEvent::open_note("n1"));
    }

    #[test]
    fn test_clone_shares_channel() {
        let bus = EventBus::default();
        let child = bus.clone();
        let mut rx = bus.subscribe();

        child.emit_changed(EntityKind::Categories, ChangeAction::Renamed, "c1");

        match rx.try_recv().unwrap() {
            StoreEvent::Changed {
                kind,
                action,
                entity_id,
            } => {
                assert_eq!(kind, EntityKind::Categories);
                assert_eq!(action, ChangeAction::Renamed);
                assert_eq!(entity_id.as_deref(), Some("c1"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_dropped_subscriber_doesnt_affect_others() {
        let bus = EventBus::default();
        let rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(StoreEvent::reloaded(EntityKind::Links));
        assert_eq!(rx2.try_recv().unwrap(), StoreEvent::reloaded(EntityKind::Links));
    }
}
