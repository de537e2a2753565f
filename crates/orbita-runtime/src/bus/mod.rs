//! In-process event bus: synchronous, ordered, per-consumer error
//! isolation. Adapted from `mofa_kernel::bus::AgentBus` — that bus is an
//! async `tokio::broadcast`-backed, multi-channel pub/sub fabric for
//! inter-agent traffic; Orbita's domain reactions (e.g. auto-scheduling
//! a freshly created task) need none of that; they need every
//! registered subscriber to see every event, in registration order,
//! within the same call that emitted it, with one subscriber's error
//! never blocking another's.

pub mod subscribers;

use orbita_kernel::domain::DomainEvent;
use parking_lot::RwLock;
use std::sync::Arc;

pub use subscribers::AutoScheduleSubscriber;

/// A reaction to a committed domain event. Implementations should be
/// idempotent: the same event may be redelivered (e.g. after an outbox
/// retry) and must not double-apply its effect.
pub trait EventSubscriber: Send + Sync {
    fn handle(&self, event: &DomainEvent);
}

/// Registered subscribers are copied into a fresh `Vec` on every
/// registration so that dispatch never holds the registration lock —
/// dispatch only takes a read lock to clone the current `Arc`.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// Dispatches `event` to every subscriber in registration order. A
    /// subscriber that panics is caught and logged so it cannot take
    /// down the others; a subscriber that wants to reject a malformed
    /// event should return normally after logging, not panic, but this
    /// is the last line of defense either way.
    pub fn publish(&self, event: &DomainEvent) {
        let subscribers = self.subscribers.read().clone();
        for subscriber in subscribers {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                subscriber.handle(event);
            }));
            if result.is_err() {
                tracing::error!(
                    routing_key = %event.header().routing_key,
                    "event subscriber panicked"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbita_kernel::domain::events::EventHeader;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingSubscriber(Arc<AtomicUsize>);
    impl EventSubscriber for CountingSubscriber {
        fn handle(&self, _event: &DomainEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanickingSubscriber;
    impl EventSubscriber for PanickingSubscriber {
        fn handle(&self, _event: &DomainEvent) {
            panic!("boom");
        }
    }

    fn sample_event() -> DomainEvent {
        DomainEvent::TaskCreated {
            header: EventHeader {
                aggregate_id: Uuid::new_v4(),
                aggregate_type: "Task".to_string(),
                occurred_at: chrono::Utc::now(),
                routing_key: "task.created".to_string(),
            },
            owner_id: Uuid::new_v4(),
            title: "write report".into(),
        }
    }

    #[test]
    fn dispatches_to_every_subscriber() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(Arc::new(CountingSubscriber(count.clone())));
        bus.subscribe(Arc::new(CountingSubscriber(count.clone())));
        bus.publish(&sample_event());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn one_subscriber_panicking_does_not_block_another() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(Arc::new(PanickingSubscriber));
        bus.subscribe(Arc::new(CountingSubscriber(count.clone())));
        bus.publish(&sample_event());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
