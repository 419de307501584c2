//! Pub/Sub event bus for player notifications.
//!
//! - `subscribe()` registers a callback for one event type and returns a
//!   [`SubscriptionId`] that can cancel it later
//! - `emit()` invokes matching callbacks immediately AND queues the event
//! - `poll()` drains the queue for batch processing in the host's loop
//!
//! Callback order: FIFO (first-subscribed, first-called) within one event type.

use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use log::warn;

/// Maximum queued events before the oldest are dropped
const MAX_QUEUE_SIZE: usize = 512;

/// Marker trait for events. Events must be Send + Sync + 'static.
pub trait Event: Any + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Boxed event for queue storage
pub type BoxedEvent = Box<dyn Event>;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Shared {
    subscribers: RwLock<HashMap<TypeId, Vec<(SubscriptionId, Callback)>>>,
    queue: Mutex<VecDeque<BoxedEvent>>,
    next_id: AtomicU64,
}

impl Shared {
    fn dispatch(&self, type_id: TypeId, event: &dyn Any) {
        // Clone callbacks out so a callback may subscribe/unsubscribe
        let callbacks: Vec<Callback> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&type_id)
            .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();
        for cb in callbacks {
            cb(event);
        }
    }

    fn enqueue(&self, event: BoxedEvent) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= MAX_QUEUE_SIZE {
            warn!("EventBus queue full ({} events), dropping oldest", queue.len());
            queue.pop_front();
        }
        queue.push_back(event);
    }
}

/// Pub/Sub event bus with deferred processing support.
#[derive(Clone, Default)]
pub struct EventBus {
    shared: Arc<Shared>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events of type E.
    ///
    /// # Example
    /// ```ignore
    /// bus.subscribe::<StateChangedEvent, _>(|e| println!("{:?}", e.state));
    /// ```
    pub fn subscribe<E, F>(&self, callback: F) -> SubscriptionId
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let wrapped: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.shared
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(TypeId::of::<E>())
            .or_default()
            .push((id, wrapped));
        id
    }

    /// Cancel one subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.shared.subscribers.write().unwrap_or_else(|e| e.into_inner());
        for list in subs.values_mut() {
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Clear subscribers for type E
    pub fn unsubscribe_all<E: Event>(&self) {
        self.shared
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&TypeId::of::<E>());
    }

    /// Invoke callbacks immediately, then queue for `poll()`.
    pub fn emit<E: Event + Clone>(&self, event: E) {
        self.shared.dispatch(TypeId::of::<E>(), &event);
        self.shared.enqueue(Box::new(event));
    }

    /// Drain all queued events, oldest first.
    pub fn poll(&self) -> Vec<BoxedEvent> {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect()
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Emit-only handle for widgets.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Lightweight emit-only handle. Can be cloned and passed to widgets.
#[derive(Clone)]
pub struct EventEmitter {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("queue_len", &self.shared.queue.lock().map(|q| q.len()).unwrap_or(0))
            .finish()
    }
}

impl EventEmitter {
    pub fn emit<E: Event + Clone>(&self, event: E) {
        self.shared.dispatch(TypeId::of::<E>(), &event);
        self.shared.enqueue(Box::new(event));
    }
}

/// Helper: downcast BoxedEvent to concrete type
///
/// Must deref to `dyn Event` before `as_any()`: the blanket impl would
/// otherwise match `Box<dyn Event>` itself and the downcast always fails.
#[inline]
pub fn downcast_event<E: Event>(event: &BoxedEvent) -> Option<&E> {
    (**event).as_any().downcast_ref::<E>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[derive(Clone, Debug)]
    struct TestEvent {
        value: i32,
    }

    #[derive(Clone, Debug)]
    struct OtherEvent;

    #[test]
    fn test_subscribe_emit_immediate() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicI32::new(0));
        let c = Arc::clone(&counter);

        bus.subscribe::<TestEvent, _>(move |e| {
            c.fetch_add(e.value, Ordering::SeqCst);
        });

        bus.emit(TestEvent { value: 10 });
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        bus.emit(OtherEvent);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_emit_queues_for_poll() {
        let bus = EventBus::new();
        bus.emit(TestEvent { value: 1 });
        bus.emit(OtherEvent);

        let events = bus.poll();
        assert_eq!(events.len(), 2);
        assert_eq!(downcast_event::<TestEvent>(&events[0]).map(|e| e.value), Some(1));
        assert!(downcast_event::<OtherEvent>(&events[1]).is_some());
        assert_eq!(bus.queue_len(), 0);
    }

    #[test]
    fn test_unsubscribe_single() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicI32::new(0));
        let c1 = Arc::clone(&counter);
        let c2 = Arc::clone(&counter);

        let first = bus.subscribe::<TestEvent, _>(move |e| {
            c1.fetch_add(e.value, Ordering::SeqCst);
        });
        bus.subscribe::<TestEvent, _>(move |e| {
            c2.fetch_add(e.value * 100, Ordering::SeqCst);
        });

        assert!(bus.unsubscribe(first));
        assert!(!bus.unsubscribe(first));

        bus.emit(TestEvent { value: 1 });
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_emitter_handle() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicI32::new(0));
        let c = Arc::clone(&counter);
        bus.subscribe::<TestEvent, _>(move |e| {
            c.fetch_add(e.value, Ordering::SeqCst);
        });

        bus.emitter().emit(TestEvent { value: 42 });
        assert_eq!(counter.load(Ordering::SeqCst), 42);
        assert_eq!(bus.poll().len(), 1);
    }

    #[test]
    fn test_queue_bounded() {
        let bus = EventBus::new();
        for i in 0..(MAX_QUEUE_SIZE as i32 + 5) {
            bus.emit(TestEvent { value: i });
        }
        let events = bus.poll();
        assert_eq!(events.len(), MAX_QUEUE_SIZE);
        assert_eq!(downcast_event::<TestEvent>(&events[0]).map(|e| e.value), Some(5));
    }

    #[test]
    fn test_unsubscribe_all() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicI32::new(0));
        let c = Arc::clone(&counter);
        bus.subscribe::<TestEvent, _>(move |e| {
            c.fetch_add(e.value, Ordering::SeqCst);
        });

        bus.unsubscribe_all::<TestEvent>();
        bus.emit(TestEvent { value: 10 });
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(bus.poll().len(), 1);
    }
}
