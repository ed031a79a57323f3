//! Per-client event channel.
//!
//! Each client owns one [`EventBus`]; nothing is process-global, so two clients never see each
//! other's events. Listeners run synchronously inside `emit`, on the task that produced the
//! event, and must not block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::ClientEvent;

/// Receives client events.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &ClientEvent);
}

impl<F> EventListener for F
where
    F: Fn(&ClientEvent) + Send + Sync,
{
    fn on_event(&self, event: &ClientEvent) {
        self(event)
    }
}

type Listeners = Vec<(u64, Arc<dyn EventListener>)>;

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    listeners: Mutex<Listeners>,
}

impl BusInner {
    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Cloneable handle to a client's event channel.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("listeners", &self.listener_count()).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` until the returned [`Subscription`] is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<L>(&self, listener: L) -> Subscription
    where
        L: EventListener + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners().push((id, Arc::new(listener)));
        Subscription { bus: Arc::downgrade(&self.inner), id }
    }

    /// Deliver `event` to every current listener.
    pub fn emit(&self, event: ClientEvent) {
        // Snapshot so listeners may subscribe or unsubscribe from inside a callback.
        let listeners: Vec<_> =
            self.inner.listeners().iter().map(|(_, listener)| listener.clone()).collect();
        for listener in listeners {
            listener.on_event(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }
}

/// Keeps a listener registered; unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.listeners().retain(|(id, _)| *id != self.id);
        }
    }
}
