//! One-to-many fan-out of broadcast events.
//!
//! Each listener owns the receiving half of an unbounded channel. Events are
//! delivered in subscription order; a listener whose receiver has been dropped
//! is pruned on the next broadcast without affecting the others.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

/// Handle returned by [`Subscriptions::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

struct Listener<E> {
    id: ListenerId,
    sender: mpsc::UnboundedSender<E>,
}

struct Registry<E> {
    next_id: u64,
    listeners: Vec<Listener<E>>,
}

/// Ordered listener registry. Cloning shares the registry.
pub struct Subscriptions<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E> Clone for Subscriptions<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E> Default for Subscriptions<E> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 1,
                listeners: Vec::new(),
            })),
        }
    }
}

impl<E: Clone> Subscriptions<E> {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry<E>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a listener at the end of the delivery order.
    pub fn subscribe(&self) -> (ListenerId, mpsc::UnboundedReceiver<E>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.registry();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push(Listener { id, sender: tx });
        (id, rx)
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut registry = self.registry();
        let before = registry.listeners.len();
        registry.listeners.retain(|l| l.id != id);
        registry.listeners.len() != before
    }

    /// Deliver `event` to every live listener; returns how many received it.
    pub fn broadcast(&self, event: E) -> usize {
        let mut registry = self.registry();
        let mut delivered = 0;
        registry.listeners.retain(|listener| {
            if listener.sender.send(event.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                tracing::debug!(listener = %listener.id, "dropping closed listener");
                false
            }
        });
        delivered
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.registry().listeners.len()
    }

    /// Returns `true` if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
