//! Post-commit notifications for repository writes.
//!
//! Two delivery paths exist side by side:
//!
//! - **Listeners** registered with
//!   [`Repository::add_listener`](super::Repository::add_listener) run
//!   synchronously on the writing call, after the store confirmed the write.
//!   Each listener is isolated: an `Err` or a panic is logged and the next
//!   listener still runs. The write result is never affected.
//! - **Subscribers** from [`Repository::subscribe`](super::Repository::subscribe)
//!   receive events through a bounded `tokio::sync::broadcast` channel and
//!   consume them on their own task. Slow subscribers lag instead of
//!   blocking writers.
//!
//! Listeners have no execution timeout; long-running reactions belong on a
//! subscriber.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

/// Capacity of the broadcast channel behind [`EventHub::subscribe`].
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A committed write.
#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryEvent<T> {
    /// One entity inserted by `add`.
    EntityAdded(T),
    /// A whole batch inserted by `add_many`.
    EntitiesAdded(Vec<T>),
    /// The entity removed by `delete`.
    EntityDeleted(T),
}

/// Handle returned by listener registration, used to remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Arc<dyn Fn(&RepositoryEvent<T>) -> anyhow::Result<()> + Send + Sync>;

/// Fan-out point for one repository's events.
pub struct EventHub<T> {
    listeners: RwLock<Vec<(ListenerId, Listener<T>)>>,
    next_id: AtomicU64,
    sender: broadcast::Sender<RepositoryEvent<T>>,
}

impl<T: Clone + Send + 'static> EventHub<T> {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            sender,
        }
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&RepositoryEvent<T>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push((id, Arc::new(listener))),
            Err(poisoned) => poisoned.into_inner().push((id, Arc::new(listener))),
        }
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = match self.listeners.write() {
            Ok(listeners) => listeners,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        match self.listeners.read() {
            Ok(listeners) => listeners.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RepositoryEvent<T>> {
        self.sender.subscribe()
    }

    /// Delivers an event to every listener, then to subscribers.
    pub fn emit(&self, event: RepositoryEvent<T>) {
        // Snapshot so listeners may register or remove listeners themselves.
        let listeners: Vec<(ListenerId, Listener<T>)> = match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(listener = id.0, error = %err, "Repository listener failed");
                }
                Err(_) => {
                    tracing::warn!(listener = id.0, "Repository listener panicked");
                }
            }
        }

        if self.sender.receiver_count() > 0 {
            // Only fails when every receiver dropped in between.
            let _ = self.sender.send(event);
        }
    }
}

impl<T: Clone + Send + 'static> Default for EventHub<T> {
    fn default() -> Self {
        Self::new()
    }
}
