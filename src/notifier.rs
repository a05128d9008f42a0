//! Broadcast-latest primitive owned by each store.
//!
//! An explicit observer list plus the most recently published snapshot:
//! new subscribers immediately receive the current state, later publishes
//! reach every subscriber synchronously. One notifier is instantiated per
//! store; there is no global event bus.

use std::sync::{Arc, Mutex};

pub type SubscriptionId = u64;

type Callback<T> = Arc<dyn Fn(&[T]) + Send + Sync>;

pub struct ChangeNotifier<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    latest: Arc<Vec<T>>,
    next_id: SubscriptionId,
    subscribers: Vec<(SubscriptionId, Callback<T>)>,
}

impl<T> Default for ChangeNotifier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChangeNotifier<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                latest: Arc::new(Vec::new()),
                next_id: 1,
                subscribers: Vec::new(),
            }),
        }
    }

    /// The most recently published snapshot (initially empty). Snapshots
    /// are shared read-only projections; they are replaced, never mutated.
    pub fn latest(&self) -> Arc<Vec<T>> {
        self.inner.lock().unwrap().latest.clone()
    }

    /// Registers a subscriber and synchronously delivers the current
    /// snapshot to it before returning.
    pub fn subscribe(
        &self,
        subscriber: impl Fn(&[T]) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let callback: Callback<T> = Arc::new(subscriber);
        let (id, latest) = {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push((id, callback.clone()));
            (id, inner.latest.clone())
        };
        callback(&latest);
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.lock().unwrap().subscribers.retain(|(sub_id, _)| *sub_id != id);
    }

    /// Replaces the retained snapshot and synchronously notifies every
    /// subscriber, in subscription order. Callbacks run outside the
    /// notifier's lock, so a subscriber may re-enter the owning store.
    pub fn publish(&self, snapshot: Vec<T>) {
        let (snapshot, callbacks) = {
            let mut inner = self.inner.lock().unwrap();
            inner.latest = Arc::new(snapshot);
            let callbacks: Vec<Callback<T>> =
                inner.subscribers.iter().map(|(_, cb)| cb.clone()).collect();
            (inner.latest.clone(), callbacks)
        };
        for callback in callbacks {
            callback(&snapshot);
        }
    }
}
