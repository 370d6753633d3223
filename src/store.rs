//! The persistence seam.
//!
//! `DocumentStore` is the abstract contract the service layer talks to:
//! per-collection list/create/update/delete, a batch write for reorders
//! and cascades, and a change-subscription feed. The crate ships two
//! implementations (`MemoryStore`, `SqliteStore`); remote document
//! databases plug in the same way. Backends return `anyhow::Result`,
//! since their failure modes are arbitrary, and the service wraps those
//! into the crate's typed error.
//!
//! Store calls are synchronous and `&self`; UI callers should invoke them
//! off their event thread.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use anyhow::Result;

use crate::models::{
    Category, CategoryUpdate, Chore, ChoreUpdate, Completion, CompletionUpdate,
};

/// Which collection changed. Consumers re-read the collection on
/// notification; events carry no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Chores,
    Completions,
    Categories,
}

/// Callback invoked on collection changes.
pub type Listener = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// A single operation inside a `batch_write`.
#[derive(Debug, Clone)]
pub enum WriteOp {
    UpdateChore { id: String, update: ChoreUpdate },
    DeleteChore { id: String },
    UpdateCompletion { id: String, update: CompletionUpdate },
    DeleteCompletion { id: String },
    UpdateCategory { id: String, update: CategoryUpdate },
    DeleteCategory { id: String },
}

/// Abstract document-store contract.
///
/// Listing operations guarantee no particular order; callers sort.
/// Update/delete return `false` when the target record does not exist.
pub trait DocumentStore: Send + Sync {
    fn list_chores(&self) -> Result<Vec<Chore>>;
    fn list_completions(&self) -> Result<Vec<Completion>>;
    fn list_categories(&self) -> Result<Vec<Category>>;

    fn create_chore(&self, chore: &Chore) -> Result<()>;
    fn update_chore(&self, id: &str, update: &ChoreUpdate) -> Result<bool>;
    fn delete_chore(&self, id: &str) -> Result<bool>;

    fn create_completion(&self, completion: &Completion) -> Result<()>;
    fn update_completion(&self, id: &str, update: &CompletionUpdate) -> Result<bool>;
    fn delete_completion(&self, id: &str) -> Result<bool>;

    fn create_category(&self, category: &Category) -> Result<()>;
    fn update_category(&self, id: &str, update: &CategoryUpdate) -> Result<bool>;
    fn delete_category(&self, id: &str) -> Result<bool>;

    /// Apply several writes as one unit, atomic where the backend supports
    /// it. Returns the number of operations that found their target.
    fn batch_write(&self, ops: &[WriteOp]) -> Result<usize>;

    /// Register a change listener. Dropping the returned `Subscription`
    /// unsubscribes; feeds have an explicit lifecycle, no ambient
    /// registration.
    fn subscribe(&self, listener: Listener) -> Subscription;
}

#[derive(Default)]
struct ListenerMap {
    next_id: u64,
    listeners: HashMap<u64, Listener>,
}

/// Listener registry shared by store implementations. Backends call
/// `notify` after each successful mutation.
#[derive(Clone, Default)]
pub struct ListenerSet {
    inner: Arc<Mutex<ListenerMap>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Listener) -> Subscription {
        let mut map = self.inner.lock().expect("listener registry poisoned");
        let id = map.next_id;
        map.next_id += 1;
        map.listeners.insert(id, listener);
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    pub fn notify(&self, event: ChangeEvent) {
        let listeners: Vec<Listener> = {
            let map = self.inner.lock().expect("listener registry poisoned");
            map.listeners.values().cloned().collect()
        };
        for listener in listeners {
            listener(event);
        }
    }
}

/// Handle for an active change subscription; unsubscribes on drop.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<ListenerMap>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut map) = registry.lock() {
                map.listeners.remove(&self.id);
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notify_reaches_registered_listeners() {
        let set = ListenerSet::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);

        let _sub = set.register(Arc::new(move |event| {
            assert_eq!(event, ChangeEvent::Chores);
            hits_clone.fetch_add(1, Ordering::SeqCst);
        }));

        set.notify(ChangeEvent::Chores);
        set.notify(ChangeEvent::Chores);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let set = ListenerSet::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);

        let sub = set.register(Arc::new(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        }));
        set.notify(ChangeEvent::Completions);
        drop(sub);
        set.notify(ChangeEvent::Completions);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
