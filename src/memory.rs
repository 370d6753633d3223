//! In-memory document store, the reference backend for tests and
//! previews. All collections live behind one mutex, so batch writes are
//! atomic with respect to readers.

use std::sync::Mutex;

use anyhow::Result;

use crate::models::{
    Category, CategoryUpdate, Chore, ChoreUpdate, Completion, CompletionUpdate,
};
use crate::store::{ChangeEvent, DocumentStore, Listener, ListenerSet, Subscription, WriteOp};

#[derive(Default)]
struct Collections {
    chores: Vec<Chore>,
    completions: Vec<Completion>,
    categories: Vec<Category>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
    listeners: ListenerSet,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Collections) -> T) -> T {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        f(&mut inner)
    }

    fn apply_op(collections: &mut Collections, op: &WriteOp) -> (bool, ChangeEvent) {
        match op {
            WriteOp::UpdateChore { id, update } => {
                let found = collections.chores.iter_mut().find(|c| &c.id == id);
                let hit = found.map(|c| update.apply(c)).is_some();
                (hit, ChangeEvent::Chores)
            }
            WriteOp::DeleteChore { id } => {
                let before = collections.chores.len();
                collections.chores.retain(|c| &c.id != id);
                (collections.chores.len() < before, ChangeEvent::Chores)
            }
            WriteOp::UpdateCompletion { id, update } => {
                let found = collections.completions.iter_mut().find(|c| &c.id == id);
                let hit = found.map(|c| update.apply(c)).is_some();
                (hit, ChangeEvent::Completions)
            }
            WriteOp::DeleteCompletion { id } => {
                let before = collections.completions.len();
                collections.completions.retain(|c| &c.id != id);
                (
                    collections.completions.len() < before,
                    ChangeEvent::Completions,
                )
            }
            WriteOp::UpdateCategory { id, update } => {
                let found = collections.categories.iter_mut().find(|c| &c.id == id);
                let hit = found.map(|c| update.apply(c)).is_some();
                (hit, ChangeEvent::Categories)
            }
            WriteOp::DeleteCategory { id } => {
                let before = collections.categories.len();
                collections.categories.retain(|c| &c.id != id);
                (
                    collections.categories.len() < before,
                    ChangeEvent::Categories,
                )
            }
        }
    }
}

impl DocumentStore for MemoryStore {
    fn list_chores(&self) -> Result<Vec<Chore>> {
        Ok(self.with_inner(|c| c.chores.clone()))
    }

    fn list_completions(&self) -> Result<Vec<Completion>> {
        Ok(self.with_inner(|c| c.completions.clone()))
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.with_inner(|c| c.categories.clone()))
    }

    fn create_chore(&self, chore: &Chore) -> Result<()> {
        self.with_inner(|c| c.chores.push(chore.clone()));
        self.listeners.notify(ChangeEvent::Chores);
        Ok(())
    }

    fn update_chore(&self, id: &str, update: &ChoreUpdate) -> Result<bool> {
        let found = self.with_inner(|c| {
            c.chores
                .iter_mut()
                .find(|chore| chore.id == id)
                .map(|chore| update.apply(chore))
                .is_some()
        });
        if found {
            self.listeners.notify(ChangeEvent::Chores);
        }
        Ok(found)
    }

    fn delete_chore(&self, id: &str) -> Result<bool> {
        let found = self.with_inner(|c| {
            let before = c.chores.len();
            c.chores.retain(|chore| chore.id != id);
            c.chores.len() < before
        });
        if found {
            self.listeners.notify(ChangeEvent::Chores);
        }
        Ok(found)
    }

    fn create_completion(&self, completion: &Completion) -> Result<()> {
        self.with_inner(|c| c.completions.push(completion.clone()));
        self.listeners.notify(ChangeEvent::Completions);
        Ok(())
    }

    fn update_completion(&self, id: &str, update: &CompletionUpdate) -> Result<bool> {
        let found = self.with_inner(|c| {
            c.completions
                .iter_mut()
                .find(|completion| completion.id == id)
                .map(|completion| update.apply(completion))
                .is_some()
        });
        if found {
            self.listeners.notify(ChangeEvent::Completions);
        }
        Ok(found)
    }

    fn delete_completion(&self, id: &str) -> Result<bool> {
        let found = self.with_inner(|c| {
            let before = c.completions.len();
            c.completions.retain(|completion| completion.id != id);
            c.completions.len() < before
        });
        if found {
            self.listeners.notify(ChangeEvent::Completions);
        }
        Ok(found)
    }

    fn create_category(&self, category: &Category) -> Result<()> {
        self.with_inner(|c| c.categories.push(category.clone()));
        self.listeners.notify(ChangeEvent::Categories);
        Ok(())
    }

    fn update_category(&self, id: &str, update: &CategoryUpdate) -> Result<bool> {
        let found = self.with_inner(|c| {
            c.categories
                .iter_mut()
                .find(|category| category.id == id)
                .map(|category| update.apply(category))
                .is_some()
        });
        if found {
            self.listeners.notify(ChangeEvent::Categories);
        }
        Ok(found)
    }

    fn delete_category(&self, id: &str) -> Result<bool> {
        let found = self.with_inner(|c| {
            let before = c.categories.len();
            c.categories.retain(|category| category.id != id);
            c.categories.len() < before
        });
        if found {
            self.listeners.notify(ChangeEvent::Categories);
        }
        Ok(found)
    }

    fn batch_write(&self, ops: &[WriteOp]) -> Result<usize> {
        let (applied, events) = self.with_inner(|collections| {
            let mut applied = 0;
            let mut events = Vec::new();
            for op in ops {
                let (hit, event) = Self::apply_op(collections, op);
                if hit {
                    applied += 1;
                    if !events.contains(&event) {
                        events.push(event);
                    }
                }
            }
            (applied, events)
        });
        for event in events {
            self.listeners.notify(event);
        }
        Ok(applied)
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.listeners.register(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_chore(id: &str) -> Chore {
        Chore {
            id: id.to_string(),
            name: "Vacuum".to_string(),
            category: "Cleaning".to_string(),
            min_days: 3,
            max_days: 7,
            is_one_time: false,
            created_at: Utc::now(),
            created_by: "user-a".to_string(),
            order: None,
        }
    }

    fn sample_completion(id: &str, chore_id: &str) -> Completion {
        Completion {
            id: id.to_string(),
            chore_id: chore_id.to_string(),
            completed_at: Utc::now(),
            completed_by: vec!["user-a".to_string()],
            collaborative: false,
        }
    }

    #[test]
    fn test_chore_crud_round_trip() {
        let store = MemoryStore::new();
        store.create_chore(&sample_chore("c1")).unwrap();

        let chores = store.list_chores().unwrap();
        assert_eq!(chores.len(), 1);
        assert_eq!(chores[0].name, "Vacuum");

        let update = ChoreUpdate {
            name: Some("Vacuum upstairs".to_string()),
            ..ChoreUpdate::default()
        };
        assert!(store.update_chore("c1", &update).unwrap());
        assert_eq!(store.list_chores().unwrap()[0].name, "Vacuum upstairs");

        assert!(!store.update_chore("missing", &update).unwrap());
        assert!(store.delete_chore("c1").unwrap());
        assert!(!store.delete_chore("c1").unwrap());
        assert!(store.list_chores().unwrap().is_empty());
    }

    #[test]
    fn test_batch_write_counts_hits() {
        let store = MemoryStore::new();
        store.create_chore(&sample_chore("c1")).unwrap();
        store.create_chore(&sample_chore("c2")).unwrap();

        let ops = vec![
            WriteOp::UpdateChore {
                id: "c1".to_string(),
                update: ChoreUpdate {
                    order: Some(Some(0)),
                    ..ChoreUpdate::default()
                },
            },
            WriteOp::UpdateChore {
                id: "c2".to_string(),
                update: ChoreUpdate {
                    order: Some(Some(1)),
                    ..ChoreUpdate::default()
                },
            },
            WriteOp::DeleteChore {
                id: "ghost".to_string(),
            },
        ];
        assert_eq!(store.batch_write(&ops).unwrap(), 2);

        let chores = store.list_chores().unwrap();
        assert_eq!(chores[0].order, Some(0));
        assert_eq!(chores[1].order, Some(1));
    }

    #[test]
    fn test_mutations_notify_subscribers() {
        let store = MemoryStore::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        let sub = store.subscribe(Arc::new(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        }));

        store.create_chore(&sample_chore("c1")).unwrap();
        store.create_completion(&sample_completion("comp1", "c1")).unwrap();
        // A miss does not notify.
        store.delete_chore("ghost").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        drop(sub);
        store.create_chore(&sample_chore("c2")).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_batch_write_notifies_once_per_collection() {
        let store = MemoryStore::new();
        store.create_chore(&sample_chore("c1")).unwrap();
        store.create_chore(&sample_chore("c2")).unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        let _sub = store.subscribe(Arc::new(move |event| {
            assert_eq!(event, ChangeEvent::Chores);
            hits_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let ops: Vec<WriteOp> = ["c1", "c2"]
            .iter()
            .enumerate()
            .map(|(i, id)| WriteOp::UpdateChore {
                id: (*id).to_string(),
                update: ChoreUpdate {
                    order: Some(Some(i as i64)),
                    ..ChoreUpdate::default()
                },
            })
            .collect();
        store.batch_write(&ops).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
