//! SQLite-backed document store for local-first use.
//!
//! Timestamps are stored as RFC 3339 text and `completed_by` as a JSON
//! array column. Batch writes run inside a transaction, so reorders and
//! cascades are atomic here; remote backends may be weaker, and the
//! service layer does not depend on it.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};

use crate::models::{
    Category, CategoryUpdate, Chore, ChoreUpdate, Completion, CompletionUpdate,
};
use crate::store::{ChangeEvent, DocumentStore, Listener, ListenerSet, Subscription, WriteOp};

pub struct SqliteStore {
    conn: Mutex<Connection>,
    listeners: ListenerSet,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
            listeners: ListenerSet::new(),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
            listeners: ListenerSet::new(),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS chores (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    category TEXT NOT NULL DEFAULT '',
                    min_days INTEGER NOT NULL,
                    max_days INTEGER NOT NULL,
                    is_one_time INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    created_by TEXT NOT NULL,
                    sort_order INTEGER
                );

                CREATE TABLE IF NOT EXISTS completions (
                    id TEXT PRIMARY KEY,
                    chore_id TEXT NOT NULL,
                    completed_at TEXT NOT NULL,
                    completed_by TEXT NOT NULL,
                    collaborative INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS categories (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    sort_order INTEGER
                );

                CREATE INDEX IF NOT EXISTS idx_completions_chore ON completions(chore_id);
                CREATE INDEX IF NOT EXISTS idx_completions_completed_at ON completions(completed_at);
                CREATE INDEX IF NOT EXISTS idx_chores_category ON chores(category);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("sqlite store poisoned")
    }

    fn apply_op(conn: &Connection, op: &WriteOp) -> Result<(bool, ChangeEvent)> {
        match op {
            WriteOp::UpdateChore { id, update } => {
                Ok((update_chore_row(conn, id, update)?, ChangeEvent::Chores))
            }
            WriteOp::DeleteChore { id } => {
                let hit = conn.execute("DELETE FROM chores WHERE id = ?1", params![id])? > 0;
                Ok((hit, ChangeEvent::Chores))
            }
            WriteOp::UpdateCompletion { id, update } => Ok((
                update_completion_row(conn, id, update)?,
                ChangeEvent::Completions,
            )),
            WriteOp::DeleteCompletion { id } => {
                let hit = conn.execute("DELETE FROM completions WHERE id = ?1", params![id])? > 0;
                Ok((hit, ChangeEvent::Completions))
            }
            WriteOp::UpdateCategory { id, update } => Ok((
                update_category_row(conn, id, update)?,
                ChangeEvent::Categories,
            )),
            WriteOp::DeleteCategory { id } => {
                let hit = conn.execute("DELETE FROM categories WHERE id = ?1", params![id])? > 0;
                Ok((hit, ChangeEvent::Categories))
            }
        }
    }
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn chore_from_row(row: &Row) -> rusqlite::Result<Chore> {
    let created_at: String = row.get(6)?;
    Ok(Chore {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        min_days: row.get(3)?,
        max_days: row.get(4)?,
        is_one_time: row.get(5)?,
        created_at: parse_timestamp(6, &created_at)?,
        created_by: row.get(7)?,
        order: row.get(8)?,
    })
}

fn completion_from_row(row: &Row) -> rusqlite::Result<Completion> {
    let completed_at: String = row.get(2)?;
    let completed_by: String = row.get(3)?;
    Ok(Completion {
        id: row.get(0)?,
        chore_id: row.get(1)?,
        completed_at: parse_timestamp(2, &completed_at)?,
        completed_by: serde_json::from_str(&completed_by)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
        collaborative: row.get(4)?,
    })
}

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        order: row.get(2)?,
    })
}

fn get_chore(conn: &Connection, id: &str) -> Result<Option<Chore>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, category, min_days, max_days, is_one_time, created_at, created_by, sort_order
         FROM chores WHERE id = ?1",
    )?;
    let mut rows = stmt.query_map(params![id], chore_from_row)?;
    rows.next().transpose().map_err(Into::into)
}

fn update_chore_row(conn: &Connection, id: &str, update: &ChoreUpdate) -> Result<bool> {
    let Some(mut chore) = get_chore(conn, id)? else {
        return Ok(false);
    };
    update.apply(&mut chore);
    conn.execute(
        "UPDATE chores SET name = ?2, category = ?3, min_days = ?4, max_days = ?5, sort_order = ?6
         WHERE id = ?1",
        params![
            id,
            chore.name,
            chore.category,
            chore.min_days,
            chore.max_days,
            chore.order
        ],
    )?;
    Ok(true)
}

fn get_completion(conn: &Connection, id: &str) -> Result<Option<Completion>> {
    let mut stmt = conn.prepare(
        "SELECT id, chore_id, completed_at, completed_by, collaborative
         FROM completions WHERE id = ?1",
    )?;
    let mut rows = stmt.query_map(params![id], completion_from_row)?;
    rows.next().transpose().map_err(Into::into)
}

fn update_completion_row(conn: &Connection, id: &str, update: &CompletionUpdate) -> Result<bool> {
    let Some(mut completion) = get_completion(conn, id)? else {
        return Ok(false);
    };
    update.apply(&mut completion);
    conn.execute(
        "UPDATE completions SET completed_at = ?2, completed_by = ?3, collaborative = ?4
         WHERE id = ?1",
        params![
            id,
            completion.completed_at.to_rfc3339(),
            serde_json::to_string(&completion.completed_by)?,
            completion.collaborative
        ],
    )?;
    Ok(true)
}

fn get_category(conn: &Connection, id: &str) -> Result<Option<Category>> {
    let mut stmt = conn.prepare("SELECT id, name, sort_order FROM categories WHERE id = ?1")?;
    let mut rows = stmt.query_map(params![id], category_from_row)?;
    rows.next().transpose().map_err(Into::into)
}

fn update_category_row(conn: &Connection, id: &str, update: &CategoryUpdate) -> Result<bool> {
    let Some(mut category) = get_category(conn, id)? else {
        return Ok(false);
    };
    update.apply(&mut category);
    conn.execute(
        "UPDATE categories SET name = ?2, sort_order = ?3 WHERE id = ?1",
        params![id, category.name, category.order],
    )?;
    Ok(true)
}

impl DocumentStore for SqliteStore {
    fn list_chores(&self) -> Result<Vec<Chore>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, category, min_days, max_days, is_one_time, created_at, created_by, sort_order
             FROM chores",
        )?;
        let chores = stmt
            .query_map([], chore_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(chores)
    }

    fn list_completions(&self) -> Result<Vec<Completion>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, chore_id, completed_at, completed_by, collaborative FROM completions",
        )?;
        let completions = stmt
            .query_map([], completion_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(completions)
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT id, name, sort_order FROM categories")?;
        let categories = stmt
            .query_map([], category_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }

    fn create_chore(&self, chore: &Chore) -> Result<()> {
        self.lock().execute(
            "INSERT INTO chores (id, name, category, min_days, max_days, is_one_time, created_at, created_by, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                chore.id,
                chore.name,
                chore.category,
                chore.min_days,
                chore.max_days,
                chore.is_one_time,
                chore.created_at.to_rfc3339(),
                chore.created_by,
                chore.order
            ],
        )?;
        self.listeners.notify(ChangeEvent::Chores);
        Ok(())
    }

    fn update_chore(&self, id: &str, update: &ChoreUpdate) -> Result<bool> {
        let found = update_chore_row(&self.lock(), id, update)?;
        if found {
            self.listeners.notify(ChangeEvent::Chores);
        }
        Ok(found)
    }

    fn delete_chore(&self, id: &str) -> Result<bool> {
        let found = self
            .lock()
            .execute("DELETE FROM chores WHERE id = ?1", params![id])?
            > 0;
        if found {
            self.listeners.notify(ChangeEvent::Chores);
        }
        Ok(found)
    }

    fn create_completion(&self, completion: &Completion) -> Result<()> {
        self.lock().execute(
            "INSERT INTO completions (id, chore_id, completed_at, completed_by, collaborative)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                completion.id,
                completion.chore_id,
                completion.completed_at.to_rfc3339(),
                serde_json::to_string(&completion.completed_by)?,
                completion.collaborative
            ],
        )?;
        self.listeners.notify(ChangeEvent::Completions);
        Ok(())
    }

    fn update_completion(&self, id: &str, update: &CompletionUpdate) -> Result<bool> {
        let found = update_completion_row(&self.lock(), id, update)?;
        if found {
            self.listeners.notify(ChangeEvent::Completions);
        }
        Ok(found)
    }

    fn delete_completion(&self, id: &str) -> Result<bool> {
        let found = self
            .lock()
            .execute("DELETE FROM completions WHERE id = ?1", params![id])?
            > 0;
        if found {
            self.listeners.notify(ChangeEvent::Completions);
        }
        Ok(found)
    }

    fn create_category(&self, category: &Category) -> Result<()> {
        self.lock().execute(
            "INSERT INTO categories (id, name, sort_order) VALUES (?1, ?2, ?3)",
            params![category.id, category.name, category.order],
        )?;
        self.listeners.notify(ChangeEvent::Categories);
        Ok(())
    }

    fn update_category(&self, id: &str, update: &CategoryUpdate) -> Result<bool> {
        let found = update_category_row(&self.lock(), id, update)?;
        if found {
            self.listeners.notify(ChangeEvent::Categories);
        }
        Ok(found)
    }

    fn delete_category(&self, id: &str) -> Result<bool> {
        let found = self
            .lock()
            .execute("DELETE FROM categories WHERE id = ?1", params![id])?
            > 0;
        if found {
            self.listeners.notify(ChangeEvent::Categories);
        }
        Ok(found)
    }

    fn batch_write(&self, ops: &[WriteOp]) -> Result<usize> {
        let mut events = Vec::new();
        let applied = {
            let mut conn = self.lock();
            let tx = conn.transaction()?;
            let mut applied = 0;
            for op in ops {
                let (hit, event) = Self::apply_op(&tx, op)?;
                if hit {
                    applied += 1;
                    if !events.contains(&event) {
                        events.push(event);
                    }
                }
            }
            tx.commit()?;
            applied
        };
        for event in events {
            self.listeners.notify(event);
        }
        Ok(applied)
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.listeners.register(listener)
    }
}
