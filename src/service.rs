//! Service layer: every operation the UI calls, over any `DocumentStore`.
//!
//! Time-sensitive operations come in pairs: the public name stamps
//! `Utc::now()` and delegates to an `_at` variant that takes the clock as
//! a parameter, so tests drive them deterministically.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::SqliteStore;
use crate::error::{Error, Result};
use crate::memory::MemoryStore;
use crate::models::{
    Category, CategoryDeleteSummary, CategoryUpdate, Chore, ChoreUpdate, Completion,
    CompletionUpdate, NewChore, validate_day_range, validate_name,
};
use crate::status::{
    self, Board, ChoreWithStatus, DueSummary, NeverDonePolicy, compute_status, sort_by_priority,
};
use crate::store::{DocumentStore, Listener, Subscription, WriteOp};

/// Two mark-done actions on the same chore within this window land in one
/// collaborative record instead of two.
pub const MERGE_WINDOW_SECONDS: i64 = 60;

#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub never_done_policy: NeverDonePolicy,
    pub merge_window: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            never_done_policy: NeverDonePolicy::default(),
            merge_window: Duration::seconds(MERGE_WINDOW_SECONDS),
        }
    }
}

/// Result of a mark-done call. `AlreadyCompleted` is a legitimate outcome
/// (the same user double-tapped), not a failure.
#[derive(Debug, Clone)]
pub enum MarkDoneOutcome {
    Created(Completion),
    Merged(Completion),
    AlreadyCompleted(Completion),
}

impl MarkDoneOutcome {
    /// The completion the call ended up pointing at.
    pub fn completion(&self) -> &Completion {
        match self {
            MarkDoneOutcome::Created(c)
            | MarkDoneOutcome::Merged(c)
            | MarkDoneOutcome::AlreadyCompleted(c) => c,
        }
    }
}

pub struct ChoreService {
    store: Box<dyn DocumentStore>,
    options: ServiceOptions,
}

impl ChoreService {
    pub fn new(store: Box<dyn DocumentStore>) -> Self {
        Self::with_options(store, ServiceOptions::default())
    }

    pub fn with_options(store: Box<dyn DocumentStore>, options: ServiceOptions) -> Self {
        Self { store, options }
    }

    /// Service over a SQLite file (local-first use).
    pub fn open(path: &Path) -> Result<Self> {
        let store = SqliteStore::open(path)?;
        Ok(Self::new(Box::new(store)))
    }

    /// Service over the in-memory store.
    pub fn new_in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    /// Register for change notifications; consumers re-read on signal.
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        self.store.subscribe(listener)
    }

    // --- Completions ---

    /// Record that a chore was done, merging with a very recent sibling
    /// record if one exists.
    pub fn mark_done(
        &self,
        chore_id: &str,
        user_id: &str,
        collaborative: bool,
        partner_id: Option<&str>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<MarkDoneOutcome> {
        self.mark_done_at(
            chore_id,
            user_id,
            collaborative,
            partner_id,
            completed_at,
            Utc::now(),
        )
    }

    /// The merge window is anchored to `now`, not to `completed_at`: it
    /// exists to catch two people tapping "done" at nearly the same
    /// moment, so a backdated entry still merges into a record created
    /// seconds ago. The upper bound keeps future-dated records (snoozes)
    /// from ever matching. The window check is read-then-write, not
    /// atomic: two truly simultaneous callers can each see no recent
    /// record and create two.
    pub fn mark_done_at(
        &self,
        chore_id: &str,
        user_id: &str,
        collaborative: bool,
        partner_id: Option<&str>,
        completed_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<MarkDoneOutcome> {
        let effective = completed_at.unwrap_or(now);
        let window_start = now - self.options.merge_window;

        let completions = self.store.list_completions()?;
        let recent = completions
            .iter()
            .filter(|c| {
                c.chore_id == chore_id && c.completed_at >= window_start && c.completed_at <= now
            })
            .max_by(|a, b| {
                a.completed_at
                    .cmp(&b.completed_at)
                    .then_with(|| a.id.cmp(&b.id))
            });

        if let Some(existing) = recent {
            if existing.completed_by.iter().any(|u| u == user_id) {
                debug!(chore_id, user_id, "mark-done no-op: already on record");
                return Ok(MarkDoneOutcome::AlreadyCompleted(existing.clone()));
            }

            let mut completed_by = existing.completed_by.clone();
            completed_by.push(user_id.to_string());
            let update = CompletionUpdate {
                completed_by: Some(completed_by),
                collaborative: Some(true),
                ..CompletionUpdate::default()
            };
            if !self.store.update_completion(&existing.id, &update)? {
                return Err(Error::CompletionNotFound(existing.id.clone()));
            }
            let mut merged = existing.clone();
            update.apply(&mut merged);
            info!(chore_id, user_id, completion_id = %merged.id, "merged mark-done");
            return Ok(MarkDoneOutcome::Merged(merged));
        }

        let mut completed_by = vec![user_id.to_string()];
        if collaborative {
            if let Some(partner) = partner_id {
                if partner != user_id {
                    completed_by.push(partner.to_string());
                }
            }
        }
        let completion = Completion {
            id: Uuid::new_v4().to_string(),
            chore_id: chore_id.to_string(),
            completed_at: effective,
            completed_by,
            collaborative,
        };
        self.store.create_completion(&completion)?;
        debug!(chore_id, user_id, completion_id = %completion.id, "created completion");
        Ok(MarkDoneOutcome::Created(completion))
    }

    /// Reset a chore's clock without crediting real work.
    pub fn skip_chore(&self, chore_id: &str, user_id: &str) -> Result<Completion> {
        self.skip_chore_at(chore_id, user_id, Utc::now())
    }

    pub fn skip_chore_at(
        &self,
        chore_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Completion> {
        let completion = Completion {
            id: Uuid::new_v4().to_string(),
            chore_id: chore_id.to_string(),
            completed_at: now,
            completed_by: vec![user_id.to_string()],
            collaborative: false,
        };
        self.store.create_completion(&completion)?;
        debug!(chore_id, user_id, "skipped chore");
        Ok(completion)
    }

    /// Push a chore's clock out to a chosen date. The completion is
    /// stamped at `until`, so the chore stays comfortable until that date
    /// arrives; the merge window never matches future-dated records.
    pub fn snooze_until(
        &self,
        chore_id: &str,
        user_id: &str,
        until: DateTime<Utc>,
    ) -> Result<Completion> {
        let completion = Completion {
            id: Uuid::new_v4().to_string(),
            chore_id: chore_id.to_string(),
            completed_at: until,
            completed_by: vec![user_id.to_string()],
            collaborative: false,
        };
        self.store.create_completion(&completion)?;
        debug!(chore_id, user_id, until = %until, "snoozed chore");
        Ok(completion)
    }

    pub fn delete_completion(&self, id: &str) -> Result<bool> {
        Ok(self.store.delete_completion(id)?)
    }

    /// Move a completion's date freely, forward or backward. History
    /// queries re-sort on read, so relative order against siblings may
    /// change.
    pub fn update_completion_date(&self, id: &str, new_date: DateTime<Utc>) -> Result<()> {
        let update = CompletionUpdate {
            completed_at: Some(new_date),
            ..CompletionUpdate::default()
        };
        if !self.store.update_completion(id, &update)? {
            return Err(Error::CompletionNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Bulk-delete every completion of a chore. Callers run this before
    /// deleting the chore itself; the store never cascades on its own.
    pub fn delete_completions_for_chore(&self, chore_id: &str) -> Result<usize> {
        let ops: Vec<WriteOp> = self
            .store
            .list_completions()?
            .into_iter()
            .filter(|c| c.chore_id == chore_id)
            .map(|c| WriteOp::DeleteCompletion { id: c.id })
            .collect();
        if ops.is_empty() {
            return Ok(0);
        }
        let deleted = self.store.batch_write(&ops)?;
        debug!(chore_id, deleted, "deleted completions for chore");
        Ok(deleted)
    }

    /// The most recent completion for a chore; timestamp ties resolve to
    /// the larger id so the answer is stable.
    pub fn last_completion(&self, chore_id: &str) -> Result<Option<Completion>> {
        let completions = self.store.list_completions()?;
        Ok(completions
            .into_iter()
            .filter(|c| c.chore_id == chore_id)
            .max_by(|a, b| {
                a.completed_at
                    .cmp(&b.completed_at)
                    .then_with(|| a.id.cmp(&b.id))
            }))
    }

    /// Full history for a chore, newest first.
    pub fn completion_history(&self, chore_id: &str) -> Result<Vec<Completion>> {
        let mut completions: Vec<Completion> = self
            .store
            .list_completions()?
            .into_iter()
            .filter(|c| c.chore_id == chore_id)
            .collect();
        completions.sort_by(|a, b| {
            b.completed_at
                .cmp(&a.completed_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(completions)
    }

    pub fn completion_count(&self, chore_id: &str) -> Result<usize> {
        Ok(self
            .store
            .list_completions()?
            .iter()
            .filter(|c| c.chore_id == chore_id)
            .count())
    }

    // --- Chores ---

    pub fn add_chore(&self, new: &NewChore) -> Result<Chore> {
        self.add_chore_at(new, Utc::now())
    }

    pub fn add_chore_at(&self, new: &NewChore, now: DateTime<Utc>) -> Result<Chore> {
        let name = validate_name(&new.name)?;
        validate_day_range(new.min_days, new.max_days, new.is_one_time)?;
        let chore = Chore {
            id: Uuid::new_v4().to_string(),
            name,
            category: new.category.clone(),
            min_days: new.min_days,
            max_days: new.max_days,
            is_one_time: new.is_one_time,
            created_at: now,
            created_by: new.created_by.clone(),
            order: None,
        };
        self.store.create_chore(&chore)?;
        debug!(chore_id = %chore.id, name = %chore.name, "added chore");
        Ok(chore)
    }

    /// Partial update; touched fields are re-validated against the
    /// resulting record.
    pub fn update_chore(&self, id: &str, mut update: ChoreUpdate) -> Result<()> {
        let chores = self.store.list_chores()?;
        let existing = chores
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::ChoreNotFound(id.to_string()))?;

        if let Some(name) = &update.name {
            update.name = Some(validate_name(name)?);
        }
        if update.min_days.is_some() || update.max_days.is_some() {
            let min = update.min_days.unwrap_or(existing.min_days);
            let max = update.max_days.unwrap_or(existing.max_days);
            validate_day_range(min, max, existing.is_one_time)?;
        }

        if !self.store.update_chore(id, &update)? {
            return Err(Error::ChoreNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Deletes only the chore record. Delete its completions first
    /// (`delete_completions_for_chore`): orphan completions must never
    /// exist, and the store does not cascade.
    pub fn delete_chore(&self, id: &str) -> Result<bool> {
        Ok(self.store.delete_chore(id)?)
    }

    /// Assign dense manual positions in the given sequence.
    pub fn reorder_chores(&self, ids: &[String]) -> Result<usize> {
        let ops: Vec<WriteOp> = ids
            .iter()
            .enumerate()
            .map(|(index, id)| WriteOp::UpdateChore {
                id: id.clone(),
                update: ChoreUpdate {
                    order: Some(Some(index as i64)),
                    ..ChoreUpdate::default()
                },
            })
            .collect();
        Ok(self.store.batch_write(&ops)?)
    }

    pub fn list_chores(&self) -> Result<Vec<Chore>> {
        Ok(self.store.list_chores()?)
    }

    // --- Categories ---

    pub fn add_category(&self, name: &str) -> Result<Category> {
        let name = validate_name(name)?;
        let categories = self.store.list_categories()?;
        if categories
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&name))
        {
            return Err(Error::DuplicateCategory(name));
        }
        let category = Category {
            id: Uuid::new_v4().to_string(),
            name,
            order: None,
        };
        self.store.create_category(&category)?;
        debug!(category_id = %category.id, name = %category.name, "added category");
        Ok(category)
    }

    /// Rename a category and retag every chore carrying the old name, as
    /// one batch write.
    pub fn rename_category(&self, id: &str, new_name: &str) -> Result<()> {
        let new_name = validate_name(new_name)?;
        let categories = self.store.list_categories()?;
        let category = categories
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::CategoryNotFound(id.to_string()))?;
        if categories
            .iter()
            .any(|c| c.id != id && c.name.eq_ignore_ascii_case(&new_name))
        {
            return Err(Error::DuplicateCategory(new_name));
        }

        let old_name = category.name.clone();
        let mut ops = vec![WriteOp::UpdateCategory {
            id: id.to_string(),
            update: CategoryUpdate {
                name: Some(new_name.clone()),
                ..CategoryUpdate::default()
            },
        }];
        let retagged = self
            .store
            .list_chores()?
            .into_iter()
            .filter(|c| c.category == old_name)
            .map(|c| WriteOp::UpdateChore {
                id: c.id,
                update: ChoreUpdate {
                    category: Some(new_name.clone()),
                    ..ChoreUpdate::default()
                },
            });
        ops.extend(retagged);

        let chores_retagged = ops.len() - 1;
        self.store.batch_write(&ops)?;
        info!(old = %old_name, new = %new_name, chores_retagged, "renamed category");
        Ok(())
    }

    pub fn reorder_categories(&self, ids: &[String]) -> Result<usize> {
        let ops: Vec<WriteOp> = ids
            .iter()
            .enumerate()
            .map(|(index, id)| WriteOp::UpdateCategory {
                id: id.clone(),
                update: CategoryUpdate {
                    order: Some(Some(index as i64)),
                    ..CategoryUpdate::default()
                },
            })
            .collect();
        Ok(self.store.batch_write(&ops)?)
    }

    /// Delete a category and everything in it: each chore's completions,
    /// then the chore, then the category itself, in that order, so that
    /// orphan completions can never exist.
    ///
    /// The sweep is best-effort: an individual failure is logged and
    /// counted, and the remaining chores are still attempted. A chore
    /// whose completions could not be deleted is left in place.
    pub fn delete_category(&self, id: &str) -> Result<CategoryDeleteSummary> {
        let categories = self.store.list_categories()?;
        let category = categories
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::CategoryNotFound(id.to_string()))?;

        let chores: Vec<Chore> = self
            .store
            .list_chores()?
            .into_iter()
            .filter(|c| c.category == category.name)
            .collect();

        let mut summary = CategoryDeleteSummary::default();
        for chore in &chores {
            match self.delete_completions_for_chore(&chore.id) {
                Ok(n) => summary.completions_deleted += n,
                Err(err) => {
                    warn!(chore_id = %chore.id, %err, "failed to delete completions; keeping chore");
                    summary.failures += 1;
                    continue;
                }
            }
            match self.store.delete_chore(&chore.id) {
                Ok(found) => {
                    if found {
                        summary.chores_deleted += 1;
                    }
                }
                Err(err) => {
                    warn!(chore_id = %chore.id, %err, "failed to delete chore");
                    summary.failures += 1;
                }
            }
        }

        self.store.delete_category(id)?;
        info!(
            category = %category.name,
            chores = summary.chores_deleted,
            completions = summary.completions_deleted,
            failures = summary.failures,
            "deleted category"
        );
        Ok(summary)
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.store.list_categories()?)
    }

    // --- Board assembly ---

    /// Every chore joined with its latest completion, statused and
    /// priority-sorted.
    pub fn statused_chores(&self) -> Result<Vec<ChoreWithStatus>> {
        self.statused_chores_at(Utc::now())
    }

    pub fn statused_chores_at(&self, now: DateTime<Utc>) -> Result<Vec<ChoreWithStatus>> {
        let chores = self.store.list_chores()?;
        let completions = self.store.list_completions()?;
        let statused = chores
            .iter()
            .map(|chore| {
                let last = completions
                    .iter()
                    .filter(|c| c.chore_id == chore.id)
                    .max_by(|a, b| {
                        a.completed_at
                            .cmp(&b.completed_at)
                            .then_with(|| a.id.cmp(&b.id))
                    });
                compute_status(chore, last, now, self.options.never_done_policy)
            })
            .collect();
        Ok(sort_by_priority(statused))
    }

    pub fn build_board(&self) -> Result<Board> {
        self.build_board_at(Utc::now())
    }

    pub fn build_board_at(&self, now: DateTime<Utc>) -> Result<Board> {
        let statused = self.statused_chores_at(now)?;
        let categories = self.store.list_categories()?;
        Ok(status::build_board(statused, &categories))
    }

    pub fn due_summary(&self) -> Result<DueSummary> {
        self.due_summary_at(Utc::now())
    }

    pub fn due_summary_at(&self, now: DateTime<Utc>) -> Result<DueSummary> {
        Ok(status::due_summary(&self.statused_chores_at(now)?))
    }
}
