//! Status computation and priority ordering.
//!
//! Everything here is pure: the caller supplies `now`, so the same inputs
//! always produce the same output. Day arithmetic uses UTC calendar-day
//! boundaries (`date_naive` difference), not rolling 24-hour spans: 23:30
//! to 00:30 the next day counts as one day.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Category, Chore, Completion};

/// A chore this many multiples of `max_days` past its last completion is
/// severely overdue rather than merely overdue.
pub const SEVERE_OVERDUE_MULTIPLIER: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChoreStatus {
    Comfortable,
    DueSoon,
    Overdue,
    SeverelyOverdue,
    NeverDone,
}

impl ChoreStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChoreStatus::Comfortable => "comfortable",
            ChoreStatus::DueSoon => "due-soon",
            ChoreStatus::Overdue => "overdue",
            ChoreStatus::SeverelyOverdue => "severely-overdue",
            ChoreStatus::NeverDone => "never-done",
        }
    }
}

impl std::fmt::Display for ChoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a chore with zero completions is reported.
///
/// `ScheduleFromCreation` runs the normal thresholds with `created_at` as
/// the baseline, so a fresh chore works through comfortable → due-soon →
/// overdue like any other. `AlwaysNeverDone` short-circuits to the
/// dedicated `NeverDone` status regardless of elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NeverDonePolicy {
    #[default]
    ScheduleFromCreation,
    AlwaysNeverDone,
}

/// A chore joined with its most recent completion and the derived urgency.
#[derive(Debug, Clone, Serialize)]
pub struct ChoreWithStatus {
    #[serde(flatten)]
    pub chore: Chore,
    pub last_completion: Option<Completion>,
    pub days_since_last_done: i64,
    pub days_until_overdue: i64,
    pub status: ChoreStatus,
    pub status_text: String,
}

impl ChoreWithStatus {
    /// One-time chores with a completion are archived: always comfortable,
    /// always sorted after everything still in rotation.
    pub fn is_completed_one_time(&self) -> bool {
        self.chore.is_one_time && self.last_completion.is_some()
    }
}

/// Whole-calendar-day difference between two instants, UTC boundaries.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to.date_naive() - from.date_naive()).num_days()
}

/// Compute a chore's displayed status from its configuration and most
/// recent completion.
///
/// With no completion on record, `created_at` is the baseline, so a
/// freshly created chore starts its clock at creation rather than
/// appearing overdue immediately.
pub fn compute_status(
    chore: &Chore,
    last_completion: Option<&Completion>,
    now: DateTime<Utc>,
    policy: NeverDonePolicy,
) -> ChoreWithStatus {
    let last_done = last_completion.map_or(chore.created_at, |c| c.completed_at);
    let days_since_last_done = days_between(last_done, now);
    let days_until_overdue = chore.max_days - days_since_last_done;

    let status = if chore.is_one_time && last_completion.is_some() {
        ChoreStatus::Comfortable
    } else if last_completion.is_none() && policy == NeverDonePolicy::AlwaysNeverDone {
        ChoreStatus::NeverDone
    } else if days_since_last_done < chore.min_days {
        ChoreStatus::Comfortable
    } else if days_since_last_done < chore.max_days {
        ChoreStatus::DueSoon
    } else if days_since_last_done >= chore.max_days * SEVERE_OVERDUE_MULTIPLIER {
        ChoreStatus::SeverelyOverdue
    } else {
        ChoreStatus::Overdue
    };

    let status_text = if chore.is_one_time && last_completion.is_some() {
        "Completed".to_string()
    } else if last_completion.is_none() {
        "Never done".to_string()
    } else {
        match status {
            ChoreStatus::Comfortable => format_due_in(chore.min_days - days_since_last_done),
            ChoreStatus::DueSoon => format_due_in(chore.max_days - days_since_last_done),
            ChoreStatus::Overdue | ChoreStatus::SeverelyOverdue => {
                format_overdue(days_since_last_done - chore.max_days)
            }
            // Only reachable with no completion, handled above.
            ChoreStatus::NeverDone => "Never done".to_string(),
        }
    };

    ChoreWithStatus {
        chore: chore.clone(),
        last_completion: last_completion.cloned(),
        days_since_last_done,
        days_until_overdue,
        status,
        status_text,
    }
}

fn format_due_in(days: i64) -> String {
    if days == 1 {
        "Due in 1 day".to_string()
    } else {
        format!("Due in {days} days")
    }
}

fn format_overdue(days_over: i64) -> String {
    match days_over {
        0 => "Due today".to_string(),
        1 => "1 day overdue".to_string(),
        n => format!("{n} days overdue"),
    }
}

/// Order chores for display: most urgent first (ascending
/// `days_until_overdue`), with completed one-time chores always after
/// everything still in rotation. Stable, so ties keep insertion order.
pub fn sort_by_priority(mut chores: Vec<ChoreWithStatus>) -> Vec<ChoreWithStatus> {
    chores.sort_by_key(|c| (c.is_completed_one_time(), c.days_until_overdue));
    chores
}

/// Chores behind the "N overdue / N due soon" banner, in the order given.
/// Completed one-time chores never count; pass a priority-sorted list to
/// get names in urgency order.
#[derive(Debug, Clone, Default)]
pub struct DueSummary {
    /// Names of chores that are due-soon or worse.
    pub due: Vec<String>,
    /// Names of chores that are overdue or worse.
    pub overdue: Vec<String>,
}

pub fn due_summary(chores: &[ChoreWithStatus]) -> DueSummary {
    let mut summary = DueSummary::default();
    for c in chores {
        if c.chore.is_one_time {
            continue;
        }
        match c.status {
            ChoreStatus::DueSoon => summary.due.push(c.chore.name.clone()),
            ChoreStatus::Overdue | ChoreStatus::SeverelyOverdue => {
                summary.due.push(c.chore.name.clone());
                summary.overdue.push(c.chore.name.clone());
            }
            ChoreStatus::Comfortable | ChoreStatus::NeverDone => {}
        }
    }
    summary
}

/// The column board the UI renders: one column per category.
#[derive(Debug, Clone, Serialize)]
pub struct Board {
    pub columns: Vec<BoardColumn>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardColumn {
    pub category: String,
    pub chores: Vec<ChoreWithStatus>,
}

/// Group statused chores into category columns.
///
/// Known categories come first (manual `order` ascending, unordered ones
/// after by name) and keep their column even when empty. Chores with an
/// empty category group under "Uncategorized", and chores referencing a
/// name with no category record form trailing columns in first-seen
/// order. Chores keep the order they were passed in, so give this a
/// priority-sorted list.
pub fn build_board(statused: Vec<ChoreWithStatus>, categories: &[Category]) -> Board {
    let mut known: Vec<&Category> = categories.iter().collect();
    known.sort_by(|a, b| match (a.order, b.order) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
    });

    let mut columns: Vec<BoardColumn> = known
        .iter()
        .map(|c| BoardColumn {
            category: c.name.clone(),
            chores: Vec::new(),
        })
        .collect();
    let mut extras: Vec<BoardColumn> = Vec::new();

    for chore in statused {
        let name = crate::models::display_category(&chore.chore).to_string();
        if let Some(column) = columns.iter_mut().find(|c| c.category == name) {
            column.chores.push(chore);
        } else if let Some(column) = extras.iter_mut().find(|c| c.category == name) {
            column.chores.push(chore);
        } else {
            extras.push(BoardColumn {
                category: name,
                chores: vec![chore],
            });
        }
    }

    columns.extend(extras);
    Board { columns }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn chore(min_days: i64, max_days: i64, is_one_time: bool) -> Chore {
        Chore {
            id: "c1".to_string(),
            name: "Vacuum".to_string(),
            category: "Cleaning".to_string(),
            min_days,
            max_days,
            is_one_time,
            created_at: at(2024, 6, 1, 12, 0),
            created_by: "user-a".to_string(),
            order: None,
        }
    }

    fn completion_at(when: DateTime<Utc>) -> Completion {
        Completion {
            id: "comp1".to_string(),
            chore_id: "c1".to_string(),
            completed_at: when,
            completed_by: vec!["user-a".to_string()],
            collaborative: false,
        }
    }

    fn statused(
        min: i64,
        max: i64,
        days_since: i64,
        one_time: bool,
        completed: bool,
    ) -> ChoreWithStatus {
        let c = chore(min, max, one_time);
        let done = completion_at(at(2024, 6, 1, 12, 0));
        let now = at(2024, 6, 1, 12, 0) + chrono::Duration::days(days_since);
        compute_status(
            &c,
            if completed { Some(&done) } else { None },
            now,
            NeverDonePolicy::default(),
        )
    }

    #[test]
    fn test_never_completed_progresses_from_creation() {
        // min 3 / max 7, created and never completed.
        let c = chore(3, 7, false);
        let day = |n: i64| at(2024, 6, 1, 12, 0) + chrono::Duration::days(n);
        let policy = NeverDonePolicy::default();

        let s = compute_status(&c, None, day(2), policy);
        assert_eq!(s.status, ChoreStatus::Comfortable);
        assert_eq!(s.status_text, "Never done");
        assert_eq!(s.days_since_last_done, 2);

        let s = compute_status(&c, None, day(5), policy);
        assert_eq!(s.status, ChoreStatus::DueSoon);

        let s = compute_status(&c, None, day(7), policy);
        assert_eq!(s.status, ChoreStatus::Overdue);

        let s = compute_status(&c, None, day(20), policy);
        assert_eq!(s.status, ChoreStatus::Overdue);

        // 7 * 3 = 21 days
        let s = compute_status(&c, None, day(21), policy);
        assert_eq!(s.status, ChoreStatus::SeverelyOverdue);
    }

    #[test]
    fn test_always_never_done_policy() {
        let c = chore(3, 7, false);
        let policy = NeverDonePolicy::AlwaysNeverDone;

        for days in [0, 2, 7, 50] {
            let now = at(2024, 6, 1, 12, 0) + chrono::Duration::days(days);
            let s = compute_status(&c, None, now, policy);
            assert_eq!(s.status, ChoreStatus::NeverDone, "day {days}");
            assert_eq!(s.status_text, "Never done");
            // The day math is unaffected by the policy.
            assert_eq!(s.days_since_last_done, days);
            assert_eq!(s.days_until_overdue, 7 - days);
        }
    }

    #[test]
    fn test_status_thresholds_with_completion() {
        let s = statused(3, 7, 1, false, true);
        assert_eq!(s.status, ChoreStatus::Comfortable);
        assert_eq!(s.status_text, "Due in 2 days");

        let s = statused(3, 7, 5, false, true);
        assert_eq!(s.status, ChoreStatus::DueSoon);
        assert_eq!(s.status_text, "Due in 2 days");

        let s = statused(3, 7, 6, false, true);
        assert_eq!(s.status, ChoreStatus::DueSoon);
        assert_eq!(s.status_text, "Due in 1 day");

        let s = statused(3, 7, 7, false, true);
        assert_eq!(s.status, ChoreStatus::Overdue);
        assert_eq!(s.status_text, "Due today");

        let s = statused(3, 7, 8, false, true);
        assert_eq!(s.status, ChoreStatus::Overdue);
        assert_eq!(s.status_text, "1 day overdue");

        let s = statused(3, 7, 21, false, true);
        assert_eq!(s.status, ChoreStatus::SeverelyOverdue);
        assert_eq!(s.status_text, "14 days overdue");
    }

    #[test]
    fn test_days_until_overdue_independent_of_status() {
        for days in 0..25 {
            let s = statused(3, 7, days, false, true);
            assert_eq!(s.days_until_overdue, 7 - days);
        }
        // Holds for archived one-time chores too.
        let s = statused(0, 0, 10, true, true);
        assert_eq!(s.days_until_overdue, -10);
    }

    #[test]
    fn test_one_time_completed_is_archived_forever() {
        for days in [0, 1, 30, 365] {
            let s = statused(0, 0, days, true, true);
            assert_eq!(s.status, ChoreStatus::Comfortable, "day {days}");
            assert_eq!(s.status_text, "Completed");
            assert!(s.is_completed_one_time());
        }
    }

    #[test]
    fn test_calendar_day_boundary_convention() {
        let c = chore(3, 7, false);

        // One hour later but across midnight: one calendar day.
        let done = completion_at(at(2024, 6, 10, 23, 30));
        let s = compute_status(
            &c,
            Some(&done),
            at(2024, 6, 11, 0, 30),
            NeverDonePolicy::default(),
        );
        assert_eq!(s.days_since_last_done, 1);

        // 23 hours later but the same calendar day: zero days.
        let done = completion_at(at(2024, 6, 10, 0, 30));
        let s = compute_status(
            &c,
            Some(&done),
            at(2024, 6, 10, 23, 30),
            NeverDonePolicy::default(),
        );
        assert_eq!(s.days_since_last_done, 0);
    }

    #[test]
    fn test_future_dated_completion_stays_comfortable() {
        // A snoozed chore holds a completion dated in the future.
        let c = chore(3, 7, false);
        let done = completion_at(at(2024, 6, 20, 12, 0));
        let s = compute_status(
            &c,
            Some(&done),
            at(2024, 6, 15, 12, 0),
            NeverDonePolicy::default(),
        );
        assert_eq!(s.days_since_last_done, -5);
        assert_eq!(s.status, ChoreStatus::Comfortable);
    }

    #[test]
    fn test_compute_status_is_deterministic() {
        let c = chore(3, 7, false);
        let done = completion_at(at(2024, 6, 5, 9, 0));
        let now = at(2024, 6, 12, 9, 0);
        let a = compute_status(&c, Some(&done), now, NeverDonePolicy::default());
        let b = compute_status(&c, Some(&done), now, NeverDonePolicy::default());
        assert_eq!(a.status, b.status);
        assert_eq!(a.status_text, b.status_text);
        assert_eq!(a.days_since_last_done, b.days_since_last_done);
        assert_eq!(a.days_until_overdue, b.days_until_overdue);
    }

    #[test]
    fn test_status_monotonic_in_now() {
        fn rank(s: ChoreStatus) -> u8 {
            match s {
                ChoreStatus::Comfortable => 0,
                ChoreStatus::DueSoon => 1,
                ChoreStatus::Overdue => 2,
                ChoreStatus::SeverelyOverdue => 3,
                ChoreStatus::NeverDone => 0,
            }
        }
        let c = chore(3, 7, false);
        let done = completion_at(at(2024, 6, 1, 12, 0));
        let mut prev_rank = 0;
        let mut prev_days = i64::MIN;
        for days in 0..40 {
            let now = at(2024, 6, 1, 12, 0) + chrono::Duration::days(days);
            let s = compute_status(&c, Some(&done), now, NeverDonePolicy::default());
            assert!(s.days_since_last_done >= prev_days);
            assert!(rank(s.status) >= prev_rank, "regressed at day {days}");
            prev_rank = rank(s.status);
            prev_days = s.days_since_last_done;
        }
    }

    #[test]
    fn test_sort_most_urgent_first() {
        let mut items = vec![
            statused(3, 7, 1, false, true),  // until = 6
            statused(3, 7, 21, false, true), // until = -14
            statused(3, 7, 7, false, true),  // until = 0
        ];
        items[0].chore.id = "a".to_string();
        items[1].chore.id = "b".to_string();
        items[2].chore.id = "c".to_string();

        let sorted = sort_by_priority(items);
        let ids: Vec<&str> = sorted.iter().map(|c| c.chore.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);

        let untils: Vec<i64> = sorted.iter().map(|c| c.days_until_overdue).collect();
        assert!(untils.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_sort_demotes_completed_one_time_to_suffix() {
        let mut done_once = statused(0, 0, 2, true, true); // until = -2, but archived
        done_once.chore.id = "archived".to_string();
        let mut urgent = statused(3, 7, 30, false, true);
        urgent.chore.id = "urgent".to_string();
        let mut fresh = statused(3, 7, 0, false, true);
        fresh.chore.id = "fresh".to_string();

        let sorted = sort_by_priority(vec![done_once, urgent, fresh]);
        let ids: Vec<&str> = sorted.iter().map(|c| c.chore.id.as_str()).collect();
        assert_eq!(ids, vec!["urgent", "fresh", "archived"]);

        // Archived chores form a contiguous suffix.
        let first_archived = sorted
            .iter()
            .position(ChoreWithStatus::is_completed_one_time)
            .unwrap();
        assert!(
            sorted[first_archived..]
                .iter()
                .all(ChoreWithStatus::is_completed_one_time)
        );
    }

    #[test]
    fn test_sort_stable_on_ties() {
        let mut first = statused(3, 7, 5, false, true);
        first.chore.id = "first".to_string();
        let mut second = statused(3, 7, 5, false, true);
        second.chore.id = "second".to_string();

        let sorted = sort_by_priority(vec![first, second]);
        assert_eq!(sorted[0].chore.id, "first");
        assert_eq!(sorted[1].chore.id, "second");
    }

    #[test]
    fn test_build_board_groups_and_orders_columns() {
        let category = |id: &str, name: &str, order: Option<i64>| Category {
            id: id.to_string(),
            name: name.to_string(),
            order,
        };
        let categories = vec![
            category("cat-b", "Bathroom", None),
            category("cat-k", "Kitchen", Some(0)),
            category("cat-g", "Garden", Some(1)),
        ];

        let mut kitchen = statused(3, 7, 10, false, true);
        kitchen.chore.category = "Kitchen".to_string();
        kitchen.chore.name = "Dishes".to_string();
        let mut uncategorized = statused(3, 7, 5, false, true);
        uncategorized.chore.category = String::new();
        uncategorized.chore.name = "Mail".to_string();
        let mut orphan = statused(3, 7, 1, false, true);
        orphan.chore.category = "Attic".to_string();
        orphan.chore.name = "Dust boxes".to_string();

        let board = build_board(vec![kitchen, uncategorized, orphan], &categories);
        let names: Vec<&str> = board.columns.iter().map(|c| c.category.as_str()).collect();
        // Ordered categories first, unordered by name, then ad hoc columns.
        assert_eq!(
            names,
            vec!["Kitchen", "Garden", "Bathroom", "Uncategorized", "Attic"]
        );

        assert_eq!(board.columns[0].chores[0].chore.name, "Dishes");
        // Known categories keep their column even when empty.
        assert!(board.columns[1].chores.is_empty());
        assert_eq!(board.columns[3].chores[0].chore.name, "Mail");
        assert_eq!(board.columns[4].chores[0].chore.name, "Dust boxes");
    }

    #[test]
    fn test_due_summary_counts_and_order() {
        let mut overdue = statused(3, 7, 10, false, true);
        overdue.chore.name = "Bathroom".to_string();
        let mut soon = statused(3, 7, 5, false, true);
        soon.chore.name = "Vacuum".to_string();
        let mut fine = statused(3, 7, 1, false, true);
        fine.chore.name = "Windows".to_string();
        let mut archived = statused(0, 0, 50, true, true);
        archived.chore.name = "Assemble shelf".to_string();

        let sorted = sort_by_priority(vec![overdue, soon, fine, archived]);
        let summary = due_summary(&sorted);
        assert_eq!(summary.due, vec!["Bathroom", "Vacuum"]);
        assert_eq!(summary.overdue, vec!["Bathroom"]);
    }
}
