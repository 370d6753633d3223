use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Display bucket for chores with an empty category field.
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chore {
    pub id: String,
    pub name: String,
    /// Empty string means uncategorized.
    #[serde(default)]
    pub category: String,
    pub min_days: i64,
    pub max_days: i64,
    pub is_one_time: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub id: String,
    pub chore_id: String,
    pub completed_at: DateTime<Utc>,
    pub completed_by: Vec<String>,
    pub collaborative: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub order: Option<i64>,
}

/// A known household member, as supplied by the identity collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewChore {
    pub name: String,
    pub category: String,
    pub min_days: i64,
    pub max_days: i64,
    pub is_one_time: bool,
    pub created_by: String,
}

/// Partial chore update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ChoreUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub min_days: Option<i64>,
    pub max_days: Option<i64>,
    pub order: Option<Option<i64>>,
}

impl ChoreUpdate {
    pub fn apply(&self, chore: &mut Chore) {
        if let Some(name) = &self.name {
            chore.name = name.clone();
        }
        if let Some(category) = &self.category {
            chore.category = category.clone();
        }
        if let Some(min_days) = self.min_days {
            chore.min_days = min_days;
        }
        if let Some(max_days) = self.max_days {
            chore.max_days = max_days;
        }
        if let Some(order) = self.order {
            chore.order = order;
        }
    }
}

/// Partial completion update. `completed_by`/`collaborative` exist for the
/// merge protocol only; the set grows by appending and never shrinks.
#[derive(Debug, Clone, Default)]
pub struct CompletionUpdate {
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Vec<String>>,
    pub collaborative: Option<bool>,
}

impl CompletionUpdate {
    pub fn apply(&self, completion: &mut Completion) {
        if let Some(completed_at) = self.completed_at {
            completion.completed_at = completed_at;
        }
        if let Some(completed_by) = &self.completed_by {
            completion.completed_by = completed_by.clone();
        }
        if let Some(collaborative) = self.collaborative {
            completion.collaborative = collaborative;
        }
    }
}

/// Partial category update.
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub order: Option<Option<i64>>,
}

impl CategoryUpdate {
    pub fn apply(&self, category: &mut Category) {
        if let Some(name) = &self.name {
            category.name = name.clone();
        }
        if let Some(order) = self.order {
            category.order = order;
        }
    }
}

/// Outcome of a category delete sweep. The sweep is best-effort: it keeps
/// going past individual failures and reports how many it hit.
#[derive(Debug, Clone, Default)]
pub struct CategoryDeleteSummary {
    pub chores_deleted: usize,
    pub completions_deleted: usize,
    pub failures: usize,
}

/// Validate and normalize a chore or category name: trimmed, non-empty.
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyName);
    }
    Ok(trimmed.to_string())
}

/// Validate a chore's recurrence window. Both bounds must be non-negative;
/// `min <= max` is required unless the chore is one-time (one-time chores
/// keep whatever frequency was entered, but status ignores it once done).
pub fn validate_day_range(min: i64, max: i64, is_one_time: bool) -> Result<()> {
    if min < 0 || max < 0 {
        return Err(Error::NegativeDays { min, max });
    }
    if !is_one_time && min > max {
        return Err(Error::InvalidDayRange { min, max });
    }
    Ok(())
}

/// The category a chore groups under for display.
pub fn display_category(chore: &Chore) -> &str {
    if chore.category.is_empty() {
        UNCATEGORIZED
    } else {
        &chore.category
    }
}

/// Resolve a completion's user ids to display names, in `completed_by`
/// order. Ids with no matching user fall back to the raw id.
pub fn completer_names(completion: &Completion, users: &[User]) -> Vec<String> {
    completion
        .completed_by
        .iter()
        .map(|id| {
            users
                .iter()
                .find(|u| &u.id == id)
                .map_or_else(|| id.clone(), |u| u.display_name.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chore_with_category(category: &str) -> Chore {
        Chore {
            id: "c1".to_string(),
            name: "Vacuum".to_string(),
            category: category.to_string(),
            min_days: 3,
            max_days: 7,
            is_one_time: false,
            created_at: Utc::now(),
            created_by: "user-a".to_string(),
            order: None,
        }
    }

    #[test]
    fn test_validate_name_trims() {
        assert_eq!(validate_name("  Dishes ").unwrap(), "Dishes");
    }

    #[test]
    fn test_validate_name_empty() {
        assert!(matches!(validate_name(""), Err(Error::EmptyName)));
        assert!(matches!(validate_name("   "), Err(Error::EmptyName)));
    }

    #[test]
    fn test_validate_day_range_ok() {
        assert!(validate_day_range(3, 7, false).is_ok());
        assert!(validate_day_range(0, 0, false).is_ok());
    }

    #[test]
    fn test_validate_day_range_inverted() {
        assert!(matches!(
            validate_day_range(7, 3, false),
            Err(Error::InvalidDayRange { min: 7, max: 3 })
        ));
    }

    #[test]
    fn test_validate_day_range_one_time_ignores_order() {
        // One-time chores keep whatever frequency was entered.
        assert!(validate_day_range(7, 3, true).is_ok());
    }

    #[test]
    fn test_validate_day_range_negative() {
        assert!(matches!(
            validate_day_range(-1, 7, false),
            Err(Error::NegativeDays { .. })
        ));
        assert!(matches!(
            validate_day_range(0, -2, true),
            Err(Error::NegativeDays { .. })
        ));
    }

    #[test]
    fn test_display_category_fallback() {
        assert_eq!(display_category(&chore_with_category("")), UNCATEGORIZED);
        assert_eq!(display_category(&chore_with_category("Kitchen")), "Kitchen");
    }

    #[test]
    fn test_completer_names_resolves_and_falls_back() {
        let users = vec![
            User {
                id: "user-a".to_string(),
                email: "a@example.com".to_string(),
                display_name: "Alice".to_string(),
                photo_url: None,
            },
            User {
                id: "user-b".to_string(),
                email: "b@example.com".to_string(),
                display_name: "Bob".to_string(),
                photo_url: None,
            },
        ];
        let completion = Completion {
            id: "comp1".to_string(),
            chore_id: "c1".to_string(),
            completed_at: Utc::now(),
            completed_by: vec![
                "user-b".to_string(),
                "user-a".to_string(),
                "user-gone".to_string(),
            ],
            collaborative: true,
        };
        assert_eq!(
            completer_names(&completion, &users),
            vec!["Bob", "Alice", "user-gone"]
        );
    }
}
