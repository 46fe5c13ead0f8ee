//! Todo domain model.

use serde::{Deserialize, Serialize};

use crate::auth::UserId;

/// A single task. `order` is a dense rank unique per (owner, category)
/// bucket; the uncategorized bucket (`category == None`) has its own
/// independent 0-based sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub category: Option<String>,
    pub order: i32,
    pub owner: UserId,
}

/// Partial update persisted as a delta; only set fields are written.
///
/// `category` is doubly optional: `None` leaves the reference untouched,
/// `Some(None)` explicitly moves the todo to the uncategorized bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl TodoUpdate {
    pub fn retitle(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn set_completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn relocate(category: Option<String>, order: i32) -> Self {
        Self {
            category: Some(category),
            order: Some(order),
            ..Self::default()
        }
    }

    /// Apply the delta to an existing row, yielding the updated row.
    pub fn apply_to(&self, todo: &mut Todo) {
        if let Some(title) = &self.title {
            todo.title = title.clone();
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
        if let Some(category) = &self.category {
            todo.category = category.clone();
        }
        if let Some(order) = self.order {
            todo.order = order;
        }
    }
}
