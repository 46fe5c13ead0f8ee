//! Category domain model.

use serde::{Deserialize, Serialize};

use crate::auth::UserId;

/// Color assigned to the bootstrap `Default` category.
pub const DEFAULT_CATEGORY_COLOR: &str = "#3B82F6";

/// Name of the category created for users who have none yet.
pub const DEFAULT_CATEGORY_NAME: &str = "Default";

/// A user-defined task column. `order` is a dense rank unique per owner,
/// defining the left-to-right display sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
    pub order: i32,
    pub owner: UserId,
}

/// Partial update persisted as a delta; only set fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl CategoryUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn recolor(color: impl Into<String>) -> Self {
        Self {
            color: Some(color.into()),
            ..Self::default()
        }
    }

    pub fn position(order: i32) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }

    /// Apply the delta to an existing row, yielding the updated row.
    pub fn apply_to(&self, category: &mut Category) {
        if let Some(name) = &self.name {
            category.name = name.clone();
        }
        if let Some(color) = &self.color {
            category.color = color.clone();
        }
        if let Some(order) = self.order {
            category.order = order;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_serializes_only_set_fields() {
        let delta = CategoryUpdate::rename("Errands");
        let json = serde_json::to_value(&delta).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "Errands" }));
    }

    #[test]
    fn apply_to_leaves_unset_fields_alone() {
        let mut category = Category {
            id: "cat-1".into(),
            name: "Work".into(),
            color: "#3B82F6".into(),
            order: 0,
            owner: UserId::new("user-1"),
        };
        CategoryUpdate::position(2).apply_to(&mut category);
        assert_eq!(category.order, 2);
        assert_eq!(category.name, "Work");
    }
}
