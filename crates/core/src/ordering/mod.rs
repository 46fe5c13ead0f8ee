//! Pure position arithmetic for drag-initiated moves.
//!
//! Categories carry one dense 0-based `order` sequence per owner; todos
//! carry one per (owner, category) bucket. Every function here computes the
//! minimal set of rows whose `order` must be rewritten so those sequences
//! stay gap-free after a move, without touching any state itself. Applying
//! the same move to its own post-state yields no further updates, which
//! bounds the damage when two drags race each other.

use serde::{Deserialize, Serialize};

use crate::categories::Category;
use crate::todos::Todo;

/// Where a dragged todo was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetPosition {
    /// Dropped onto another todo: take that todo's rank.
    At(i32),
    /// Dropped onto a category card: append after its last todo.
    End,
}

/// Discrete move event emitted by the drag layer. Gesture recognition and
/// drop-target resolution happen entirely outside this crate; by the time an
/// intent reaches the store it is already a plain value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveIntent {
    pub todo_id: String,
    pub target_category: Option<String>,
    pub target_position: TargetPosition,
}

/// New rank for one category row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPosition {
    pub id: String,
    pub order: i32,
}

/// New (bucket, rank) for one todo row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoPosition {
    pub id: String,
    pub category: Option<String>,
    pub order: i32,
}

/// Compute the rank rewrites needed to move `moving_id` to `target_index`.
///
/// Equivalent to removing the category from the sequence and reinserting it
/// at `target_index`: afterwards the ranks read exactly `0..n-1` in display
/// order. Only rows whose rank actually changes are returned; moving a
/// category onto its current index returns nothing. A `target_index` past
/// the end clamps to the last slot.
pub fn compute_category_move(
    categories: &[Category],
    moving_id: &str,
    target_index: usize,
) -> Vec<CategoryPosition> {
    let mut sequence: Vec<&Category> = categories.iter().collect();
    sequence.sort_by_key(|category| category.order);

    let Some(current_index) = sequence.iter().position(|c| c.id == moving_id) else {
        return Vec::new();
    };
    let target_index = target_index.min(sequence.len() - 1);
    if target_index == current_index {
        return Vec::new();
    }

    let moved = sequence.remove(current_index);
    sequence.insert(target_index, moved);

    sequence
        .iter()
        .enumerate()
        .filter(|(index, category)| category.order != *index as i32)
        .map(|(index, category)| CategoryPosition {
            id: category.id.clone(),
            order: index as i32,
        })
        .collect()
}

/// Compute the rewrites needed to move a todo to `target_order` in
/// `target_category` (which may be its current bucket).
///
/// Same bucket: the rows strictly between the old and new rank shift by one
/// towards the vacated slot. Across buckets: the old bucket closes the gap
/// above the vacated rank, the new bucket opens a slot at `target_order`,
/// and the moved todo takes `(target_category, target_order)`.
pub fn compute_todo_move(
    todos: &[Todo],
    todo_id: &str,
    target_category: Option<&str>,
    target_order: i32,
) -> Vec<TodoPosition> {
    let Some(moving) = todos.iter().find(|todo| todo.id == todo_id) else {
        return Vec::new();
    };
    let old_category = moving.category.as_deref();
    let old_order = moving.order;

    let mut updates = Vec::new();

    if old_category == target_category {
        if target_order == old_order {
            return Vec::new();
        }
        for todo in todos {
            if todo.id == todo_id || todo.category.as_deref() != target_category {
                continue;
            }
            if target_order < old_order && todo.order >= target_order && todo.order < old_order {
                updates.push(TodoPosition {
                    id: todo.id.clone(),
                    category: todo.category.clone(),
                    order: todo.order + 1,
                });
            } else if target_order > old_order
                && todo.order > old_order
                && todo.order <= target_order
            {
                updates.push(TodoPosition {
                    id: todo.id.clone(),
                    category: todo.category.clone(),
                    order: todo.order - 1,
                });
            }
        }
    } else {
        for todo in todos {
            if todo.id == todo_id {
                continue;
            }
            if todo.category.as_deref() == old_category && todo.order > old_order {
                // Close the gap left behind in the old bucket.
                updates.push(TodoPosition {
                    id: todo.id.clone(),
                    category: todo.category.clone(),
                    order: todo.order - 1,
                });
            } else if todo.category.as_deref() == target_category && todo.order >= target_order {
                // Open a slot in the new bucket.
                updates.push(TodoPosition {
                    id: todo.id.clone(),
                    category: todo.category.clone(),
                    order: todo.order + 1,
                });
            }
        }
    }

    updates.push(TodoPosition {
        id: moving.id.clone(),
        category: target_category.map(str::to_owned),
        order: target_order,
    });
    updates
}

/// Rank for appending to the end of a bucket: max+1, or 0 when empty.
pub fn append_position(todos: &[Todo], category: Option<&str>) -> i32 {
    todos
        .iter()
        .filter(|todo| todo.category.as_deref() == category)
        .map(|todo| todo.order)
        .max()
        .map_or(0, |max| max + 1)
}

/// Rewrites that close the gap after deleting a row at `removed_order` from
/// a bucket: every survivor ranked above it shifts down by one.
pub fn close_todo_gap(
    todos: &[Todo],
    category: Option<&str>,
    removed_order: i32,
) -> Vec<TodoPosition> {
    todos
        .iter()
        .filter(|todo| todo.category.as_deref() == category && todo.order > removed_order)
        .map(|todo| TodoPosition {
            id: todo.id.clone(),
            category: todo.category.clone(),
            order: todo.order - 1,
        })
        .collect()
}

/// Category counterpart of [`close_todo_gap`].
pub fn close_category_gap(categories: &[Category], removed_order: i32) -> Vec<CategoryPosition> {
    categories
        .iter()
        .filter(|category| category.order > removed_order)
        .map(|category| CategoryPosition {
            id: category.id.clone(),
            order: category.order - 1,
        })
        .collect()
}
