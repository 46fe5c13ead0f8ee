//! Non-persistent dataset served in degraded mode, so the board stays
//! usable when the hosted service cannot be reached. Rows carry
//! `placeholder-` ids so nothing here can be mistaken for persisted data.

use crate::auth::UserId;
use crate::categories::Category;
use crate::todos::Todo;

pub fn placeholder_categories(owner: &UserId) -> Vec<Category> {
    let category = |id: &str, name: &str, color: &str, order: i32| Category {
        id: id.into(),
        name: name.into(),
        color: color.into(),
        order,
        owner: owner.clone(),
    };
    vec![
        category("placeholder-cat-1", "Work", "#3B82F6", 0),
        category("placeholder-cat-2", "Personal", "#10B981", 1),
        category("placeholder-cat-3", "Shopping", "#F59E0B", 2),
    ]
}

pub fn placeholder_todos(owner: &UserId) -> Vec<Todo> {
    let todo = |id: &str, title: &str, completed: bool, category: &str, order: i32| Todo {
        id: id.into(),
        title: title.into(),
        completed,
        category: Some(category.into()),
        order,
        owner: owner.clone(),
    };
    vec![
        todo("placeholder-todo-1", "Complete project proposal", false, "placeholder-cat-1", 0),
        todo("placeholder-todo-2", "Schedule team meeting", true, "placeholder-cat-1", 1),
        todo("placeholder-todo-3", "Go for a run", false, "placeholder-cat-2", 0),
        todo("placeholder-todo-4", "Buy groceries", false, "placeholder-cat-3", 0),
    ]
}

/// One sample todo per real category, used when categories loaded but the
/// todo fetch failed.
pub fn sample_todos_for(categories: &[Category]) -> Vec<Todo> {
    categories
        .iter()
        .enumerate()
        .map(|(index, category)| Todo {
            id: format!("placeholder-todo-{index}"),
            title: format!("Sample task for {}", category.name),
            completed: false,
            category: Some(category.id.clone()),
            order: 0,
            owner: category.owner.clone(),
        })
        .collect()
}
