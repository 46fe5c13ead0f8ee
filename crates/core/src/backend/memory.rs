//! In-memory [`DataBackend`] used when the hosted service is unreachable,
//! and as the test double. Rows live in plain vectors; subscriptions are a
//! listener registry notified synchronously after each mutation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use crate::auth::UserId;
use crate::backend::{
    ChangeAction, ChangeEvent, ChangeSink, ChangeTable, DataBackend, SubscriptionHandle,
};
use crate::categories::{Category, CategoryUpdate};
use crate::errors::{Result, StoreError};
use crate::ordering::{CategoryPosition, TodoPosition};
use crate::todos::{Todo, TodoUpdate};

struct Listener {
    owner: UserId,
    table: ChangeTable,
    sink: ChangeSink,
}

type ListenerMap = Arc<Mutex<HashMap<u64, Listener>>>;

pub struct InMemoryFallbackBackend {
    categories: RwLock<Vec<Category>>,
    todos: RwLock<Vec<Todo>>,
    listeners: ListenerMap,
    next_listener: AtomicU64,
}

impl Default for InMemoryFallbackBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFallbackBackend {
    pub fn new() -> Self {
        Self {
            categories: RwLock::new(Vec::new()),
            todos: RwLock::new(Vec::new()),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Backend pre-seeded with a dataset, used by degraded mode.
    pub fn with_dataset(categories: Vec<Category>, todos: Vec<Todo>) -> Self {
        let backend = Self::new();
        *backend.categories.write().unwrap() = categories;
        *backend.todos.write().unwrap() = todos;
        backend
    }

    fn notify(&self, owner: &UserId, event: ChangeEvent) {
        let listeners = self.listeners.lock().unwrap();
        for listener in listeners.values() {
            if listener.table == event.table && listener.owner == *owner {
                (listener.sink)(event.clone());
            }
        }
    }
}

struct MemorySubscription {
    id: u64,
    listeners: ListenerMap,
}

impl SubscriptionHandle for MemorySubscription {
    fn unsubscribe(self: Box<Self>) {
        self.listeners.lock().unwrap().remove(&self.id);
    }
}

#[async_trait]
impl DataBackend for InMemoryFallbackBackend {
    async fn list_categories(&self, owner: &UserId) -> Result<Vec<Category>> {
        let mut rows: Vec<Category> = self
            .categories
            .read()
            .unwrap()
            .iter()
            .filter(|category| category.owner == *owner)
            .cloned()
            .collect();
        rows.sort_by_key(|category| category.order);
        Ok(rows)
    }

    async fn insert_category(&self, category: Category) -> Result<Category> {
        let owner = category.owner.clone();
        let id = category.id.clone();
        self.categories.write().unwrap().push(category.clone());
        self.notify(
            &owner,
            ChangeEvent {
                table: ChangeTable::Categories,
                action: ChangeAction::Insert,
                entity_id: Some(id),
            },
        );
        Ok(category)
    }

    async fn update_category(&self, id: &str, delta: CategoryUpdate) -> Result<Category> {
        let updated = {
            let mut rows = self.categories.write().unwrap();
            let row = rows
                .iter_mut()
                .find(|category| category.id == id)
                .ok_or_else(|| StoreError::not_found(format!("category {id}")))?;
            delta.apply_to(row);
            row.clone()
        };
        self.notify(
            &updated.owner,
            ChangeEvent {
                table: ChangeTable::Categories,
                action: ChangeAction::Update,
                entity_id: Some(id.to_string()),
            },
        );
        Ok(updated)
    }

    async fn delete_category(&self, id: &str) -> Result<()> {
        let removed = {
            let mut rows = self.categories.write().unwrap();
            let index = rows.iter().position(|category| category.id == id);
            index.map(|index| rows.remove(index))
        };
        if let Some(category) = removed {
            self.notify(
                &category.owner,
                ChangeEvent {
                    table: ChangeTable::Categories,
                    action: ChangeAction::Delete,
                    entity_id: Some(id.to_string()),
                },
            );
        }
        Ok(())
    }

    async fn list_todos(&self, owner: &UserId) -> Result<Vec<Todo>> {
        let mut rows: Vec<Todo> = self
            .todos
            .read()
            .unwrap()
            .iter()
            .filter(|todo| todo.owner == *owner)
            .cloned()
            .collect();
        rows.sort_by_key(|todo| todo.order);
        Ok(rows)
    }

    async fn insert_todo(&self, todo: Todo) -> Result<Todo> {
        let owner = todo.owner.clone();
        let id = todo.id.clone();
        self.todos.write().unwrap().push(todo.clone());
        self.notify(
            &owner,
            ChangeEvent {
                table: ChangeTable::Todos,
                action: ChangeAction::Insert,
                entity_id: Some(id),
            },
        );
        Ok(todo)
    }

    async fn update_todo(&self, id: &str, delta: TodoUpdate) -> Result<Todo> {
        let updated = {
            let mut rows = self.todos.write().unwrap();
            let row = rows
                .iter_mut()
                .find(|todo| todo.id == id)
                .ok_or_else(|| StoreError::not_found(format!("todo {id}")))?;
            delta.apply_to(row);
            row.clone()
        };
        self.notify(
            &updated.owner,
            ChangeEvent {
                table: ChangeTable::Todos,
                action: ChangeAction::Update,
                entity_id: Some(id.to_string()),
            },
        );
        Ok(updated)
    }

    async fn delete_todo(&self, id: &str) -> Result<()> {
        let removed = {
            let mut rows = self.todos.write().unwrap();
            let index = rows.iter().position(|todo| todo.id == id);
            index.map(|index| rows.remove(index))
        };
        if let Some(todo) = removed {
            self.notify(
                &todo.owner,
                ChangeEvent {
                    table: ChangeTable::Todos,
                    action: ChangeAction::Delete,
                    entity_id: Some(id.to_string()),
                },
            );
        }
        Ok(())
    }

    async fn delete_todos_in_category(&self, owner: &UserId, category_id: &str) -> Result<()> {
        let removed_any = {
            let mut rows = self.todos.write().unwrap();
            let before = rows.len();
            rows.retain(|todo| {
                !(todo.owner == *owner && todo.category.as_deref() == Some(category_id))
            });
            rows.len() != before
        };
        if removed_any {
            self.notify(
                owner,
                ChangeEvent {
                    table: ChangeTable::Todos,
                    action: ChangeAction::Delete,
                    entity_id: None,
                },
            );
        }
        Ok(())
    }

    async fn shift_category_positions(
        &self,
        owner: &UserId,
        updates: &[CategoryPosition],
    ) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        {
            let mut rows = self.categories.write().unwrap();
            for update in updates {
                if let Some(row) = rows.iter_mut().find(|category| category.id == update.id) {
                    row.order = update.order;
                }
            }
        }
        self.notify(
            owner,
            ChangeEvent {
                table: ChangeTable::Categories,
                action: ChangeAction::Update,
                entity_id: None,
            },
        );
        Ok(())
    }

    async fn shift_todo_positions(&self, owner: &UserId, updates: &[TodoPosition]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        {
            let mut rows = self.todos.write().unwrap();
            for update in updates {
                if let Some(row) = rows.iter_mut().find(|todo| todo.id == update.id) {
                    row.category = update.category.clone();
                    row.order = update.order;
                }
            }
        }
        self.notify(
            owner,
            ChangeEvent {
                table: ChangeTable::Todos,
                action: ChangeAction::Update,
                entity_id: None,
            },
        );
        Ok(())
    }

    fn subscribe(
        &self,
        owner: &UserId,
        table: ChangeTable,
        sink: ChangeSink,
    ) -> Box<dyn SubscriptionHandle> {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().unwrap().insert(
            id,
            Listener {
                owner: owner.clone(),
                table,
                sink,
            },
        );
        Box::new(MemorySubscription {
            id,
            listeners: Arc::clone(&self.listeners),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn owner() -> UserId {
        UserId::new("user-1")
    }

    fn sample_category(id: &str, order: i32) -> Category {
        Category {
            id: id.into(),
            name: format!("category {id}"),
            color: "#3B82F6".into(),
            order,
            owner: owner(),
        }
    }

    #[tokio::test]
    async fn listing_is_scoped_to_owner_and_sorted() {
        let backend = InMemoryFallbackBackend::new();
        backend.insert_category(sample_category("b", 1)).await.unwrap();
        backend.insert_category(sample_category("a", 0)).await.unwrap();
        backend
            .insert_category(Category {
                owner: UserId::new("someone-else"),
                ..sample_category("x", 0)
            })
            .await
            .unwrap();

        let rows = backend.list_categories(&owner()).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let backend = InMemoryFallbackBackend::new();
        let err = backend
            .update_category("ghost", CategoryUpdate::rename("X"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn subscription_sees_matching_events_until_unsubscribed() {
        let backend = InMemoryFallbackBackend::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let handle = backend.subscribe(
            &owner(),
            ChangeTable::Categories,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        backend.insert_category(sample_category("a", 0)).await.unwrap();
        // Other table and other owner must not reach the sink.
        backend
            .insert_todo(Todo {
                id: "t".into(),
                title: "task".into(),
                completed: false,
                category: None,
                order: 0,
                owner: owner(),
            })
            .await
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        handle.unsubscribe();
        backend.insert_category(sample_category("b", 1)).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
