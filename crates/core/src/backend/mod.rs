//! Data-access capability consumed by the entity store.
//!
//! The hosted service is the system of record; everything this crate needs
//! from it fits behind [`DataBackend`]. Two implementations exist: the
//! reqwest-based remote client (in the `taskflow-backend-remote` crate) and
//! the [`memory::InMemoryFallbackBackend`] used by degraded mode and tests.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::UserId;
use crate::categories::{Category, CategoryUpdate};
use crate::errors::Result;
use crate::ordering::{CategoryPosition, TodoPosition};
use crate::todos::{Todo, TodoUpdate};

/// Collections that emit change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Categories,
    Todos,
}

/// Kind of remote mutation observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

/// One remote change notification. `entity_id` is best-effort; poll-based
/// backends cannot attribute a change to a specific row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub action: ChangeAction,
    pub entity_id: Option<String>,
}

/// Callback receiving change notifications for one subscription.
pub type ChangeSink = Box<dyn Fn(ChangeEvent) + Send + Sync>;

/// Active subscription. Unsubscribing stops future notifications only;
/// a notification already in flight still lands.
pub trait SubscriptionHandle: Send {
    fn unsubscribe(self: Box<Self>);
}

/// CRUD + subscribe surface over the two hosted collections, scoped to one
/// owner per call. Inserts echo the stored row back so callers can adopt the
/// authoritative version; updates do the same and fail with
/// [`crate::StoreError::NotFound`] when the row vanished.
#[async_trait]
pub trait DataBackend: Send + Sync {
    async fn list_categories(&self, owner: &UserId) -> Result<Vec<Category>>;

    async fn insert_category(&self, category: Category) -> Result<Category>;

    async fn update_category(&self, id: &str, delta: CategoryUpdate) -> Result<Category>;

    async fn delete_category(&self, id: &str) -> Result<()>;

    async fn list_todos(&self, owner: &UserId) -> Result<Vec<Todo>>;

    async fn insert_todo(&self, todo: Todo) -> Result<Todo>;

    async fn update_todo(&self, id: &str, delta: TodoUpdate) -> Result<Todo>;

    async fn delete_todo(&self, id: &str) -> Result<()>;

    /// Bulk delete used by category cascades.
    async fn delete_todos_in_category(&self, owner: &UserId, category_id: &str) -> Result<()>;

    /// Apply a batch of category rank rewrites as one logical operation.
    async fn shift_category_positions(
        &self,
        owner: &UserId,
        updates: &[CategoryPosition],
    ) -> Result<()>;

    /// Apply a batch of todo (bucket, rank) rewrites as one logical operation.
    async fn shift_todo_positions(&self, owner: &UserId, updates: &[TodoPosition]) -> Result<()>;

    /// Register for change notifications on `table`, filtered to `owner`.
    fn subscribe(
        &self,
        owner: &UserId,
        table: ChangeTable,
        sink: ChangeSink,
    ) -> Box<dyn SubscriptionHandle>;
}
