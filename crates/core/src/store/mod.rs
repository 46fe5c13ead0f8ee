//! Authoritative in-memory cache + CRUD façade over the remote backend,
//! scoped to one authenticated user.
//!
//! Mutations persist remotely first and touch the cache only on success,
//! except reorders, which apply the computed update set optimistically
//! before the remote confirms so the board responds to the drop instantly.
//! A reorder persists the moved row and the sibling shifts as two remote
//! calls with no transaction between them; a failure in between leaves
//! inconsistent ranks until the sync bridge's next wholesale refresh.

pub mod placeholder;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use log::{error, warn};
use uuid::Uuid;

use crate::auth::{AuthSession, UserId};
use crate::backend::memory::InMemoryFallbackBackend;
use crate::backend::DataBackend;
use crate::categories::{Category, CategoryUpdate, DEFAULT_CATEGORY_COLOR, DEFAULT_CATEGORY_NAME};
use crate::errors::{Result, StoreError};
use crate::ordering::{
    append_position, close_category_gap, close_todo_gap, compute_category_move, compute_todo_move,
    CategoryPosition, MoveIntent, TargetPosition, TodoPosition,
};
use crate::todos::{Todo, TodoUpdate};

pub struct TaskStore {
    backend: RwLock<Arc<dyn DataBackend>>,
    owner: UserId,
    categories: RwLock<Vec<Category>>,
    todos: RwLock<Vec<Todo>>,
    degraded: AtomicBool,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("owner", &self.owner)
            .field("categories", &self.categories)
            .field("todos", &self.todos)
            .field("degraded", &self.degraded)
            .finish_non_exhaustive()
    }
}

impl TaskStore {
    pub fn new(backend: Arc<dyn DataBackend>, owner: UserId) -> Self {
        Self {
            backend: RwLock::new(backend),
            owner,
            categories: RwLock::new(Vec::new()),
            todos: RwLock::new(Vec::new()),
            degraded: AtomicBool::new(false),
        }
    }

    /// Build a store for the currently authenticated user.
    pub fn for_session(session: &dyn AuthSession, backend: Arc<dyn DataBackend>) -> Result<Self> {
        let owner = session
            .current_user()
            .ok_or_else(|| StoreError::validation("no authenticated user"))?;
        Ok(Self::new(backend, owner))
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    /// True when the store serves the non-persistent placeholder dataset.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    fn backend(&self) -> Arc<dyn DataBackend> {
        Arc::clone(&self.backend.read().unwrap())
    }

    /// Swap in an in-memory backend seeded with `categories`/`todos` so the
    /// board keeps working locally. Nothing written from here on persists.
    fn enter_degraded(&self, categories: Vec<Category>, todos: Vec<Todo>) {
        let fallback = InMemoryFallbackBackend::with_dataset(categories.clone(), todos.clone());
        *self.backend.write().unwrap() = Arc::new(fallback);
        self.replace_categories(categories);
        self.replace_todos(todos);
        self.degraded.store(true, Ordering::SeqCst);
    }

    /// Initial load: categories then todos, each ascending by rank. A user
    /// with no categories gets the `Default` one created for them. Fetch
    /// failures degrade to the placeholder dataset instead of blocking.
    pub async fn load(&self) -> Result<()> {
        let backend = self.backend();

        let mut categories = match backend.list_categories(&self.owner).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!("initial category fetch failed, entering degraded mode: {err}");
                self.enter_degraded(
                    placeholder::placeholder_categories(&self.owner),
                    placeholder::placeholder_todos(&self.owner),
                );
                return Ok(());
            }
        };

        if categories.is_empty() {
            let default = Category {
                id: Uuid::new_v4().to_string(),
                name: DEFAULT_CATEGORY_NAME.to_string(),
                color: DEFAULT_CATEGORY_COLOR.to_string(),
                order: 0,
                owner: self.owner.clone(),
            };
            match backend.insert_category(default).await {
                Ok(created) => categories.push(created),
                Err(err) => {
                    warn!("default category bootstrap failed, entering degraded mode: {err}");
                    self.enter_degraded(
                        placeholder::placeholder_categories(&self.owner),
                        placeholder::placeholder_todos(&self.owner),
                    );
                    return Ok(());
                }
            }
        }
        self.replace_categories(categories.clone());

        match backend.list_todos(&self.owner).await {
            Ok(rows) => self.replace_todos(rows),
            Err(err) => {
                warn!("initial todo fetch failed, entering degraded mode: {err}");
                let samples = placeholder::sample_todos_for(&categories);
                self.enter_degraded(categories, samples);
            }
        }
        Ok(())
    }

    pub async fn create_category(&self, name: &str, color: &str) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::validation("category name must not be empty"));
        }

        let order = self
            .categories
            .read()
            .unwrap()
            .iter()
            .map(|category| category.order)
            .max()
            .map_or(0, |max| max + 1);
        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            color: color.to_string(),
            order,
            owner: self.owner.clone(),
        };

        let created = self.backend().insert_category(category).await?;
        self.categories.write().unwrap().push(created.clone());
        Ok(created)
    }

    /// Create a todo in `category`, or in the user's first category when
    /// none is given. Appends to the end of the target bucket.
    pub async fn create_todo(&self, title: &str, category: Option<String>) -> Result<Todo> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::validation("todo title must not be empty"));
        }

        let category = category.or_else(|| {
            let categories = self.categories.read().unwrap();
            categories
                .iter()
                .min_by_key(|category| category.order)
                .map(|category| category.id.clone())
        });
        let order = append_position(&self.todos.read().unwrap(), category.as_deref());
        let todo = Todo {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            completed: false,
            category,
            order,
            owner: self.owner.clone(),
        };

        let created = self.backend().insert_todo(todo).await?;
        self.todos.write().unwrap().push(created.clone());
        Ok(created)
    }

    /// Persist a partial update and adopt the server's echo of the row.
    pub async fn update_category(&self, id: &str, delta: CategoryUpdate) -> Result<Category> {
        match self.backend().update_category(id, delta).await {
            Ok(updated) => {
                let mut categories = self.categories.write().unwrap();
                if let Some(row) = categories.iter_mut().find(|category| category.id == id) {
                    *row = updated.clone();
                }
                Ok(updated)
            }
            Err(err) if err.is_not_found() => {
                // The row vanished remotely; resync before surfacing.
                if let Err(refresh_err) = self.refresh_categories().await {
                    warn!("category refresh after not-found failed: {refresh_err}");
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn update_todo(&self, id: &str, delta: TodoUpdate) -> Result<Todo> {
        match self.backend().update_todo(id, delta).await {
            Ok(updated) => {
                let mut todos = self.todos.write().unwrap();
                if let Some(row) = todos.iter_mut().find(|todo| todo.id == id) {
                    *row = updated.clone();
                }
                Ok(updated)
            }
            Err(err) if err.is_not_found() => {
                if let Err(refresh_err) = self.refresh_todos().await {
                    warn!("todo refresh after not-found failed: {refresh_err}");
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Delete a category and every todo referencing it. The todos go first;
    /// if that call fails the category is left untouched remotely and in
    /// the cache, so no orphaned references can survive.
    pub async fn delete_category(&self, id: &str) -> Result<()> {
        let removed_order = self
            .categories
            .read()
            .unwrap()
            .iter()
            .find(|category| category.id == id)
            .map(|category| category.order)
            .ok_or_else(|| StoreError::not_found(format!("category {id}")))?;

        let backend = self.backend();
        backend.delete_todos_in_category(&self.owner, id).await?;
        backend.delete_category(id).await?;

        self.todos
            .write()
            .unwrap()
            .retain(|todo| todo.category.as_deref() != Some(id));
        self.categories
            .write()
            .unwrap()
            .retain(|category| category.id != id);

        let shifts = close_category_gap(&self.categories.read().unwrap(), removed_order);
        if !shifts.is_empty() {
            if let Err(err) = backend.shift_category_positions(&self.owner, &shifts).await {
                // Recoverable: ranks converge on the next sync refresh.
                error!("category gap-close after delete failed: {err}");
            }
            self.apply_category_positions(&shifts);
        }
        Ok(())
    }

    pub async fn delete_todo(&self, id: &str) -> Result<()> {
        let (bucket, removed_order) = {
            let todos = self.todos.read().unwrap();
            let todo = todos
                .iter()
                .find(|todo| todo.id == id)
                .ok_or_else(|| StoreError::not_found(format!("todo {id}")))?;
            (todo.category.clone(), todo.order)
        };

        let backend = self.backend();
        backend.delete_todo(id).await?;
        self.todos.write().unwrap().retain(|todo| todo.id != id);

        let shifts = close_todo_gap(&self.todos.read().unwrap(), bucket.as_deref(), removed_order);
        if !shifts.is_empty() {
            if let Err(err) = backend.shift_todo_positions(&self.owner, &shifts).await {
                error!("todo gap-close after delete failed: {err}");
            }
            self.apply_todo_positions(&shifts);
        }
        Ok(())
    }

    /// Move a category to `target_index` in the display sequence.
    ///
    /// The cache takes the full computed update set immediately; the moved
    /// row is persisted first, then the sibling shifts as one batch call.
    pub async fn reorder_category(&self, id: &str, target_index: usize) -> Result<()> {
        let updates = compute_category_move(&self.categories.read().unwrap(), id, target_index);
        if updates.is_empty() {
            return Ok(());
        }
        self.apply_category_positions(&updates);

        let (moved, siblings): (Vec<CategoryPosition>, Vec<CategoryPosition>) =
            updates.into_iter().partition(|update| update.id == id);
        let backend = self.backend();
        if let Some(moved) = moved.first() {
            backend
                .update_category(id, CategoryUpdate::position(moved.order))
                .await?;
        }
        backend.shift_category_positions(&self.owner, &siblings).await
    }

    /// Apply a drag-initiated todo move, within or across buckets.
    pub async fn move_todo(&self, intent: MoveIntent) -> Result<()> {
        let (updates, target_order) = {
            let todos = self.todos.read().unwrap();
            if !todos.iter().any(|todo| todo.id == intent.todo_id) {
                return Err(StoreError::not_found(format!("todo {}", intent.todo_id)));
            }
            let target_order = match intent.target_position {
                TargetPosition::At(order) => order,
                TargetPosition::End => {
                    // Append after the bucket's last row, not counting the
                    // row being moved into it.
                    let others: Vec<Todo> = todos
                        .iter()
                        .filter(|todo| todo.id != intent.todo_id)
                        .cloned()
                        .collect();
                    append_position(&others, intent.target_category.as_deref())
                }
            };
            let updates = compute_todo_move(
                &todos,
                &intent.todo_id,
                intent.target_category.as_deref(),
                target_order,
            );
            (updates, target_order)
        };
        if updates.is_empty() {
            return Ok(());
        }
        self.apply_todo_positions(&updates);

        let (_, siblings): (Vec<TodoPosition>, Vec<TodoPosition>) = updates
            .into_iter()
            .partition(|update| update.id == intent.todo_id);
        let backend = self.backend();
        backend
            .update_todo(
                &intent.todo_id,
                TodoUpdate::relocate(intent.target_category, target_order),
            )
            .await?;
        backend.shift_todo_positions(&self.owner, &siblings).await
    }

    /// Todos in one bucket, ascending by rank. Duplicate ids must never
    /// reach the cache, but the read guards anyway and keeps only the
    /// first occurrence.
    pub fn todos_by_category(&self, category: Option<&str>) -> Vec<Todo> {
        let mut rows: Vec<Todo> = self
            .todos
            .read()
            .unwrap()
            .iter()
            .filter(|todo| todo.category.as_deref() == category)
            .cloned()
            .collect();
        rows.sort_by_key(|todo| todo.order);

        let mut seen = HashSet::new();
        rows.retain(|todo| seen.insert(todo.id.clone()));
        rows
    }

    pub fn uncategorized_todos(&self) -> Vec<Todo> {
        self.todos_by_category(None)
    }

    pub fn categories(&self) -> Vec<Category> {
        let mut rows = self.categories.read().unwrap().clone();
        rows.sort_by_key(|category| category.order);
        rows
    }

    /// Re-fetch the category collection and replace the cache wholesale.
    pub async fn refresh_categories(&self) -> Result<()> {
        let rows = self.backend().list_categories(&self.owner).await?;
        self.replace_categories(rows);
        Ok(())
    }

    /// Re-fetch the todo collection and replace the cache wholesale.
    pub async fn refresh_todos(&self) -> Result<()> {
        let rows = self.backend().list_todos(&self.owner).await?;
        self.replace_todos(rows);
        Ok(())
    }

    pub fn replace_categories(&self, mut rows: Vec<Category>) {
        rows.sort_by_key(|category| category.order);
        *self.categories.write().unwrap() = rows;
    }

    pub fn replace_todos(&self, mut rows: Vec<Todo>) {
        rows.sort_by_key(|todo| todo.order);
        *self.todos.write().unwrap() = rows;
    }

    fn apply_category_positions(&self, updates: &[CategoryPosition]) {
        let mut categories = self.categories.write().unwrap();
        for update in updates {
            if let Some(row) = categories.iter_mut().find(|c| c.id == update.id) {
                row.order = update.order;
            }
        }
    }

    fn apply_todo_positions(&self, updates: &[TodoPosition]) {
        let mut todos = self.todos.write().unwrap();
        for update in updates {
            if let Some(row) = todos.iter_mut().find(|t| t.id == update.id) {
                row.category = update.category.clone();
                row.order = update.order;
            }
        }
    }
}
