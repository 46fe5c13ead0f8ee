//! End-to-end store behavior against the in-memory backend: rank density
//! under mixed operations, cascade deletes, drag moves, and degraded mode.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use taskflow_core::auth::UserId;
use taskflow_core::backend::memory::InMemoryFallbackBackend;
use taskflow_core::backend::{ChangeSink, ChangeTable, DataBackend, SubscriptionHandle};
use taskflow_core::categories::{Category, CategoryUpdate};
use taskflow_core::ordering::{CategoryPosition, MoveIntent, TargetPosition, TodoPosition};
use taskflow_core::store::TaskStore;
use taskflow_core::todos::{Todo, TodoUpdate};
use taskflow_core::{Result, StoreError};

fn owner() -> UserId {
    UserId::new("user-1")
}

fn fresh_store() -> TaskStore {
    TaskStore::new(Arc::new(InMemoryFallbackBackend::new()), owner())
}

fn assert_dense(orders: &[i32]) {
    let expected: HashSet<i32> = (0..orders.len() as i32).collect();
    let actual: HashSet<i32> = orders.iter().copied().collect();
    assert_eq!(actual, expected, "ranks are not dense: {orders:?}");
}

fn category_orders(store: &TaskStore) -> Vec<i32> {
    store.categories().iter().map(|c| c.order).collect()
}

fn bucket_orders(store: &TaskStore, category: Option<&str>) -> Vec<i32> {
    store
        .todos_by_category(category)
        .iter()
        .map(|t| t.order)
        .collect()
}

#[tokio::test]
async fn category_ranks_stay_dense_under_mixed_operations() -> Result<()> {
    let store = fresh_store();

    let a = store.create_category("A", "#111111").await?;
    assert_dense(&category_orders(&store));
    let b = store.create_category("B", "#222222").await?;
    assert_dense(&category_orders(&store));
    store.create_category("C", "#333333").await?;
    assert_dense(&category_orders(&store));

    store.delete_category(&b.id).await?;
    assert_dense(&category_orders(&store));

    store.reorder_category(&a.id, 1).await?;
    assert_dense(&category_orders(&store));

    store.create_category("D", "#444444").await?;
    assert_dense(&category_orders(&store));
    Ok(())
}

#[tokio::test]
async fn todo_ranks_stay_dense_per_bucket_including_uncategorized() -> Result<()> {
    let store = fresh_store();
    let work = store.create_category("Work", "#3B82F6").await?;

    let t1 = store.create_todo("one", Some(work.id.clone())).await?;
    store.create_todo("two", Some(work.id.clone())).await?;
    let loose = store.create_todo("loose", None).await?;
    store.create_todo("loose two", None).await?;
    assert_dense(&bucket_orders(&store, Some(&work.id)));
    assert_dense(&bucket_orders(&store, None));

    store.delete_todo(&t1.id).await?;
    assert_dense(&bucket_orders(&store, Some(&work.id)));

    // Drag a loose todo into Work; both buckets must stay dense.
    store
        .move_todo(MoveIntent {
            todo_id: loose.id.clone(),
            target_category: Some(work.id.clone()),
            target_position: TargetPosition::At(0),
        })
        .await?;
    assert_dense(&bucket_orders(&store, Some(&work.id)));
    assert_dense(&bucket_orders(&store, None));
    Ok(())
}

#[tokio::test]
async fn moving_shopping_to_the_front_rotates_work_and_personal() -> Result<()> {
    let store = fresh_store();
    store.create_category("Work", "#111111").await?;
    store.create_category("Personal", "#222222").await?;
    let shopping = store.create_category("Shopping", "#333333").await?;

    store.reorder_category(&shopping.id, 0).await?;

    let ranked: Vec<(String, i32)> = store
        .categories()
        .into_iter()
        .map(|c| (c.name, c.order))
        .collect();
    assert_eq!(
        ranked,
        vec![
            ("Shopping".to_string(), 0),
            ("Work".to_string(), 1),
            ("Personal".to_string(), 2),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn cross_category_drag_closes_and_opens_slots() -> Result<()> {
    let store = fresh_store();
    let work = store.create_category("Work", "#111111").await?;
    let personal = store.create_category("Personal", "#222222").await?;

    let a = store.create_todo("A", Some(work.id.clone())).await?;
    let b = store.create_todo("B", Some(work.id.clone())).await?;
    let c = store.create_todo("C", Some(personal.id.clone())).await?;

    store
        .move_todo(MoveIntent {
            todo_id: a.id.clone(),
            target_category: Some(personal.id.clone()),
            target_position: TargetPosition::At(0),
        })
        .await?;

    let work_bucket = store.todos_by_category(Some(&work.id));
    assert_eq!(work_bucket.len(), 1);
    assert_eq!((work_bucket[0].id.as_str(), work_bucket[0].order), (b.id.as_str(), 0));

    let personal_bucket = store.todos_by_category(Some(&personal.id));
    let ranked: Vec<(&str, i32)> = personal_bucket
        .iter()
        .map(|t| (t.id.as_str(), t.order))
        .collect();
    assert_eq!(ranked, vec![(a.id.as_str(), 0), (c.id.as_str(), 1)]);
    Ok(())
}

#[tokio::test]
async fn dropping_onto_a_category_appends_to_its_end() -> Result<()> {
    let store = fresh_store();
    let work = store.create_category("Work", "#111111").await?;
    let personal = store.create_category("Personal", "#222222").await?;

    store.create_todo("existing", Some(personal.id.clone())).await?;
    let moved = store.create_todo("dragged", Some(work.id.clone())).await?;

    store
        .move_todo(MoveIntent {
            todo_id: moved.id.clone(),
            target_category: Some(personal.id.clone()),
            target_position: TargetPosition::End,
        })
        .await?;

    let bucket = store.todos_by_category(Some(&personal.id));
    assert_eq!(bucket.last().map(|t| t.id.as_str()), Some(moved.id.as_str()));
    assert_dense(&bucket_orders(&store, Some(&personal.id)));
    Ok(())
}

#[tokio::test]
async fn replaying_the_same_drag_changes_nothing() -> Result<()> {
    let store = fresh_store();
    let work = store.create_category("Work", "#111111").await?;
    let personal = store.create_category("Personal", "#222222").await?;
    let a = store.create_todo("A", Some(work.id.clone())).await?;
    store.create_todo("B", Some(work.id.clone())).await?;

    let intent = MoveIntent {
        todo_id: a.id.clone(),
        target_category: Some(personal.id.clone()),
        target_position: TargetPosition::At(0),
    };
    store.move_todo(intent.clone()).await?;
    let after_first: Vec<Todo> = store.todos_by_category(Some(&personal.id));

    store.move_todo(intent).await?;
    assert_eq!(store.todos_by_category(Some(&personal.id)), after_first);
    Ok(())
}

#[tokio::test]
async fn deleting_a_category_cascades_to_its_todos() -> Result<()> {
    let store = fresh_store();
    let work = store.create_category("Work", "#111111").await?;
    store.create_todo("one", Some(work.id.clone())).await?;
    store.create_todo("two", Some(work.id.clone())).await?;
    store.create_todo("elsewhere", None).await?;

    store.delete_category(&work.id).await?;

    assert!(store.todos_by_category(Some(&work.id)).is_empty());
    assert!(store.categories().is_empty());
    assert_eq!(store.uncategorized_todos().len(), 1);
    Ok(())
}

#[tokio::test]
async fn updating_a_remotely_deleted_row_refreshes_the_cache() -> Result<()> {
    let backend = Arc::new(InMemoryFallbackBackend::new());
    let store = TaskStore::new(backend.clone(), owner());
    let work = store.create_category("Work", "#111111").await?;
    let todo = store.create_todo("stale", Some(work.id.clone())).await?;

    // Another device deletes the todo behind the store's back.
    backend.delete_todo(&todo.id).await?;
    let err = store
        .update_todo(&todo.id, TodoUpdate::retitle("renamed"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    // The forced re-fetch dropped the vanished row from the cache.
    assert!(store.todos_by_category(Some(&work.id)).is_empty());

    backend.delete_category(&work.id).await?;
    let err = store
        .update_category(&work.id, CategoryUpdate::rename("Renamed"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(store.categories().is_empty());
    Ok(())
}

/// Backend wrapper that can be told to fail specific calls.
struct FlakyBackend {
    inner: InMemoryFallbackBackend,
    fail_list_categories: AtomicBool,
    fail_list_todos: AtomicBool,
    fail_cascade_delete: AtomicBool,
}

impl FlakyBackend {
    fn new() -> Self {
        Self {
            inner: InMemoryFallbackBackend::new(),
            fail_list_categories: AtomicBool::new(false),
            fail_list_todos: AtomicBool::new(false),
            fail_cascade_delete: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DataBackend for FlakyBackend {
    async fn list_categories(&self, owner: &UserId) -> Result<Vec<Category>> {
        if self.fail_list_categories.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("connection refused"));
        }
        self.inner.list_categories(owner).await
    }

    async fn insert_category(&self, category: Category) -> Result<Category> {
        self.inner.insert_category(category).await
    }

    async fn update_category(&self, id: &str, delta: CategoryUpdate) -> Result<Category> {
        self.inner.update_category(id, delta).await
    }

    async fn delete_category(&self, id: &str) -> Result<()> {
        self.inner.delete_category(id).await
    }

    async fn list_todos(&self, owner: &UserId) -> Result<Vec<Todo>> {
        if self.fail_list_todos.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("connection reset"));
        }
        self.inner.list_todos(owner).await
    }

    async fn insert_todo(&self, todo: Todo) -> Result<Todo> {
        self.inner.insert_todo(todo).await
    }

    async fn update_todo(&self, id: &str, delta: TodoUpdate) -> Result<Todo> {
        self.inner.update_todo(id, delta).await
    }

    async fn delete_todo(&self, id: &str) -> Result<()> {
        self.inner.delete_todo(id).await
    }

    async fn delete_todos_in_category(&self, owner: &UserId, category_id: &str) -> Result<()> {
        if self.fail_cascade_delete.load(Ordering::SeqCst) {
            return Err(StoreError::write("bulk delete failed"));
        }
        self.inner.delete_todos_in_category(owner, category_id).await
    }

    async fn shift_category_positions(
        &self,
        owner: &UserId,
        updates: &[CategoryPosition],
    ) -> Result<()> {
        self.inner.shift_category_positions(owner, updates).await
    }

    async fn shift_todo_positions(&self, owner: &UserId, updates: &[TodoPosition]) -> Result<()> {
        self.inner.shift_todo_positions(owner, updates).await
    }

    fn subscribe(
        &self,
        owner: &UserId,
        table: ChangeTable,
        sink: ChangeSink,
    ) -> Box<dyn SubscriptionHandle> {
        self.inner.subscribe(owner, table, sink)
    }
}

#[tokio::test]
async fn failed_cascade_leaves_the_category_untouched() -> Result<()> {
    let backend = Arc::new(FlakyBackend::new());
    let store = TaskStore::new(backend.clone(), owner());
    let work = store.create_category("Work", "#111111").await?;
    store.create_todo("one", Some(work.id.clone())).await?;
    store.create_todo("two", Some(work.id.clone())).await?;

    backend.fail_cascade_delete.store(true, Ordering::SeqCst);
    let err = store.delete_category(&work.id).await.unwrap_err();
    assert!(matches!(err, StoreError::RemoteWrite { .. }));

    // Fail-fast: the category deletion was never attempted and the cache
    // still holds the category and both todos.
    assert_eq!(store.categories().len(), 1);
    assert_eq!(store.todos_by_category(Some(&work.id)).len(), 2);
    assert_eq!(backend.inner.list_categories(&owner()).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_degrades_to_placeholder_data() -> Result<()> {
    let backend = Arc::new(FlakyBackend::new());
    backend.fail_list_categories.store(true, Ordering::SeqCst);

    let store = TaskStore::new(backend, owner());
    store.load().await?;

    assert!(store.is_degraded());
    let names: Vec<String> = store.categories().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["Work", "Personal", "Shopping"]);

    // The board stays usable: writes land in the fallback backend.
    let todo = store.create_todo("offline task", None).await?;
    assert_eq!(todo.title, "offline task");
    Ok(())
}

#[tokio::test]
async fn todo_fetch_failure_keeps_real_categories_but_marks_degraded() -> Result<()> {
    let backend = Arc::new(FlakyBackend::new());
    let seeded = TaskStore::new(backend.clone(), owner());
    seeded.create_category("Errands", "#10B981").await?;

    backend.fail_list_todos.store(true, Ordering::SeqCst);
    let store = TaskStore::new(backend, owner());
    store.load().await?;

    assert!(store.is_degraded());
    let categories = store.categories();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].name, "Errands");

    let samples = store.todos_by_category(Some(&categories[0].id));
    assert_eq!(samples.len(), 1);
    assert!(samples[0].title.starts_with("Sample task for"));
    Ok(())
}
