//! HTTP client for the hosted data service.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use taskflow_core::auth::UserId;
use taskflow_core::backend::{
    ChangeAction, ChangeEvent, ChangeSink, ChangeTable, DataBackend, SubscriptionHandle,
};
use taskflow_core::categories::{Category, CategoryUpdate};
use taskflow_core::ordering::{CategoryPosition, TodoPosition};
use taskflow_core::todos::{Todo, TodoUpdate};
use taskflow_core::{Result, StoreError};

use crate::error::{backoff_seconds, retry_class, status_error, transport_error, ApiRetryClass};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default interval between change-feed polls.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Connection settings for the hosted data service.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
    pub access_token: String,
    pub poll_interval: Duration,
}

impl RemoteConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            access_token: access_token.into(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

/// Client for the hosted data service.
#[derive(Clone)]
pub struct RemoteBackend {
    http: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteBackend {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(transport_error)?;
        Ok(Self {
            http,
            config: RemoteConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let api_key = HeaderValue::from_str(&self.config.api_key)
            .map_err(|_| StoreError::validation("invalid API key format"))?;
        headers.insert(HeaderName::from_static("apikey"), api_key);

        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.access_token))
            .map_err(|_| StoreError::validation("invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.config.base_url)
    }

    fn list_url(&self, table: &str, owner: &UserId) -> String {
        format!(
            "{}?owner=eq.{}&order=order.asc",
            self.table_url(table),
            urlencoding::encode(owner.as_str())
        )
    }

    fn row_url(&self, table: &str, id: &str) -> String {
        format!("{}?id=eq.{}", self.table_url(table), urlencoding::encode(id))
    }

    async fn expect_rows<T: DeserializeOwned>(response: reqwest::Response) -> Result<Vec<T>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }
        response.json().await.map_err(transport_error)
    }

    async fn expect_ok(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }
        Ok(())
    }

    async fn list<T: DeserializeOwned>(&self, table: &str, owner: &UserId) -> Result<Vec<T>> {
        let response = self
            .http
            .get(self.list_url(table, owner))
            .headers(self.headers()?)
            .send()
            .await
            .map_err(transport_error)?;
        Self::expect_rows(response).await
    }

    async fn insert<T>(&self, table: &str, row: &T) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let response = self
            .http
            .post(self.table_url(table))
            .headers(self.headers()?)
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await
            .map_err(transport_error)?;
        let mut rows: Vec<T> = Self::expect_rows(response).await?;
        if rows.is_empty() {
            return Err(StoreError::write(format!(
                "insert into {table} returned no representation"
            )));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update<T, D>(&self, table: &str, id: &str, delta: &D) -> Result<T>
    where
        T: DeserializeOwned,
        D: Serialize,
    {
        let response = self
            .http
            .patch(self.row_url(table, id))
            .headers(self.headers()?)
            .header("Prefer", "return=representation")
            .json(delta)
            .send()
            .await
            .map_err(transport_error)?;
        let mut rows: Vec<T> = Self::expect_rows(response).await?;
        if rows.is_empty() {
            // PostgREST answers 200 with an empty set when the filter
            // matched nothing.
            return Err(StoreError::not_found(format!("{table} row {id}")));
        }
        Ok(rows.swap_remove(0))
    }

    async fn delete_where(&self, table: &str, query: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}?{query}", self.table_url(table)))
            .headers(self.headers()?)
            .send()
            .await
            .map_err(transport_error)?;
        Self::expect_ok(response).await
    }

    async fn call_rpc<P: Serialize>(&self, function: &str, payload: &P) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/rest/v1/rpc/{function}", self.config.base_url))
            .headers(self.headers()?)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;
        Self::expect_ok(response).await
    }

    async fn snapshot(&self, table: ChangeTable, owner: &UserId) -> Result<serde_json::Value> {
        match table {
            ChangeTable::Categories => {
                let rows: Vec<Category> = self.list("categories", owner).await?;
                Ok(serde_json::to_value(rows)?)
            }
            ChangeTable::Todos => {
                let rows: Vec<Todo> = self.list("todos", owner).await?;
                Ok(serde_json::to_value(rows)?)
            }
        }
    }
}

/// True when a freshly fetched snapshot differs from the last seen one.
/// The very first fetch only primes the comparison.
fn snapshot_changed(previous: Option<&serde_json::Value>, next: &serde_json::Value) -> bool {
    previous.is_some_and(|previous| previous != next)
}

/// Poll `table` until aborted, emitting a change event whenever the fetched
/// snapshot differs from the previous one. Failures back off exponentially;
/// a permanent failure (expired token, schema mismatch) ends the feed.
async fn poll_changes(backend: RemoteBackend, owner: UserId, table: ChangeTable, sink: ChangeSink) {
    let mut last: Option<serde_json::Value> = None;
    let mut consecutive_failures: i32 = 0;

    loop {
        let delay = if consecutive_failures == 0 {
            backend.config.poll_interval
        } else {
            Duration::from_secs(backoff_seconds(consecutive_failures))
        };
        sleep(delay).await;

        match backend.snapshot(table, &owner).await {
            Ok(snapshot) => {
                consecutive_failures = 0;
                if snapshot_changed(last.as_ref(), &snapshot) {
                    debug!("change detected on {table:?} for {owner}");
                    sink(ChangeEvent {
                        table,
                        action: ChangeAction::Update,
                        entity_id: None,
                    });
                }
                last = Some(snapshot);
            }
            Err(err) => match retry_class(&err) {
                ApiRetryClass::Retryable => {
                    consecutive_failures += 1;
                    warn!("change poll on {table:?} failed ({consecutive_failures} in a row): {err}");
                }
                ApiRetryClass::Permanent | ApiRetryClass::ReauthRequired => {
                    error!("change poll on {table:?} cannot continue: {err}");
                    return;
                }
            },
        }
    }
}

struct PollSubscription {
    task: JoinHandle<()>,
}

impl SubscriptionHandle for PollSubscription {
    fn unsubscribe(self: Box<Self>) {
        self.task.abort();
    }
}

#[async_trait]
impl DataBackend for RemoteBackend {
    async fn list_categories(&self, owner: &UserId) -> Result<Vec<Category>> {
        self.list("categories", owner).await
    }

    async fn insert_category(&self, category: Category) -> Result<Category> {
        self.insert("categories", &category).await
    }

    async fn update_category(&self, id: &str, delta: CategoryUpdate) -> Result<Category> {
        self.update("categories", id, &delta).await
    }

    async fn delete_category(&self, id: &str) -> Result<()> {
        self.delete_where("categories", &format!("id=eq.{}", urlencoding::encode(id)))
            .await
    }

    async fn list_todos(&self, owner: &UserId) -> Result<Vec<Todo>> {
        self.list("todos", owner).await
    }

    async fn insert_todo(&self, todo: Todo) -> Result<Todo> {
        self.insert("todos", &todo).await
    }

    async fn update_todo(&self, id: &str, delta: TodoUpdate) -> Result<Todo> {
        self.update("todos", id, &delta).await
    }

    async fn delete_todo(&self, id: &str) -> Result<()> {
        self.delete_where("todos", &format!("id=eq.{}", urlencoding::encode(id)))
            .await
    }

    async fn delete_todos_in_category(&self, owner: &UserId, category_id: &str) -> Result<()> {
        let query = format!(
            "owner=eq.{}&category=eq.{}",
            urlencoding::encode(owner.as_str()),
            urlencoding::encode(category_id)
        );
        self.delete_where("todos", &query).await
    }

    async fn shift_category_positions(
        &self,
        owner: &UserId,
        updates: &[CategoryPosition],
    ) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        self.call_rpc(
            "shift_category_positions",
            &serde_json::json!({ "owner": owner, "updates": updates }),
        )
        .await
    }

    async fn shift_todo_positions(&self, owner: &UserId, updates: &[TodoPosition]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        self.call_rpc(
            "shift_todo_positions",
            &serde_json::json!({ "owner": owner, "updates": updates }),
        )
        .await
    }

    /// Spawns the polling task; must be called within a tokio runtime.
    fn subscribe(
        &self,
        owner: &UserId,
        table: ChangeTable,
        sink: ChangeSink,
    ) -> Box<dyn SubscriptionHandle> {
        let task = tokio::spawn(poll_changes(self.clone(), owner.clone(), table, sink));
        Box::new(PollSubscription { task })
    }
}
