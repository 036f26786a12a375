//! Task endpoints.
//!
//! Reads go through typed response caches; writes are queued through the
//! scheduler and, on success, invalidate the touched item, every list and
//! search entry, and the aggregate stats.

use serde_json::json;

use super::cache::{Invalidation, ResponseCache, TtlClass};
use super::facade::{logged, require_id, require_ids, require_text, SessionScope};
use super::keys;
use super::pipeline::{ApiClient, ApiRequest};
use super::scheduler::Priority;
use super::types::{
    BulkResult, Envelope, NewTask, Task, TaskFilter, TaskListWire, TaskPage, TaskStats,
    TaskUpdate,
};
use crate::config::CacheConfig;
use crate::error::ApiError;

pub struct TaskApi {
    client: ApiClient,
    lists: ResponseCache<String, TaskPage>,
    items: ResponseCache<String, Task>,
    stats: ResponseCache<String, TaskStats>,
    session: SessionScope,
}

impl TaskApi {
    pub fn new(client: ApiClient, cache: &CacheConfig) -> Self {
        let scheduler = client.scheduler().clone();
        Self {
            lists: ResponseCache::new(scheduler.clone(), cache),
            items: ResponseCache::new(scheduler.clone(), cache),
            stats: ResponseCache::new(scheduler, cache),
            session: SessionScope::new(client.tokens()),
            client,
        }
    }

    pub async fn get_tasks(&self, filter: &TaskFilter) -> Result<TaskPage, ApiError> {
        let query = filter.to_query();
        let key = keys::task_list_key(&query);
        self.fetch_page(key, ApiRequest::get("/tasks").with_query(query))
            .await
            .map_err(|err| logged("get_tasks", err))
    }

    /// Full-text search, cached separately from plain listings.
    pub async fn search_tasks(&self, text: &str, filter: &TaskFilter) -> Result<TaskPage, ApiError> {
        let text = require_text(text, "search text")?;
        let filter = TaskFilter {
            search: Some(text.to_string()),
            ..filter.clone()
        };
        let query = filter.to_query();
        let key = keys::task_search_key(&query);
        self.fetch_page(key, ApiRequest::get("/tasks").with_query(query))
            .await
            .map_err(|err| logged("search_tasks", err))
    }

    async fn fetch_page(&self, key: String, request: ApiRequest) -> Result<TaskPage, ApiError> {
        self.sync_session();
        let client = self.client.clone();
        self.lists
            .get_or_fetch(key, TtlClass::Short, move || {
                let fetch = client.fetch::<TaskListWire>(request);
                async move { fetch.await.map(TaskPage::from) }
            })
            .await
    }

    pub async fn get_task(&self, id: &str) -> Result<Task, ApiError> {
        let id = require_id(id, "task id")?;
        self.sync_session();
        let client = self.client.clone();
        let request = ApiRequest::get(format!("/tasks/{id}"));
        self.items
            .get_or_fetch(keys::task_item_key(id), TtlClass::Default, move || {
                let fetch = client.fetch::<Envelope<Task>>(request);
                async move { fetch.await.map(Envelope::into_inner) }
            })
            .await
            .map_err(|err| logged("get_task", err))
    }

    pub async fn get_stats(&self) -> Result<TaskStats, ApiError> {
        self.sync_session();
        let client = self.client.clone();
        self.stats
            .get_or_fetch(keys::TASK_STATS_KEY.to_string(), TtlClass::Default, move || {
                let fetch = client.fetch::<Envelope<TaskStats>>(ApiRequest::get("/tasks/stats"));
                async move { fetch.await.map(Envelope::into_inner) }
            })
            .await
            .map_err(|err| logged("get_stats", err))
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
        require_text(&task.title, "title")?;
        let request = ApiRequest::post("/tasks").with_json(task)?;
        let created = self
            .client
            .send::<Envelope<Task>>(Priority::High, request)
            .await
            .map_err(|err| logged("create_task", err))?
            .into_inner();
        self.invalidate_after_write(&[]);
        Ok(created)
    }

    pub async fn update_task(&self, id: &str, update: &TaskUpdate) -> Result<Task, ApiError> {
        let id = require_id(id, "task id")?;
        if update.is_empty() {
            return Err(ApiError::validation("update has no fields to change"));
        }
        if let Some(title) = &update.title {
            require_text(title, "title")?;
        }
        let request = ApiRequest::put(format!("/tasks/{id}")).with_json(update)?;
        let updated = self
            .client
            .send::<Envelope<Task>>(Priority::Normal, request)
            .await
            .map_err(|err| logged("update_task", err))?
            .into_inner();
        self.invalidate_after_write(&[id]);
        Ok(updated)
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), ApiError> {
        let id = require_id(id, "task id")?;
        self.client
            .send::<serde_json::Value>(Priority::Normal, ApiRequest::delete(format!("/tasks/{id}")))
            .await
            .map_err(|err| logged("delete_task", err))?;
        self.invalidate_after_write(&[id]);
        Ok(())
    }

    /// Flip a task between active and completed.
    pub async fn toggle_task_status(&self, id: &str) -> Result<Task, ApiError> {
        let id = require_id(id, "task id")?;
        let toggled = self
            .client
            .send::<Envelope<Task>>(
                Priority::Normal,
                ApiRequest::patch(format!("/tasks/{id}/toggle")),
            )
            .await
            .map_err(|err| logged("toggle_task_status", err))?
            .into_inner();
        self.invalidate_after_write(&[id]);
        Ok(toggled)
    }

    /// Apply one update to many tasks. Never retried.
    pub async fn bulk_update(&self, ids: &[String], update: &TaskUpdate) -> Result<BulkResult, ApiError> {
        let ids = require_ids(ids)?;
        if update.is_empty() {
            return Err(ApiError::validation("update has no fields to change"));
        }
        let request = ApiRequest::put("/tasks/bulk-update")
            .with_json(&json!({ "taskIds": ids, "updates": update }))?;
        let result = self
            .client
            .send::<BulkResult>(Priority::High, request)
            .await
            .map_err(|err| logged("bulk_update", err))?;
        self.invalidate_after_write(&ids.iter().map(String::as_str).collect::<Vec<_>>());
        Ok(result)
    }

    /// Delete many tasks. Never retried.
    pub async fn bulk_delete(&self, ids: &[String]) -> Result<BulkResult, ApiError> {
        let ids = require_ids(ids)?;
        let request = ApiRequest::delete("/tasks/bulk-delete").with_json(&json!({ "taskIds": ids }))?;
        let result = self
            .client
            .send::<BulkResult>(Priority::High, request)
            .await
            .map_err(|err| logged("bulk_delete", err))?;
        self.invalidate_after_write(&ids.iter().map(String::as_str).collect::<Vec<_>>());
        Ok(result)
    }

    /// Drop every cached task read.
    pub fn invalidate_all(&self) {
        self.lists.invalidate(Invalidation::All);
        self.items.invalidate(Invalidation::All);
        self.stats.invalidate(Invalidation::All);
    }

    fn sync_session(&self) {
        if self.session.moved(self.client.tokens()) {
            self.invalidate_all();
        }
    }

    fn invalidate_after_write(&self, ids: &[&str]) {
        for id in ids {
            self.items
                .invalidate(Invalidation::Key(&keys::task_item_key(id)));
        }
        self.lists.invalidate(Invalidation::Matching(&|key: &String| {
            keys::is_task_collection_key(key)
        }));
        self.stats.invalidate(Invalidation::All);
    }

    #[cfg(test)]
    pub(crate) fn cached_item(&self, id: &str) -> Option<Task> {
        self.items.peek(&keys::task_item_key(id))
    }

    #[cfg(test)]
    pub(crate) fn cached_list_count(&self) -> usize {
        self.lists.len()
    }
}

impl std::fmt::Debug for TaskApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskApi")
            .field("lists", &self.lists)
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}
