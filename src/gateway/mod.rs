//! Remote task gateway: the service boundary for task CRUD calls.

mod http;

#[cfg(test)]
pub(crate) mod fake;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Task, TaskDraft, TaskId, TaskPatch, TaskStatus, User};

pub use http::{HttpGatewayConfig, HttpTaskGateway};

/// One network round trip per call, no retries. Any non-success outcome is an error.
#[async_trait]
pub trait TaskGateway: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Task>>;
    async fn fetch_one(&self, id: TaskId) -> Result<Task>;
    async fn create(&self, draft: &TaskDraft) -> Result<Task>;
    async fn patch_status(&self, id: TaskId, status: TaskStatus) -> Result<()>;
    async fn patch_task(&self, id: TaskId, patch: &TaskPatch) -> Result<()>;
    async fn delete(&self, id: TaskId) -> Result<()>;
    async fn fetch_users(&self) -> Result<Vec<User>>;
}
