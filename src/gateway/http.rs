use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

use crate::types::{Task, TaskDraft, TaskId, TaskPatch, TaskStatus, User};

use super::TaskGateway;

const TASKS_PATH: &str = "/api/tarefa/";
const USERS_PATH: &str = "/api/usuario/";

#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    pub base_url: String,
    pub request_timeout: Option<Duration>,
}

impl Default for HttpGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpTaskGateway {
    client: Client,
    base_url: String,
}

impl HttpTaskGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn tasks_url(&self) -> String {
        format!("{}{TASKS_PATH}", self.base_url)
    }

    fn task_url(&self, id: TaskId) -> String {
        format!("{}{TASKS_PATH}{id}/", self.base_url)
    }

    fn users_url(&self) -> String {
        format!("{}{USERS_PATH}", self.base_url)
    }
}

/// Sends a request and folds every non-2xx status into an error.
async fn send(request: RequestBuilder, action: &str, url: &str) -> Result<Response> {
    debug!(action, url, "sending task service request");
    request
        .send()
        .await
        .with_context(|| format!("{action} request to {url} failed"))?
        .error_for_status()
        .with_context(|| format!("{action} request to {url} was rejected"))
}

#[async_trait]
impl TaskGateway for HttpTaskGateway {
    async fn fetch_all(&self) -> Result<Vec<Task>> {
        let url = self.tasks_url();
        send(self.client.get(&url), "list tasks", &url)
            .await?
            .json::<Vec<Task>>()
            .await
            .with_context(|| format!("failed to decode task list from {url}"))
    }

    async fn fetch_one(&self, id: TaskId) -> Result<Task> {
        let url = self.task_url(id);
        send(self.client.get(&url), "fetch task", &url)
            .await?
            .json::<Task>()
            .await
            .with_context(|| format!("failed to decode task {id} from {url}"))
    }

    async fn create(&self, draft: &TaskDraft) -> Result<Task> {
        let url = self.tasks_url();
        send(self.client.post(&url).json(draft), "create task", &url)
            .await?
            .json::<Task>()
            .await
            .with_context(|| format!("failed to decode created task from {url}"))
    }

    async fn patch_status(&self, id: TaskId, status: TaskStatus) -> Result<()> {
        self.patch_task(id, &TaskPatch::status_only(status)).await
    }

    async fn patch_task(&self, id: TaskId, patch: &TaskPatch) -> Result<()> {
        let url = self.task_url(id);
        send(self.client.patch(&url).json(patch), "update task", &url).await?;
        Ok(())
    }

    async fn delete(&self, id: TaskId) -> Result<()> {
        let url = self.task_url(id);
        send(self.client.delete(&url), "delete task", &url).await?;
        Ok(())
    }

    async fn fetch_users(&self) -> Result<Vec<User>> {
        let url = self.users_url();
        send(self.client.get(&url), "list users", &url)
            .await?
            .json::<Vec<User>>()
            .await
            .with_context(|| format!("failed to decode user list from {url}"))
    }
}
