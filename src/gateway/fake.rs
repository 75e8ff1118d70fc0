use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::types::{Task, TaskDraft, TaskId, TaskPatch, TaskStatus, User};

use super::TaskGateway;

#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum Call {
    FetchAll,
    FetchOne(TaskId),
    Create(TaskDraft),
    PatchStatus(TaskId, TaskStatus),
    PatchTask(TaskId, TaskPatch),
    Delete(TaskId),
    FetchUsers,
}

/// Scripted gateway. Patches can be held behind a gate to observe pre-confirmation state.
#[derive(Default)]
pub(crate) struct FakeGateway {
    remote: Mutex<Vec<Task>>,
    users: Mutex<Vec<User>>,
    failing: Mutex<HashSet<&'static str>>,
    patch_failures: Mutex<VecDeque<bool>>,
    patch_gate: Mutex<Option<Arc<Semaphore>>>,
    calls: Mutex<Vec<Call>>,
    next_id: Mutex<i64>,
}

impl FakeGateway {
    pub(crate) fn with_tasks(tasks: Vec<Task>) -> Self {
        let next_id = tasks.iter().map(|t| t.id.0).max().unwrap_or(0) + 1;
        Self {
            remote: Mutex::new(tasks),
            next_id: Mutex::new(next_id),
            ..Self::default()
        }
    }

    pub(crate) fn set_users(&self, users: Vec<User>) {
        *self.users.lock().expect("users mutex should not be poisoned") = users;
    }

    /// Makes every call of `op` fail ("fetch_all", "fetch_one", "create", "patch", "delete", "users").
    pub(crate) fn fail(&self, op: &'static str) {
        self.failing
            .lock()
            .expect("failing mutex should not be poisoned")
            .insert(op);
    }

    /// Per-call patch outcomes, consumed in order; `true` fails that call.
    pub(crate) fn script_patch_failures(&self, outcomes: Vec<bool>) {
        *self
            .patch_failures
            .lock()
            .expect("patch failures mutex should not be poisoned") = outcomes.into();
    }

    /// Holds every patch until a permit is added to the returned semaphore.
    pub(crate) fn gate_patches(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self
            .patch_gate
            .lock()
            .expect("gate mutex should not be poisoned") = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .expect("calls mutex should not be poisoned")
            .clone()
    }

    pub(crate) fn remote_status(&self, id: TaskId) -> Option<String> {
        self.remote
            .lock()
            .expect("remote mutex should not be poisoned")
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.status.clone())
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .expect("calls mutex should not be poisoned")
            .push(call);
    }

    fn check(&self, op: &'static str) -> Result<()> {
        if self
            .failing
            .lock()
            .expect("failing mutex should not be poisoned")
            .contains(op)
        {
            bail!("connection refused during {op}");
        }
        Ok(())
    }

    async fn pass_patch_gate(&self) -> Result<()> {
        let gate = self
            .patch_gate
            .lock()
            .expect("gate mutex should not be poisoned")
            .clone();
        if let Some(gate) = gate {
            gate.acquire().await?.forget();
        }
        self.check("patch")?;
        let scripted = self
            .patch_failures
            .lock()
            .expect("patch failures mutex should not be poisoned")
            .pop_front()
            .unwrap_or(false);
        if scripted {
            bail!("HTTP status server error (500 Internal Server Error)");
        }
        Ok(())
    }

    fn apply_remote(&self, id: TaskId, patch: &TaskPatch) {
        let mut remote = self.remote.lock().expect("remote mutex should not be poisoned");
        if let Some(task) = remote.iter_mut().find(|t| t.id == id) {
            if let Some(priority) = patch.priority {
                task.priority = priority;
            }
            if let Some(status) = patch.status {
                task.status = status.code().to_string();
            }
        }
    }
}

#[async_trait]
impl TaskGateway for FakeGateway {
    async fn fetch_all(&self) -> Result<Vec<Task>> {
        self.record(Call::FetchAll);
        self.check("fetch_all")?;
        Ok(self
            .remote
            .lock()
            .expect("remote mutex should not be poisoned")
            .clone())
    }

    async fn fetch_one(&self, id: TaskId) -> Result<Task> {
        self.record(Call::FetchOne(id));
        self.check("fetch_one")?;
        self.remote
            .lock()
            .expect("remote mutex should not be poisoned")
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("HTTP status client error (404 Not Found)"))
    }

    async fn create(&self, draft: &TaskDraft) -> Result<Task> {
        self.record(Call::Create(draft.clone()));
        self.check("create")?;
        let mut next_id = self.next_id.lock().expect("id mutex should not be poisoned");
        let task = Task {
            id: TaskId(*next_id),
            name: Some(draft.name.clone()),
            description: draft.description.clone(),
            sector: draft.sector.clone(),
            priority: draft.priority,
            status: draft.status().code().to_string(),
            assignee: Some(draft.assignee),
            assignee_name: None,
        };
        *next_id += 1;
        self.remote
            .lock()
            .expect("remote mutex should not be poisoned")
            .push(task.clone());
        Ok(task)
    }

    async fn patch_status(&self, id: TaskId, status: TaskStatus) -> Result<()> {
        self.record(Call::PatchStatus(id, status));
        self.pass_patch_gate().await?;
        self.apply_remote(id, &TaskPatch::status_only(status));
        Ok(())
    }

    async fn patch_task(&self, id: TaskId, patch: &TaskPatch) -> Result<()> {
        self.record(Call::PatchTask(id, patch.clone()));
        self.pass_patch_gate().await?;
        self.apply_remote(id, patch);
        Ok(())
    }

    async fn delete(&self, id: TaskId) -> Result<()> {
        self.record(Call::Delete(id));
        self.check("delete")?;
        self.remote
            .lock()
            .expect("remote mutex should not be poisoned")
            .retain(|t| t.id != id);
        Ok(())
    }

    async fn fetch_users(&self) -> Result<Vec<User>> {
        self.record(Call::FetchUsers);
        self.check("users")?;
        Ok(self
            .users
            .lock()
            .expect("users mutex should not be poisoned")
            .clone())
    }
}
