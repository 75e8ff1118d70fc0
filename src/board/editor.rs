//! Form-driven edits. Remote first: the store changes only after the gateway confirms.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use tracing::info;

use crate::gateway::TaskGateway;
use crate::notification::{Notification, Notifier, emit};
use crate::store::SharedStore;
use crate::types::{Priority, Task, TaskId, TaskPatch, TaskStatus};

use super::TransitionIntent;

/// The per-card status selector. `None` is the empty "select" option.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StatusForm {
    task_id: TaskId,
    selected: Option<TaskStatus>,
}

impl StatusForm {
    pub fn for_task(task: &Task) -> Self {
        Self {
            task_id: task.id,
            selected: task.lane_status(),
        }
    }

    pub fn new(task_id: TaskId, selected: Option<TaskStatus>) -> Self {
        Self { task_id, selected }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn selected(&self) -> Option<TaskStatus> {
        self.selected
    }

    pub fn select(&mut self, status: Option<TaskStatus>) {
        self.selected = status;
    }
}

#[derive(Clone)]
pub struct ManualStatusEditor {
    store: SharedStore,
    gateway: Arc<dyn TaskGateway>,
    notifier: Arc<dyn Notifier>,
}

impl ManualStatusEditor {
    pub fn new(
        store: SharedStore,
        gateway: Arc<dyn TaskGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
        }
    }

    /// Sends the selected status, then mirrors it locally once acknowledged.
    ///
    /// On failure the store and the form are left as they were so the user can retry.
    pub async fn submit(&self, form: &StatusForm) -> Result<TransitionIntent> {
        let Some(status) = form.selected() else {
            emit(
                self.notifier.as_ref(),
                Notification::error("Select a status before submitting."),
            );
            return Err(anyhow!("no status selected for task {}", form.task_id()));
        };

        let intent = self
            .store
            .read(|store| TransitionIntent::from_form(store, form.task_id(), status));

        if let Err(err) = self.gateway.patch_status(intent.task_id, intent.to).await {
            emit(
                self.notifier.as_ref(),
                Notification::error(format!(
                    "Failed to change the status of task {}.",
                    intent.task_id
                )),
            );
            return Err(err.context(format!("failed to change status ({intent})")));
        }

        self.store
            .write(|store| store.update_status(intent.task_id, intent.to));
        info!(%intent, "status changed from form");
        emit(
            self.notifier.as_ref(),
            Notification::success(format!("Status changed to {}.", intent.to)),
        );
        Ok(intent)
    }
}

/// Edit page state: description and sector are shown read-only.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EditForm {
    pub task_id: TaskId,
    pub description: String,
    pub sector: String,
    pub priority: Priority,
    pub status: TaskStatus,
}

impl EditForm {
    /// Unrecognized statuses open as done.
    pub fn from_task(task: &Task) -> Self {
        Self {
            task_id: task.id,
            description: task.description.clone(),
            sector: task.sector.clone(),
            priority: task.priority,
            status: task.lane_status().unwrap_or(TaskStatus::Done),
        }
    }

    pub fn to_patch(&self) -> TaskPatch {
        TaskPatch {
            priority: Some(self.priority),
            status: Some(self.status),
        }
    }
}

#[derive(Clone)]
pub struct TaskEditor {
    store: SharedStore,
    gateway: Arc<dyn TaskGateway>,
    notifier: Arc<dyn Notifier>,
}

impl TaskEditor {
    pub fn new(
        store: SharedStore,
        gateway: Arc<dyn TaskGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
        }
    }

    pub async fn open(&self, id: TaskId) -> Result<EditForm> {
        match self.gateway.fetch_one(id).await {
            Ok(task) => Ok(EditForm::from_task(&task)),
            Err(err) => {
                emit(
                    self.notifier.as_ref(),
                    Notification::error(format!("Failed to load task {id}.")),
                );
                Err(err.context(format!("failed to load task {id} for editing")))
            }
        }
    }

    pub async fn save(&self, form: &EditForm) -> Result<()> {
        let patch = form.to_patch();
        if let Err(err) = self.gateway.patch_task(form.task_id, &patch).await {
            emit(
                self.notifier.as_ref(),
                Notification::error(format!("Failed to save task {}.", form.task_id)),
            );
            return Err(err.context(format!("failed to save task {}", form.task_id)));
        }

        self.store
            .write(|store| store.apply_patch(form.task_id, &patch));
        info!(task_id = %form.task_id, priority = form.priority.code(), status = form.status.code(), "task edited");
        emit(
            self.notifier.as_ref(),
            Notification::success(format!("Task {} saved.", form.task_id)),
        );
        Ok(())
    }
}
