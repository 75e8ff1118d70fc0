//! The board: one store, one gateway, and the workflows that keep them in step.

mod editor;
mod gesture;
mod intent;
mod reconcile;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::gateway::TaskGateway;
use crate::lanes::{Lanes, classify};
use crate::notification::{Notification, Notifier, emit};
use crate::store::SharedStore;
use crate::types::{Task, TaskDraft, TaskId, User};

pub use editor::{EditForm, ManualStatusEditor, StatusForm, TaskEditor};
pub use gesture::{Confirmation, DragGesture, DropOutcome, GestureMapper};
pub use intent::{IntentRejection, TransitionIntent};
pub use reconcile::{FailedTransition, PolicyAction, Reconciler, RollbackPolicy, TransitionLedger};

#[derive(Clone)]
pub struct Board {
    store: SharedStore,
    gateway: Arc<dyn TaskGateway>,
    notifier: Arc<dyn Notifier>,
    reconciler: Reconciler,
}

impl Board {
    pub fn new(
        gateway: Arc<dyn TaskGateway>,
        notifier: Arc<dyn Notifier>,
        policy: RollbackPolicy,
    ) -> Self {
        let store = SharedStore::default();
        let reconciler = Reconciler::new(
            store.clone(),
            Arc::clone(&notifier),
            policy,
            TransitionLedger::default(),
        );
        Self {
            store,
            gateway,
            notifier,
            reconciler,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn policy(&self) -> RollbackPolicy {
        self.reconciler.policy()
    }

    pub fn lanes(&self) -> Lanes {
        self.store.read(|store| classify(store.tasks()))
    }

    /// Fetches the full collection into the store.
    ///
    /// A failed load is reported and leaves whatever the store held before,
    /// which for a fresh board is nothing.
    pub async fn load(&self) -> Result<usize> {
        match self.gateway.fetch_all().await {
            Ok(tasks) => {
                let count = self.store.write(|store| {
                    store.replace_all(tasks);
                    store.len()
                });
                info!(count, "loaded tasks");
                Ok(count)
            }
            Err(err) => {
                emit(
                    self.notifier.as_ref(),
                    Notification::error("Failed to load tasks."),
                );
                Err(err.context("failed to load tasks"))
            }
        }
    }

    pub async fn refresh(&self) -> Result<usize> {
        self.load().await
    }

    pub fn gesture_mapper(&self) -> GestureMapper {
        GestureMapper::new(
            self.store.clone(),
            Arc::clone(&self.gateway),
            self.reconciler.clone(),
        )
    }

    pub fn status_editor(&self) -> ManualStatusEditor {
        ManualStatusEditor::new(
            self.store.clone(),
            Arc::clone(&self.gateway),
            Arc::clone(&self.notifier),
        )
    }

    pub fn task_editor(&self) -> TaskEditor {
        TaskEditor::new(
            self.store.clone(),
            Arc::clone(&self.gateway),
            Arc::clone(&self.notifier),
        )
    }

    /// Creates the task remotely and adds the server's record to the store.
    pub async fn create_task(&self, draft: &TaskDraft) -> Result<Task> {
        match self.gateway.create(draft).await {
            Ok(task) => {
                self.store.write(|store| store.insert(task.clone()));
                info!(task_id = %task.id, "task created");
                emit(
                    self.notifier.as_ref(),
                    Notification::success("Task created."),
                );
                Ok(task)
            }
            Err(err) => {
                emit(
                    self.notifier.as_ref(),
                    Notification::error("Failed to create task."),
                );
                Err(err.context("failed to create task"))
            }
        }
    }

    /// Deletes remotely, drops the local record, then reloads the board.
    ///
    /// Once the remote delete succeeds the removal stands even if the reload fails.
    pub async fn delete_task(&self, id: TaskId) -> Result<()> {
        if let Err(err) = self.gateway.delete(id).await {
            emit(
                self.notifier.as_ref(),
                Notification::error(format!("Failed to delete task {id}.")),
            );
            return Err(err.context(format!("failed to delete task {id}")));
        }

        self.store.write(|store| store.remove(id));
        self.reconciler.ledger().forget(id);
        info!(task_id = %id, "task deleted");
        emit(
            self.notifier.as_ref(),
            Notification::success(format!("Task {id} deleted.")),
        );

        if let Err(err) = self.refresh().await {
            warn!(task_id = %id, error = %format!("{err:#}"), "reload after delete failed");
        }
        Ok(())
    }

    pub async fn users(&self) -> Result<Vec<User>> {
        match self.gateway.fetch_users().await {
            Ok(users) => Ok(users),
            Err(err) => {
                emit(
                    self.notifier.as_ref(),
                    Notification::error("Failed to load users."),
                );
                Err(err.context("failed to load users"))
            }
        }
    }
}
