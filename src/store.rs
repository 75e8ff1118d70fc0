//! In-memory task record store, the single source of truth the board renders.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::{Task, TaskId, TaskPatch, TaskStatus};

/// Ordered task collection as loaded from the gateway.
///
/// The store trusts its callers: it performs no validation, and mutations
/// addressed to an unknown id are silently ignored.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut store = Self::new();
        store.replace_all(tasks);
        store
    }

    /// Replaces the whole collection. Later duplicates of an id are dropped.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks.clear();
        for task in tasks {
            if self.position(task.id).is_none() {
                self.tasks.push(task);
            }
        }
    }

    /// Sets the status of one task, leaving every other field and the order intact.
    ///
    /// Returns `false` (and changes nothing) when the id is unknown.
    pub fn update_status(&mut self, id: TaskId, status: TaskStatus) -> bool {
        match self.tasks.iter_mut().find(|task| task.id == id) {
            Some(task) => {
                task.status = status.code().to_string();
                true
            }
            None => false,
        }
    }

    /// Appends a task, or replaces the existing entry in place when the id is taken.
    pub fn insert(&mut self, task: Task) {
        match self.position(task.id) {
            Some(idx) => self.tasks[idx] = task,
            None => self.tasks.push(task),
        }
    }

    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        let idx = self.position(id)?;
        Some(self.tasks.remove(idx))
    }

    pub fn apply_patch(&mut self, id: TaskId, patch: &TaskPatch) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            return false;
        };
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(status) = patch.status {
            task.status = status.code().to_string();
        }
        true
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }
}

/// Cloneable handle to the board's store, injected into the gesture mapper and editors.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<Mutex<TaskStore>>,
}

impl SharedStore {
    pub fn new(store: TaskStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&TaskStore) -> R) -> R {
        f(&self.lock())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut TaskStore) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.read(|store| store.tasks().to_vec())
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.read(|store| store.get(id).cloned())
    }

    fn lock(&self) -> MutexGuard<'_, TaskStore> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
