use std::fmt;

use crate::store::TaskStore;
use crate::types::{TaskId, TaskStatus};

/// A requested status change, validated against the store before any mutation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TransitionIntent {
    pub task_id: TaskId,
    /// `None` when the task is not in the local store (form path only).
    pub from: Option<TaskStatus>,
    pub to: TaskStatus,
}

impl TransitionIntent {
    /// Resolves a raw lane id dropped on a task card.
    ///
    /// The lane id must be one of the three status codes and the task must be
    /// on the board, i.e. present in the store with a known status.
    pub fn from_drop(
        store: &TaskStore,
        task_id: TaskId,
        lane_id: &str,
    ) -> Result<Self, IntentRejection> {
        let to = TaskStatus::from_code(lane_id)
            .ok_or_else(|| IntentRejection::UnknownLane(lane_id.to_string()))?;
        let task = store
            .get(task_id)
            .ok_or(IntentRejection::UnknownTask(task_id))?;
        let from = task
            .lane_status()
            .ok_or(IntentRejection::NotOnBoard(task_id))?;

        Ok(Self {
            task_id,
            from: Some(from),
            to,
        })
    }

    /// Builds the intent of a form submission; the task may be missing locally.
    pub fn from_form(store: &TaskStore, task_id: TaskId, to: TaskStatus) -> Self {
        Self {
            task_id,
            from: store.get(task_id).and_then(|task| task.lane_status()),
            to,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.from == Some(self.to)
    }
}

impl fmt::Display for TransitionIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.from {
            Some(from) => write!(f, "task {}: {} -> {}", self.task_id, from.code(), self.to.code()),
            None => write!(f, "task {}: ? -> {}", self.task_id, self.to.code()),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum IntentRejection {
    UnknownLane(String),
    UnknownTask(TaskId),
    NotOnBoard(TaskId),
}

impl fmt::Display for IntentRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownLane(lane) => write!(f, "`{lane}` is not a board lane"),
            Self::UnknownTask(id) => write!(f, "task {id} is not loaded"),
            Self::NotOnBoard(id) => write!(f, "task {id} has a status outside the board lanes"),
        }
    }
}

impl std::error::Error for IntentRejection {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::task;

    fn store() -> TaskStore {
        TaskStore::from_tasks(vec![task(1, "A"), task(2, "F"), task(3, "?")])
    }

    #[test]
    fn test_from_drop_resolves_known_lane_and_task() {
        let intent = TransitionIntent::from_drop(&store(), TaskId(1), "P").expect("should resolve");
        assert_eq!(intent.from, Some(TaskStatus::ToDo));
        assert_eq!(intent.to, TaskStatus::Done);
        assert!(!intent.is_noop());
        assert_eq!(intent.to_string(), "task 1: A -> P");
    }

    #[test]
    fn test_from_drop_rejects_unknown_lane() {
        assert_eq!(
            TransitionIntent::from_drop(&store(), TaskId(1), "done"),
            Err(IntentRejection::UnknownLane("done".to_string()))
        );
    }

    #[test]
    fn test_from_drop_rejects_missing_task() {
        assert_eq!(
            TransitionIntent::from_drop(&store(), TaskId(44), "F"),
            Err(IntentRejection::UnknownTask(TaskId(44)))
        );
    }

    #[test]
    fn test_from_drop_rejects_task_outside_lanes() {
        assert_eq!(
            TransitionIntent::from_drop(&store(), TaskId(3), "F"),
            Err(IntentRejection::NotOnBoard(TaskId(3)))
        );
    }

    #[test]
    fn test_same_lane_is_noop() {
        let intent = TransitionIntent::from_drop(&store(), TaskId(2), "F").expect("should resolve");
        assert!(intent.is_noop());
    }

    #[test]
    fn test_from_form_tolerates_missing_task() {
        let intent = TransitionIntent::from_form(&store(), TaskId(44), TaskStatus::Doing);
        assert_eq!(intent.from, None);
        assert!(!intent.is_noop());
    }
}
