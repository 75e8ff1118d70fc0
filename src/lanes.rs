//! Lane classification: a pure projection of the store into the three board columns.

use crate::types::{Task, TaskStatus};

/// The three lanes, each in store order.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Lanes {
    lanes: [Vec<Task>; 3],
}

impl Lanes {
    pub fn lane(&self, status: TaskStatus) -> &[Task] {
        &self.lanes[status.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskStatus, &[Task])> {
        TaskStatus::ALL
            .into_iter()
            .map(move |status| (status, self.lane(status)))
    }

    /// Number of tasks visible on the board.
    pub fn visible_count(&self) -> usize {
        self.lanes.iter().map(Vec::len).sum()
    }
}

/// Stable partition by status. Tasks whose status is not a known lane code are dropped.
pub fn classify(tasks: &[Task]) -> Lanes {
    let mut lanes = Lanes::default();
    for task in tasks {
        if let Some(status) = task.lane_status() {
            lanes.lanes[status.index()].push(task.clone());
        }
    }
    lanes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::task;
    use crate::types::TaskId;

    fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id.0).collect()
    }

    #[test]
    fn test_empty_store_yields_three_empty_lanes() {
        let lanes = classify(&[]);
        for (_, lane) in lanes.iter() {
            assert!(lane.is_empty());
        }
        assert_eq!(lanes.iter().count(), 3);
    }

    #[test]
    fn test_partition_preserves_store_order() {
        let tasks = vec![
            task(4, "F"),
            task(1, "A"),
            task(9, "P"),
            task(2, "A"),
            task(3, "F"),
        ];
        let lanes = classify(&tasks);

        assert_eq!(ids(lanes.lane(TaskStatus::ToDo)), vec![1, 2]);
        assert_eq!(ids(lanes.lane(TaskStatus::Doing)), vec![4, 3]);
        assert_eq!(ids(lanes.lane(TaskStatus::Done)), vec![9]);
    }

    #[test]
    fn test_every_known_task_lands_in_exactly_one_lane() {
        let tasks = vec![task(1, "A"), task(2, "F"), task(3, "P"), task(4, "X"), task(5, "")];
        let lanes = classify(&tasks);

        for t in &tasks {
            let hits = lanes
                .iter()
                .filter(|(_, lane)| lane.iter().any(|candidate| candidate.id == t.id))
                .count();
            let expected = usize::from(t.lane_status().is_some());
            assert_eq!(hits, expected, "task {} appeared in {hits} lanes", t.id);
        }
        assert_eq!(lanes.visible_count(), 3);
    }

    #[test]
    fn test_unknown_status_is_invisible() {
        let lanes = classify(&[task(1, "doing")]);
        assert_eq!(lanes.visible_count(), 0);
        assert!(
            !lanes
                .iter()
                .any(|(_, lane)| lane.iter().any(|t| t.id == TaskId(1)))
        );
    }
}
