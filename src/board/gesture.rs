//! Drag-and-drop: turns a finished drag into an optimistic status transition.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::gateway::TaskGateway;
use crate::store::SharedStore;
use crate::types::{TaskId, TaskStatus};

use super::reconcile::{PolicyAction, Reconciler};
use super::{IntentRejection, TransitionIntent};

/// A completed drag as reported by the UI layer. `drop_lane` is `None` when
/// the card was released outside every lane.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DragGesture {
    pub task_id: TaskId,
    pub drop_lane: Option<String>,
}

impl DragGesture {
    pub fn new(task_id: TaskId, drop_lane: Option<impl Into<String>>) -> Self {
        Self {
            task_id,
            drop_lane: drop_lane.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Confirmation {
    Confirmed,
    Failed(PolicyAction),
}

#[derive(Debug)]
pub enum DropOutcome {
    NoDropTarget,
    SameLane(TaskStatus),
    Rejected(IntentRejection),
    /// Local store already updated; the handle resolves once the remote write settles.
    Applied {
        intent: TransitionIntent,
        confirmation: JoinHandle<Confirmation>,
    },
}

impl DropOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, DropOutcome::Applied { .. })
    }
}

#[derive(Clone)]
pub struct GestureMapper {
    store: SharedStore,
    gateway: Arc<dyn TaskGateway>,
    reconciler: Reconciler,
}

impl GestureMapper {
    pub fn new(store: SharedStore, gateway: Arc<dyn TaskGateway>, reconciler: Reconciler) -> Self {
        Self {
            store,
            gateway,
            reconciler,
        }
    }

    /// Applies the drop to the store synchronously and spawns the confirming write.
    ///
    /// Must be called from within a tokio runtime. Overlapping drops on one
    /// task are neither queued nor rejected: each is applied and written.
    pub fn on_drag_end(&self, gesture: DragGesture) -> DropOutcome {
        let Some(lane_id) = gesture.drop_lane.as_deref() else {
            debug!(task_id = %gesture.task_id, "drag ended outside any lane");
            return DropOutcome::NoDropTarget;
        };

        let resolved = self
            .store
            .read(|store| TransitionIntent::from_drop(store, gesture.task_id, lane_id));
        let intent = match resolved {
            Ok(intent) => intent,
            Err(rejection) => {
                debug!(task_id = %gesture.task_id, lane_id, %rejection, "drop rejected");
                return DropOutcome::Rejected(rejection);
            }
        };

        if intent.is_noop() {
            debug!(task_id = %intent.task_id, lane = intent.to.code(), "dropped on its own lane");
            return DropOutcome::SameLane(intent.to);
        }

        let sequence = self.reconciler.ledger().begin(intent.task_id, intent.from);
        self.store
            .write(|store| store.update_status(intent.task_id, intent.to));
        debug!(%intent, sequence, "applied optimistic transition");

        let gateway = Arc::clone(&self.gateway);
        let reconciler = self.reconciler.clone();
        let confirmation = tokio::spawn(async move {
            match gateway.patch_status(intent.task_id, intent.to).await {
                Ok(()) => {
                    reconciler.on_write_confirmed(&intent, sequence);
                    info!(%intent, sequence, "status transition confirmed");
                    Confirmation::Confirmed
                }
                Err(err) => {
                    Confirmation::Failed(reconciler.on_write_failure(&intent, sequence, &err))
                }
            }
        });

        DropOutcome::Applied {
            intent,
            confirmation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::reconcile::{RollbackPolicy, TransitionLedger};
    use crate::gateway::fake::{Call, FakeGateway};
    use crate::lanes::classify;
    use crate::notification::BufferedNotifier;
    use crate::store::TaskStore;
    use crate::store::tests::task;

    struct Harness {
        store: SharedStore,
        gateway: Arc<FakeGateway>,
        notifier: Arc<BufferedNotifier>,
        ledger: TransitionLedger,
        mapper: GestureMapper,
    }

    fn harness(policy: RollbackPolicy) -> Harness {
        let tasks = vec![task(3, "F"), task(7, "A"), task(9, "P")];
        let store = SharedStore::new(TaskStore::from_tasks(tasks.clone()));
        let gateway = Arc::new(FakeGateway::with_tasks(tasks));
        let notifier = Arc::new(BufferedNotifier::new());
        let ledger = TransitionLedger::default();
        let reconciler = Reconciler::new(store.clone(), notifier.clone(), policy, ledger.clone());
        let mapper = GestureMapper::new(store.clone(), gateway.clone(), reconciler);
        Harness {
            store,
            gateway,
            notifier,
            ledger,
            mapper,
        }
    }

    fn lane_of(store: &SharedStore, id: i64) -> Option<TaskStatus> {
        let lanes = classify(&store.snapshot());
        lanes
            .iter()
            .find(|(_, lane)| lane.iter().any(|t| t.id == TaskId(id)))
            .map(|(status, _)| status)
    }

    async fn settle_spawned() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    async fn settle(outcome: DropOutcome) -> Confirmation {
        match outcome {
            DropOutcome::Applied { confirmation, .. } => {
                confirmation.await.expect("confirmation task should not panic")
            }
            other => panic!("expected applied drop, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_drop_outside_lanes_does_nothing() {
        let h = harness(RollbackPolicy::Keep);
        let before = h.store.snapshot();

        let outcome = h.mapper.on_drag_end(DragGesture::new(TaskId(7), None::<String>));

        assert!(matches!(outcome, DropOutcome::NoDropTarget));
        assert_eq!(h.store.snapshot(), before);
        tokio::task::yield_now().await;
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_drop_on_same_lane_skips_store_and_gateway() {
        let h = harness(RollbackPolicy::Keep);
        let before = h.store.snapshot();

        let outcome = h.mapper.on_drag_end(DragGesture::new(TaskId(7), Some("A")));

        assert!(matches!(outcome, DropOutcome::SameLane(TaskStatus::ToDo)));
        assert_eq!(h.store.snapshot(), before);
        tokio::task::yield_now().await;
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_drop_with_unknown_lane_or_task_is_rejected() {
        let h = harness(RollbackPolicy::Keep);

        let bad_lane = h.mapper.on_drag_end(DragGesture::new(TaskId(7), Some("Z")));
        let bad_task = h.mapper.on_drag_end(DragGesture::new(TaskId(70), Some("F")));

        assert!(matches!(
            bad_lane,
            DropOutcome::Rejected(IntentRejection::UnknownLane(_))
        ));
        assert!(matches!(
            bad_task,
            DropOutcome::Rejected(IntentRejection::UnknownTask(TaskId(70)))
        ));
        tokio::task::yield_now().await;
        assert!(h.gateway.calls().is_empty());
        assert!(h.notifier.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_drop_updates_store_before_confirmation() {
        let h = harness(RollbackPolicy::Keep);
        let gate = h.gateway.gate_patches();

        let outcome = h.mapper.on_drag_end(DragGesture::new(TaskId(7), Some("F")));

        assert_eq!(lane_of(&h.store, 7), Some(TaskStatus::Doing));
        let DropOutcome::Applied {
            intent,
            confirmation,
        } = outcome
        else {
            panic!("expected applied drop");
        };
        assert_eq!(intent.from, Some(TaskStatus::ToDo));

        settle_spawned().await;
        assert!(!confirmation.is_finished());
        assert_eq!(
            h.gateway.calls(),
            vec![Call::PatchStatus(TaskId(7), TaskStatus::Doing)]
        );

        let after_local = h.store.snapshot();
        gate.add_permits(1);
        let result = confirmation.await.expect("confirmation should not panic");

        assert_eq!(result, Confirmation::Confirmed);
        assert_eq!(h.store.snapshot(), after_local);
        assert_eq!(h.gateway.remote_status(TaskId(7)), Some("F".to_string()));
        assert!(h.notifier.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_optimistic_lane_and_notifies_once() {
        let h = harness(RollbackPolicy::Keep);
        h.gateway.fail("patch");

        let outcome = h.mapper.on_drag_end(DragGesture::new(TaskId(7), Some("F")));
        let result = settle(outcome).await;

        assert_eq!(result, Confirmation::Failed(PolicyAction::Kept));
        assert_eq!(lane_of(&h.store, 7), Some(TaskStatus::Doing));
        assert_eq!(h.gateway.remote_status(TaskId(7)), Some("A".to_string()));
        assert_eq!(h.notifier.snapshot().len(), 1);
        assert_eq!(h.notifier.error_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_reverts_under_revert_policy() {
        let h = harness(RollbackPolicy::Revert);
        h.gateway.fail("patch");

        let outcome = h.mapper.on_drag_end(DragGesture::new(TaskId(7), Some("P")));
        let result = settle(outcome).await;

        assert_eq!(result, Confirmation::Failed(PolicyAction::Reverted));
        assert_eq!(lane_of(&h.store, 7), Some(TaskStatus::ToDo));
        assert_eq!(h.notifier.error_count(), 1);
    }

    #[tokio::test]
    async fn test_double_drop_sends_both_writes_and_last_local_wins() {
        let h = harness(RollbackPolicy::Keep);
        let gate = h.gateway.gate_patches();

        let first = h.mapper.on_drag_end(DragGesture::new(TaskId(7), Some("F")));
        let second = h.mapper.on_drag_end(DragGesture::new(TaskId(7), Some("P")));

        assert!(first.is_applied());
        assert!(second.is_applied());
        assert_eq!(lane_of(&h.store, 7), Some(TaskStatus::Done));

        gate.add_permits(2);
        assert_eq!(settle(first).await, Confirmation::Confirmed);
        assert_eq!(settle(second).await, Confirmation::Confirmed);

        assert_eq!(
            h.gateway.calls(),
            vec![
                Call::PatchStatus(TaskId(7), TaskStatus::Doing),
                Call::PatchStatus(TaskId(7), TaskStatus::Done),
            ]
        );
        assert_eq!(lane_of(&h.store, 7), Some(TaskStatus::Done));
        assert_eq!(h.ledger.tracked_tasks(), 0);
    }

    #[tokio::test]
    async fn test_superseded_failure_is_not_reverted() {
        let h = harness(RollbackPolicy::Revert);
        h.gateway.script_patch_failures(vec![true, false]);

        let first = h.mapper.on_drag_end(DragGesture::new(TaskId(7), Some("F")));
        let second = h.mapper.on_drag_end(DragGesture::new(TaskId(7), Some("P")));

        assert_eq!(
            settle(first).await,
            Confirmation::Failed(PolicyAction::Superseded)
        );
        assert_eq!(settle(second).await, Confirmation::Confirmed);
        assert_eq!(lane_of(&h.store, 7), Some(TaskStatus::Done));
        assert_eq!(h.notifier.error_count(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_failures_revert_to_status_server_still_holds() {
        let h = harness(RollbackPolicy::Revert);
        h.gateway.fail("patch");

        let first = h.mapper.on_drag_end(DragGesture::new(TaskId(7), Some("F")));
        let second = h.mapper.on_drag_end(DragGesture::new(TaskId(7), Some("P")));

        assert_eq!(
            settle(first).await,
            Confirmation::Failed(PolicyAction::Superseded)
        );
        assert_eq!(
            settle(second).await,
            Confirmation::Failed(PolicyAction::Reverted)
        );
        assert_eq!(lane_of(&h.store, 7), Some(TaskStatus::ToDo));
        assert_eq!(h.gateway.remote_status(TaskId(7)), Some("A".to_string()));
        assert_eq!(h.notifier.error_count(), 2);
        assert_eq!(h.ledger.tracked_tasks(), 0);
    }

    #[tokio::test]
    async fn test_revert_after_confirmed_drop_returns_to_confirmed_lane() {
        let h = harness(RollbackPolicy::Revert);
        h.gateway.script_patch_failures(vec![false, true]);

        let first = h.mapper.on_drag_end(DragGesture::new(TaskId(7), Some("F")));
        assert_eq!(settle(first).await, Confirmation::Confirmed);
        let second = h.mapper.on_drag_end(DragGesture::new(TaskId(7), Some("P")));

        assert_eq!(
            settle(second).await,
            Confirmation::Failed(PolicyAction::Reverted)
        );
        assert_eq!(lane_of(&h.store, 7), Some(TaskStatus::Doing));
        assert_eq!(h.gateway.remote_status(TaskId(7)), Some("F".to_string()));
    }

    #[tokio::test]
    async fn test_drops_on_different_tasks_are_independent() {
        let h = harness(RollbackPolicy::Keep);

        let a = h.mapper.on_drag_end(DragGesture::new(TaskId(3), Some("P")));
        let b = h.mapper.on_drag_end(DragGesture::new(TaskId(9), Some("A")));

        assert_eq!(settle(a).await, Confirmation::Confirmed);
        assert_eq!(settle(b).await, Confirmation::Confirmed);
        assert_eq!(lane_of(&h.store, 3), Some(TaskStatus::Done));
        assert_eq!(lane_of(&h.store, 9), Some(TaskStatus::ToDo));
        assert_eq!(lane_of(&h.store, 7), Some(TaskStatus::ToDo));
    }
}
