//! What happens to local state when a confirming write fails after an optimistic update.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use tracing::{error, info};

use crate::notification::{Notification, Notifier, emit};
use crate::store::SharedStore;
use crate::types::{TaskId, TaskStatus};

use super::TransitionIntent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollbackPolicy {
    /// Report only. The task stays in the lane it was dropped on until the next refresh.
    #[default]
    Keep,
    /// Report and restore the previous status, unless a newer transition superseded it.
    Revert,
}

impl RollbackPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Revert => "revert",
        }
    }
}

impl FromStr for RollbackPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" | "none" => Ok(Self::Keep),
            "revert" | "rollback" => Ok(Self::Revert),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    Kept,
    Reverted,
    /// Revert skipped: a later transition on the same task owns the local status.
    Superseded,
}

/// Per-task bookkeeping for optimistic transitions that are still in flight.
///
/// Every drop is applied and written. The ledger decides whether a failed
/// write is still the newest one for its task, and remembers the last status
/// the server is known to hold, so a revert never lands on a lane that was
/// only ever optimistic. A task's entry is dropped once nothing is in flight.
#[derive(Debug, Clone, Default)]
pub struct TransitionLedger {
    inner: Arc<Mutex<LedgerState>>,
}

#[derive(Debug, Default)]
struct LedgerState {
    next: u64,
    tasks: HashMap<TaskId, PendingTransitions>,
}

#[derive(Debug)]
struct PendingTransitions {
    latest: u64,
    in_flight: usize,
    /// Status the server holds; loaded state counts as sequence 0.
    baseline: Option<TaskStatus>,
    baseline_sequence: u64,
}

impl LedgerState {
    fn settle(&mut self, task_id: TaskId) {
        let idle = match self.tasks.get_mut(&task_id) {
            Some(pending) => {
                pending.in_flight = pending.in_flight.saturating_sub(1);
                pending.in_flight == 0
            }
            None => false,
        };
        if idle {
            self.tasks.remove(&task_id);
        }
    }
}

/// Ledger view of a write that just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedTransition {
    pub is_latest: bool,
    pub baseline: Option<TaskStatus>,
}

impl TransitionLedger {
    /// `from` becomes the baseline only when no other transition on the task is in flight.
    pub fn begin(&self, task_id: TaskId, from: Option<TaskStatus>) -> u64 {
        self.with_state(|state| {
            state.next += 1;
            let sequence = state.next;
            let pending = state.tasks.entry(task_id).or_insert(PendingTransitions {
                latest: sequence,
                in_flight: 0,
                baseline: from,
                baseline_sequence: 0,
            });
            pending.latest = sequence;
            pending.in_flight += 1;
            sequence
        })
    }

    pub fn is_latest(&self, task_id: TaskId, sequence: u64) -> bool {
        self.with_state(|state| {
            state
                .tasks
                .get(&task_id)
                .is_some_and(|pending| pending.latest == sequence)
        })
    }

    pub fn confirm(&self, task_id: TaskId, sequence: u64, status: TaskStatus) {
        self.with_state(|state| {
            if let Some(pending) = state.tasks.get_mut(&task_id) {
                if sequence > pending.baseline_sequence {
                    pending.baseline = Some(status);
                    pending.baseline_sequence = sequence;
                }
            }
            state.settle(task_id);
        })
    }

    pub fn fail(&self, task_id: TaskId, sequence: u64) -> FailedTransition {
        self.with_state(|state| {
            let failed = state.tasks.get(&task_id).map_or(
                FailedTransition {
                    is_latest: false,
                    baseline: None,
                },
                |pending| FailedTransition {
                    is_latest: pending.latest == sequence,
                    baseline: pending.baseline,
                },
            );
            state.settle(task_id);
            failed
        })
    }

    /// Drops all bookkeeping for a task, e.g. after it was deleted.
    /// Writes still in flight for it settle as superseded.
    pub fn forget(&self, task_id: TaskId) {
        self.with_state(|state| {
            state.tasks.remove(&task_id);
        })
    }

    pub fn tracked_tasks(&self) -> usize {
        self.with_state(|state| state.tasks.len())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut LedgerState) -> R) -> R {
        match self.inner.lock() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[derive(Clone)]
pub struct Reconciler {
    store: SharedStore,
    notifier: Arc<dyn Notifier>,
    policy: RollbackPolicy,
    ledger: TransitionLedger,
}

impl Reconciler {
    pub fn new(
        store: SharedStore,
        notifier: Arc<dyn Notifier>,
        policy: RollbackPolicy,
        ledger: TransitionLedger,
    ) -> Self {
        Self {
            store,
            notifier,
            policy,
            ledger,
        }
    }

    pub fn policy(&self) -> RollbackPolicy {
        self.policy
    }

    pub fn ledger(&self) -> &TransitionLedger {
        &self.ledger
    }

    pub fn on_write_confirmed(&self, intent: &TransitionIntent, sequence: u64) {
        self.ledger.confirm(intent.task_id, sequence, intent.to);
    }

    /// Handles one failed optimistic write. Produces exactly one notification.
    ///
    /// Under `Revert` the task goes back to the last status the server
    /// confirmed (or the one it was loaded with), which for overlapping
    /// drops is not necessarily `intent.from`.
    pub fn on_write_failure(
        &self,
        intent: &TransitionIntent,
        sequence: u64,
        err: &anyhow::Error,
    ) -> PolicyAction {
        error!(
            task_id = %intent.task_id,
            to = intent.to.code(),
            sequence,
            error = %format!("{err:#}"),
            "failed to confirm status transition"
        );

        let failed = self.ledger.fail(intent.task_id, sequence);
        let action = match (self.policy, failed.baseline) {
            (RollbackPolicy::Keep, _) => PolicyAction::Kept,
            (RollbackPolicy::Revert, _) if !failed.is_latest => PolicyAction::Superseded,
            (RollbackPolicy::Revert, None) => PolicyAction::Kept,
            (RollbackPolicy::Revert, Some(baseline)) => {
                let reverted = self.store.write(|store| {
                    let still_applied = store
                        .get(intent.task_id)
                        .is_some_and(|task| task.lane_status() == Some(intent.to));
                    still_applied && store.update_status(intent.task_id, baseline)
                });
                if reverted {
                    info!(task_id = %intent.task_id, to = baseline.code(), "reverted optimistic transition");
                    PolicyAction::Reverted
                } else {
                    PolicyAction::Superseded
                }
            }
        };

        let message = match (action, failed.baseline) {
            (PolicyAction::Reverted, Some(baseline)) => format!(
                "Could not move task {} to {}; it was returned to {}.",
                intent.task_id, intent.to, baseline
            ),
            _ => format!(
                "Could not save task {} as {}: {err}",
                intent.task_id, intent.to
            ),
        };
        emit(self.notifier.as_ref(), Notification::error(message));

        action
    }
}
