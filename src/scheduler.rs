use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::time::{Interval, MissedTickBehavior};

use crate::events::{Notification, NotificationKind, TickReport};
use crate::models::{local_now, Task, TaskId};

/// Source of "now" for the scheduler, swapped for a fixed clock in tests.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        local_now()
    }
}

#[derive(Debug, Clone)]
pub struct FixedClock {
    now: std::cell::Cell<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: std::cell::Cell::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        self.now.set(now);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    NotDue,
    ReminderPending,
    ReminderFired,
    Overdue,
}

impl ReminderState {
    /// `ReminderFired` is `ReminderPending` after its notification went out.
    fn settled(self) -> Self {
        match self {
            ReminderState::ReminderFired => ReminderState::ReminderPending,
            other => other,
        }
    }
}

/// Where a task stands at `now`, from wall-clock comparison alone.
pub fn classify(task: &Task, now: NaiveDateTime) -> ReminderState {
    if task.completed {
        return ReminderState::NotDue;
    }
    let Some(deadline) = task.deadline else {
        return ReminderState::NotDue;
    };
    if deadline < now {
        return ReminderState::Overdue;
    }
    match task.remind_at() {
        Some(remind_at) if now >= remind_at => ReminderState::ReminderPending,
        _ => ReminderState::NotDue,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub task_id: TaskId,
    pub from: ReminderState,
    pub to: ReminderState,
    pub notification: Option<Notification>,
}

/// Per-session scheduler memory: the last state seen for each task.
#[derive(Debug, Default)]
pub struct ReminderTracker {
    states: HashMap<TaskId, ReminderState>,
}

impl ReminderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_of(&self, task_id: &str) -> ReminderState {
        self.states
            .get(task_id)
            .copied()
            .unwrap_or(ReminderState::NotDue)
    }

    /// Computes transitions for `tasks` at `now` without recording them.
    pub fn evaluate(&self, tasks: &[Task], now: NaiveDateTime) -> Vec<Transition> {
        let mut transitions = Vec::new();
        for task in tasks {
            let from = self.state_of(&task.id);
            let to = classify(task, now);
            if from.settled() == to {
                continue;
            }
            let notification = match to {
                ReminderState::ReminderPending => {
                    Notification::for_task(NotificationKind::Reminder, task)
                }
                ReminderState::Overdue => Notification::for_task(NotificationKind::Overdue, task),
                ReminderState::NotDue | ReminderState::ReminderFired => None,
            };
            transitions.push(Transition {
                task_id: task.id.clone(),
                from,
                to,
                notification,
            });
        }
        transitions
    }

    pub fn apply(&mut self, transitions: &[Transition]) {
        for transition in transitions {
            let recorded = match (transition.to, &transition.notification) {
                (ReminderState::ReminderPending, Some(_)) => ReminderState::ReminderFired,
                (state, _) => state,
            };
            if recorded == ReminderState::NotDue {
                self.states.remove(&transition.task_id);
            } else {
                self.states.insert(transition.task_id.clone(), recorded);
            }
        }
    }

    /// Drops entries for tasks that no longer exist.
    pub fn retain_known(&mut self, tasks: &[Task]) {
        self.states
            .retain(|task_id, _| tasks.iter().any(|task| &task.id == task_id));
    }

    /// One scheduler firing: evaluate, record, and report what to show.
    pub fn tick(&mut self, tasks: &[Task], now: NaiveDateTime) -> TickReport {
        self.retain_known(tasks);
        let transitions = self.evaluate(tasks, now);
        self.apply(&transitions);
        for transition in &transitions {
            log::debug!(
                "task transition id={} from={:?} to={:?}",
                transition.task_id,
                transition.from,
                transition.to
            );
        }
        TickReport {
            notifications: transitions
                .into_iter()
                .filter_map(|transition| transition.notification)
                .collect(),
            overdue_count: tasks.iter().filter(|task| task.is_overdue(now)).count(),
        }
    }
}

/// The repeating timer behind the scheduler tick. Missed ticks are skipped
/// rather than replayed in a burst.
pub fn tick_interval(period_secs: u64) -> Interval {
    let mut interval = tokio::time::interval(Duration::from_secs(period_secs.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}
