use chrono::NaiveDateTime;

use crate::models::{Priority, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// The reminder lead time before the deadline has elapsed.
    Reminder,
    Overdue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub task_id: TaskId,
    pub title: String,
    pub priority: Priority,
    pub deadline: NaiveDateTime,
}

impl Notification {
    pub fn for_task(kind: NotificationKind, task: &Task) -> Option<Self> {
        Some(Self {
            kind,
            task_id: task.id.clone(),
            title: task.title.clone(),
            priority: task.priority,
            deadline: task.deadline?,
        })
    }
}

/// Snapshot summary sent after every successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatePayload {
    pub total: usize,
    pub overdue_count: usize,
}

/// What one scheduler tick hands back to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub notifications: Vec<Notification>,
    pub overdue_count: usize,
}

impl TickReport {
    pub fn is_quiet(&self) -> bool {
        self.notifications.is_empty()
    }
}
