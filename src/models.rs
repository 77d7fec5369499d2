use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub type TaskId = String;

/// Title given to stored tasks whose title is blank.
pub const UNTITLED: &str = "(untitled)";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Sort key: lower ranks are listed first.
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Task {
    #[serde(default = "new_task_id")]
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub deadline: Option<NaiveDateTime>,
    #[serde(default)]
    pub remind_before_minutes: Option<u32>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default = "local_now")]
    pub created_at: NaiveDateTime,
}

impl Task {
    pub fn from_draft(draft: TaskDraft, now: NaiveDateTime) -> Self {
        Self {
            id: new_task_id(),
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            priority: draft.priority,
            deadline: draft.deadline,
            remind_before_minutes: draft.remind_before_minutes,
            completed: false,
            created_at: now,
        }
    }

    pub fn reminder_lead(&self) -> Option<Duration> {
        self.remind_before_minutes
            .map(|minutes| Duration::minutes(i64::from(minutes)))
    }

    /// The instant the reminder becomes due, if the task has both a deadline and a lead.
    pub fn remind_at(&self) -> Option<NaiveDateTime> {
        match (self.deadline, self.reminder_lead()) {
            (Some(deadline), Some(lead)) => deadline.checked_sub_signed(lead),
            _ => None,
        }
    }

    /// Brings a task read from disk back in line with what input validation
    /// allows. Past deadlines are kept. Returns the problems that were fixed.
    pub fn repair(&mut self) -> Vec<ValidationError> {
        let mut fixed = Vec::new();
        if self.title.trim().is_empty() {
            self.title = UNTITLED.to_string();
            fixed.push(ValidationError::EmptyTitle);
        }
        if let Err(problem) = validate_lead_shape(self.deadline, self.remind_before_minutes) {
            self.remind_before_minutes = None;
            fixed.push(problem);
        }
        fixed
    }

    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        match self.deadline {
            Some(deadline) => !self.completed && deadline < now,
            None => false,
        }
    }
}

/// User input for a new task, validated before it reaches the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub deadline: Option<NaiveDateTime>,
    pub remind_before_minutes: Option<u32>,
}

impl TaskDraft {
    pub fn validate(&self, now: NaiveDateTime) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        validate_schedule(self.deadline, self.remind_before_minutes, now)
    }
}

/// Partial edit. `None` leaves a field untouched; the nested options on
/// `deadline` and `remind_before_minutes` allow clearing them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub deadline: Option<Option<NaiveDateTime>>,
    pub remind_before_minutes: Option<Option<u32>>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn touches_schedule(&self) -> bool {
        self.deadline.is_some() || self.remind_before_minutes.is_some()
    }

    /// Builds the edited task without touching `task`, so a rejected patch
    /// leaves the stored value as it was.
    pub fn apply_to(&self, task: &Task, now: NaiveDateTime) -> Result<Task, ValidationError> {
        let mut next = task.clone();
        if let Some(title) = &self.title {
            next.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            next.description = description.trim().to_string();
        }
        if let Some(priority) = self.priority {
            next.priority = priority;
        }
        if let Some(deadline) = self.deadline {
            next.deadline = deadline;
        }
        if let Some(lead) = self.remind_before_minutes {
            next.remind_before_minutes = lead;
        }
        if let Some(completed) = self.completed {
            next.completed = completed;
        }

        if next.title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if self.touches_schedule() {
            validate_schedule(next.deadline, next.remind_before_minutes, now)?;
        } else {
            validate_lead_shape(next.deadline, next.remind_before_minutes)?;
        }
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("deadline {0} is not in the future")]
    DeadlineInPast(NaiveDateTime),
    #[error("a reminder needs a deadline")]
    ReminderWithoutDeadline,
    #[error("reminder lead must be at least one minute")]
    ZeroReminderLead,
    #[error("reminder lead of {lead_minutes} min exceeds the {available_minutes} min left until the deadline")]
    ReminderExceedsDeadline {
        lead_minutes: u32,
        available_minutes: i64,
    },
}

fn validate_lead_shape(
    deadline: Option<NaiveDateTime>,
    lead: Option<u32>,
) -> Result<(), ValidationError> {
    match (deadline, lead) {
        (None, Some(_)) => Err(ValidationError::ReminderWithoutDeadline),
        (_, Some(0)) => Err(ValidationError::ZeroReminderLead),
        _ => Ok(()),
    }
}

fn validate_schedule(
    deadline: Option<NaiveDateTime>,
    lead: Option<u32>,
    now: NaiveDateTime,
) -> Result<(), ValidationError> {
    validate_lead_shape(deadline, lead)?;
    let Some(deadline) = deadline else {
        return Ok(());
    };
    if deadline <= now {
        return Err(ValidationError::DeadlineInPast(deadline));
    }
    if let Some(lead_minutes) = lead {
        let available = deadline - now;
        if Duration::minutes(i64::from(lead_minutes)) > available {
            return Err(ValidationError::ReminderExceedsDeadline {
                lead_minutes,
                available_minutes: available.num_minutes(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_tasks_file")]
    pub tasks_file: String,
    #[serde(default)]
    pub default_priority: Priority,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            tasks_file: default_tasks_file(),
            default_priority: Priority::Medium,
        }
    }
}

fn default_tick_interval_secs() -> u64 {
    60
}

fn default_tasks_file() -> String {
    "tasks.json".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SettingsFile {
    pub schema_version: u32,
    pub settings: Settings,
}

pub fn new_task_id() -> TaskId {
    uuid::Uuid::new_v4().to_string()
}

pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}
