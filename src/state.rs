use std::cmp::Ordering;

use chrono::NaiveDateTime;

use crate::models::{Priority, Task, TaskDraft, TaskId, TaskPatch, ValidationError};

const MIN_ID_PREFIX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter {
    All,
    Priority(Priority),
    Overdue,
    Completed,
    Pending,
}

impl TaskFilter {
    pub fn matches(self, task: &Task, now: NaiveDateTime) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Priority(priority) => task.priority == priority,
            TaskFilter::Overdue => task.is_overdue(now),
            TaskFilter::Completed => task.completed,
            TaskFilter::Pending => !task.completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("id prefix {prefix} matches {matches} tasks")]
    AmbiguousId { prefix: String, matches: usize },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// The in-memory task list. Owned by the event loop; every mutation is
/// followed by a full snapshot save in `commands`.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        let mut store = Self { tasks: Vec::new() };
        store.replace_tasks(tasks);
        store
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

    /// Replaces the whole list. Later duplicates of an id are dropped and
    /// invalid records are repaired.
    pub fn replace_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks.clear();
        for mut task in tasks {
            if self.tasks.iter().any(|existing| existing.id == task.id) {
                log::warn!("dropping task with duplicate id={}", task.id);
                continue;
            }
            for problem in task.repair() {
                log::warn!("repaired stored task id={}: {problem}", task.id);
            }
            self.tasks.push(task);
        }
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    /// Accepts a full id or a unique prefix of at least four characters.
    pub fn resolve(&self, id_or_prefix: &str) -> Result<TaskId, StoreError> {
        let needle = id_or_prefix.trim();
        if let Some(task) = self.get(needle) {
            return Ok(task.id.clone());
        }
        if needle.len() < MIN_ID_PREFIX {
            return Err(StoreError::NotFound(needle.to_string()));
        }
        let mut matches = self.tasks.iter().filter(|task| task.id.starts_with(needle));
        match (matches.next(), matches.count()) {
            (None, _) => Err(StoreError::NotFound(needle.to_string())),
            (Some(task), 0) => Ok(task.id.clone()),
            (Some(_), rest) => Err(StoreError::AmbiguousId {
                prefix: needle.to_string(),
                matches: rest + 1,
            }),
        }
    }

    pub fn add(&mut self, draft: TaskDraft, now: NaiveDateTime) -> Result<Task, StoreError> {
        draft.validate(now)?;
        let task = Task::from_draft(draft, now);
        self.tasks.push(task.clone());
        Ok(task)
    }

    pub fn update(
        &mut self,
        task_id: &str,
        patch: &TaskPatch,
        now: NaiveDateTime,
    ) -> Result<Task, StoreError> {
        let existing = self
            .tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        let next = patch.apply_to(existing, now)?;
        *existing = next.clone();
        Ok(next)
    }

    pub fn set_completed(&mut self, task_id: &str, completed: bool) -> Result<Task, StoreError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        task.completed = completed;
        Ok(task.clone())
    }

    pub fn complete(&mut self, task_id: &str) -> Result<Task, StoreError> {
        self.set_completed(task_id, true)
    }

    pub fn toggle(&mut self, task_id: &str) -> Result<Task, StoreError> {
        let completed = self
            .get(task_id)
            .map(|task| task.completed)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        self.set_completed(task_id, !completed)
    }

    pub fn remove(&mut self, task_id: &str) -> Result<Task, StoreError> {
        let index = self
            .tasks
            .iter()
            .position(|task| task.id == task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        Ok(self.tasks.remove(index))
    }

    /// Tasks matching `filter`, highest priority first, then earliest deadline
    /// (tasks without one last), then title ignoring case.
    pub fn list(&self, filter: TaskFilter, now: NaiveDateTime) -> Vec<&Task> {
        let mut out: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|task| filter.matches(task, now))
            .collect();
        out.sort_by(|a, b| display_order(a, b));
        out
    }

    pub fn overdue_count(&self, now: NaiveDateTime) -> usize {
        self.tasks.iter().filter(|task| task.is_overdue(now)).count()
    }
}

fn display_order(a: &Task, b: &Task) -> Ordering {
    a.priority
        .rank()
        .cmp(&b.priority.rank())
        .then_with(|| match (a.deadline, b.deadline) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn make_task(id: &str, priority: Priority, deadline: Option<NaiveDateTime>) -> Task {
        Task {
            id: id.to_string(),
            title: format!("task-{id}"),
            description: String::new(),
            priority,
            deadline,
            remind_before_minutes: None,
            completed: false,
            created_at: at(0, 0),
        }
    }

    fn ids(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|task| task.id.clone()).collect()
    }

    #[test]
    fn new_drops_duplicate_ids() {
        let store = TaskStore::new(vec![
            make_task("a", Priority::Low, None),
            make_task("a", Priority::High, None),
            make_task("b", Priority::Low, None),
        ]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").unwrap().priority, Priority::Low);
    }

    #[test]
    fn new_repairs_invalid_records() {
        let mut blank = make_task("a", Priority::Low, None);
        blank.title = String::new();
        let mut zero = make_task("b", Priority::Low, Some(at(10, 0)));
        zero.remind_before_minutes = Some(0);
        let mut orphan = make_task("c", Priority::Low, None);
        orphan.remind_before_minutes = Some(15);

        let store = TaskStore::new(vec![blank, zero, orphan]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("a").unwrap().title, crate::models::UNTITLED);
        assert_eq!(store.get("b").unwrap().remind_before_minutes, None);
        assert_eq!(store.get("c").unwrap().remind_before_minutes, None);
    }

    #[test]
    fn add_validates_before_inserting() {
        let mut store = TaskStore::default();
        let now = at(9, 0);

        let err = store
            .add(
                TaskDraft {
                    title: "".to_string(),
                    ..TaskDraft::default()
                },
                now,
            )
            .unwrap_err();
        assert_eq!(err, StoreError::Invalid(ValidationError::EmptyTitle));
        assert!(store.is_empty());

        let task = store
            .add(
                TaskDraft {
                    title: "ship".to_string(),
                    deadline: Some(at(10, 0)),
                    remind_before_minutes: Some(30),
                    ..TaskDraft::default()
                },
                now,
            )
            .unwrap();
        assert_eq!(store.get(&task.id), Some(&task));
        assert_eq!(task.created_at, now);
    }

    #[test]
    fn update_applies_patch_or_leaves_task_untouched() {
        let mut store = TaskStore::new(vec![make_task("a", Priority::Low, Some(at(10, 0)))]);
        let patch = TaskPatch {
            priority: Some(Priority::High),
            description: Some("  notes ".to_string()),
            ..TaskPatch::default()
        };
        let updated = store.update("a", &patch, at(9, 0)).unwrap();
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.description, "notes");

        let bad = TaskPatch {
            title: Some(String::new()),
            ..TaskPatch::default()
        };
        assert!(store.update("a", &bad, at(9, 0)).is_err());
        assert_eq!(store.get("a").unwrap().title, "task-a");

        assert_eq!(
            store.update("missing", &patch, at(9, 0)),
            Err(StoreError::NotFound("missing".to_string()))
        );
    }

    #[test]
    fn overdue_filter_includes_past_deadlines_until_completed() {
        let now = at(12, 0);
        let mut store = TaskStore::new(vec![
            make_task("past", Priority::Medium, Some(at(11, 0))),
            make_task("future", Priority::Medium, Some(at(13, 0))),
            make_task("none", Priority::Medium, None),
        ]);

        assert_eq!(ids(&store.list(TaskFilter::Overdue, now)), vec!["past"]);
        assert_eq!(store.overdue_count(now), 1);

        store.complete("past").unwrap();
        assert!(store.list(TaskFilter::Overdue, now).is_empty());
        assert_eq!(ids(&store.list(TaskFilter::Completed, now)), vec!["past"]);
        assert_eq!(store.list(TaskFilter::Pending, now).len(), 2);

        store.toggle("past").unwrap();
        assert_eq!(ids(&store.list(TaskFilter::Overdue, now)), vec!["past"]);
    }

    #[test]
    fn remove_drops_task_from_every_filter() {
        let now = at(12, 0);
        let mut store = TaskStore::new(vec![
            make_task("a", Priority::High, Some(at(11, 0))),
            make_task("b", Priority::Low, None),
        ]);
        let removed = store.remove("a").unwrap();
        assert_eq!(removed.id, "a");

        for filter in [
            TaskFilter::All,
            TaskFilter::Priority(Priority::High),
            TaskFilter::Overdue,
            TaskFilter::Completed,
            TaskFilter::Pending,
        ] {
            assert!(store.list(filter, now).iter().all(|task| task.id != "a"));
        }
        assert!(store.remove("a").is_err());
    }

    #[test]
    fn list_sorts_by_priority_then_deadline_then_title() {
        let now = at(0, 0);
        let mut lower = make_task("c", Priority::High, None);
        lower.title = "alpha".to_string();
        let mut upper = make_task("d", Priority::High, None);
        upper.title = "Beta".to_string();
        let store = TaskStore::new(vec![
            make_task("low", Priority::Low, Some(at(1, 0))),
            upper,
            make_task("late", Priority::High, Some(at(5, 0))),
            lower,
            make_task("soon", Priority::High, Some(at(2, 0))),
            make_task("mid", Priority::Medium, None),
        ]);
        assert_eq!(
            ids(&store.list(TaskFilter::All, now)),
            vec!["soon", "late", "c", "d", "mid", "low"]
        );
        assert_eq!(
            ids(&store.list(TaskFilter::Priority(Priority::Low), now)),
            vec!["low"]
        );
    }

    #[test]
    fn resolve_accepts_unique_prefixes_only() {
        let store = TaskStore::new(vec![
            make_task("abcd-1111", Priority::Low, None),
            make_task("abcd-2222", Priority::Low, None),
            make_task("ffff-0000", Priority::Low, None),
        ]);
        assert_eq!(store.resolve("abcd-1111").unwrap(), "abcd-1111");
        assert_eq!(store.resolve("ffff").unwrap(), "ffff-0000");
        assert_eq!(
            store.resolve("abcd"),
            Err(StoreError::AmbiguousId {
                prefix: "abcd".to_string(),
                matches: 2
            })
        );
        assert!(matches!(store.resolve("ff"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.resolve("zzzz"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn toggle_flips_completion_both_ways() {
        let mut store = TaskStore::new(vec![make_task("a", Priority::Low, None)]);
        assert!(store.toggle("a").unwrap().completed);
        assert!(!store.toggle("a").unwrap().completed);
        assert!(store.toggle("zzz").is_err());
    }
}
