//! Line-oriented front end: turns typed lines into commands and renders
//! tasks and notifications as plain text.

use chrono::NaiveDateTime;

use crate::events::{Notification, NotificationKind};
use crate::input::{
    format_lead, parse_deadline, parse_filter, parse_lead, parse_priority, InputError,
};
use crate::models::{Priority, Task, TaskDraft, TaskPatch};
use crate::state::TaskFilter;

pub const APP_TITLE: &str = "todo-minder";

pub const HELP: &str = "\
commands:
  add <title> [desc=..] [priority=high|medium|low] [due=YYYY-MM-DD[ HH:MM]] [remind=30m]
  edit <id> [title=..] [desc=..] [priority=..] [due=..|none] [remind=..|none]
  done <id>            mark complete
  toggle <id>          flip complete/pending
  rm <id>              delete
  show <id>            full details
  ls [all|high|medium|low|overdue|completed|pending]
  help
  quit
ids may be shortened to a unique prefix of 4+ characters; quote values with spaces: desc=\"call back\"";

const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Add(TaskDraft),
    Edit { id: String, patch: TaskPatch },
    Done(String),
    Toggle(String),
    Remove(String),
    Show(String),
    List(TaskFilter),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command {0:?}, try 'help'")]
    UnknownCommand(String),
    #[error("'{0}' needs a task id")]
    MissingId(&'static str),
    #[error("a title is required")]
    MissingTitle,
    #[error("unknown field {0:?}")]
    UnknownField(String),
    #[error("unterminated quote")]
    UnterminatedQuote,
    #[error(transparent)]
    Input(#[from] InputError),
}

/// Splits on whitespace; double quotes group words and `\"` escapes a quote.
pub fn tokenize(line: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if quoted => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if quoted {
        return Err(ParseError::UnterminatedQuote);
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Returns `Ok(None)` for a blank line.
pub fn parse_command(
    line: &str,
    default_priority: Priority,
) -> Result<Option<ConsoleCommand>, ParseError> {
    let tokens = tokenize(line)?;
    let Some((name, args)) = tokens.split_first() else {
        return Ok(None);
    };
    let command = match name.to_lowercase().as_str() {
        "add" | "new" => ConsoleCommand::Add(parse_draft(args, default_priority)?),
        "edit" => {
            let (id, fields) = args.split_first().ok_or(ParseError::MissingId("edit"))?;
            ConsoleCommand::Edit {
                id: id.clone(),
                patch: parse_patch(fields)?,
            }
        }
        "done" | "complete" => ConsoleCommand::Done(single_id(args, "done")?),
        "toggle" => ConsoleCommand::Toggle(single_id(args, "toggle")?),
        "rm" | "delete" | "del" => ConsoleCommand::Remove(single_id(args, "rm")?),
        "show" => ConsoleCommand::Show(single_id(args, "show")?),
        "ls" | "list" => {
            let filter = args.first().map(String::as_str).unwrap_or("all");
            ConsoleCommand::List(parse_filter(filter)?)
        }
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

fn single_id(args: &[String], command: &'static str) -> Result<String, ParseError> {
    args.first().cloned().ok_or(ParseError::MissingId(command))
}

fn split_field(token: &str) -> Option<(String, &str)> {
    token
        .split_once('=')
        .map(|(key, value)| (key.trim().to_lowercase(), value))
}

fn parse_draft(args: &[String], default_priority: Priority) -> Result<TaskDraft, ParseError> {
    let mut draft = TaskDraft {
        priority: default_priority,
        ..TaskDraft::default()
    };
    let mut title_words = Vec::new();
    for token in args {
        let Some((key, value)) = split_field(token) else {
            title_words.push(token.as_str());
            continue;
        };
        match key.as_str() {
            "title" => title_words.push(value),
            "desc" | "description" => draft.description = value.to_string(),
            "priority" | "p" => draft.priority = parse_priority(value)?,
            "due" | "deadline" => draft.deadline = parse_deadline(value)?,
            "remind" | "reminder" => draft.remind_before_minutes = parse_lead(value)?,
            _ => return Err(ParseError::UnknownField(key)),
        }
    }
    draft.title = title_words.join(" ");
    if draft.title.trim().is_empty() {
        return Err(ParseError::MissingTitle);
    }
    Ok(draft)
}

fn parse_patch(args: &[String]) -> Result<TaskPatch, ParseError> {
    let mut patch = TaskPatch::default();
    for token in args {
        let (key, value) =
            split_field(token).ok_or_else(|| ParseError::UnknownField(token.clone()))?;
        match key.as_str() {
            "title" => patch.title = Some(value.to_string()),
            "desc" | "description" => patch.description = Some(value.to_string()),
            "priority" | "p" => patch.priority = Some(parse_priority(value)?),
            "due" | "deadline" => patch.deadline = Some(parse_deadline(value)?),
            "remind" | "reminder" => patch.remind_before_minutes = Some(parse_lead(value)?),
            _ => return Err(ParseError::UnknownField(key)),
        }
    }
    Ok(patch)
}

pub fn short_id(task: &Task) -> &str {
    task.id.get(..SHORT_ID_LEN).unwrap_or(&task.id)
}

fn priority_mark(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "!!!",
        Priority::Medium => "!! ",
        Priority::Low => "!  ",
    }
}

/// One list row: id, status, priority, title, deadline and a bell while a
/// reminder is still ahead.
pub fn render_task_line(task: &Task, now: NaiveDateTime) -> String {
    let status = if task.completed { "x" } else { " " };
    let mut line = format!(
        "{}  [{status}] {} {}",
        short_id(task),
        priority_mark(task.priority),
        task.title
    );
    if let Some(deadline) = task.deadline {
        let when = deadline.format("%m/%d %H:%M");
        if task.is_overdue(now) {
            line.push_str(&format!("  OVERDUE ({when})"));
        } else {
            line.push_str(&format!("  due {when}"));
        }
    }
    let reminder_ahead = task.remind_at().is_some_and(|remind_at| now < remind_at);
    if !task.completed && reminder_ahead {
        line.push_str("  (bell)");
    }
    line
}

pub fn render_task_details(task: &Task, now: NaiveDateTime) -> Vec<String> {
    let description = if task.description.is_empty() {
        "No description"
    } else {
        task.description.as_str()
    };
    let deadline = match task.deadline {
        Some(deadline) if task.is_overdue(now) => {
            format!("{} (OVERDUE)", deadline.format("%Y-%m-%d %H:%M"))
        }
        Some(deadline) => deadline.format("%Y-%m-%d %H:%M").to_string(),
        None => "No deadline".to_string(),
    };
    let reminder = match task.remind_before_minutes {
        Some(minutes) => format!("{} before deadline", format_lead(minutes)),
        None => "off".to_string(),
    };
    let status = if task.completed { "Completed" } else { "Pending" };
    vec![
        format!("Title:       {}", task.title),
        format!("Description: {description}"),
        format!("Priority:    {}", task.priority.as_str()),
        format!("Deadline:    {deadline}"),
        format!("Reminder:    {reminder}"),
        format!("Status:      {status}"),
        format!("Created:     {}", task.created_at.format("%Y-%m-%d %H:%M")),
        format!("Id:          {}", task.id),
    ]
}

pub fn render_notification(notification: &Notification) -> String {
    let label = match notification.kind {
        NotificationKind::Reminder => "Deadline approaching",
        NotificationKind::Overdue => "Task overdue",
    };
    format!(
        "*** {label}: {} | deadline {} | priority {} ***",
        notification.title,
        notification.deadline.format("%Y-%m-%d %H:%M"),
        notification.priority.as_str()
    )
}

pub fn status_line(overdue_count: usize) -> String {
    if overdue_count > 0 {
        format!("{APP_TITLE} - {overdue_count} overdue task(s)")
    } else {
        APP_TITLE.to_string()
    }
}
