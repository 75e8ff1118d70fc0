use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Server-assigned task identifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(TaskId)
    }
}

/// Lifecycle state of a task. The wire codes double as lane identifiers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub enum TaskStatus {
    #[serde(rename = "A")]
    ToDo,
    #[serde(rename = "F")]
    Doing,
    #[serde(rename = "P")]
    Done,
}

impl TaskStatus {
    /// Board order, left to right.
    pub const ALL: [TaskStatus; 3] = [TaskStatus::ToDo, TaskStatus::Doing, TaskStatus::Done];

    pub fn code(self) -> &'static str {
        match self {
            TaskStatus::ToDo => "A",
            TaskStatus::Doing => "F",
            TaskStatus::Done => "P",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::ToDo => "To Do",
            TaskStatus::Doing => "Doing",
            TaskStatus::Done => "Done",
        }
    }

    pub fn index(self) -> usize {
        match self {
            TaskStatus::ToDo => 0,
            TaskStatus::Doing => 1,
            TaskStatus::Done => 2,
        }
    }

    /// Strict lookup by wire code; this is what lane ids must match.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(TaskStatus::ToDo),
            "F" => Some(TaskStatus::Doing),
            "P" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lenient parse for human input: accepts wire codes and lane names.
impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(status) = Self::from_code(trimmed) {
            return Ok(status);
        }
        match trimmed.to_ascii_lowercase().replace([' ', '-', '_'], "").as_str() {
            "todo" | "afazer" => Ok(TaskStatus::ToDo),
            "doing" | "fazendo" => Ok(TaskStatus::Doing),
            "done" | "pronto" => Ok(TaskStatus::Done),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Default)]
pub enum Priority {
    #[default]
    #[serde(rename = "B")]
    Low,
    #[serde(rename = "M")]
    Medium,
    #[serde(rename = "A")]
    High,
}

impl Priority {
    pub fn code(self) -> &'static str {
        match self {
            Priority::Low => "B",
            Priority::Medium => "M",
            Priority::High => "A",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "B" => return Ok(Priority::Low),
            "M" => return Ok(Priority::Medium),
            "A" => return Ok(Priority::High),
            _ => {}
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "baixa" => Ok(Priority::Low),
            "medium" | "média" | "media" => Ok(Priority::Medium),
            "high" | "alta" => Ok(Priority::High),
            _ => Err(()),
        }
    }
}

/// A task as served by `/api/tarefa/`.
///
/// Decoding is lenient so one odd record never sinks a whole listing:
/// `status` keeps the raw wire code (see [`Task::lane_status`]), null text
/// fields read as empty, and an unrecognised `prioridade` reads as
/// [`Priority::High`].
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "nome", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "descricao", default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "nomeSetor", default, deserialize_with = "null_as_default")]
    pub sector: String,
    #[serde(rename = "prioridade", default, deserialize_with = "lenient_priority")]
    pub priority: Priority,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(rename = "usuario", default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<i64>,
    #[serde(
        rename = "usuario_nome",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub assignee_name: Option<String>,
}

impl Task {
    pub fn lane_status(&self) -> Option<TaskStatus> {
        TaskStatus::from_code(&self.status)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Anything other than a known code or name is treated as high priority,
/// matching how the task service's own edit form reads it.
fn lenient_priority<'de, D>(deserializer: D) -> Result<Priority, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw
        .as_str()
        .and_then(|value| value.parse::<Priority>().ok())
        .unwrap_or(Priority::High))
}

/// Read-only user reference from `/api/usuario/`.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct User {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
}

/// Body of `POST /api/tarefa/`. New tasks always start in the to-do lane.
#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct TaskDraft {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "nomeSetor")]
    pub sector: String,
    #[serde(rename = "prioridade")]
    pub priority: Priority,
    status: TaskStatus,
    #[serde(rename = "usuario")]
    pub assignee: i64,
}

impl TaskDraft {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        sector: impl Into<String>,
        priority: Priority,
        assignee: i64,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            sector: sector.into(),
            priority,
            status: TaskStatus::ToDo,
            assignee,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }
}

/// Body of `PATCH /api/tarefa/{id}/`. Absent fields are left out of the JSON.
#[derive(Debug, Clone, Serialize, Eq, PartialEq, Default)]
pub struct TaskPatch {
    #[serde(rename = "prioridade", skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    pub fn status_only(status: TaskStatus) -> Self {
        Self {
            priority: None,
            status: Some(status),
        }
    }
}
