//! Task history: one record per settled query, newest first.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Time-derived task identifier (milliseconds since the epoch, kept unique)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_tag(&self) -> &'static str {
        match self {
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// The active task-visibility criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskFilter {
    #[default]
    All,
    Only(TaskStatus),
}

impl TaskFilter {
    pub fn all() -> Vec<TaskFilter> {
        vec![
            TaskFilter::All,
            TaskFilter::Only(TaskStatus::Completed),
            TaskFilter::Only(TaskStatus::Failed),
        ]
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_lowercase().as_str() {
            "all" => Some(TaskFilter::All),
            "completed" => Some(TaskFilter::Only(TaskStatus::Completed)),
            "failed" => Some(TaskFilter::Only(TaskStatus::Failed)),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            TaskFilter::All => "all",
            TaskFilter::Only(status) => status.as_tag(),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TaskFilter::All => "全部",
            TaskFilter::Only(TaskStatus::Completed) => "已完成",
            TaskFilter::Only(TaskStatus::Failed) => "失败",
        }
    }

    pub fn matches(&self, status: TaskStatus) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Only(wanted) => *wanted == status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Local>,
}

impl TaskRecord {
    /// Timestamp as shown in the task list, e.g. `2024-05-01 09:30`
    pub fn time_label(&self) -> String {
        self.created_at.format("%Y-%m-%d %H:%M").to_string()
    }
}

#[derive(Debug, Default)]
pub struct TaskHistory {
    records: Vec<TaskRecord>,
    filter: TaskFilter,
    last_id: Option<i64>,
}

impl TaskHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_completed(&mut self, title: &str) -> TaskId {
        self.record(title, TaskStatus::Completed, Local::now())
    }

    pub fn record_failed(&mut self, title: &str) -> TaskId {
        self.record(title, TaskStatus::Failed, Local::now())
    }

    /// Prepend a record stamped with `created_at`.
    pub fn record(&mut self, title: &str, status: TaskStatus, created_at: DateTime<Local>) -> TaskId {
        let id = self.next_id(created_at.timestamp_millis());
        self.records.insert(
            0,
            TaskRecord {
                id,
                title: title.to_string(),
                status,
                created_at,
            },
        );
        debug!(task_id = id.0, status = status.as_tag(), "task recorded");
        id
    }

    /// All records, newest first, regardless of the filter
    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn filter(&self) -> TaskFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        debug!(filter = filter.as_tag(), "task filter changed");
        self.filter = filter;
    }

    pub fn is_visible(&self, record: &TaskRecord) -> bool {
        self.filter.matches(record.status)
    }

    /// Records passing the active filter, newest first
    pub fn visible(&self) -> impl Iterator<Item = &TaskRecord> {
        self.records.iter().filter(|r| self.is_visible(r))
    }

    pub fn visible_count(&self) -> usize {
        self.visible().count()
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Title of the record to re-run. Nothing is resubmitted or modified.
    pub fn rerun(&self, id: TaskId) -> Option<&str> {
        self.get(id).map(|r| r.title.as_str())
    }

    fn next_id(&mut self, millis: i64) -> TaskId {
        let id = match self.last_id {
            Some(last) if millis <= last => last + 1,
            _ => millis,
        };
        self.last_id = Some(id);
        TaskId(id)
    }
}
