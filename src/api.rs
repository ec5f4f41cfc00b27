// Request validation, dispatch, and the uniform response envelope

use chrono::{DateTime, Utc};
use eyre::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{error, warn};

use crate::clock::{timestamp, Clock};
use crate::export::{self, CsvExport};
use crate::filter::{ExportCriteria, TaskCriteria};
use crate::import::import_tasks;
use crate::store::TaskStore;
use crate::task::{parse_date, NewTask, Priority, Status};

/// Uniform operation result: success flag, human-readable message, request
/// timestamp, and operation-specific fields flattened alongside them.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Envelope {
    fn new(success: bool, message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Envelope {
            success,
            message: message.into(),
            timestamp: timestamp(now),
            data: Map::new(),
        }
    }

    fn field(mut self, key: &str, value: impl Serialize) -> Self {
        self.data.insert(
            key.to_string(),
            serde_json::to_value(value).unwrap_or(Value::Null),
        );
        self
    }
}

/// Raw create/update request body. Loosely typed on purpose: validation
/// turns it into a `NewTask` or a specific error message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskInput {
    pub title: String,
    pub description: Option<String>,
    pub task_date: String,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
}

fn task_from_input(input: &TaskInput) -> Result<NewTask, &'static str> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err("Task title is required");
    }

    if input.task_date.is_empty() {
        return Err("Task date is required");
    }
    let Some(task_date) = parse_date(&input.task_date) else {
        return Err("Invalid task date format");
    };

    let due_date = match input.due_date.as_deref().filter(|raw| !raw.is_empty()) {
        Some(raw) => match parse_date(raw) {
            Some(date) => Some(date),
            None => return Err("Invalid due date format"),
        },
        None => None,
    };

    let priority = Priority::parse_or_default(input.priority.as_deref().unwrap_or(""));
    let status = Status::parse_or_default(input.status.as_deref().unwrap_or(""));

    Ok(NewTask::from_status(
        title.to_string(),
        input.description.as_deref().unwrap_or("").trim().to_string(),
        task_date,
        due_date,
        priority,
        input.category.as_deref().unwrap_or("").trim().to_string(),
        status,
    ))
}

/// Operation surface over a task store.
///
/// Every handler reads the clock once, validates before touching the store,
/// and terminates in an `Envelope`. Storage detail is logged, never echoed.
pub struct Api<C: Clock> {
    store: TaskStore,
    clock: C,
}

impl<C: Clock> Api<C> {
    pub fn new(store: TaskStore, clock: C) -> Self {
        Api { store, clock }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    fn storage_failure(
        &self,
        operation: &str,
        err: Report,
        message: &str,
        now: DateTime<Utc>,
    ) -> Envelope {
        error!(operation, error = %err, "storage operation failed");
        Envelope::new(false, message, now)
    }

    pub fn list_by_month(&self, month: i64, year: i64) -> Envelope {
        let now = self.clock.now();

        if !(1..=12).contains(&month) {
            return Envelope::new(false, "Invalid month", now);
        }
        if !(2000..=2100).contains(&year) {
            return Envelope::new(false, "Invalid year", now);
        }

        match self.store.tasks_for_month(month as u32, year as i32) {
            Ok(tasks) => Envelope::new(true, "Tasks retrieved successfully", now)
                .field("tasks", &tasks)
                .field("count", tasks.len())
                .field("month", month)
                .field("year", year),
            Err(e) => self.storage_failure("list_by_month", e, "Failed to retrieve tasks", now),
        }
    }

    pub fn list_by_date(&self, date: &str) -> Envelope {
        let now = self.clock.now();

        let Some(parsed) = parse_date(date) else {
            return Envelope::new(false, "Invalid date format. Use Y-m-d format.", now);
        };

        match self.store.tasks_for_date(parsed) {
            Ok(tasks) => Envelope::new(true, "Tasks retrieved successfully", now)
                .field("tasks", &tasks)
                .field("count", tasks.len())
                .field("date", date),
            Err(e) => self.storage_failure("list_by_date", e, "Failed to retrieve tasks", now),
        }
    }

    pub fn create(&self, input: &TaskInput) -> Envelope {
        let now = self.clock.now();

        let task = match task_from_input(input) {
            Ok(task) => task,
            Err(message) => return Envelope::new(false, message, now),
        };

        match self.store.insert(&task, now) {
            Ok(id) => Envelope::new(true, "Task added successfully", now).field("id", id),
            Err(e) => self.storage_failure("create", e, "Failed to add task", now),
        }
    }

    pub fn update(&self, id: i64, input: &TaskInput) -> Envelope {
        let now = self.clock.now();

        if id <= 0 {
            return Envelope::new(false, "Task ID is required", now);
        }

        let task = match task_from_input(input) {
            Ok(task) => task,
            Err(message) => return Envelope::new(false, message, now),
        };

        match self.store.update(id, &task, now) {
            Ok(_) => Envelope::new(true, "Task updated successfully", now),
            Err(e) => self.storage_failure("update", e, "Failed to update task", now),
        }
    }

    pub fn delete(&self, id: i64) -> Envelope {
        let now = self.clock.now();

        if id <= 0 {
            return Envelope::new(false, "Valid task ID is required", now);
        }

        match self.store.delete(id) {
            Ok(rows) if rows > 0 => Envelope::new(true, "Task deleted successfully", now),
            Ok(_) => Envelope::new(false, "Task not found or already deleted", now),
            Err(e) => self.storage_failure("delete", e, "Failed to delete task", now),
        }
    }

    pub fn toggle_complete(&self, id: i64) -> Envelope {
        let now = self.clock.now();

        if id <= 0 {
            return Envelope::new(false, "Valid task ID is required", now);
        }

        match self.store.toggle_complete(id, now) {
            Ok(rows) if rows > 0 => {
                Envelope::new(true, "Task status updated successfully", now)
            }
            Ok(_) => Envelope::new(false, "Task not found", now),
            Err(e) => {
                self.storage_failure("toggle_complete", e, "Failed to update task status", now)
            }
        }
    }

    pub fn filter(&self, criteria: &TaskCriteria) -> Envelope {
        let now = self.clock.now();

        match self.store.filter(criteria) {
            Ok(tasks) => Envelope::new(true, "Tasks filtered successfully", now)
                .field("tasks", &tasks)
                .field("count", tasks.len())
                .field("filters", criteria.summary()),
            Err(e) => self.storage_failure("filter", e, "Failed to filter tasks", now),
        }
    }

    pub fn categories(&self) -> Envelope {
        let now = self.clock.now();

        match self.store.categories() {
            Ok(categories) => Envelope::new(true, "Categories retrieved successfully", now)
                .field("categories", &categories)
                .field("count", categories.len()),
            Err(e) => {
                self.storage_failure("categories", e, "Failed to retrieve categories", now)
            }
        }
    }

    pub fn statistics(&self) -> Envelope {
        let now = self.clock.now();

        match self.store.statistics() {
            Ok(stats) => Envelope::new(true, "Statistics retrieved successfully", now)
                .field("statistics", stats),
            Err(e) => {
                self.storage_failure("statistics", e, "Failed to retrieve statistics", now)
            }
        }
    }

    pub fn overdue(&self) -> Envelope {
        let now = self.clock.now();

        match self.store.overdue(now.date_naive()) {
            Ok(tasks) => Envelope::new(true, "Overdue tasks retrieved successfully", now)
                .field("tasks", &tasks)
                .field("count", tasks.len()),
            Err(e) => {
                self.storage_failure("overdue", e, "Failed to retrieve overdue tasks", now)
            }
        }
    }

    pub fn upcoming(&self) -> Envelope {
        let now = self.clock.now();

        match self.store.upcoming(now.date_naive()) {
            Ok(tasks) => Envelope::new(true, "Upcoming tasks retrieved successfully", now)
                .field("tasks", &tasks)
                .field("count", tasks.len()),
            Err(e) => {
                self.storage_failure("upcoming", e, "Failed to retrieve upcoming tasks", now)
            }
        }
    }

    /// Full-table CSV export; the error side is a ready-to-send envelope
    pub fn export_all(&self) -> Result<CsvExport, Envelope> {
        let now = self.clock.now();
        export::export_all(&self.store, now)
            .map_err(|e| self.storage_failure("export_all", e, "Failed to export tasks", now))
    }

    /// Filtered CSV export over the reduced criteria set
    pub fn export_filtered(&self, criteria: &ExportCriteria) -> Result<CsvExport, Envelope> {
        let now = self.clock.now();
        export::export_filtered(&self.store, criteria, now).map_err(|e| {
            self.storage_failure("export_filtered", e, "Failed to export filtered tasks", now)
        })
    }

    /// Import tasks from a CSV file on disk.
    ///
    /// Gates out non-CSV uploads before parsing; per-row outcomes are
    /// reported through the envelope, not as errors.
    pub fn import(&self, path: &Path) -> Envelope {
        let now = self.clock.now();

        let looks_like_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "csv" | "txt"))
            .unwrap_or(false);
        if !looks_like_csv {
            return Envelope::new(false, "Invalid file type. Please upload a CSV file.", now);
        }

        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "import file unreadable");
                return Envelope::new(false, "Failed to open uploaded file", now);
            }
        };

        // binary content never reaches the parser
        if data.iter().take(1024).any(|&byte| byte == 0) {
            return Envelope::new(false, "Invalid file type. Please upload a CSV file.", now);
        }

        match import_tasks(&self.store, &data, now) {
            Ok(outcome) => Envelope::new(true, outcome.message(), now)
                .field("imported", outcome.imported)
                .field("skipped", outcome.skipped)
                .field("total_lines", outcome.total_lines)
                .field("errors", outcome.capped_errors()),
            Err(e) => Envelope::new(false, e.to_string(), now),
        }
    }
}
