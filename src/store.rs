// Task persistence over SQLite

use chrono::{DateTime, NaiveDate, Utc};
use eyre::{Context, Result};
use rusqlite::{named_params, Connection, Row};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::clock::timestamp;
use crate::filter::{ExportCriteria, TaskCriteria};
use crate::task::{NewTask, Priority, Status, Task};

const SELECT_COLUMNS: &str = "SELECT id, title, description, task_date, due_date, \
     priority, category, status, is_completed, created_at, updated_at FROM tasks";

// High > Medium > Low rank for the filter and exact-date queries; the month
// and upcoming queries sort the priority column text directly.
const PRIORITY_RANK: &str =
    "CASE priority WHEN 'High' THEN 0 WHEN 'Medium' THEN 1 WHEN 'Low' THEN 2 ELSE 3 END";

/// Durable task table; owns the schema, id assignment, and timestamps
pub struct TaskStore {
    db: Connection,
}

impl TaskStore {
    /// Open or create the task database at the given file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let db = Connection::open(path).context("Failed to open task database")?;
        let store = Self { db };
        store.create_schema()?;
        Ok(store)
    }

    /// In-memory store, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self { db };
        store.create_schema()?;
        Ok(store)
    }

    /// Get a reference to the SQLite database connection
    pub fn db(&self) -> &Connection {
        &self.db
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                task_date TEXT NOT NULL,
                due_date TEXT,
                priority TEXT NOT NULL DEFAULT 'Medium',
                category TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'Pending',
                is_completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_task_date ON tasks(task_date);
            CREATE INDEX IF NOT EXISTS idx_tasks_due_date ON tasks(due_date);
            "#,
        )?;

        Ok(())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert a task and return its assigned id.
    ///
    /// The statement is cached so batch callers (the CSV importer) reuse one
    /// prepared insert.
    pub fn insert(&self, task: &NewTask, now: DateTime<Utc>) -> Result<i64> {
        let stamp = timestamp(now);

        let mut stmt = self.db.prepare_cached(
            "INSERT INTO tasks (title, description, task_date, due_date, priority, \
             category, status, is_completed, created_at, updated_at) \
             VALUES (:title, :description, :task_date, :due_date, :priority, \
             :category, :status, :is_completed, :created_at, :updated_at)",
        )?;
        stmt.execute(named_params! {
            ":title": task.title,
            ":description": task.description,
            ":task_date": task.task_date,
            ":due_date": task.due_date,
            ":priority": task.priority.as_str(),
            ":category": task.category,
            ":status": task.status.as_str(),
            ":is_completed": task.is_completed,
            ":created_at": stamp,
            ":updated_at": stamp,
        })?;

        Ok(self.db.last_insert_rowid())
    }

    /// Replace every mutable field of the task with the given id.
    ///
    /// Returns the number of rows affected; the update surface reports
    /// success regardless.
    pub fn update(&self, id: i64, task: &NewTask, now: DateTime<Utc>) -> Result<usize> {
        let rows = self.db.execute(
            "UPDATE tasks SET title = :title, description = :description, \
             task_date = :task_date, due_date = :due_date, priority = :priority, \
             category = :category, status = :status, is_completed = :is_completed, \
             updated_at = :updated_at WHERE id = :id",
            named_params! {
                ":id": id,
                ":title": task.title,
                ":description": task.description,
                ":task_date": task.task_date,
                ":due_date": task.due_date,
                ":priority": task.priority.as_str(),
                ":status": task.status.as_str(),
                ":category": task.category,
                ":is_completed": task.is_completed,
                ":updated_at": timestamp(now),
            },
        )?;

        Ok(rows)
    }

    /// Hard-delete a task; returns the number of rows removed
    pub fn delete(&self, id: i64) -> Result<usize> {
        let rows = self
            .db
            .execute("DELETE FROM tasks WHERE id = :id", named_params! { ":id": id })?;
        Ok(rows)
    }

    /// Flip `is_completed` and set status to match the new flag.
    ///
    /// Both right-hand sides read the pre-update row, so the flag and the
    /// status always land in agreement. Returns rows affected.
    pub fn toggle_complete(&self, id: i64, now: DateTime<Utc>) -> Result<usize> {
        let rows = self.db.execute(
            "UPDATE tasks SET \
                is_completed = NOT is_completed, \
                status = CASE WHEN is_completed = 0 THEN 'Completed' ELSE 'Pending' END, \
                updated_at = :updated_at \
             WHERE id = :id",
            named_params! { ":id": id, ":updated_at": timestamp(now) },
        )?;
        Ok(rows)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Fetch a single task by id
    pub fn get(&self, id: i64) -> Result<Option<Task>> {
        let mut stmt = self
            .db
            .prepare(&format!("{} WHERE id = :id", SELECT_COLUMNS))?;

        let mut rows = stmt.query_map(named_params! { ":id": id }, task_from_row)?;
        match rows.next() {
            Some(task) => Ok(Some(task?)),
            None => Ok(None),
        }
    }

    /// Every task falling in the given month, calendar order.
    ///
    /// Tie-breaks on the raw priority column, not the rank; the month view
    /// and the filter view order differently.
    pub fn tasks_for_month(&self, month: u32, year: i32) -> Result<Vec<Task>> {
        let sql = format!(
            "{} WHERE CAST(strftime('%m', task_date) AS INTEGER) = :month \
             AND CAST(strftime('%Y', task_date) AS INTEGER) = :year \
             ORDER BY task_date ASC, priority DESC, created_at DESC",
            SELECT_COLUMNS
        );
        let mut stmt = self.db.prepare(&sql)?;
        let rows = stmt.query_map(
            named_params! { ":month": month, ":year": year },
            task_from_row,
        )?;
        collect_tasks(rows)
    }

    /// Every task on an exact date, most urgent first
    pub fn tasks_for_date(&self, date: NaiveDate) -> Result<Vec<Task>> {
        let sql = format!(
            "{} WHERE task_date = :date ORDER BY {}, created_at DESC",
            SELECT_COLUMNS, PRIORITY_RANK
        );
        let mut stmt = self.db.prepare(&sql)?;
        let rows = stmt.query_map(named_params! { ":date": date }, task_from_row)?;
        collect_tasks(rows)
    }

    /// Tasks matching the sparse criteria, AND-combined
    pub fn filter(&self, criteria: &TaskCriteria) -> Result<Vec<Task>> {
        let query = criteria.to_query();
        let sql = format!(
            "{} WHERE 1=1{} ORDER BY task_date DESC, {}, created_at DESC",
            SELECT_COLUMNS, query.clause, PRIORITY_RANK
        );

        debug!(sql = %sql, params = query.params.len(), "filter query");

        let mut stmt = self.db.prepare(&sql)?;
        let params = query.param_refs();
        let rows = stmt.query_map(params.as_slice(), task_from_row)?;
        collect_tasks(rows)
    }

    /// Full table in export order
    pub fn all_tasks(&self) -> Result<Vec<Task>> {
        let sql = format!(
            "{} ORDER BY task_date DESC, created_at DESC",
            SELECT_COLUMNS
        );
        let mut stmt = self.db.prepare(&sql)?;
        let rows = stmt.query_map([], task_from_row)?;
        collect_tasks(rows)
    }

    /// Tasks matching the reduced export criteria
    pub fn filtered_for_export(&self, criteria: &ExportCriteria) -> Result<Vec<Task>> {
        let query = criteria.to_query();
        let sql = format!(
            "{} WHERE 1=1{} ORDER BY task_date DESC",
            SELECT_COLUMNS, query.clause
        );
        let mut stmt = self.db.prepare(&sql)?;
        let params = query.param_refs();
        let rows = stmt.query_map(params.as_slice(), task_from_row)?;
        collect_tasks(rows)
    }

    /// Distinct non-empty category labels, sorted
    pub fn categories(&self) -> Result<Vec<String>> {
        let mut stmt = self.db.prepare(
            "SELECT DISTINCT category FROM tasks \
             WHERE category IS NOT NULL AND category != '' ORDER BY category",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?);
        }
        Ok(categories)
    }

    /// Aggregate counts over the whole table
    pub fn statistics(&self) -> Result<TaskStats> {
        let mut stmt = self.db.prepare(
            "SELECT \
                COUNT(*), \
                SUM(CASE WHEN is_completed = 1 THEN 1 ELSE 0 END), \
                SUM(CASE WHEN is_completed = 0 THEN 1 ELSE 0 END), \
                SUM(CASE WHEN priority = 'High' THEN 1 ELSE 0 END), \
                SUM(CASE WHEN priority = 'Medium' THEN 1 ELSE 0 END), \
                SUM(CASE WHEN priority = 'Low' THEN 1 ELSE 0 END), \
                SUM(CASE WHEN status = 'Pending' THEN 1 ELSE 0 END), \
                SUM(CASE WHEN status = 'In Progress' THEN 1 ELSE 0 END), \
                SUM(CASE WHEN status = 'Completed' THEN 1 ELSE 0 END) \
             FROM tasks",
        )?;

        let stats = stmt.query_row([], |row| {
            Ok(TaskStats {
                total_tasks: row.get(0)?,
                completed_tasks: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                pending_tasks: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                high_priority: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                medium_priority: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                low_priority: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                status_pending: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
                status_in_progress: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
                status_completed: row.get::<_, Option<i64>>(8)?.unwrap_or(0),
            })
        })?;

        Ok(stats)
    }

    /// Incomplete tasks whose due date has passed, oldest due first.
    /// `today` comes from the caller's clock.
    pub fn overdue(&self, today: NaiveDate) -> Result<Vec<OverdueTask>> {
        let sql = format!(
            "{} WHERE due_date IS NOT NULL AND due_date < :today \
             AND is_completed = 0 ORDER BY due_date ASC",
            SELECT_COLUMNS
        );
        let mut stmt = self.db.prepare(&sql)?;
        let rows = stmt.query_map(named_params! { ":today": today }, task_from_row)?;

        let mut tasks = Vec::new();
        for row in rows {
            let task = row?;
            // due_date is non-null under the WHERE clause
            let days_overdue = task
                .due_date
                .map(|due| (today - due).num_days())
                .unwrap_or(0);
            tasks.push(OverdueTask { task, days_overdue });
        }
        Ok(tasks)
    }

    /// Incomplete tasks scheduled within the next seven days of `today`.
    /// Tie-breaks on the raw priority column, like the month query.
    pub fn upcoming(&self, today: NaiveDate) -> Result<Vec<UpcomingTask>> {
        let until = today + chrono::Days::new(7);
        let sql = format!(
            "{} WHERE task_date BETWEEN :today AND :until AND is_completed = 0 \
             ORDER BY task_date ASC, priority DESC",
            SELECT_COLUMNS
        );
        let mut stmt = self.db.prepare(&sql)?;
        let rows = stmt.query_map(
            named_params! { ":today": today, ":until": until },
            task_from_row,
        )?;

        let mut tasks = Vec::new();
        for row in rows {
            let task = row?;
            let days_until = (task.task_date - today).num_days();
            tasks.push(UpcomingTask { task, days_until });
        }
        Ok(tasks)
    }
}

/// Aggregate counts for the statistics view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub pending_tasks: i64,
    pub high_priority: i64,
    pub medium_priority: i64,
    pub low_priority: i64,
    pub status_pending: i64,
    pub status_in_progress: i64,
    pub status_completed: i64,
}

/// Task annotated with how far past its due date it is
#[derive(Debug, Clone, Serialize)]
pub struct OverdueTask {
    #[serde(flatten)]
    pub task: Task,
    pub days_overdue: i64,
}

/// Task annotated with how many days until its scheduled date
#[derive(Debug, Clone, Serialize)]
pub struct UpcomingTask {
    #[serde(flatten)]
    pub task: Task,
    pub days_until: i64,
}

fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    let priority: String = row.get(5)?;
    let status: String = row.get(7)?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        task_date: row.get(3)?,
        due_date: row.get(4)?,
        priority: Priority::parse_or_default(&priority),
        category: row.get(6)?,
        status: Status::parse_or_default(&status),
        is_completed: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn collect_tasks(rows: impl Iterator<Item = rusqlite::Result<Task>>) -> Result<Vec<Task>> {
    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row?);
    }
    Ok(tasks)
}
