// CSV import pipeline: tolerant column mapping, per-line diagnostics,
// row-level failure isolation

use chrono::{DateTime, Utc};
use csv::StringRecord;
use eyre::{eyre, Context, Result};
use tracing::{debug, warn};

use crate::store::TaskStore;
use crate::task::{completion_flag, parse_date, NewTask, Priority, Status};

/// Diagnostics reported to the caller are capped; the skipped count still
/// carries the true total.
const MAX_REPORTED_ERRORS: usize = 10;

// Candidate column indices per field, highest first. The lower index covers
// files without a leading ID column; a higher index wins whenever it exists
// in the record, even when its cell is empty. This keeps the with-ID and
// without-ID readings of short rows deliberately ambiguous.
const TITLE: &[usize] = &[1, 0];
const DESCRIPTION: &[usize] = &[2, 1];
const TASK_DATE: &[usize] = &[3, 2];
const DUE_DATE: &[usize] = &[4, 3];
const PRIORITY: &[usize] = &[5, 4];
const CATEGORY: &[usize] = &[6, 5];
const STATUS: &[usize] = &[7, 6];
const COMPLETED: &[usize] = &[8, 7];

/// Result of one import batch
#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
    pub total_lines: usize,
    pub errors: Vec<String>,
}

impl ImportOutcome {
    fn skip(&mut self, line: u64, reason: &str) {
        self.skipped += 1;
        self.errors.push(format!("Line {}: {}", line, reason));
    }

    /// Summary line for the response envelope
    pub fn message(&self) -> String {
        let mut message = format!("{} task(s) imported successfully", self.imported);
        if self.skipped > 0 {
            message.push_str(&format!(", {} skipped", self.skipped));
        }
        message
    }

    /// At most ten diagnostics, in file order
    pub fn capped_errors(&self) -> &[String] {
        &self.errors[..self.errors.len().min(MAX_REPORTED_ERRORS)]
    }
}

fn cell<'a>(record: &'a StringRecord, candidates: &[usize]) -> &'a str {
    candidates
        .iter()
        .find_map(|&index| record.get(index))
        .map(str::trim)
        .unwrap_or("")
}

/// Import tasks from CSV bytes; the first record is a header and is skipped.
///
/// Line numbers in diagnostics are raw file positions, with the header as
/// line 1. Each accepted row inserts independently: a storage failure on one
/// row is logged, counted as skipped, and never aborts the rest of the batch.
pub fn import_tasks(store: &TaskStore, data: &[u8], now: DateTime<Utc>) -> Result<ImportOutcome> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(data);

    let mut records = reader.records();
    match records.next() {
        Some(Ok(_)) => {}
        Some(Err(e)) => return Err(e).context("Failed to read CSV header"),
        None => return Err(eyre!("Empty CSV file")),
    }

    let mut outcome = ImportOutcome::default();
    let mut last_line: u64 = 1;

    for result in records {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                last_line += 1;
                outcome.skip(last_line, "Unreadable row");
                warn!(line = last_line, error = %e, "CSV record failed to parse");
                continue;
            }
        };

        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(last_line + 1);
        last_line = line;

        // incidental blank lines, not data
        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }

        if record.len() < 4 {
            outcome.skip(line, "Insufficient data");
            continue;
        }

        let title = cell(&record, TITLE);
        let description = cell(&record, DESCRIPTION);
        let task_date_raw = cell(&record, TASK_DATE);
        let due_date_raw = cell(&record, DUE_DATE);
        let priority_raw = cell(&record, PRIORITY);
        let category = cell(&record, CATEGORY);
        let status_raw = cell(&record, STATUS);
        let completed_raw = cell(&record, COMPLETED);

        if title.is_empty() {
            outcome.skip(line, "Missing title");
            continue;
        }

        if task_date_raw.is_empty() {
            outcome.skip(line, "Missing task date");
            continue;
        }

        let Some(task_date) = parse_date(task_date_raw) else {
            outcome.skip(line, "Invalid task date format");
            continue;
        };

        // an unparseable due date downgrades to absent, it never fails the row
        let due_date = parse_date(due_date_raw);

        let task = NewTask {
            title: title.to_string(),
            description: description.to_string(),
            task_date,
            due_date,
            priority: Priority::parse_or_default(priority_raw),
            category: category.to_string(),
            status: Status::parse_or_default(status_raw),
            is_completed: completion_flag(completed_raw),
        };

        match store.insert(&task, now) {
            Ok(id) => {
                debug!(line, id, "imported task");
                outcome.imported += 1;
            }
            Err(e) => {
                outcome.skip(line, "Failed to insert task");
                warn!(line, error = %e, "import row insert failed");
            }
        }
    }

    outcome.total_lines = last_line.saturating_sub(1) as usize;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::parse_date;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn run(csv: &str) -> (TaskStore, ImportOutcome) {
        let store = TaskStore::open_in_memory().unwrap();
        let outcome = import_tasks(&store, csv.as_bytes(), now()).unwrap();
        (store, outcome)
    }

    #[test]
    fn test_import_full_export_shape() {
        let csv = "\
ID,Title,Description,Task Date,Due Date,Priority,Category,Status,Completed,Created At,Updated At
1,Pay rent,to landlord,2024-03-01,2024-03-05,High,bills,Pending,No,2024-02-01 10:00:00,2024-02-01 10:00:00
2,Ship release,,2024-03-02,,Low,work,Completed,Yes,2024-02-01 10:00:00,2024-02-01 10:00:00
";
        let (store, outcome) = run(csv);
        assert_eq!(outcome.imported, 2);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.total_lines, 2);
        assert!(outcome.errors.is_empty());

        let tasks = store.all_tasks().unwrap();
        let rent = tasks.iter().find(|t| t.title == "Pay rent").unwrap();
        assert_eq!(rent.description, "to landlord");
        assert_eq!(rent.task_date, parse_date("2024-03-01").unwrap());
        assert_eq!(rent.due_date, parse_date("2024-03-05"));
        assert_eq!(rent.priority, Priority::High);
        assert_eq!(rent.category, "bills");
        assert!(!rent.is_completed);

        let release = tasks.iter().find(|t| t.title == "Ship release").unwrap();
        assert!(release.is_completed);
        assert_eq!(release.status, Status::Completed);
    }

    #[test]
    fn test_import_four_column_rows_fall_back_to_defaults() {
        let csv = "\
ID,Title,Description,Task Date
7,Pay rent,to landlord,2024-03-01
";
        let (store, outcome) = run(csv);
        assert_eq!(outcome.imported, 1);

        let task = &store.all_tasks().unwrap()[0];
        assert_eq!(task.title, "Pay rent");
        assert_eq!(task.description, "to landlord");
        assert_eq!(task.task_date, parse_date("2024-03-01").unwrap());
        // the due-date candidate falls back onto the task-date cell
        assert_eq!(task.due_date, parse_date("2024-03-01"));
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.category, "");
        assert_eq!(task.status, Status::Pending);
        assert!(!task.is_completed);
    }

    #[test]
    fn test_import_blank_rows_skipped_silently() {
        let csv = "\
ID,Title,Description,Task Date
,,,
1,Walk dog,,2024-03-01
";
        let (store, outcome) = run(csv);
        assert_eq!(outcome.imported, 1);
        assert_eq!(outcome.skipped, 0);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.total_lines, 2);
        assert_eq!(store.all_tasks().unwrap().len(), 1);
    }

    #[test]
    fn test_import_short_row_is_insufficient_data() {
        let csv = "\
ID,Title,Description,Task Date
1,Walk dog,2024-03-01
";
        let (_, outcome) = run(csv);
        assert_eq!(outcome.imported, 0);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.errors, vec!["Line 2: Insufficient data".to_string()]);
    }

    #[test]
    fn test_import_line_numbers_count_from_header() {
        let csv = "\
ID,Title,Description,Task Date
1,First,,2024-03-01
2,,missing title,2024-03-02
3,Third,,2024-03-03
4,Bad date,,tomorrow
";
        let (_, outcome) = run(csv);
        assert_eq!(outcome.imported, 2);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(
            outcome.errors,
            vec![
                "Line 3: Missing title".to_string(),
                "Line 5: Invalid task date format".to_string(),
            ]
        );
        assert_eq!(outcome.total_lines, 4);
    }

    #[test]
    fn test_import_missing_task_date() {
        let csv = "\
ID,Title,Description,Task Date
1,No date,details,
";
        let (_, outcome) = run(csv);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.errors, vec!["Line 2: Missing task date".to_string()]);
    }

    #[test]
    fn test_import_invalid_due_date_downgrades_to_absent() {
        let csv = "\
ID,Title,Description,Task Date,Due Date
1,Errand,,2024-03-01,someday
";
        let (store, outcome) = run(csv);
        assert_eq!(outcome.imported, 1);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(store.all_tasks().unwrap()[0].due_date, None);
    }

    #[test]
    fn test_import_out_of_enum_cells_take_defaults() {
        let csv = "\
ID,Title,Description,Task Date,Due Date,Priority,Category,Status
1,Errand,,2024-03-01,,Urgent,,Someday
";
        let (store, outcome) = run(csv);
        assert_eq!(outcome.imported, 1);
        let task = &store.all_tasks().unwrap()[0];
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, Status::Pending);
    }

    #[test]
    fn test_import_completion_flag_can_disagree_with_status() {
        // the importer takes both cells as given; this is the one write path
        // where the flag and the status may differ
        let csv = "\
ID,Title,Description,Task Date,Due Date,Priority,Category,Status,Completed
1,Errand,,2024-03-01,,Medium,,Pending,yes
2,Chore,,2024-03-01,,Medium,,Pending,0
";
        let (store, outcome) = run(csv);
        assert_eq!(outcome.imported, 2);
        let tasks = store.all_tasks().unwrap();
        let errand = tasks.iter().find(|t| t.title == "Errand").unwrap();
        assert!(errand.is_completed);
        assert_eq!(errand.status, Status::Pending);
        let chore = tasks.iter().find(|t| t.title == "Chore").unwrap();
        assert!(!chore.is_completed);
    }

    #[test]
    fn test_import_row_failure_does_not_abort_batch() {
        let store = TaskStore::open_in_memory().unwrap();
        store
            .db()
            .execute("CREATE UNIQUE INDEX idx_unique_title ON tasks(title)", [])
            .unwrap();

        let csv = "\
ID,Title,Description,Task Date
1,alpha,,2024-03-01
2,beta,,2024-03-02
3,alpha,,2024-03-03
4,gamma,,2024-03-04
5,delta,,2024-03-05
";
        let outcome = import_tasks(&store, csv.as_bytes(), now()).unwrap();
        assert_eq!(outcome.imported, 4);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.total_lines, 5);
        assert_eq!(
            outcome.errors,
            vec!["Line 4: Failed to insert task".to_string()]
        );
        assert_eq!(store.all_tasks().unwrap().len(), 4);
    }

    #[test]
    fn test_import_caps_reported_errors_at_ten() {
        let mut csv = String::from("ID,Title,Description,Task Date\n");
        for i in 0..12 {
            csv.push_str(&format!("{},,missing title,2024-03-01\n", i));
        }
        let (_, outcome) = run(&csv);
        assert_eq!(outcome.skipped, 12);
        assert_eq!(outcome.errors.len(), 12);
        assert_eq!(outcome.capped_errors().len(), 10);
        assert_eq!(outcome.capped_errors()[0], "Line 2: Missing title");
    }

    #[test]
    fn test_import_empty_file_is_an_error() {
        let store = TaskStore::open_in_memory().unwrap();
        let err = import_tasks(&store, b"", now()).unwrap_err();
        assert_eq!(err.to_string(), "Empty CSV file");
    }

    #[test]
    fn test_import_header_only_file() {
        let (_, outcome) = run("ID,Title,Description,Task Date\n");
        assert_eq!(outcome.imported, 0);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.total_lines, 0);
    }
}
