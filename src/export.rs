// CSV export pipeline: fixed column contracts, round-trippable with import

use chrono::{DateTime, Utc};
use eyre::Result;

use crate::filter::ExportCriteria;
use crate::store::TaskStore;
use crate::task::Task;

// Excel needs the BOM to read the file as UTF-8
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const FULL_HEADER: [&str; 11] = [
    "ID",
    "Title",
    "Description",
    "Task Date",
    "Due Date",
    "Priority",
    "Category",
    "Status",
    "Completed",
    "Created At",
    "Updated At",
];

const FILTERED_HEADER: [&str; 9] = [
    "ID",
    "Title",
    "Description",
    "Task Date",
    "Due Date",
    "Priority",
    "Category",
    "Status",
    "Completed",
];

/// A rendered CSV attachment: suggested filename plus the bytes to stream
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Export the whole table, timestamps included
pub fn export_all(store: &TaskStore, now: DateTime<Utc>) -> Result<CsvExport> {
    let tasks = store.all_tasks()?;
    Ok(CsvExport {
        filename: format!("tasks_export_{}.csv", now.format("%Y-%m-%d_%H%M%S")),
        bytes: write_csv(&tasks, true)?,
    })
}

/// Export tasks matching the reduced criteria, without timestamps
pub fn export_filtered(
    store: &TaskStore,
    criteria: &ExportCriteria,
    now: DateTime<Utc>,
) -> Result<CsvExport> {
    let tasks = store.filtered_for_export(criteria)?;
    Ok(CsvExport {
        filename: format!("filtered_tasks_{}.csv", now.format("%Y-%m-%d_%H%M%S")),
        bytes: write_csv(&tasks, false)?,
    })
}

fn write_csv(tasks: &[Task], with_timestamps: bool) -> Result<Vec<u8>> {
    let mut buffer = Vec::from(UTF8_BOM);

    {
        let mut writer = csv::Writer::from_writer(&mut buffer);

        if with_timestamps {
            writer.write_record(FULL_HEADER)?;
        } else {
            writer.write_record(FILTERED_HEADER)?;
        }

        for task in tasks {
            let mut fields = vec![
                task.id.to_string(),
                task.title.clone(),
                task.description.clone(),
                task.task_date.format("%Y-%m-%d").to_string(),
                task.due_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                task.priority.as_str().to_string(),
                task.category.clone(),
                task.status.as_str().to_string(),
                if task.is_completed { "Yes" } else { "No" }.to_string(),
            ];
            if with_timestamps {
                fields.push(task.created_at.clone());
                fields.push(task.updated_at.clone());
            }
            writer.write_record(&fields)?;
        }

        writer.flush()?;
    }

    Ok(buffer)
}
