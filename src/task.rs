// Task record and the enums it carries

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Task priority, ranked High > Medium > Low
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    /// Exact-match parse against the canonical labels
    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "Low" => Some(Priority::Low),
            "Medium" => Some(Priority::Medium),
            "High" => Some(Priority::High),
            _ => None,
        }
    }

    /// Boundary parse: anything outside the enum degrades to Medium
    pub fn parse_or_default(s: &str) -> Self {
        Self::from_label(s).unwrap_or(Priority::Medium)
    }
}

/// Task workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Status::Pending),
            "In Progress" => Some(Status::InProgress),
            "Completed" => Some(Status::Completed),
            _ => None,
        }
    }

    /// Boundary parse: anything outside the enum degrades to Pending
    pub fn parse_or_default(s: &str) -> Self {
        Self::from_label(s).unwrap_or(Status::Pending)
    }
}

/// A stored task row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub task_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub category: String,
    pub status: Status,
    pub is_completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a task about to be written; the store assigns id and timestamps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub task_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub category: String,
    pub status: Status,
    pub is_completed: bool,
}

impl NewTask {
    /// Build a task for the create/update path, where `is_completed` is
    /// derived from the status rather than supplied by the caller.
    pub fn from_status(
        title: String,
        description: String,
        task_date: NaiveDate,
        due_date: Option<NaiveDate>,
        priority: Priority,
        category: String,
        status: Status,
    ) -> Self {
        NewTask {
            title,
            description,
            task_date,
            due_date,
            priority,
            category,
            status,
            is_completed: status == Status::Completed,
        }
    }
}

/// Strict calendar-date parse in `%Y-%m-%d` form.
///
/// Rejects non-canonical spellings like `2024-3-1` as well as impossible
/// dates, so the check is a round-trip: parse, format back, compare.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let d = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    if d.format("%Y-%m-%d").to_string() == s {
        Some(d)
    } else {
        None
    }
}

/// Completion-flag tokens accepted by the CSV importer, case-insensitive
pub fn completion_flag(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "yes" | "true" | "1" | "completed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_labels_round_trip() {
        for p in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(Priority::from_label(p.as_str()), Some(p));
        }
    }

    #[test]
    fn test_priority_parse_is_case_sensitive() {
        assert_eq!(Priority::from_label("high"), None);
        assert_eq!(Priority::parse_or_default("high"), Priority::Medium);
        assert_eq!(Priority::parse_or_default("Urgent"), Priority::Medium);
        assert_eq!(Priority::parse_or_default(""), Priority::Medium);
        assert_eq!(Priority::parse_or_default("High"), Priority::High);
    }

    #[test]
    fn test_status_parse_or_default() {
        assert_eq!(Status::parse_or_default("In Progress"), Status::InProgress);
        assert_eq!(Status::parse_or_default("in progress"), Status::Pending);
        assert_eq!(Status::parse_or_default("Bogus"), Status::Pending);
        assert_eq!(Status::parse_or_default(""), Status::Pending);
    }

    #[test]
    fn test_status_serialization_labels() {
        let json = serde_json::to_string(&Status::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");

        let json = serde_json::to_string(&Priority::High).unwrap();
        assert_eq!(json, "\"High\"");
    }

    #[test]
    fn test_parse_date_valid() {
        assert_eq!(
            parse_date("2024-03-01"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(
            parse_date("2024-02-29"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn test_parse_date_rejects_bad_input() {
        assert_eq!(parse_date("2023-02-29"), None);
        assert_eq!(parse_date("2024-13-01"), None);
        assert_eq!(parse_date("2024-3-1"), None);
        assert_eq!(parse_date("03/01/2024"), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_completion_flag_tokens() {
        assert!(completion_flag("yes"));
        assert!(completion_flag("Yes"));
        assert!(completion_flag("TRUE"));
        assert!(completion_flag("1"));
        assert!(completion_flag("Completed"));
        assert!(!completion_flag("no"));
        assert!(!completion_flag("0"));
        assert!(!completion_flag(""));
        assert!(!completion_flag("done"));
    }

    #[test]
    fn test_from_status_derives_completion() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let t = NewTask::from_status(
            "Pay rent".to_string(),
            String::new(),
            date,
            None,
            Priority::Medium,
            String::new(),
            Status::Completed,
        );
        assert!(t.is_completed);

        let t = NewTask::from_status(
            "Pay rent".to_string(),
            String::new(),
            date,
            None,
            Priority::Medium,
            String::new(),
            Status::InProgress,
        );
        assert!(!t.is_completed);
    }
}
