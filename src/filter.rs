// Sparse filter criteria and the parameterized query fragments they produce

use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

use crate::task::{parse_date, Priority, Status};

/// Optional filter criteria for task queries.
///
/// An absent or empty field is not applied. Out-of-enum priority/status
/// values and unparseable dates are dropped from the effective filter rather
/// than treated as errors, so a bogus criterion behaves like no criterion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskCriteria {
    pub priority: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

/// Reduced criteria set for the filtered export: exact equality only,
/// no enum validation, matching the export surface
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportCriteria {
    pub priority: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
}

/// WHERE-clause fragments plus their named parameters.
///
/// `clause` is built only from fixed text; every caller-supplied value is
/// bound through `params`.
pub struct CriteriaQuery {
    pub clause: String,
    pub params: Vec<(&'static str, Box<dyn ToSql>)>,
}

impl CriteriaQuery {
    fn new() -> Self {
        CriteriaQuery {
            clause: String::new(),
            params: Vec::new(),
        }
    }

    fn push(&mut self, fragment: &str, name: &'static str, value: Box<dyn ToSql>) {
        self.clause.push_str(fragment);
        self.params.push((name, value));
    }

    /// Parameter slice in the form rusqlite binds named parameters from
    pub fn param_refs(&self) -> Vec<(&str, &dyn ToSql)> {
        self.params
            .iter()
            .map(|(name, value)| (*name, value.as_ref()))
            .collect()
    }
}

fn given(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

impl TaskCriteria {
    /// Translate the criteria into query fragments, dropping invalid ones
    pub fn to_query(&self) -> CriteriaQuery {
        let mut query = CriteriaQuery::new();

        if let Some(priority) = given(&self.priority) {
            if let Some(valid) = Priority::from_label(priority) {
                query.push(
                    " AND priority = :priority",
                    ":priority",
                    Box::new(valid.as_str()),
                );
            }
        }

        if let Some(category) = given(&self.category) {
            query.push(
                " AND category = :category",
                ":category",
                Box::new(category.to_string()),
            );
        }

        if let Some(status) = given(&self.status) {
            if let Some(valid) = Status::from_label(status) {
                query.push(
                    " AND status = :status",
                    ":status",
                    Box::new(valid.as_str()),
                );
            }
        }

        if let Some(search) = given(&self.search) {
            query.push(
                " AND (title LIKE :search OR description LIKE :search)",
                ":search",
                Box::new(format!("%{}%", search)),
            );
        }

        if let Some(date_from) = given(&self.date_from) {
            if parse_date(date_from).is_some() {
                query.push(
                    " AND task_date >= :date_from",
                    ":date_from",
                    Box::new(date_from.to_string()),
                );
            }
        }

        if let Some(date_to) = given(&self.date_to) {
            if parse_date(date_to).is_some() {
                query.push(
                    " AND task_date <= :date_to",
                    ":date_to",
                    Box::new(date_to.to_string()),
                );
            }
        }

        query
    }

    /// Echo of what the caller sent, labeled for display.
    ///
    /// Reflects the raw criteria, including ones dropped as invalid.
    pub fn summary(&self) -> FilterSummary {
        let mut active = Vec::new();

        if let Some(v) = given(&self.priority) {
            active.push(format!("Priority: {}", v));
        }
        if let Some(v) = given(&self.category) {
            active.push(format!("Category: {}", v));
        }
        if let Some(v) = given(&self.status) {
            active.push(format!("Status: {}", v));
        }
        if let Some(v) = given(&self.search) {
            active.push(format!("Search: {}", v));
        }
        if let Some(v) = given(&self.date_from) {
            active.push(format!("From: {}", v));
        }
        if let Some(v) = given(&self.date_to) {
            active.push(format!("To: {}", v));
        }

        FilterSummary {
            filter_count: active.len(),
            active_filters: active,
            priority: self.priority.clone().unwrap_or_default(),
            category: self.category.clone().unwrap_or_default(),
            status: self.status.clone().unwrap_or_default(),
            search: self.search.clone().unwrap_or_default(),
            date_from: self.date_from.clone().unwrap_or_default(),
            date_to: self.date_to.clone().unwrap_or_default(),
        }
    }
}

impl ExportCriteria {
    /// Equality fragments for the filtered export. Values are passed through
    /// as given; an out-of-enum value simply matches nothing.
    pub fn to_query(&self) -> CriteriaQuery {
        let mut query = CriteriaQuery::new();

        if let Some(priority) = given(&self.priority) {
            query.push(
                " AND priority = :priority",
                ":priority",
                Box::new(priority.to_string()),
            );
        }
        if let Some(category) = given(&self.category) {
            query.push(
                " AND category = :category",
                ":category",
                Box::new(category.to_string()),
            );
        }
        if let Some(status) = given(&self.status) {
            query.push(
                " AND status = :status",
                ":status",
                Box::new(status.to_string()),
            );
        }

        query
    }
}

/// Applied-filter echo returned with filter results
#[derive(Debug, Clone, Serialize)]
pub struct FilterSummary {
    pub active_filters: Vec<String>,
    pub filter_count: usize,
    pub priority: String,
    pub category: String,
    pub status: String,
    pub search: String,
    pub date_from: String,
    pub date_to: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_criteria_produce_no_fragments() {
        let query = TaskCriteria::default().to_query();
        assert_eq!(query.clause, "");
        assert!(query.params.is_empty());

        let query = TaskCriteria {
            priority: Some(String::new()),
            search: Some(String::new()),
            ..Default::default()
        }
        .to_query();
        assert_eq!(query.clause, "");
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_valid_criteria_are_anded() {
        let criteria = TaskCriteria {
            priority: Some("High".to_string()),
            category: Some("work".to_string()),
            status: Some("Pending".to_string()),
            ..Default::default()
        };
        let query = criteria.to_query();
        assert_eq!(
            query.clause,
            " AND priority = :priority AND category = :category AND status = :status"
        );
        assert_eq!(query.params.len(), 3);
    }

    #[test]
    fn test_out_of_enum_values_are_dropped() {
        let criteria = TaskCriteria {
            priority: Some("Urgent".to_string()),
            status: Some("Bogus".to_string()),
            ..Default::default()
        };
        let query = criteria.to_query();
        assert_eq!(query.clause, "");
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_invalid_dates_are_dropped() {
        let criteria = TaskCriteria {
            date_from: Some("2024-13-40".to_string()),
            date_to: Some("2024-03-31".to_string()),
            ..Default::default()
        };
        let query = criteria.to_query();
        assert_eq!(query.clause, " AND task_date <= :date_to");
        assert_eq!(query.params.len(), 1);
    }

    #[test]
    fn test_single_date_bound_is_legal() {
        let criteria = TaskCriteria {
            date_from: Some("2024-03-01".to_string()),
            ..Default::default()
        };
        let query = criteria.to_query();
        assert_eq!(query.clause, " AND task_date >= :date_from");
    }

    #[test]
    fn test_search_fragment_wraps_pattern() {
        let criteria = TaskCriteria {
            search: Some("rent".to_string()),
            ..Default::default()
        };
        let query = criteria.to_query();
        assert_eq!(
            query.clause,
            " AND (title LIKE :search OR description LIKE :search)"
        );
        assert_eq!(query.params.len(), 1);
    }

    #[test]
    fn test_summary_echoes_raw_values() {
        let criteria = TaskCriteria {
            priority: Some("Urgent".to_string()),
            search: Some("rent".to_string()),
            ..Default::default()
        };
        let summary = criteria.summary();
        // the echo reflects what the caller sent, even criteria the query dropped
        assert_eq!(
            summary.active_filters,
            vec!["Priority: Urgent".to_string(), "Search: rent".to_string()]
        );
        assert_eq!(summary.filter_count, 2);
        assert_eq!(summary.priority, "Urgent");
        assert_eq!(summary.category, "");
    }

    #[test]
    fn test_export_criteria_skip_enum_validation() {
        let criteria = ExportCriteria {
            priority: Some("Urgent".to_string()),
            ..Default::default()
        };
        let query = criteria.to_query();
        // the export surface passes the value through; it will match nothing
        assert_eq!(query.clause, " AND priority = :priority");
        assert_eq!(query.params.len(), 1);
    }
}
