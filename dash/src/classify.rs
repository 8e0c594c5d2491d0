//! Status categorization, lateness and lead time.

use crate::config::ClassifySettings;
use crate::types::{Issue, StatusCategory};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;

/// Classifier derives the computed fields of an issue
#[derive(Debug, Clone)]
pub struct Classifier {
    done_statuses: BTreeSet<String>,
}

impl Classifier {
    pub fn new(settings: &ClassifySettings) -> Self {
        Classifier {
            done_statuses: settings.done_statuses.clone(),
        }
    }

    /// Done when the status is one of the configured names, exactly.
    /// Everything else, including other terminal statuses such as
    /// "Cancelled", is Active.
    pub fn category(&self, status: &str) -> StatusCategory {
        if self.done_statuses.contains(status) {
            StatusCategory::Done
        } else {
            StatusCategory::Active
        }
    }

    /// Fill in status category, late flag and lead time as of `now`.
    pub fn classify(&self, mut issue: Issue, now: NaiveDateTime) -> Issue {
        issue.status_category = self.category(&issue.status);
        issue.late = is_late(issue.status_category, issue.due_date, now);
        issue.lead_time_days = lead_time_days(issue.created, issue.resolved);
        issue
    }

    pub fn classify_all(&self, issues: Vec<Issue>, now: NaiveDateTime) -> Vec<Issue> {
        issues.into_iter().map(|i| self.classify(i, now)).collect()
    }
}

/// An Active issue is late once its due date is a day that has already
/// ended; an issue due today is not late yet.
pub fn is_late(category: StatusCategory, due_date: Option<NaiveDate>, now: NaiveDateTime) -> bool {
    category == StatusCategory::Active && due_date.is_some_and(|due| due < now.date())
}

/// Calendar days between the creation and resolution dates.
pub fn lead_time_days(created: NaiveDateTime, resolved: Option<NaiveDateTime>) -> Option<i64> {
    resolved.map(|r| (r.date() - created.date()).num_days())
}
