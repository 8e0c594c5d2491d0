//! Core data structures for the metrics pipeline.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Issue is the canonical, classified form of a tracker record.
///
/// Timestamps are naive local time: the Normalizer converts every source
/// timestamp to one timezone and strips the offset, so all comparisons
/// downstream are plain wall-clock comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    pub summary: String,
    pub assignee: String,
    pub status: String,
    pub status_category: StatusCategory,
    pub issue_type: String,
    pub priority: String,
    pub project: String,
    pub created: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resolved: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub due_date: Option<NaiveDate>,
    pub updated: NaiveDateTime,
    pub story_points: f64,
    pub sprint: String,
    #[serde(skip_serializing_if = "is_zero", default)]
    pub original_estimate_secs: u64,
    #[serde(skip_serializing_if = "is_zero", default)]
    pub time_spent_secs: u64,
    pub module: String,
    pub client: String,
    #[serde(skip_serializing_if = "BTreeSet::is_empty", default)]
    pub labels: BTreeSet<String>,
    pub late: bool,
    /// Whole calendar days from creation to resolution; `None` while unresolved.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lead_time_days: Option<i64>,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl Issue {
    pub fn is_done(&self) -> bool {
        self.status_category == StatusCategory::Done
    }

    pub fn is_active(&self) -> bool {
        self.status_category == StatusCategory::Active
    }

    pub fn created_date(&self) -> NaiveDate {
        self.created.date()
    }

    pub fn resolved_date(&self) -> Option<NaiveDate> {
        self.resolved.map(|r| r.date())
    }
}

/// StatusCategory is the coarse Done/Active split of a status name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCategory {
    Done,
    Active,
}

impl StatusCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Done => "Done",
            StatusCategory::Active => "Active",
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic records a raw record that was skipped during normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub reason: String,
}

/// Dataset is one point-in-time snapshot of the tracker, normalized and
/// classified. It is never mutated once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub issues: Vec<Issue>,
    /// Evaluation instant used for lateness.
    pub fetched_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}
