//! Story-point progress across selected sprints.

use crate::types::Issue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How many sprints are shown when the caller does not choose.
pub const DEFAULT_SPRINT_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprintPoints {
    pub sprint: String,
    pub status: String,
    pub points: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SprintProgress {
    pub candidates: Vec<String>,
    pub selected: Vec<String>,
    pub total_points: f64,
    pub done_points: f64,
    pub progress_pct: f64,
    pub by_status: Vec<SprintPoints>,
}

/// Progress over `selected` sprints, or over the first few named sprints
/// (excluding `backlog`) when `selected` is `None`.
pub fn sprint_progress(issues: &[Issue], selected: Option<&BTreeSet<String>>, backlog: &str) -> SprintProgress {
    let candidates: BTreeSet<&str> = issues.iter().map(|i| i.sprint.as_str()).collect();
    let selected: BTreeSet<String> = match selected {
        Some(chosen) => chosen.clone(),
        None => candidates
            .iter()
            .filter(|s| **s != backlog)
            .take(DEFAULT_SPRINT_COUNT)
            .map(|s| s.to_string())
            .collect(),
    };

    let mut total_points = 0.0;
    let mut done_points = 0.0;
    let mut by_status: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for issue in issues.iter().filter(|i| selected.contains(&i.sprint)) {
        total_points += issue.story_points;
        if issue.is_done() {
            done_points += issue.story_points;
        }
        *by_status.entry((issue.sprint.as_str(), issue.status.as_str())).or_default() += issue.story_points;
    }

    SprintProgress {
        candidates: candidates.iter().map(|s| s.to_string()).collect(),
        selected: selected.into_iter().collect(),
        total_points,
        done_points,
        progress_pct: if total_points > 0.0 { done_points / total_points * 100.0 } else { 0.0 },
        by_status: by_status
            .into_iter()
            .map(|((sprint, status), points)| SprintPoints {
                sprint: sprint.to_string(),
                status: status.to_string(),
                points,
            })
            .collect(),
    }
}
