//! Workload per assignee.

use crate::types::Issue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssigneeLoad {
    pub assignee: String,
    pub issues: usize,
    pub points: f64,
    pub overloaded: bool,
}

/// Count and story points of Active issues per assignee, heaviest first.
///
/// An assignee is overloaded above either threshold; sitting exactly on a
/// threshold is not overload.
pub fn team_load(issues: &[Issue], issue_threshold: usize, points_threshold: f64) -> Vec<AssigneeLoad> {
    let mut totals: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for issue in issues.iter().filter(|i| i.is_active()) {
        let entry = totals.entry(issue.assignee.as_str()).or_default();
        entry.0 += 1;
        entry.1 += issue.story_points;
    }

    let mut loads: Vec<AssigneeLoad> = totals
        .into_iter()
        .map(|(assignee, (count, points))| AssigneeLoad {
            assignee: assignee.to_string(),
            issues: count,
            points,
            overloaded: count > issue_threshold || points > points_threshold,
        })
        .collect();
    loads.sort_by(|a, b| {
        b.points
            .total_cmp(&a.points)
            .then(b.issues.cmp(&a.issues))
            .then_with(|| a.assignee.cmp(&b.assignee))
    });
    loads
}

pub fn overloaded(loads: &[AssigneeLoad]) -> Vec<String> {
    loads.iter().filter(|l| l.overloaded).map(|l| l.assignee.clone()).collect()
}
