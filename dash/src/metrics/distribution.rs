//! Grouped counts for pie, funnel and stacked charts.

use crate::types::Issue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusByProject {
    pub project: String,
    pub status: String,
    pub count: usize,
}

/// Counts per key, largest first, ties by name.
pub fn counts_by<'a>(issues: impl Iterator<Item = &'a Issue>, key: fn(&Issue) -> &str) -> Vec<NameValue> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for issue in issues {
        *counts.entry(key(issue)).or_default() += 1;
    }
    let mut out: Vec<NameValue> = counts
        .into_iter()
        .map(|(name, value)| NameValue { name: name.to_string(), value })
        .collect();
    out.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    out
}

pub fn type_distribution(issues: &[Issue]) -> Vec<NameValue> {
    counts_by(issues.iter(), |i| i.issue_type.as_str())
}

pub fn status_distribution(issues: &[Issue]) -> Vec<NameValue> {
    counts_by(issues.iter(), |i| i.status.as_str())
}

pub fn status_by_project(issues: &[Issue]) -> Vec<StatusByProject> {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for issue in issues {
        *counts.entry((issue.project.as_str(), issue.status.as_str())).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|((project, status), count)| StatusByProject {
            project: project.to_string(),
            status: status.to_string(),
            count,
        })
        .collect()
}
