//! Delivery risk: where lateness concentrates, what is critical, what is
//! stagnating.

use crate::metrics::distribution::{counts_by, NameValue};
use crate::types::Issue;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatCell {
    pub module: String,
    pub status: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalItem {
    pub key: String,
    pub summary: String,
    pub assignee: String,
    pub status: String,
    pub priority: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleItem {
    pub key: String,
    pub summary: String,
    pub assignee: String,
    pub status: String,
    pub created: NaiveDate,
    pub days_open: i64,
}

/// Late issues grouped by module and status.
pub fn late_heatmap(issues: &[Issue]) -> Vec<HeatCell> {
    let mut cells: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for issue in issues.iter().filter(|i| i.late) {
        *cells.entry((issue.module.as_str(), issue.status.as_str())).or_default() += 1;
    }
    cells
        .into_iter()
        .map(|((module, status), count)| HeatCell {
            module: module.to_string(),
            status: status.to_string(),
            count,
        })
        .collect()
}

/// Projects with the most late issues.
pub fn late_projects(issues: &[Issue], top_n: usize) -> Vec<NameValue> {
    let mut ranked = counts_by(issues.iter().filter(|i| i.late), |i| i.project.as_str());
    ranked.truncate(top_n);
    ranked
}

/// Active issues with a critical priority or an escalation status.
pub fn critical_items(
    issues: &[Issue],
    critical_priorities: &BTreeSet<String>,
    escalation_statuses: &BTreeSet<String>,
) -> Vec<CriticalItem> {
    issues
        .iter()
        .filter(|i| i.is_active())
        .filter(|i| critical_priorities.contains(&i.priority) || escalation_statuses.contains(&i.status))
        .map(|i| CriticalItem {
            key: i.key.clone(),
            summary: i.summary.clone(),
            assignee: i.assignee.clone(),
            status: i.status.clone(),
            priority: i.priority.clone(),
        })
        .collect()
}

/// The oldest Active issues.
pub fn stale_items(issues: &[Issue], now: NaiveDateTime, top_n: usize) -> Vec<StaleItem> {
    let mut active: Vec<&Issue> = issues.iter().filter(|i| i.is_active()).collect();
    active.sort_by_key(|i| i.created);
    active
        .into_iter()
        .take(top_n)
        .map(|i| StaleItem {
            key: i.key.clone(),
            summary: i.summary.clone(),
            assignee: i.assignee.clone(),
            status: i.status.clone(),
            created: i.created_date(),
            days_open: (now - i.created).num_days(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricsSettings;
    use crate::types::fixtures::{at, done, issue};

    fn late(key: &str, project: &str, module: &str) -> Issue {
        let mut i = issue(key, "2024-01-01");
        i.late = true;
        i.project = project.to_string();
        i.module = module.to_string();
        i
    }

    #[test]
    fn heatmap_counts_only_late() {
        let issues = vec![late("1", "A", "API"), late("2", "A", "API"), late("3", "B", "UI"), issue("4", "2024-01-01")];
        let cells = late_heatmap(&issues);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].count, 2);
    }

    #[test]
    fn late_projects_ranked_and_truncated() {
        let issues = vec![late("1", "A", "x"), late("2", "B", "x"), late("3", "B", "x"), late("4", "C", "x")];
        let top = late_projects(&issues, 2);
        let names: Vec<_> = top.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn critical_by_priority_or_escalation() {
        let settings = MetricsSettings::default();
        let mut high = issue("1", "2024-01-01");
        high.priority = "High".to_string();
        let mut blocked = issue("2", "2024-01-01");
        blocked.status = "Blocked".to_string();
        let mut done_high = done("3", "2024-01-01", "2024-01-02");
        done_high.priority = "Highest".to_string();
        let normal = issue("4", "2024-01-01");

        let items = critical_items(
            &[high, blocked, done_high, normal],
            &settings.critical_priorities,
            &settings.escalation_statuses,
        );
        let keys: Vec<_> = items.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["1", "2"]);
    }

    #[test]
    fn stale_items_oldest_first() {
        let issues = vec![
            issue("new", "2024-03-01"),
            issue("old", "2024-01-01"),
            done("closed", "2023-01-01", "2023-02-01"),
            issue("mid", "2024-02-01"),
        ];
        let stale = stale_items(&issues, at("2024-03-11"), 2);
        let keys: Vec<_> = stale.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["old", "mid"]);
        assert_eq!(stale[0].days_open, 70);
    }
}
