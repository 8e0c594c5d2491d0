//! Scalar KPIs.
//!
//! Ratios and averages over nothing are `None`, never a division by zero
//! and never a made-up 0.

use crate::filter::DateRange;
use crate::types::Issue;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Headline counts over the reporting view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total: usize,
    pub active: usize,
    pub done: usize,
    pub bugs: usize,
}

/// Portfolio health over the reporting view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioKpis {
    pub projects: usize,
    pub late_projects: usize,
    /// Share of issues that are not late, in percent.
    pub on_time_pct: Option<f64>,
    /// Mean story points resolved per month.
    pub velocity: Option<f64>,
    pub avg_lead_time_days: Option<f64>,
}

/// Backlog counters over the operational view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacklogKpis {
    pub open: usize,
    pub done_in_period: usize,
    pub critical: usize,
    pub bugs: usize,
    pub pending_bugs: usize,
}

pub fn headline(issues: &[Issue], bug_types: &BTreeSet<String>) -> Kpis {
    Kpis {
        total: issues.len(),
        active: issues.iter().filter(|i| i.is_active()).count(),
        done: issues.iter().filter(|i| i.is_done()).count(),
        bugs: issues.iter().filter(|i| bug_types.contains(&i.issue_type)).count(),
    }
}

pub fn portfolio(issues: &[Issue]) -> PortfolioKpis {
    let projects: BTreeSet<&str> = issues.iter().map(|i| i.project.as_str()).collect();
    let late_projects: BTreeSet<&str> = issues.iter().filter(|i| i.late).map(|i| i.project.as_str()).collect();
    PortfolioKpis {
        projects: projects.len(),
        late_projects: late_projects.len(),
        on_time_pct: on_time_pct(issues),
        velocity: velocity(issues),
        avg_lead_time_days: average_lead_time(issues),
    }
}

/// `(1 - mean(late)) * 100`.
pub fn on_time_pct(issues: &[Issue]) -> Option<f64> {
    if issues.is_empty() {
        return None;
    }
    let late = issues.iter().filter(|i| i.late).count() as f64;
    Some((1.0 - late / issues.len() as f64) * 100.0)
}

/// Story points of Done issues summed per resolution month, averaged over
/// the months that have at least one resolution. Calendar months without
/// resolutions are not counted as zero.
pub fn velocity(issues: &[Issue]) -> Option<f64> {
    let mut per_month: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for issue in issues.iter().filter(|i| i.is_done()) {
        if let Some(resolved) = issue.resolved {
            *per_month.entry((resolved.year(), resolved.month())).or_default() += issue.story_points;
        }
    }
    mean(per_month.values().copied())
}

/// Mean lead time of Done issues. Unresolved issues have no lead time and
/// are left out rather than counted as 0.
pub fn average_lead_time(issues: &[Issue]) -> Option<f64> {
    mean(
        issues
            .iter()
            .filter(|i| i.is_done())
            .filter_map(|i| i.lead_time_days)
            .map(|d| d as f64),
    )
}

pub fn backlog(
    issues: &[Issue],
    range: Option<DateRange>,
    bug_types: &BTreeSet<String>,
    critical_priorities: &BTreeSet<String>,
) -> BacklogKpis {
    let is_bug = |i: &&Issue| bug_types.contains(&i.issue_type);
    BacklogKpis {
        open: issues.iter().filter(|i| i.is_active()).count(),
        done_in_period: issues
            .iter()
            .filter(|i| i.is_done())
            .filter(|i| match (i.resolved_date(), range) {
                (Some(date), Some(range)) => range.contains(date),
                (Some(_), None) => true,
                (None, _) => false,
            })
            .count(),
        critical: issues
            .iter()
            .filter(|i| i.is_active() && critical_priorities.contains(&i.priority))
            .count(),
        bugs: issues.iter().filter(is_bug).count(),
        pending_bugs: issues.iter().filter(is_bug).filter(|i| i.is_active()).count(),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}
