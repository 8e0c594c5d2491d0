//! MetricsEngine: pure computations over the filtered views.
//!
//! Period-bound numbers (headline KPIs, portfolio health, burnup, late
//! analysis) read the reporting view. Everything describing the live backlog
//! (backlog counters, distributions, team load, pulse, critical and stale
//! items, sprints) reads the operational view.

pub mod burnup;
pub mod distribution;
pub mod kpi;
pub mod pulse;
pub mod risk;
pub mod sprint;
pub mod team;

use crate::config::MetricsSettings;
use crate::filter::{DateRange, Views};
use crate::types::Issue;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use burnup::BurnupPoint;
pub use distribution::{NameValue, StatusByProject};
pub use kpi::{BacklogKpis, Kpis, PortfolioKpis};
pub use pulse::{DailyPulse, MemberDay, PulseMetric, Trend};
pub use risk::{CriticalItem, HeatCell, StaleItem};
pub use sprint::SprintProgress;
pub use team::AssigneeLoad;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Charts {
    pub status_by_project: Vec<StatusByProject>,
    pub burndown: Vec<BurnupPoint>,
    pub type_distribution: Vec<NameValue>,
    pub status_distribution: Vec<NameValue>,
    pub team_load: Vec<AssigneeLoad>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub late_heatmap: Vec<HeatCell>,
    pub late_projects: Vec<NameValue>,
    pub critical: Vec<CriticalItem>,
    pub stale: Vec<StaleItem>,
}

/// MetricsSnapshot is everything a dashboard renders for one request.
/// Built once and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub generated_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dataset_fetched_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub range: Option<DateRange>,
    pub kpis: Kpis,
    pub portfolio: PortfolioKpis,
    pub backlog: BacklogKpis,
    pub charts: Charts,
    pub daily_pulse: DailyPulse,
    pub risk: Risk,
    pub sprints: SprintProgress,
    pub overloaded: Vec<String>,
    /// Leading rows of the reporting view for tabular display.
    pub raw_subset: Vec<Issue>,
    /// Size of the full reporting view.
    pub total_rows: usize,
}

/// MetricsEngine turns filtered views into a MetricsSnapshot
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    settings: MetricsSettings,
    unassigned: String,
    backlog_sprint: String,
}

impl MetricsEngine {
    pub fn new(settings: MetricsSettings, unassigned: impl Into<String>, backlog_sprint: impl Into<String>) -> Self {
        MetricsEngine {
            settings,
            unassigned: unassigned.into(),
            backlog_sprint: backlog_sprint.into(),
        }
    }

    /// Compute a snapshot. `now` fixes "today" for the pulse and the age of
    /// stale items; `sprints` picks the sprints to track (default when `None`).
    pub fn compute(&self, views: &Views, now: NaiveDateTime, sprints: Option<&BTreeSet<String>>) -> MetricsSnapshot {
        let s = &self.settings;
        let operational = views.operational.as_slice();
        let reporting = views.reporting.as_slice();
        let today = now.date();

        let team_load = team::team_load(operational, s.overload_issue_threshold, s.overload_points_threshold);
        let overloaded = team::overloaded(&team_load);

        MetricsSnapshot {
            generated_at: now,
            dataset_fetched_at: None,
            range: views.range,
            kpis: kpi::headline(reporting, &s.bug_types),
            portfolio: kpi::portfolio(reporting),
            backlog: kpi::backlog(operational, views.range, &s.bug_types, &s.critical_priorities),
            charts: Charts {
                status_by_project: distribution::status_by_project(reporting),
                burndown: burnup::burnup(reporting),
                type_distribution: distribution::type_distribution(operational),
                status_distribution: distribution::status_distribution(operational),
                team_load,
            },
            daily_pulse: pulse::daily_pulse(operational, today, s.pulse_window_days, &self.unassigned),
            risk: Risk {
                late_heatmap: risk::late_heatmap(reporting),
                late_projects: risk::late_projects(reporting, s.risk_top_n),
                critical: risk::critical_items(operational, &s.critical_priorities, &s.escalation_statuses),
                stale: risk::stale_items(operational, now, s.stale_top_n),
            },
            sprints: sprint::sprint_progress(operational, sprints, &self.backlog_sprint),
            overloaded,
            raw_subset: reporting.iter().take(s.preview_limit).cloned().collect(),
            total_rows: reporting.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterCascade, FilterSelection, Period};
    use crate::types::fixtures::{at, day, done, issue};

    fn engine() -> MetricsEngine {
        MetricsEngine::new(MetricsSettings::default(), "Unassigned", "Backlog")
    }

    #[test]
    fn empty_views_give_a_defined_snapshot() {
        let snapshot = engine().compute(&Views::default(), at("2024-01-15"), None);
        assert_eq!(snapshot.kpis, Kpis::default());
        assert_eq!(snapshot.portfolio.on_time_pct, None);
        assert_eq!(snapshot.portfolio.velocity, None);
        assert!(snapshot.charts.burndown.is_empty());
        assert_eq!(snapshot.daily_pulse.delivered.trend, Trend::Up);
        assert!(snapshot.raw_subset.is_empty());
        assert_eq!(snapshot.total_rows, 0);
    }

    #[test]
    fn preview_is_bounded_but_total_is_not() {
        let issues: Vec<Issue> = (0..75).map(|n| issue(&format!("A-{n}"), "2024-01-02")).collect();
        let views = FilterCascade::apply(&issues, &FilterSelection::default(), day("2024-01-15"));
        let snapshot = engine().compute(&views, at("2024-01-15"), None);
        assert_eq!(snapshot.raw_subset.len(), 50);
        assert_eq!(snapshot.total_rows, 75);
        assert_eq!(snapshot.raw_subset[0].key, "A-0");
    }

    #[test]
    fn date_window_bounds_reporting_metrics_only() {
        let mut old_late = issue("OLD", "2023-06-01");
        old_late.late = true;
        let issues = vec![old_late, issue("NEW", "2024-01-10"), done("D", "2024-01-03", "2024-01-12")];
        let selection = FilterSelection {
            period: Period::ThisMonth,
            ..FilterSelection::default()
        };
        let views = FilterCascade::apply(&issues, &selection, day("2024-01-15"));
        let snapshot = engine().compute(&views, at("2024-01-15"), None);

        assert_eq!(snapshot.kpis.total, 2);
        assert_eq!(snapshot.portfolio.on_time_pct, Some(100.0));
        assert!(snapshot.risk.late_heatmap.is_empty());
        // the backlog still sees the issue created last year
        assert_eq!(snapshot.backlog.open, 2);
        assert_eq!(snapshot.backlog.done_in_period, 1);
        assert_eq!(snapshot.risk.stale[0].key, "OLD");
    }

    #[test]
    fn snapshot_serializes_chart_fields() {
        let views = FilterCascade::apply(&[issue("A-1", "2024-01-15")], &FilterSelection::default(), day("2024-01-15"));
        let snapshot = engine().compute(&views, at("2024-01-15"), None);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["kpis"]["total"], 1);
        assert_eq!(json["charts"]["burndown"][0]["scope"], 1);
        assert_eq!(json["charts"]["team_load"][0]["assignee"], "Ana");
        assert_eq!(json["daily_pulse"]["created"]["trend"], "up");
        assert_eq!(json["daily_pulse"]["team"][0]["created_count"], 1);
    }
}
