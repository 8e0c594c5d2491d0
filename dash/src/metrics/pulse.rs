//! Today's throughput against the trailing average.

use crate::types::Issue;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Up => write!(f, "up"),
            Trend::Down => write!(f, "down"),
        }
    }
}

/// PulseMetric compares today's count with the mean daily count of the
/// days before it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseMetric {
    pub value: usize,
    pub avg: f64,
    pub trend: Trend,
}

/// One member's activity today
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDay {
    pub name: String,
    pub delivered_count: usize,
    pub delivered_sp: f64,
    pub created_count: usize,
    /// Most recently updated issue touched today, as `KEY: Status`.
    pub recent_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPulse {
    pub delivered: PulseMetric,
    pub created: PulseMetric,
    pub team: Vec<MemberDay>,
}

/// Count the events falling on `today` and average the ones in
/// `[today - window_days, today)` over `window_days`.
///
/// Days without events count as zero, so a quiet week averages 0 and any
/// count today, including 0, trends up.
pub fn pulse_metric(dates: impl Iterator<Item = NaiveDate>, today: NaiveDate, window_days: u32) -> PulseMetric {
    let window_start = today
        .checked_sub_signed(Duration::days(i64::from(window_days)))
        .unwrap_or(NaiveDate::MIN);
    let (mut value, mut trailing) = (0usize, 0usize);
    for date in dates {
        if date == today {
            value += 1;
        } else if window_start <= date && date < today {
            trailing += 1;
        }
    }
    let avg = if window_days == 0 {
        0.0
    } else {
        trailing as f64 / f64::from(window_days)
    };
    PulseMetric {
        value,
        avg,
        trend: if value as f64 >= avg { Trend::Up } else { Trend::Down },
    }
}

fn delivered_on(issue: &Issue) -> Option<NaiveDate> {
    if issue.is_done() {
        issue.resolved_date()
    } else {
        None
    }
}

pub fn daily_pulse(issues: &[Issue], today: NaiveDate, window_days: u32, unassigned: &str) -> DailyPulse {
    DailyPulse {
        delivered: pulse_metric(issues.iter().filter_map(delivered_on), today, window_days),
        created: pulse_metric(issues.iter().map(Issue::created_date), today, window_days),
        team: team_day(issues, today, unassigned),
    }
}

/// Per-member activity for `today`. Every assignee in `issues` appears,
/// idle ones with zeros, except the `unassigned` placeholder.
pub fn team_day(issues: &[Issue], today: NaiveDate, unassigned: &str) -> Vec<MemberDay> {
    let mut by_member: BTreeMap<&str, Vec<&Issue>> = BTreeMap::new();
    for issue in issues.iter().filter(|i| i.assignee != unassigned) {
        by_member.entry(issue.assignee.as_str()).or_default().push(issue);
    }

    let mut team: Vec<MemberDay> = by_member
        .into_iter()
        .map(|(name, owned)| {
            let delivered: Vec<&&Issue> = owned.iter().filter(|i| delivered_on(i) == Some(today)).collect();
            let recent = owned
                .iter()
                .filter(|i| i.updated.date() == today)
                .max_by_key(|i| i.updated);
            MemberDay {
                name: name.to_string(),
                delivered_count: delivered.len(),
                delivered_sp: delivered.iter().map(|i| i.story_points).sum(),
                created_count: owned.iter().filter(|i| i.created_date() == today).count(),
                recent_status: recent.map(|i| format!("{}: {}", i.key, i.status)),
            }
        })
        .collect();

    team.sort_by(|a, b| {
        b.delivered_count
            .cmp(&a.delivered_count)
            .then(b.delivered_sp.total_cmp(&a.delivered_sp))
            .then_with(|| a.name.cmp(&b.name))
    });
    team
}
