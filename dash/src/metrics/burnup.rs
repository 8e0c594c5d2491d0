//! Cumulative scope vs. delivered series on a daily calendar.

use crate::types::Issue;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnupPoint {
    pub date: NaiveDate,
    pub scope: usize,
    pub delivered: usize,
}

/// Scope counts issues by creation day, delivered counts Done issues by
/// resolution day; both are running totals over every day from the first
/// observation to the last. A day without events carries the previous
/// total forward.
pub fn burnup(issues: &[Issue]) -> Vec<BurnupPoint> {
    let mut created: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    let mut resolved: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for issue in issues {
        *created.entry(issue.created_date()).or_default() += 1;
        if issue.is_done() {
            if let Some(date) = issue.resolved_date() {
                *resolved.entry(date).or_default() += 1;
            }
        }
    }

    let first = created.keys().chain(resolved.keys()).min().copied();
    let last = created.keys().chain(resolved.keys()).max().copied();
    let (Some(first), Some(last)) = (first, last) else {
        return Vec::new();
    };

    let mut points = Vec::new();
    let (mut scope, mut delivered) = (0, 0);
    for date in first.iter_days().take_while(|d| *d <= last) {
        scope += created.get(&date).copied().unwrap_or(0);
        delivered += resolved.get(&date).copied().unwrap_or(0);
        points.push(BurnupPoint { date, scope, delivered });
    }
    points
}
