//! Hierarchical filter cascade.
//!
//! Levels narrow in a fixed order: client, then project, then module. The
//! status, type and assignee candidates come from the module-narrowed
//! subset and do not depend on each other. A selection only ever applies
//! to values that are candidates at its level, so a parent change cannot
//! leave a stale child selected; when nothing selected survives, the level
//! falls back to all of its candidates.

use crate::error::{Error, Result};
use crate::types::Issue;
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Selection at one filter level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<BTreeSet<String>>", into = "Option<BTreeSet<String>>")]
pub enum Selection {
    /// Every available value.
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl Selection {
    pub fn only<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Only(values.into_iter().map(Into::into).collect())
    }

    /// The effective value set given the candidates at this level.
    pub fn resolve(&self, candidates: &BTreeSet<String>) -> BTreeSet<String> {
        match self {
            Selection::All => candidates.clone(),
            Selection::Only(chosen) => {
                let kept: BTreeSet<String> = chosen.intersection(candidates).cloned().collect();
                if kept.is_empty() {
                    candidates.clone()
                } else {
                    kept
                }
            }
        }
    }
}

impl From<Option<BTreeSet<String>>> for Selection {
    fn from(value: Option<BTreeSet<String>>) -> Self {
        match value {
            Some(values) => Selection::Only(values),
            None => Selection::All,
        }
    }
}

impl From<Selection> for Option<BTreeSet<String>> {
    fn from(value: Selection) -> Self {
        match value {
            Selection::All => None,
            Selection::Only(values) => Some(values),
        }
    }
}

/// DateRange is an inclusive range of creation dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidInput(format!("date range starts after it ends: {start}..{end}")));
        }
        Ok(DateRange { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Period is a reporting window, resolved against "today"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    All,
    ThisMonth,
    LastMonth,
    LastQuarter,
    ThisYear,
    Custom(DateRange),
}

impl Period {
    /// The creation-date window, or `None` when unbounded.
    pub fn range(&self, today: NaiveDate) -> Option<DateRange> {
        let first_of_month = today.with_day(1).unwrap_or(today);
        match self {
            Period::All => None,
            Period::ThisMonth => Some(DateRange { start: first_of_month, end: today }),
            Period::LastMonth => {
                let start = first_of_month.checked_sub_months(Months::new(1)).unwrap_or(first_of_month);
                let end = first_of_month.pred_opt().unwrap_or(first_of_month);
                Some(DateRange { start, end })
            }
            Period::LastQuarter => Some(DateRange {
                start: today.checked_sub_months(Months::new(3)).unwrap_or(today),
                end: today,
            }),
            Period::ThisYear => Some(DateRange {
                start: today.with_ordinal(1).unwrap_or(today),
                end: today,
            }),
            Period::Custom(range) => Some(*range),
        }
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Period::All),
            "this-month" => Ok(Period::ThisMonth),
            "last-month" => Ok(Period::LastMonth),
            "last-quarter" => Ok(Period::LastQuarter),
            "this-year" => Ok(Period::ThisYear),
            other => {
                let (start, end) = other.split_once("..").ok_or_else(|| invalid_period(s))?;
                let parse = |d: &str| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").map_err(|_| invalid_period(s));
                Ok(Period::Custom(DateRange::new(parse(start)?, parse(end)?)?))
            }
        }
    }
}

fn invalid_period(s: &str) -> Error {
    Error::InvalidInput(format!(
        "invalid period '{s}'\n  hint: use all, this-month, last-month, last-quarter, this-year or YYYY-MM-DD..YYYY-MM-DD"
    ))
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::All => write!(f, "all"),
            Period::ThisMonth => write!(f, "this-month"),
            Period::LastMonth => write!(f, "last-month"),
            Period::LastQuarter => write!(f, "last-quarter"),
            Period::ThisYear => write!(f, "this-year"),
            Period::Custom(r) => write!(f, "{}..{}", r.start, r.end),
        }
    }
}

/// FilterSelection is what the caller picked at every level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSelection {
    pub clients: Selection,
    pub projects: Selection,
    pub modules: Selection,
    pub statuses: Selection,
    pub types: Selection,
    pub assignees: Selection,
    pub period: Period,
}

/// Candidate values at every level, for populating selectors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub clients: Vec<String>,
    pub projects: Vec<String>,
    pub modules: Vec<String>,
    pub statuses: Vec<String>,
    pub types: Vec<String>,
    pub assignees: Vec<String>,
}

/// The effective value set at every level after cascading
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSelection {
    pub clients: BTreeSet<String>,
    pub projects: BTreeSet<String>,
    pub modules: BTreeSet<String>,
    pub statuses: BTreeSet<String>,
    pub types: BTreeSet<String>,
    pub assignees: BTreeSet<String>,
}

impl ResolvedSelection {
    pub fn matches(&self, issue: &Issue) -> bool {
        self.clients.contains(&issue.client)
            && self.projects.contains(&issue.project)
            && self.modules.contains(&issue.module)
            && self.statuses.contains(&issue.status)
            && self.types.contains(&issue.issue_type)
            && self.assignees.contains(&issue.assignee)
    }
}

/// The two filtered views of a dataset.
#[derive(Debug, Clone, Default)]
pub struct Views {
    /// Every filter except the date window: the live backlog.
    pub operational: Vec<Issue>,
    /// The operational view restricted to the creation-date window.
    pub reporting: Vec<Issue>,
    pub range: Option<DateRange>,
    pub options: FilterOptions,
    pub resolved: ResolvedSelection,
}

fn distinct<'a>(issues: impl Iterator<Item = &'a Issue>, field: fn(&Issue) -> &str) -> BTreeSet<String> {
    issues.map(|i| field(i).to_string()).collect()
}

/// FilterCascade narrows a dataset according to a FilterSelection
pub struct FilterCascade;

impl FilterCascade {
    /// Compute candidates and effective selections level by level.
    pub fn resolve(issues: &[Issue], selection: &FilterSelection) -> (FilterOptions, ResolvedSelection) {
        let client_options = distinct(issues.iter(), |i| i.client.as_str());
        let clients = selection.clients.resolve(&client_options);
        let by_client: Vec<&Issue> = issues.iter().filter(|i| clients.contains(&i.client)).collect();

        let project_options = distinct(by_client.iter().copied(), |i| i.project.as_str());
        let projects = selection.projects.resolve(&project_options);
        let by_project: Vec<&Issue> = by_client.into_iter().filter(|i| projects.contains(&i.project)).collect();

        let module_options = distinct(by_project.iter().copied(), |i| i.module.as_str());
        let modules = selection.modules.resolve(&module_options);
        let by_module: Vec<&Issue> = by_project.into_iter().filter(|i| modules.contains(&i.module)).collect();

        let status_options = distinct(by_module.iter().copied(), |i| i.status.as_str());
        let type_options = distinct(by_module.iter().copied(), |i| i.issue_type.as_str());
        let assignee_options = distinct(by_module.iter().copied(), |i| i.assignee.as_str());

        let resolved = ResolvedSelection {
            clients,
            projects,
            modules,
            statuses: selection.statuses.resolve(&status_options),
            types: selection.types.resolve(&type_options),
            assignees: selection.assignees.resolve(&assignee_options),
        };
        let options = FilterOptions {
            clients: client_options.into_iter().collect(),
            projects: project_options.into_iter().collect(),
            modules: module_options.into_iter().collect(),
            statuses: status_options.into_iter().collect(),
            types: type_options.into_iter().collect(),
            assignees: assignee_options.into_iter().collect(),
        };
        (options, resolved)
    }

    /// Build the operational and reporting views, keeping dataset order.
    pub fn apply(issues: &[Issue], selection: &FilterSelection, today: NaiveDate) -> Views {
        let (options, resolved) = Self::resolve(issues, selection);
        let range = selection.period.range(today);

        let operational: Vec<Issue> = issues.iter().filter(|i| resolved.matches(i)).cloned().collect();
        let reporting = operational
            .iter()
            .filter(|i| range.map_or(true, |r| r.contains(i.created_date())))
            .cloned()
            .collect();

        Views {
            operational,
            reporting,
            range,
            options,
            resolved,
        }
    }
}
