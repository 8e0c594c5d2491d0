//! Normalization of raw tracker records into canonical issues.
//!
//! All field defaults live here. Records missing a key, summary, status,
//! type, project or creation timestamp are skipped with a diagnostic; the
//! rest of the batch is unaffected.

use crate::config::{NormalizeSettings, SourceSettings};
use crate::error::{Error, Result};
use crate::raw::{Named, RawRecord};
use crate::types::{Diagnostic, Issue, StatusCategory};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime};
use log::warn;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

static SPRINT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"name=([^,\]]+)") {
    Ok(re) => re,
    Err(_) => unreachable!("static regex pattern"),
});

/// A sprint parser reads a sprint name from one element of the sprint field.
pub type SprintParser = fn(&Value) -> Option<String>;

/// Sprint parsers in the order they are tried. The configured default
/// applies when none of them yields a name.
pub const SPRINT_PARSERS: &[SprintParser] = &[structured_sprint_name, pattern_sprint_name];

/// Structured sprint objects expose a `name` member.
pub fn structured_sprint_name(value: &Value) -> Option<String> {
    value
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Legacy trackers serialize sprints as `...Sprint@1a2b[id=3,name=Sprint 4,...]`.
pub fn pattern_sprint_name(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => return None,
        other => other.to_string(),
    };
    SPRINT_NAME_RE
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Resolve the sprint name of a raw sprint field. Lists use their first
/// element.
pub fn sprint_name(field: Option<&Value>, default: &str) -> String {
    let first = match field {
        Some(Value::Array(items)) => items.first(),
        other => other,
    };
    first
        .and_then(|value| SPRINT_PARSERS.iter().find_map(|parse| parse(value)))
        .unwrap_or_else(|| default.to_string())
}

/// Parse a tracker timestamp into naive wall-clock time.
///
/// Offset-bearing timestamps are converted to `offset` (host local time
/// when `None`) before the offset is dropped. Naive timestamps and bare
/// dates are taken as already local.
pub fn parse_timestamp(raw: &str, offset: Option<FixedOffset>) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    let aware = DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok();
    if let Some(dt) = aware {
        return Some(match offset {
            Some(offset) => dt.with_timezone(&offset).naive_local(),
            None => dt.with_timezone(&Local).naive_local(),
        });
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_date(raw: &str, offset: Option<FixedOffset>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(raw, offset).map(|ts| ts.date()))
}

fn story_points(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn name_of(named: Option<&Named>) -> Option<&str> {
    named
        .and_then(|n| n.name.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
}

/// Output of one normalization batch.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub issues: Vec<Issue>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Normalizer maps raw records to canonical issues
#[derive(Debug, Clone)]
pub struct Normalizer {
    settings: NormalizeSettings,
    story_points_field: String,
    sprint_field: String,
    offset: Option<FixedOffset>,
}

impl Normalizer {
    pub fn new(source: &SourceSettings, settings: &NormalizeSettings) -> Result<Self> {
        Ok(Normalizer {
            settings: settings.clone(),
            story_points_field: source.story_points_field.clone(),
            sprint_field: source.sprint_field.clone(),
            offset: settings.offset()?,
        })
    }

    /// Normalize a batch, preserving order. Malformed records and repeated
    /// keys are skipped and reported.
    pub fn normalize(&self, records: Vec<Value>) -> Normalized {
        let mut out = Normalized::default();
        let mut seen = HashSet::new();

        for value in records {
            let key_hint = value.get("key").and_then(Value::as_str).map(str::to_string);
            let result = RawRecord::deserialize(value)
                .map_err(|e| Error::malformed(key_hint.as_deref(), e.to_string()))
                .and_then(|record| self.normalize_record(&record));

            let failure = match result {
                Ok(issue) if seen.insert(issue.key.clone()) => {
                    out.issues.push(issue);
                    continue;
                }
                Ok(issue) => Error::malformed(Some(&issue.key), "duplicate key"),
                Err(err) => err,
            };

            warn!("skipping record: {}", failure);
            let (key, reason) = match failure {
                Error::RecordMalformed { key, reason } => (key, reason),
                other => (key_hint, other.to_string()),
            };
            out.diagnostics.push(Diagnostic { key, reason });
        }
        out
    }

    /// Normalize one record. Derived fields are left at their neutral
    /// values for the Classifier to fill in.
    pub fn normalize_record(&self, record: &RawRecord) -> Result<Issue> {
        let key = record
            .key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::malformed(None, "key is missing"))?;
        let missing = |what: &str| Error::malformed(Some(key), format!("{what} is missing"));

        let fields = &record.fields;
        let summary = fields
            .summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| missing("summary"))?;
        let status = name_of(fields.status.as_ref()).ok_or_else(|| missing("status"))?;
        let issue_type = name_of(fields.issuetype.as_ref()).ok_or_else(|| missing("issue type"))?;
        let project = name_of(fields.project.as_ref()).ok_or_else(|| missing("project"))?;
        let created = fields
            .created
            .as_deref()
            .and_then(|raw| parse_timestamp(raw, self.offset))
            .ok_or_else(|| missing("created timestamp"))?;

        let mut resolved = fields
            .resolutiondate
            .as_deref()
            .and_then(|raw| parse_timestamp(raw, self.offset));
        if let Some(r) = resolved {
            if r < created {
                warn!("{key}: resolved {r} precedes created {created}, clamping");
                resolved = Some(created);
            }
        }

        let mut points = story_points(fields.custom_field(&self.story_points_field)).unwrap_or(0.0);
        if !points.is_finite() || points < 0.0 {
            warn!("{key}: story points {points} out of range, using 0");
            points = 0.0;
        }

        let labels = fields.labels.clone().unwrap_or_default();
        let client = labels
            .iter()
            .find(|l| l.starts_with(&self.settings.client_label_prefix))
            .cloned()
            .unwrap_or_else(|| self.settings.default_client.clone());
        let module = fields
            .components
            .as_ref()
            .and_then(|c| name_of(c.first()))
            .map(str::to_string)
            .unwrap_or_else(|| self.settings.default_module.clone());

        Ok(Issue {
            key: key.to_string(),
            summary: summary.to_string(),
            assignee: fields
                .assignee
                .as_ref()
                .and_then(|a| a.display_name.clone())
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| self.settings.unassigned.clone()),
            status: status.to_string(),
            status_category: StatusCategory::Active,
            issue_type: issue_type.to_string(),
            priority: name_of(fields.priority.as_ref())
                .map(str::to_string)
                .unwrap_or_else(|| self.settings.default_priority.clone()),
            project: project.to_string(),
            created,
            resolved,
            due_date: fields.duedate.as_deref().and_then(|raw| parse_date(raw, self.offset)),
            updated: fields
                .updated
                .as_deref()
                .and_then(|raw| parse_timestamp(raw, self.offset))
                .unwrap_or(created),
            story_points: points,
            sprint: sprint_name(fields.custom_field(&self.sprint_field), &self.settings.default_sprint),
            original_estimate_secs: fields.timeoriginalestimate.unwrap_or(0),
            time_spent_secs: fields.timespent.unwrap_or(0),
            module,
            client,
            labels: labels.into_iter().collect(),
            late: false,
            lead_time_days: None,
        })
    }
}
