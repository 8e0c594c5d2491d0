//! Settings for the pipeline, layered from defaults, an optional TOML file
//! and `DASH_*` environment variables.

use crate::error::Result;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `DASH_CACHE__TTL_SECS=600`.
pub const ENV_PREFIX: &str = "DASH";

/// Settings holds every tunable of the pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source: SourceSettings,
    pub normalize: NormalizeSettings,
    pub classify: ClassifySettings,
    pub metrics: MetricsSettings,
    pub cache: CacheSettings,
}

impl Settings {
    /// Load settings: built-in defaults, then `path` if given (a missing
    /// file is an error only when a path was passed explicitly), then the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("classify.done_statuses")
                    .with_list_parse_key("metrics.bug_types")
                    .with_list_parse_key("metrics.critical_priorities")
                    .with_list_parse_key("metrics.escalation_statuses")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}

/// Where and how raw records are queried.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub query: String,
    pub page_size: usize,
    /// Custom field holding story points. Differs between tracker setups.
    pub story_points_field: String,
    pub sprint_field: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        SourceSettings {
            query: "statusCategory != Done OR created >= -730d ORDER BY created DESC".to_string(),
            page_size: 100,
            story_points_field: "customfield_10026".to_string(),
            sprint_field: "customfield_10020".to_string(),
        }
    }
}

impl SourceSettings {
    /// Field list requested from the tracker.
    pub fn fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = [
            "summary",
            "assignee",
            "status",
            "created",
            "project",
            "duedate",
            "priority",
            "issuetype",
            "resolutiondate",
            "updated",
            "timeoriginalestimate",
            "timespent",
            "components",
            "labels",
        ]
        .iter()
        .map(|f| f.to_string())
        .collect();
        fields.push(self.story_points_field.clone());
        fields.push(self.sprint_field.clone());
        fields
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeSettings {
    pub client_label_prefix: String,
    /// Fixed offset such as `-03:00`; host local time when unset.
    pub utc_offset: Option<String>,
    pub unassigned: String,
    pub default_priority: String,
    pub default_sprint: String,
    pub default_module: String,
    pub default_client: String,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        NormalizeSettings {
            client_label_prefix: "CLI_".to_string(),
            utc_offset: None,
            unassigned: "Unassigned".to_string(),
            default_priority: "Medium".to_string(),
            default_sprint: "Backlog".to_string(),
            default_module: "General".to_string(),
            default_client: "Internal".to_string(),
        }
    }
}

impl NormalizeSettings {
    pub fn offset(&self) -> Result<Option<FixedOffset>> {
        match &self.utc_offset {
            None => Ok(None),
            Some(raw) => parse_offset(raw).map(Some).ok_or_else(|| {
                crate::Error::InvalidInput(format!("invalid utc_offset '{raw}', expected +HH:MM"))
            }),
        }
    }
}

fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("utc") || raw == "Z" {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => (rest.get(..2)?, rest.get(2..)?),
        None => (rest, "0"),
    };
    let secs = hours.parse::<i32>().ok()? * 3600 + minutes.parse::<i32>().ok()? * 60;
    FixedOffset::east_opt(sign * secs)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifySettings {
    /// Status names counted as Done. Exact, case-sensitive match.
    pub done_statuses: BTreeSet<String>,
}

impl Default for ClassifySettings {
    fn default() -> Self {
        ClassifySettings {
            done_statuses: to_set(&["Concluído", "Done", "Finalizado", "Resolvido", "Closed"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub bug_types: BTreeSet<String>,
    pub critical_priorities: BTreeSet<String>,
    pub escalation_statuses: BTreeSet<String>,
    pub overload_issue_threshold: usize,
    pub overload_points_threshold: f64,
    pub preview_limit: usize,
    pub risk_top_n: usize,
    pub stale_top_n: usize,
    pub pulse_window_days: u32,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        MetricsSettings {
            bug_types: to_set(&["Bug", "Bug Report"]),
            critical_priorities: to_set(&["High", "Highest", "Critical"]),
            escalation_statuses: to_set(&["Escalated", "Blocked", "Impediment"]),
            overload_issue_threshold: 10,
            overload_points_threshold: 20.0,
            preview_limit: 50,
            risk_top_n: 10,
            stale_top_n: 10,
            pulse_window_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings { ttl_secs: 3600 }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn to_set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}
