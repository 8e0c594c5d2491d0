//! Raw tracker records, as returned by an issue search.
//!
//! The tracker exposes fields inconsistently: any of them may be absent or
//! `null`, custom fields appear under deployment-specific names, and the
//! sprint field comes either as structured objects or as legacy strings.
//! Everything is optional here; defaults are applied once, by the
//! Normalizer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// RawRecord is one issue of a search result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub fields: RawFields,
}

/// RawFields mirrors the `fields` object of a search result issue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub assignee: Option<RawUser>,
    #[serde(default)]
    pub status: Option<Named>,
    #[serde(default)]
    pub issuetype: Option<Named>,
    #[serde(default)]
    pub priority: Option<Named>,
    #[serde(default)]
    pub project: Option<Named>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub resolutiondate: Option<String>,
    #[serde(default)]
    pub duedate: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub timeoriginalestimate: Option<u64>,
    #[serde(default)]
    pub timespent: Option<u64>,
    #[serde(default)]
    pub components: Option<Vec<Named>>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    /// Custom fields (`customfield_*`) and anything else not modelled above.
    #[serde(flatten)]
    pub custom: HashMap<String, Value>,
}

impl RawFields {
    /// Looks up a custom field, treating JSON `null` as absent.
    pub fn custom_field(&self, name: &str) -> Option<&Value> {
        self.custom.get(name).filter(|v| !v.is_null())
    }
}

/// Named is any tracker object identified by a display name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
    #[serde(default)]
    pub display_name: Option<String>,
}
