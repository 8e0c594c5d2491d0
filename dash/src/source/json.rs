//! File-backed issue source reading saved search results

use crate::error::{Error, Result};
use crate::source::{IssueSource, SearchPage};
use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::path::PathBuf;

/// JsonFileSource serves a dump of tracker search results.
///
/// The file may hold a single search page (`{"issues": [...]}`), an array
/// of such pages, or a bare array of issue objects. The query is not
/// evaluated: the dump is already the result of one.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileSource { path: path.into() }
    }

    async fn load(&self) -> Result<Vec<Value>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::SourceUnavailable(format!("cannot read {}: {e}", self.path.display())))?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| Error::SourceUnavailable(format!("{} is not valid JSON: {e}", self.path.display())))?;
        flatten_dump(value)
            .ok_or_else(|| Error::SourceUnavailable(format!("{} is not a search result dump", self.path.display())))
    }
}

fn is_page(value: &Value) -> bool {
    value.get("issues").map(Value::is_array).unwrap_or(false)
}

fn page_issues(page: Value) -> Vec<Value> {
    match page {
        Value::Object(mut map) => match map.remove("issues") {
            Some(Value::Array(issues)) => issues,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn flatten_dump(value: Value) -> Option<Vec<Value>> {
    match value {
        page @ Value::Object(_) if is_page(&page) => Some(page_issues(page)),
        Value::Array(items) if !items.is_empty() && items.iter().all(is_page) => {
            Some(items.into_iter().flat_map(page_issues).collect())
        }
        Value::Array(items) => Some(items),
        _ => None,
    }
}

#[async_trait]
impl IssueSource for JsonFileSource {
    async fn fetch_page(
        &self,
        query: &str,
        _fields: &[String],
        start_at: usize,
        max_results: usize,
    ) -> Result<SearchPage> {
        debug!("serving '{}' from {}", query, self.path.display());
        let all = self.load().await?;
        let total = all.len();
        let issues = all.into_iter().skip(start_at).take(max_results).collect();
        Ok(SearchPage {
            start_at,
            max_results,
            total,
            issues,
        })
    }
}
