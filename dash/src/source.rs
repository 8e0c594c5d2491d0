//! Issue source interface and implementations

pub mod json;

use crate::error::Result;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use json::JsonFileSource;

/// SearchPage is one page of an issue search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub start_at: usize,
    #[serde(default)]
    pub max_results: usize,
    #[serde(default)]
    pub total: usize,
    /// Raw issue objects. Kept untyped so one bad record cannot fail the page.
    #[serde(default)]
    pub issues: Vec<Value>,
}

/// IssueSource is the issue-tracker collaborator.
///
/// Implementations only provide paged access; `search_all` walks every page
/// so tracker-side page limits never truncate a snapshot.
#[async_trait]
pub trait IssueSource: Send + Sync {
    async fn fetch_page(
        &self,
        query: &str,
        fields: &[String],
        start_at: usize,
        max_results: usize,
    ) -> Result<SearchPage>;

    /// Retrieve the complete result set of `query`.
    async fn search_all(&self, query: &str, fields: &[String], page_size: usize) -> Result<Vec<Value>> {
        let page_size = page_size.max(1);
        let mut records = Vec::new();
        loop {
            let page = self.fetch_page(query, fields, records.len(), page_size).await?;
            let received = page.issues.len();
            records.extend(page.issues);
            debug!("fetched page at {}: {} records ({} of {})", page.start_at, received, records.len(), page.total);
            if received == 0 || records.len() >= page.total {
                break;
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `total` records but never more than `cap` per page, whatever
    /// the caller asks for.
    struct CappedSource {
        total: usize,
        cap: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IssueSource for CappedSource {
        async fn fetch_page(&self, _: &str, _: &[String], start_at: usize, max_results: usize) -> Result<SearchPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let end = (start_at + max_results.min(self.cap)).min(self.total);
            let issues = (start_at..end).map(|i| json!({"key": format!("A-{i}")})).collect();
            Ok(SearchPage { start_at, max_results, total: self.total, issues })
        }
    }

    #[tokio::test]
    async fn search_all_walks_past_page_caps() {
        let source = CappedSource { total: 125, cap: 50, calls: AtomicUsize::new(0) };
        let records = source.search_all("project = A", &[], 100).await.unwrap();
        assert_eq!(records.len(), 125);
        assert_eq!(records[124]["key"], "A-124");
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn search_all_handles_empty_result() {
        let source = CappedSource { total: 0, cap: 50, calls: AtomicUsize::new(0) };
        let records = source.search_all("project = A", &[], 100).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
