//! Service façade wiring source, cache, filters and metrics together.

use crate::cache::{IssueCache, Loader};
use crate::classify::Classifier;
use crate::config::{Settings, SourceSettings};
use crate::error::{Error, Result};
use crate::export::Exporter;
use crate::filter::{FilterCascade, FilterOptions, FilterSelection, Views};
use crate::metrics::{MetricsEngine, MetricsSnapshot};
use crate::normalize::Normalizer;
use crate::source::IssueSource;
use crate::types::{Dataset, Issue};
use async_trait::async_trait;
use chrono::{FixedOffset, Local, NaiveDateTime, Utc};
use log::{debug, info};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Clock yields the current naive local time.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Wall-clock time at `offset`, or in the host timezone.
pub fn local_now(offset: Option<FixedOffset>) -> NaiveDateTime {
    match offset {
        Some(offset) => Utc::now().with_timezone(&offset).naive_local(),
        None => Local::now().naive_local(),
    }
}

/// Pipeline fetches every matching record, normalizes and classifies them.
pub struct Pipeline<S> {
    source: S,
    search: SourceSettings,
    normalizer: Normalizer,
    classifier: Classifier,
    clock: Clock,
}

impl<S: IssueSource> Pipeline<S> {
    pub fn new(source: S, settings: &Settings, clock: Clock) -> Result<Self> {
        Ok(Pipeline {
            source,
            search: settings.source.clone(),
            normalizer: Normalizer::new(&settings.source, &settings.normalize)?,
            classifier: Classifier::new(&settings.classify),
            clock,
        })
    }
}

#[async_trait]
impl<S: IssueSource> Loader for Pipeline<S> {
    async fn load(&self) -> Result<Dataset> {
        let now = (self.clock)();
        info!("fetching issues: {}", self.search.query);
        let records = self
            .source
            .search_all(&self.search.query, &self.search.fields(), self.search.page_size)
            .await
            .map_err(|e| match e {
                Error::SourceUnavailable(_) => e,
                other => Error::SourceUnavailable(other.to_string()),
            })?;
        let fetched = records.len();

        let normalized = self.normalizer.normalize(records);
        let issues = self.classifier.classify_all(normalized.issues, now);
        info!(
            "fetched {} records: {} issues, {} skipped",
            fetched,
            issues.len(),
            normalized.diagnostics.len()
        );
        Ok(Dataset {
            issues,
            fetched_at: now,
            diagnostics: normalized.diagnostics,
        })
    }
}

/// Dashboard answers presentation and export requests from one cached
/// dataset.
pub struct Dashboard<S> {
    cache: IssueCache<Pipeline<S>>,
    engine: MetricsEngine,
    clock: Clock,
}

impl<S: IssueSource> Dashboard<S> {
    pub fn new(source: S, settings: &Settings) -> Result<Self> {
        let offset = settings.normalize.offset()?;
        Self::with_clock(source, settings, Arc::new(move || local_now(offset)))
    }

    /// Like `new`, with a caller-supplied notion of "now".
    pub fn with_clock(source: S, settings: &Settings, clock: Clock) -> Result<Self> {
        let pipeline = Pipeline::new(source, settings, Arc::clone(&clock))?;
        Ok(Dashboard {
            cache: IssueCache::new(pipeline, settings.cache.ttl()),
            engine: MetricsEngine::new(
                settings.metrics.clone(),
                settings.normalize.unassigned.clone(),
                settings.normalize.default_sprint.clone(),
            ),
            clock,
        })
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    /// The cached dataset, refreshed when stale or when forced.
    pub async fn dataset(&self, force_refresh: bool) -> Result<Arc<Dataset>> {
        self.cache.get(force_refresh).await
    }

    /// Every distinct value at every filter level, unfiltered.
    pub async fn list_filter_options(&self, force_refresh: bool) -> Result<FilterOptions> {
        self.filter_options(&FilterSelection::default(), force_refresh).await
    }

    /// Candidate values at every level under `selection`.
    pub async fn filter_options(&self, selection: &FilterSelection, force_refresh: bool) -> Result<FilterOptions> {
        let dataset = self.dataset(force_refresh).await?;
        let (options, _) = FilterCascade::resolve(&dataset.issues, selection);
        Ok(options)
    }

    pub async fn compute_dashboard(&self, selection: &FilterSelection, force_refresh: bool) -> Result<MetricsSnapshot> {
        self.compute_for_sprints(selection, None, force_refresh).await
    }

    /// `compute_dashboard` tracking an explicit set of sprints.
    pub async fn compute_for_sprints(
        &self,
        selection: &FilterSelection,
        sprints: Option<&BTreeSet<String>>,
        force_refresh: bool,
    ) -> Result<MetricsSnapshot> {
        let dataset = self.dataset(force_refresh).await?;
        let now = self.now();
        let views = self.views(&dataset, selection, now);
        debug!(
            "computing metrics: {} operational, {} reporting rows",
            views.operational.len(),
            views.reporting.len()
        );
        Ok(MetricsSnapshot {
            dataset_fetched_at: Some(dataset.fetched_at),
            ..self.engine.compute(&views, now, sprints)
        })
    }

    /// The full reporting view under `selection`.
    pub async fn export_rows(&self, selection: &FilterSelection, force_refresh: bool) -> Result<Vec<Issue>> {
        let dataset = self.dataset(force_refresh).await?;
        Ok(self.views(&dataset, selection, self.now()).reporting)
    }

    /// Hand the reporting view to `exporter`; returns the row count.
    pub async fn export(&self, selection: &FilterSelection, exporter: &dyn Exporter, force_refresh: bool) -> Result<usize> {
        let rows = self.export_rows(selection, force_refresh).await?;
        exporter.export(&rows)?;
        Ok(rows.len())
    }

    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }

    fn views(&self, dataset: &Dataset, selection: &FilterSelection, now: NaiveDateTime) -> Views {
        FilterCascade::apply(&dataset.issues, selection, now.date())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Selection;
    use crate::source::SearchPage;
    use crate::types::fixtures::at;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeSource {
        records: Vec<Value>,
        down: AtomicBool,
        pages: AtomicUsize,
    }

    #[async_trait]
    impl IssueSource for Arc<FakeSource> {
        async fn fetch_page(&self, _: &str, _: &[String], start_at: usize, max_results: usize) -> Result<SearchPage> {
            if self.down.load(Ordering::SeqCst) {
                return Err(Error::SourceUnavailable("401 Unauthorized".to_string()));
            }
            self.pages.fetch_add(1, Ordering::SeqCst);
            Ok(SearchPage {
                start_at,
                max_results,
                total: self.records.len(),
                issues: self.records.iter().skip(start_at).take(max_results).cloned().collect(),
            })
        }
    }

    fn record(key: &str, project: &str, status: &str, created: &str) -> Value {
        json!({
            "key": key,
            "fields": {
                "summary": format!("work on {key}"),
                "status": {"name": status},
                "issuetype": {"name": "Task"},
                "project": {"name": project},
                "assignee": {"displayName": "Ana"},
                "created": format!("{created}T10:00:00.000-0300"),
                "customfield_10026": 3
            }
        })
    }

    fn fake(records: Vec<Value>) -> Arc<FakeSource> {
        Arc::new(FakeSource {
            records,
            down: AtomicBool::new(false),
            pages: AtomicUsize::new(0),
        })
    }

    fn dashboard(source: Arc<FakeSource>) -> Dashboard<Arc<FakeSource>> {
        let mut settings = Settings::default();
        settings.normalize.utc_offset = Some("-03:00".to_string());
        settings.source.page_size = 2;
        Dashboard::with_clock(source, &settings, Arc::new(|| at("2024-01-15"))).unwrap()
    }

    #[tokio::test]
    async fn pages_through_the_whole_result_set() {
        let source = fake((1..=5).map(|n| record(&format!("P-{n}"), "Portal", "To Do", "2024-01-02")).collect());
        let dash = dashboard(Arc::clone(&source));
        let snapshot = dash.compute_dashboard(&FilterSelection::default(), false).await.unwrap();
        assert_eq!(snapshot.kpis.total, 5);
        assert_eq!(source.pages.load(Ordering::SeqCst), 3);
        assert_eq!(snapshot.dataset_fetched_at, Some(at("2024-01-15")));
    }

    #[tokio::test]
    async fn failed_forced_refresh_keeps_serving_previous_snapshot() {
        let source = fake(vec![record("P-1", "Portal", "Done", "2024-01-02")]);
        let dash = dashboard(Arc::clone(&source));
        dash.compute_dashboard(&FilterSelection::default(), false).await.unwrap();

        source.down.store(true, Ordering::SeqCst);
        let err = dash.compute_dashboard(&FilterSelection::default(), true).await.unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));

        let snapshot = dash.compute_dashboard(&FilterSelection::default(), false).await.unwrap();
        assert_eq!(snapshot.kpis.done, 1);
    }

    #[tokio::test]
    async fn options_cascade_from_the_selection() {
        let mut tagged = record("B-1", "Billing", "To Do", "2024-01-02");
        tagged["fields"]["labels"] = json!(["CLI_Acme"]);
        let source = fake(vec![record("P-1", "Portal", "To Do", "2024-01-02"), tagged]);
        let dash = dashboard(source);

        let all = dash.list_filter_options(false).await.unwrap();
        assert_eq!(all.clients, vec!["CLI_Acme", "Internal"]);
        assert_eq!(all.projects, vec!["Billing", "Portal"]);

        let selection = FilterSelection {
            clients: Selection::only(["CLI_Acme"]),
            ..FilterSelection::default()
        };
        let narrowed = dash.filter_options(&selection, false).await.unwrap();
        assert_eq!(narrowed.projects, vec!["Billing"]);
    }

    struct BrokenExporter;

    impl Exporter for BrokenExporter {
        fn export(&self, _: &[Issue]) -> Result<()> {
            Err(Error::Export("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn export_failure_does_not_touch_the_snapshot() {
        let source = fake(vec![record("P-1", "Portal", "To Do", "2024-01-02")]);
        let dash = dashboard(source);
        let selection = FilterSelection::default();
        let before = dash.compute_dashboard(&selection, false).await.unwrap();

        let err = dash.export(&selection, &BrokenExporter, false).await.unwrap_err();
        assert!(matches!(err, Error::Export(_)));

        let after = dash.compute_dashboard(&selection, false).await.unwrap();
        assert_eq!(before, after);
    }
}
