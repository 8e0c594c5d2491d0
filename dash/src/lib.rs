//! Delivery metrics over an issue tracker.
//!
//! Raw search results flow through the [`Normalizer`] and [`Classifier`]
//! into a cached [`Dataset`]; each request narrows it with the
//! [`FilterCascade`] and summarizes it with the [`MetricsEngine`].

pub mod cache;
pub mod classify;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod filter;
pub mod metrics;
pub mod normalize;
pub mod raw;
pub mod source;
pub mod types;

pub use cache::{IssueCache, Loader};
pub use classify::Classifier;
pub use config::Settings;
pub use dashboard::Dashboard;
pub use error::{Error, Result};
pub use export::{Exporter, JsonlExporter};
pub use filter::{DateRange, FilterCascade, FilterOptions, FilterSelection, Period, Selection};
pub use metrics::{MetricsEngine, MetricsSnapshot};
pub use normalize::Normalizer;
pub use source::{IssueSource, JsonFileSource};
pub use types::{Dataset, Diagnostic, Issue, StatusCategory};
