use std::sync::Arc;

use crate::analytics::{EventSink, LogEventSink};
use crate::jobs::{JobInsights, JobListings, JobRepository, JobStore, MemoryJobStore};
use crate::salary::{SalaryLookup, StaticSalaryTable};
use crate::search::{CacheSettings, SystemClock};
use crate::submissions::{MemorySubmissionStore, SubmissionStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Cache-fronted job queries.
    pub jobs: Arc<JobRepository>,
    /// Listing pipeline built on `jobs` and the salary lookup.
    pub listings: Arc<JobListings>,
    /// Summary, salary dataset and trends.
    pub insights: Arc<JobInsights>,
    /// Analytics destination for search, apply and subscribe events.
    pub events: Arc<dyn EventSink>,
    pub submissions: Arc<dyn SubmissionStore>,
    /// Salt for hashing subscriber emails in analytics.
    pub analytics_salt: Arc<str>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn JobStore>,
        salaries: Arc<dyn SalaryLookup>,
        events: Arc<dyn EventSink>,
        submissions: Arc<dyn SubmissionStore>,
        cache: CacheSettings,
    ) -> Self {
        let jobs = Arc::new(JobRepository::new(store, cache, Arc::new(SystemClock)));
        let listings = Arc::new(JobListings::new(jobs.clone(), salaries.clone()));
        let insights = Arc::new(JobInsights::new(jobs.clone(), salaries));
        Self {
            jobs,
            listings,
            insights,
            events,
            submissions,
            analytics_salt: Arc::from("dev"),
        }
    }

    /// Demo catalogue and salary table held in memory, events to the log.
    pub fn in_memory(cache: CacheSettings) -> Self {
        Self::new(
            Arc::new(MemoryJobStore::demo()),
            Arc::new(StaticSalaryTable::demo()),
            Arc::new(LogEventSink),
            Arc::new(MemorySubmissionStore::new()),
            cache,
        )
    }

    pub fn with_analytics_salt(mut self, salt: &str) -> Self {
        self.analytics_salt = Arc::from(salt);
        self
    }
}
