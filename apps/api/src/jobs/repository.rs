//! Cache-fronted job queries.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::StoreError;
use crate::jobs::store::JobStore;
use crate::models::{JobRow, NewJob};
use crate::search::{CacheSettings, Clock, JobFilter, TtlCache};

type CountKey = (String, String);
type SearchKey = (String, String, i64, i64);

/// Title suggestions need at least this many characters.
pub const MIN_SUGGEST_CHARS: usize = 2;
pub const SUGGESTION_LIMIT: i64 = 8;

pub struct JobRepository {
    store: Arc<dyn JobStore>,
    counts: TtlCache<CountKey, i64>,
    searches: TtlCache<SearchKey, Vec<JobRow>>,
    /// Bumped by every insert that adds rows. A query that started under an
    /// older generation does not cache its result.
    generation: AtomicU64,
}

impl JobRepository {
    pub fn new(store: Arc<dyn JobStore>, settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            counts: TtlCache::new(settings, clock.clone()),
            searches: TtlCache::new(settings, clock),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn count(&self, title: Option<&str>, country: Option<&str>) -> Result<i64, StoreError> {
        let key = (cache_key(title), cache_key(country));
        if let Some(total) = self.counts.get(&key) {
            debug!(title = %key.0, country = %key.1, "count cache hit");
            return Ok(total);
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let total = self.store.count(&JobFilter::new(title, country)).await?;
        self.remember(&self.counts, key, total, generation);
        Ok(total)
    }

    pub async fn search(
        &self,
        title: Option<&str>,
        country: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JobRow>, StoreError> {
        let (limit, offset) = (limit.max(0), offset.max(0));
        let key = (cache_key(title), cache_key(country), limit, offset);
        if let Some(rows) = self.searches.get(&key) {
            debug!(title = %key.0, country = %key.1, limit, offset, "search cache hit");
            return Ok(rows);
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let rows = self
            .store
            .search(&JobFilter::new(title, country), limit, offset)
            .await?;
        self.remember(&self.searches, key, rows.clone(), generation);
        Ok(rows)
    }

    /// Caches a query result unless an insert landed while it ran. The check
    /// after `set` covers an insert that clears the cache in between.
    fn remember<K, V>(&self, cache: &TtlCache<K, V>, key: K, value: V, generation: u64)
    where
        K: Eq + Hash + Clone,
        V: Clone,
    {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("skipping cache write for a query older than the last insert");
            return;
        }
        cache.set(key.clone(), value);
        if self.generation.load(Ordering::SeqCst) != generation {
            cache.remove(&key);
        }
    }

    /// Bulk insert, deduplicated by link. Cached pages are dropped once new
    /// rows land so fresh jobs show up on the next request.
    pub async fn insert_many(&self, jobs: &[NewJob]) -> Result<u64, StoreError> {
        let inserted = self.store.insert_many(jobs).await?;
        if inserted > 0 {
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.counts.clear();
            self.searches.clear();
        }
        info!(received = jobs.len(), inserted, "jobs ingested");
        Ok(inserted)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<JobRow>, StoreError> {
        self.store.get_by_id(id).await
    }

    /// Outbound link for a raw id from the URL. Blank or non-numeric ids are
    /// absent without touching the store.
    pub async fn get_link(&self, raw_id: &str) -> Result<Option<String>, StoreError> {
        let Ok(id) = raw_id.trim().parse::<i64>() else {
            return Ok(None);
        };
        let link = self.store.get_link(id).await?;
        Ok(link.map(|l| l.trim().to_string()))
    }

    /// Distinct titles containing `fragment`, for autocomplete. Fragments
    /// shorter than two characters return nothing without a query.
    pub async fn suggest_titles(&self, fragment: &str) -> Result<Vec<String>, StoreError> {
        let fragment = fragment.trim().to_lowercase();
        if fragment.chars().count() < MIN_SUGGEST_CHARS {
            return Ok(Vec::new());
        }
        self.store.title_suggestions(&fragment, SUGGESTION_LIMIT).await
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    /// Drops expired entries from both caches.
    pub fn evict_expired(&self) {
        self.counts.evict();
        self.searches.evict();
        debug!(
            counts = self.counts.len(),
            searches = self.searches.len(),
            "evicted expired cache entries"
        );
    }
}

fn cache_key(value: Option<&str>) -> String {
    value.unwrap_or_default().trim().to_lowercase()
}
