//! Datastore seam for jobs. `SqlJobStore` renders the predicate tree to SQL;
//! `MemoryJobStore` evaluates it in-process.

use async_trait::async_trait;
use sqlx::any::AnyArguments;
use sqlx::{AnyPool, Arguments};

use crate::db::Backend;
use crate::errors::StoreError;
use crate::models::{JobRow, NewJob, JOB_COLUMNS, PG_JOB_COLUMNS};
use crate::search::normalize::normalize_stored_title;
use crate::search::predicate::{contains_pattern, Column, Predicate};
use crate::search::{JobFilter, SqlParam, SqlQuery, SqlWriter};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn count(&self, filter: &JobFilter) -> Result<i64, StoreError>;

    async fn search(
        &self,
        filter: &JobFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JobRow>, StoreError>;

    /// Inserts the jobs whose link is not stored yet. Returns how many rows
    /// were written.
    async fn insert_many(&self, jobs: &[NewJob]) -> Result<u64, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<JobRow>, StoreError>;

    async fn get_link(&self, id: i64) -> Result<Option<String>, StoreError>;

    /// Distinct display titles containing `fragment`, alphabetically.
    async fn title_suggestions(&self, fragment: &str, limit: i64)
        -> Result<Vec<String>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

const INSERT_COLUMNS: &[&str] = &[
    "job_id",
    "job_title",
    "job_title_norm",
    "company_name",
    "job_description",
    "location",
    "city",
    "region",
    "country",
    "link",
    "salary",
    "date",
];

fn select_columns(backend: Backend) -> &'static str {
    match backend {
        Backend::Postgres => PG_JOB_COLUMNS,
        Backend::Sqlite | Backend::Memory => JOB_COLUMNS,
    }
}

pub fn count_query(backend: Backend, filter: &JobFilter) -> SqlQuery {
    let mut writer = SqlWriter::new(backend.placeholder_style());
    writer
        .push_sql("SELECT COUNT(1) FROM jobs")
        .push_where(&filter.predicate());
    writer.finish()
}

pub fn search_query(backend: Backend, filter: &JobFilter, limit: i64, offset: i64) -> SqlQuery {
    let mut writer = SqlWriter::new(backend.placeholder_style());
    writer
        .push_sql(&format!("SELECT {} FROM jobs", select_columns(backend)))
        .push_where(&filter.predicate())
        .push_order(&filter.order())
        .push_sql(" LIMIT ")
        .push_param(SqlParam::Int(limit))
        .push_sql(" OFFSET ")
        .push_param(SqlParam::Int(offset));
    writer.finish()
}

pub fn title_suggestion_query(backend: Backend, fragment: &str, limit: i64) -> SqlQuery {
    let mut writer = SqlWriter::new(backend.placeholder_style());
    writer
        .push_sql("SELECT DISTINCT job_title FROM jobs")
        .push_where(&title_fragment(fragment))
        .push_sql(" ORDER BY job_title LIMIT ")
        .push_param(SqlParam::Int(limit));
    writer.finish()
}

pub(crate) fn title_fragment(fragment: &str) -> Predicate {
    Predicate::like(Column::Title, contains_pattern(&fragment.trim().to_lowercase()))
}

pub fn insert_query(backend: Backend, job: &NewJob) -> SqlQuery {
    let mut writer = SqlWriter::new(backend.placeholder_style());
    writer.push_sql(&format!("INSERT INTO jobs ({}) VALUES (", INSERT_COLUMNS.join(", ")));
    for (i, value) in insert_values(job).into_iter().enumerate() {
        if i > 0 {
            writer.push_sql(", ");
        }
        writer.push_param(SqlParam::Text(value));
    }
    writer.push_sql(") ON CONFLICT (link) DO NOTHING");
    writer.finish()
}

/// Values in `INSERT_COLUMNS` order. The normalized title falls back to the
/// display title when the caller gives none.
fn insert_values(job: &NewJob) -> Vec<String> {
    vec![
        job.job_id.clone().unwrap_or_default(),
        job.job_title.trim().to_string(),
        stored_title_norm(job),
        job.company_name.trim().to_string(),
        job.job_description.clone(),
        job.location.trim().to_string(),
        job.city.trim().to_string(),
        job.region.trim().to_string(),
        job.country.trim().to_string(),
        job.link.trim().to_string(),
        job.salary.trim().to_string(),
        job.date.trim().to_string(),
    ]
}

pub(crate) fn stored_title_norm(job: &NewJob) -> String {
    let source = job
        .job_title_norm
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(&job.job_title);
    normalize_stored_title(source)
}

pub(crate) fn arguments(params: &[SqlParam]) -> AnyArguments<'_> {
    let mut args = AnyArguments::default();
    for param in params {
        match param {
            SqlParam::Text(value) => args.add(value.as_str()),
            SqlParam::Int(value) => args.add(*value),
            SqlParam::Null => args.add(Option::<i64>::None),
        }
    }
    args
}

/// Postgres or SQLite through the sqlx `Any` driver.
pub struct SqlJobStore {
    pool: AnyPool,
    backend: Backend,
}

impl SqlJobStore {
    pub fn new(pool: AnyPool, backend: Backend) -> Self {
        Self { pool, backend }
    }
}

#[async_trait]
impl JobStore for SqlJobStore {
    async fn count(&self, filter: &JobFilter) -> Result<i64, StoreError> {
        let query = count_query(self.backend, filter);
        let total: i64 = sqlx::query_scalar_with(&query.sql, arguments(&query.params))
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn search(
        &self,
        filter: &JobFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JobRow>, StoreError> {
        let query = search_query(self.backend, filter, limit, offset);
        let rows = sqlx::query_as_with::<_, JobRow, _>(&query.sql, arguments(&query.params))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn insert_many(&self, jobs: &[NewJob]) -> Result<u64, StoreError> {
        if jobs.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for job in jobs {
            let query = insert_query(self.backend, job);
            let result = sqlx::query_with(&query.sql, arguments(&query.params))
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<JobRow>, StoreError> {
        let mut writer = SqlWriter::new(self.backend.placeholder_style());
        writer
            .push_sql(&format!("SELECT {} FROM jobs WHERE id = ", select_columns(self.backend)))
            .push_param(SqlParam::Int(id));
        let query = writer.finish();
        let row = sqlx::query_as_with::<_, JobRow, _>(&query.sql, arguments(&query.params))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_link(&self, id: i64) -> Result<Option<String>, StoreError> {
        let mut writer = SqlWriter::new(self.backend.placeholder_style());
        writer
            .push_sql("SELECT link FROM jobs WHERE id = ")
            .push_param(SqlParam::Int(id));
        let query = writer.finish();
        let link: Option<Option<String>> =
            sqlx::query_scalar_with(&query.sql, arguments(&query.params))
                .fetch_optional(&self.pool)
                .await?;
        Ok(link.flatten())
    }

    async fn title_suggestions(
        &self,
        fragment: &str,
        limit: i64,
    ) -> Result<Vec<String>, StoreError> {
        let query = title_suggestion_query(self.backend, fragment, limit);
        let titles: Vec<Option<String>> =
            sqlx::query_scalar_with(&query.sql, arguments(&query.params))
                .fetch_all(&self.pool)
                .await?;
        Ok(titles.into_iter().flatten().collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;

    fn job(title: &str, city: &str, country: &str, link: &str, date: &str) -> NewJob {
        NewJob {
            job_title: title.to_string(),
            company_name: "Acme".to_string(),
            location: format!("{city}, {country}"),
            city: city.to_string(),
            country: country.to_string(),
            link: link.to_string(),
            date: date.to_string(),
            ..Default::default()
        }
    }

    async fn seeded_store() -> SqlJobStore {
        let pool = create_pool("sqlite::memory:", 1).await.expect("sqlite pool");
        let store = SqlJobStore::new(pool, Backend::Sqlite);
        let inserted = store
            .insert_many(&[
                job("Senior Rust Engineer", "Berlin", "DE", "https://jobs.test/1", "2025-03-01"),
                job("Data Engineer", "London", "UK", "https://jobs.test/2", "2025-02-01"),
                job("Rust Developer", "Lyon", "FR", "https://jobs.test/3", ""),
                job("Backend Engineer", "Madrid", "ES", "https://jobs.test/4", "2025-01-15"),
            ])
            .await
            .expect("insert");
        assert_eq!(inserted, 4);
        store
    }

    #[test]
    fn test_search_query_binds_limit_and_offset_last() {
        let filter = JobFilter::new(Some("rust"), None);
        let query = search_query(Backend::Postgres, &filter, 12, 24);
        assert!(query.sql.ends_with("LIMIT $4 OFFSET $5"));
        assert_eq!(query.params[3], SqlParam::Int(12));
        assert_eq!(query.params[4], SqlParam::Int(24));
    }

    #[test]
    fn test_count_query_without_filter_has_no_where() {
        let query = count_query(Backend::Sqlite, &JobFilter::default());
        assert_eq!(query.sql, "SELECT COUNT(1) FROM jobs");
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_insert_query_uses_conflict_clause() {
        let query = insert_query(
            Backend::Sqlite,
            &job("  Senior   Rust Engineer ", "Berlin", "DE", "https://jobs.test/1", ""),
        );
        assert!(query.sql.ends_with("ON CONFLICT (link) DO NOTHING"));
        assert_eq!(query.params.len(), INSERT_COLUMNS.len());
        assert_eq!(query.params[2], SqlParam::Text("senior rust engineer".into()));
    }

    #[tokio::test]
    async fn test_sqlite_country_filter_round_trip() {
        let store = seeded_store().await;
        let de = JobFilter::new(None, Some("DE"));
        assert_eq!(store.count(&de).await.expect("count"), 1);
        let rows = store.search(&de, 10, 0).await.expect("search");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].city.as_deref(), Some("Berlin"));
    }

    #[tokio::test]
    async fn test_sqlite_title_filter_and_recency_order() {
        let store = seeded_store().await;
        let rust = JobFilter::new(Some("rust"), None);
        let rows = store.search(&rust, 10, 0).await.expect("search");
        let titles: Vec<_> = rows.iter().filter_map(|r| r.job_title.clone()).collect();
        // undated rows sort after dated ones
        assert_eq!(titles, vec!["Senior Rust Engineer", "Rust Developer"]);
    }

    #[tokio::test]
    async fn test_sqlite_eu_group_ranks_hubs_first() {
        let store = seeded_store().await;
        let eu = JobFilter::new(None, Some("EU"));
        let rows = store.search(&eu, 10, 0).await.expect("search");
        let cities: Vec<_> = rows.iter().filter_map(|r| r.city.clone()).collect();
        assert_eq!(cities, vec!["Madrid", "Berlin", "Lyon"]);
    }

    #[tokio::test]
    async fn test_sqlite_duplicate_links_are_skipped() {
        let store = seeded_store().await;
        let again = store
            .insert_many(&[
                job("Senior Rust Engineer", "Berlin", "DE", "https://jobs.test/1", "2025-03-01"),
                job("Platform Engineer", "Zurich", "CH", "https://jobs.test/5", "2025-03-02"),
            ])
            .await
            .expect("insert");
        assert_eq!(again, 1);
        assert_eq!(store.count(&JobFilter::default()).await.expect("count"), 5);
    }

    #[test]
    fn test_stored_title_norm_falls_back_to_display_title() {
        let mut new_job = job("  Senior  Rust Engineer ", "Berlin", "DE", "https://jobs.test/9", "");
        assert_eq!(stored_title_norm(&new_job), "senior rust engineer");
        new_job.job_title_norm = Some("   ".into());
        assert_eq!(stored_title_norm(&new_job), "senior rust engineer");
        new_job.job_title_norm = Some("Rust Engineer".into());
        assert_eq!(stored_title_norm(&new_job), "rust engineer");
    }

    #[test]
    fn test_title_suggestion_query_escapes_fragment() {
        let query = title_suggestion_query(Backend::Postgres, "C++_dev", 8);
        assert!(query.sql.starts_with("SELECT DISTINCT job_title FROM jobs WHERE "));
        assert!(query.sql.ends_with("ORDER BY job_title LIMIT $2"));
        assert_eq!(query.params[0], SqlParam::Text("%c++\\_dev%".into()));
        assert_eq!(query.params[1], SqlParam::Int(8));
    }

    #[tokio::test]
    async fn test_sqlite_title_suggestions_are_distinct_and_sorted() {
        let store = seeded_store().await;
        store
            .insert_many(&[job("Data Engineer", "Paris", "FR", "https://jobs.test/6", "")])
            .await
            .expect("insert");
        let titles = store.title_suggestions("ENGINEER", 8).await.expect("suggest");
        assert_eq!(
            titles,
            vec!["Backend Engineer", "Data Engineer", "Senior Rust Engineer"]
        );
        let limited = store.title_suggestions("engineer", 1).await.expect("suggest");
        assert_eq!(limited, vec!["Backend Engineer"]);
    }

    #[tokio::test]
    async fn test_sqlite_get_by_id_and_link() {
        let store = seeded_store().await;
        let row = store.get_by_id(2).await.expect("get").expect("row exists");
        assert_eq!(row.job_title.as_deref(), Some("Data Engineer"));
        assert_eq!(row.job_title_norm.as_deref(), Some("data engineer"));
        assert_eq!(
            store.get_link(2).await.expect("link").as_deref(),
            Some("https://jobs.test/2")
        );
        assert!(store.get_by_id(99).await.expect("get").is_none());
        store.ping().await.expect("ping");
    }
}
