use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::AnyPool;

use crate::db::{push_timestamp, Backend};
use crate::errors::StoreError;
use crate::jobs::store::arguments;
use crate::search::{SqlParam, SqlWriter};
use crate::submissions::{ContactRequest, JobPostingRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeStatus {
    Ok,
    /// The address was already on the list.
    Duplicate,
}

impl SubscribeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscribeStatus::Ok => "ok",
            SubscribeStatus::Duplicate => "duplicate",
        }
    }
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn add_subscriber(&self, email: &str, at: DateTime<Utc>) -> Result<SubscribeStatus, StoreError>;

    async fn add_contact(&self, contact: &ContactRequest, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn add_job_posting(&self, posting: &JobPostingRequest, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Writes to the `subscribers`, `contact_forms` and `job_posting_requests`
/// tables.
pub struct SqlSubmissionStore {
    pool: AnyPool,
    backend: Backend,
}

impl SqlSubmissionStore {
    pub fn new(pool: AnyPool, backend: Backend) -> Self {
        Self { pool, backend }
    }

    /// `INSERT INTO table (columns..., created_at) VALUES (...)` followed by
    /// `suffix`. Returns the affected row count.
    async fn insert(
        &self,
        table: &str,
        columns: &[&str],
        values: Vec<SqlParam>,
        at: DateTime<Utc>,
        suffix: &str,
    ) -> Result<u64, StoreError> {
        let mut writer = SqlWriter::new(self.backend.placeholder_style());
        writer.push_sql(&format!(
            "INSERT INTO {table} ({}, created_at) VALUES (",
            columns.join(", ")
        ));
        for value in values {
            writer.push_param(value).push_sql(", ");
        }
        push_timestamp(&mut writer, self.backend, at);
        writer.push_sql(")").push_sql(suffix);
        let query = writer.finish();

        let result = sqlx::query_with(&query.sql, arguments(&query.params))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SubmissionStore for SqlSubmissionStore {
    async fn add_subscriber(&self, email: &str, at: DateTime<Utc>) -> Result<SubscribeStatus, StoreError> {
        let inserted = self
            .insert(
                "subscribers",
                &["email"],
                vec![SqlParam::Text(email.to_string())],
                at,
                " ON CONFLICT (email) DO NOTHING",
            )
            .await?;
        Ok(if inserted == 0 {
            SubscribeStatus::Duplicate
        } else {
            SubscribeStatus::Ok
        })
    }

    async fn add_contact(&self, contact: &ContactRequest, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.insert(
            "contact_forms",
            &["email", "name", "message"],
            vec![
                SqlParam::Text(contact.email.clone()),
                SqlParam::Text(contact.name.clone()),
                SqlParam::Text(contact.message.clone()),
            ],
            at,
            "",
        )
        .await?;
        Ok(())
    }

    async fn add_job_posting(&self, posting: &JobPostingRequest, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.insert(
            "job_posting_requests",
            &["contact_email", "job_title", "company", "description", "salary_range"],
            vec![
                SqlParam::Text(posting.contact_email.clone()),
                SqlParam::Text(posting.job_title.clone()),
                SqlParam::Text(posting.company.clone()),
                SqlParam::Text(posting.description.clone()),
                SqlParam::Text(posting.salary_range.clone()),
            ],
            at,
            "",
        )
        .await?;
        Ok(())
    }
}

/// Keeps submissions in process when no database is attached.
#[derive(Debug, Default)]
pub struct MemorySubmissionStore {
    subscribers: Mutex<BTreeSet<String>>,
    contacts: Mutex<Vec<ContactRequest>>,
    postings: Mutex<Vec<JobPostingRequest>>,
}

impl MemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn contacts(&self) -> Vec<ContactRequest> {
        self.contacts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn postings(&self) -> Vec<JobPostingRequest> {
        self.postings.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissionStore {
    async fn add_subscriber(&self, email: &str, _at: DateTime<Utc>) -> Result<SubscribeStatus, StoreError> {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        Ok(if subscribers.insert(email.to_string()) {
            SubscribeStatus::Ok
        } else {
            SubscribeStatus::Duplicate
        })
    }

    async fn add_contact(&self, contact: &ContactRequest, _at: DateTime<Utc>) -> Result<(), StoreError> {
        self.contacts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(contact.clone());
        Ok(())
    }

    async fn add_job_posting(&self, posting: &JobPostingRequest, _at: DateTime<Utc>) -> Result<(), StoreError> {
        self.postings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(posting.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;

    async fn sqlite_store() -> (SqlSubmissionStore, AnyPool) {
        let pool = create_pool("sqlite::memory:", 1).await.expect("sqlite pool");
        (SqlSubmissionStore::new(pool.clone(), Backend::Sqlite), pool)
    }

    #[tokio::test]
    async fn test_sqlite_subscriber_duplicates_are_reported() {
        let (store, pool) = sqlite_store().await;
        let now = Utc::now();
        assert_eq!(
            store.add_subscriber("ada@example.com", now).await.expect("insert"),
            SubscribeStatus::Ok
        );
        assert_eq!(
            store.add_subscriber("ada@example.com", now).await.expect("insert"),
            SubscribeStatus::Duplicate
        );
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM subscribers")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_sqlite_contact_and_posting_rows() {
        let (store, pool) = sqlite_store().await;
        let now = Utc::now();
        store
            .add_contact(
                &ContactRequest {
                    email: "ops@example.com".into(),
                    name: "Acme".into(),
                    message: "Please call us back".into(),
                },
                now,
            )
            .await
            .expect("contact");
        store
            .add_job_posting(
                &JobPostingRequest {
                    contact_email: "hr@example.com".into(),
                    job_title: "Rust Engineer".into(),
                    company: "Acme".into(),
                    description: "Build the ingestion service.".into(),
                    salary_range: String::new(),
                },
                now,
            )
            .await
            .expect("posting");

        let name: String = sqlx::query_scalar("SELECT name FROM contact_forms")
            .fetch_one(&pool)
            .await
            .expect("contact row");
        assert_eq!(name, "Acme");
        let (title, salary): (String, String) =
            sqlx::query_as("SELECT job_title, salary_range FROM job_posting_requests")
                .fetch_one(&pool)
                .await
                .expect("posting row");
        assert_eq!(title, "Rust Engineer");
        assert_eq!(salary, "");
    }

    #[tokio::test]
    async fn test_memory_store_tracks_subscribers() {
        let store = MemorySubmissionStore::new();
        let now = Utc::now();
        store.add_subscriber("a@b.io", now).await.expect("insert");
        assert_eq!(
            store.add_subscriber("a@b.io", now).await.expect("insert"),
            SubscribeStatus::Duplicate
        );
        assert_eq!(store.subscriber_count(), 1);
    }
}
