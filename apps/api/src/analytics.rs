//! Analytics events for searches, apply clicks, filter selections and
//! subscriptions. Events are recorded off the request path; a failed write is
//! logged and dropped.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::AnyPool;
use tracing::{debug, info};

use crate::db::{push_timestamp, Backend};
use crate::errors::StoreError;
use crate::jobs::store::arguments;
use crate::search::{SearchQuery, SqlParam, SqlWriter};

const TEXT_LIMIT: usize = 200;
const SOURCE_LIMIT: usize = 50;
const STATUS_LIMIT: usize = 50;
const TYPE_LIMIT: usize = 20;
const JOB_ID_LIMIT: usize = 160;
const JOB_TITLE_LIMIT: usize = 300;
const JOB_LINK_LIMIT: usize = 500;
const JOB_SUMMARY_LIMIT: usize = 400;
const META_KEY_LIMIT: usize = 50;
const META_JSON_LIMIT: usize = 1000;

const EVENT_COLUMNS: &[&str] = &[
    "raw_title",
    "raw_country",
    "norm_title",
    "norm_country",
    "sal_floor",
    "sal_ceiling",
    "result_count",
    "page",
    "per_page",
    "source",
    "event_status",
    "event_type",
    "job_id",
    "job_title_event",
    "job_company_event",
    "job_location_event",
    "job_link_event",
    "job_summary_event",
    "email_hash",
    "meta_json",
];

/// The posting an apply click refers to. Empty fields are stored as `''`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobContext {
    pub job_id: String,
    pub job_title: String,
    pub job_company: String,
    pub job_location: String,
    pub job_link: String,
    pub job_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsEvent {
    pub created_at: DateTime<Utc>,
    pub raw_title: String,
    pub raw_country: String,
    pub norm_title: String,
    pub norm_country: String,
    pub sal_floor: Option<i64>,
    pub sal_ceiling: Option<i64>,
    pub result_count: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub source: String,
    pub event_type: String,
    pub event_status: String,
    pub job: JobContext,
    pub email_hash: String,
    pub meta: BTreeMap<String, String>,
}

/// Body of `POST /events/apply`. Job fields also accept camelCase keys.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApplyPayload {
    pub event_type: Option<String>,
    pub status: Option<String>,
    pub source: Option<String>,
    pub email_hash: Option<String>,
    pub meta: BTreeMap<String, Value>,
    pub filter_type: Option<String>,
    pub filter_value: Option<String>,
    #[serde(alias = "jobId")]
    pub job_id: Option<Value>,
    #[serde(alias = "jobTitle")]
    pub job_title: Option<String>,
    #[serde(alias = "jobCompany")]
    pub job_company: Option<String>,
    #[serde(alias = "jobLocation")]
    pub job_location: Option<String>,
    #[serde(alias = "jobLink")]
    pub job_link: Option<String>,
    #[serde(alias = "jobSummary")]
    pub job_summary: Option<String>,
}

impl AnalyticsEvent {
    fn base(event_type: &str, source: &str, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            raw_title: "N/A".to_string(),
            raw_country: "N/A".to_string(),
            norm_title: String::new(),
            norm_country: String::new(),
            sal_floor: None,
            sal_ceiling: None,
            result_count: None,
            page: None,
            per_page: None,
            source: source.to_string(),
            event_type: event_type.to_string(),
            event_status: String::new(),
            job: JobContext::default(),
            email_hash: String::new(),
            meta: BTreeMap::new(),
        }
    }

    /// A successful search served by the JSON API. Blank raw inputs are
    /// stored as `N/A`; text is cut to column limits.
    pub fn search(
        query: &SearchQuery,
        result_count: i64,
        page: i64,
        per_page: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            raw_title: or_na(&query.raw_title),
            raw_country: or_na(&query.raw_country),
            norm_title: truncate(query.title.trim(), TEXT_LIMIT),
            norm_country: truncate(query.country.trim(), TEXT_LIMIT),
            sal_floor: query.salary_floor,
            sal_ceiling: query.salary_ceiling,
            result_count: Some(result_count),
            page: Some(page),
            per_page: Some(per_page),
            event_status: "ok".to_string(),
            ..Self::base("search", "api", now)
        }
    }

    /// An apply click or a filter selection reported by the browser.
    /// Unknown event types are kept as sent, under the apply shape.
    pub fn from_apply(payload: ApplyPayload, now: DateTime<Utc>) -> Self {
        let event_type = clean(payload.event_type.as_deref()).to_lowercase();
        let event_type = if event_type.is_empty() { "apply".to_string() } else { event_type };
        let source = clean(payload.source.as_deref());
        let source = if source.is_empty() { "web" } else { source };
        let status = clean(payload.status.as_deref());

        let mut event = Self::base(&event_type, source, now);
        event.email_hash = truncate(clean(payload.email_hash.as_deref()), TEXT_LIMIT);
        event.meta = payload
            .meta
            .into_iter()
            .filter_map(|(key, value)| value_text(&value).map(|v| (key, v)))
            .collect();

        if event_type == "filter" {
            let filter_type = clean(payload.filter_type.as_deref());
            let filter_value = clean(payload.filter_value.as_deref());
            event.raw_title = if filter_type.is_empty() { "filter" } else { filter_type }.to_string();
            event.raw_country = or_na(filter_value);
            event.norm_title = truncate(&filter_type.to_lowercase(), TEXT_LIMIT);
            event.event_status = or_default(status, "selected");
            if !filter_type.is_empty() {
                event.meta.insert("filter_type".into(), filter_type.to_string());
            }
            if !filter_value.is_empty() {
                event.meta.insert("filter_value".into(), filter_value.to_string());
            }
            return event;
        }

        let job = JobContext {
            job_id: payload.job_id.as_ref().and_then(value_text).unwrap_or_default(),
            job_title: clean(payload.job_title.as_deref()).to_string(),
            job_company: clean(payload.job_company.as_deref()).to_string(),
            job_location: clean(payload.job_location.as_deref()).to_string(),
            job_link: clean(payload.job_link.as_deref()).to_string(),
            job_summary: clean(payload.job_summary.as_deref()).to_string(),
        };
        event.raw_title = or_na(&job.job_title);
        event.raw_country = or_na(&job.job_location);
        if event_type == "apply" {
            event.norm_title = "apply".to_string();
        }
        event.event_status = or_default(status, "unknown");
        if !job.job_link.is_empty() {
            event
                .meta
                .entry("job_link".into())
                .or_insert_with(|| job.job_link.clone());
        }
        event.job = job;
        event
    }

    /// A newsletter sign-up. Only the salted hash of the address is kept.
    pub fn subscribe(email_hash: String, status: &str, job_link: Option<&str>, now: DateTime<Utc>) -> Self {
        let mut event = Self::base("subscribe", "web", now);
        event.raw_title = "subscribe".to_string();
        event.norm_title = "subscribe".to_string();
        event.event_status = status.to_string();
        event.email_hash = email_hash;
        if let Some(link) = job_link.map(str::trim).filter(|l| !l.is_empty()) {
            event.job.job_link = link.to_string();
        }
        event
    }

    /// `meta` as compact JSON with keys and values cut to their limits, or
    /// `''` when empty.
    pub fn meta_json(&self) -> String {
        if self.meta.is_empty() {
            return String::new();
        }
        let cleaned: BTreeMap<String, String> = self
            .meta
            .iter()
            .map(|(k, v)| (truncate(k, META_KEY_LIMIT), truncate(v, TEXT_LIMIT)))
            .collect();
        let json = serde_json::to_string(&cleaned).unwrap_or_default();
        truncate(&json, META_JSON_LIMIT)
    }

    /// Bound values in `EVENT_COLUMNS` order.
    fn column_values(&self) -> Vec<SqlParam> {
        vec![
            SqlParam::Text(truncate(&self.raw_title, TEXT_LIMIT)),
            SqlParam::Text(truncate(&self.raw_country, TEXT_LIMIT)),
            SqlParam::Text(truncate(&self.norm_title, TEXT_LIMIT)),
            SqlParam::Text(truncate(&self.norm_country, TEXT_LIMIT)),
            optional_int(self.sal_floor),
            optional_int(self.sal_ceiling),
            optional_int(self.result_count),
            optional_int(self.page),
            optional_int(self.per_page),
            SqlParam::Text(truncate(&self.source, SOURCE_LIMIT)),
            SqlParam::Text(truncate(&self.event_status, STATUS_LIMIT)),
            SqlParam::Text(truncate(&self.event_type, TYPE_LIMIT)),
            SqlParam::Text(truncate(&self.job.job_id, JOB_ID_LIMIT)),
            SqlParam::Text(truncate(&self.job.job_title, JOB_TITLE_LIMIT)),
            SqlParam::Text(truncate(&self.job.job_company, TEXT_LIMIT)),
            SqlParam::Text(truncate(&self.job.job_location, TEXT_LIMIT)),
            SqlParam::Text(truncate(&self.job.job_link, JOB_LINK_LIMIT)),
            SqlParam::Text(truncate(&self.job.job_summary, JOB_SUMMARY_LIMIT)),
            SqlParam::Text(truncate(&self.email_hash, TEXT_LIMIT)),
            SqlParam::Text(self.meta_json()),
        ]
    }
}

/// Hex SHA-256 of `salt` followed by the trimmed, lowercased identifier.
pub fn hash_identifier(salt: &str, value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(value.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

fn clean(raw: Option<&str>) -> &str {
    raw.map(str::trim).unwrap_or_default()
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        truncate(value, STATUS_LIMIT)
    }
}

pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

fn or_na(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        "N/A".to_string()
    } else {
        truncate(trimmed, TEXT_LIMIT)
    }
}

fn truncate(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, event: &AnalyticsEvent) -> Result<(), StoreError>;
}

/// Appends events to the `log_events` table.
pub struct SqlEventLog {
    pool: AnyPool,
    backend: Backend,
}

impl SqlEventLog {
    pub fn new(pool: AnyPool, backend: Backend) -> Self {
        Self { pool, backend }
    }
}

fn optional_int(value: Option<i64>) -> SqlParam {
    value.map(SqlParam::Int).unwrap_or(SqlParam::Null)
}

#[async_trait]
impl EventSink for SqlEventLog {
    async fn record(&self, event: &AnalyticsEvent) -> Result<(), StoreError> {
        let mut writer = SqlWriter::new(self.backend.placeholder_style());
        writer.push_sql(&format!(
            "INSERT INTO log_events (created_at, {}) VALUES (",
            EVENT_COLUMNS.join(", ")
        ));
        push_timestamp(&mut writer, self.backend, event.created_at);
        for param in event.column_values() {
            writer.push_sql(", ").push_param(param);
        }
        writer.push_sql(")");
        let query = writer.finish();

        sqlx::query_with(&query.sql, arguments(&query.params))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Writes events to the log when no database is attached.
pub struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    async fn record(&self, event: &AnalyticsEvent) -> Result<(), StoreError> {
        info!(
            event_type = %event.event_type,
            event_status = %event.event_status,
            raw_title = %event.raw_title,
            raw_country = %event.raw_country,
            norm_title = %event.norm_title,
            norm_country = %event.norm_country,
            sal_floor = ?event.sal_floor,
            result_count = ?event.result_count,
            job_id = %event.job.job_id,
            "analytics event"
        );
        Ok(())
    }
}

/// Records `event` on a background task.
pub fn emit(sink: Arc<dyn EventSink>, event: AnalyticsEvent) {
    tokio::spawn(async move {
        if let Err(err) = sink.record(&event).await {
            debug!(error = %err, event_type = %event.event_type, "analytics event dropped");
        }
    });
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::db::create_pool;

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub events: Mutex<Vec<AnalyticsEvent>>,
    }

    impl RecordingSink {
        /// Waits for background emits to land, up to half a second.
        pub async fn wait_for(&self, count: usize) -> Vec<AnalyticsEvent> {
            for _ in 0..50 {
                if self.events.lock().unwrap().len() >= count {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn record(&self, event: &AnalyticsEvent) -> Result<(), StoreError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl EventSink for FailingSink {
        async fn record(&self, _event: &AnalyticsEvent) -> Result<(), StoreError> {
            Err(StoreError::Unavailable(sqlx::Error::PoolTimedOut))
        }
    }

    fn payload(value: serde_json::Value) -> ApplyPayload {
        serde_json::from_value(value).expect("valid payload")
    }

    #[test]
    fn test_blank_inputs_are_stored_as_na() {
        let query = SearchQuery::parse("", "  ");
        let event = AnalyticsEvent::search(&query, 0, 1, 12, Utc::now());
        assert_eq!(event.raw_title, "N/A");
        assert_eq!(event.raw_country, "N/A");
        assert_eq!(event.norm_title, "");
        assert_eq!(event.event_type, "search");
        assert_eq!(event.event_status, "ok");
    }

    #[test]
    fn test_long_titles_are_truncated() {
        let long = "é".repeat(500);
        let query = SearchQuery::parse(&long, "de");
        let event = AnalyticsEvent::search(&query, 3, 2, 12, Utc::now());
        assert_eq!(event.raw_title.chars().count(), TEXT_LIMIT);
        assert_eq!(event.norm_country, "DE");
    }

    #[test]
    fn test_apply_click_reads_camel_case_job_fields() {
        let event = AnalyticsEvent::from_apply(
            payload(json!({
                "jobId": 42,
                "jobTitle": " Rust Engineer ",
                "job_location": "Berlin, DE",
                "jobLink": "https://jobs.example.org/rust",
                "meta": {"position": 3, "empty": null}
            })),
            Utc::now(),
        );
        assert_eq!(event.event_type, "apply");
        assert_eq!(event.norm_title, "apply");
        assert_eq!(event.event_status, "unknown");
        assert_eq!(event.source, "web");
        assert_eq!(event.job.job_id, "42");
        assert_eq!(event.raw_title, "Rust Engineer");
        assert_eq!(event.raw_country, "Berlin, DE");
        assert_eq!(
            event.meta_json(),
            r#"{"job_link":"https://jobs.example.org/rust","position":"3"}"#
        );
    }

    #[test]
    fn test_filter_event_moves_selection_into_meta() {
        let event = AnalyticsEvent::from_apply(
            payload(json!({"event_type": "FILTER", "filter_type": "Country", "filter_value": "DE"})),
            Utc::now(),
        );
        assert_eq!(event.event_type, "filter");
        assert_eq!(event.raw_title, "Country");
        assert_eq!(event.raw_country, "DE");
        assert_eq!(event.norm_title, "country");
        assert_eq!(event.event_status, "selected");
        assert_eq!(event.meta["filter_value"], "DE");
        assert_eq!(event.job, JobContext::default());
    }

    #[test]
    fn test_empty_payload_is_an_unknown_apply() {
        let event = AnalyticsEvent::from_apply(ApplyPayload::default(), Utc::now());
        assert_eq!(event.event_type, "apply");
        assert_eq!(event.raw_title, "N/A");
        assert_eq!(event.meta_json(), "");
    }

    #[test]
    fn test_meta_json_is_capped() {
        let mut event = AnalyticsEvent::from_apply(ApplyPayload::default(), Utc::now());
        for i in 0..20 {
            event.meta.insert(format!("{i:02}{}", "k".repeat(80)), "v".repeat(300));
        }
        let json = event.meta_json();
        assert_eq!(json.chars().count(), META_JSON_LIMIT);
        assert!(json.starts_with(&format!("{{\"00{}\":", "k".repeat(META_KEY_LIMIT - 2))));
    }

    #[test]
    fn test_hash_identifier_is_salted_and_case_insensitive() {
        let a = hash_identifier("pepper", "Ada@Example.com ");
        assert_eq!(a, hash_identifier("pepper", "ada@example.com"));
        assert_ne!(a, hash_identifier("salt", "ada@example.com"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_sql_event_log_inserts_row() {
        let pool = create_pool("sqlite::memory:", 1).await.expect("pool");
        let sink = SqlEventLog::new(pool.clone(), Backend::Sqlite);
        let query = SearchQuery::parse(">100k rust", "");
        sink.record(&AnalyticsEvent::search(&query, 4, 1, 12, Utc::now()))
            .await
            .expect("record");

        let (floor, ceiling, country): (Option<i64>, Option<i64>, String) =
            sqlx::query_as("SELECT sal_floor, sal_ceiling, norm_country FROM log_events")
                .fetch_one(&pool)
                .await
                .expect("row");
        assert_eq!(floor, Some(100_000));
        assert_eq!(ceiling, None);
        assert_eq!(country, "HIGH_PAY");
    }

    #[tokio::test]
    async fn test_sql_event_log_keeps_event_time() {
        let pool = create_pool("sqlite::memory:", 1).await.expect("pool");
        let sink = SqlEventLog::new(pool.clone(), Backend::Sqlite);
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        let event = AnalyticsEvent::from_apply(
            payload(json!({"job_id": "abc", "job_title": "Data Engineer", "status": "clicked"})),
            at,
        );
        sink.record(&event).await.expect("record");

        let (created_at, job_id, status, page): (String, String, String, Option<i64>) =
            sqlx::query_as("SELECT created_at, job_id, event_status, page FROM log_events")
                .fetch_one(&pool)
                .await
                .expect("row");
        assert_eq!(created_at, "2025-03-04T05:06:07.000Z");
        assert_eq!(job_id, "abc");
        assert_eq!(status, "clicked");
        assert_eq!(page, None);
    }

    #[tokio::test]
    async fn test_emit_runs_in_background() {
        let sink = Arc::new(RecordingSink::default());
        let event = AnalyticsEvent::search(&SearchQuery::parse("rust", ""), 1, 1, 12, Utc::now());
        emit(sink.clone(), event);
        emit(
            Arc::new(FailingSink),
            AnalyticsEvent::search(&SearchQuery::default(), 0, 1, 12, Utc::now()),
        );
        assert_eq!(sink.wait_for(1).await.len(), 1);
    }
}
