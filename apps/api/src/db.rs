use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::{AnyPool, Executor};
use tracing::info;
use url::Url;

use crate::errors::StoreError;
use crate::search::{PlaceholderStyle, SqlParam, SqlWriter};

/// Postgres sessions fail fast instead of queueing slow queries.
const STATEMENT_TIMEOUT_MS: u32 = 800;
const IDLE_IN_TRANSACTION_TIMEOUT_MS: u32 = 5000;

/// Tables created on SQLite startup. Postgres deployments own their schema.
const SQLITE_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id TEXT,
        job_title TEXT,
        job_title_norm TEXT,
        company_name TEXT,
        job_description TEXT,
        location TEXT,
        city TEXT,
        region TEXT,
        country TEXT,
        link TEXT UNIQUE,
        salary TEXT,
        date TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS salary (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        location TEXT,
        city TEXT,
        region TEXT,
        country TEXT,
        median_salary REAL,
        currency TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS log_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        raw_title TEXT,
        raw_country TEXT,
        norm_title TEXT,
        norm_country TEXT,
        sal_floor INTEGER,
        sal_ceiling INTEGER,
        result_count INTEGER,
        page INTEGER,
        per_page INTEGER,
        source TEXT,
        event_status TEXT,
        event_type TEXT,
        job_id TEXT,
        job_title_event TEXT,
        job_company_event TEXT,
        job_location_event TEXT,
        job_link_event TEXT,
        job_summary_event TEXT,
        email_hash TEXT,
        meta_json TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS subscribers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS contact_forms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL,
        name TEXT NOT NULL,
        message TEXT NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS job_posting_requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        contact_email TEXT NOT NULL,
        job_title TEXT NOT NULL,
        company TEXT NOT NULL,
        description TEXT NOT NULL,
        salary_range TEXT,
        created_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_jobs_date ON jobs (date)",
];

/// Datastore selected by the `DATABASE_URL` scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
    /// Built-in demo catalogue, no database.
    Memory,
}

impl Backend {
    pub fn from_url(url: &str) -> Result<Self, StoreError> {
        let lowered = url.trim().to_lowercase();
        if lowered.starts_with("postgres://") || lowered.starts_with("postgresql://") {
            Ok(Backend::Postgres)
        } else if lowered.starts_with("sqlite:") {
            Ok(Backend::Sqlite)
        } else if lowered.starts_with("memory:") {
            Ok(Backend::Memory)
        } else {
            let scheme = lowered.split(':').next().unwrap_or_default().to_string();
            Err(StoreError::UnsupportedUrl(scheme))
        }
    }

    pub fn placeholder_style(self) -> PlaceholderStyle {
        match self {
            Backend::Postgres => PlaceholderStyle::Numbered,
            Backend::Sqlite | Backend::Memory => PlaceholderStyle::QuestionMark,
        }
    }
}

/// Binds a timestamp as RFC 3339 text. Postgres gets an explicit cast so the
/// parameter lands in a TIMESTAMPTZ column.
pub fn push_timestamp(writer: &mut SqlWriter, backend: Backend, at: DateTime<Utc>) {
    let stamp = SqlParam::Text(at.to_rfc3339_opts(SecondsFormat::Millis, true));
    match backend {
        Backend::Postgres => {
            writer.push_sql("CAST(").push_param(stamp).push_sql(" AS TIMESTAMPTZ)");
        }
        Backend::Sqlite | Backend::Memory => {
            writer.push_param(stamp);
        }
    }
}

/// Fixes up hosted Postgres URLs: pooled Supabase hosts listen on 6543,
/// `pgbouncer` is dropped, and `sslmode`/`connect_timeout` get defaults.
/// Non-Postgres URLs are returned trimmed and otherwise untouched.
pub fn normalize_pg_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if !(trimmed.starts_with("postgres://") || trimmed.starts_with("postgresql://")) {
        return trimmed.to_string();
    }
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    let pooled = parsed
        .host_str()
        .is_some_and(|host| host.ends_with(".pooler.supabase.com"));
    if pooled && matches!(parsed.port(), None | Some(5432)) {
        let _ = parsed.set_port(Some(6543));
    }

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !key.eq_ignore_ascii_case("pgbouncer"))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let has = |name: &str| pairs.iter().any(|(key, _)| key.eq_ignore_ascii_case(name));
    let add_sslmode = !has("sslmode");
    let add_timeout = !has("connect_timeout");

    {
        let mut query = parsed.query_pairs_mut();
        query.clear();
        for (key, value) in &pairs {
            query.append_pair(key, value);
        }
        if add_sslmode {
            query.append_pair("sslmode", "require");
        }
        if add_timeout {
            query.append_pair("connect_timeout", "5");
        }
    }
    parsed.to_string()
}

/// Creates the connection pool for a Postgres or SQLite URL. SQLite gets its
/// schema created before the pool is returned.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<AnyPool, StoreError> {
    install_default_drivers();
    let backend = Backend::from_url(database_url)?;
    let url = match backend {
        Backend::Postgres => normalize_pg_url(database_url),
        Backend::Sqlite => database_url.trim().to_string(),
        Backend::Memory => return Err(StoreError::UnsupportedUrl("memory".to_string())),
    };
    info!("Connecting to {backend:?} datastore...");

    // Every connection to `sqlite::memory:` is its own database, so keep one
    // connection alive for the whole process.
    let in_memory = url.contains(":memory:");
    let mut options = AnyPoolOptions::new()
        .max_connections(if in_memory { 1 } else { max_connections.max(1) })
        .acquire_timeout(Duration::from_secs(5));
    if in_memory {
        options = options.idle_timeout(None).max_lifetime(None);
    }

    let pool = options
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                if backend == Backend::Postgres {
                    conn.execute(format!("SET statement_timeout TO {STATEMENT_TIMEOUT_MS}").as_str())
                        .await?;
                    conn.execute(
                        format!(
                            "SET idle_in_transaction_session_timeout TO {IDLE_IN_TRANSACTION_TIMEOUT_MS}"
                        )
                        .as_str(),
                    )
                    .await?;
                }
                Ok(())
            })
        })
        .connect(&url)
        .await?;

    if backend == Backend::Sqlite {
        ensure_sqlite_schema(&pool).await?;
    }

    info!("{backend:?} connection pool established");
    Ok(pool)
}

pub async fn ensure_sqlite_schema(pool: &AnyPool) -> Result<(), StoreError> {
    for statement in SQLITE_SCHEMA {
        pool.execute(*statement).await?;
    }
    Ok(())
}
