//! Salary reference lookup by location. Candidates are tried as exact city,
//! then region, then country, before one fuzzy substring match.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::AnyPool;

use crate::db::Backend;
use crate::errors::StoreError;
use crate::jobs::store::arguments;
use crate::search::predicate::{contains_pattern, like_matches, Column, Predicate};
use crate::search::{SqlQuery, SqlWriter};

const EXACT_ORDER: &[Column] = &[Column::City, Column::Region, Column::Country];
const FUZZY_COLUMNS: &[Column] = &[Column::Location, Column::City, Column::Region];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalaryRecord {
    pub median: f64,
    pub currency: Option<String>,
}

#[async_trait]
pub trait SalaryLookup: Send + Sync {
    /// `Ok(None)` means no reference data for the location.
    async fn lookup(&self, location: &str) -> Result<Option<SalaryRecord>, StoreError>;
}

/// The pieces of `location` split on separators, then the whole string.
pub fn location_candidates(location: &str) -> Vec<String> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let mut candidates: Vec<String> = trimmed
        .split(|c| matches!(c, ',' | ';' | '/' | '\\' | '-' | '(' | ')'))
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect();
    candidates.push(trimmed.to_string());
    candidates
}

/// Reads the `salary` table.
pub struct SqlSalaryLookup {
    pool: AnyPool,
    backend: Backend,
}

impl SqlSalaryLookup {
    pub fn new(pool: AnyPool, backend: Backend) -> Self {
        Self { pool, backend }
    }

    fn select(&self, predicate: &Predicate) -> SqlQuery {
        // Postgres keeps the median as NUMERIC, which the Any driver can't decode.
        let median = match self.backend {
            Backend::Postgres => "CAST(median_salary AS DOUBLE PRECISION)",
            Backend::Sqlite | Backend::Memory => "median_salary",
        };
        let mut writer = SqlWriter::new(self.backend.placeholder_style());
        writer
            .push_sql(&format!("SELECT {median} AS median_salary, currency FROM salary"))
            .push_where(predicate)
            .push_sql(" AND median_salary IS NOT NULL LIMIT 1");
        writer.finish()
    }

    async fn first(&self, predicate: &Predicate) -> Result<Option<SalaryRecord>, StoreError> {
        let query = self.select(predicate);
        let row: Option<(f64, Option<String>)> =
            sqlx::query_as_with(&query.sql, arguments(&query.params))
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(median, currency)| SalaryRecord { median, currency }))
    }
}

#[async_trait]
impl SalaryLookup for SqlSalaryLookup {
    async fn lookup(&self, location: &str) -> Result<Option<SalaryRecord>, StoreError> {
        let candidates = location_candidates(location);
        if candidates.is_empty() {
            return Ok(None);
        }
        for column in EXACT_ORDER {
            for candidate in &candidates {
                let predicate = Predicate::Equals {
                    column: *column,
                    value: candidate.clone(),
                };
                if let Some(record) = self.first(&predicate).await? {
                    return Ok(Some(record));
                }
            }
        }
        let pattern = contains_pattern(&location.trim().to_lowercase());
        self.first(&Predicate::like_any(FUZZY_COLUMNS, &pattern)).await
    }
}

/// One reference row for the in-memory table.
#[derive(Debug, Clone)]
pub struct SalaryRow {
    pub location: &'static str,
    pub city: &'static str,
    pub region: &'static str,
    pub country: &'static str,
    pub median: f64,
    pub currency: &'static str,
}

impl SalaryRow {
    fn field(&self, column: Column) -> &'static str {
        match column {
            Column::Location => self.location,
            Column::City => self.city,
            Column::Region => self.region,
            Column::Country => self.country,
            _ => "",
        }
    }

    fn record(&self) -> SalaryRecord {
        SalaryRecord {
            median: self.median,
            currency: Some(self.currency.to_string()).filter(|c| !c.is_empty()),
        }
    }
}

/// Fixed salary table used with the demo job catalogue.
pub struct StaticSalaryTable {
    rows: Vec<SalaryRow>,
}

impl StaticSalaryTable {
    pub fn new(rows: Vec<SalaryRow>) -> Self {
        Self { rows }
    }

    pub fn demo() -> Self {
        let row = |location, city, region, country, median, currency| SalaryRow {
            location,
            city,
            region,
            country,
            median,
            currency,
        };
        Self::new(vec![
            row("Berlin, Germany", "Berlin", "Berlin", "Germany", 75_000.0, "EUR"),
            row("London, UK", "London", "England", "UK", 85_000.0, "GBP"),
            row("Zurich, Switzerland", "Zurich", "Zurich", "Switzerland", 120_000.0, "CHF"),
            row("Barcelona, Spain", "Barcelona", "Catalonia", "Spain", 50_000.0, "EUR"),
            row("San Francisco, US", "San Francisco", "California", "US", 165_000.0, "USD"),
            row("Bengaluru, India", "Bengaluru", "Karnataka", "India", 2_400_000.0, "INR"),
            row("Remote", "Remote", "", "", 90_000.0, "USD"),
        ])
    }

    fn find(&self, matches: impl Fn(&SalaryRow) -> bool) -> Option<SalaryRecord> {
        self.rows.iter().find(|r| matches(r)).map(SalaryRow::record)
    }
}

#[async_trait]
impl SalaryLookup for StaticSalaryTable {
    async fn lookup(&self, location: &str) -> Result<Option<SalaryRecord>, StoreError> {
        let candidates = location_candidates(location);
        if candidates.is_empty() {
            return Ok(None);
        }
        for column in EXACT_ORDER {
            for candidate in &candidates {
                let wanted = candidate.to_lowercase();
                if let Some(record) = self.find(|r| r.field(*column).to_lowercase() == wanted) {
                    return Ok(Some(record));
                }
            }
        }
        let pattern = contains_pattern(&location.trim().to_lowercase());
        Ok(self.find(|r| {
            FUZZY_COLUMNS
                .iter()
                .any(|c| like_matches(&pattern, &r.field(*c).to_lowercase()))
        }))
    }
}
