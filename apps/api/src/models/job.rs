use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::search::predicate::{Column, Searchable};

/// Column list shared by every `jobs` SELECT.
pub const JOB_COLUMNS: &str = "id, job_title, job_title_norm, company_name, job_description, \
     location, city, region, country, link, salary, date";

/// Postgres variant: `id` may be INT4 and `date` a DATE column, neither of
/// which decodes through the `Any` driver without a cast.
pub const PG_JOB_COLUMNS: &str = "CAST(id AS BIGINT) AS id, job_title, job_title_norm, company_name, \
     job_description, location, city, region, country, link, CAST(salary AS TEXT) AS salary, \
     CAST(date AS TEXT) AS date";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: i64,
    pub job_title: Option<String>,
    pub job_title_norm: Option<String>,
    pub company_name: Option<String>,
    pub job_description: Option<String>,
    pub location: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub link: Option<String>,
    pub salary: Option<String>,
    pub date: Option<String>,
}

impl Searchable for JobRow {
    fn column_value(&self, column: Column) -> &str {
        let value = match column {
            Column::TitleNorm => &self.job_title_norm,
            Column::Title => &self.job_title,
            Column::Description => &self.job_description,
            Column::Location => &self.location,
            Column::City => &self.city,
            Column::Region => &self.region,
            Column::Country => &self.country,
        };
        value.as_deref().unwrap_or("")
    }

    fn posted_date(&self) -> Option<&str> {
        self.date.as_deref().filter(|d| !d.trim().is_empty())
    }

    fn row_id(&self) -> i64 {
        self.id
    }
}

/// Row to ingest. `job_title_norm` falls back to the display title.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewJob {
    pub job_id: Option<String>,
    pub job_title: String,
    pub job_title_norm: Option<String>,
    pub company_name: String,
    pub job_description: String,
    pub location: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub link: String,
    pub salary: String,
    pub date: String,
}
