//! Listing pipeline: parsed query → cached count/search → salary lookup →
//! estimate → salary-floor post-filter → job cards.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::StoreError;
use crate::jobs::repository::JobRepository;
use crate::jobs::text;
use crate::models::JobRow;
use crate::salary::estimator::compact_salary;
use crate::salary::{estimate, passes_salary_floor, SalaryEstimate, SalaryLookup, SalaryRecord};
use crate::search::normalize::normalize_title;
use crate::search::SearchQuery;

pub const DEFAULT_PER_PAGE: i64 = 12;
pub const MAX_PER_PAGE: i64 = 100;
/// Highest page whose offset still fits in an `i64` at any page size.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PER_PAGE;
const RELATED_LIMIT: usize = 3;
const RELATED_FETCH: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    /// Missing or zero values take the defaults; `per_page` is clamped to
    /// `1..=100` and `page` to `1..=MAX_PAGE`.
    pub fn resolve(page: Option<i64>, per_page: Option<i64>) -> Self {
        let per_page = per_page
            .filter(|p| *p != 0)
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        let page = page.filter(|p| *p != 0).unwrap_or(1).clamp(1, MAX_PAGE);
        Self { page, per_page }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// Page size reported to clients. Small pages are shown as-is, larger
    /// ones never below 10.
    pub fn display_per_page(&self) -> i64 {
        if self.per_page < 5 {
            self.per_page
        } else {
            self.per_page.max(10)
        }
    }

    pub fn meta(&self, total: i64) -> PageMeta {
        let per_page = self.display_per_page();
        let pages = ((total + per_page - 1) / per_page).max(1);
        PageMeta {
            page: self.page,
            per_page,
            total,
            pages,
            has_prev: self.page > 1,
            has_next: self.page < pages,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::resolve(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
    pub has_prev: bool,
    pub has_next: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobCard {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub date_posted: String,
    pub date_raw: String,
    pub link: Option<String>,
    pub is_new: bool,
    pub is_ghost: bool,
    pub median_salary: Option<i64>,
    pub median_salary_currency: Option<String>,
    pub median_salary_compact: Option<String>,
    pub estimated_salary_range_compact: Option<String>,
    pub estimated_salary_range_numeric: Option<(i64, i64)>,
    pub salary_uplift_factor: Option<f64>,
    #[serde(skip)]
    median: Option<f64>,
    #[serde(skip)]
    estimate: Option<SalaryEstimate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedJob {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobListing {
    pub items: Vec<JobCard>,
    pub meta: PageMeta,
    pub title: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: JobCard,
    pub related: Vec<RelatedJob>,
}

/// Salary lookups made while building one response, keyed by location.
#[derive(Default)]
struct SalaryMemo {
    by_location: HashMap<String, Option<SalaryRecord>>,
}

pub struct JobListings {
    jobs: Arc<JobRepository>,
    salaries: Arc<dyn SalaryLookup>,
}

impl JobListings {
    pub fn new(jobs: Arc<JobRepository>, salaries: Arc<dyn SalaryLookup>) -> Self {
        Self { jobs, salaries }
    }

    /// Never fails: datastore errors are logged and degrade to fewer or no
    /// results.
    pub async fn list(
        &self,
        query: &SearchQuery,
        pagination: Pagination,
        now: DateTime<Utc>,
    ) -> JobListing {
        let title = query.title_filter();
        let country = query.country_filter();

        let total = match self.jobs.count(title, country).await {
            Ok(total) => Some(total),
            Err(err) => {
                warn!(error = %err, "job count failed, falling back to page size");
                None
            }
        };

        let mut rows = self.search_or_empty(title, country, pagination).await;
        if rows.is_empty() && title.is_some() {
            debug!(title = ?title, country = ?country, "no rows for title, retrying country only");
            rows = self.search_or_empty(None, country, pagination).await;
        }
        let total = total.unwrap_or(rows.len() as i64);

        let mut memo = SalaryMemo::default();
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let card = self.card(row, &mut memo, now).await;
            if passes_salary_floor(query.salary_floor, card.median, card.estimate.as_ref()) {
                items.push(card);
            }
        }

        JobListing {
            items,
            meta: pagination.meta(total),
            title: query.title.clone(),
            country: query.display_country.clone(),
        }
    }

    /// One job with up to three related postings sharing its first title
    /// word.
    pub async fn detail(&self, id: i64, now: DateTime<Utc>) -> Result<Option<JobDetail>, StoreError> {
        let Some(row) = self.jobs.get_by_id(id).await? else {
            return Ok(None);
        };
        let job = self.card(&row, &mut SalaryMemo::default(), now).await;
        let related = self.related(&job).await;
        Ok(Some(JobDetail { job, related }))
    }

    async fn related(&self, job: &JobCard) -> Vec<RelatedJob> {
        let first_word = job.title.split_whitespace().next().unwrap_or_default();
        let keyword = normalize_title(first_word);
        let keyword = Some(keyword.as_str()).filter(|k| !k.is_empty());
        let rows = match self.jobs.search(keyword, None, RELATED_FETCH, 0).await {
            Ok(rows) => rows,
            Err(err) => {
                debug!(error = %err, "related jobs lookup failed");
                return Vec::new();
            }
        };
        rows.into_iter()
            .filter(|r| r.id != job.id)
            .take(RELATED_LIMIT)
            .map(|r| RelatedJob {
                id: r.id,
                title: r.job_title.as_deref().unwrap_or_default().trim().to_string(),
                company: r.company_name.as_deref().unwrap_or_default().trim().to_string(),
                location: r
                    .location
                    .as_deref()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .unwrap_or("Remote")
                    .to_string(),
                date: r.date.as_deref().map(text::format_job_date).unwrap_or_default(),
            })
            .collect()
    }

    async fn search_or_empty(
        &self,
        title: Option<&str>,
        country: Option<&str>,
        pagination: Pagination,
    ) -> Vec<JobRow> {
        match self
            .jobs
            .search(title, country, pagination.per_page, pagination.offset())
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "job search failed");
                Vec::new()
            }
        }
    }

    async fn salary_for(&self, location: &str, memo: &mut SalaryMemo) -> Option<SalaryRecord> {
        if let Some(cached) = memo.by_location.get(location) {
            return cached.clone();
        }
        let record = match self.salaries.lookup(location).await {
            Ok(record) => record,
            Err(err) => {
                debug!(error = %err, location, "salary lookup failed");
                None
            }
        };
        memo.by_location.insert(location.to_string(), record.clone());
        record
    }

    async fn card(&self, row: &JobRow, memo: &mut SalaryMemo, now: DateTime<Utc>) -> JobCard {
        let title = text::display_title(row.job_title.as_deref());
        let location = text::display_location(row.location.as_deref());
        let date_raw = row.date.as_deref().unwrap_or_default().trim().to_string();

        let salary = self.salary_for(&location, memo).await;
        let median = salary.as_ref().map(|s| s.median);
        let estimated = estimate(median, &title);

        JobCard {
            id: row.id,
            company: row.company_name.as_deref().unwrap_or_default().trim().to_string(),
            description: text::description_preview(row.job_description.as_deref().unwrap_or_default()),
            date_posted: text::format_job_date(&date_raw),
            link: text::public_link(row.link.as_deref()),
            is_new: text::is_new(&date_raw, now),
            is_ghost: text::is_ghost(&date_raw, now),
            median_salary: median.map(|m| m as i64),
            median_salary_currency: salary.and_then(|s| s.currency),
            median_salary_compact: estimated.as_ref().and(median).map(compact_salary),
            estimated_salary_range_compact: estimated.as_ref().map(|e| e.display.clone()),
            estimated_salary_range_numeric: estimated.as_ref().map(|e| (e.low, e.high)),
            salary_uplift_factor: estimated.as_ref().and_then(|e| e.uplift),
            median,
            estimate: estimated,
            title,
            location,
            date_raw,
        }
    }
}
