//! Aggregate views over the catalogue: salary summary, the public salary
//! dataset and weekly posting trends. All of them degrade to empty results
//! when the datastore fails.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::warn;

use crate::jobs::repository::JobRepository;
use crate::jobs::text;
use crate::models::JobRow;
use crate::salary::SalaryLookup;
use crate::search::normalize::{normalize_country, normalize_title};
use crate::search::salary_query::parse_money_numbers;
use crate::search::SearchQuery;

const SUMMARY_SAMPLE: i64 = 1000;
const INSIGHTS_LIMIT: i64 = 100;
const TREND_SAMPLE: i64 = 5000;
const TREND_WEEKS: i64 = 8;
const FALLBACK_LOCATIONS: usize = 5;
const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalarySummary {
    pub median: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub count: i64,
    pub salary: SalarySummary,
    pub remote_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightItem {
    pub title: String,
    pub location: Option<String>,
    pub job_date: String,
    pub link: Option<String>,
    pub is_new: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightMeta {
    pub title: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalaryInsights {
    pub count: usize,
    pub items: Vec<InsightItem>,
    pub meta: InsightMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendWeek {
    pub week: String,
    pub total: i64,
    pub ai: i64,
    pub dev: i64,
    pub senior: i64,
    pub remote: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trends {
    pub weeks: Vec<TrendWeek>,
}

pub struct JobInsights {
    jobs: Arc<JobRepository>,
    salaries: Arc<dyn SalaryLookup>,
}

impl JobInsights {
    pub fn new(jobs: Arc<JobRepository>, salaries: Arc<dyn SalaryLookup>) -> Self {
        Self { jobs, salaries }
    }

    /// Match count, median posted salary and share of remote roles for a
    /// search. Without posted salaries the median comes from the reference
    /// table for the first few locations.
    pub async fn summary(&self, query: &SearchQuery) -> JobSummary {
        let (title, country) = (query.title_filter(), query.country_filter());
        let count = self.jobs.count(title, country).await.unwrap_or_else(|err| {
            warn!(error = %err, "summary count failed");
            0
        });
        let rows = self.sample(title, country, SUMMARY_SAMPLE).await;

        let values: Vec<f64> = rows
            .iter()
            .filter_map(|r| posted_salary(r.salary.as_deref().unwrap_or_default()))
            .collect();
        let salary = match median_salary(values) {
            Some(median) => SalarySummary {
                median: Some(median as i64),
                currency: Some(DEFAULT_CURRENCY.to_string()),
            },
            None => self.reference_salary(&rows).await,
        };

        JobSummary {
            count,
            salary,
            remote_share: remote_share(&rows),
        }
    }

    /// Up to 100 matching jobs in a flat public shape.
    pub async fn salary_insights(&self, raw_title: &str, raw_country: &str, now: DateTime<Utc>) -> SalaryInsights {
        let title = normalize_title(raw_title);
        let country = normalize_country(raw_country);
        let rows = self
            .sample(non_empty(&title), non_empty(&country), INSIGHTS_LIMIT)
            .await;
        let items: Vec<InsightItem> = rows
            .into_iter()
            .map(|row| {
                let date = row.date.as_deref().unwrap_or_default().trim().to_string();
                InsightItem {
                    title: row.job_title.as_deref().unwrap_or_default().to_lowercase(),
                    location: row.location,
                    job_date: text::format_job_date(&date),
                    link: text::public_link(row.link.as_deref()),
                    is_new: text::is_new(&date, now),
                }
            })
            .collect();
        SalaryInsights {
            count: items.len(),
            items,
            meta: InsightMeta { title, country },
        }
    }

    /// Weekly posting counts for the last eight weeks, oldest first. Weeks
    /// start on Monday; undated rows are skipped.
    pub async fn trends(&self, now: DateTime<Utc>) -> Trends {
        let cutoff = now.date_naive() - Duration::weeks(TREND_WEEKS);
        let rows = self.sample(None, None, TREND_SAMPLE).await;

        let mut weeks: BTreeMap<NaiveDate, TrendWeek> = BTreeMap::new();
        for row in &rows {
            let Some(posted) = row.date.as_deref().and_then(text::parse_posted_at) else {
                continue;
            };
            let day = posted.date_naive();
            if day < cutoff {
                continue;
            }
            let start = day - Duration::days(i64::from(day.weekday().num_days_from_monday()));
            let week = weeks.entry(start).or_insert_with(|| TrendWeek {
                week: start.format("%b %d").to_string(),
                ..Default::default()
            });
            let title = row.job_title.as_deref().unwrap_or_default().to_lowercase();
            let location = row.location.as_deref().unwrap_or_default().to_lowercase();
            week.total += 1;
            week.ai += i64::from(["ai", "machine learning", "ml engineer"].iter().any(|k| title.contains(k)));
            week.dev += i64::from(["developer", "engineer"].iter().any(|k| title.contains(k)));
            week.senior += i64::from(title.contains("senior"));
            week.remote += i64::from(location.contains("remote"));
        }
        Trends {
            weeks: weeks.into_values().collect(),
        }
    }

    async fn sample(&self, title: Option<&str>, country: Option<&str>, limit: i64) -> Vec<JobRow> {
        self.jobs
            .search(title, country, limit, 0)
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "insight sample failed");
                Vec::new()
            })
    }

    /// Average reference median over the first distinct locations.
    async fn reference_salary(&self, rows: &[JobRow]) -> SalarySummary {
        let mut locations: Vec<&str> = Vec::new();
        for location in rows.iter().filter_map(|r| r.location.as_deref()) {
            let location = location.trim();
            if !location.is_empty() && !locations.contains(&location) {
                locations.push(location);
            }
        }

        let mut medians = Vec::new();
        let mut currency = None;
        for location in locations.into_iter().take(FALLBACK_LOCATIONS) {
            let Ok(Some(record)) = self.salaries.lookup(location).await else {
                continue;
            };
            if record.median > 0.0 {
                medians.push(record.median);
                if currency.is_none() {
                    currency = record.currency;
                }
            }
        }
        if medians.is_empty() {
            return SalarySummary {
                median: None,
                currency: None,
            };
        }
        let average = medians.iter().sum::<f64>() / medians.len() as f64;
        SalarySummary {
            median: Some(average as i64),
            currency: currency.or_else(|| Some(DEFAULT_CURRENCY.to_string())),
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}

/// A posted salary string as one number: the midpoint of a range, or the
/// single amount.
pub fn posted_salary(raw: &str) -> Option<f64> {
    match parse_money_numbers(raw).as_slice() {
        [] => None,
        [single] => Some(*single as f64),
        [low, high, ..] => Some((*low as f64 + *high as f64) / 2.0),
    }
}

/// Median of three or more values, mean of fewer. Values that look like
/// cents are scaled down when that yields a plausible annual salary.
pub fn median_salary(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    if values[n / 2] >= 1_000_000.0 {
        let scaled = values[n / 2] / 100.0;
        if (20_000.0..=500_000.0).contains(&scaled) {
            values.iter_mut().for_each(|v| *v /= 100.0);
        }
    }
    if n < 3 {
        return Some(values.iter().sum::<f64>() / n as f64);
    }
    Some(if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    })
}

fn remote_share(rows: &[JobRow]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let remote = rows
        .iter()
        .filter(|r| {
            r.location
                .as_deref()
                .is_some_and(|l| l.to_lowercase().contains("remote"))
        })
        .count();
    (remote as f64 / rows.len() as f64 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::jobs::memory::MemoryJobStore;
    use crate::jobs::repository::tests::CountingStore;
    use crate::models::NewJob;
    use crate::salary::StaticSalaryTable;
    use crate::search::cache::ManualClock;
    use crate::search::CacheSettings;

    fn insights(store: MemoryJobStore) -> JobInsights {
        let repo = JobRepository::new(
            Arc::new(store),
            CacheSettings::default(),
            Arc::new(ManualClock::new()),
        );
        JobInsights::new(Arc::new(repo), Arc::new(StaticSalaryTable::demo()))
    }

    fn salaried(title: &str, salary: &str, n: usize) -> NewJob {
        NewJob {
            job_title: title.into(),
            location: "Berlin, DE".into(),
            country: "DE".into(),
            link: format!("https://jobs.example.org/{n}"),
            salary: salary.into(),
            date: "2025-09-01".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_posted_salary_takes_range_midpoint() {
        assert_eq!(posted_salary("€100k - €120k"), Some(110_000.0));
        assert_eq!(posted_salary("USD 90,000"), Some(90_000.0));
        assert_eq!(posted_salary("competitive"), None);
    }

    #[test]
    fn test_median_rules() {
        assert_eq!(median_salary(vec![]), None);
        assert_eq!(median_salary(vec![50_000.0, 70_000.0]), Some(60_000.0));
        assert_eq!(median_salary(vec![90.0, 10.0, 50.0]), Some(50.0));
        assert_eq!(median_salary(vec![4.0, 1.0, 3.0, 2.0]), Some(2.5));
        // 12.1M and 9M read as cents
        assert_eq!(median_salary(vec![12_100_000.0, 9_000_000.0]), Some(105_500.0));
        // 90M stays as-is: the scaled median would be implausible
        assert_eq!(median_salary(vec![90_000_000.0]), Some(90_000_000.0));
    }

    #[tokio::test]
    async fn test_summary_uses_posted_salaries() {
        let insights = insights(MemoryJobStore::with_jobs(&[
            salaried("Rust Engineer", "100k-120k", 1),
            salaried("Data Engineer", "90,000", 2),
            salaried("Platform Engineer", "150k", 3),
            salaried("Office Manager", "", 4),
        ]));
        let summary = insights.summary(&SearchQuery::parse("engineer", "")).await;
        assert_eq!(summary.count, 3);
        assert_eq!(summary.salary.median, Some(110_000));
        assert_eq!(summary.salary.currency.as_deref(), Some("USD"));
        assert_eq!(summary.remote_share, 0.0);
    }

    #[tokio::test]
    async fn test_summary_falls_back_to_reference_table() {
        let summary = insights(MemoryJobStore::demo())
            .summary(&SearchQuery::default())
            .await;
        assert_eq!(summary.count, 9);
        // Remote, London, Zurich, Barcelona, Remote
        assert_eq!(summary.salary.median, Some(87_000));
        assert_eq!(summary.salary.currency.as_deref(), Some("USD"));
        assert_eq!(summary.remote_share, 0.33);
    }

    #[tokio::test]
    async fn test_summary_survives_store_failure() {
        let repo = JobRepository::new(
            Arc::new(CountingStore::failing()),
            CacheSettings::default(),
            Arc::new(ManualClock::new()),
        );
        let insights = JobInsights::new(Arc::new(repo), Arc::new(StaticSalaryTable::demo()));
        let summary = insights.summary(&SearchQuery::parse("rust", "")).await;
        assert_eq!(summary.count, 0);
        assert_eq!(summary.salary.median, None);
        assert_eq!(summary.remote_share, 0.0);
    }

    #[tokio::test]
    async fn test_salary_insights_items() {
        let now = Utc.with_ymd_and_hms(2025, 10, 2, 0, 0, 0).unwrap();
        let result = insights(MemoryJobStore::demo())
            .salary_insights("", "UK", now)
            .await;
        assert_eq!(result.meta.country, "UK");
        assert_eq!(result.count, 1);
        assert_eq!(result.items[0].title, "data engineer");
        assert_eq!(result.items[0].location.as_deref(), Some("London, UK"));
        assert!(result.items[0].is_new);
    }

    #[tokio::test]
    async fn test_trends_bucket_by_monday() {
        let now = Utc.with_ymd_and_hms(2025, 10, 2, 0, 0, 0).unwrap();
        let trends = insights(MemoryJobStore::demo()).trends(now).await;
        let labels: Vec<_> = trends.weeks.iter().map(|w| w.week.as_str()).collect();
        assert_eq!(labels, vec!["Sep 15", "Sep 22", "Sep 29"]);
        assert_eq!(
            trends.weeks[1],
            TrendWeek {
                week: "Sep 22".into(),
                total: 5,
                ai: 1,
                dev: 4,
                senior: 0,
                remote: 2,
            }
        );
        assert_eq!((trends.weeks[2].senior, trends.weeks[2].ai), (1, 1));
    }

    #[tokio::test]
    async fn test_trends_drop_weeks_before_cutoff() {
        let now = Utc.with_ymd_and_hms(2025, 11, 12, 0, 0, 0).unwrap();
        let trends = insights(MemoryJobStore::demo()).trends(now).await;
        assert_eq!(trends.weeks[0].week, "Sep 15");
        assert_eq!(trends.weeks[0].total, 2);
    }
}
