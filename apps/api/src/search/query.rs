//! Turns raw request inputs into the normalized query the repository runs.

use crate::search::filter::JobFilter;
use crate::search::normalize::{normalize_country, normalize_title};
use crate::search::salary_query::parse_salary_query;

pub const HIGH_PAY_TOKEN: &str = "HIGH_PAY";
pub const HIGH_PAY_LABEL: &str = "High-pay hubs";
pub const HIGH_PAY_FLOOR: i64 = 100_000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub raw_title: String,
    pub raw_country: String,
    /// Normalized title with any salary expression removed. Empty means no
    /// title filter.
    pub title: String,
    /// Country code, group token or trimmed free text. Empty means no
    /// country filter.
    pub country: String,
    /// Human-facing country label, differs from `country` for groups.
    pub display_country: String,
    pub salary_floor: Option<i64>,
    pub salary_ceiling: Option<i64>,
}

impl SearchQuery {
    pub fn parse(raw_title: &str, raw_country: &str) -> Self {
        let raw_title = raw_title.trim().to_string();
        let raw_country = raw_country.trim().to_string();

        let salary = parse_salary_query(&raw_title);
        let mut title = normalize_title(&salary.text);
        if title.is_empty() && !salary.has_bounds() {
            title = normalize_title(&raw_title);
        }

        let mut country = normalize_country(&raw_country);
        let mut display_country = country.clone();

        let high_floor = salary.floor.is_some_and(|f| f >= HIGH_PAY_FLOOR);
        if high_floor && raw_title.to_lowercase().contains("100k") && raw_country.is_empty() {
            country = HIGH_PAY_TOKEN.to_string();
            display_country = HIGH_PAY_LABEL.to_string();
        }

        Self {
            raw_title,
            raw_country,
            title,
            country,
            display_country,
            salary_floor: salary.floor,
            salary_ceiling: salary.ceiling,
        }
    }

    pub fn filter(&self) -> JobFilter {
        JobFilter::new(non_empty(&self.title), non_empty(&self.country))
    }

    pub fn title_filter(&self) -> Option<&str> {
        non_empty(&self.title)
    }

    pub fn country_filter(&self) -> Option<&str> {
        non_empty(&self.country)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}
