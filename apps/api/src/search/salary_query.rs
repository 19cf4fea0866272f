//! Inline salary filters embedded in a free-text title query
//! ("80k-120k rust", ">100k engineer", "<=90k", "120k").

use once_cell::sync::Lazy;
use regex::Regex;

const MONEY: &str = r"\d[\d,.\s]*k?";

static MONEY_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("(?i){MONEY}")).expect("valid money regex"));
static RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)({MONEY})\s*[-\x{{2013}}]\s*({MONEY})")).expect("valid range regex")
});
static LOWER_BOUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)>\s*=?\s*({MONEY})")).expect("valid floor regex"));
static UPPER_BOUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)<\s*=?\s*({MONEY})")).expect("valid ceiling regex"));
static BARE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("(?i)({MONEY})")).expect("valid number regex"));

/// Result of stripping a salary expression out of a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SalaryQuery {
    pub text: String,
    pub floor: Option<i64>,
    pub ceiling: Option<i64>,
}

impl SalaryQuery {
    pub fn has_bounds(&self) -> bool {
        self.floor.is_some() || self.ceiling.is_some()
    }
}

/// Extracts every money token from `text`. A trailing `k` multiplies by 1000;
/// commas, dots and spaces are separators. Tokens that are not purely numeric
/// after cleanup are dropped.
pub fn parse_money_numbers(text: &str) -> Vec<i64> {
    MONEY_TOKEN
        .find_iter(text)
        .filter_map(|m| {
            let cleaned = m.as_str().to_lowercase().replace([',', ' '], "");
            let (digits, multiplier) = match cleaned.strip_suffix('k') {
                Some(rest) => (rest.replace('.', ""), 1000),
                None => (cleaned.replace('.', ""), 1),
            };
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            digits.parse::<i64>().ok()?.checked_mul(multiplier)
        })
        .collect()
}

/// Detects and removes one salary expression from `raw`.
///
/// Precedence: range `A-B` (hyphen or en dash), `> N` / `>= N`, `< N` / `<= N`,
/// then a bare number taken as the floor. Only the first matching form is used.
pub fn parse_salary_query(raw: &str) -> SalaryQuery {
    let text = raw.trim();
    if text.is_empty() {
        return SalaryQuery::default();
    }

    if let Some(caps) = RANGE.captures(text) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
        let low = caps.get(1).map(|m| parse_money_numbers(m.as_str()));
        let high = caps.get(2).map(|m| parse_money_numbers(m.as_str()));
        return SalaryQuery {
            text: remove_span(text, whole),
            floor: low.and_then(|v| v.first().copied()),
            ceiling: high.and_then(|v| v.last().copied()),
        };
    }

    if let Some((span, value)) = single_bound(&LOWER_BOUND, text) {
        return SalaryQuery {
            text: remove_span(text, span),
            floor: value,
            ceiling: None,
        };
    }

    if let Some((span, value)) = single_bound(&UPPER_BOUND, text) {
        return SalaryQuery {
            text: remove_span(text, span),
            floor: None,
            ceiling: value,
        };
    }

    if let Some((span, value)) = single_bound(&BARE_NUMBER, text) {
        return SalaryQuery {
            text: remove_span(text, span),
            floor: value,
            ceiling: None,
        };
    }

    SalaryQuery {
        text: text.to_string(),
        floor: None,
        ceiling: None,
    }
}

fn single_bound(re: &Regex, text: &str) -> Option<(std::ops::Range<usize>, Option<i64>)> {
    let caps = re.captures(text)?;
    let span = caps.get(0)?.range();
    let value = caps
        .get(1)
        .and_then(|m| parse_money_numbers(m.as_str()).first().copied());
    Some((span, value))
}

fn remove_span(text: &str, span: std::ops::Range<usize>) -> String {
    format!("{}{}", &text[..span.start], &text[span.end..])
        .trim()
        .to_string()
}
