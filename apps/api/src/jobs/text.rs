//! Presentation helpers for job cards: description cleanup and summary,
//! posted-date formatting and freshness flags.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Placeholder links that must never be shown to users.
pub const BLACKLIST_LINKS: &[&str] = &["https://example.com/job/1"];

pub const UNTITLED: &str = "(Untitled)";
pub const ANYWHERE: &str = "Remote / Anywhere";

const NEW_WINDOW_DAYS: i64 = 7;
const GHOST_AFTER_DAYS: i64 = 30;

static DATE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\W*\d{8}\s*\n?").expect("valid date prefix regex"));
static AGE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*\d+\s*(minutes?|hours?|days?|weeks?)\s+ago\s+[^\w\s]\s*")
        .expect("valid age prefix regex")
});
static DETAILS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*details\s*\n+").expect("valid details regex"));
static SENTENCE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("valid sentence regex"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid word regex"));
static COMPACT_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").expect("valid compact date regex"));
static DASHED_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").expect("valid dashed date regex"));

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
        "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
        "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during",
        "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
        "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into",
        "is", "it", "its", "itself", "me", "more", "most", "my", "myself", "no", "nor", "not",
        "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out",
        "over", "own", "same", "she", "should", "so", "some", "such", "than", "that", "the",
        "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this",
        "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were",
        "what", "when", "where", "which", "while", "who", "whom", "why", "with", "you", "your",
        "yours", "yourself", "yourselves",
        // es / fr
        "de", "la", "el", "en", "y", "los", "las", "que", "es", "un", "una", "con", "por",
        "para", "le", "et", "à", "les", "des", "est", "pour", "dans",
    ]
    .into_iter()
    .collect()
});

/// Strips scraper noise from the start of a description: a leading 8-digit
/// date, an "N hours ago -" prefix and a bare "Details" line.
pub fn clean_description(text: &str) -> String {
    let text = DATE_PREFIX.replace(text, "");
    let text = AGE_PREFIX.replace(&text, "");
    let text = DETAILS_LINE.replace(&text, "");
    text.trim().to_string()
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_BREAK.find_iter(text) {
        // keep the terminator with its sentence
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    sentences.push(&text[start..]);
    sentences
}

fn words(text: &str) -> Vec<String> {
    WORD.find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// The two highest-scoring sentences, in their original order. A sentence
/// scores the summed corpus frequency of its non-stopwords over its length.
pub fn summarize_two_sentences(text: &str) -> String {
    let text = text.trim();
    let sentences = split_sentences(text);
    if sentences.len() < 2 {
        return text.to_string();
    }

    let mut freqs: HashMap<String, usize> = HashMap::new();
    for word in words(text) {
        if !STOPWORDS.contains(word.as_str()) {
            *freqs.entry(word).or_default() += 1;
        }
    }

    let mut scored: Vec<(usize, f64)> = Vec::new();
    for (index, sentence) in sentences.iter().enumerate() {
        if sentences[..index].contains(sentence) {
            continue;
        }
        let tokens = words(sentence);
        if tokens.is_empty() {
            continue;
        }
        let total: usize = tokens
            .iter()
            .filter(|w| !STOPWORDS.contains(w.as_str()))
            .map(|w| freqs.get(w).copied().unwrap_or(0))
            .sum();
        scored.push((index, total as f64 / tokens.len() as f64));
    }

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut top: Vec<usize> = scored.into_iter().take(2).map(|(i, _)| i).collect();
    top.sort_unstable();
    top.into_iter()
        .map(|i| sentences[i])
        .collect::<Vec<_>>()
        .join(" ")
}

/// Card preview: cleaned, then summarized.
pub fn description_preview(text: &str) -> String {
    summarize_two_sentences(&clean_description(text))
}

/// `YYYYMMDD`, `YYYY-MM-DD` and ISO datetimes become `YYYY-MM-DD`; anything
/// else comes back trimmed.
pub fn format_job_date(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(caps) = COMPACT_DATE.captures(raw) {
        return format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]);
    }
    if let Some(dt) = parse_iso(raw) {
        return dt.date_naive().format("%Y-%m-%d").to_string();
    }
    if let Some(caps) = DASHED_DATE.captures(raw) {
        return format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]);
    }
    raw.to_string()
}

fn parse_iso(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Posting time of a stored date string. Naive values are read as UTC.
pub fn parse_posted_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(dt) = parse_iso(raw) {
        return Some(dt);
    }
    ["%Y-%m-%d", "%Y.%m.%d", "%Y%m%d", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Posted within the last seven days.
pub fn is_new(raw_date: &str, now: DateTime<Utc>) -> bool {
    parse_posted_at(raw_date).is_some_and(|dt| now - dt <= Duration::days(NEW_WINDOW_DAYS))
}

/// Posted more than thirty days ago; the role may already be filled.
pub fn is_ghost(raw_date: &str, now: DateTime<Utc>) -> bool {
    parse_posted_at(raw_date).is_some_and(|dt| now - dt > Duration::days(GHOST_AFTER_DAYS))
}

/// Whitespace-collapsed title, `(Untitled)` when blank.
pub fn display_title(raw: Option<&str>) -> String {
    let collapsed = raw
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if collapsed.is_empty() {
        UNTITLED.to_string()
    } else {
        collapsed
    }
}

pub fn display_location(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(loc) if !loc.is_empty() => loc.to_string(),
        _ => ANYWHERE.to_string(),
    }
}

/// Outbound link, hidden when blank or blacklisted.
pub fn public_link(raw: Option<&str>) -> Option<String> {
    let link = raw?.trim();
    if link.is_empty() || BLACKLIST_LINKS.contains(&link) {
        return None;
    }
    Some(link.to_string())
}
