//! Builds the job predicate from normalized title and country inputs.

use std::collections::BTreeSet;

use crate::search::normalize::COUNTRY_ALIASES;
use crate::search::predicate::{contains_pattern, escape_like, Column, Predicate, ResultOrder};

/// EU member states, matched against the `country` column.
pub const EU_MEMBER_CODES: &[&str] = &[
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE", "IT",
    "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
];

pub const EU_HUBS: &[&str] = &["madrid", "paris", "berlin", "barcelona", "milan", "milano"];

pub const HIGH_PAY_HUBS: &[&str] = &[
    "san francisco",
    "new york",
    "zurich",
    "berlin",
    "paris",
    "madrid",
    "london",
];

pub const INDIA_HUBS: &[&str] = &[
    "bangalore",
    "bengaluru",
    "mumbai",
    "pune",
    "delhi",
    "new delhi",
    "gurgaon",
    "gurugram",
    "noida",
    "hyderabad",
    "chennai",
    "kolkata",
    "ahmedabad",
];

/// City and country words that imply a country code in a location string.
pub const LOCATION_COUNTRY_HINTS: &[(&str, &str)] = &[
    ("amsterdam", "NL"),
    ("atlanta", "US"),
    ("austin", "US"),
    ("barcelona", "ES"),
    ("belgium", "BE"),
    ("berlin", "DE"),
    ("berlin, de", "DE"),
    ("boston", "US"),
    ("brussels", "BE"),
    ("budapest", "HU"),
    ("charlotte", "US"),
    ("chicago", "US"),
    ("copenhagen", "DK"),
    ("dallas", "US"),
    ("denmark", "DK"),
    ("denver", "US"),
    ("dublin", "IE"),
    ("france", "FR"),
    ("frankfurt", "DE"),
    ("germany", "DE"),
    ("hamburg", "DE"),
    ("houston", "US"),
    ("italy", "IT"),
    ("lisbon", "PT"),
    ("london", "UK"),
    ("los angeles", "US"),
    ("los", "US"),
    ("madrid", "ES"),
    ("miami", "US"),
    ("milan", "IT"),
    ("minneapolis", "US"),
    ("munich", "DE"),
    ("netherlands", "NL"),
    ("new york", "US"),
    ("oslo", "NO"),
    ("paris", "FR"),
    ("philadelphia", "US"),
    ("phoenix", "US"),
    ("pittsburgh", "US"),
    ("portland", "US"),
    ("porto", "PT"),
    ("portugal", "PT"),
    ("prague", "CZ"),
    ("raleigh", "US"),
    ("salt lake city", "US"),
    ("salt", "US"),
    ("san francisco", "US"),
    ("seattle", "US"),
    ("spain", "ES"),
    ("stockholm", "SE"),
    ("switzerland", "CH"),
    ("tallinn", "EE"),
    ("uk", "UK"),
    ("vienna", "AT"),
    ("washington", "US"),
    ("zurich", "CH"),
    ("bangalore", "IN"),
    ("bengaluru", "IN"),
    ("mumbai", "IN"),
    ("pune", "IN"),
    ("delhi", "IN"),
    ("new delhi", "IN"),
    ("gurgaon", "IN"),
    ("gurugram", "IN"),
    ("noida", "IN"),
    ("hyderabad", "IN"),
    ("chennai", "IN"),
    ("kolkata", "IN"),
    ("ahmedabad", "IN"),
];

const GEO_COLUMNS: &[Column] = &[Column::Location, Column::City, Column::Region, Column::Country];
const TEXT_COLUMNS: &[Column] = &[Column::TitleNorm, Column::Title, Column::Description];
const REMOTE_COLUMNS: &[Column] = &[
    Column::TitleNorm,
    Column::Title,
    Column::Description,
    Column::Location,
];
const DEVELOPER_COLUMNS: &[Column] = &[Column::TitleNorm, Column::Title];
const DEVELOPER_TERMS: &[&str] = &[
    "developer",
    "programmer",
    "coder",
    "software developer",
    "software engineer",
];

const BOUNDARY_BEFORE: &[char] = &[' ', '(', ',', '/', '-'];
const BOUNDARY_AFTER: &[char] = &[' ', ')', ',', '/', '-'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionGroup {
    Eu,
    HighPay,
}

impl RegionGroup {
    pub fn hubs(self) -> &'static [&'static str] {
        match self {
            RegionGroup::Eu => EU_HUBS,
            RegionGroup::HighPay => HIGH_PAY_HUBS,
        }
    }
}

/// Geographic filter derived from a normalized country value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryFilter {
    /// Two-letter code, uppercase.
    Code(String),
    Group(RegionGroup),
    /// Unrecognized text, lowercase; matched as a substring.
    FreeText(String),
}

impl CountryFilter {
    /// Classifies a normalized country value. Blank input means no filter.
    pub fn parse(normalized: &str) -> Option<Self> {
        let lowered = normalized.trim().to_lowercase();
        if lowered.is_empty() {
            return None;
        }
        let upper = lowered.to_uppercase();
        let filter = match upper.as_str() {
            "HIGH_PAY" => CountryFilter::Group(RegionGroup::HighPay),
            "EU" => CountryFilter::Group(RegionGroup::Eu),
            _ if upper.chars().count() == 2 && upper.chars().all(char::is_alphabetic) => {
                CountryFilter::Code(upper)
            }
            _ => CountryFilter::FreeText(lowered),
        };
        Some(filter)
    }

    pub fn predicate(&self) -> Predicate {
        match self {
            CountryFilter::Group(RegionGroup::HighPay) => Predicate::In {
                column: Column::City,
                values: owned(HIGH_PAY_HUBS),
            },
            CountryFilter::Group(RegionGroup::Eu) => {
                let mut codes: Vec<String> =
                    EU_MEMBER_CODES.iter().map(|c| c.to_lowercase()).collect();
                codes.sort();
                Predicate::Any(vec![
                    Predicate::In {
                        column: Column::Country,
                        values: codes,
                    },
                    Predicate::In {
                        column: Column::City,
                        values: owned(EU_HUBS),
                    },
                ])
            }
            CountryFilter::Code(code) if code == "IN" => Predicate::Any(vec![
                Predicate::Equals {
                    column: Column::Country,
                    value: "in".to_string(),
                },
                Predicate::In {
                    column: Column::City,
                    values: owned(INDIA_HUBS),
                },
            ]),
            CountryFilter::Code(code) => code_predicate(code),
            CountryFilter::FreeText(text) => Predicate::like_any(GEO_COLUMNS, &contains_pattern(text)),
        }
    }

    pub fn order(&self) -> ResultOrder {
        match self {
            CountryFilter::Group(group) => ResultOrder::HubsFirst(group.hubs()),
            _ => ResultOrder::Recent,
        }
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Exact-match and LIKE candidates for a country code.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CountryPatterns {
    pub equals: Vec<String>,
    pub likes: Vec<String>,
}

pub fn country_patterns(code: &str) -> CountryPatterns {
    let code = code.to_uppercase();
    let token = escape_like(&code.to_lowercase());
    let mut equals: BTreeSet<String> = BTreeSet::new();
    let mut likes: Vec<String> = Vec::new();
    let mut push_like = |pattern: String| {
        if !likes.contains(&pattern) {
            likes.push(pattern);
        }
    };

    equals.insert(code.to_lowercase());
    for before in BOUNDARY_BEFORE {
        for after in BOUNDARY_AFTER {
            push_like(format!("%{before}{token}{after}%"));
        }
        push_like(format!("%{before}{token}"));
    }
    if code.chars().count() > 2 {
        push_like(format!("%{token}%"));
    }

    let aliases: BTreeSet<&str> = COUNTRY_ALIASES
        .iter()
        .filter(|(_, mapped)| mapped.eq_ignore_ascii_case(&code))
        .map(|(alias, _)| *alias)
        .collect();
    for alias in &aliases {
        equals.insert(alias.to_string());
        if alias.chars().count() > 2 {
            push_like(contains_pattern(alias));
        }
    }

    for (hint, mapped) in LOCATION_COUNTRY_HINTS {
        if mapped.eq_ignore_ascii_case(&code) {
            push_like(contains_pattern(hint));
            if hint.chars().count() <= 3 {
                equals.insert(hint.to_string());
            }
        }
    }

    CountryPatterns {
        equals: equals.into_iter().collect(),
        likes,
    }
}

fn code_predicate(code: &str) -> Predicate {
    let patterns = country_patterns(code);
    let mut branches = Vec::new();
    let exact: Vec<Predicate> = patterns
        .equals
        .iter()
        .flat_map(|value| {
            GEO_COLUMNS.iter().map(move |column| Predicate::Equals {
                column: *column,
                value: value.clone(),
            })
        })
        .collect();
    if !exact.is_empty() {
        branches.push(Predicate::Any(exact));
    }
    let fuzzy: Vec<Predicate> = patterns
        .likes
        .iter()
        .flat_map(|pattern| GEO_COLUMNS.iter().map(move |column| Predicate::like(*column, pattern.as_str())))
        .collect();
    if !fuzzy.is_empty() {
        branches.push(Predicate::Any(fuzzy));
    }
    Predicate::Any(branches)
}

/// Title clauses. "remote" and "developer" are pulled out of the phrase and
/// become their own AND'ed clauses; the remaining words must appear as one
/// substring.
pub fn title_predicate(title: &str) -> Option<Predicate> {
    let normalized = title.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let remote = tokens.contains(&"remote");
    let developer = tokens.contains(&"developer");
    let core = tokens
        .iter()
        .filter(|t| **t != "remote" && **t != "developer")
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    let mut clauses = Vec::new();
    if !core.is_empty() {
        clauses.push(Predicate::like_any(TEXT_COLUMNS, &contains_pattern(&core)));
    }
    if remote {
        clauses.push(Predicate::like_any(REMOTE_COLUMNS, &contains_pattern("remote")));
    }
    if developer {
        clauses.push(Predicate::Any(
            DEVELOPER_TERMS
                .iter()
                .flat_map(|term| {
                    let pattern = contains_pattern(term);
                    DEVELOPER_COLUMNS
                        .iter()
                        .map(move |column| Predicate::like(*column, pattern.clone()))
                })
                .collect(),
        ));
    }
    Some(Predicate::All(clauses))
}

/// Normalized search inputs for one count/search call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub title: Option<String>,
    pub country: Option<CountryFilter>,
}

impl JobFilter {
    pub fn new(title: Option<&str>, country: Option<&str>) -> Self {
        Self {
            title: title
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty()),
            country: country.and_then(CountryFilter::parse),
        }
    }

    /// Title and country clauses AND'ed; empty when neither is set.
    pub fn predicate(&self) -> Predicate {
        let mut clauses = Vec::new();
        if let Some(title) = self.title.as_deref().and_then(title_predicate) {
            if let Predicate::All(parts) = title {
                clauses.extend(parts);
            }
        }
        if let Some(country) = &self.country {
            clauses.push(country.predicate());
        }
        Predicate::All(clauses)
    }

    pub fn order(&self) -> ResultOrder {
        self.country
            .as_ref()
            .map(CountryFilter::order)
            .unwrap_or(ResultOrder::Recent)
    }
}
