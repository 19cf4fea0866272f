//! Normalizers: map free-text title/country input to canonical matching tokens.
//!
//! Both functions are total: they never fail, they degrade to the trimmed input
//! (country) or to an empty string (title).

use once_cell::sync::Lazy;
use regex::Regex;

/// Country names, native spellings and short codes mapped to the code used in
/// filters. Order matters for the word-boundary fallback scan.
pub const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("deutschland", "DE"),
    ("germany", "DE"),
    ("deu", "DE"),
    ("de", "DE"),
    ("switzerland", "CH"),
    ("schweiz", "CH"),
    ("suisse", "CH"),
    ("svizzera", "CH"),
    ("ch", "CH"),
    ("austria", "AT"),
    ("österreich", "AT"),
    ("at", "AT"),
    ("europe", "EU"),
    ("eu", "EU"),
    ("eur", "EU"),
    ("european union", "EU"),
    ("uk", "UK"),
    ("gb", "UK"),
    ("england", "UK"),
    ("united kingdom", "UK"),
    ("usa", "US"),
    ("united states", "US"),
    ("america", "US"),
    ("us", "US"),
    ("spain", "ES"),
    ("es", "ES"),
    ("france", "FR"),
    ("fr", "FR"),
    ("italy", "IT"),
    ("it", "IT"),
    ("netherlands", "NL"),
    ("nl", "NL"),
    ("belgium", "BE"),
    ("be", "BE"),
    ("sweden", "SE"),
    ("se", "SE"),
    ("poland", "PL"),
    ("colombia", "CO"),
    ("mexico", "MX"),
    ("portugal", "PT"),
    ("ireland", "IE"),
    ("denmark", "DK"),
    ("finland", "FI"),
    ("greece", "GR"),
    ("hungary", "HU"),
    ("romania", "RO"),
    ("slovakia", "SK"),
    ("slovenia", "SI"),
    ("bulgaria", "BG"),
    ("croatia", "HR"),
    ("cyprus", "CY"),
    ("czech republic", "CZ"),
    ("czechia", "CZ"),
    ("estonia", "EE"),
    ("latvia", "LV"),
    ("lithuania", "LT"),
    ("luxembourg", "LU"),
    ("malta", "MT"),
    ("india", "IN"),
    ("bharat", "IN"),
    ("in", "IN"),
];

/// Title shorthand expanded before matching. Applied in order, so a later rule
/// sees the output of an earlier one.
pub const TITLE_SYNONYMS: &[(&str, &str)] = &[
    ("swe", "software engineer"),
    ("software eng", "software engineer"),
    ("sw eng", "software engineer"),
    ("frontend", "front end"),
    ("front-end", "front end"),
    ("backend", "back end"),
    ("back-end", "back end"),
    ("fullstack", "full stack"),
    ("full-stack", "full stack"),
    ("pm", "product manager"),
    ("prod mgr", "product manager"),
    ("product owner", "product manager"),
    ("ds", "data scientist"),
    ("ml", "machine learning"),
    ("mle", "machine learning engineer"),
    ("sre", "site reliability engineer"),
    ("devops", "devops"),
    ("sec eng", "security engineer"),
    ("infosec", "security"),
    ("programmer", "developer"),
    ("coder", "developer"),
];

static ALIAS_BOUNDARY_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    COUNTRY_ALIASES
        .iter()
        .filter_map(|(alias, code)| {
            Regex::new(&format!(r"\b{}\b", regex::escape(alias)))
                .ok()
                .map(|re| (re, *code))
        })
        .collect()
});

static TITLE_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s\-/]").expect("valid title punctuation regex"));

/// Returns the canonical country code for `raw`, or the trimmed input when
/// nothing matches.
///
/// Lookup order: exact alias, bare two-letter token, alias on a word boundary,
/// fallback to the original text.
pub fn normalize_country(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lowered = trimmed.to_lowercase();

    if let Some((_, code)) = COUNTRY_ALIASES.iter().find(|(alias, _)| *alias == lowered) {
        return (*code).to_string();
    }

    if lowered.chars().count() == 2 && lowered.chars().all(char::is_alphabetic) {
        return lowered.to_uppercase();
    }

    ALIAS_BOUNDARY_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(&lowered))
        .map(|(_, code)| (*code).to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Synonym passes are repeated until the title stops changing; an expansion
/// can create the key of an earlier rule ("dinfosec" → "dsecurity").
const MAX_SYNONYM_PASSES: usize = 4;

/// Lowercases, expands title shorthand and strips punctuation other than `-`
/// and `/`. The result has single spaces and no leading/trailing whitespace,
/// and normalizing it again returns it unchanged.
pub fn normalize_title(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    let mut title = clean_title_text(&raw.to_lowercase());
    for _ in 0..MAX_SYNONYM_PASSES {
        let expanded = clean_title_text(&apply_synonyms(&title));
        if expanded == title {
            break;
        }
        title = expanded;
    }
    title
}

fn apply_synonyms(title: &str) -> String {
    let mut title = title.to_string();
    for (short, expanded) in TITLE_SYNONYMS {
        if title.contains(short) {
            title = expand_synonym(&title, short, expanded);
        }
    }
    title
}

fn clean_title_text(text: &str) -> String {
    let stripped = TITLE_PUNCTUATION.replace_all(text, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Literal substring replacement that leaves occurrences already followed by
/// their expansion untouched ("software eng" inside "software engineer").
fn expand_synonym(text: &str, short: &str, expanded: &str) -> String {
    let mut out = String::with_capacity(text.len() + expanded.len());
    let mut rest = text;
    while let Some(idx) = rest.find(short) {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        if tail.starts_with(expanded) {
            out.push_str(expanded);
            rest = &tail[expanded.len()..];
        } else {
            out.push_str(expanded);
            rest = &tail[short.len()..];
        }
    }
    out.push_str(rest);
    out
}

/// Collapses runs of whitespace into single spaces and lowercases. Used for the
/// stored `job_title_norm` column.
pub fn normalize_stored_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_alias_ignores_case_and_padding() {
        assert_eq!(normalize_country("  Germany "), "DE");
        assert_eq!(normalize_country("GERMANY"), "DE");
        assert_eq!(normalize_country("deutschland"), "DE");
        assert_eq!(normalize_country("Switzerland"), "CH");
    }

    #[test]
    fn test_country_uk_aliases() {
        for alias in ["uk", "GB", "England", "united kingdom"] {
            assert_eq!(normalize_country(alias), "UK", "alias {alias}");
        }
    }

    #[test]
    fn test_country_unknown_two_letter_code_is_uppercased() {
        assert_eq!(normalize_country("xx"), "XX");
        assert_eq!(normalize_country(" jp "), "JP");
    }

    #[test]
    fn test_country_word_boundary_scan() {
        assert_eq!(normalize_country("Berlin, Germany"), "DE");
        assert_eq!(normalize_country("remote europe"), "EU");
    }

    #[test]
    fn test_country_alias_inside_word_does_not_match() {
        // "germanyland" has no word boundary after "germany"
        assert_eq!(normalize_country("Germanyland"), "Germanyland");
    }

    #[test]
    fn test_country_free_text_fallback_keeps_original_case() {
        assert_eq!(normalize_country("  Tokyo "), "Tokyo");
        assert_eq!(normalize_country(""), "");
        assert_eq!(normalize_country("   "), "");
    }

    #[test]
    fn test_title_synonyms_expand() {
        assert_eq!(normalize_title("SWE"), "software engineer");
        assert_eq!(normalize_title("Frontend Dev"), "front end dev");
        assert_eq!(normalize_title("Senior PM"), "senior product manager");
        assert_eq!(normalize_title("programmer"), "developer");
    }

    #[test]
    fn test_title_strips_punctuation_but_keeps_hyphen_and_slash() {
        assert_eq!(normalize_title("Rust!!  Engineer (m/f/d)"), "rust engineer m/f/d");
        assert_eq!(normalize_title("c++ dev-ops"), "c dev-ops");
    }

    #[test]
    fn test_title_empty_input() {
        assert_eq!(normalize_title(""), "");
        assert_eq!(normalize_title("  ?! "), "");
    }

    #[test]
    fn test_title_normalization_is_idempotent() {
        let inputs = [
            "Senior SWE",
            "software eng",
            "Full-Stack Developer",
            "ML Engineer",
            "sec.eng",
            "Prod   Mgr, Remote",
            "Backend / Frontend",
            "Head of Data",
            "coder",
        ];
        for input in inputs {
            let once = normalize_title(input);
            assert_eq!(normalize_title(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn test_title_expansion_runs_to_a_fixed_point() {
        let once = normalize_title("dinfosec");
        assert_eq!(once, "data scientistecurity");
        assert_eq!(normalize_title(&once), once);
    }

    #[test]
    fn test_software_eng_expansion_is_not_reapplied() {
        assert_eq!(normalize_title("software engineer"), "software engineer");
        assert_eq!(normalize_title("software eng"), "software engineer");
    }

    #[test]
    fn test_stored_title_collapses_whitespace() {
        assert_eq!(normalize_stored_title("  Senior   Rust\tEngineer "), "senior rust engineer");
    }
}
