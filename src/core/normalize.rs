//! Holding-name canonicalization.
//!
//! Different sources report the same real-world holding with different
//! spellings ("Apple Inc.", "APPLE INC", "Apple"). Two names refer to the
//! same holding iff their normalized forms are equal.

use regex::Regex;
use std::sync::LazyLock;

static SHARE_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(CLASS|SERIES|CL)\s+[A-Z]$").unwrap());

static CORPORATE_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\s+(INCORPORATED|CORPORATION|LIMITED|COMPANY|HOLDINGS|GROUP|INC|CORP|LTD|CO|PLC|AG|SA|SE|NV|N V)$",
    )
    .unwrap()
});

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Canonicalizes a holding display name into a dedup key. Idempotent.
pub fn normalize(name: &str) -> String {
    let mut result = name.to_uppercase().replace('.', " ");
    result = WHITESPACE_RE.replace_all(result.trim(), " ").to_string();

    result = SHARE_CLASS_RE.replace(&result, "").to_string();

    // Applied twice to catch compound suffixes ("Co., Ltd."); trailing
    // punctuation is trimmed first so a comma cannot mask the next suffix.
    for _ in 0..2 {
        result = result
            .trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
            .to_string();
        result = CORPORATE_SUFFIX_RE.replace(&result, "").to_string();
    }

    result = result
        .trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_string();

    WHITESPACE_RE.replace_all(result.trim(), " ").to_string()
}

fn is_all_uppercase(name: &str) -> bool {
    let mut has_alpha = false;
    for c in name.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_alphabetic() {
            has_alpha = true;
        }
    }
    has_alpha
}

/// Picks the better of two colliding display variants: a mixed-case name
/// beats an all-uppercase one, otherwise the first seen wins.
pub fn pick_display_name<'a>(existing: &'a str, incoming: &'a str) -> &'a str {
    if is_all_uppercase(existing) && !is_all_uppercase(incoming) {
        incoming
    } else {
        existing
    }
}

// Abbreviations that stay uppercase when title-casing.
const UPPER_ALLOW_LIST: &[&str] = &[
    "AG", "SE", "SA", "NV", "PLC", "ETF", "REIT", "ADR", "USA", "US", "UK", "IT",
];

// Connective words that stay lowercase unless leading.
const CONNECTIVES: &[&str] = &["OF", "AND", "THE", "DE", "DA", "DI", "VAN", "VON", "&"];

/// Title-cases an all-uppercase holding name from the extended-holdings
/// provider ("TAIWAN SEMICONDUCTOR" -> "Taiwan Semiconductor"). Names that
/// already contain lowercase, and short single-word all-caps tickers, are
/// returned unchanged.
pub fn title_case_all_caps(name: &str) -> String {
    if !is_all_uppercase(name) {
        return name.to_string();
    }

    let words: Vec<&str> = name.split_whitespace().collect();
    if words.len() == 1 && words[0].len() <= 5 {
        // Likely a ticker, e.g. "TSMC".
        return name.to_string();
    }

    let mut out = Vec::with_capacity(words.len());
    for (i, word) in words.iter().enumerate() {
        if UPPER_ALLOW_LIST.contains(word) || word.chars().any(|c| c.is_ascii_digit()) {
            out.push(word.to_string());
        } else if i > 0 && CONNECTIVES.contains(word) {
            out.push(word.to_lowercase());
        } else {
            let mut chars = word.chars();
            let cased = match chars.next() {
                Some(first) => first.to_string() + &chars.as_str().to_lowercase(),
                None => String::new(),
            };
            out.push(cased);
        }
    }
    out.join(" ")
}
