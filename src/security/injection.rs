//! Injection pattern screening for inbound request material
//!
//! Heuristic blocklist over headers, query parameters and body text. A match
//! rejects the request outright with a generic error; the matched value is
//! counted and logged by kind but never echoed back.

use regex::RegexSet;
use std::sync::OnceLock;

/// Markup and script fragments that have no business in request metadata
const XSS_PATTERNS: &[&str] = &[
    "<script",
    "javascript:",
    "onload=",
    "onerror=",
    "onclick=",
    "onmouseover=",
    "<iframe",
    "<object",
    "<embed",
    "<link",
    "<meta",
    "<style",
    "expression(",
    "url(",
    "@import",
];

/// Encoded spellings of `<script` that survive naive filters
const ENCODED_XSS_PATTERNS: &[&str] = &[
    "%3cscript",
    "%3c%73%63%72%69%70%74",
    "&lt;script",
    "&#60;script",
];

fn sql_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"(?i)union\s+select",
            r"(?i)drop\s+table",
            r"(?i)delete\s+from",
            r"(?i)insert\s+into",
            r"(?i)update\s+.+set",
            r"(?i)or\s+1\s*=\s*1",
            r"(?i)and\s+1\s*=\s*1",
            r"(?i)'.*or.*'.*=.*'",
            r"(?i)exec\s*\(",
            r"(?i)script\s*\(",
        ])
        .expect("injection patterns are static and valid")
    })
}

/// Check a value for XSS markers, including common encoded spellings
pub fn contains_xss_patterns(input: &str) -> bool {
    if input.is_empty() {
        return false;
    }
    let lower = input.to_lowercase();
    XSS_PATTERNS.iter().any(|p| lower.contains(p))
        || ENCODED_XSS_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Check a value for SQL injection markers
pub fn contains_sql_injection(input: &str) -> bool {
    if input.is_empty() {
        return false;
    }
    sql_patterns().is_match(input)
}
