//! Case number normalization.
//!
//! Case numbers arrive in slightly different shapes depending on who typed
//! them: `CD 2025-002808`, `cd2025-002808`, `CD  2025-002808 `. The
//! duplicate-submission guard matches on a normalized form so a case
//! submitted by hand is still recognized when the sweep reaches it.

use std::sync::OnceLock;

use regex::Regex;

/// Shape of a docket case number after normalization: an alphabetic
/// docket prefix, a four-digit year, and a serial, e.g. `CD 2025-002808`.
fn case_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z]{1,4} \d{4}-\d{4,8}$").unwrap())
}

/// A case number typed without the separating space, `CD2025-002808`.
fn squashed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Z]{1,4})(\d{4}-\d{4,8})$").unwrap())
}

/// Whether a string looks like a docket case number once normalized.
/// Entry points use this to reject typos before they become tracked
/// rows that retry for weeks.
pub fn is_case_number(raw: &str) -> bool {
    case_number_pattern().is_match(&normalize_case_number(raw))
}

/// Normalize a case number for comparison and lookups.
///
/// Uppercases, trims, and collapses internal whitespace to a single
/// space. A space-free spelling like `cd2025-002808` gets the separator
/// restored, so both spellings of a case share one canonical key.
pub fn normalize_case_number(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        for up in ch.to_uppercase() {
            out.push(up);
        }
    }
    if let Some(caps) = squashed_pattern().captures(&out) {
        out = format!("{} {}", &caps[1], &caps[2]);
    }
    out
}
