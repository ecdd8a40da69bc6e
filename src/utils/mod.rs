//! Shared helpers for payload validation and identifier handling.

pub mod case;
pub mod pdf;

pub use case::{is_case_number, normalize_case_number};
pub use pdf::{detect_content_type, is_pdf};

/// Sanitize a string for use as a filename component.
///
/// Replaces path separators and other problem characters with underscores
/// and collapses runs of them.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_replaced = false;
    for ch in name.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' => {
                out.push(ch);
                last_replaced = false;
            }
            _ => {
                if !last_replaced && !out.is_empty() {
                    out.push('_');
                }
                last_replaced = true;
            }
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}
