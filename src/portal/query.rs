//! Search query construction for the WebLink repository.
//!
//! WebLink accepts a boolean query language over metadata fields. The
//! syntax is undocumented; the shapes below match what the portal's own
//! search UI submits.

/// Template fields the order search matches on.
const CASE_FIELD: &str = "Case Number";
const TYPE_FIELD: &str = "Document Type";

/// Document types that count as an order for harvesting purposes.
const ORDER_TYPES: &[&str] = &["Order", "Final Order", "Interim Order"];

/// Build the search command for pooling-order retrieval: case number
/// equality AND an alternation over order document types.
pub fn order_search_command(template: &str, case_number: &str) -> String {
    let type_clause = ORDER_TYPES
        .iter()
        .map(|t| format!("[{TYPE_FIELD}]=\"{t}\""))
        .collect::<Vec<_>>()
        .join(" | ");
    format!(
        "{{[{template}]:[{CASE_FIELD}]=\"{case}\" & ({type_clause})}}",
        case = escape_term(case_number),
    )
}

/// Escape a user-supplied term for embedding in a quoted query literal.
fn escape_term(term: &str) -> String {
    term.replace('"', "\"\"")
}
