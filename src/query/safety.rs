//! Lexical admission check for generated SQL.
//!
//! This is not a parser. A query passes when, after trimming and
//! lowercasing, it starts with `select` and none of the forbidden keywords
//! appears anywhere as a whole word (comments and string literals included).
//! Statement stacking is only caught through that keyword scan.

use lazy_static::lazy_static;
use regex::Regex;

pub const FORBIDDEN_KEYWORDS: &[&str] = &["insert", "update", "delete", "drop", "alter", "pragma"];

lazy_static! {
    static ref FORBIDDEN: Regex = Regex::new(&format!(r"\b({})\b", FORBIDDEN_KEYWORDS.join("|")))
        .expect("Failed to compile forbidden keyword pattern");
}

/// Whether `sql` may be executed against the mirror.
pub fn is_safe(sql: &str) -> bool {
    let normalized = sql.trim().to_lowercase();
    normalized.starts_with("select") && !FORBIDDEN.is_match(&normalized)
}
