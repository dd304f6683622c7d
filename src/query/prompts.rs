//! Prompt contracts for the two generation calls.

use crate::mirror::Row;

/// Reply meaning "this question cannot be answered from the schema".
pub const INVALID_SENTINEL: &str = "INVALID";

pub const NO_DATA_MESSAGE: &str = "Data is unavailable for this question.";

pub const UNANSWERABLE_MESSAGE: &str =
    "This question cannot be answered from the store's orders, products and inventory.";

/// First call: question to a single SQLite SELECT, or the sentinel.
pub fn sql_prompt(schema_description: &str, question: &str) -> String {
    format!(
        "You are an analytics assistant. You must refer to the database schema below \
and adhere to the rules based on the given question.

{schema_description}

Rules:
- Generate ONLY valid SQLite SQL
- SELECT queries only
- Use only the tables and columns provided
- Do NOT explain the query
- Do NOT include markdown
- Do NOT include comments
- If the question cannot be answered, return: {INVALID_SENTINEL}
- use 'inventory_totals' to access inventory levels
- if you are asked about product types, refer to products.title

Question: {question}
"
    )
}

/// Second call: executed query plus its rows back to prose.
pub fn answer_prompt(question: &str, sql: &str, rows: &[Row]) -> String {
    let rows_json = serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You are an analytics assistant.

User question:
{question}

SQL that was executed:
{sql}

Query result (JSON):
{rows_json}

Rules:
- Use ONLY the data in the result.
- Do NOT invent numbers.
- Respond in plain English. The answer must be simple and to the point.
"
    )
}

/// Remove a surrounding markdown code fence (with or without a language tag).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);

    let body = match inner.split_once('\n') {
        Some((tag, rest)) if is_language_tag(tag.trim()) => rest,
        _ => inner,
    };
    body.trim()
}

fn is_language_tag(tag: &str) -> bool {
    tag.chars().all(|c| c.is_ascii_alphanumeric()) && !tag.eq_ignore_ascii_case("select")
}
