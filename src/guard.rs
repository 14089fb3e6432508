//! Guard layer around the planner
//!
//! - `guard_input` runs before any statement reaches the executor and only
//!   lets `SELECT` through.
//! - `guard_output` runs on the final answer and replaces the whole text with
//!   [`REFUSAL_MESSAGE`] when a mutation keyword appears anywhere in it, even in
//!   plain prose. False positives are accepted.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::{AgentError, AgentResult};

/// Text returned instead of an answer that mentions a mutation keyword
pub const REFUSAL_MESSAGE: &str =
    "Blocked a disallowed operation. Only SELECT queries are permitted.";

static MUTATION_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(insert|update|delete|drop|alter)\b").expect("static regex is valid")
});

/// Check that a statement is a read query.
///
/// Leading whitespace is ignored and the keyword match is case-insensitive.
pub fn guard_input(sql: &str) -> AgentResult<&str> {
    let trimmed = sql.trim_start();
    let is_select = trimmed
        .get(..6)
        .map(|prefix| prefix.eq_ignore_ascii_case("select"))
        .unwrap_or(false);

    if is_select {
        Ok(sql)
    } else {
        tracing::warn!("[Guard] Rejected non-SELECT statement");
        Err(AgentError::NotAReadQuery)
    }
}

/// Find the first mutation keyword in a piece of text
pub fn check_output(text: &str) -> AgentResult<()> {
    match MUTATION_KEYWORDS.find(text) {
        Some(found) => Err(AgentError::MutationLeakDetected(
            found.as_str().to_lowercase(),
        )),
        None => Ok(()),
    }
}

/// Return the answer unchanged, or the refusal text if it mentions a mutation keyword
pub fn guard_output(text: String) -> String {
    match check_output(&text) {
        Ok(()) => text,
        Err(e) => {
            tracing::warn!("[Guard] {}; answer replaced with refusal", e);
            REFUSAL_MESSAGE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_input_accepts_select() {
        assert!(guard_input("SELECT 1").is_ok());
        assert!(guard_input("   select count(*) from core_agent").is_ok());
        assert!(guard_input("\n\tSeLeCt name FROM core_indicator").is_ok());
    }

    #[test]
    fn test_guard_input_rejects_everything_else() {
        for sql in [
            "DROP TABLE core_agent;",
            "delete from core_agent",
            "  UPDATE core_agent SET active = 0",
            "insert into core_agent values (1)",
            "WITH x AS (SELECT 1) SELECT * FROM x",
            "sel",
            "",
            "   ",
            "EXPLAIN SELECT 1",
        ] {
            assert!(
                matches!(guard_input(sql), Err(AgentError::NotAReadQuery)),
                "should reject: {sql:?}"
            );
        }
    }

    #[test]
    fn test_guard_input_handles_multibyte_prefix() {
        assert!(guard_input("¿SELECT?").is_err());
        assert!(guard_input("ñ").is_err());
    }

    #[test]
    fn test_guard_output_passes_clean_answers() {
        let answer = "Hay 2 agentes en Lima.".to_string();
        assert_eq!(guard_output(answer.clone()), answer);
    }

    #[test]
    fn test_guard_output_refuses_mutation_keywords() {
        for text in [
            "DELETE FROM core_agent",
            "You could run an update later",
            "I will not Drop anything",
            "insert",
            "ALTER table",
        ] {
            assert_eq!(guard_output(text.to_string()), REFUSAL_MESSAGE);
        }
    }

    #[test]
    fn test_guard_output_matches_whole_words_only() {
        let text = "The updated totals were dropped into the inserts report".to_string();
        assert_eq!(guard_output(text.clone()), text);
    }

    #[test]
    fn test_check_output_reports_keyword() {
        match check_output("please Update the row") {
            Err(AgentError::MutationLeakDetected(word)) => assert_eq!(word, "update"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
