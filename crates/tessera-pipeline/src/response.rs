//! Extract candidate statements from a completion.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::LlmError;

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*(?:sql|SQL)?[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
});

/// Candidate statements in the order they appear in `text`.
///
/// Fenced blocks win; without any, the whole trimmed text is the only
/// candidate. Empty blocks are skipped.
pub fn parse_candidates(text: &str) -> Result<Vec<String>, LlmError> {
    let fenced: Vec<String> = FENCE
        .captures_iter(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|sql| !sql.is_empty())
        .collect();
    if !fenced.is_empty() {
        return Ok(fenced);
    }

    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with("```") {
        return Err(LlmError::EmptyResponse);
    }
    Ok(vec![trimmed.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_is_single_candidate() {
        assert_eq!(
            parse_candidates("  SELECT 1;\n").unwrap(),
            vec!["SELECT 1;".to_string()]
        );
    }

    #[test]
    fn test_sql_fences_in_order() {
        let text = "Here you go:\n```sql\nSELECT a FROM t\n```\nor\n```\nSELECT b FROM t\n```";
        assert_eq!(
            parse_candidates(text).unwrap(),
            vec!["SELECT a FROM t".to_string(), "SELECT b FROM t".to_string()]
        );
    }

    #[test]
    fn test_empty_response() {
        assert!(matches!(parse_candidates("   "), Err(LlmError::EmptyResponse)));
        assert!(matches!(
            parse_candidates("```sql\n```"),
            Err(LlmError::EmptyResponse)
        ));
    }
}
