//! Tolerant readers for LLM output

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::domain::workflow::{Complexity, Intent};

/// First fenced block anywhere in a reply; a language tag counts only on its own line
static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:[A-Za-z0-9_+-]*[ \t]*\n)?(.*?)```").expect("fenced block pattern"));

static SQL_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^sql\s*:\s*").expect("sql label pattern"));

#[derive(Debug, Clone, PartialEq)]
pub struct Understanding {
    pub intent: Intent,
    pub complexity: Complexity,
    pub entities: Vec<String>,
    pub ambiguity: Vec<String>,
}

/// Removes a surrounding markdown code fence (with or without a language tag)
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // drop the language tag line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Reads the classifier reply. Errors describe why the reply could not be used.
pub fn parse_understanding(text: &str) -> Result<Understanding, String> {
    let body = strip_code_fences(text);

    // tolerate prose around the object
    let json = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => return Err(format!("no JSON object in reply: {}", clip(body))),
    };

    let value: Value =
        serde_json::from_str(json).map_err(|e| format!("invalid JSON ({}): {}", e, clip(json)))?;

    let label = value
        .get("intent")
        .and_then(Value::as_str)
        .ok_or_else(|| "reply has no intent".to_string())?;

    let intent =
        Intent::from_label(label).ok_or_else(|| format!("unknown intent label '{}'", label))?;

    let complexity = value
        .get("complexity")
        .and_then(Value::as_str)
        .and_then(Complexity::from_label)
        .unwrap_or_default();

    Ok(Understanding {
        intent,
        complexity,
        entities: string_list(value.get("entities")),
        ambiguity: string_list(value.get("ambiguity")),
    })
}

/// SQL text from a generation reply, which may wrap it in prose or a fenced block
pub fn extract_sql(text: &str) -> String {
    let body = FENCED_BLOCK
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map_or(text, |block| block.as_str())
        .trim();

    SQL_LABEL.replace(body, "").trim().to_string()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn clip(text: &str) -> String {
    if text.chars().count() > 120 {
        format!("{}...", text.chars().take(120).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```sql\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(strip_code_fences("```\nSELECT 1\n```\n"), "SELECT 1");
        assert_eq!(strip_code_fences("  SELECT 1  "), "SELECT 1");
    }

    #[test]
    fn test_parse_understanding_maps_labels() {
        let parsed = parse_understanding(
            r#"```json
{"intent": "aggregation", "complexity": "complex", "entities": ["artist", "album"], "ambiguity": []}
```"#,
        )
        .unwrap();

        assert_eq!(parsed.intent, Intent::Normal);
        assert_eq!(parsed.complexity, Complexity::Complex);
        assert_eq!(parsed.entities, vec!["artist", "album"]);
        assert!(parsed.ambiguity.is_empty());
    }

    #[test]
    fn test_parse_understanding_tolerates_prose_and_missing_fields() {
        let parsed =
            parse_understanding(r#"Sure! {"intent": "meta-query"} Hope that helps."#).unwrap();

        assert_eq!(parsed.intent, Intent::Meta);
        assert_eq!(parsed.complexity, Complexity::Moderate);
        assert!(parsed.entities.is_empty());
    }

    #[test]
    fn test_parse_understanding_errors() {
        assert!(parse_understanding("I think this is about sales").is_err());
        assert!(parse_understanding(r#"{"complexity": "simple"}"#).is_err());

        let err = parse_understanding(r#"{"intent": "sarcasm"}"#).unwrap_err();
        assert!(err.contains("sarcasm"));
    }

    #[test]
    fn test_extract_sql() {
        assert_eq!(
            extract_sql("```sql\nSELECT Name FROM Artist;\n```"),
            "SELECT Name FROM Artist;"
        );
        assert_eq!(extract_sql("SQL: SELECT 1"), "SELECT 1");
        assert_eq!(extract_sql("sql : SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_extract_sql_from_prose() {
        let reply = "Here is the corrected query:\n```sqlite\nSELECT Name\nFROM Genre\n```\nIt lists every genre.";
        assert_eq!(extract_sql(reply), "SELECT Name\nFROM Genre");

        assert_eq!(extract_sql("```SELECT 1```"), "SELECT 1");
    }
}
