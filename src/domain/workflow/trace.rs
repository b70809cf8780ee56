use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Step;

/// Summaries longer than this are cut so traces stay readable
const MAX_SUMMARY_CHARS: usize = 500;

/// One transparent record of a step taken during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step: Step,
    pub input_summary: String,
    pub output_summary: String,
    pub timestamp: DateTime<Utc>,
}

impl TraceEntry {
    pub fn new(step: Step, input_summary: impl Into<String>, output_summary: impl Into<String>) -> Self {
        Self {
            step,
            input_summary: clip(input_summary.into()),
            output_summary: clip(output_summary.into()),
            timestamp: Utc::now(),
        }
    }
}

fn clip(text: String) -> String {
    if text.chars().count() <= MAX_SUMMARY_CHARS {
        return text;
    }
    let mut clipped: String = text.chars().take(MAX_SUMMARY_CHARS).collect();
    clipped.push_str("...");
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_summaries_are_clipped() {
        let entry = TraceEntry::new(Step::Generate, "x".repeat(600), "SELECT 1");
        assert_eq!(entry.input_summary.chars().count(), MAX_SUMMARY_CHARS + 3);
        assert_eq!(entry.output_summary, "SELECT 1");
    }
}
