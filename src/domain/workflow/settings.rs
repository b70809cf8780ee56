use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed retry ceiling; configuration may lower it but never raise it
pub const MAX_ATTEMPTS_CEILING: u32 = 3;

/// When the EXPLORE step runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExploreMode {
    Never,
    #[default]
    ComplexOnly,
    Always,
}

/// Everything a run needs to know, resolved once from configuration
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub temperature: f32,
    pub max_attempts: u32,
    pub row_cap: u64,
    pub schema_top_k: usize,
    pub example_top_m: usize,
    pub explore: ExploreMode,
    pub max_explore_probes: usize,
    pub step_timeout: Duration,
    pub chart_max_rows: usize,
    pub answer_preview_rows: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            max_attempts: MAX_ATTEMPTS_CEILING,
            row_cap: 1000,
            schema_top_k: 6,
            example_top_m: 3,
            explore: ExploreMode::ComplexOnly,
            max_explore_probes: 4,
            step_timeout: Duration::from_millis(30_000),
            chart_max_rows: 50,
            answer_preview_rows: 5,
        }
    }
}

impl AgentSettings {
    /// Retry budget clamped to `1..=MAX_ATTEMPTS_CEILING`
    pub fn attempt_budget(&self) -> u32 {
        self.max_attempts.clamp(1, MAX_ATTEMPTS_CEILING)
    }
}
