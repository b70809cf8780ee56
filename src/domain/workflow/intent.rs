use serde::{Deserialize, Serialize};

/// What the question is asking for; decides the route out of UNDERSTAND
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    #[default]
    Normal,
    Meta,
    Irrelevant,
    Ambiguous,
}

impl Intent {
    /// Map a classifier label to an intent.
    ///
    /// Query-shape labels (aggregation, filtering, join, general) are all data questions.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().replace('_', "-").as_str() {
            "normal" | "general" | "aggregation" | "filtering" | "join" | "data" => Some(Self::Normal),
            "meta" | "meta-query" | "metadata" | "schema" => Some(Self::Meta),
            "irrelevant" | "off-topic" => Some(Self::Irrelevant),
            "ambiguous" | "unclear" => Some(Self::Ambiguous),
            _ => None,
        }
    }
}

/// Advisory difficulty estimate; gates planning and exploration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Complexity {
    Simple,
    #[default]
    Moderate,
    Complex,
}

impl Complexity {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "simple" | "easy" | "low" => Some(Self::Simple),
            "moderate" | "medium" => Some(Self::Moderate),
            "complex" | "hard" | "high" => Some(Self::Complex),
            _ => None,
        }
    }
}
