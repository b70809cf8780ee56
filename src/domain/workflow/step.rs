use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of workflow states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Understand,
    Reject,
    Meta,
    Clarify,
    SchemaLookup,
    Explore,
    Plan,
    Generate,
    Validate,
    Execute,
    Answer,
    Visualize,
    Fail,
    Done,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Understand => "understand",
            Self::Reject => "reject",
            Self::Meta => "meta",
            Self::Clarify => "clarify",
            Self::SchemaLookup => "schema_lookup",
            Self::Explore => "explore",
            Self::Plan => "plan",
            Self::Generate => "generate",
            Self::Validate => "validate",
            Self::Execute => "execute",
            Self::Answer => "answer",
            Self::Visualize => "visualize",
            Self::Fail => "fail",
            Self::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
