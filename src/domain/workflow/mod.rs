//! Text-to-SQL workflow: a closed set of steps, the state they thread, and the
//! pure routing between them

mod chart;
mod error;
mod intent;
mod meta;
mod outcome;
pub mod routing;
mod settings;
mod state;
mod step;
mod trace;

pub use chart::{plan_chart, ChartKind, ChartSpec};
pub use error::RunFailure;
pub use intent::{Complexity, Intent};
pub use meta::MetaQuery;
pub use outcome::{RunOutcome, RunResult};
pub use settings::{AgentSettings, ExploreMode, MAX_ATTEMPTS_CEILING};
pub use state::{AttemptFailure, ExecutionOutcome, ExplorationFinding, FailureStage, WorkflowState};
pub use step::Step;
pub use trace::TraceEntry;
