//! Transition table of the workflow.
//!
//! Every function here is pure: it reads the state and names the next step. Step
//! bodies live in the orchestrator.

use super::{Complexity, ExecutionOutcome, ExploreMode, Intent, Step, WorkflowState};
use crate::domain::validation::ValidationVerdict;

/// The single dispatch point after UNDERSTAND
pub fn after_understand(state: &WorkflowState) -> Step {
    match state.intent {
        Intent::Irrelevant => Step::Reject,
        Intent::Meta => Step::Meta,
        Intent::Ambiguous => Step::Clarify,
        Intent::Normal if !state.ambiguity.is_empty() => Step::Clarify,
        Intent::Normal => Step::SchemaLookup,
    }
}

pub fn after_schema_lookup(state: &WorkflowState, explore: ExploreMode) -> Step {
    let run_explore = match explore {
        ExploreMode::Never => false,
        ExploreMode::ComplexOnly => state.complexity == Complexity::Complex,
        ExploreMode::Always => true,
    };

    if run_explore { Step::Explore } else { Step::Plan }
}

pub fn after_validate(state: &WorkflowState, max_attempts: u32) -> Step {
    match &state.validation_result {
        Some(ValidationVerdict::Ok { .. }) => Step::Execute,
        _ => retry_or_fail(state, max_attempts),
    }
}

pub fn after_execute(state: &WorkflowState, max_attempts: u32) -> Step {
    match state.execution_result() {
        Some(ExecutionOutcome::Rows(_)) => Step::Answer,
        _ => retry_or_fail(state, max_attempts),
    }
}

/// A failed attempt loops back to GENERATE until the budget is spent
pub fn retry_or_fail(state: &WorkflowState, max_attempts: u32) -> Step {
    if state.attempt_count >= max_attempts {
        Step::Fail
    } else {
        Step::Generate
    }
}

/// Successor of steps with only one way out
pub fn next_fixed(step: Step) -> Option<Step> {
    match step {
        Step::Explore => Some(Step::Plan),
        Step::Plan => Some(Step::Generate),
        Step::Generate | Step::Meta => Some(Step::Validate),
        Step::Answer => Some(Step::Visualize),
        Step::Reject | Step::Clarify | Step::Visualize | Step::Fail | Step::Done => Some(Step::Done),
        Step::Understand | Step::SchemaLookup | Step::Validate | Step::Execute => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::database::{ExecutionError, QueryRows};
    use crate::domain::validation::RejectionReason;

    fn state_with(intent: Intent) -> WorkflowState {
        let mut state = WorkflowState::new("run", "q");
        state.intent = intent;
        state
    }

    #[test]
    fn test_understand_dispatch() {
        assert_eq!(after_understand(&state_with(Intent::Irrelevant)), Step::Reject);
        assert_eq!(after_understand(&state_with(Intent::Meta)), Step::Meta);
        assert_eq!(after_understand(&state_with(Intent::Ambiguous)), Step::Clarify);
        assert_eq!(after_understand(&state_with(Intent::Normal)), Step::SchemaLookup);

        let mut vague = state_with(Intent::Normal);
        vague.ambiguity.push("best".to_string());
        assert_eq!(after_understand(&vague), Step::Clarify);
    }

    #[test]
    fn test_explore_gating() {
        let mut state = state_with(Intent::Normal);
        state.complexity = Complexity::Moderate;
        assert_eq!(after_schema_lookup(&state, ExploreMode::ComplexOnly), Step::Plan);
        assert_eq!(after_schema_lookup(&state, ExploreMode::Always), Step::Explore);

        state.complexity = Complexity::Complex;
        assert_eq!(after_schema_lookup(&state, ExploreMode::ComplexOnly), Step::Explore);
        assert_eq!(after_schema_lookup(&state, ExploreMode::Never), Step::Plan);
    }

    #[test]
    fn test_rejection_retries_until_budget_spent() {
        let mut state = state_with(Intent::Normal);
        state.set_candidate_sql("DELETE FROM Track");
        state.validation_result = Some(ValidationVerdict::rejected(
            RejectionReason::WriteOperationForbidden,
            "DELETE",
        ));

        state.attempt_count = 1;
        assert_eq!(after_validate(&state, 3), Step::Generate);
        state.attempt_count = 3;
        assert_eq!(after_validate(&state, 3), Step::Fail);
    }

    #[test]
    fn test_execution_routes() {
        let mut state = state_with(Intent::Normal);
        state.set_candidate_sql("SELECT 1");
        state.validation_result = Some(ValidationVerdict::ok("SELECT 1 LIMIT 1000"));
        state.attempt_count = 1;

        state.set_execution_result(ExecutionOutcome::Error(ExecutionError::missing_object("no such column: x")));
        assert_eq!(after_execute(&state, 3), Step::Generate);

        state.set_execution_result(ExecutionOutcome::Rows(QueryRows::default()));
        assert_eq!(after_execute(&state, 3), Step::Answer);

        state.set_execution_result(ExecutionOutcome::Error(ExecutionError::other("boom")));
        state.attempt_count = 3;
        assert_eq!(after_execute(&state, 3), Step::Fail);
    }

    #[test]
    fn test_every_fixed_path_reaches_done() {
        for step in [
            Step::Reject,
            Step::Clarify,
            Step::Explore,
            Step::Plan,
            Step::Answer,
            Step::Fail,
        ] {
            let mut current = step;
            let mut hops = 0;
            while let Some(next) = next_fixed(current) {
                if current == Step::Done {
                    break;
                }
                current = next;
                hops += 1;
                assert!(hops < 10);
            }
            assert!(current == Step::Done || current == Step::Validate, "{step}");
        }
    }
}
