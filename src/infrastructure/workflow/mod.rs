//! Workflow orchestrator: executes the text-to-SQL steps and threads their state

mod orchestrator;
mod parsing;
mod prompts;

pub use orchestrator::WorkflowOrchestrator;
