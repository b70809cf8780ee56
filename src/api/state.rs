//! Application state shared by the HTTP handlers

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::database::QueryExecutor;
use crate::infrastructure::workflow::WorkflowOrchestrator;
use crate::Agent;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<WorkflowOrchestrator>,
    pub database: Arc<dyn QueryExecutor>,
    /// Cancelled on server shutdown; every run gets a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(agent: Agent, shutdown: CancellationToken) -> Self {
        Self {
            orchestrator: agent.orchestrator,
            database: agent.executor,
            shutdown,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::domain::catalog::fixtures::chinook;
    use crate::domain::database::MockQueryExecutor;
    use crate::domain::llm::MockLlmProvider;
    use crate::domain::retrieval::RetrievalIndex;
    use crate::domain::workflow::AgentSettings;
    use crate::infrastructure::embedding::HashingEmbeddingProvider;
    use crate::infrastructure::index::SchemaRetriever;

    /// State over the sample catalog with an empty index, so lookups use keyword matching
    pub fn state(llm: MockLlmProvider, executor: MockQueryExecutor) -> AppState {
        let catalog = Arc::new(chinook());
        let settings = AgentSettings::default();
        let retriever = SchemaRetriever::new(
            Arc::new(RetrievalIndex::empty()),
            Arc::new(HashingEmbeddingProvider::new(64)),
            catalog.clone(),
            settings.schema_top_k,
            settings.example_top_m,
        );
        let executor: Arc<dyn QueryExecutor> = Arc::new(executor);

        AppState {
            orchestrator: Arc::new(WorkflowOrchestrator::new(
                Arc::new(llm),
                executor.clone(),
                retriever,
                catalog,
                settings,
            )),
            database: executor,
            shutdown: CancellationToken::new(),
        }
    }
}
