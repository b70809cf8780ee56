//! PMP SQL Agent
//!
//! Answers natural-language questions about a relational database:
//! - Intent routing (data, meta, off-topic and ambiguous questions)
//! - Schema retrieval over an embedding index, with keyword fallback
//! - SQL safety validation before anything reaches the database
//! - Bounded self-correction from validation and execution errors

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, instrument, warn};

use domain::catalog::SchemaCatalog;
use domain::embedding::EmbeddingProvider;
use domain::retrieval::RetrievalIndex;
use infrastructure::database::SqliteExecutor;
use infrastructure::embedding::EmbeddingProviderFactory;
use infrastructure::index::{load_examples, IndexBuilder, IndexFileStore, SchemaRetriever};
use infrastructure::llm::LlmProviderFactory;
use infrastructure::workflow::WorkflowOrchestrator;

/// Everything a front end needs to answer questions
pub struct Agent {
    pub orchestrator: Arc<WorkflowOrchestrator>,
    pub executor: Arc<SqliteExecutor>,
}

/// Open the database read-only and load its catalog
#[instrument(skip(config), fields(url = %config.database.url))]
pub async fn connect_database(config: &AppConfig) -> anyhow::Result<(Arc<SqliteExecutor>, SchemaCatalog)> {
    let executor = SqliteExecutor::connect(&config.database, config.agent.row_cap)
        .await
        .context("failed to open the database")?;
    let catalog = executor
        .load_catalog()
        .await
        .context("failed to load the database catalog")?;

    info!(tables = catalog.tables.len(), "Catalog loaded");

    Ok((Arc::new(executor), catalog))
}

/// Build the retrieval index from scratch and persist it
#[instrument(skip_all, fields(path = %config.index.path))]
pub async fn rebuild_index(
    config: &AppConfig,
    catalog: &SchemaCatalog,
    embedder: Arc<dyn EmbeddingProvider>,
) -> anyhow::Result<RetrievalIndex> {
    let examples = load_examples(&config.index.examples_path)
        .await
        .context("failed to load few-shot examples")?;

    let index = IndexBuilder::new(embedder)
        .build(catalog, &examples)
        .await
        .context("failed to build the retrieval index")?;

    IndexFileStore::new(&config.index.path)
        .save(&index)
        .await
        .context("failed to save the retrieval index")?;

    info!(
        elements = index.elements().len(),
        examples = index.examples().len(),
        model = index.model(),
        "Retrieval index rebuilt"
    );

    Ok(index)
}

/// Load the persisted index, rebuilding it when missing or stale if allowed.
///
/// Without a usable index and with `build_on_startup` off, lookups run on an empty index
/// and fall back to keyword matching.
pub async fn prepare_index(
    config: &AppConfig,
    catalog: &SchemaCatalog,
    embedder: Arc<dyn EmbeddingProvider>,
) -> anyhow::Result<RetrievalIndex> {
    let store = IndexFileStore::new(&config.index.path);
    let fingerprint = catalog.fingerprint();

    let stored = match store.load().await {
        Ok(stored) => stored,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable retrieval index");
            None
        }
    };

    match stored {
        Some(index) if index.matches(&fingerprint, embedder.model()) => {
            info!(elements = index.elements().len(), "Retrieval index loaded");
            Ok(index)
        }
        stored => {
            let reason = if stored.is_some() { "stale" } else { "missing" };

            if config.index.build_on_startup {
                info!(reason, "Building retrieval index");
                rebuild_index(config, catalog, embedder).await
            } else {
                warn!(reason, "Retrieval index unusable, running on keyword lookup only");
                Ok(RetrievalIndex::empty())
            }
        }
    }
}

/// Wire the collaborators together, in the order every front end needs them
pub async fn build_agent(config: &AppConfig) -> anyhow::Result<Agent> {
    let settings = config.agent_settings();

    let (executor, catalog) = connect_database(config).await?;
    let catalog = Arc::new(catalog);

    let llm = LlmProviderFactory::from_config(&config.llm).context("failed to create the LLM provider")?;
    let embedder = EmbeddingProviderFactory::from_config(&config.embedding)
        .context("failed to create the embedding provider")?;

    let index = prepare_index(config, &catalog, embedder.clone()).await?;
    let retriever = SchemaRetriever::new(
        Arc::new(index),
        embedder,
        catalog.clone(),
        settings.schema_top_k,
        settings.example_top_m,
    );

    info!(
        model = %settings.model,
        max_attempts = settings.attempt_budget(),
        row_cap = settings.row_cap,
        "Agent ready"
    );

    let orchestrator = WorkflowOrchestrator::new(llm, executor.clone(), retriever, catalog, settings);

    Ok(Agent {
        orchestrator: Arc::new(orchestrator),
        executor,
    })
}
