//! Index command - rebuild or inspect the persisted retrieval index

use std::process::ExitCode;

use anyhow::Context;
use clap::Subcommand;

use crate::config::AppConfig;
use crate::domain::retrieval::RetrievalIndex;
use crate::infrastructure::embedding::EmbeddingProviderFactory;
use crate::infrastructure::index::{IndexFileStore, INDEX_FORMAT_VERSION};

#[derive(Debug, Subcommand)]
pub enum IndexCommand {
    /// Embed the catalog and the few-shot examples and overwrite the index file
    Rebuild,

    /// Show whether the index file is present and current
    Status,
}

pub async fn run(command: IndexCommand, config: &AppConfig) -> anyhow::Result<ExitCode> {
    match command {
        IndexCommand::Rebuild => rebuild(config).await,
        IndexCommand::Status => status(config).await,
    }
}

async fn rebuild(config: &AppConfig) -> anyhow::Result<ExitCode> {
    let (_, catalog) = crate::connect_database(config).await?;
    let embedder = EmbeddingProviderFactory::from_config(&config.embedding)
        .context("failed to create the embedding provider")?;

    let index = crate::rebuild_index(config, &catalog, embedder).await?;

    println!(
        "Rebuilt {}: {} schema element(s), {} example(s), model {} ({} dimensions)",
        config.index.path,
        index.elements().len(),
        index.examples().len(),
        index.model(),
        index.dimensions()
    );

    Ok(ExitCode::SUCCESS)
}

async fn status(config: &AppConfig) -> anyhow::Result<ExitCode> {
    let store = IndexFileStore::new(&config.index.path);
    let index = match store.load().await.context("failed to read the retrieval index")? {
        Some(index) => index,
        None => {
            println!(
                "No index at {}. Run `pmp-sql-agent index rebuild` to create it.",
                config.index.path
            );
            return Ok(ExitCode::SUCCESS);
        }
    };

    let (_, catalog) = crate::connect_database(config).await?;
    let embedder = EmbeddingProviderFactory::from_config(&config.embedding)
        .context("failed to create the embedding provider")?;
    let current = index.matches(&catalog.fingerprint(), embedder.model());

    print!("{}", describe(&config.index.path, &index, current));
    Ok(ExitCode::SUCCESS)
}

fn describe(path: &str, index: &RetrievalIndex, current: bool) -> String {
    format!(
        "Index:       {}\nFormat:      v{}\nModel:       {} ({} dimensions)\nElements:    {}\nExamples:    {}\nFingerprint: {}\nStatus:      {}\n",
        path,
        INDEX_FORMAT_VERSION,
        index.model(),
        index.dimensions(),
        index.elements().len(),
        index.examples().len(),
        index.catalog_fingerprint(),
        if current {
            "current"
        } else {
            "stale (catalog or embedding model changed, run `index rebuild`)"
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_marks_stale_index() {
        let index = RetrievalIndex::new("hashing-v1-64", 64, "abc123", Vec::new(), Vec::new());

        let text = describe("data/index.json", &index, false);
        assert!(text.contains("Model:       hashing-v1-64 (64 dimensions)"));
        assert!(text.contains("Fingerprint: abc123"));
        assert!(text.contains("Status:      stale"));

        assert!(describe("data/index.json", &index, true).contains("Status:      current"));
    }
}
