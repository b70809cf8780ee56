use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::domain::catalog::{SchemaCatalog, SchemaElement};
use crate::domain::embedding::EmbeddingProvider;
use crate::domain::retrieval::{Example, RetrievalError, RetrievalIndex, RetrievalResult};
use crate::infrastructure::embedding::tokenize;

/// Where the schema context of a run came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupSource {
    Index,
    Keyword,
    FullCatalog,
}

impl LookupSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Keyword => "keyword",
            Self::FullCatalog => "full_catalog",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemaLookup {
    pub elements: Vec<SchemaElement>,
    pub examples: Vec<Example>,
    pub source: LookupSource,
    /// Set when the index could not be used and a fallback was taken
    pub degraded: Option<RetrievalError>,
}

/// Schema lookup over an immutable [`RetrievalIndex`].
///
/// Never fails: embedding or search errors degrade to a keyword match on table names,
/// and when nothing matches the whole catalog is used.
#[derive(Debug, Clone)]
pub struct SchemaRetriever {
    index: Arc<RetrievalIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    catalog: Arc<SchemaCatalog>,
    top_k: usize,
    top_m: usize,
}

impl SchemaRetriever {
    pub fn new(
        index: Arc<RetrievalIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        catalog: Arc<SchemaCatalog>,
        top_k: usize,
        top_m: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            catalog,
            top_k,
            top_m,
        }
    }

    pub fn index(&self) -> &RetrievalIndex {
        &self.index
    }

    /// Embeds `query` and returns its nearest neighbours
    pub async fn search(&self, query: &str) -> Result<RetrievalResult, RetrievalError> {
        if self.index.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let vector = self
            .embedder
            .embed_text(query)
            .await
            .map_err(|e| RetrievalError::embedding_unavailable(e.to_string()))?;

        self.index.search(&vector, self.top_k, self.top_m)
    }

    #[instrument(skip(self, entities), fields(entities = entities.len()))]
    pub async fn lookup(&self, question: &str, entities: &[String]) -> SchemaLookup {
        let query = query_text(question, entities);

        match self.search(&query).await {
            Ok(result) if !result.elements.is_empty() => {
                let examples = result.examples.into_iter().map(|s| s.item).collect();
                let elements = self.with_owning_tables(
                    result.elements.into_iter().map(|s| s.item).collect(),
                );

                debug!(elements = elements.len(), "Schema retrieved from index");
                SchemaLookup {
                    elements,
                    examples,
                    source: LookupSource::Index,
                    degraded: None,
                }
            }
            Ok(result) => {
                let examples = result.examples.into_iter().map(|s| s.item).collect();
                let mut lookup = self.keyword_lookup(question, entities, None);
                lookup.examples = examples;
                lookup
            }
            Err(error) => {
                warn!(error = %error, "Retrieval failed, falling back to keyword match");
                self.keyword_lookup(question, entities, Some(error))
            }
        }
    }

    /// Tables named in the question or entities, or the whole catalog when none are
    pub fn keyword_lookup(
        &self,
        question: &str,
        entities: &[String],
        degraded: Option<RetrievalError>,
    ) -> SchemaLookup {
        let words: HashSet<String> = tokenize(&query_text(question, entities)).into_iter().collect();

        let matched: Vec<SchemaElement> = self
            .catalog
            .tables
            .iter()
            .filter(|table| {
                let parts = tokenize(&table.name);
                !parts.is_empty() && parts.iter().all(|p| words.contains(p))
            })
            .map(SchemaElement::table)
            .collect();

        if matched.is_empty() {
            SchemaLookup {
                elements: self.catalog.tables.iter().map(SchemaElement::table).collect(),
                examples: Vec::new(),
                source: LookupSource::FullCatalog,
                degraded,
            }
        } else {
            SchemaLookup {
                elements: matched,
                examples: Vec::new(),
                source: LookupSource::Keyword,
                degraded,
            }
        }
    }

    /// Drops stored vectors and appends the owning table of every retrieved column
    fn with_owning_tables(&self, elements: Vec<SchemaElement>) -> Vec<SchemaElement> {
        let mut out: Vec<SchemaElement> = Vec::with_capacity(elements.len());

        let owners: Vec<String> = elements
            .iter()
            .filter(|e| !e.is_table())
            .map(|e| e.table.clone())
            .collect();

        for element in elements {
            out.push(element.with_embedding(Vec::new()));
        }

        for owner in owners {
            let id = format!("table:{}", owner);
            if out.iter().any(|e| e.id == id) {
                continue;
            }
            if let Some(table) = self.catalog.table(&owner) {
                out.push(SchemaElement::table(table));
            }
        }

        out
    }
}

fn query_text(question: &str, entities: &[String]) -> String {
    if entities.is_empty() {
        question.to_string()
    } else {
        format!("{} {}", question, entities.join(" "))
    }
}
