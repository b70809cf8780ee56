use serde::{Deserialize, Serialize};

use super::{Example, RetrievalError};
use crate::domain::catalog::SchemaElement;
use crate::domain::embedding::cosine_similarity;

/// An item paired with its similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scored<T> {
    pub item: T,
    pub score: f32,
}

/// Top-k schema elements and top-m examples, each ranked by similarity descending
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub elements: Vec<Scored<SchemaElement>>,
    pub examples: Vec<Scored<Example>>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.examples.is_empty()
    }
}

/// Immutable embedding index over one catalog and one example set.
///
/// Built wholesale by the index builder and never patched; safe to share across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalIndex {
    model: String,
    dimensions: usize,
    catalog_fingerprint: String,
    elements: Vec<SchemaElement>,
    examples: Vec<Example>,
}

impl RetrievalIndex {
    pub fn new(
        model: impl Into<String>,
        dimensions: usize,
        catalog_fingerprint: impl Into<String>,
        elements: Vec<SchemaElement>,
        examples: Vec<Example>,
    ) -> Self {
        Self {
            model: model.into(),
            dimensions,
            catalog_fingerprint: catalog_fingerprint.into(),
            elements,
            examples,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.examples.is_empty()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn catalog_fingerprint(&self) -> &str {
        &self.catalog_fingerprint
    }

    pub fn elements(&self) -> &[SchemaElement] {
        &self.elements
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    /// True when the index was built from this catalog with this embedding model
    pub fn matches(&self, catalog_fingerprint: &str, model: &str) -> bool {
        !self.is_empty() && self.catalog_fingerprint == catalog_fingerprint && self.model == model
    }

    /// Nearest neighbours of `query` by cosine similarity.
    ///
    /// Ties keep insertion order, so identical queries against an unchanged index
    /// always produce the same ranking. An empty index yields an empty result.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        top_m: usize,
    ) -> Result<RetrievalResult, RetrievalError> {
        if self.is_empty() {
            return Ok(RetrievalResult::default());
        }

        if query.is_empty() {
            return Err(RetrievalError::EmptyEmbedding);
        }

        if query.len() != self.dimensions {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        Ok(RetrievalResult {
            elements: rank(&self.elements, |e| &e.embedding, query, top_k),
            examples: rank(&self.examples, |e| &e.embedding, query, top_m),
        })
    }
}

fn rank<T: Clone>(
    items: &[T],
    vector: impl Fn(&T) -> &Vec<f32>,
    query: &[f32],
    limit: usize,
) -> Vec<Scored<T>> {
    let mut scored: Vec<(usize, f32)> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (i, cosine_similarity(vector(item), query)))
        .collect();

    // stable: equal scores stay in insertion order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    scored
        .into_iter()
        .take(limit)
        .map(|(i, score)| Scored {
            item: items[i].clone(),
            score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::fixtures::chinook;

    fn axis(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    fn small_index() -> RetrievalIndex {
        let catalog = chinook();
        let elements: Vec<SchemaElement> = catalog
            .elements()
            .into_iter()
            .take(5)
            .enumerate()
            .map(|(i, e)| e.with_embedding(axis(4, i % 4)))
            .collect();
        let examples = vec![
            Example::new("How many albums?", "SELECT COUNT(*) FROM Album").with_embedding(axis(4, 0)),
            Example::new("List artists", "SELECT Name FROM Artist").with_embedding(axis(4, 3)),
        ];

        RetrievalIndex::new("test", 4, catalog.fingerprint(), elements, examples)
    }

    #[test]
    fn test_empty_index_returns_empty_result() {
        let index = RetrievalIndex::empty();
        let result = index.search(&[0.1, 0.2], 5, 3).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_ranked_descending_with_ties_in_insertion_order() {
        let index = small_index();
        let result = index.search(&axis(4, 0), 3, 1).unwrap();

        // elements 0 and 4 share the same axis; 0 wins the tie
        assert_eq!(result.elements[0].item.id, "table:Album");
        assert_eq!(result.elements[1].item.id, "table:Artist");
        assert!(result.elements[0].score >= result.elements[2].score);
        assert_eq!(result.examples.len(), 1);
        assert_eq!(result.examples[0].item.sql, "SELECT COUNT(*) FROM Album");
    }

    #[test]
    fn test_search_is_deterministic() {
        let index = small_index();
        let query = vec![0.3, 0.1, 0.1, 0.3];

        let first = index.search(&query, 4, 2).unwrap();
        for _ in 0..5 {
            assert_eq!(index.search(&query, 4, 2).unwrap(), first);
        }
    }

    #[test]
    fn test_dimension_mismatch_is_typed() {
        let index = small_index();
        let err = index.search(&[1.0, 0.0], 3, 1).unwrap_err();
        assert_eq!(
            err,
            RetrievalError::DimensionMismatch {
                expected: 4,
                actual: 2
            }
        );
        assert_eq!(index.search(&[], 3, 1).unwrap_err(), RetrievalError::EmptyEmbedding);
    }

    #[test]
    fn test_matches_fingerprint_and_model() {
        let index = small_index();
        let fingerprint = chinook().fingerprint();
        assert!(index.matches(&fingerprint, "test"));
        assert!(!index.matches(&fingerprint, "other-model"));
        assert!(!RetrievalIndex::empty().matches("", ""));
    }
}
