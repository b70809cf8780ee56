use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::IndexError;
use crate::domain::retrieval::{Example, RetrievalIndex};

pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct IndexFileRef<'a> {
    format_version: u32,
    #[serde(flatten)]
    index: &'a RetrievalIndex,
}

#[derive(Deserialize)]
struct IndexFile {
    format_version: u32,
    #[serde(flatten)]
    index: RetrievalIndex,
}

/// JSON file holding one [`RetrievalIndex`].
///
/// Saving always overwrites the whole file through a temporary sibling, so a reader
/// never sees a half-written index.
#[derive(Debug, Clone)]
pub struct IndexFileStore {
    path: PathBuf,
}

impl IndexFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// `None` when no index has been written yet
    pub async fn load(&self) -> Result<Option<RetrievalIndex>, IndexError> {
        let shown = self.path.display().to_string();

        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(IndexError::io(shown, e)),
        };

        let file: IndexFile =
            serde_json::from_slice(&bytes).map_err(|e| IndexError::format(&shown, e))?;

        if file.format_version != INDEX_FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion {
                found: file.format_version,
                expected: INDEX_FORMAT_VERSION,
            });
        }

        Ok(Some(file.index))
    }

    pub async fn save(&self, index: &RetrievalIndex) -> Result<(), IndexError> {
        let shown = self.path.display().to_string();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IndexError::io(&shown, e))?;
        }

        let mut bytes = serde_json::to_vec_pretty(&IndexFileRef {
            format_version: INDEX_FORMAT_VERSION,
            index,
        })
        .map_err(|e| IndexError::format(&shown, e))?;
        bytes.push(b'\n');

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| IndexError::io(tmp.display().to_string(), e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| IndexError::io(&shown, e))?;

        info!(path = %shown, elements = index.elements().len(), "Saved retrieval index");
        Ok(())
    }
}

/// Few-shot examples from a JSON array of `{question, sql}` objects.
///
/// A missing file yields no examples.
pub async fn load_examples(path: impl AsRef<Path>) -> Result<Vec<Example>, IndexError> {
    let path = path.as_ref();
    let shown = path.display().to_string();

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %shown, "Examples file not found, continuing without few-shot examples");
            return Ok(Vec::new());
        }
        Err(e) => return Err(IndexError::io(shown, e)),
    };

    let examples: Vec<Example> =
        serde_json::from_slice(&bytes).map_err(|e| IndexError::format(&shown, e))?;

    Ok(examples
        .into_iter()
        .map(|e| Example::new(e.question, e.sql))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::fixtures::chinook;
    use crate::infrastructure::embedding::HashingEmbeddingProvider;
    use crate::infrastructure::index::IndexBuilder;
    use std::sync::Arc;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("pmp-sql-agent-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    async fn build() -> RetrievalIndex {
        IndexBuilder::new(Arc::new(HashingEmbeddingProvider::new(32)))
            .build(&chinook(), &[Example::new("How many albums?", "SELECT COUNT(*) FROM Album")])
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_loads_as_none() {
        let store = IndexFileStore::new(temp_path("index.json"));
        assert!(store.load().await.unwrap().is_none());
        assert!(!store.exists().await);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = IndexFileStore::new(temp_path("index.json"));
        let index = build().await;

        store.save(&index).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();

        assert_eq!(loaded.model(), index.model());
        assert_eq!(loaded.catalog_fingerprint(), index.catalog_fingerprint());
        assert_eq!(loaded.elements().len(), index.elements().len());
        assert_eq!(loaded.examples()[0].question, "How many albums?");
        let (a, b) = (&loaded.elements()[0].embedding, &index.elements()[0].embedding);
        assert!(a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-6));
    }

    #[tokio::test]
    async fn test_rebuild_writes_identical_file() {
        let store = IndexFileStore::new(temp_path("index.json"));

        store.save(&build().await).await.unwrap();
        let first = tokio::fs::read(store.path()).await.unwrap();
        store.save(&build().await).await.unwrap();
        let second = tokio::fs::read(store.path()).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unsupported_version_rejected() {
        let path = temp_path("index.json");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(
            &path,
            r#"{"format_version": 99, "model": "m", "dimensions": 2, "catalog_fingerprint": "f", "elements": [], "examples": []}"#,
        )
        .await
        .unwrap();

        let err = IndexFileStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedVersion { found: 99, .. }));
    }

    #[tokio::test]
    async fn test_load_examples() {
        let path = temp_path("examples.json");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(
            &path,
            r#"[{"question": "How many customers are there?", "sql": "SELECT COUNT(*) FROM Customer"}]"#,
        )
        .await
        .unwrap();

        let examples = load_examples(&path).await.unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].sql, "SELECT COUNT(*) FROM Customer");

        assert!(load_examples(temp_path("missing.json")).await.unwrap().is_empty());
    }
}
