//! Deterministic feature-hashing embedder that needs no network

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::domain::embedding::{
    Embedding, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage,
};
use crate::domain::DomainError;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "any", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from",
    "give", "has", "have", "how", "i", "in", "is", "it", "list", "me", "most", "of", "on", "or",
    "show", "that", "the", "there", "to", "was", "what", "which", "who", "with",
];

/// Bag-of-words vectors with signed feature hashing.
///
/// Identifiers are split on camel case (`InvoiceDate` becomes `invoice date`) and plurals
/// are folded, so `albums` in a question lands on the same bucket as the `Album` table.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    model: String,
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            model: format!("hashing-v1-{}", dimensions),
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }

        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, DomainError> {
        let inputs = request.inputs();
        let tokens: usize = inputs.iter().map(|t| tokenize(t).len()).sum();

        let embeddings = inputs
            .iter()
            .enumerate()
            .map(|(idx, text)| Embedding::new(idx, self.embed_one(text)))
            .collect();

        Ok(EmbeddingResponse::new(
            self.model.clone(),
            embeddings,
            EmbeddingUsage::new(tokens as u32, tokens as u32),
        ))
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Lower-cased word tokens with camel-case splitting, plural folding and stopwords removed
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for word in text.split(|c: char| !c.is_alphanumeric()) {
        for part in split_camel_case(word) {
            let lower = part.to_lowercase();
            if lower.is_empty() || STOPWORDS.contains(&lower.as_str()) {
                continue;
            }
            tokens.push(fold_plural(&lower));
        }
    }

    tokens
}

fn split_camel_case(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = word.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        let boundary = i > 0
            && c.is_uppercase()
            && (chars[i - 1].is_lowercase()
                || (chars[i - 1].is_uppercase()
                    && chars.get(i + 1).is_some_and(|next| next.is_lowercase())));
        if boundary && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        current.push(c);
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

fn fold_plural(word: &str) -> String {
    if word.len() > 4 && word.ends_with("ies") {
        return format!("{}y", &word[..word.len() - 3]);
    }
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}
