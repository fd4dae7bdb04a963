// ABOUTME: Semantic concept index, pattern knowledge engine, approach predictor, and
// ABOUTME: developer profile aggregation.

pub mod embedding;
pub mod pattern_engine;
pub mod predictor;
pub mod profile;

pub use embedding::{concept_id, Device, EmbeddingIndex, IndexedConcept, ModelConfig, SemanticSearchResult};
pub use pattern_engine::{PatternEngine, PatternRecommendation};
pub use predictor::{predict_coding_approach, CodingApproachPrediction, EstimatedComplexity};
pub use profile::{build_profile, DeveloperProfile, ExpertiseArea};
