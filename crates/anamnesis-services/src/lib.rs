pub mod codebase;
pub mod convert;
pub mod intelligence;
pub mod learning;
pub mod session;

pub use codebase::{CodebaseHealth, CodebaseService, FileAnalysis};
pub use convert::{
    detected_pattern_to_storage, engine_concept_to_storage, service_insight_to_storage, storage_concept_to_engine, storage_pattern_to_detected, EngineConcept, ServiceInsightParams,
};
pub use intelligence::{ConceptEvolution, ConceptUsage, IntelligenceService, ProjectBlueprint, SemanticInsight};
pub use learning::{LearningOptions, LearningResult, LearningService};
pub use session::{DecisionInfo, SessionInfo, SessionManager};
