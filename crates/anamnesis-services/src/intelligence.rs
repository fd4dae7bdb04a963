// ABOUTME: Query surface over learned intelligence: semantic search, pattern
// ABOUTME: recommendations, approach prediction, developer profile, and insight
// ABOUTME: contribution. Grounded on spec.md §4.7 and the IntelligenceService
// ABOUTME: operation set exercised by tests/phase9_services/test_intelligence_service*.py.

use chrono::{DateTime, Utc};

use anamnesis_core::error::AnamnesisError;
use anamnesis_core::ids::generate_id;
use anamnesis_extract::PatternKind;
use anamnesis_intelligence::{
    build_profile, predict_coding_approach, CodingApproachPrediction, DeveloperProfile, EmbeddingIndex, ModelConfig, PatternEngine, PatternRecommendation, SemanticSearchResult,
};
use anamnesis_parser::LanguageRegistry;
use anamnesis_storage::entities::{AIInsight, Relationship};
use anamnesis_storage::sync::SyncStorage;

use crate::convert::{storage_concept_to_engine, storage_pattern_to_detected, service_insight_to_storage, ServiceInsightParams};

#[derive(Debug, Clone)]
pub struct ProjectBlueprint {
    pub project_path: String,
    pub total_concepts: usize,
    pub total_patterns: usize,
    pub languages: Vec<String>,
    pub top_patterns: Vec<(PatternKind, u32)>,
}

/// Which recorded work sessions touched a concept's file — the only activity
/// history the backend actually carries (there is no per-symbol access log).
#[derive(Debug, Clone, Default)]
pub struct ConceptUsage {
    pub session_count: usize,
    pub session_names: Vec<String>,
}

/// First-seen/last-seen timestamps for a concept, plus whether it has been
/// re-learned since it was first recorded.
#[derive(Debug, Clone)]
pub struct ConceptEvolution {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revised_since_creation: bool,
}

/// An enriched semantic-search hit: the match itself plus what the backend
/// knows about how the concept relates to others, how often it comes up in
/// recorded work sessions, and how it has changed over time.
#[derive(Debug, Clone)]
pub struct SemanticInsight {
    pub concept: SemanticSearchResult,
    pub relationships: Vec<Relationship>,
    pub usage: ConceptUsage,
    pub evolution: ConceptEvolution,
}

/// Bridges the persisted backend with the in-memory embedding index and pattern
/// engine; `load_from_backend` hydrates both from storage so a freshly constructed
/// service can answer queries without re-crawling the codebase.
pub struct IntelligenceService<'a> {
    backend: Option<&'a SyncStorage>,
    embedding_index: EmbeddingIndex,
    pattern_engine: PatternEngine,
}

impl<'a> IntelligenceService<'a> {
    pub fn new(backend: Option<&'a SyncStorage>) -> Self {
        Self { backend, embedding_index: EmbeddingIndex::new(ModelConfig::default()), pattern_engine: PatternEngine::new() }
    }

    pub fn load_from_backend(&self) -> Result<(), AnamnesisError> {
        let Some(backend) = self.backend else { return Ok(()) };

        for concept in backend.list_concepts()? {
            let engine_concept = storage_concept_to_engine(&concept);
            self.embedding_index.add_concept(&engine_concept.name, &engine_concept.concept_type, engine_concept.file_path.as_deref().unwrap_or(""), Default::default());
        }

        for pattern in backend.list_patterns()? {
            if let Some(detected) = storage_pattern_to_detected(&pattern) {
                for file_path in &pattern.file_paths {
                    self.pattern_engine.learn(file_path, std::slice::from_ref(&detected));
                }
                if pattern.file_paths.is_empty() {
                    self.pattern_engine.learn(&detected.file_path, std::slice::from_ref(&detected));
                }
            }
        }

        Ok(())
    }

    pub fn get_semantic_insights(&self, query: &str, concept_type_filter: Option<&str>, limit: usize) -> (Vec<SemanticInsight>, usize) {
        let results = self.embedding_index.search(query, limit, concept_type_filter, None);
        let total = self.embedding_index.len();

        let sessions = self.backend.map(|b| b.get_recent_sessions(200).unwrap_or_default()).unwrap_or_default();
        let insights = results.into_iter().map(|concept| self.enrich(concept, &sessions)).collect();
        (insights, total)
    }

    fn enrich(&self, concept: SemanticSearchResult, sessions: &[anamnesis_storage::entities::WorkSession]) -> SemanticInsight {
        let stored = self.backend.and_then(|b| b.get_concept(&concept.concept_id).ok().flatten());

        let relationships = stored.as_ref().map(|c| c.relationships.clone()).unwrap_or_default();
        let (created_at, updated_at) = stored.as_ref().map(|c| (c.created_at, c.updated_at)).unwrap_or_else(|| (Utc::now(), Utc::now()));

        let touching: Vec<&anamnesis_storage::entities::WorkSession> = sessions.iter().filter(|s| s.files.iter().any(|f| f == &concept.file_path)).collect();
        let usage = ConceptUsage { session_count: touching.len(), session_names: touching.iter().map(|s| s.name.clone()).collect() };
        let evolution = ConceptEvolution { created_at, updated_at, revised_since_creation: updated_at > created_at };

        SemanticInsight { concept, relationships, usage, evolution }
    }

    pub fn search_semantically_similar(&self, query: &str, limit: usize, concept_type_filter: Option<&str>) -> Vec<SemanticSearchResult> {
        self.embedding_index.search(query, limit, concept_type_filter, None)
    }

    pub fn get_pattern_recommendations(&self, problem_description: &str, top_k: usize) -> Vec<PatternRecommendation> {
        self.pattern_engine.recommend(problem_description, top_k)
    }

    pub fn predict_coding_approach(&self, problem_description: &str, file_routing: Option<Vec<String>>) -> CodingApproachPrediction {
        predict_coding_approach(problem_description, file_routing)
    }

    pub fn get_developer_profile(&self, detected: &[anamnesis_extract::DetectedPattern], current_session_files: Vec<String>, current_feature: Option<String>) -> DeveloperProfile {
        build_profile(detected, current_session_files, current_feature)
    }

    pub fn contribute_insight(
        &self,
        insight_type: &str,
        title: &str,
        description: &str,
        affected_files: Vec<String>,
        confidence: f64,
        suggested_action: &str,
        source_agent: &str,
    ) -> Result<AIInsight, AnamnesisError> {
        let insight = service_insight_to_storage(ServiceInsightParams {
            insight_id: generate_id("insight"),
            insight_type,
            title: title.to_string(),
            description: description.to_string(),
            affected_files,
            confidence,
            suggested_action: suggested_action.to_string(),
            source_agent,
            created_at: None,
        });

        if let Some(backend) = self.backend {
            backend.save_insight(&insight)?;
        }
        Ok(insight)
    }

    pub fn get_project_blueprint(&self, project_path: &str) -> Result<ProjectBlueprint, AnamnesisError> {
        let Some(backend) = self.backend else {
            return Ok(ProjectBlueprint { project_path: project_path.to_string(), total_concepts: 0, total_patterns: 0, languages: Vec::new(), top_patterns: Vec::new() });
        };

        let concepts = backend.get_concepts_by_file_prefix(project_path).unwrap_or_default();
        let total_concepts = backend.count_concepts_by_file_prefix(project_path)? as usize;
        let patterns = backend.list_patterns()?;

        let registry = LanguageRegistry::new();
        let mut languages: Vec<String> = concepts
            .iter()
            .filter_map(|c| registry.detect_language(&c.file_path).ok().flatten())
            .map(|lang| lang.canonical_name().to_string())
            .collect();
        languages.sort_unstable();
        languages.dedup();

        let mut top_patterns: Vec<(PatternKind, u32)> = patterns
            .iter()
            .filter_map(|p| storage_pattern_to_detected(p).map(|d| (d.kind, p.frequency)))
            .collect();
        top_patterns.sort_by(|a, b| b.1.cmp(&a.1));
        top_patterns.truncate(10);

        Ok(ProjectBlueprint { project_path: project_path.to_string(), total_concepts, total_patterns: patterns.len(), languages, top_patterns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anamnesis_storage::entities::SemanticConcept;

    #[test]
    fn load_from_backend_populates_the_embedding_index() {
        let storage = SyncStorage::connect_in_memory().unwrap();
        storage.save_concept(&SemanticConcept::new("c1".into(), "UserRepository".into(), "CLASS".into(), "repo.py".into())).unwrap();

        let service = IntelligenceService::new(Some(&storage));
        service.load_from_backend().unwrap();

        let (results, total) = service.get_semantic_insights("repository", None, 5);
        assert_eq!(total, 1);
        assert_eq!(results[0].concept.name, "UserRepository");
    }

    #[test]
    fn semantic_insight_reports_session_usage_and_evolution() {
        use anamnesis_storage::entities::WorkSession;

        let storage = SyncStorage::connect_in_memory().unwrap();
        storage.save_concept(&SemanticConcept::new("c1".into(), "UserRepository".into(), "CLASS".into(), "repo.py".into())).unwrap();
        let mut session = WorkSession::new("s1".into(), "feature work".into(), "auth".into());
        session.files.push("repo.py".into());
        storage.save_session(&session).unwrap();

        let service = IntelligenceService::new(Some(&storage));
        service.load_from_backend().unwrap();

        let (results, _) = service.get_semantic_insights("repository", None, 5);
        let insight = &results[0];
        assert_eq!(insight.usage.session_count, 1);
        assert_eq!(insight.usage.session_names, vec!["feature work".to_string()]);
        assert!(!insight.evolution.revised_since_creation);
    }

    #[test]
    fn contribute_insight_persists_when_backend_present() {
        let storage = SyncStorage::connect_in_memory().unwrap();
        let service = IntelligenceService::new(Some(&storage));
        let insight = service.contribute_insight("bug_pattern", "Null deref", "desc", vec!["a.py".to_string()], 0.8, "add guard", "complexity-analyzer").unwrap();
        assert_eq!(storage.get_insights_by_type("bug_pattern").unwrap().len(), 1);
        assert_eq!(insight.insight_type, "bug_pattern");
    }

    #[test]
    fn blueprint_without_backend_is_empty_but_succeeds() {
        let service = IntelligenceService::new(None);
        let blueprint = service.get_project_blueprint("some/path").unwrap();
        assert_eq!(blueprint.total_concepts, 0);
    }

    #[test]
    fn blueprint_tech_stack_detects_language_from_concept_file_paths() {
        let storage = SyncStorage::connect_in_memory().unwrap();
        storage.save_concept(&SemanticConcept::new("c1".into(), "UserService".into(), "CLASS".into(), "/proj/src/user.py".into())).unwrap();
        let service = IntelligenceService::new(Some(&storage));
        let blueprint = service.get_project_blueprint("/proj").unwrap();
        assert_eq!(blueprint.languages, vec!["python".to_string()]);
    }

    #[test]
    fn predict_coding_approach_delegates_to_the_predictor() {
        let service = IntelligenceService::new(None);
        let prediction = service.predict_coding_approach("persist records to a database", None);
        assert_eq!(prediction.approach, "CRUD data-access layer");
    }
}
