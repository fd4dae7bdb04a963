// ABOUTME: Converters between lightweight engine-side shapes and persisted storage
// ABOUTME: entities. Grounded verbatim on original_source/anamnesis/services/type_converters.py.

use anamnesis_core::ids::generate_id;
use anamnesis_extract::{DetectedPattern, PatternKind};
use anamnesis_storage::entities::{AIInsight, DeveloperPattern, Relationship, SemanticConcept};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// The lightweight concept shape produced during analysis, before it has an id or
/// persisted timestamps.
#[derive(Debug, Clone)]
pub struct EngineConcept {
    pub name: String,
    pub concept_type: String,
    pub confidence: f64,
    pub file_path: Option<String>,
    pub line_range: Option<(u32, u32)>,
    pub description: Option<String>,
    pub relationships: Vec<String>,
}

pub fn engine_concept_to_storage(concept: &EngineConcept, concept_id: Option<String>) -> SemanticConcept {
    let (line_start, line_end) = concept.line_range.unwrap_or((0, 0));
    let relationships = concept.relationships.iter().map(|target| Relationship { kind: "reference".to_string(), target: target.clone() }).collect();

    let mut storage = SemanticConcept::new(
        concept_id.unwrap_or_else(|| generate_id("concept")),
        concept.name.clone(),
        concept.concept_type.clone(),
        concept.file_path.clone().unwrap_or_default(),
    );
    storage.description = concept.description.clone().unwrap_or_default();
    storage.line_start = line_start;
    storage.line_end = line_end;
    storage.relationships = relationships;
    storage.confidence = concept.confidence;
    storage
}

pub fn storage_concept_to_engine(concept: &SemanticConcept) -> EngineConcept {
    let line_range = if concept.line_start != 0 || concept.line_end != 0 { Some((concept.line_start, concept.line_end)) } else { None };

    EngineConcept {
        name: concept.name.clone(),
        concept_type: concept.concept_type.clone(),
        confidence: concept.confidence,
        file_path: if concept.file_path.is_empty() { None } else { Some(concept.file_path.clone()) },
        line_range,
        description: if concept.description.is_empty() { None } else { Some(concept.description.clone()) },
        relationships: concept.relationships.iter().map(|r| r.target.clone()).collect(),
    }
}

fn pattern_kind_to_storage_string(kind: PatternKind) -> &'static str {
    match kind {
        PatternKind::Singleton => "SINGLETON",
        PatternKind::Factory => "FACTORY",
        PatternKind::Builder => "BUILDER",
        PatternKind::Observer => "OBSERVER",
        PatternKind::Repository => "REPOSITORY",
        PatternKind::Service => "SERVICE",
        PatternKind::DependencyInjection => "DEPENDENCY_INJECTION",
        PatternKind::ContextManager => "CONTEXT_MANAGER",
        PatternKind::Dataclass => "DATACLASS",
        PatternKind::Property => "PROPERTY",
        PatternKind::AsyncPattern => "ASYNC_PATTERN",
        PatternKind::Logging => "LOGGING",
        PatternKind::ErrorHandling => "ERROR_HANDLING",
        PatternKind::NamingSnakeCase => "NAMING_SNAKE_CASE",
        PatternKind::NamingCamelCase => "NAMING_CAMEL_CASE",
        PatternKind::NamingPascalCase => "NAMING_PASCAL_CASE",
        PatternKind::GodClass => "GOD_CLASS",
        PatternKind::LongMethod => "LONG_METHOD",
    }
}

fn storage_string_to_pattern_kind(s: &str) -> Option<PatternKind> {
    Some(match s {
        "SINGLETON" => PatternKind::Singleton,
        "FACTORY" => PatternKind::Factory,
        "BUILDER" => PatternKind::Builder,
        "OBSERVER" => PatternKind::Observer,
        "REPOSITORY" => PatternKind::Repository,
        "SERVICE" => PatternKind::Service,
        "DEPENDENCY_INJECTION" => PatternKind::DependencyInjection,
        "CONTEXT_MANAGER" => PatternKind::ContextManager,
        "DATACLASS" => PatternKind::Dataclass,
        "PROPERTY" => PatternKind::Property,
        "ASYNC_PATTERN" => PatternKind::AsyncPattern,
        "LOGGING" => PatternKind::Logging,
        "ERROR_HANDLING" => PatternKind::ErrorHandling,
        "NAMING_SNAKE_CASE" => PatternKind::NamingSnakeCase,
        "NAMING_CAMEL_CASE" => PatternKind::NamingCamelCase,
        "NAMING_PASCAL_CASE" => PatternKind::NamingPascalCase,
        "GOD_CLASS" => PatternKind::GodClass,
        "LONG_METHOD" => PatternKind::LongMethod,
        _ => return None,
    })
}

pub fn detected_pattern_to_storage(pattern: &DetectedPattern, pattern_id: Option<String>) -> DeveloperPattern {
    let mut storage = DeveloperPattern::new(pattern_id.unwrap_or_else(|| generate_id("pattern")), pattern_kind_to_storage_string(pattern.kind).to_string(), pattern.name.clone());
    storage.frequency = 1;
    storage.examples = pattern.evidence.clone();
    storage.file_paths = vec![pattern.file_path.clone()];
    storage.confidence = pattern.confidence;
    storage
}

/// Reconstructs a `DetectedPattern` from a persisted one. Line numbers are lost in
/// storage (`DeveloperPattern` aggregates across files), so they come back as `0`.
pub fn storage_pattern_to_detected(pattern: &DeveloperPattern) -> Option<DetectedPattern> {
    let kind = storage_string_to_pattern_kind(&pattern.pattern_type)?;
    Some(DetectedPattern {
        kind,
        name: pattern.name.clone(),
        file_path: pattern.file_paths.first().cloned().unwrap_or_default(),
        start_line: 0,
        end_line: 0,
        confidence: pattern.confidence,
        evidence: pattern.examples.clone(),
    })
}

pub struct ServiceInsightParams<'a> {
    pub insight_id: String,
    pub insight_type: &'a str,
    pub title: String,
    pub description: String,
    pub affected_files: Vec<String>,
    pub confidence: f64,
    pub suggested_action: String,
    pub source_agent: &'a str,
    pub created_at: Option<DateTime<Utc>>,
}

pub fn service_insight_to_storage(params: ServiceInsightParams<'_>) -> AIInsight {
    let mut insight = AIInsight::new(params.insight_id, params.insight_type.to_string(), params.title, params.description);
    insight.affected_files = params.affected_files;
    insight.confidence = params.confidence;
    insight.suggested_action = params.suggested_action;
    insight.metadata.insert("source_agent".to_string(), Value::String(params.source_agent.to_string()));
    if let Some(created_at) = params.created_at {
        insight.created_at = created_at;
    }
    insight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_concept_round_trips_through_storage() {
        let engine = EngineConcept {
            name: "Foo".to_string(),
            concept_type: "CLASS".to_string(),
            confidence: 0.9,
            file_path: Some("a.py".to_string()),
            line_range: Some((1, 10)),
            description: Some("a class".to_string()),
            relationships: vec!["Bar".to_string()],
        };
        let storage = engine_concept_to_storage(&engine, Some("concept_1".to_string()));
        assert_eq!(storage.id, "concept_1");
        assert_eq!(storage.line_start, 1);
        assert_eq!(storage.line_end, 10);

        let back = storage_concept_to_engine(&storage);
        assert_eq!(back.name, "Foo");
        assert_eq!(back.line_range, Some((1, 10)));
        assert_eq!(back.relationships, vec!["Bar".to_string()]);
    }

    #[test]
    fn concept_without_line_range_round_trips_to_none() {
        let storage = SemanticConcept::new("c1".into(), "X".into(), "CLASS".into(), "a.py".into());
        let engine = storage_concept_to_engine(&storage);
        assert_eq!(engine.line_range, None);
    }

    #[test]
    fn detected_pattern_round_trips_through_storage() {
        let detected = DetectedPattern { kind: PatternKind::Repository, name: "UserRepository".to_string(), file_path: "repo.py".to_string(), start_line: 1, end_line: 20, confidence: 0.8, evidence: vec!["has save/find".to_string()] };
        let storage = detected_pattern_to_storage(&detected, Some("pattern_1".to_string()));
        assert_eq!(storage.pattern_type, "REPOSITORY");

        let back = storage_pattern_to_detected(&storage).unwrap();
        assert_eq!(back.kind, PatternKind::Repository);
        assert_eq!(back.file_path, "repo.py");
    }

    #[test]
    fn unknown_pattern_type_string_fails_reconstruction() {
        let mut storage = DeveloperPattern::new("p1".into(), "NOT_A_REAL_KIND".into(), "X".into());
        storage.file_paths = vec!["a.py".to_string()];
        assert!(storage_pattern_to_detected(&storage).is_none());
    }

    #[test]
    fn service_insight_carries_source_agent_into_metadata() {
        let insight = service_insight_to_storage(ServiceInsightParams {
            insight_id: "insight_1".to_string(),
            insight_type: "bug_pattern",
            title: "Possible null deref".to_string(),
            description: "d".to_string(),
            affected_files: vec!["a.py".to_string()],
            confidence: 0.7,
            suggested_action: "add a null check".to_string(),
            source_agent: "complexity-analyzer",
            created_at: None,
        });
        assert_eq!(insight.metadata.get("source_agent"), Some(&Value::String("complexity-analyzer".to_string())));
    }
}
