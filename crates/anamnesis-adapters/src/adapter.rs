// ABOUTME: Validate-then-coerce boundary turning loose JSON maps into typed entities.
// ABOUTME: Grounded on spec.md §4.6 "Adapter boundary" and services/type_converters.py's
// ABOUTME: best-effort enum casts, which this makes strict (TypeCoercionError instead of
// ABOUTME: silently keeping the raw string).

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::str::FromStr;

use anamnesis_core::error::AnamnesisError;
use anamnesis_storage::entities::{
    AdrStatus, ArchitecturalDecision, ConceptType, DeveloperPattern, ProjectDecision, Relationship,
    SemanticConcept, WorkSession, AIInsight,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Concept,
    Pattern,
    Insight,
    Session,
    Decision,
    ArchitecturalDecision,
}

/// The typed result of adapting an input map — one variant per persisted entity
/// this boundary covers. Internal-only auxiliary records (file intelligence,
/// project metadata, blueprint records) are constructed directly by services and
/// never cross this agent-facing boundary.
#[derive(Debug, Clone)]
pub enum AdaptedEntity {
    Concept(SemanticConcept),
    Pattern(DeveloperPattern),
    Insight(AIInsight),
    Session(WorkSession),
    Decision(ProjectDecision),
    ArchitecturalDecision(ArchitecturalDecision),
}

struct FieldCollector<'a> {
    map: &'a Map<String, Value>,
    missing: Vec<String>,
}

impl<'a> FieldCollector<'a> {
    fn new(map: &'a Map<String, Value>) -> Self {
        Self {
            map,
            missing: Vec::new(),
        }
    }

    fn require_str(&mut self, field: &str) -> String {
        match self.map.get(field).and_then(Value::as_str) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => {
                self.missing.push(field.to_string());
                String::new()
            }
        }
    }

    fn optional_str(&self, field: &str, default: &str) -> String {
        self.map
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    fn optional_str_list(&self, field: &str) -> Vec<String> {
        self.map
            .get(field)
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    fn optional_f64(&self, field: &str, default: f64) -> f64 {
        self.map.get(field).and_then(Value::as_f64).unwrap_or(default)
    }

    fn optional_u32(&self, field: &str, default: u32) -> u32 {
        self.map
            .get(field)
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(default)
    }

    fn finish(self) -> Result<(), AnamnesisError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(AnamnesisError::Validation { missing: self.missing })
        }
    }
}

fn coerce_relationships(value: Option<&Value>) -> Vec<Relationship> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(target) => Some(Relationship {
                kind: "reference".to_string(),
                target: target.clone(),
            }),
            Value::Object(obj) => {
                let kind = obj.get("type").and_then(Value::as_str).unwrap_or("reference").to_string();
                let target = obj.get("target").and_then(Value::as_str)?.to_string();
                Some(Relationship { kind, target })
            }
            _ => None,
        })
        .collect()
}

fn coerce_metadata(value: Option<&Value>) -> std::collections::HashMap<String, Value> {
    match value {
        Some(Value::Object(obj)) => obj.clone().into_iter().collect(),
        _ => std::collections::HashMap::new(),
    }
}

fn coerce_timestamp(map: &Map<String, Value>, field: &str) -> Result<Option<DateTime<Utc>>, AnamnesisError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| AnamnesisError::TypeCoercion {
                field: field.to_string(),
                value: s.clone(),
                valid_values: vec![format!("ISO-8601 timestamp ({e})")],
            }),
        Some(other) => Err(AnamnesisError::TypeCoercion {
            field: field.to_string(),
            value: other.to_string(),
            valid_values: vec!["ISO-8601 timestamp string".to_string()],
        }),
    }
}

/// Dispatch an input map to the adapter for `kind`, producing a typed entity or a
/// `Validation`/`TypeCoercion` error. `id` is supplied by the caller (generated
/// fresh on create, reused on update) rather than trusted from the input map.
pub fn adapt_from_dict(map: &Map<String, Value>, kind: EntityKind, id: String) -> Result<AdaptedEntity, AnamnesisError> {
    match kind {
        EntityKind::Concept => adapt_concept(map, id).map(AdaptedEntity::Concept),
        EntityKind::Pattern => adapt_pattern(map, id).map(AdaptedEntity::Pattern),
        EntityKind::Insight => adapt_insight(map, id).map(AdaptedEntity::Insight),
        EntityKind::Session => adapt_session(map, id).map(AdaptedEntity::Session),
        EntityKind::Decision => adapt_decision(map, id).map(AdaptedEntity::Decision),
        EntityKind::ArchitecturalDecision => adapt_adr(map, id).map(AdaptedEntity::ArchitecturalDecision),
    }
}

fn adapt_concept(map: &Map<String, Value>, id: String) -> Result<SemanticConcept, AnamnesisError> {
    let mut fields = FieldCollector::new(map);
    let name = fields.require_str("name");
    let raw_concept_type = fields.require_str("concept_type");
    let file_path = fields.require_str("file_path");
    fields.finish()?;

    let concept_type = ConceptType::from_str(&raw_concept_type).map_err(|_| AnamnesisError::TypeCoercion {
        field: "concept_type".to_string(),
        value: raw_concept_type.clone(),
        valid_values: ConceptType::ALL.iter().map(|c| c.to_string()).collect(),
    })?;

    let confidence = fields.optional_f64("confidence", 1.0);
    if !(0.0..=1.0).contains(&confidence) {
        return Err(AnamnesisError::TypeCoercion {
            field: "confidence".to_string(),
            value: confidence.to_string(),
            valid_values: vec!["a number in [0, 1]".to_string()],
        });
    }

    let line_start = fields.optional_u32("line_start", 0);
    let line_end = fields.optional_u32("line_end", line_start);
    if line_start > line_end {
        return Err(AnamnesisError::TypeCoercion {
            field: "line_end".to_string(),
            value: line_end.to_string(),
            valid_values: vec![format!(">= line_start ({line_start})")],
        });
    }

    let now = Utc::now();
    Ok(SemanticConcept {
        id,
        name,
        concept_type: concept_type.to_string(),
        file_path,
        description: fields.optional_str("description", ""),
        line_start,
        line_end,
        relationships: coerce_relationships(map.get("relationships")),
        confidence,
        metadata: coerce_metadata(map.get("metadata")),
        created_at: coerce_timestamp(map, "created_at")?.unwrap_or(now),
        updated_at: now,
    })
}

fn adapt_pattern(map: &Map<String, Value>, id: String) -> Result<DeveloperPattern, AnamnesisError> {
    let mut fields = FieldCollector::new(map);
    let pattern_type = fields.require_str("pattern_type");
    let name = fields.require_str("name");
    fields.finish()?;

    let now = Utc::now();
    Ok(DeveloperPattern {
        id,
        pattern_type,
        name,
        frequency: fields.optional_u32("frequency", 1),
        examples: fields.optional_str_list("examples"),
        file_paths: fields.optional_str_list("file_paths"),
        confidence: fields.optional_f64("confidence", 0.5),
        created_at: coerce_timestamp(map, "created_at")?.unwrap_or(now),
        updated_at: now,
    })
}

fn adapt_insight(map: &Map<String, Value>, id: String) -> Result<AIInsight, AnamnesisError> {
    let mut fields = FieldCollector::new(map);
    let insight_type = fields.require_str("insight_type");
    let title = fields.require_str("title");
    fields.finish()?;

    Ok(AIInsight {
        id,
        insight_type,
        title,
        description: fields.optional_str("description", ""),
        affected_files: fields.optional_str_list("affected_files"),
        confidence: fields.optional_f64("confidence", 0.5),
        severity: fields.optional_str("severity", "info"),
        suggested_action: fields.optional_str("suggested_action", ""),
        metadata: coerce_metadata(map.get("metadata")),
        created_at: coerce_timestamp(map, "created_at")?.unwrap_or_else(Utc::now),
    })
}

fn adapt_session(map: &Map<String, Value>, id: String) -> Result<WorkSession, AnamnesisError> {
    let fields = FieldCollector::new(map);
    let now = Utc::now();
    let started_at = coerce_timestamp(map, "started_at")?.unwrap_or(now);
    let ended_at = coerce_timestamp(map, "ended_at")?;
    if let Some(ended) = ended_at {
        if started_at > ended {
            return Err(AnamnesisError::TypeCoercion {
                field: "ended_at".to_string(),
                value: ended.to_rfc3339(),
                valid_values: vec![format!(">= started_at ({})", started_at.to_rfc3339())],
            });
        }
    }

    Ok(WorkSession {
        id,
        name: fields.optional_str("name", "unnamed-session"),
        feature: fields.optional_str("feature", ""),
        files: fields.optional_str_list("files"),
        tasks: fields.optional_str_list("tasks"),
        notes: fields.optional_str("notes", ""),
        started_at,
        updated_at: now,
        ended_at,
        metadata: coerce_metadata(map.get("metadata")),
    })
}

fn adapt_decision(map: &Map<String, Value>, id: String) -> Result<ProjectDecision, AnamnesisError> {
    let mut fields = FieldCollector::new(map);
    let decision = fields.require_str("decision");
    fields.finish()?;

    let session_id = map
        .get("session_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(ProjectDecision {
        id,
        decision,
        context: fields.optional_str("context", ""),
        rationale: fields.optional_str("rationale", ""),
        session_id,
        related_files: fields.optional_str_list("related_files"),
        tags: fields.optional_str_list("tags"),
        created_at: coerce_timestamp(map, "created_at")?.unwrap_or_else(Utc::now),
    })
}

fn adapt_adr(map: &Map<String, Value>, id: String) -> Result<ArchitecturalDecision, AnamnesisError> {
    let mut fields = FieldCollector::new(map);
    let title = fields.require_str("title");
    let decision = fields.require_str("decision");
    fields.finish()?;

    let raw_status = fields.optional_str("status", "PROPOSED");
    let status = AdrStatus::from_str(&raw_status).map_err(|_| AnamnesisError::TypeCoercion {
        field: "status".to_string(),
        value: raw_status.clone(),
        valid_values: vec![
            "PROPOSED".into(),
            "ACCEPTED".into(),
            "REJECTED".into(),
            "DEPRECATED".into(),
            "SUPERSEDED".into(),
        ],
    })?;

    let now = Utc::now();
    Ok(ArchitecturalDecision {
        id,
        title,
        context: fields.optional_str("context", ""),
        decision,
        status: status.to_string(),
        consequences: fields.optional_str("consequences", ""),
        created_at: now,
        updated_at: now,
    })
}

/// Reverse an adapted entity back into a JSON map, losslessly enough for round-trip
/// tests: every field the adapter reads or defaults is present on the way out.
pub fn adapt_to_dict(entity: &AdaptedEntity) -> Value {
    match entity {
        AdaptedEntity::Concept(c) => serde_json::json!({
            "id": c.id, "name": c.name, "concept_type": c.concept_type,
            "file_path": c.file_path, "description": c.description,
            "line_start": c.line_start, "line_end": c.line_end,
            "relationships": c.relationships, "confidence": c.confidence,
            "metadata": c.metadata,
            "created_at": c.created_at.to_rfc3339(), "updated_at": c.updated_at.to_rfc3339(),
        }),
        AdaptedEntity::Pattern(p) => serde_json::json!({
            "id": p.id, "pattern_type": p.pattern_type, "name": p.name,
            "frequency": p.frequency, "examples": p.examples, "file_paths": p.file_paths,
            "confidence": p.confidence,
            "created_at": p.created_at.to_rfc3339(), "updated_at": p.updated_at.to_rfc3339(),
        }),
        AdaptedEntity::Insight(i) => serde_json::json!({
            "id": i.id, "insight_type": i.insight_type, "title": i.title,
            "description": i.description, "affected_files": i.affected_files,
            "confidence": i.confidence, "severity": i.severity,
            "suggested_action": i.suggested_action, "metadata": i.metadata,
            "created_at": i.created_at.to_rfc3339(),
        }),
        AdaptedEntity::Session(s) => serde_json::json!({
            "id": s.id, "name": s.name, "feature": s.feature, "files": s.files,
            "tasks": s.tasks, "notes": s.notes,
            "started_at": s.started_at.to_rfc3339(), "updated_at": s.updated_at.to_rfc3339(),
            "ended_at": s.ended_at.map(|t| t.to_rfc3339()), "metadata": s.metadata,
        }),
        AdaptedEntity::Decision(d) => serde_json::json!({
            "id": d.id, "decision": d.decision, "context": d.context,
            "rationale": d.rationale, "session_id": d.session_id,
            "related_files": d.related_files, "tags": d.tags,
            "created_at": d.created_at.to_rfc3339(),
        }),
        AdaptedEntity::ArchitecturalDecision(a) => serde_json::json!({
            "id": a.id, "title": a.title, "context": a.context, "decision": a.decision,
            "status": a.status, "consequences": a.consequences,
            "created_at": a.created_at.to_rfc3339(), "updated_at": a.updated_at.to_rfc3339(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn missing_required_fields_are_all_reported_at_once() {
        let input = obj(json!({}));
        let err = adapt_from_dict(&input, EntityKind::Concept, "c1".into()).unwrap_err();
        match err {
            AnamnesisError::Validation { missing } => {
                assert_eq!(missing.len(), 3);
                assert!(missing.contains(&"name".to_string()));
                assert!(missing.contains(&"concept_type".to_string()));
                assert!(missing.contains(&"file_path".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_concept_type_raises_type_coercion() {
        let input = obj(json!({"name": "Foo", "concept_type": "WIDGET", "file_path": "a.rs"}));
        let err = adapt_from_dict(&input, EntityKind::Concept, "c1".into()).unwrap_err();
        assert!(matches!(err, AnamnesisError::TypeCoercion { field, .. } if field == "concept_type"));
    }

    #[test]
    fn extra_fields_are_silently_ignored() {
        let input = obj(json!({
            "name": "Foo", "concept_type": "CLASS", "file_path": "a.rs",
            "totally_unknown_field": "whatever"
        }));
        let result = adapt_from_dict(&input, EntityKind::Concept, "c1".into());
        assert!(result.is_ok());
    }

    #[test]
    fn bare_string_relationships_become_reference_maps() {
        let input = obj(json!({
            "name": "Foo", "concept_type": "CLASS", "file_path": "a.rs",
            "relationships": ["other_concept"]
        }));
        let entity = adapt_from_dict(&input, EntityKind::Concept, "c1".into()).unwrap();
        match entity {
            AdaptedEntity::Concept(c) => {
                assert_eq!(c.relationships.len(), 1);
                assert_eq!(c.relationships[0].kind, "reference");
                assert_eq!(c.relationships[0].target, "other_concept");
            }
            _ => panic!("expected concept"),
        }
    }

    #[test]
    fn round_trip_preserves_every_adapted_field() {
        let input = obj(json!({
            "name": "Foo", "concept_type": "FUNCTION", "file_path": "a.rs",
            "description": "does a thing", "confidence": 0.8
        }));
        let entity = adapt_from_dict(&input, EntityKind::Concept, "c1".into()).unwrap();
        let back = adapt_to_dict(&entity);
        assert_eq!(back["name"], "Foo");
        assert_eq!(back["concept_type"], "FUNCTION");
        assert_eq!(back["confidence"], 0.8);
    }

    #[test]
    fn confidence_outside_unit_interval_is_rejected() {
        let input = obj(json!({"name": "Foo", "concept_type": "CLASS", "file_path": "a.rs", "confidence": 1.5}));
        let err = adapt_from_dict(&input, EntityKind::Concept, "c1".into()).unwrap_err();
        assert!(matches!(err, AnamnesisError::TypeCoercion { field, .. } if field == "confidence"));
    }

    #[test]
    fn empty_session_id_on_decision_becomes_standalone() {
        let input = obj(json!({"decision": "use sqlite", "session_id": ""}));
        let entity = adapt_from_dict(&input, EntityKind::Decision, "d1".into()).unwrap();
        match entity {
            AdaptedEntity::Decision(d) => assert_eq!(d.session_id, None),
            _ => panic!("expected decision"),
        }
    }

    #[test]
    fn session_ended_before_started_is_rejected() {
        let input = obj(json!({
            "name": "s", "started_at": "2026-01-02T00:00:00Z", "ended_at": "2026-01-01T00:00:00Z"
        }));
        let err = adapt_from_dict(&input, EntityKind::Session, "s1".into()).unwrap_err();
        assert!(matches!(err, AnamnesisError::TypeCoercion { field, .. } if field == "ended_at"));
    }
}
