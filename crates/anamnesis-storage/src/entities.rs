// ABOUTME: Persisted entity schema — the storage-side shapes behind every table.
// ABOUTME: Grounded on codegraph-core/src/node.rs's serde-friendly builder style and on
// ABOUTME: original_source/anamnesis/services/type_converters.py, which names these exact fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// A relationship edge recorded against a concept, e.g. `{"type": "calls", "target": "foo"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConceptType {
    Class,
    Function,
    Method,
    Variable,
    Constant,
    Interface,
    TypeAlias,
    Enum,
    Module,
    Property,
    Lambda,
}

impl ConceptType {
    pub const ALL: &'static [ConceptType] = &[
        ConceptType::Class,
        ConceptType::Function,
        ConceptType::Method,
        ConceptType::Variable,
        ConceptType::Constant,
        ConceptType::Interface,
        ConceptType::TypeAlias,
        ConceptType::Enum,
        ConceptType::Module,
        ConceptType::Property,
        ConceptType::Lambda,
    ];
}

impl fmt::Display for ConceptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConceptType::Class => "CLASS",
            ConceptType::Function => "FUNCTION",
            ConceptType::Method => "METHOD",
            ConceptType::Variable => "VARIABLE",
            ConceptType::Constant => "CONSTANT",
            ConceptType::Interface => "INTERFACE",
            ConceptType::TypeAlias => "TYPE_ALIAS",
            ConceptType::Enum => "ENUM",
            ConceptType::Module => "MODULE",
            ConceptType::Property => "PROPERTY",
            ConceptType::Lambda => "LAMBDA",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ConceptType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CLASS" => Ok(ConceptType::Class),
            "FUNCTION" => Ok(ConceptType::Function),
            "METHOD" => Ok(ConceptType::Method),
            "VARIABLE" => Ok(ConceptType::Variable),
            "CONSTANT" => Ok(ConceptType::Constant),
            "INTERFACE" => Ok(ConceptType::Interface),
            "TYPE_ALIAS" => Ok(ConceptType::TypeAlias),
            "ENUM" => Ok(ConceptType::Enum),
            "MODULE" => Ok(ConceptType::Module),
            "PROPERTY" => Ok(ConceptType::Property),
            "LAMBDA" => Ok(ConceptType::Lambda),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticConcept {
    pub id: String,
    pub name: String,
    /// Kept as a string so a still-unrecognized concept type observed in the wild
    /// (rather than an adapter-rejected one) can round-trip; validated callers should
    /// go through `ConceptType::from_str` first.
    pub concept_type: String,
    pub file_path: String,
    pub description: String,
    pub line_start: u32,
    pub line_end: u32,
    pub relationships: Vec<Relationship>,
    pub confidence: f64,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SemanticConcept {
    pub fn new(id: String, name: String, concept_type: String, file_path: String) -> Self {
        let ts = now();
        Self {
            id,
            name,
            concept_type,
            file_path,
            description: String::new(),
            line_start: 0,
            line_end: 0,
            relationships: Vec::new(),
            confidence: 1.0,
            metadata: HashMap::new(),
            created_at: ts,
            updated_at: ts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeveloperPattern {
    pub id: String,
    pub pattern_type: String,
    pub name: String,
    pub frequency: u32,
    pub examples: Vec<String>,
    pub file_paths: Vec<String>,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeveloperPattern {
    pub fn new(id: String, pattern_type: String, name: String) -> Self {
        let ts = now();
        Self {
            id,
            pattern_type,
            name,
            frequency: 1,
            examples: Vec::new(),
            file_paths: Vec::new(),
            confidence: 0.5,
            created_at: ts,
            updated_at: ts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIInsight {
    pub id: String,
    pub insight_type: String,
    pub title: String,
    pub description: String,
    pub affected_files: Vec<String>,
    pub confidence: f64,
    pub severity: String,
    pub suggested_action: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AIInsight {
    pub fn new(id: String, insight_type: String, title: String, description: String) -> Self {
        Self {
            id,
            insight_type,
            title,
            description,
            affected_files: Vec::new(),
            confidence: 0.5,
            severity: "info".to_string(),
            suggested_action: String::new(),
            metadata: HashMap::new(),
            created_at: now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSession {
    pub id: String,
    pub name: String,
    pub feature: String,
    pub files: Vec<String>,
    pub tasks: Vec<String>,
    pub notes: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl WorkSession {
    pub fn new(id: String, name: String, feature: String) -> Self {
        let ts = now();
        Self {
            id,
            name,
            feature,
            files: Vec::new(),
            tasks: Vec::new(),
            notes: String::new(),
            started_at: ts,
            updated_at: ts,
            ended_at: None,
            metadata: HashMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDecision {
    pub id: String,
    pub decision: String,
    pub context: String,
    pub rationale: String,
    pub session_id: Option<String>,
    pub related_files: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ProjectDecision {
    pub fn new(id: String, decision: String, session_id: Option<String>) -> Self {
        Self {
            id,
            decision,
            context: String::new(),
            rationale: String::new(),
            session_id,
            related_files: Vec::new(),
            tags: Vec::new(),
            created_at: now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdrStatus {
    Proposed,
    Accepted,
    Rejected,
    Deprecated,
    Superseded,
}

impl fmt::Display for AdrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AdrStatus::Proposed => "PROPOSED",
            AdrStatus::Accepted => "ACCEPTED",
            AdrStatus::Rejected => "REJECTED",
            AdrStatus::Deprecated => "DEPRECATED",
            AdrStatus::Superseded => "SUPERSEDED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AdrStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PROPOSED" => Ok(AdrStatus::Proposed),
            "ACCEPTED" => Ok(AdrStatus::Accepted),
            "REJECTED" => Ok(AdrStatus::Rejected),
            "DEPRECATED" => Ok(AdrStatus::Deprecated),
            "SUPERSEDED" => Ok(AdrStatus::Superseded),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitecturalDecision {
    pub id: String,
    pub title: String,
    pub context: String,
    pub decision: String,
    pub status: String,
    pub consequences: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArchitecturalDecision {
    pub fn new(id: String, title: String, decision: String) -> Self {
        let ts = now();
        Self {
            id,
            title,
            context: String::new(),
            decision,
            status: AdrStatus::Proposed.to_string(),
            consequences: String::new(),
            created_at: ts,
            updated_at: ts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIntelligence {
    pub id: String,
    pub file_path: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub id: String,
    pub project_path: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureMap {
    pub id: String,
    pub name: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPoint {
    pub id: String,
    pub file_path: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyDirectory {
    pub id: String,
    pub path: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedPattern {
    pub id: String,
    pub name: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn concept_type_round_trips_through_display_and_from_str() {
        for ct in ConceptType::ALL {
            let s = ct.to_string();
            assert_eq!(ConceptType::from_str(&s).unwrap(), *ct);
        }
    }

    #[test]
    fn unknown_concept_type_string_is_rejected() {
        assert!(ConceptType::from_str("WIDGET").is_err());
    }

    #[test]
    fn work_session_without_ended_at_is_active() {
        let session = WorkSession::new("session_1".into(), "refactor".into(), "auth".into());
        assert!(session.is_active());
    }

    #[test]
    fn work_session_with_ended_at_is_inactive() {
        let mut session = WorkSession::new("session_1".into(), "refactor".into(), "auth".into());
        session.ended_at = Some(now());
        assert!(!session.is_active());
    }

    #[test]
    fn new_pattern_defaults_frequency_to_one() {
        let pattern = DeveloperPattern::new("pattern_1".into(), "SINGLETON".into(), "Logger".into());
        assert_eq!(pattern.frequency, 1);
    }
}
