// ABOUTME: Async storage engine: per-entity save/get/category-lookup/delete over sqlite.
// ABOUTME: Grounded on spec.md §4.6; pool/connect idiom adapted from marlonsc-mcb's sqlx usage.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anamnesis_core::error::AnamnesisError;

use crate::entities::{
    AIInsight, ArchitecturalDecision, DeveloperPattern, EntryPoint, FeatureMap, FileIntelligence,
    KeyDirectory, ProjectDecision, ProjectMetadata, Relationship, SemanticConcept, SharedPattern,
    WorkSession,
};
use crate::migrations::DatabaseMigrator;

/// Owns the sqlite connection pool and dispatches typed entity operations.
/// Opened with WAL mode, a 30s busy timeout, and a 10-connection pool per §6.2.
pub struct StorageEngine {
    pool: SqlitePool,
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn from_json<T: DeserializeOwned + Default>(raw: &str) -> T {
    serde_json::from_str(raw).unwrap_or_default()
}

fn meta_json(raw: &str) -> HashMap<String, serde_json::Value> {
    serde_json::from_str(raw).unwrap_or_default()
}

impl StorageEngine {
    pub async fn connect(db_path: &Path) -> Result<Self, AnamnesisError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(30_000));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;

        let migrator = DatabaseMigrator::new();
        migrator.ensure_schema(&pool).await?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn connect_in_memory() -> Result<Self, AnamnesisError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        let migrator = DatabaseMigrator::new();
        migrator.ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ---- SemanticConcept ----------------------------------------------------

    pub async fn save_concept(&self, concept: &SemanticConcept) -> Result<(), AnamnesisError> {
        sqlx::query(
            "INSERT INTO semantic_concepts
                (id, name, concept_type, file_path, description, line_start, line_end,
                 relationships, confidence, metadata, created_at, updated_at)
             VALUES (?,?,?,?,?,?,?,?,?,?,?,?)
             ON CONFLICT(id) DO UPDATE SET
                name=excluded.name, concept_type=excluded.concept_type,
                file_path=excluded.file_path, description=excluded.description,
                line_start=excluded.line_start, line_end=excluded.line_end,
                relationships=excluded.relationships, confidence=excluded.confidence,
                metadata=excluded.metadata, updated_at=excluded.updated_at",
        )
        .bind(&concept.id)
        .bind(&concept.name)
        .bind(&concept.concept_type)
        .bind(&concept.file_path)
        .bind(&concept.description)
        .bind(concept.line_start)
        .bind(concept.line_end)
        .bind(to_json(&concept.relationships))
        .bind(concept.confidence)
        .bind(to_json(&concept.metadata))
        .bind(concept.created_at.to_rfc3339())
        .bind(concept.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(())
    }

    pub async fn get_concept(&self, id: &str) -> Result<Option<SemanticConcept>, AnamnesisError> {
        let row = sqlx::query("SELECT * FROM semantic_concepts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(row.map(|r| row_to_concept(&r)))
    }

    pub async fn get_concepts_by_file(
        &self,
        file_path: &str,
    ) -> Result<Vec<SemanticConcept>, AnamnesisError> {
        let rows = sqlx::query("SELECT * FROM semantic_concepts WHERE file_path = ? ORDER BY line_start ASC")
            .bind(file_path)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows.iter().map(row_to_concept).collect())
    }

    pub async fn count_concepts_by_file_prefix(&self, prefix: &str) -> Result<i64, AnamnesisError> {
        let pattern = format!("{prefix}%");
        let row = sqlx::query("SELECT COUNT(*) as c FROM semantic_concepts WHERE file_path LIKE ?")
            .bind(pattern)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(row.get::<i64, _>("c"))
    }

    pub async fn get_concepts_by_file_prefix(&self, prefix: &str) -> Result<Vec<SemanticConcept>, AnamnesisError> {
        let pattern = format!("{prefix}%");
        let rows = sqlx::query("SELECT * FROM semantic_concepts WHERE file_path LIKE ? ORDER BY file_path ASC, line_start ASC")
            .bind(pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows.iter().map(row_to_concept).collect())
    }

    pub async fn list_concepts(&self) -> Result<Vec<SemanticConcept>, AnamnesisError> {
        let rows = sqlx::query("SELECT * FROM semantic_concepts ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows.iter().map(row_to_concept).collect())
    }

    pub async fn search_concepts(&self, name_fragment: &str) -> Result<Vec<SemanticConcept>, AnamnesisError> {
        let pattern = format!("%{name_fragment}%");
        let rows = sqlx::query("SELECT * FROM semantic_concepts WHERE name LIKE ? ORDER BY name ASC")
            .bind(pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows.iter().map(row_to_concept).collect())
    }

    pub async fn delete_concept(&self, id: &str) -> Result<bool, AnamnesisError> {
        let result = sqlx::query("DELETE FROM semantic_concepts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    // ---- DeveloperPattern ----------------------------------------------------

    pub async fn save_pattern(&self, pattern: &DeveloperPattern) -> Result<(), AnamnesisError> {
        sqlx::query(
            "INSERT INTO developer_patterns
                (id, pattern_type, name, frequency, examples, file_paths, confidence, created_at, updated_at)
             VALUES (?,?,?,?,?,?,?,?,?)
             ON CONFLICT(id) DO UPDATE SET
                pattern_type=excluded.pattern_type, name=excluded.name,
                frequency=excluded.frequency, examples=excluded.examples,
                file_paths=excluded.file_paths, confidence=excluded.confidence,
                updated_at=excluded.updated_at",
        )
        .bind(&pattern.id)
        .bind(&pattern.pattern_type)
        .bind(&pattern.name)
        .bind(pattern.frequency)
        .bind(to_json(&pattern.examples))
        .bind(to_json(&pattern.file_paths))
        .bind(pattern.confidence)
        .bind(pattern.created_at.to_rfc3339())
        .bind(pattern.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(())
    }

    pub async fn get_pattern(&self, id: &str) -> Result<Option<DeveloperPattern>, AnamnesisError> {
        let row = sqlx::query("SELECT * FROM developer_patterns WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(row.map(|r| row_to_pattern(&r)))
    }

    pub async fn get_patterns_by_type(&self, pattern_type: &str) -> Result<Vec<DeveloperPattern>, AnamnesisError> {
        let rows = sqlx::query("SELECT * FROM developer_patterns WHERE pattern_type = ? ORDER BY frequency DESC")
            .bind(pattern_type)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows.iter().map(row_to_pattern).collect())
    }

    pub async fn list_patterns(&self) -> Result<Vec<DeveloperPattern>, AnamnesisError> {
        let rows = sqlx::query("SELECT * FROM developer_patterns ORDER BY frequency DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows.iter().map(row_to_pattern).collect())
    }

    pub async fn delete_pattern(&self, id: &str) -> Result<bool, AnamnesisError> {
        let result = sqlx::query("DELETE FROM developer_patterns WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    // ---- AIInsight ----------------------------------------------------

    pub async fn save_insight(&self, insight: &AIInsight) -> Result<(), AnamnesisError> {
        sqlx::query(
            "INSERT INTO ai_insights
                (id, insight_type, title, description, affected_files, confidence,
                 severity, suggested_action, metadata, created_at)
             VALUES (?,?,?,?,?,?,?,?,?,?)
             ON CONFLICT(id) DO UPDATE SET
                insight_type=excluded.insight_type, title=excluded.title,
                description=excluded.description, affected_files=excluded.affected_files,
                confidence=excluded.confidence, severity=excluded.severity,
                suggested_action=excluded.suggested_action, metadata=excluded.metadata",
        )
        .bind(&insight.id)
        .bind(&insight.insight_type)
        .bind(&insight.title)
        .bind(&insight.description)
        .bind(to_json(&insight.affected_files))
        .bind(insight.confidence)
        .bind(&insight.severity)
        .bind(&insight.suggested_action)
        .bind(to_json(&insight.metadata))
        .bind(insight.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(())
    }

    pub async fn get_insight(&self, id: &str) -> Result<Option<AIInsight>, AnamnesisError> {
        let row = sqlx::query("SELECT * FROM ai_insights WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(row.map(|r| row_to_insight(&r)))
    }

    pub async fn get_insights_by_type(&self, kind: &str) -> Result<Vec<AIInsight>, AnamnesisError> {
        let rows = sqlx::query("SELECT * FROM ai_insights WHERE insight_type = ? ORDER BY created_at DESC")
            .bind(kind)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows.iter().map(row_to_insight).collect())
    }

    pub async fn delete_insight(&self, id: &str) -> Result<bool, AnamnesisError> {
        let result = sqlx::query("DELETE FROM ai_insights WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    // ---- WorkSession ----------------------------------------------------

    pub async fn save_session(&self, session: &WorkSession) -> Result<(), AnamnesisError> {
        sqlx::query(
            "INSERT INTO work_sessions
                (id, name, feature, files, tasks, notes, started_at, updated_at, ended_at, metadata)
             VALUES (?,?,?,?,?,?,?,?,?,?)
             ON CONFLICT(id) DO UPDATE SET
                name=excluded.name, feature=excluded.feature, files=excluded.files,
                tasks=excluded.tasks, notes=excluded.notes, updated_at=excluded.updated_at,
                ended_at=excluded.ended_at, metadata=excluded.metadata",
        )
        .bind(&session.id)
        .bind(&session.name)
        .bind(&session.feature)
        .bind(to_json(&session.files))
        .bind(to_json(&session.tasks))
        .bind(&session.notes)
        .bind(session.started_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .bind(session.ended_at.map(|t| t.to_rfc3339()))
        .bind(to_json(&session.metadata))
        .execute(&self.pool)
        .await
        .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(())
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<WorkSession>, AnamnesisError> {
        let row = sqlx::query("SELECT * FROM work_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(row.map(|r| row_to_session(&r)))
    }

    pub async fn get_active_sessions(&self) -> Result<Vec<WorkSession>, AnamnesisError> {
        let rows = sqlx::query("SELECT * FROM work_sessions WHERE ended_at IS NULL ORDER BY started_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows.iter().map(row_to_session).collect())
    }

    pub async fn get_recent_sessions(&self, limit: i64) -> Result<Vec<WorkSession>, AnamnesisError> {
        let rows = sqlx::query("SELECT * FROM work_sessions ORDER BY started_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows.iter().map(row_to_session).collect())
    }

    pub async fn delete_session(&self, id: &str) -> Result<bool, AnamnesisError> {
        let result = sqlx::query("DELETE FROM work_sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    // ---- ProjectDecision ----------------------------------------------------

    pub async fn save_decision(&self, decision: &ProjectDecision) -> Result<(), AnamnesisError> {
        sqlx::query(
            "INSERT INTO project_decisions
                (id, decision, context, rationale, session_id, related_files, tags, created_at)
             VALUES (?,?,?,?,?,?,?,?)
             ON CONFLICT(id) DO UPDATE SET
                decision=excluded.decision, context=excluded.context,
                rationale=excluded.rationale, session_id=excluded.session_id,
                related_files=excluded.related_files, tags=excluded.tags",
        )
        .bind(&decision.id)
        .bind(&decision.decision)
        .bind(&decision.context)
        .bind(&decision.rationale)
        .bind(&decision.session_id)
        .bind(to_json(&decision.related_files))
        .bind(to_json(&decision.tags))
        .bind(decision.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(())
    }

    pub async fn get_decision(&self, id: &str) -> Result<Option<ProjectDecision>, AnamnesisError> {
        let row = sqlx::query("SELECT * FROM project_decisions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(row.map(|r| row_to_decision(&r)))
    }

    pub async fn get_decisions_by_session(&self, session_id: &str) -> Result<Vec<ProjectDecision>, AnamnesisError> {
        let rows = sqlx::query("SELECT * FROM project_decisions WHERE session_id = ? ORDER BY created_at ASC")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows.iter().map(row_to_decision).collect())
    }

    pub async fn get_recent_decisions(&self, limit: i64) -> Result<Vec<ProjectDecision>, AnamnesisError> {
        let rows = sqlx::query("SELECT * FROM project_decisions ORDER BY created_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows.iter().map(row_to_decision).collect())
    }

    // ---- ArchitecturalDecision ----------------------------------------------------

    pub async fn save_architectural_decision(&self, adr: &ArchitecturalDecision) -> Result<(), AnamnesisError> {
        sqlx::query(
            "INSERT INTO architectural_decisions
                (id, title, context, decision, status, consequences, created_at, updated_at)
             VALUES (?,?,?,?,?,?,?,?)
             ON CONFLICT(id) DO UPDATE SET
                title=excluded.title, context=excluded.context, decision=excluded.decision,
                status=excluded.status, consequences=excluded.consequences,
                updated_at=excluded.updated_at",
        )
        .bind(&adr.id)
        .bind(&adr.title)
        .bind(&adr.context)
        .bind(&adr.decision)
        .bind(&adr.status)
        .bind(&adr.consequences)
        .bind(adr.created_at.to_rfc3339())
        .bind(adr.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(())
    }

    pub async fn get_architectural_decision(&self, id: &str) -> Result<Option<ArchitecturalDecision>, AnamnesisError> {
        let row = sqlx::query("SELECT * FROM architectural_decisions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(row.map(|r| ArchitecturalDecision {
            id: r.get("id"),
            title: r.get("title"),
            context: r.get("context"),
            decision: r.get("decision"),
            status: r.get("status"),
            consequences: r.get("consequences"),
            created_at: parse_ts(r.get("created_at")),
            updated_at: parse_ts(r.get("updated_at")),
        }))
    }

    // ---- Auxiliary records (file_intelligence, project_metadata, feature_maps,
    // entry_points, key_directories, shared_patterns) -------------------------

    pub async fn save_file_intelligence(&self, record: &FileIntelligence) -> Result<(), AnamnesisError> {
        sqlx::query(
            "INSERT INTO file_intelligence (id, file_path, metadata, updated_at) VALUES (?,?,?,?)
             ON CONFLICT(id) DO UPDATE SET file_path=excluded.file_path, metadata=excluded.metadata,
                updated_at=excluded.updated_at",
        )
        .bind(&record.id)
        .bind(&record.file_path)
        .bind(to_json(&record.metadata))
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(())
    }

    pub async fn get_file_intelligence(&self, file_path: &str) -> Result<Option<FileIntelligence>, AnamnesisError> {
        let row = sqlx::query("SELECT * FROM file_intelligence WHERE file_path = ?")
            .bind(file_path)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(row.map(|r| FileIntelligence {
            id: r.get("id"),
            file_path: r.get("file_path"),
            metadata: meta_json(r.get("metadata")),
            updated_at: parse_ts(r.get("updated_at")),
        }))
    }

    pub async fn save_project_metadata(&self, record: &ProjectMetadata) -> Result<(), AnamnesisError> {
        sqlx::query(
            "INSERT INTO project_metadata (id, project_path, metadata, updated_at) VALUES (?,?,?,?)
             ON CONFLICT(id) DO UPDATE SET project_path=excluded.project_path,
                metadata=excluded.metadata, updated_at=excluded.updated_at",
        )
        .bind(&record.id)
        .bind(&record.project_path)
        .bind(to_json(&record.metadata))
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(())
    }

    pub async fn get_project_metadata(&self, project_path: &str) -> Result<Option<ProjectMetadata>, AnamnesisError> {
        let row = sqlx::query("SELECT * FROM project_metadata WHERE project_path = ?")
            .bind(project_path)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(row.map(|r| ProjectMetadata {
            id: r.get("id"),
            project_path: r.get("project_path"),
            metadata: meta_json(r.get("metadata")),
            updated_at: parse_ts(r.get("updated_at")),
        }))
    }

    pub async fn save_feature_map(&self, record: &FeatureMap) -> Result<(), AnamnesisError> {
        sqlx::query(
            "INSERT INTO feature_maps (id, name, metadata) VALUES (?,?,?)
             ON CONFLICT(id) DO UPDATE SET name=excluded.name, metadata=excluded.metadata",
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(to_json(&record.metadata))
        .execute(&self.pool)
        .await
        .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(())
    }

    pub async fn list_feature_maps(&self) -> Result<Vec<FeatureMap>, AnamnesisError> {
        let rows = sqlx::query("SELECT * FROM feature_maps")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows
            .iter()
            .map(|r| FeatureMap {
                id: r.get("id"),
                name: r.get("name"),
                metadata: meta_json(r.get("metadata")),
            })
            .collect())
    }

    pub async fn save_entry_point(&self, record: &EntryPoint) -> Result<(), AnamnesisError> {
        sqlx::query(
            "INSERT INTO entry_points (id, file_path, metadata) VALUES (?,?,?)
             ON CONFLICT(id) DO UPDATE SET file_path=excluded.file_path, metadata=excluded.metadata",
        )
        .bind(&record.id)
        .bind(&record.file_path)
        .bind(to_json(&record.metadata))
        .execute(&self.pool)
        .await
        .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(())
    }

    pub async fn list_entry_points(&self) -> Result<Vec<EntryPoint>, AnamnesisError> {
        let rows = sqlx::query("SELECT * FROM entry_points")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows
            .iter()
            .map(|r| EntryPoint {
                id: r.get("id"),
                file_path: r.get("file_path"),
                metadata: meta_json(r.get("metadata")),
            })
            .collect())
    }

    pub async fn save_key_directory(&self, record: &KeyDirectory) -> Result<(), AnamnesisError> {
        sqlx::query(
            "INSERT INTO key_directories (id, path, metadata) VALUES (?,?,?)
             ON CONFLICT(id) DO UPDATE SET path=excluded.path, metadata=excluded.metadata",
        )
        .bind(&record.id)
        .bind(&record.path)
        .bind(to_json(&record.metadata))
        .execute(&self.pool)
        .await
        .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(())
    }

    pub async fn list_key_directories(&self) -> Result<Vec<KeyDirectory>, AnamnesisError> {
        let rows = sqlx::query("SELECT * FROM key_directories")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows
            .iter()
            .map(|r| KeyDirectory {
                id: r.get("id"),
                path: r.get("path"),
                metadata: meta_json(r.get("metadata")),
            })
            .collect())
    }

    pub async fn save_shared_pattern(&self, record: &SharedPattern) -> Result<(), AnamnesisError> {
        sqlx::query(
            "INSERT INTO shared_patterns (id, name, metadata) VALUES (?,?,?)
             ON CONFLICT(id) DO UPDATE SET name=excluded.name, metadata=excluded.metadata",
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(to_json(&record.metadata))
        .execute(&self.pool)
        .await
        .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(())
    }

    pub async fn list_shared_patterns(&self) -> Result<Vec<SharedPattern>, AnamnesisError> {
        let rows = sqlx::query("SELECT * FROM shared_patterns")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows
            .iter()
            .map(|r| SharedPattern {
                id: r.get("id"),
                name: r.get("name"),
                metadata: meta_json(r.get("metadata")),
            })
            .collect())
    }
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_concept(row: &sqlx::sqlite::SqliteRow) -> SemanticConcept {
    SemanticConcept {
        id: row.get("id"),
        name: row.get("name"),
        concept_type: row.get("concept_type"),
        file_path: row.get("file_path"),
        description: row.get("description"),
        line_start: row.get::<i64, _>("line_start") as u32,
        line_end: row.get::<i64, _>("line_end") as u32,
        relationships: from_json::<Vec<Relationship>>(row.get("relationships")),
        confidence: row.get("confidence"),
        metadata: meta_json(row.get("metadata")),
        created_at: parse_ts(row.get("created_at")),
        updated_at: parse_ts(row.get("updated_at")),
    }
}

fn row_to_pattern(row: &sqlx::sqlite::SqliteRow) -> DeveloperPattern {
    DeveloperPattern {
        id: row.get("id"),
        pattern_type: row.get("pattern_type"),
        name: row.get("name"),
        frequency: row.get::<i64, _>("frequency") as u32,
        examples: from_json::<Vec<String>>(row.get("examples")),
        file_paths: from_json::<Vec<String>>(row.get("file_paths")),
        confidence: row.get("confidence"),
        created_at: parse_ts(row.get("created_at")),
        updated_at: parse_ts(row.get("updated_at")),
    }
}

fn row_to_insight(row: &sqlx::sqlite::SqliteRow) -> AIInsight {
    AIInsight {
        id: row.get("id"),
        insight_type: row.get("insight_type"),
        title: row.get("title"),
        description: row.get("description"),
        affected_files: from_json::<Vec<String>>(row.get("affected_files")),
        confidence: row.get("confidence"),
        severity: row.get("severity"),
        suggested_action: row.get("suggested_action"),
        metadata: meta_json(row.get("metadata")),
        created_at: parse_ts(row.get("created_at")),
    }
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> WorkSession {
    let ended_at: Option<String> = row.get("ended_at");
    WorkSession {
        id: row.get("id"),
        name: row.get("name"),
        feature: row.get("feature"),
        files: from_json::<Vec<String>>(row.get("files")),
        tasks: from_json::<Vec<String>>(row.get("tasks")),
        notes: row.get("notes"),
        started_at: parse_ts(row.get("started_at")),
        updated_at: parse_ts(row.get("updated_at")),
        ended_at: ended_at.map(|s| parse_ts(&s)),
        metadata: meta_json(row.get("metadata")),
    }
}

fn row_to_decision(row: &sqlx::sqlite::SqliteRow) -> ProjectDecision {
    ProjectDecision {
        id: row.get("id"),
        decision: row.get("decision"),
        context: row.get("context"),
        rationale: row.get("rationale"),
        session_id: row.get("session_id"),
        related_files: from_json::<Vec<String>>(row.get("related_files")),
        tags: from_json::<Vec<String>>(row.get("tags")),
        created_at: parse_ts(row.get("created_at")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_get_concept_round_trips() {
        let engine = StorageEngine::connect_in_memory().await.unwrap();
        let concept = SemanticConcept::new(
            "concept_1".into(),
            "UserService".into(),
            "CLASS".into(),
            "src/user.rs".into(),
        );
        engine.save_concept(&concept).await.unwrap();
        let fetched = engine.get_concept("concept_1").await.unwrap().unwrap();
        assert_eq!(fetched.name, "UserService");
        assert_eq!(fetched.file_path, "src/user.rs");
    }

    #[tokio::test]
    async fn upsert_overwrites_existing_concept() {
        let engine = StorageEngine::connect_in_memory().await.unwrap();
        let mut concept = SemanticConcept::new(
            "concept_1".into(),
            "Old".into(),
            "CLASS".into(),
            "src/a.rs".into(),
        );
        engine.save_concept(&concept).await.unwrap();
        concept.name = "New".into();
        engine.save_concept(&concept).await.unwrap();

        let fetched = engine.get_concept("concept_1").await.unwrap().unwrap();
        assert_eq!(fetched.name, "New");
    }

    #[tokio::test]
    async fn get_concepts_by_file_filters_correctly() {
        let engine = StorageEngine::connect_in_memory().await.unwrap();
        engine
            .save_concept(&SemanticConcept::new("c1".into(), "A".into(), "CLASS".into(), "src/a.rs".into()))
            .await
            .unwrap();
        engine
            .save_concept(&SemanticConcept::new("c2".into(), "B".into(), "CLASS".into(), "src/b.rs".into()))
            .await
            .unwrap();

        let results = engine.get_concepts_by_file("src/a.rs").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "A");
    }

    #[tokio::test]
    async fn delete_concept_returns_false_when_absent() {
        let engine = StorageEngine::connect_in_memory().await.unwrap();
        assert!(!engine.delete_concept("missing").await.unwrap());
    }

    #[tokio::test]
    async fn active_sessions_exclude_ended_ones() {
        let engine = StorageEngine::connect_in_memory().await.unwrap();
        let mut active = WorkSession::new("s1".into(), "one".into(), "f".into());
        let mut ended = WorkSession::new("s2".into(), "two".into(), "f".into());
        ended.ended_at = Some(Utc::now());
        engine.save_session(&active).await.unwrap();
        engine.save_session(&ended).await.unwrap();

        let actives = engine.get_active_sessions().await.unwrap();
        assert_eq!(actives.len(), 1);
        assert_eq!(actives[0].id, "s1");
        active.notes = "updated".into();
        engine.save_session(&active).await.unwrap();
    }

    #[tokio::test]
    async fn decisions_link_to_session() {
        let engine = StorageEngine::connect_in_memory().await.unwrap();
        let decision = ProjectDecision::new("d1".into(), "use sqlite".into(), Some("s1".into()));
        engine.save_decision(&decision).await.unwrap();

        let linked = engine.get_decisions_by_session("s1").await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].decision, "use sqlite");
    }

    #[tokio::test]
    async fn standalone_decision_has_no_session_id() {
        let engine = StorageEngine::connect_in_memory().await.unwrap();
        let decision = ProjectDecision::new("d2".into(), "standalone".into(), None);
        engine.save_decision(&decision).await.unwrap();

        let fetched = engine.get_decision("d2").await.unwrap().unwrap();
        assert_eq!(fetched.session_id, None);
    }
}
