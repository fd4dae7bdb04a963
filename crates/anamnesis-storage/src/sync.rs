// ABOUTME: Synchronous façade over the async storage engine, for callers (services, the
// ABOUTME: tool server) that run on a blocking worker thread rather than inside tokio tasks.
// ABOUTME: Grounded on spec.md §4.6/§5 ("thin sync-over-async bridge") and DESIGN NOTES §9.

use std::path::Path;
use std::sync::Arc;

use anamnesis_core::error::AnamnesisError;
use sqlx::{Sqlite, Transaction};

use crate::engine::StorageEngine;
use crate::entities::{
    AIInsight, ArchitecturalDecision, DeveloperPattern, ProjectDecision, SemanticConcept,
    WorkSession,
};

/// Wraps `StorageEngine` with a private current-thread runtime and blocks on every
/// call, so services written against a synchronous API can drive the async engine
/// without spawning their own tasks.
pub struct SyncStorage {
    engine: Arc<StorageEngine>,
    runtime: tokio::runtime::Runtime,
}

impl SyncStorage {
    pub fn connect(db_path: &Path) -> Result<Self, AnamnesisError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(AnamnesisError::Io)?;
        let engine = runtime.block_on(StorageEngine::connect(db_path))?;
        Ok(Self {
            engine: Arc::new(engine),
            runtime,
        })
    }

    #[cfg(test)]
    pub fn connect_in_memory() -> Result<Self, AnamnesisError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(AnamnesisError::Io)?;
        let engine = runtime.block_on(StorageEngine::connect_in_memory())?;
        Ok(Self {
            engine: Arc::new(engine),
            runtime,
        })
    }

    fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    pub fn close(&self) {
        self.block_on(self.engine.close());
    }

    pub fn save_concept(&self, concept: &SemanticConcept) -> Result<(), AnamnesisError> {
        self.block_on(self.engine.save_concept(concept))
    }

    pub fn get_concept(&self, id: &str) -> Result<Option<SemanticConcept>, AnamnesisError> {
        self.block_on(self.engine.get_concept(id))
    }

    pub fn get_concepts_by_file(&self, file_path: &str) -> Result<Vec<SemanticConcept>, AnamnesisError> {
        self.block_on(self.engine.get_concepts_by_file(file_path))
    }

    pub fn count_concepts_by_file_prefix(&self, prefix: &str) -> Result<i64, AnamnesisError> {
        self.block_on(self.engine.count_concepts_by_file_prefix(prefix))
    }

    pub fn get_concepts_by_file_prefix(&self, prefix: &str) -> Result<Vec<SemanticConcept>, AnamnesisError> {
        self.block_on(self.engine.get_concepts_by_file_prefix(prefix))
    }

    pub fn list_concepts(&self) -> Result<Vec<SemanticConcept>, AnamnesisError> {
        self.block_on(self.engine.list_concepts())
    }

    pub fn search_concepts(&self, name_fragment: &str) -> Result<Vec<SemanticConcept>, AnamnesisError> {
        self.block_on(self.engine.search_concepts(name_fragment))
    }

    pub fn delete_concept(&self, id: &str) -> Result<bool, AnamnesisError> {
        self.block_on(self.engine.delete_concept(id))
    }

    pub fn save_pattern(&self, pattern: &DeveloperPattern) -> Result<(), AnamnesisError> {
        self.block_on(self.engine.save_pattern(pattern))
    }

    pub fn get_pattern(&self, id: &str) -> Result<Option<DeveloperPattern>, AnamnesisError> {
        self.block_on(self.engine.get_pattern(id))
    }

    pub fn list_patterns(&self) -> Result<Vec<DeveloperPattern>, AnamnesisError> {
        self.block_on(self.engine.list_patterns())
    }

    pub fn save_insight(&self, insight: &AIInsight) -> Result<(), AnamnesisError> {
        self.block_on(self.engine.save_insight(insight))
    }

    pub fn get_insights_by_type(&self, kind: &str) -> Result<Vec<AIInsight>, AnamnesisError> {
        self.block_on(self.engine.get_insights_by_type(kind))
    }

    pub fn save_session(&self, session: &WorkSession) -> Result<(), AnamnesisError> {
        self.block_on(self.engine.save_session(session))
    }

    pub fn get_session(&self, id: &str) -> Result<Option<WorkSession>, AnamnesisError> {
        self.block_on(self.engine.get_session(id))
    }

    pub fn get_active_sessions(&self) -> Result<Vec<WorkSession>, AnamnesisError> {
        self.block_on(self.engine.get_active_sessions())
    }

    pub fn get_recent_sessions(&self, limit: i64) -> Result<Vec<WorkSession>, AnamnesisError> {
        self.block_on(self.engine.get_recent_sessions(limit))
    }

    pub fn save_decision(&self, decision: &ProjectDecision) -> Result<(), AnamnesisError> {
        self.block_on(self.engine.save_decision(decision))
    }

    pub fn get_decision(&self, id: &str) -> Result<Option<ProjectDecision>, AnamnesisError> {
        self.block_on(self.engine.get_decision(id))
    }

    pub fn get_decisions_by_session(&self, session_id: &str) -> Result<Vec<ProjectDecision>, AnamnesisError> {
        self.block_on(self.engine.get_decisions_by_session(session_id))
    }

    pub fn get_recent_decisions(&self, limit: i64) -> Result<Vec<ProjectDecision>, AnamnesisError> {
        self.block_on(self.engine.get_recent_decisions(limit))
    }

    pub fn save_architectural_decision(&self, adr: &ArchitecturalDecision) -> Result<(), AnamnesisError> {
        self.block_on(self.engine.save_architectural_decision(adr))
    }

    /// Open a scoped batch: every concept/pattern/insight write issued through the
    /// returned guard shares one transaction, visible atomically on `commit()` and
    /// discarded if the guard is dropped (or `rollback()` is called) without committing.
    pub fn batch_context(&self) -> Result<BatchContext<'_>, AnamnesisError> {
        let tx = self
            .block_on(self.engine.pool().begin())
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(BatchContext {
            storage: self,
            tx: Some(tx),
        })
    }
}

/// A scoped transaction guard. Writes go through the same connection; the
/// transaction commits on `commit()` and rolls back on `Drop` if never committed
/// (matching a batch scope that exits via an error/panic rather than success).
pub struct BatchContext<'a> {
    storage: &'a SyncStorage,
    tx: Option<Transaction<'static, Sqlite>>,
}

impl<'a> BatchContext<'a> {
    pub fn save_concept(&mut self, concept: &SemanticConcept) -> Result<(), AnamnesisError> {
        let tx = self.tx.as_mut().expect("batch already closed");
        self.storage.block_on(insert_concept(tx, concept))
    }

    pub fn save_pattern(&mut self, pattern: &DeveloperPattern) -> Result<(), AnamnesisError> {
        let tx = self.tx.as_mut().expect("batch already closed");
        self.storage.block_on(insert_pattern(tx, pattern))
    }

    pub fn save_insight(&mut self, insight: &AIInsight) -> Result<(), AnamnesisError> {
        let tx = self.tx.as_mut().expect("batch already closed");
        self.storage.block_on(insert_insight(tx, insight))
    }

    /// Commit all writes issued so far. Consumes the guard's transaction; a second
    /// call (or a later drop) is then a no-op.
    pub fn commit(mut self) -> Result<(), AnamnesisError> {
        if let Some(tx) = self.tx.take() {
            self.storage
                .block_on(tx.commit())
                .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    pub fn rollback(mut self) -> Result<(), AnamnesisError> {
        if let Some(tx) = self.tx.take() {
            self.storage
                .block_on(tx.rollback())
                .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}

impl<'a> Drop for BatchContext<'a> {
    fn drop(&mut self) {
        // An uncommitted transaction rolls back implicitly when dropped by sqlx;
        // this just avoids a dangling `block_on` inside a `Drop` by letting the
        // pool reclaim the connection on its own.
        self.tx.take();
    }
}

async fn insert_concept(
    tx: &mut Transaction<'static, Sqlite>,
    concept: &SemanticConcept,
) -> Result<(), AnamnesisError> {
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
    .bind(serde_json::to_string(&concept.relationships).unwrap_or_default())
    .bind(concept.confidence)
    .bind(serde_json::to_string(&concept.metadata).unwrap_or_default())
    .bind(concept.created_at.to_rfc3339())
    .bind(concept.updated_at.to_rfc3339())
    .execute(&mut **tx)
    .await
    .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
    Ok(())
}

async fn insert_pattern(
    tx: &mut Transaction<'static, Sqlite>,
    pattern: &DeveloperPattern,
) -> Result<(), AnamnesisError> {
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
    .bind(serde_json::to_string(&pattern.examples).unwrap_or_default())
    .bind(serde_json::to_string(&pattern.file_paths).unwrap_or_default())
    .bind(pattern.confidence)
    .bind(pattern.created_at.to_rfc3339())
    .bind(pattern.updated_at.to_rfc3339())
    .execute(&mut **tx)
    .await
    .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
    Ok(())
}

async fn insert_insight(
    tx: &mut Transaction<'static, Sqlite>,
    insight: &AIInsight,
) -> Result<(), AnamnesisError> {
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
    .bind(serde_json::to_string(&insight.affected_files).unwrap_or_default())
    .bind(insight.confidence)
    .bind(&insight.severity)
    .bind(&insight.suggested_action)
    .bind(serde_json::to_string(&insight.metadata).unwrap_or_default())
    .bind(insight.created_at.to_rfc3339())
    .execute(&mut **tx)
    .await
    .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_commit_persists_all_writes() {
        let storage = SyncStorage::connect_in_memory().unwrap();
        {
            let mut batch = storage.batch_context().unwrap();
            batch
                .save_concept(&SemanticConcept::new(
                    "c1".into(),
                    "A".into(),
                    "CLASS".into(),
                    "src/a.rs".into(),
                ))
                .unwrap();
            batch
                .save_concept(&SemanticConcept::new(
                    "c2".into(),
                    "B".into(),
                    "CLASS".into(),
                    "src/b.rs".into(),
                ))
                .unwrap();
            batch.commit().unwrap();
        }

        assert!(storage.get_concept("c1").unwrap().is_some());
        assert!(storage.get_concept("c2").unwrap().is_some());
    }

    #[test]
    fn batch_rollback_discards_all_writes() {
        let storage = SyncStorage::connect_in_memory().unwrap();
        {
            let mut batch = storage.batch_context().unwrap();
            batch
                .save_concept(&SemanticConcept::new(
                    "c1".into(),
                    "A".into(),
                    "CLASS".into(),
                    "src/a.rs".into(),
                ))
                .unwrap();
            batch.rollback().unwrap();
        }

        assert!(storage.get_concept("c1").unwrap().is_none());
    }

    #[test]
    fn dropped_batch_without_commit_does_not_persist() {
        let storage = SyncStorage::connect_in_memory().unwrap();
        {
            let mut batch = storage.batch_context().unwrap();
            batch
                .save_concept(&SemanticConcept::new(
                    "c1".into(),
                    "A".into(),
                    "CLASS".into(),
                    "src/a.rs".into(),
                ))
                .unwrap();
        }

        assert!(storage.get_concept("c1").unwrap().is_none());
    }

    #[test]
    fn outside_batch_each_save_commits_immediately() {
        let storage = SyncStorage::connect_in_memory().unwrap();
        storage
            .save_concept(&SemanticConcept::new(
                "c1".into(),
                "A".into(),
                "CLASS".into(),
                "src/a.rs".into(),
            ))
            .unwrap();
        assert!(storage.get_concept("c1").unwrap().is_some());
    }
}
