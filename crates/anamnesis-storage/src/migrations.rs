// ABOUTME: Hand-rolled checksum-verified schema migrations over the embedded database.
// ABOUTME: Grounded on spec.md §4.6/§6.2; sqlx usage pattern adapted from marlonsc-mcb,
// ABOUTME: dropping its sea-orm/linkme distributed-slice machinery for a plain version table.

use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use anamnesis_core::error::AnamnesisError;

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub up_sql: &'static str,
    pub down_sql: Option<&'static str>,
    pub description: &'static str,
}

impl Migration {
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(canonicalize(self.up_sql).as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn canonicalize(sql: &str) -> String {
    sql.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub current_version: i64,
    pub latest_version: i64,
    pub pending_count: usize,
}

/// Owns the ordered list of schema migrations and applies them against a pool.
pub struct DatabaseMigrator {
    migrations: Vec<Migration>,
}

impl Default for DatabaseMigrator {
    fn default() -> Self {
        Self {
            migrations: vec![initial_migration()],
        }
    }
}

impl DatabaseMigrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_version(&self) -> i64 {
        self.migrations.iter().map(|m| m.version).max().unwrap_or(0)
    }

    async fn ensure_migrations_table(&self, pool: &SqlitePool) -> Result<(), AnamnesisError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                checksum TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(pool)
        .await
        .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn applied_versions(&self, pool: &SqlitePool) -> Result<Vec<i64>, AnamnesisError> {
        let rows = sqlx::query("SELECT version FROM _migrations ORDER BY version ASC")
            .fetch_all(pool)
            .await
            .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        Ok(rows.into_iter().map(|r| r.get::<i64, _>("version")).collect())
    }

    /// Apply every pending migration, each inside its own transaction. Idempotent:
    /// a second call with nothing pending applies nothing.
    pub async fn ensure_schema(&self, pool: &SqlitePool) -> Result<(), AnamnesisError> {
        self.ensure_migrations_table(pool).await?;
        let applied = self.applied_versions(pool).await?;

        let mut pending: Vec<&Migration> = self
            .migrations
            .iter()
            .filter(|m| !applied.contains(&m.version))
            .collect();
        pending.sort_by_key(|m| m.version);

        for migration in pending {
            let mut tx = pool
                .begin()
                .await
                .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
            sqlx::raw_sql(migration.up_sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| AnamnesisError::Storage(format!("migration {}: {e}", migration.version)))?;
            sqlx::query("INSERT INTO _migrations (version, name, checksum) VALUES (?, ?, ?)")
                .bind(migration.version)
                .bind(migration.name)
                .bind(migration.checksum())
                .execute(&mut *tx)
                .await
                .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
            tx.commit()
                .await
                .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
            tracing::info!(version = migration.version, name = migration.name, "applied migration");
        }
        Ok(())
    }

    /// Roll back to (and excluding) `target_version`, applying `down_sql` of every
    /// migration above it in descending order.
    pub async fn rollback(&self, pool: &SqlitePool, target_version: i64) -> Result<(), AnamnesisError> {
        let applied = self.applied_versions(pool).await?;
        let mut to_revert: Vec<&Migration> = self
            .migrations
            .iter()
            .filter(|m| applied.contains(&m.version) && m.version > target_version)
            .collect();
        to_revert.sort_by_key(|m| std::cmp::Reverse(m.version));

        for migration in &to_revert {
            let Some(down_sql) = migration.down_sql else {
                return Err(AnamnesisError::RollbackUnsupported {
                    version: migration.version,
                    name: migration.name.to_string(),
                });
            };
            let mut tx = pool
                .begin()
                .await
                .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
            sqlx::raw_sql(down_sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
            sqlx::query("DELETE FROM _migrations WHERE version = ?")
                .bind(migration.version)
                .execute(&mut *tx)
                .await
                .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
            tx.commit()
                .await
                .map_err(|e| AnamnesisError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    pub async fn get_status(&self, pool: &SqlitePool) -> Result<MigrationStatus, AnamnesisError> {
        self.ensure_migrations_table(pool).await?;
        let applied = self.applied_versions(pool).await?;
        let current_version = applied.iter().max().copied().unwrap_or(0);
        let latest_version = self.latest_version();
        let pending_count = self
            .migrations
            .iter()
            .filter(|m| !applied.contains(&m.version))
            .count();
        Ok(MigrationStatus {
            current_version,
            latest_version,
            pending_count,
        })
    }
}

fn initial_migration() -> Migration {
    Migration {
        version: 1,
        name: "initial_schema",
        description: "Creates all entity tables and their categorical indexes",
        down_sql: Some(
            "DROP TABLE IF EXISTS semantic_concepts;
             DROP TABLE IF EXISTS developer_patterns;
             DROP TABLE IF EXISTS ai_insights;
             DROP TABLE IF EXISTS work_sessions;
             DROP TABLE IF EXISTS project_decisions;
             DROP TABLE IF EXISTS architectural_decisions;
             DROP TABLE IF EXISTS file_intelligence;
             DROP TABLE IF EXISTS project_metadata;
             DROP TABLE IF EXISTS feature_maps;
             DROP TABLE IF EXISTS entry_points;
             DROP TABLE IF EXISTS key_directories;
             DROP TABLE IF EXISTS shared_patterns;",
        ),
        up_sql: "
            CREATE TABLE IF NOT EXISTS semantic_concepts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                concept_type TEXT NOT NULL,
                file_path TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                line_start INTEGER NOT NULL DEFAULT 0,
                line_end INTEGER NOT NULL DEFAULT 0,
                relationships TEXT NOT NULL DEFAULT '[]',
                confidence REAL NOT NULL DEFAULT 1.0,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_concepts_file_path ON semantic_concepts(file_path);
            CREATE INDEX IF NOT EXISTS idx_concepts_type ON semantic_concepts(concept_type);

            CREATE TABLE IF NOT EXISTS developer_patterns (
                id TEXT PRIMARY KEY,
                pattern_type TEXT NOT NULL,
                name TEXT NOT NULL,
                frequency INTEGER NOT NULL DEFAULT 1,
                examples TEXT NOT NULL DEFAULT '[]',
                file_paths TEXT NOT NULL DEFAULT '[]',
                confidence REAL NOT NULL DEFAULT 0.5,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_patterns_type ON developer_patterns(pattern_type);

            CREATE TABLE IF NOT EXISTS ai_insights (
                id TEXT PRIMARY KEY,
                insight_type TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                affected_files TEXT NOT NULL DEFAULT '[]',
                confidence REAL NOT NULL DEFAULT 0.5,
                severity TEXT NOT NULL DEFAULT 'info',
                suggested_action TEXT NOT NULL DEFAULT '',
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_insights_type ON ai_insights(insight_type);

            CREATE TABLE IF NOT EXISTS work_sessions (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                feature TEXT NOT NULL DEFAULT '',
                files TEXT NOT NULL DEFAULT '[]',
                tasks TEXT NOT NULL DEFAULT '[]',
                notes TEXT NOT NULL DEFAULT '',
                started_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                ended_at TEXT,
                metadata TEXT NOT NULL DEFAULT '{}'
            );

            CREATE TABLE IF NOT EXISTS project_decisions (
                id TEXT PRIMARY KEY,
                decision TEXT NOT NULL,
                context TEXT NOT NULL DEFAULT '',
                rationale TEXT NOT NULL DEFAULT '',
                session_id TEXT,
                related_files TEXT NOT NULL DEFAULT '[]',
                tags TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_decisions_session ON project_decisions(session_id);

            CREATE TABLE IF NOT EXISTS architectural_decisions (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                context TEXT NOT NULL DEFAULT '',
                decision TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'PROPOSED',
                consequences TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS file_intelligence (
                id TEXT PRIMARY KEY,
                file_path TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_file_intelligence_path ON file_intelligence(file_path);

            CREATE TABLE IF NOT EXISTS project_metadata (
                id TEXT PRIMARY KEY,
                project_path TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS feature_maps (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}'
            );

            CREATE TABLE IF NOT EXISTS entry_points (
                id TEXT PRIMARY KEY,
                file_path TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}'
            );

            CREATE TABLE IF NOT EXISTS key_directories (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}'
            );

            CREATE TABLE IF NOT EXISTS shared_patterns (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}'
            );
        ",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let pool = memory_pool().await;
        let migrator = DatabaseMigrator::new();
        migrator.ensure_schema(&pool).await.unwrap();
        migrator.ensure_schema(&pool).await.unwrap();

        let status = migrator.get_status(&pool).await.unwrap();
        assert_eq!(status.current_version, 1);
        assert_eq!(status.pending_count, 0);
    }

    #[tokio::test]
    async fn status_reports_pending_before_migrating() {
        let pool = memory_pool().await;
        let migrator = DatabaseMigrator::new();
        let status = migrator.get_status(&pool).await.unwrap();
        assert_eq!(status.current_version, 0);
        assert_eq!(status.pending_count, 1);
    }

    #[tokio::test]
    async fn rollback_without_down_sql_is_unsupported() {
        let pool = memory_pool().await;
        let migrator = DatabaseMigrator {
            migrations: vec![Migration {
                version: 1,
                name: "no_down",
                up_sql: "CREATE TABLE t (id TEXT)",
                down_sql: None,
                description: "",
            }],
        };
        migrator.ensure_schema(&pool).await.unwrap();
        let err = migrator.rollback(&pool, 0).await.unwrap_err();
        assert!(matches!(err, AnamnesisError::RollbackUnsupported { .. }));
    }

    #[test]
    fn checksum_ignores_incidental_whitespace() {
        let a = Migration {
            version: 1,
            name: "a",
            up_sql: "CREATE TABLE t (id TEXT)",
            down_sql: None,
            description: "",
        };
        let b = Migration {
            version: 1,
            name: "a",
            up_sql: "  CREATE TABLE t (id TEXT)  \n\n",
            down_sql: None,
            description: "",
        };
        assert_eq!(a.checksum(), b.checksum());
    }
}
