//! SQLite connection management and schema (`spec.md` §6 "Persistence").

use manuscript_types::{ManuscriptError, Result};
use sqlx::SqlitePool;
use std::path::Path;

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| ManuscriptError::Database(format!("failed to connect: {e}")))?;
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await
            .map_err(|e| ManuscriptError::Database(format!("failed to enable WAL: {e}")))?;
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .map_err(|e| ManuscriptError::Database(format!("failed to enable foreign keys: {e}")))?;
        Ok(Self { pool })
    }

    pub async fn new_in_memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    pub async fn new_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let url = format!("sqlite:{}", path.as_ref().display());
        Self::new(&url).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create every table the knowledge graph needs (`spec.md` §6): projects,
    /// chapters, mentions, entities, merge history, attributes, alerts,
    /// snapshots, and voice profiles. All timestamps are stored as RFC3339
    /// text, matching how `chrono::DateTime<Utc>` round-trips through sqlx.
    pub async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_analyzed_at TEXT,
                collection_id TEXT,
                collection_order INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("projects"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chapters (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                idx INTEGER NOT NULL,
                title TEXT,
                text TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("chapters"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                canonical_name TEXT NOT NULL,
                aliases TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                importance TEXT NOT NULL,
                first_appearance_char INTEGER NOT NULL,
                mention_count INTEGER NOT NULL,
                is_active INTEGER NOT NULL,
                merged_from_ids TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("entities"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS merge_history (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                primary_id TEXT NOT NULL,
                source_ids TEXT NOT NULL,
                reassigned_mentions TEXT NOT NULL,
                source_snapshots TEXT NOT NULL,
                combined_aliases TEXT NOT NULL,
                total_mention_delta INTEGER NOT NULL,
                actor TEXT NOT NULL,
                created_at TEXT NOT NULL,
                undone INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("merge_history"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mentions (
                id TEXT PRIMARY KEY,
                chapter_id TEXT,
                entity_id TEXT,
                surface_form TEXT NOT NULL,
                start_char INTEGER NOT NULL,
                end_char INTEGER NOT NULL,
                mention_type TEXT NOT NULL,
                gender TEXT NOT NULL,
                number TEXT NOT NULL,
                sentence_idx INTEGER NOT NULL,
                sentence_idx_basis TEXT NOT NULL,
                context_before TEXT NOT NULL,
                context_after TEXT NOT NULL,
                source TEXT NOT NULL,
                confidence REAL NOT NULL,
                metadata TEXT NOT NULL,
                FOREIGN KEY (chapter_id) REFERENCES chapters (id),
                FOREIGN KEY (entity_id) REFERENCES entities (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("mentions"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS attributes (
                id TEXT PRIMARY KEY,
                entity_id TEXT NOT NULL,
                category TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                confidence REAL NOT NULL,
                verified INTEGER NOT NULL,
                first_mention_chapter TEXT,
                FOREIGN KEY (entity_id) REFERENCES entities (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("attributes"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                category TEXT NOT NULL,
                alert_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                status TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                explanation TEXT NOT NULL,
                suggestion TEXT NOT NULL,
                excerpt TEXT NOT NULL,
                chapter INTEGER,
                start_char INTEGER,
                end_char INTEGER,
                confidence REAL NOT NULL,
                content_hash TEXT NOT NULL,
                related_entity_ids TEXT NOT NULL,
                extra_data TEXT NOT NULL,
                previous_snapshot_alert_id TEXT,
                match_confidence REAL,
                resolution_reason TEXT,
                FOREIGN KEY (project_id) REFERENCES projects (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("alerts"))?;

        // Partial unique index: only one *open* alert per content hash per
        // project (`spec.md` §4.9 "unique-on-open"). SQLite's partial index
        // support lets the database itself reject a duplicate insert rather
        // than relying solely on the application-level check in AlertEngine.
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_open_content_hash
            ON alerts (project_id, content_hash)
            WHERE status IN ('New', 'Open', 'Acknowledged', 'InProgress')
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("idx_alerts_open_content_hash"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                word_count INTEGER NOT NULL,
                chapter_count INTEGER NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("snapshots"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshot_entity_diffs (
                snapshot_id TEXT PRIMARY KEY,
                added_entity_ids TEXT NOT NULL,
                removed_entity_ids TEXT NOT NULL,
                FOREIGN KEY (snapshot_id) REFERENCES snapshots (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("snapshot_entity_diffs"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coreference_corrections (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                chapter_index INTEGER NOT NULL,
                mention_start_char INTEGER NOT NULL,
                mention_end_char INTEGER NOT NULL,
                corrected_entity_id TEXT,
                correction_type TEXT NOT NULL,
                notes TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("coreference_corrections"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS speaker_corrections (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                chapter_index INTEGER NOT NULL,
                dialogue_start_char INTEGER NOT NULL,
                dialogue_end_char INTEGER NOT NULL,
                corrected_speaker_id TEXT,
                notes TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("speaker_corrections"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rejected_entities (
                project_id TEXT NOT NULL,
                surface_lower TEXT NOT NULL,
                PRIMARY KEY (project_id, surface_lower),
                FOREIGN KEY (project_id) REFERENCES projects (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("rejected_entities"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS project_entity_overrides (
                project_id TEXT NOT NULL,
                mention_id TEXT NOT NULL,
                verdict TEXT NOT NULL,
                PRIMARY KEY (project_id, mention_id),
                FOREIGN KEY (project_id) REFERENCES projects (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("project_entity_overrides"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("collections"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collection_entity_links (
                id TEXT PRIMARY KEY,
                collection_id TEXT NOT NULL,
                source_project_id TEXT NOT NULL,
                source_entity_id TEXT NOT NULL,
                target_project_id TEXT NOT NULL,
                target_entity_id TEXT NOT NULL,
                similarity REAL NOT NULL,
                match_type TEXT NOT NULL,
                FOREIGN KEY (collection_id) REFERENCES collections (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("collection_entity_links"))?;

        // A source/target entity pair is asserted equal at most once per
        // collection (`spec.md` §3 "Entity Link": "pair is unique").
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_entity_links_pair
            ON collection_entity_links (collection_id, source_entity_id, target_entity_id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("idx_entity_links_pair"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS editorial_rules (
                project_id TEXT PRIMARY KEY,
                rules_text TEXT NOT NULL,
                enabled INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("editorial_rules"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS timeline_events (
                project_id TEXT PRIMARY KEY,
                document_fingerprint TEXT NOT NULL,
                events_json TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("timeline_events"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS temporal_markers (
                chapter_id TEXT PRIMARY KEY,
                markers_json TEXT NOT NULL,
                FOREIGN KEY (chapter_id) REFERENCES chapters (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("temporal_markers"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS voice_profiles (
                id TEXT PRIMARY KEY,
                entity_id TEXT NOT NULL UNIQUE,
                document_fingerprint TEXT NOT NULL,
                discrete TEXT NOT NULL,
                continuous TEXT NOT NULL,
                sample_line_count INTEGER NOT NULL,
                FOREIGN KEY (entity_id) REFERENCES entities (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(schema_err("voice_profiles"))?;

        Ok(())
    }

    pub async fn health_check(&self) -> Result<bool> {
        let row: (i64,) = sqlx::query_as("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ManuscriptError::Database(format!("health check failed: {e}")))?;
        Ok(row.0 == 1)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn schema_err(table: &'static str) -> impl Fn(sqlx::Error) -> ManuscriptError {
    move |e| ManuscriptError::Database(format!("failed to create {table} table: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initializes_schema_and_passes_health_check() {
        let db = DatabaseManager::new_in_memory().await.unwrap();
        db.initialize_schema().await.unwrap();
        assert!(db.health_check().await.unwrap());
    }
}
