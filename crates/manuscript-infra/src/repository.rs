//! SQLite implementations of the `manuscript-core` repository traits.

use crate::database::DatabaseManager;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use manuscript_core::alert::{Alert, AlertSeverity, AlertStatus, ResolutionReason};
use manuscript_core::attribute::{Attribute, AttributeCategory};
use manuscript_core::entity::{Entity, EntityType, Importance, MergeHistoryEntry};
use manuscript_core::mention::{Gender, Mention, MentionSource, MentionType, Number, SentenceIdxBasis};
use manuscript_core::filters::FilterVerdict;
use manuscript_core::repository::{
    AlertRepository, AttributeRepository, Chapter, ChapterRepository, Collection, CollectionRepository,
    CorrectionRepository, CorrectionType, CoreferenceCorrection, EditorialRuleRepository, EditorialRules, EntityLink,
    EntityLinkMatchType, EntityRepository, FilterRepository, MentionRepository, Project, ProjectRepository, Snapshot,
    SnapshotRepository, SpeakerCorrection, TemporalRepository, VoiceProfileRepository,
};
use manuscript_core::temporal::{TemporalMarker, TimelineEvent};
use manuscript_core::voice::{ContinuousMetrics, DiscreteMetrics, VoiceProfile};
use manuscript_types::{ManuscriptError, Result};
use sqlx::Row;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

pub struct SqliteRepository {
    db: Arc<DatabaseManager>,
}

impl SqliteRepository {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }
}

fn db_err(e: sqlx::Error) -> ManuscriptError {
    ManuscriptError::Database(e.to_string())
}

fn ser<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(ManuscriptError::from)
}

fn de<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(ManuscriptError::from)
}

/// `AlertStatus` is stored as its bare variant name (not JSON) so the
/// partial unique index's `WHERE status IN (...)` clause and the
/// `list_open_alerts` query can compare against it directly.
fn status_to_text(status: AlertStatus) -> &'static str {
    match status {
        AlertStatus::New => "New",
        AlertStatus::Open => "Open",
        AlertStatus::Acknowledged => "Acknowledged",
        AlertStatus::InProgress => "InProgress",
        AlertStatus::Resolved => "Resolved",
    }
}

fn status_from_text(text: &str) -> Result<AlertStatus> {
    match text {
        "New" => Ok(AlertStatus::New),
        "Open" => Ok(AlertStatus::Open),
        "Acknowledged" => Ok(AlertStatus::Acknowledged),
        "InProgress" => Ok(AlertStatus::InProgress),
        "Resolved" => Ok(AlertStatus::Resolved),
        other => Err(ManuscriptError::Internal(format!("unknown alert status {other}"))),
    }
}

#[async_trait]
impl ProjectRepository for SqliteRepository {
    async fn create_project(&self, project: Project) -> Result<Uuid> {
        sqlx::query("INSERT INTO projects (id, name, created_at, last_analyzed_at) VALUES (?, ?, ?, ?)")
            .bind(project.id.to_string())
            .bind(&project.name)
            .bind(project.created_at.to_rfc3339())
            .bind(project.last_analyzed_at.map(|d| d.to_rfc3339()))
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(project.id)
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT id, name, created_at, last_analyzed_at FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_err)?;
        row.map(project_from_row).transpose()
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query("SELECT id, name, created_at, last_analyzed_at FROM projects")
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err)?;
        rows.into_iter().map(project_from_row).collect()
    }

    async fn touch_last_analyzed(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE projects SET last_analyzed_at = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

fn project_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Project> {
    let id: String = row.try_get("id").map_err(db_err)?;
    let created_at: String = row.try_get("created_at").map_err(db_err)?;
    let last_analyzed_at: Option<String> = row.try_get("last_analyzed_at").map_err(db_err)?;
    Ok(Project {
        id: parse_uuid(&id)?,
        name: row.try_get("name").map_err(db_err)?,
        created_at: parse_dt(&created_at)?,
        last_analyzed_at: last_analyzed_at.map(|s| parse_dt(&s)).transpose()?,
    })
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| ManuscriptError::Internal(format!("invalid uuid {s}: {e}")))
}

fn parse_dt(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ManuscriptError::Internal(format!("invalid timestamp {s}: {e}")))
}

#[async_trait]
impl ChapterRepository for SqliteRepository {
    async fn put_chapters(&self, project_id: Uuid, chapters: Vec<Chapter>) -> Result<()> {
        let mut tx = self.db.pool().begin().await.map_err(db_err)?;
        for chapter in chapters {
            sqlx::query("INSERT OR REPLACE INTO chapters (id, project_id, idx, title, text) VALUES (?, ?, ?, ?, ?)")
                .bind(chapter.id.to_string())
                .bind(project_id.to_string())
                .bind(chapter.index)
                .bind(&chapter.title)
                .bind(&chapter.text)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn list_chapters(&self, project_id: Uuid) -> Result<Vec<Chapter>> {
        let rows = sqlx::query("SELECT id, project_id, idx, title, text FROM chapters WHERE project_id = ? ORDER BY idx")
            .bind(project_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err)?;
        rows.into_iter().map(chapter_from_row).collect()
    }

    async fn get_chapter(&self, id: Uuid) -> Result<Option<Chapter>> {
        let row = sqlx::query("SELECT id, project_id, idx, title, text FROM chapters WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_err)?;
        row.map(chapter_from_row).transpose()
    }
}

fn chapter_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Chapter> {
    let id: String = row.try_get("id").map_err(db_err)?;
    let project_id: String = row.try_get("project_id").map_err(db_err)?;
    Ok(Chapter {
        id: parse_uuid(&id)?,
        project_id: parse_uuid(&project_id)?,
        index: row.try_get("idx").map_err(db_err)?,
        title: row.try_get("title").map_err(db_err)?,
        text: row.try_get("text").map_err(db_err)?,
    })
}

#[async_trait]
impl MentionRepository for SqliteRepository {
    async fn put_mentions(&self, chapter_id: Uuid, mentions: Vec<Mention>) -> Result<()> {
        let mut tx = self.db.pool().begin().await.map_err(db_err)?;
        for mention in mentions {
            sqlx::query(
                r#"INSERT OR REPLACE INTO mentions
                (id, chapter_id, entity_id, surface_form, start_char, end_char, mention_type, gender, number,
                 sentence_idx, sentence_idx_basis, context_before, context_after, source, confidence, metadata)
                VALUES (?, ?, NULL, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(mention.id.to_string())
            .bind(chapter_id.to_string())
            .bind(&mention.surface_form)
            .bind(mention.start_char as i64)
            .bind(mention.end_char as i64)
            .bind(ser(&mention.mention_type)?)
            .bind(ser(&mention.gender)?)
            .bind(ser(&mention.number)?)
            .bind(mention.sentence_idx as i64)
            .bind(ser(&mention.sentence_idx_basis)?)
            .bind(&mention.context_before)
            .bind(&mention.context_after)
            .bind(ser(&mention.source)?)
            .bind(mention.confidence)
            .bind(ser(&mention.metadata)?)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn list_mentions(&self, chapter_id: Uuid) -> Result<Vec<Mention>> {
        let rows = sqlx::query("SELECT * FROM mentions WHERE chapter_id = ? ORDER BY start_char")
            .bind(chapter_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err)?;
        rows.into_iter().map(mention_from_row).collect()
    }

    async fn list_mentions_for_entity(&self, entity_id: Uuid) -> Result<Vec<Mention>> {
        let rows = sqlx::query("SELECT * FROM mentions WHERE entity_id = ? ORDER BY start_char")
            .bind(entity_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err)?;
        rows.into_iter().map(mention_from_row).collect()
    }

    async fn assign_entity(&self, mention_id: Uuid, entity_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE mentions SET entity_id = ? WHERE id = ?")
            .bind(entity_id.to_string())
            .bind(mention_id.to_string())
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

fn mention_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Mention> {
    let id: String = row.try_get("id").map_err(db_err)?;
    let mention_type: String = row.try_get("mention_type").map_err(db_err)?;
    let gender: String = row.try_get("gender").map_err(db_err)?;
    let number: String = row.try_get("number").map_err(db_err)?;
    let basis: String = row.try_get("sentence_idx_basis").map_err(db_err)?;
    let source: String = row.try_get("source").map_err(db_err)?;
    let metadata: String = row.try_get("metadata").map_err(db_err)?;

    Ok(Mention {
        id: parse_uuid(&id)?,
        surface_form: row.try_get("surface_form").map_err(db_err)?,
        start_char: row.try_get::<i64, _>("start_char").map_err(db_err)? as usize,
        end_char: row.try_get::<i64, _>("end_char").map_err(db_err)? as usize,
        chapter_id: row
            .try_get::<Option<String>, _>("chapter_id")
            .map_err(db_err)?
            .map(|s| parse_uuid(&s))
            .transpose()?,
        mention_type: de::<MentionType>(&mention_type)?,
        gender: de::<Gender>(&gender)?,
        number: de::<Number>(&number)?,
        sentence_idx: row.try_get::<i64, _>("sentence_idx").map_err(db_err)? as usize,
        sentence_idx_basis: de::<SentenceIdxBasis>(&basis)?,
        context_before: row.try_get("context_before").map_err(db_err)?,
        context_after: row.try_get("context_after").map_err(db_err)?,
        source: de::<MentionSource>(&source)?,
        confidence: row.try_get("confidence").map_err(db_err)?,
        metadata: de(&metadata)?,
    })
}

#[async_trait]
impl EntityRepository for SqliteRepository {
    async fn create_entity(&self, entity: Entity) -> Result<Uuid> {
        sqlx::query(
            r#"INSERT INTO entities
            (id, project_id, canonical_name, aliases, entity_type, importance, first_appearance_char,
             mention_count, is_active, merged_from_ids)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entity.id.to_string())
        .bind(entity.project_id.to_string())
        .bind(&entity.canonical_name)
        .bind(ser(&entity.aliases)?)
        .bind(ser(&entity.entity_type)?)
        .bind(ser(&entity.importance)?)
        .bind(entity.first_appearance_char as i64)
        .bind(entity.mention_count as i64)
        .bind(entity.is_active)
        .bind(ser(&entity.merged_from_ids)?)
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;
        Ok(entity.id)
    }

    async fn get_entity(&self, id: Uuid) -> Result<Option<Entity>> {
        let row = sqlx::query("SELECT * FROM entities WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_err)?;
        row.map(entity_from_row).transpose()
    }

    async fn update_entity(&self, entity: &Entity) -> Result<()> {
        sqlx::query(
            r#"UPDATE entities SET canonical_name = ?, aliases = ?, entity_type = ?, importance = ?,
               first_appearance_char = ?, mention_count = ?, is_active = ?, merged_from_ids = ? WHERE id = ?"#,
        )
        .bind(&entity.canonical_name)
        .bind(ser(&entity.aliases)?)
        .bind(ser(&entity.entity_type)?)
        .bind(ser(&entity.importance)?)
        .bind(entity.first_appearance_char as i64)
        .bind(entity.mention_count as i64)
        .bind(entity.is_active)
        .bind(ser(&entity.merged_from_ids)?)
        .bind(entity.id.to_string())
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_entities(&self, project_id: Uuid) -> Result<Vec<Entity>> {
        let rows = sqlx::query("SELECT * FROM entities WHERE project_id = ?")
            .bind(project_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err)?;
        rows.into_iter().map(entity_from_row).collect()
    }

    async fn record_merge(&self, entry: MergeHistoryEntry) -> Result<Uuid> {
        sqlx::query(
            r#"INSERT INTO merge_history
            (id, project_id, primary_id, source_ids, reassigned_mentions, source_snapshots,
             combined_aliases, total_mention_delta, actor, created_at, undone)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(entry.project_id.to_string())
        .bind(entry.primary_id.to_string())
        .bind(ser(&entry.source_ids)?)
        .bind(ser(&entry.reassigned_mentions)?)
        .bind(ser(&entry.source_snapshots)?)
        .bind(ser(&entry.combined_aliases)?)
        .bind(entry.total_mention_delta as i64)
        .bind(&entry.actor)
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.undone)
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;
        Ok(entry.id)
    }

    async fn get_merge_history(&self, id: Uuid) -> Result<Option<MergeHistoryEntry>> {
        let row = sqlx::query("SELECT * FROM merge_history WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_err)?;
        row.map(merge_history_from_row).transpose()
    }

    async fn mark_merge_undone(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE merge_history SET undone = 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

fn entity_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Entity> {
    let id: String = row.try_get("id").map_err(db_err)?;
    let project_id: String = row.try_get("project_id").map_err(db_err)?;
    let aliases: String = row.try_get("aliases").map_err(db_err)?;
    let entity_type: String = row.try_get("entity_type").map_err(db_err)?;
    let importance: String = row.try_get("importance").map_err(db_err)?;
    let merged_from_ids: String = row.try_get("merged_from_ids").map_err(db_err)?;

    Ok(Entity {
        id: parse_uuid(&id)?,
        project_id: parse_uuid(&project_id)?,
        canonical_name: row.try_get("canonical_name").map_err(db_err)?,
        aliases: de::<HashSet<String>>(&aliases)?,
        entity_type: de::<EntityType>(&entity_type)?,
        importance: de::<Importance>(&importance)?,
        first_appearance_char: row.try_get::<i64, _>("first_appearance_char").map_err(db_err)? as usize,
        mention_count: row.try_get::<i64, _>("mention_count").map_err(db_err)? as u64,
        is_active: row.try_get("is_active").map_err(db_err)?,
        merged_from_ids: de::<Vec<Uuid>>(&merged_from_ids)?,
    })
}

fn merge_history_from_row(row: sqlx::sqlite::SqliteRow) -> Result<MergeHistoryEntry> {
    let id: String = row.try_get("id").map_err(db_err)?;
    let project_id: String = row.try_get("project_id").map_err(db_err)?;
    let primary_id: String = row.try_get("primary_id").map_err(db_err)?;
    let source_ids: String = row.try_get("source_ids").map_err(db_err)?;
    let reassigned_mentions: String = row.try_get("reassigned_mentions").map_err(db_err)?;
    let source_snapshots: String = row.try_get("source_snapshots").map_err(db_err)?;
    let combined_aliases: String = row.try_get("combined_aliases").map_err(db_err)?;
    let created_at: String = row.try_get("created_at").map_err(db_err)?;

    Ok(MergeHistoryEntry {
        id: parse_uuid(&id)?,
        project_id: parse_uuid(&project_id)?,
        primary_id: parse_uuid(&primary_id)?,
        source_ids: de(&source_ids)?,
        reassigned_mentions: de(&reassigned_mentions)?,
        source_snapshots: de(&source_snapshots)?,
        combined_aliases: de(&combined_aliases)?,
        total_mention_delta: row.try_get::<i64, _>("total_mention_delta").map_err(db_err)? as u64,
        actor: row.try_get("actor").map_err(db_err)?,
        created_at: parse_dt(&created_at)?,
        undone: row.try_get("undone").map_err(db_err)?,
    })
}

#[async_trait]
impl AttributeRepository for SqliteRepository {
    async fn put_attributes(&self, entity_id: Uuid, attributes: Vec<Attribute>) -> Result<()> {
        let mut tx = self.db.pool().begin().await.map_err(db_err)?;
        for attribute in attributes {
            sqlx::query(
                r#"INSERT OR REPLACE INTO attributes
                (id, entity_id, category, key, value, confidence, verified, first_mention_chapter)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(attribute.id.to_string())
            .bind(entity_id.to_string())
            .bind(ser(&attribute.category)?)
            .bind(&attribute.key)
            .bind(&attribute.value)
            .bind(attribute.confidence)
            .bind(attribute.verified)
            .bind(attribute.first_mention_chapter.map(|id| id.to_string()))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn list_attributes(&self, entity_id: Uuid) -> Result<Vec<Attribute>> {
        let rows = sqlx::query("SELECT * FROM attributes WHERE entity_id = ?")
            .bind(entity_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err)?;
        rows.into_iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(db_err)?;
                let entity_id: String = row.try_get("entity_id").map_err(db_err)?;
                let category: String = row.try_get("category").map_err(db_err)?;
                let first_mention_chapter: Option<String> = row.try_get("first_mention_chapter").map_err(db_err)?;
                Ok(Attribute {
                    id: parse_uuid(&id)?,
                    entity_id: parse_uuid(&entity_id)?,
                    category: de::<AttributeCategory>(&category)?,
                    key: row.try_get("key").map_err(db_err)?,
                    value: row.try_get("value").map_err(db_err)?,
                    confidence: row.try_get("confidence").map_err(db_err)?,
                    verified: row.try_get("verified").map_err(db_err)?,
                    first_mention_chapter: first_mention_chapter.map(|s| parse_uuid(&s)).transpose()?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl AlertRepository for SqliteRepository {
    async fn submit_alert(&self, alert: Alert) -> Result<Option<Uuid>> {
        // SELECT-then-INSERT inside one transaction, same authoritative
        // check as `idx_alerts_open_content_hash`. The application-level
        // check is what usually catches a duplicate; the unique index is
        // the backstop for the race between two concurrent submissions,
        // and its violation is translated back into the same `Ok(None)`
        // this function returns for an application-level duplicate
        // (`spec.md` §9: a caller never sees the difference).
        let mut tx = self.db.pool().begin().await.map_err(db_err)?;

        let existing = sqlx::query(
            r#"SELECT id FROM alerts WHERE project_id = ? AND content_hash = ?
               AND status IN ('New', 'Open', 'Acknowledged', 'InProgress')"#,
        )
        .bind(alert.project_id.to_string())
        .bind(&alert.content_hash)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        if existing.is_some() {
            tx.rollback().await.map_err(db_err)?;
            return Ok(None);
        }

        let insert_result = sqlx::query(
            r#"INSERT INTO alerts
            (id, project_id, category, alert_type, severity, status, title, description, explanation, suggestion,
             excerpt, chapter, start_char, end_char, confidence, content_hash, related_entity_ids, extra_data,
             previous_snapshot_alert_id, match_confidence, resolution_reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(alert.id.to_string())
        .bind(alert.project_id.to_string())
        .bind(&alert.category)
        .bind(&alert.alert_type)
        .bind(ser(&alert.severity)?)
        .bind(status_to_text(alert.status))
        .bind(&alert.title)
        .bind(&alert.description)
        .bind(&alert.explanation)
        .bind(&alert.suggestion)
        .bind(&alert.excerpt)
        .bind(alert.chapter)
        .bind(alert.start_char.map(|v| v as i64))
        .bind(alert.end_char.map(|v| v as i64))
        .bind(alert.confidence)
        .bind(&alert.content_hash)
        .bind(ser(&alert.related_entity_ids)?)
        .bind(alert.extra_data.to_string())
        .bind(alert.previous_snapshot_alert_id.map(|id| id.to_string()))
        .bind(alert.match_confidence)
        .bind(alert.resolution_reason.map(|r| ser(&r)).transpose()?)
        .execute(&mut *tx)
        .await;

        match insert_result {
            Ok(_) => {
                tx.commit().await.map_err(db_err)?;
                Ok(Some(alert.id))
            }
            Err(sqlx::Error::Database(db_error)) if db_error.is_unique_violation() => {
                tx.rollback().await.map_err(db_err)?;
                Ok(None)
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>> {
        let row = sqlx::query("SELECT * FROM alerts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_err)?;
        row.map(alert_from_row).transpose()
    }

    async fn list_alerts(&self, project_id: Uuid) -> Result<Vec<Alert>> {
        let rows = sqlx::query("SELECT * FROM alerts WHERE project_id = ?")
            .bind(project_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err)?;
        rows.into_iter().map(alert_from_row).collect()
    }

    async fn list_open_alerts(&self, project_id: Uuid) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            "SELECT * FROM alerts WHERE project_id = ? AND status IN ('New', 'Open', 'Acknowledged', 'InProgress')",
        )
        .bind(project_id.to_string())
        .fetch_all(self.db.pool())
        .await
        .map_err(db_err)?;
        rows.into_iter().map(alert_from_row).collect()
    }

    async fn update_alert_status(&self, id: Uuid, status: AlertStatus) -> Result<()> {
        sqlx::query("UPDATE alerts SET status = ? WHERE id = ?")
            .bind(status_to_text(status))
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn resolve_alert(&self, id: Uuid, reason: ResolutionReason) -> Result<()> {
        sqlx::query("UPDATE alerts SET status = ?, resolution_reason = ? WHERE id = ?")
            .bind(status_to_text(AlertStatus::Resolved))
            .bind(ser(&reason)?)
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn link_to_previous(&self, new_id: Uuid, previous_id: Uuid, match_confidence: f64) -> Result<()> {
        sqlx::query("UPDATE alerts SET previous_snapshot_alert_id = ?, match_confidence = ? WHERE id = ?")
            .bind(previous_id.to_string())
            .bind(match_confidence)
            .bind(new_id.to_string())
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

fn alert_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Alert> {
    let id: String = row.try_get("id").map_err(db_err)?;
    let project_id: String = row.try_get("project_id").map_err(db_err)?;
    let severity: String = row.try_get("severity").map_err(db_err)?;
    let status: String = row.try_get("status").map_err(db_err)?;
    let related_entity_ids: String = row.try_get("related_entity_ids").map_err(db_err)?;
    let extra_data: String = row.try_get("extra_data").map_err(db_err)?;
    let previous_snapshot_alert_id: Option<String> = row.try_get("previous_snapshot_alert_id").map_err(db_err)?;
    let resolution_reason: Option<String> = row.try_get("resolution_reason").map_err(db_err)?;

    Ok(Alert {
        id: parse_uuid(&id)?,
        project_id: parse_uuid(&project_id)?,
        category: row.try_get("category").map_err(db_err)?,
        alert_type: row.try_get("alert_type").map_err(db_err)?,
        severity: de::<AlertSeverity>(&severity)?,
        status: status_from_text(&status)?,
        title: row.try_get("title").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        explanation: row.try_get("explanation").map_err(db_err)?,
        suggestion: row.try_get("suggestion").map_err(db_err)?,
        excerpt: row.try_get("excerpt").map_err(db_err)?,
        chapter: row.try_get("chapter").map_err(db_err)?,
        start_char: row.try_get::<Option<i64>, _>("start_char").map_err(db_err)?.map(|v| v as usize),
        end_char: row.try_get::<Option<i64>, _>("end_char").map_err(db_err)?.map(|v| v as usize),
        confidence: row.try_get("confidence").map_err(db_err)?,
        content_hash: row.try_get("content_hash").map_err(db_err)?,
        related_entity_ids: de(&related_entity_ids)?,
        extra_data: serde_json::from_str(&extra_data).map_err(ManuscriptError::from)?,
        previous_snapshot_alert_id: previous_snapshot_alert_id.map(|s| parse_uuid(&s)).transpose()?,
        match_confidence: row.try_get("match_confidence").map_err(db_err)?,
        resolution_reason: resolution_reason.map(|s| de::<ResolutionReason>(&s)).transpose()?,
    })
}

#[async_trait]
impl SnapshotRepository for SqliteRepository {
    async fn create_snapshot(&self, snapshot: Snapshot) -> Result<Uuid> {
        sqlx::query(
            "INSERT INTO snapshots (id, project_id, created_at, fingerprint, word_count, chapter_count) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(snapshot.id.to_string())
        .bind(snapshot.project_id.to_string())
        .bind(snapshot.created_at.to_rfc3339())
        .bind(&snapshot.fingerprint)
        .bind(snapshot.word_count)
        .bind(snapshot.chapter_count)
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;
        Ok(snapshot.id)
    }

    async fn list_snapshots(&self, project_id: Uuid) -> Result<Vec<Snapshot>> {
        let rows = sqlx::query("SELECT * FROM snapshots WHERE project_id = ? ORDER BY created_at DESC")
            .bind(project_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err)?;
        rows.into_iter().map(snapshot_from_row).collect()
    }

    async fn get_latest_snapshot(&self, project_id: Uuid) -> Result<Option<Snapshot>> {
        let row = sqlx::query("SELECT * FROM snapshots WHERE project_id = ? ORDER BY created_at DESC LIMIT 1")
            .bind(project_id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_err)?;
        row.map(snapshot_from_row).transpose()
    }

    async fn prune_snapshots(&self, project_id: Uuid, retain_newest: usize) -> Result<usize> {
        let all = self.list_snapshots(project_id).await?;
        if all.len() <= retain_newest {
            return Ok(0);
        }
        let to_prune = &all[retain_newest..];
        for snapshot in to_prune {
            sqlx::query("DELETE FROM snapshots WHERE id = ?")
                .bind(snapshot.id.to_string())
                .execute(self.db.pool())
                .await
                .map_err(db_err)?;
        }
        Ok(to_prune.len())
    }

    async fn record_entity_diff(&self, snapshot_id: Uuid, added_entity_ids: &[Uuid], removed_entity_ids: &[Uuid]) -> Result<()> {
        sqlx::query("INSERT INTO snapshot_entity_diffs (snapshot_id, added_entity_ids, removed_entity_ids) VALUES (?, ?, ?)")
            .bind(snapshot_id.to_string())
            .bind(ser(&added_entity_ids.iter().map(Uuid::to_string).collect::<Vec<_>>())?)
            .bind(ser(&removed_entity_ids.iter().map(Uuid::to_string).collect::<Vec<_>>())?)
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_entity_diff(&self, snapshot_id: Uuid) -> Result<Option<(Vec<Uuid>, Vec<Uuid>)>> {
        let row = sqlx::query("SELECT added_entity_ids, removed_entity_ids FROM snapshot_entity_diffs WHERE snapshot_id = ?")
            .bind(snapshot_id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_err)?;
        let Some(row) = row else { return Ok(None) };
        let added: String = row.try_get("added_entity_ids").map_err(db_err)?;
        let removed: String = row.try_get("removed_entity_ids").map_err(db_err)?;
        let added_ids: Vec<String> = de(&added)?;
        let removed_ids: Vec<String> = de(&removed)?;
        Ok(Some((
            added_ids.iter().map(|s| parse_uuid(s)).collect::<Result<Vec<_>>>()?,
            removed_ids.iter().map(|s| parse_uuid(s)).collect::<Result<Vec<_>>>()?,
        )))
    }
}

fn snapshot_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Snapshot> {
    let id: String = row.try_get("id").map_err(db_err)?;
    let project_id: String = row.try_get("project_id").map_err(db_err)?;
    let created_at: String = row.try_get("created_at").map_err(db_err)?;
    Ok(Snapshot {
        id: parse_uuid(&id)?,
        project_id: parse_uuid(&project_id)?,
        created_at: parse_dt(&created_at)?,
        fingerprint: row.try_get("fingerprint").map_err(db_err)?,
        word_count: row.try_get("word_count").map_err(db_err)?,
        chapter_count: row.try_get("chapter_count").map_err(db_err)?,
    })
}

#[async_trait]
impl VoiceProfileRepository for SqliteRepository {
    async fn put_profile(&self, profile: VoiceProfile) -> Result<()> {
        sqlx::query(
            r#"INSERT OR REPLACE INTO voice_profiles
            (id, entity_id, document_fingerprint, discrete, continuous, sample_line_count)
            VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(profile.id.to_string())
        .bind(profile.entity_id.to_string())
        .bind(&profile.document_fingerprint)
        .bind(ser(&profile.discrete)?)
        .bind(ser(&profile.continuous)?)
        .bind(profile.sample_line_count as i64)
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_profile(&self, entity_id: Uuid) -> Result<Option<VoiceProfile>> {
        let row = sqlx::query("SELECT * FROM voice_profiles WHERE entity_id = ?")
            .bind(entity_id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_err)?;
        row.map(|row| {
            let id: String = row.try_get("id").map_err(db_err)?;
            let entity_id: String = row.try_get("entity_id").map_err(db_err)?;
            let discrete: String = row.try_get("discrete").map_err(db_err)?;
            let continuous: String = row.try_get("continuous").map_err(db_err)?;
            Ok(VoiceProfile {
                id: parse_uuid(&id)?,
                entity_id: parse_uuid(&entity_id)?,
                document_fingerprint: row.try_get("document_fingerprint").map_err(db_err)?,
                discrete: de::<DiscreteMetrics>(&discrete)?,
                continuous: de::<ContinuousMetrics>(&continuous)?,
                sample_line_count: row.try_get::<i64, _>("sample_line_count").map_err(db_err)? as u64,
            })
        })
        .transpose()
    }
}

fn correction_type_to_text(t: CorrectionType) -> &'static str {
    match t {
        CorrectionType::Reassign => "Reassign",
        CorrectionType::Unlink => "Unlink",
        CorrectionType::Confirm => "Confirm",
    }
}

fn correction_type_from_text(text: &str) -> Result<CorrectionType> {
    match text {
        "Reassign" => Ok(CorrectionType::Reassign),
        "Unlink" => Ok(CorrectionType::Unlink),
        "Confirm" => Ok(CorrectionType::Confirm),
        other => Err(ManuscriptError::Internal(format!("unknown correction type {other}"))),
    }
}

fn match_type_to_text(t: EntityLinkMatchType) -> &'static str {
    match t {
        EntityLinkMatchType::Exact => "Exact",
        EntityLinkMatchType::Fuzzy => "Fuzzy",
        EntityLinkMatchType::Manual => "Manual",
    }
}

fn match_type_from_text(text: &str) -> Result<EntityLinkMatchType> {
    match text {
        "Exact" => Ok(EntityLinkMatchType::Exact),
        "Fuzzy" => Ok(EntityLinkMatchType::Fuzzy),
        "Manual" => Ok(EntityLinkMatchType::Manual),
        other => Err(ManuscriptError::Internal(format!("unknown entity link match type {other}"))),
    }
}

fn filter_verdict_to_text(v: FilterVerdict) -> &'static str {
    match v {
        FilterVerdict::Accept => "Accept",
        FilterVerdict::Reject => "Reject",
    }
}

fn filter_verdict_from_text(text: &str) -> Result<FilterVerdict> {
    match text {
        "Accept" => Ok(FilterVerdict::Accept),
        "Reject" => Ok(FilterVerdict::Reject),
        other => Err(ManuscriptError::Internal(format!("unknown filter verdict {other}"))),
    }
}

#[async_trait]
impl CorrectionRepository for SqliteRepository {
    async fn create_coreference_correction(&self, correction: CoreferenceCorrection) -> Result<Uuid> {
        sqlx::query(
            r#"INSERT INTO coreference_corrections
            (id, project_id, chapter_index, mention_start_char, mention_end_char, corrected_entity_id,
             correction_type, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(correction.id.to_string())
        .bind(correction.project_id.to_string())
        .bind(correction.chapter_index)
        .bind(correction.mention_start_char as i64)
        .bind(correction.mention_end_char as i64)
        .bind(correction.corrected_entity_id.map(|id| id.to_string()))
        .bind(correction_type_to_text(correction.correction_type))
        .bind(&correction.notes)
        .bind(correction.created_at.to_rfc3339())
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;
        Ok(correction.id)
    }

    async fn list_coreference_corrections(&self, project_id: Uuid) -> Result<Vec<CoreferenceCorrection>> {
        let rows = sqlx::query("SELECT * FROM coreference_corrections WHERE project_id = ?")
            .bind(project_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err)?;
        rows.into_iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(db_err)?;
                let project_id: String = row.try_get("project_id").map_err(db_err)?;
                let corrected_entity_id: Option<String> = row.try_get("corrected_entity_id").map_err(db_err)?;
                let correction_type: String = row.try_get("correction_type").map_err(db_err)?;
                let created_at: String = row.try_get("created_at").map_err(db_err)?;
                Ok(CoreferenceCorrection {
                    id: parse_uuid(&id)?,
                    project_id: parse_uuid(&project_id)?,
                    chapter_index: row.try_get("chapter_index").map_err(db_err)?,
                    mention_start_char: row.try_get::<i64, _>("mention_start_char").map_err(db_err)? as usize,
                    mention_end_char: row.try_get::<i64, _>("mention_end_char").map_err(db_err)? as usize,
                    corrected_entity_id: corrected_entity_id.map(|s| parse_uuid(&s)).transpose()?,
                    correction_type: correction_type_from_text(&correction_type)?,
                    notes: row.try_get("notes").map_err(db_err)?,
                    created_at: parse_dt(&created_at)?,
                })
            })
            .collect()
    }

    async fn delete_coreference_correction(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM coreference_corrections WHERE id = ?")
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn create_speaker_correction(&self, correction: SpeakerCorrection) -> Result<Uuid> {
        sqlx::query(
            r#"INSERT INTO speaker_corrections
            (id, project_id, chapter_index, dialogue_start_char, dialogue_end_char, corrected_speaker_id,
             notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(correction.id.to_string())
        .bind(correction.project_id.to_string())
        .bind(correction.chapter_index)
        .bind(correction.dialogue_start_char as i64)
        .bind(correction.dialogue_end_char as i64)
        .bind(correction.corrected_speaker_id.map(|id| id.to_string()))
        .bind(&correction.notes)
        .bind(correction.created_at.to_rfc3339())
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;
        Ok(correction.id)
    }

    async fn list_speaker_corrections(&self, project_id: Uuid) -> Result<Vec<SpeakerCorrection>> {
        let rows = sqlx::query("SELECT * FROM speaker_corrections WHERE project_id = ?")
            .bind(project_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err)?;
        rows.into_iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(db_err)?;
                let project_id: String = row.try_get("project_id").map_err(db_err)?;
                let corrected_speaker_id: Option<String> = row.try_get("corrected_speaker_id").map_err(db_err)?;
                let created_at: String = row.try_get("created_at").map_err(db_err)?;
                Ok(SpeakerCorrection {
                    id: parse_uuid(&id)?,
                    project_id: parse_uuid(&project_id)?,
                    chapter_index: row.try_get("chapter_index").map_err(db_err)?,
                    dialogue_start_char: row.try_get::<i64, _>("dialogue_start_char").map_err(db_err)? as usize,
                    dialogue_end_char: row.try_get::<i64, _>("dialogue_end_char").map_err(db_err)? as usize,
                    corrected_speaker_id: corrected_speaker_id.map(|s| parse_uuid(&s)).transpose()?,
                    notes: row.try_get("notes").map_err(db_err)?,
                    created_at: parse_dt(&created_at)?,
                })
            })
            .collect()
    }

    async fn delete_speaker_correction(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM speaker_corrections WHERE id = ?")
            .bind(id.to_string())
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl FilterRepository for SqliteRepository {
    async fn list_rejected_entities(&self, project_id: Uuid) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT surface_lower FROM rejected_entities WHERE project_id = ?")
            .bind(project_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err)?;
        rows.into_iter().map(|row| row.try_get("surface_lower").map_err(db_err)).collect()
    }

    async fn reject_entity(&self, project_id: Uuid, surface_lower: String) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO rejected_entities (project_id, surface_lower) VALUES (?, ?)")
            .bind(project_id.to_string())
            .bind(surface_lower)
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn unreject_entity(&self, project_id: Uuid, surface_lower: &str) -> Result<()> {
        sqlx::query("DELETE FROM rejected_entities WHERE project_id = ? AND surface_lower = ?")
            .bind(project_id.to_string())
            .bind(surface_lower)
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn list_filter_overrides(&self, project_id: Uuid) -> Result<HashMap<Uuid, FilterVerdict>> {
        let rows = sqlx::query("SELECT mention_id, verdict FROM project_entity_overrides WHERE project_id = ?")
            .bind(project_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err)?;
        rows.into_iter()
            .map(|row| {
                let mention_id: String = row.try_get("mention_id").map_err(db_err)?;
                let verdict: String = row.try_get("verdict").map_err(db_err)?;
                Ok((parse_uuid(&mention_id)?, filter_verdict_from_text(&verdict)?))
            })
            .collect()
    }

    async fn set_filter_override(&self, project_id: Uuid, mention_id: Uuid, verdict: FilterVerdict) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO project_entity_overrides (project_id, mention_id, verdict) VALUES (?, ?, ?)
            ON CONFLICT (project_id, mention_id) DO UPDATE SET verdict = excluded.verdict"#,
        )
        .bind(project_id.to_string())
        .bind(mention_id.to_string())
        .bind(filter_verdict_to_text(verdict))
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl CollectionRepository for SqliteRepository {
    async fn create_collection(&self, collection: Collection) -> Result<Uuid> {
        sqlx::query("INSERT INTO collections (id, name, created_at) VALUES (?, ?, ?)")
            .bind(collection.id.to_string())
            .bind(&collection.name)
            .bind(collection.created_at.to_rfc3339())
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(collection.id)
    }

    async fn assign_project_to_collection(&self, project_id: Uuid, collection_id: Uuid, order: i64) -> Result<()> {
        sqlx::query("UPDATE projects SET collection_id = ?, collection_order = ? WHERE id = ?")
            .bind(collection_id.to_string())
            .bind(order)
            .bind(project_id.to_string())
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn project_collection(&self, project_id: Uuid) -> Result<Option<Uuid>> {
        let row = sqlx::query("SELECT collection_id FROM projects WHERE id = ?")
            .bind(project_id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_err)?;
        let Some(row) = row else { return Ok(None) };
        let collection_id: Option<String> = row.try_get("collection_id").map_err(db_err)?;
        collection_id.map(|s| parse_uuid(&s)).transpose()
    }

    async fn create_entity_link(&self, link: EntityLink) -> Result<Option<Uuid>> {
        let result = sqlx::query(
            r#"INSERT INTO collection_entity_links
            (id, collection_id, source_project_id, source_entity_id, target_project_id, target_entity_id,
             similarity, match_type)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(link.id.to_string())
        .bind(link.collection_id.to_string())
        .bind(link.source_project_id.to_string())
        .bind(link.source_entity_id.to_string())
        .bind(link.target_project_id.to_string())
        .bind(link.target_entity_id.to_string())
        .bind(link.similarity)
        .bind(match_type_to_text(link.match_type))
        .execute(self.db.pool())
        .await;

        match result {
            Ok(_) => Ok(Some(link.id)),
            Err(sqlx::Error::Database(db_error)) if db_error.is_unique_violation() => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn list_entity_links(&self, collection_id: Uuid) -> Result<Vec<EntityLink>> {
        let rows = sqlx::query("SELECT * FROM collection_entity_links WHERE collection_id = ?")
            .bind(collection_id.to_string())
            .fetch_all(self.db.pool())
            .await
            .map_err(db_err)?;
        rows.into_iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(db_err)?;
                let collection_id: String = row.try_get("collection_id").map_err(db_err)?;
                let source_project_id: String = row.try_get("source_project_id").map_err(db_err)?;
                let source_entity_id: String = row.try_get("source_entity_id").map_err(db_err)?;
                let target_project_id: String = row.try_get("target_project_id").map_err(db_err)?;
                let target_entity_id: String = row.try_get("target_entity_id").map_err(db_err)?;
                let match_type: String = row.try_get("match_type").map_err(db_err)?;
                Ok(EntityLink {
                    id: parse_uuid(&id)?,
                    collection_id: parse_uuid(&collection_id)?,
                    source_project_id: parse_uuid(&source_project_id)?,
                    source_entity_id: parse_uuid(&source_entity_id)?,
                    target_project_id: parse_uuid(&target_project_id)?,
                    target_entity_id: parse_uuid(&target_entity_id)?,
                    similarity: row.try_get("similarity").map_err(db_err)?,
                    match_type: match_type_from_text(&match_type)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl EditorialRuleRepository for SqliteRepository {
    async fn get_editorial_rules(&self, project_id: Uuid) -> Result<Option<EditorialRules>> {
        let row = sqlx::query("SELECT rules_text, enabled FROM editorial_rules WHERE project_id = ?")
            .bind(project_id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_err)?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(EditorialRules {
            rules_text: row.try_get("rules_text").map_err(db_err)?,
            enabled: row.try_get::<i64, _>("enabled").map_err(db_err)? != 0,
        }))
    }

    async fn set_editorial_rules(&self, project_id: Uuid, rules: EditorialRules) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"INSERT INTO editorial_rules (project_id, rules_text, enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (project_id) DO UPDATE SET rules_text = excluded.rules_text, enabled = excluded.enabled,
                updated_at = excluded.updated_at"#,
        )
        .bind(project_id.to_string())
        .bind(&rules.rules_text)
        .bind(rules.enabled as i64)
        .bind(&now)
        .bind(&now)
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl TemporalRepository for SqliteRepository {
    async fn save_timeline(&self, project_id: Uuid, document_fingerprint: &str, events: &[TimelineEvent]) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO timeline_events (project_id, document_fingerprint, events_json, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (project_id) DO UPDATE SET document_fingerprint = excluded.document_fingerprint,
                events_json = excluded.events_json, updated_at = excluded.updated_at"#,
        )
        .bind(project_id.to_string())
        .bind(document_fingerprint)
        .bind(ser(&events)?)
        .bind(Utc::now().to_rfc3339())
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_timeline(&self, project_id: Uuid, document_fingerprint: &str) -> Result<Option<Vec<TimelineEvent>>> {
        let row = sqlx::query("SELECT document_fingerprint, events_json FROM timeline_events WHERE project_id = ?")
            .bind(project_id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_err)?;
        let Some(row) = row else { return Ok(None) };
        let stored_fingerprint: String = row.try_get("document_fingerprint").map_err(db_err)?;
        if stored_fingerprint != document_fingerprint {
            return Ok(None);
        }
        let events_json: String = row.try_get("events_json").map_err(db_err)?;
        Ok(Some(de(&events_json)?))
    }

    async fn save_markers(&self, chapter_id: Uuid, markers: &[TemporalMarker]) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO temporal_markers (chapter_id, markers_json) VALUES (?, ?)
            ON CONFLICT (chapter_id) DO UPDATE SET markers_json = excluded.markers_json"#,
        )
        .bind(chapter_id.to_string())
        .bind(ser(&markers)?)
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_markers(&self, chapter_id: Uuid) -> Result<Vec<TemporalMarker>> {
        let row = sqlx::query("SELECT markers_json FROM temporal_markers WHERE chapter_id = ?")
            .bind(chapter_id.to_string())
            .fetch_optional(self.db.pool())
            .await
            .map_err(db_err)?;
        let Some(row) = row else { return Ok(Vec::new()) };
        let markers_json: String = row.try_get("markers_json").map_err(db_err)?;
        de(&markers_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_core::repository::Project;

    async fn repo() -> SqliteRepository {
        let db = DatabaseManager::new_in_memory().await.unwrap();
        db.initialize_schema().await.unwrap();
        SqliteRepository::new(Arc::new(db))
    }

    #[tokio::test]
    async fn round_trips_a_project() {
        let repo = repo().await;
        let project = Project {
            id: Uuid::new_v4(),
            name: "La casa verde".to_string(),
            created_at: Utc::now(),
            last_analyzed_at: None,
        };
        let id = repo.create_project(project.clone()).await.unwrap();
        let fetched = repo.get_project(id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "La casa verde");
    }

    #[tokio::test]
    async fn submitting_duplicate_open_alert_is_rejected() {
        let repo = repo().await;
        let project = Project { id: Uuid::new_v4(), name: "p".to_string(), created_at: Utc::now(), last_analyzed_at: None };
        repo.create_project(project.clone()).await.unwrap();

        let new_alert = manuscript_core::alert::NewAlert {
            project_id: project.id,
            category: "grammar".to_string(),
            alert_type: "agreement_error".to_string(),
            severity: manuscript_core::alert::AlertSeverity::Warning,
            title: "t".to_string(),
            description: "d".to_string(),
            explanation: "e".to_string(),
            suggestion: "s".to_string(),
            excerpt: "texto".to_string(),
            chapter: Some(1),
            start_char: Some(10),
            end_char: Some(20),
            confidence: 0.9,
            related_entity_ids: vec![],
            extra_data: serde_json::json!({}),
            key_fields: vec![],
        };
        let first = new_alert.clone().into_alert();
        let second = new_alert.into_alert();

        let first_result = repo.submit_alert(first).await.unwrap();
        assert!(first_result.is_some());
        let second_result = repo.submit_alert(second).await.unwrap();
        assert!(second_result.is_none());
    }

    async fn seeded_project(repo: &SqliteRepository) -> Uuid {
        let project = Project { id: Uuid::new_v4(), name: "p".to_string(), created_at: Utc::now(), last_analyzed_at: None };
        repo.create_project(project.clone()).await.unwrap();
        project.id
    }

    #[tokio::test]
    async fn reassign_correction_round_trips_with_maximum_authority_intact() {
        let repo = repo().await;
        let project_id = seeded_project(&repo).await;
        let corrected_entity_id = Uuid::new_v4();
        let correction = CoreferenceCorrection {
            id: Uuid::new_v4(),
            project_id,
            chapter_index: 2,
            mention_start_char: 100,
            mention_end_char: 106,
            corrected_entity_id: Some(corrected_entity_id),
            correction_type: CorrectionType::Reassign,
            notes: "era el hermano, no el padre".to_string(),
            created_at: Utc::now(),
        };
        repo.create_coreference_correction(correction).await.unwrap();

        let stored = repo.list_coreference_corrections(project_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].correction_type, CorrectionType::Reassign);
        assert_eq!(stored[0].corrected_entity_id, Some(corrected_entity_id));
    }

    #[tokio::test]
    async fn deleting_a_speaker_correction_removes_it() {
        let repo = repo().await;
        let project_id = seeded_project(&repo).await;
        let correction = SpeakerCorrection {
            id: Uuid::new_v4(),
            project_id,
            chapter_index: 0,
            dialogue_start_char: 50,
            dialogue_end_char: 80,
            corrected_speaker_id: Some(Uuid::new_v4()),
            notes: String::new(),
            created_at: Utc::now(),
        };
        let id = repo.create_speaker_correction(correction).await.unwrap();
        repo.delete_speaker_correction(id).await.unwrap();
        assert!(repo.list_speaker_corrections(project_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_entity_can_be_listed_then_unrejected() {
        let repo = repo().await;
        let project_id = seeded_project(&repo).await;
        repo.reject_entity(project_id, "el sol".to_string()).await.unwrap();
        let rejected = repo.list_rejected_entities(project_id).await.unwrap();
        assert!(rejected.contains("el sol"));

        repo.unreject_entity(project_id, "el sol").await.unwrap();
        assert!(repo.list_rejected_entities(project_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn setting_a_filter_override_twice_updates_rather_than_duplicates() {
        let repo = repo().await;
        let project_id = seeded_project(&repo).await;
        let mention_id = Uuid::new_v4();
        repo.set_filter_override(project_id, mention_id, FilterVerdict::Reject).await.unwrap();
        repo.set_filter_override(project_id, mention_id, FilterVerdict::Accept).await.unwrap();

        let overrides = repo.list_filter_overrides(project_id).await.unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[&mention_id], FilterVerdict::Accept);
    }

    #[tokio::test]
    async fn entity_link_pair_is_unique_within_a_collection() {
        let repo = repo().await;
        let project_a = seeded_project(&repo).await;
        let project_b = seeded_project(&repo).await;
        let collection_id = repo
            .create_collection(Collection { id: Uuid::new_v4(), name: "saga".to_string(), created_at: Utc::now() })
            .await
            .unwrap();
        repo.assign_project_to_collection(project_a, collection_id, 0).await.unwrap();
        repo.assign_project_to_collection(project_b, collection_id, 1).await.unwrap();
        assert_eq!(repo.project_collection(project_a).await.unwrap(), Some(collection_id));

        let source_entity_id = Uuid::new_v4();
        let target_entity_id = Uuid::new_v4();
        let make_link = || EntityLink {
            id: Uuid::new_v4(),
            collection_id,
            source_project_id: project_a,
            source_entity_id,
            target_project_id: project_b,
            target_entity_id,
            similarity: 0.95,
            match_type: EntityLinkMatchType::Fuzzy,
        };
        let first = repo.create_entity_link(make_link()).await.unwrap();
        assert!(first.is_some());
        let second = repo.create_entity_link(make_link()).await.unwrap();
        assert!(second.is_none());
        assert_eq!(repo.list_entity_links(collection_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn editorial_rules_round_trip_and_stay_disableable() {
        let repo = repo().await;
        let project_id = seeded_project(&repo).await;
        assert!(repo.get_editorial_rules(project_id).await.unwrap().is_none());

        repo.set_editorial_rules(
            project_id,
            EditorialRules { rules_text: "a pasos agigantados".to_string(), enabled: true },
        )
        .await
        .unwrap();
        let rules = repo.get_editorial_rules(project_id).await.unwrap().unwrap();
        assert!(rules.enabled);

        repo.set_editorial_rules(project_id, EditorialRules { rules_text: rules.rules_text, enabled: false })
            .await
            .unwrap();
        assert!(!repo.get_editorial_rules(project_id).await.unwrap().unwrap().enabled);
    }

    #[tokio::test]
    async fn timeline_cache_misses_once_the_fingerprint_changes() {
        let repo = repo().await;
        let project_id = seeded_project(&repo).await;
        let events = vec![TimelineEvent {
            id: Uuid::new_v4(),
            chapter_id: Uuid::new_v4(),
            char_pos: 0,
            narrative_order: 0,
            day_offset: Some(0),
            is_flashback_marked: false,
        }];
        repo.save_timeline(project_id, "fp-1", &events).await.unwrap();

        let hit = repo.get_timeline(project_id, "fp-1").await.unwrap();
        assert_eq!(hit.map(|e| e.len()), Some(1));

        let miss = repo.get_timeline(project_id, "fp-2").await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn markers_round_trip_per_chapter() {
        let repo = repo().await;
        let project_id = seeded_project(&repo).await;
        let chapter_id = Uuid::new_v4();
        repo.put_chapters(
            project_id,
            vec![manuscript_core::repository::Chapter {
                id: chapter_id,
                project_id,
                index: 0,
                title: None,
                text: "Tres años después, volvió al pueblo.".to_string(),
            }],
        )
        .await
        .unwrap();
        assert!(repo.get_markers(chapter_id).await.unwrap().is_empty());

        let markers = manuscript_core::temporal::extract_markers("Tres años después, volvió al pueblo.");
        repo.save_markers(chapter_id, &markers).await.unwrap();
        let fetched = repo.get_markers(chapter_id).await.unwrap();
        assert_eq!(fetched.len(), markers.len());
    }
}
