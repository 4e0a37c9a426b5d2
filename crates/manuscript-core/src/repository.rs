//! Repository traits the knowledge graph is persisted through
//! (`spec.md` §6 "Persistence"). `manuscript-infra` provides the SQLite
//! implementations; `manuscript-cognitive` depends only on these traits so
//! pipeline stages are testable against an in-memory fake.

use crate::alert::Alert;
use crate::attribute::Attribute;
use crate::entity::{Entity, MergeHistoryEntry};
use crate::filters::FilterVerdict;
use crate::mention::Mention;
use crate::temporal::{TemporalMarker, TimelineEvent};
use crate::voice::VoiceProfile;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use manuscript_types::Result;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_analyzed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Chapter {
    pub id: Uuid,
    pub project_id: Uuid,
    pub index: i64,
    pub title: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: Uuid,
    pub project_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub fingerprint: String,
    pub word_count: i64,
    pub chapter_count: i64,
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait ProjectRepository: Send + Sync {
    async fn create_project(&self, project: Project) -> Result<Uuid>;
    async fn get_project(&self, id: Uuid) -> Result<Option<Project>>;
    async fn list_projects(&self) -> Result<Vec<Project>>;
    async fn touch_last_analyzed(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait ChapterRepository: Send + Sync {
    async fn put_chapters(&self, project_id: Uuid, chapters: Vec<Chapter>) -> Result<()>;
    async fn list_chapters(&self, project_id: Uuid) -> Result<Vec<Chapter>>;
    async fn get_chapter(&self, id: Uuid) -> Result<Option<Chapter>>;
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait MentionRepository: Send + Sync {
    async fn put_mentions(&self, chapter_id: Uuid, mentions: Vec<Mention>) -> Result<()>;
    async fn list_mentions(&self, chapter_id: Uuid) -> Result<Vec<Mention>>;
    async fn list_mentions_for_entity(&self, entity_id: Uuid) -> Result<Vec<Mention>>;
    async fn assign_entity(&self, mention_id: Uuid, entity_id: Uuid) -> Result<()>;
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait EntityRepository: Send + Sync {
    async fn create_entity(&self, entity: Entity) -> Result<Uuid>;
    async fn get_entity(&self, id: Uuid) -> Result<Option<Entity>>;
    async fn update_entity(&self, entity: &Entity) -> Result<()>;
    async fn list_entities(&self, project_id: Uuid) -> Result<Vec<Entity>>;
    async fn record_merge(&self, entry: MergeHistoryEntry) -> Result<Uuid>;
    async fn get_merge_history(&self, id: Uuid) -> Result<Option<MergeHistoryEntry>>;
    async fn mark_merge_undone(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait AttributeRepository: Send + Sync {
    async fn put_attributes(&self, entity_id: Uuid, attributes: Vec<Attribute>) -> Result<()>;
    async fn list_attributes(&self, entity_id: Uuid) -> Result<Vec<Attribute>>;
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait AlertRepository: Send + Sync {
    /// Returns `None` when an open alert with the same `content_hash`
    /// already exists for the project (`spec.md` §4.9 "unique-on-open").
    async fn submit_alert(&self, alert: Alert) -> Result<Option<Uuid>>;
    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>>;
    async fn list_alerts(&self, project_id: Uuid) -> Result<Vec<Alert>>;
    async fn list_open_alerts(&self, project_id: Uuid) -> Result<Vec<Alert>>;
    async fn update_alert_status(&self, id: Uuid, status: crate::alert::AlertStatus) -> Result<()>;
    async fn resolve_alert(
        &self,
        id: Uuid,
        reason: crate::alert::ResolutionReason,
    ) -> Result<()>;
    async fn link_to_previous(&self, new_id: Uuid, previous_id: Uuid, match_confidence: f64) -> Result<()>;
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait SnapshotRepository: Send + Sync {
    async fn create_snapshot(&self, snapshot: Snapshot) -> Result<Uuid>;
    async fn list_snapshots(&self, project_id: Uuid) -> Result<Vec<Snapshot>>;
    async fn get_latest_snapshot(&self, project_id: Uuid) -> Result<Option<Snapshot>>;
    /// Delete snapshots beyond the retention window (`spec.md` §6
    /// "retain_newest"), returning how many were pruned.
    async fn prune_snapshots(&self, project_id: Uuid, retain_newest: usize) -> Result<usize>;
    /// Persist the entity side of a snapshot comparison (`spec.md` §4.11):
    /// which entities appeared and disappeared between the previous
    /// snapshot and this run, so the comparison is a queryable fact rather
    /// than a value computed and discarded every run.
    async fn record_entity_diff(&self, snapshot_id: Uuid, added_entity_ids: &[Uuid], removed_entity_ids: &[Uuid]) -> Result<()>;
    async fn get_entity_diff(&self, snapshot_id: Uuid) -> Result<Option<(Vec<Uuid>, Vec<Uuid>)>>;
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait VoiceProfileRepository: Send + Sync {
    async fn put_profile(&self, profile: VoiceProfile) -> Result<()>;
    async fn get_profile(&self, entity_id: Uuid) -> Result<Option<VoiceProfile>>;
}

/// What to do with a mention's automatic coreference resolution
/// (`spec.md` §3 "Coreference Correction" — "has maximum authority during
/// resolution").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionType {
    /// Reassign the mention to `corrected_entity_id`.
    Reassign,
    /// Detach the mention from any entity.
    Unlink,
    /// No change; records that a human reviewed and approved the automatic
    /// assignment.
    Confirm,
}

/// A user override of coreference resolution for one mention occurrence,
/// keyed by position rather than mention id since mention ids are
/// regenerated on every re-analysis (`spec.md` §3 "Coreference Correction").
#[derive(Debug, Clone)]
pub struct CoreferenceCorrection {
    pub id: Uuid,
    pub project_id: Uuid,
    pub chapter_index: i64,
    pub mention_start_char: usize,
    pub mention_end_char: usize,
    pub corrected_entity_id: Option<Uuid>,
    pub correction_type: CorrectionType,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// A user override of dialogue-speaker attribution, keyed by the dialogue
/// span it applies to (`spec.md` §3 "Speaker Correction").
#[derive(Debug, Clone)]
pub struct SpeakerCorrection {
    pub id: Uuid,
    pub project_id: Uuid,
    pub chapter_index: i64,
    pub dialogue_start_char: usize,
    pub dialogue_end_char: usize,
    pub corrected_speaker_id: Option<Uuid>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait CorrectionRepository: Send + Sync {
    async fn create_coreference_correction(&self, correction: CoreferenceCorrection) -> Result<Uuid>;
    async fn list_coreference_corrections(&self, project_id: Uuid) -> Result<Vec<CoreferenceCorrection>>;
    async fn delete_coreference_correction(&self, id: Uuid) -> Result<()>;
    async fn create_speaker_correction(&self, correction: SpeakerCorrection) -> Result<Uuid>;
    async fn list_speaker_corrections(&self, project_id: Uuid) -> Result<Vec<SpeakerCorrection>>;
    async fn delete_speaker_correction(&self, id: Uuid) -> Result<()>;
}

/// Backing store for `crate::filters`' project-level rejections and
/// single-mention overrides (`spec.md` §3 "Rejected Entity / Filter
/// Override / System Pattern"). Built-in system patterns are a fixed list
/// shipped with the binary, not persisted state, so they have no
/// corresponding method here.
#[async_trait]
#[allow(async_fn_in_trait)]
pub trait FilterRepository: Send + Sync {
    async fn list_rejected_entities(&self, project_id: Uuid) -> Result<HashSet<String>>;
    async fn reject_entity(&self, project_id: Uuid, surface_lower: String) -> Result<()>;
    async fn unreject_entity(&self, project_id: Uuid, surface_lower: &str) -> Result<()>;
    async fn list_filter_overrides(&self, project_id: Uuid) -> Result<HashMap<Uuid, FilterVerdict>>;
    async fn set_filter_override(&self, project_id: Uuid, mention_id: Uuid, verdict: FilterVerdict) -> Result<()>;
}

/// How two entities in different projects of the same collection were
/// asserted to be the same referent (`spec.md` §3 "Entity Link").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityLinkMatchType {
    Exact,
    Fuzzy,
    Manual,
}

#[derive(Debug, Clone)]
pub struct Collection {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EntityLink {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub source_project_id: Uuid,
    pub source_entity_id: Uuid,
    pub target_project_id: Uuid,
    pub target_entity_id: Uuid,
    pub similarity: f64,
    pub match_type: EntityLinkMatchType,
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait CollectionRepository: Send + Sync {
    async fn create_collection(&self, collection: Collection) -> Result<Uuid>;
    async fn assign_project_to_collection(&self, project_id: Uuid, collection_id: Uuid, order: i64) -> Result<()>;
    async fn project_collection(&self, project_id: Uuid) -> Result<Option<Uuid>>;
    /// Returns `None` when `(source_entity_id, target_entity_id)` is
    /// already linked (`spec.md` §3: "pair is unique").
    async fn create_entity_link(&self, link: EntityLink) -> Result<Option<Uuid>>;
    async fn list_entity_links(&self, collection_id: Uuid) -> Result<Vec<EntityLink>>;
}

/// A project's free-text house-style rule list (`spec.md` §6
/// "editorial_rules"), one banned phrase per line.
#[derive(Debug, Clone)]
pub struct EditorialRules {
    pub rules_text: String,
    pub enabled: bool,
}

#[async_trait]
#[allow(async_fn_in_trait)]
pub trait EditorialRuleRepository: Send + Sync {
    async fn get_editorial_rules(&self, project_id: Uuid) -> Result<Option<EditorialRules>>;
    async fn set_editorial_rules(&self, project_id: Uuid, rules: EditorialRules) -> Result<()>;
}

/// Cache of a project's stitched timeline, keyed by the document
/// fingerprint it was computed from (`spec.md` §6 "timeline (get with
/// cache, force recompute)"): a fingerprint match means the manuscript
/// hasn't changed since the timeline was last built, so it can be served
/// from the cache instead of recomputed.
#[async_trait]
#[allow(async_fn_in_trait)]
pub trait TemporalRepository: Send + Sync {
    async fn save_timeline(&self, project_id: Uuid, document_fingerprint: &str, events: &[TimelineEvent]) -> Result<()>;
    async fn get_timeline(&self, project_id: Uuid, document_fingerprint: &str) -> Result<Option<Vec<TimelineEvent>>>;
    /// Persist the raw markers a chapter's timeline events were extracted
    /// from, for inspection independent of the stitched timeline.
    async fn save_markers(&self, chapter_id: Uuid, markers: &[TemporalMarker]) -> Result<()>;
    async fn get_markers(&self, chapter_id: Uuid) -> Result<Vec<TemporalMarker>>;
}
