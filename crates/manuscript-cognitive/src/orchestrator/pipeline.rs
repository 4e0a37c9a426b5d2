//! Analysis pipeline (`spec.md` §4.12 "Orchestrator"): runs every stage in
//! order for one project and returns what it produced, writing through the
//! repository traits as it goes. Each stage is a thin call into the module
//! that owns its logic — this file is pure composition order, the same
//! shape as `coref_resolver::resolve_chapter` one level up.

use crate::alert_engine::AlertEngine;
use crate::attribute_extractor::extract_attributes;
use crate::coref_resolver::{resolve_chapter, ResolutionCapabilities};
use crate::entity_service::entity_from_chain;
use crate::identity_service::check_identity;
use crate::orchestrator::progress::{ProgressTracker, StageName};
use crate::snapshot_service::{apply_alert_links, diff_alerts, diff_entities, ComparableAlert};
use crate::speech_attribution::attribute_speech;
use crate::speech_change_service::{detect_speech_changes, windows_for_chapters};
use crate::style_structure::analyze_style_structure;
use crate::temporal_service::{build_project_timeline, link_temporal_instances, temporal_alerts};
use crate::voice_profiler::VoiceProfiler;

use manuscript_core::filters::{resolve_verdict, FilterContext, FilterVerdict, SystemPattern};
use manuscript_core::manuscript_identity::{fingerprint, IdentityVerdict};
use manuscript_core::mention::Mention;
use manuscript_core::morphology::MorphAnnotator;
use manuscript_core::narrator::detect_dialogue_lines;
use manuscript_core::repository::{
    AlertRepository, AttributeRepository, Chapter, ChapterRepository, CorrectionRepository, CorrectionType,
    EditorialRuleRepository, EntityRepository, FilterRepository, MentionRepository, ProjectRepository, Snapshot,
    SnapshotRepository, TemporalRepository, VoiceProfileRepository,
};
use manuscript_core::temporal::extract_markers;
use manuscript_types::{ManuscriptError, Result, Settings};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Built-in denylist of common nouns frequently capitalized at a sentence
/// start and mistaken for proper names (`spec.md` §3 "System Pattern").
fn system_patterns() -> Vec<SystemPattern> {
    ["señor", "señora", "doctor", "capitán", "padre", "madre"]
        .iter()
        .map(|s| SystemPattern { surface_lower: s.to_string() })
        .collect()
}

/// A chapter as handed to the pipeline before persistence — index, optional
/// title, full text.
pub struct InputChapter {
    pub index: i64,
    pub title: Option<String>,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct AnalysisReport {
    pub chapters_persisted: usize,
    pub entities_created: usize,
    pub alerts_created: usize,
    pub alerts_resolved: usize,
    pub entities_added: usize,
    pub entities_removed: usize,
    pub identity_verdict: Option<String>,
    pub snapshot_id: Option<Uuid>,
}

/// Repository bundle the pipeline needs; one type implementing all of it
/// (`manuscript-infra::SqliteRepository`) is the production wiring, but any
/// fake satisfying these bounds can drive the pipeline in tests.
pub trait Repositories:
    ProjectRepository
    + ChapterRepository
    + MentionRepository
    + EntityRepository
    + AttributeRepository
    + AlertRepository
    + SnapshotRepository
    + VoiceProfileRepository
    + FilterRepository
    + CorrectionRepository
    + EditorialRuleRepository
    + TemporalRepository
{
}
impl<T> Repositories for T where
    T: ProjectRepository
        + ChapterRepository
        + MentionRepository
        + EntityRepository
        + AttributeRepository
        + AlertRepository
        + SnapshotRepository
        + VoiceProfileRepository
        + FilterRepository
        + CorrectionRepository
        + EditorialRuleRepository
        + TemporalRepository
{
}

pub struct AnalysisPipeline<R: Repositories> {
    repo: Arc<R>,
    progress: Arc<ProgressTracker>,
    voice_profiler: VoiceProfiler,
    alert_engine: AlertEngine,
}

impl<R: Repositories> AnalysisPipeline<R> {
    pub fn new(repo: Arc<R>, progress: Arc<ProgressTracker>) -> Self {
        let min_severity = manuscript_core::alert::AlertSeverity::Info;
        Self { repo, progress, voice_profiler: VoiceProfiler::new(), alert_engine: AlertEngine::new(min_severity) }
    }

    /// Run the full pipeline for `project_id` over `chapters`, in the stage
    /// order documented in `spec.md` §4.12: parse → persist chapters →
    /// entity extraction (mentions → voting → chains → canonicalization) →
    /// attribute extraction → speech attribution → voice profiles →
    /// temporal → style/structure → alerts → snapshot + comparison.
    pub async fn run(
        &self,
        project_id: Uuid,
        chapters: Vec<InputChapter>,
        annotator: &dyn MorphAnnotator,
        settings: &Settings,
        capabilities: &ResolutionCapabilities<'_>,
    ) -> Result<AnalysisReport> {
        self.progress.start(project_id)?;
        let result = self.run_inner(project_id, chapters, annotator, settings, capabilities).await;
        self.progress.finish(project_id)?;
        result
    }

    async fn run_inner(
        &self,
        project_id: Uuid,
        chapters: Vec<InputChapter>,
        annotator: &dyn MorphAnnotator,
        settings: &Settings,
        capabilities: &ResolutionCapabilities<'_>,
    ) -> Result<AnalysisReport> {
        let mut report = AnalysisReport::default();

        // --- Identity gate: is this an edit of the existing manuscript? ---
        let full_text = chapters.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n\n");
        let identity = check_identity(&*self.repo, project_id, &full_text, chapters.len()).await?;
        report.identity_verdict = Some(format!("{:?}", identity.verdict));
        if matches!(identity.verdict, IdentityVerdict::DifferentDocument) {
            return Err(ManuscriptError::Conflict(
                "uploaded document's structure is too different from the existing manuscript to treat as an edit".to_string(),
            ));
        }

        // --- Parsing / persistence ---
        self.progress.advance(project_id, StageName::Parsing)?;
        let persisted_chapters: Vec<Chapter> = chapters
            .iter()
            .map(|c| Chapter { id: Uuid::new_v4(), project_id, index: c.index, title: c.title.clone(), text: c.text.clone() })
            .collect();
        self.repo.put_chapters(project_id, persisted_chapters.clone()).await?;
        report.chapters_persisted = persisted_chapters.len();

        // --- Entity extraction ---
        self.progress.advance(project_id, StageName::EntityExtraction)?;
        let old_entities = self.repo.list_entities(project_id).await?;
        let mut entity_of_mention: HashMap<Uuid, Uuid> = HashMap::new();
        let mut created_entity_ids: Vec<Uuid> = Vec::new();
        let mut entity_types: HashMap<Uuid, manuscript_core::entity::EntityType> = HashMap::new();
        let mut chapter_dialogue: Vec<(i64, String, Vec<String>)> = Vec::new();
        let mut chapter_mentions_by_id: HashMap<Uuid, Vec<Mention>> = HashMap::new();
        let mut dialogue_by_entity: HashMap<Uuid, Vec<String>> = HashMap::new();

        let patterns = system_patterns();
        let rejected = self.repo.list_rejected_entities(project_id).await?;
        let overrides = self.repo.list_filter_overrides(project_id).await?;
        let filter_ctx = FilterContext { system_patterns: &patterns, rejected_entities: &rejected, overrides: &overrides };
        let coref_corrections = self.repo.list_coreference_corrections(project_id).await?;
        let speaker_corrections = self.repo.list_speaker_corrections(project_id).await?;

        for chapter in &persisted_chapters {
            let resolution = resolve_chapter(&chapter.text, annotator, &settings.voting, capabilities).await;
            let mut mentions = resolution.mentions;
            for mention in &mut mentions {
                mention.chapter_id = Some(chapter.id);
            }

            for chain in &resolution.chains {
                let entity = entity_from_chain(project_id, chain, &mentions);
                let anchor_mention_id = mentions[chain.mention_indices[0]].id;
                if resolve_verdict(&filter_ctx, anchor_mention_id, &entity.canonical_name) == FilterVerdict::Reject {
                    continue;
                }
                self.repo.create_entity(entity.clone()).await?;
                created_entity_ids.push(entity.id);
                entity_types.insert(entity.id, entity.entity_type);
                report.entities_created += 1;
                for &idx in &chain.mention_indices {
                    entity_of_mention.insert(mentions[idx].id, entity.id);
                }
            }

            // Coreference corrections have maximum authority: a reassign or
            // unlink here overrides whatever the automatic chain builder
            // decided for that mention span (`spec.md` §3).
            for correction in coref_corrections.iter().filter(|c| c.chapter_index == chapter.index) {
                let Some(mention) = mentions
                    .iter()
                    .find(|m| m.start_char == correction.mention_start_char && m.end_char == correction.mention_end_char)
                else {
                    continue;
                };
                match correction.correction_type {
                    CorrectionType::Reassign => {
                        if let Some(entity_id) = correction.corrected_entity_id {
                            entity_of_mention.insert(mention.id, entity_id);
                        }
                    }
                    CorrectionType::Unlink => {
                        entity_of_mention.remove(&mention.id);
                    }
                    CorrectionType::Confirm => {}
                }
            }

            self.repo.put_mentions(chapter.id, mentions.clone()).await?;
            for (mention_id, entity_id) in &entity_of_mention {
                if mentions.iter().any(|m| &m.id == mention_id) {
                    self.repo.assign_entity(*mention_id, *entity_id).await?;
                }
            }

            let dialogue_lines = detect_dialogue_lines(&chapter.text);
            chapter_dialogue.push((chapter.index, chapter.text.clone(), dialogue_lines.iter().map(|d| d.text.clone()).collect()));

            // --- Speech attribution for this chapter ---
            self.progress.advance(project_id, StageName::SpeechAttribution)?;
            let attributions = attribute_speech(&chapter.text, &dialogue_lines, &mentions, &entity_of_mention);
            for attribution in &attributions {
                let dialogue_line = dialogue_lines.get(attribution.dialogue_index);
                let speaker_override = dialogue_line.and_then(|line| {
                    speaker_corrections.iter().find(|c| {
                        c.chapter_index == chapter.index
                            && c.dialogue_start_char == line.start_char
                            && c.dialogue_end_char == line.end_char
                    })
                });
                let entity_id = match speaker_override {
                    Some(correction) => correction.corrected_speaker_id,
                    None => attribution.entity_id,
                };
                if let Some(entity_id) = entity_id {
                    if let Some(line) = dialogue_line {
                        dialogue_by_entity.entry(entity_id).or_default().push(line.text.clone());
                    }
                }
            }

            chapter_mentions_by_id.insert(chapter.id, mentions);
        }

        // --- Attribute extraction ---
        self.progress.advance(project_id, StageName::AttributeExtraction)?;
        for &entity_id in &created_entity_ids {
            let mentions_for_entity: Vec<&Mention> = chapter_mentions_by_id
                .values()
                .flatten()
                .filter(|m| entity_of_mention.get(&m.id) == Some(&entity_id))
                .collect();
            if mentions_for_entity.is_empty() {
                continue;
            }
            let entity_type = entity_types.get(&entity_id).copied().unwrap_or(manuscript_core::entity::EntityType::Character);
            let attributes = extract_attributes(entity_id, entity_type, &mentions_for_entity);
            if !attributes.is_empty() {
                self.repo.put_attributes(entity_id, attributes).await?;
            }
        }

        // --- Voice profiling ---
        self.progress.advance(project_id, StageName::VoiceProfiling)?;
        let document_fingerprint = identity.fingerprint.clone();
        for &entity_id in &created_entity_ids {
            if entity_types.get(&entity_id) != Some(&manuscript_core::entity::EntityType::Character) {
                continue;
            }
            let Some(dialogue_lines) = dialogue_by_entity.get(&entity_id) else { continue };
            if dialogue_lines.is_empty() {
                continue;
            }
            self.voice_profiler.profile_for(&*self.repo, entity_id, &document_fingerprint, dialogue_lines).await?;
        }

        let speech_change_alerts: Vec<_> = created_entity_ids
            .iter()
            .filter(|id| entity_types.get(*id) == Some(&manuscript_core::entity::EntityType::Character))
            .flat_map(|&entity_id| {
                let windows = windows_for_chapters(&chapter_dialogue, &settings.speech_change);
                detect_speech_changes(project_id, entity_id, "entity", &document_fingerprint, &windows, &settings.speech_change)
            })
            .collect();

        // --- Temporal ---
        self.progress.advance(project_id, StageName::Temporal)?;
        for chapter in &persisted_chapters {
            self.repo.save_markers(chapter.id, &extract_markers(&chapter.text)).await?;
        }
        let chapter_texts: Vec<(Uuid, String)> = persisted_chapters.iter().map(|c| (c.id, c.text.clone())).collect();
        // The stitched timeline is cached on document fingerprint
        // (`spec.md` §6 "timeline (get with cache, force recompute)"): an
        // unchanged manuscript gets its timeline served from the cache
        // instead of walking every chapter's markers again.
        let timeline = match self.repo.get_timeline(project_id, &document_fingerprint).await? {
            Some(cached) => cached,
            None => {
                let computed = build_project_timeline(&chapter_texts);
                self.repo.save_timeline(project_id, &document_fingerprint, &computed).await?;
                computed
            }
        };
        let mentions_by_chapter: HashMap<Uuid, Vec<&Mention>> =
            chapter_mentions_by_id.iter().map(|(id, ms)| (*id, ms.iter().collect())).collect();
        let _temporal_instances = link_temporal_instances(&timeline, &mentions_by_chapter, &entity_of_mention);
        let temporal = temporal_alerts(project_id, &timeline);

        // --- Style / structure ---
        self.progress.advance(project_id, StageName::StyleStructure)?;
        let chapter_index_texts: Vec<(i64, String)> = persisted_chapters.iter().map(|c| (c.index, c.text.clone())).collect();
        let mut style = analyze_style_structure(project_id, &chapter_index_texts);
        if let Some(rules) = self.repo.get_editorial_rules(project_id).await? {
            if rules.enabled {
                for (chapter, text) in &chapter_index_texts {
                    style.extend(crate::style_structure::apply_editorial_rules(project_id, *chapter, text, &rules.rules_text));
                }
            }
        }

        // --- Alerts ---
        self.progress.advance(project_id, StageName::Alerts)?;
        let old_open_alerts = self.repo.list_open_alerts(project_id).await?;
        let mut all_new_alerts = Vec::new();
        all_new_alerts.extend(temporal);
        all_new_alerts.extend(style);
        all_new_alerts.extend(speech_change_alerts);
        let submitted = self.alert_engine.submit_many(&*self.repo, all_new_alerts).await?;
        report.alerts_created = submitted.len();

        // --- Snapshot + comparison ---
        // Carried-over alerts keep their original row (deduplicated on
        // content_hash by `submit_alert`), so an alert present in both
        // `old_open_alerts` and the post-submission open set matches on
        // pass 1 of `diff_alerts` by construction; only genuinely
        // text-changed or detector-improved alerts need passes 2-4.
        self.progress.advance(project_id, StageName::Snapshot)?;
        let mut entity_diff = None;
        if identity.previous_snapshot.is_some() {
            let current_open_alerts = self.repo.list_open_alerts(project_id).await?;
            let old_comparable: Vec<ComparableAlert> =
                old_open_alerts.iter().map(|a| ComparableAlert { alert: a.clone(), entity_names: vec![] }).collect();
            let current_comparable: Vec<ComparableAlert> =
                current_open_alerts.iter().map(|a| ComparableAlert { alert: a.clone(), entity_names: vec![] }).collect();
            let alert_diff = diff_alerts(&old_comparable, &current_comparable, None, &[]);
            report.alerts_resolved = alert_diff.resolved_alerts.len();

            let current_ids: Vec<Uuid> = current_open_alerts.iter().map(|a| a.id).collect();
            let old_ids: Vec<Uuid> = old_open_alerts.iter().map(|a| a.id).collect();
            apply_alert_links(&*self.repo, &current_ids, &old_ids, &alert_diff).await?;

            let current_entities = self.repo.list_entities(project_id).await?;
            let diff = diff_entities(&old_entities, &current_entities);
            report.entities_added = diff.added.len();
            report.entities_removed = diff.removed.len();
            entity_diff = Some(diff);
        }

        let new_snapshot = Snapshot {
            id: Uuid::new_v4(),
            project_id,
            created_at: chrono::Utc::now(),
            fingerprint: fingerprint(&full_text, persisted_chapters.len()),
            word_count: full_text.split_whitespace().count() as i64,
            chapter_count: persisted_chapters.len() as i64,
        };
        let snapshot_id = self.repo.create_snapshot(new_snapshot).await?;
        report.snapshot_id = Some(snapshot_id);
        if let Some(diff) = entity_diff {
            let added_ids: Vec<Uuid> = diff.added.iter().map(|e| e.id).collect();
            let removed_ids: Vec<Uuid> = diff.removed.iter().map(|e| e.id).collect();
            self.repo.record_entity_diff(snapshot_id, &added_ids, &removed_ids).await?;
        }
        self.repo.touch_last_analyzed(project_id, chrono::Utc::now()).await?;

        Ok(report)
    }
}
