//! Temporal analysis service (`spec.md` §4.13 "Temporal Module" —
//! "computes day-offsets and per-entity temporal instances (A@40 / A@45),
//! detects inconsistencies").
//!
//! Stitches per-chapter marker extraction into one project-wide running
//! timeline, links each event to the nearest named entity to produce
//! temporal instances, and turns inconsistencies into alerts.

use manuscript_core::alert::{AlertSeverity, NewAlert};
use manuscript_core::mention::{Mention, MentionType};
use manuscript_core::temporal::{build_timeline, extract_markers, find_inconsistencies, MarkerKind, TimelineEvent};
use std::collections::HashMap;
use uuid::Uuid;

/// A day-offset anchor for one entity, e.g. "Ana@40" — entity A was
/// present at day offset 40 of the story's internal chronology.
#[derive(Debug, Clone)]
pub struct TemporalInstance {
    pub entity_id: Uuid,
    pub event_id: Uuid,
    pub chapter_id: Uuid,
    pub day_offset: i64,
}

const INSTANCE_PROXIMITY_WINDOW: usize = 300;

/// Build one running timeline across every chapter in narrative order,
/// carrying the day offset forward from chapter to chapter rather than
/// resetting it (`manuscript_core::temporal::build_timeline` operates on a
/// single chapter's markers).
pub fn build_project_timeline(chapters: &[(Uuid, String)]) -> Vec<TimelineEvent> {
    let mut events = Vec::new();
    let mut chapter_start_offset = 0i64;
    for (chapter_id, text) in chapters {
        let markers = extract_markers(text);
        let chapter_events = build_timeline(*chapter_id, &markers);
        let mut last_local_offset = 0i64;
        for mut event in chapter_events {
            let local_offset = event.day_offset.unwrap_or(0);
            last_local_offset = local_offset;
            event.day_offset = Some(chapter_start_offset + local_offset);
            event.narrative_order = events.len();
            events.push(event);
        }
        chapter_start_offset += last_local_offset;
    }
    events
}

/// Attach each event to the nearest proper-noun mention's entity within the
/// same chapter, within a proximity window.
pub fn link_temporal_instances(
    events: &[TimelineEvent],
    mentions_by_chapter: &HashMap<Uuid, Vec<&Mention>>,
    mention_entities: &HashMap<Uuid, Uuid>,
) -> Vec<TemporalInstance> {
    let mut instances = Vec::new();
    for event in events {
        let Some(day_offset) = event.day_offset else { continue };
        let Some(mentions) = mentions_by_chapter.get(&event.chapter_id) else { continue };
        let nearest = mentions
            .iter()
            .filter(|m| m.mention_type == MentionType::ProperNoun)
            .filter_map(|m| {
                let distance = m.start_char.abs_diff(event.char_pos);
                if distance <= INSTANCE_PROXIMITY_WINDOW {
                    mention_entities.get(&m.id).map(|&entity_id| (distance, entity_id))
                } else {
                    None
                }
            })
            .min_by_key(|&(distance, _)| distance);

        if let Some((_, entity_id)) = nearest {
            instances.push(TemporalInstance { entity_id, event_id: event.id, chapter_id: event.chapter_id, day_offset });
        }
    }
    instances
}

/// Turn narrative/chronological order contradictions into alerts.
pub fn temporal_alerts(project_id: Uuid, events: &[TimelineEvent]) -> Vec<NewAlert> {
    find_inconsistencies(events)
        .into_iter()
        .map(|inconsistency| NewAlert {
            project_id,
            category: "temporal".to_string(),
            alert_type: "timeline_inconsistency".to_string(),
            severity: AlertSeverity::Warning,
            title: "Timeline order contradicts chronology".to_string(),
            description: inconsistency.description.clone(),
            explanation: inconsistency.description,
            suggestion: "Add a flashback marker or adjust the narrated order of these events.".to_string(),
            excerpt: String::new(),
            chapter: None,
            start_char: None,
            end_char: None,
            confidence: 0.6,
            related_entity_ids: vec![],
            extra_data: serde_json::json!({ "event_a": inconsistency.event_a, "event_b": inconsistency.event_b }),
            key_fields: vec![inconsistency.event_a.to_string(), inconsistency.event_b.to_string()],
        })
        .collect()
}

#[allow(dead_code)]
fn debug_kind(kind: MarkerKind) -> &'static str {
    match kind {
        MarkerKind::RelativeForward => "forward",
        MarkerKind::RelativeBackward => "backward",
        MarkerKind::Absolute => "absolute",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_core::mention::{MentionSource, SentenceIdxBasis};

    #[test]
    fn running_offset_carries_forward_across_chapters() {
        let chapter_a = Uuid::new_v4();
        let chapter_b = Uuid::new_v4();
        let chapters = vec![
            (chapter_a, "Al día siguiente, todo cambió.".to_string()),
            (chapter_b, "Tres años después, volvió al pueblo.".to_string()),
        ];
        let events = build_project_timeline(&chapters);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].day_offset, Some(1));
        assert_eq!(events[1].day_offset, Some(1 + 3 * 365));
    }

    #[test]
    fn instance_links_to_nearest_named_entity_in_chapter() {
        let chapter_id = Uuid::new_v4();
        let events = vec![TimelineEvent {
            id: Uuid::new_v4(),
            chapter_id,
            char_pos: 20,
            narrative_order: 0,
            day_offset: Some(40),
            is_flashback_marked: false,
        }];
        let mention =
            Mention::new("Ana", 10, 13, MentionType::ProperNoun, 0, SentenceIdxBasis::Dense, MentionSource::MorphAnalyzer);
        let entity_id = Uuid::new_v4();
        let mut mention_entities = HashMap::new();
        mention_entities.insert(mention.id, entity_id);
        let mut mentions_by_chapter = HashMap::new();
        mentions_by_chapter.insert(chapter_id, vec![&mention]);

        let instances = link_temporal_instances(&events, &mentions_by_chapter, &mention_entities);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].entity_id, entity_id);
        assert_eq!(instances[0].day_offset, 40);
    }
}
