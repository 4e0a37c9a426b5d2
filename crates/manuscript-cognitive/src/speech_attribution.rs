//! Speech attribution (`spec.md` §4 "Speech Attribution" — "explicit speech
//! verbs, alternation, voice profiles, proximity").
//!
//! Runs after coreference resolution, so every mention here is assumed to
//! already carry its resolved entity id (`mention_entities`). Tries, in
//! order of decreasing confidence: an explicit speech verb with a nearby
//! named mention, two-party alternation with the previous dialogue line,
//! then nearest-mention proximity.

use manuscript_core::mention::{Mention, MentionType};
use manuscript_core::narrator::DialogueLine;
use regex::Regex;
use std::collections::HashMap;
use uuid::Uuid;

/// Spanish reporting verbs conventionally attached to a dialogue tag
/// (`—Ya voy —dijo Marta.`). Closed lexicon, same approach as
/// `manuscript-core::narrator`'s person markers.
const SPEECH_VERBS: &[&str] = &[
    "dijo", "dije", "dijeron", "respondió", "respondí", "preguntó", "pregunté", "exclamó", "susurró", "murmuró",
    "gritó", "añadió", "agregó", "contestó", "replicó", "insistió", "balbuceó", "sentenció",
];

const TAG_WINDOW: usize = 60;
const PROXIMITY_WINDOW: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributionMethod {
    ExplicitVerb,
    Alternation,
    Proximity,
}

#[derive(Debug, Clone)]
pub struct SpeechAttribution {
    pub dialogue_index: usize,
    pub entity_id: Option<Uuid>,
    pub method: AttributionMethod,
    pub confidence: f64,
}

fn speech_verb_re() -> Regex {
    let alternation = SPEECH_VERBS.join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("speech verb lexicon compiles")
}

/// Nearest proper-noun mention's entity within `window` chars of `pos`,
/// preferring the closest by absolute distance.
fn nearest_named_entity(mentions: &[Mention], mention_entities: &HashMap<Uuid, Uuid>, pos: usize, window: usize) -> Option<Uuid> {
    mentions
        .iter()
        .filter(|m| m.mention_type == MentionType::ProperNoun)
        .filter_map(|m| {
            let distance = m.start_char.abs_diff(pos);
            if distance <= window {
                mention_entities.get(&m.id).map(|&entity_id| (distance, entity_id))
            } else {
                None
            }
        })
        .min_by_key(|&(distance, _)| distance)
        .map(|(_, entity_id)| entity_id)
}

pub fn attribute_speech(
    text: &str,
    dialogue_lines: &[DialogueLine],
    mentions: &[Mention],
    mention_entities: &HashMap<Uuid, Uuid>,
) -> Vec<SpeechAttribution> {
    let verb_re = speech_verb_re();
    let mut results = Vec::with_capacity(dialogue_lines.len());
    let mut last_speaker: Option<Uuid> = None;
    let mut second_last_speaker: Option<Uuid> = None;

    for (idx, line) in dialogue_lines.iter().enumerate() {
        let tag_end = (line.end_char + TAG_WINDOW).min(text.len());
        let tag_text = safe_slice(text, line.end_char, tag_end);

        let explicit = verb_re.find(&tag_text).and_then(|verb_match| {
            let verb_pos = line.end_char + verb_match.end();
            nearest_named_entity(mentions, mention_entities, verb_pos, TAG_WINDOW)
        });

        let (entity_id, method, confidence) = if let Some(entity_id) = explicit {
            (Some(entity_id), AttributionMethod::ExplicitVerb, 0.9)
        } else if let (Some(last), Some(second_last)) = (last_speaker, second_last_speaker) {
            if last != second_last {
                (Some(second_last), AttributionMethod::Alternation, 0.55)
            } else {
                (
                    nearest_named_entity(mentions, mention_entities, line.start_char, PROXIMITY_WINDOW),
                    AttributionMethod::Proximity,
                    0.35,
                )
            }
        } else {
            (
                nearest_named_entity(mentions, mention_entities, line.start_char, PROXIMITY_WINDOW),
                AttributionMethod::Proximity,
                0.35,
            )
        };

        results.push(SpeechAttribution { dialogue_index: idx, entity_id, method, confidence });

        if entity_id.is_some() {
            second_last_speaker = last_speaker;
            last_speaker = entity_id;
        }
    }

    results
}

/// Slice on char boundaries even when offsets don't land on one, mirroring
/// `manuscript_core::mention`'s defensive slicing.
fn safe_slice(text: &str, start: usize, end: usize) -> String {
    let start = start.min(text.len());
    let end = end.min(text.len());
    if start >= end {
        return String::new();
    }
    let mut s = start;
    while s < text.len() && !text.is_char_boundary(s) {
        s += 1;
    }
    let mut e = end;
    while e < text.len() && !text.is_char_boundary(e) {
        e += 1;
    }
    text.get(s..e).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_core::mention::{MentionSource, SentenceIdxBasis};
    use manuscript_core::narrator::DialogueStyle;

    fn proper_noun(surface: &str, start: usize) -> Mention {
        Mention::new(surface, start, start + surface.len(), MentionType::ProperNoun, 0, SentenceIdxBasis::Dense, MentionSource::MorphAnalyzer)
    }

    #[test]
    fn explicit_speech_verb_attributes_to_nearby_name() {
        let text = "—Ya voy —dijo Marta, sin mirar atrás.";
        let line = DialogueLine { style: DialogueStyle::EmDash, start_char: 0, end_char: 9, text: "—Ya voy —".to_string() };
        let marta = proper_noun("Marta", 15);
        let mut entities = HashMap::new();
        let entity_id = Uuid::new_v4();
        entities.insert(marta.id, entity_id);

        let attributions = attribute_speech(text, &[line], &[marta], &entities);
        assert_eq!(attributions[0].entity_id, Some(entity_id));
        assert_eq!(attributions[0].method, AttributionMethod::ExplicitVerb);
    }

    #[test]
    fn alternation_assigns_the_other_speaker_when_no_explicit_tag() {
        let text = "a".repeat(400);
        let line_a = DialogueLine { style: DialogueStyle::EmDash, start_char: 0, end_char: 5, text: String::new() };
        let line_b = DialogueLine { style: DialogueStyle::EmDash, start_char: 50, end_char: 55, text: String::new() };
        let line_c = DialogueLine { style: DialogueStyle::EmDash, start_char: 100, end_char: 105, text: String::new() };

        let ana_id = Uuid::new_v4();
        let beto_id = Uuid::new_v4();
        let ana = proper_noun("Ana", 10);
        let beto = proper_noun("Beto", 60);
        let mut entities = HashMap::new();
        entities.insert(ana.id, ana_id);
        entities.insert(beto.id, beto_id);

        let attributions = attribute_speech(&text, &[line_a, line_b, line_c], &[ana, beto], &entities);
        assert_eq!(attributions[0].entity_id, Some(ana_id));
        assert_eq!(attributions[1].entity_id, Some(beto_id));
        assert_eq!(attributions[2].method, AttributionMethod::Alternation);
        assert_eq!(attributions[2].entity_id, Some(ana_id));
    }
}
