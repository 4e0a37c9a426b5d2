//! Style and structure analyzers (`spec.md` §4 "Style/Structure Analyzers":
//! pacing/tension, sticky sentences, sentence energy, repetitions,
//! duplicates, semantic redundancy, sensory balance, register,
//! focalization). Each analyzer is a pure function over chapter text
//! producing `NewAlert`s; composition into one analysis pass happens in
//! `analyze_style_structure`.

use manuscript_core::alert::{AlertSeverity, NewAlert};
use manuscript_core::entity_matcher::{char_ngrams, jaccard_similarity};
use manuscript_core::narrator::{detect_narrative_voice, NarrativeVoice};
use regex::Regex;
use uuid::Uuid;

const WEAK_VERBS: &[&str] = &["ser", "estar", "haber", "había", "fue", "era", "estaba", "hay"];
const FORMAL_MARKERS: &[&str] = &["usted", "ustedes"];
const INFORMAL_MARKERS: &[&str] = &["tú", "vos", "che"];

const SENSORY_LEXICON: &[(&str, &[&str])] = &[
    ("visual", &["vio", "miró", "observó", "luz", "color", "sombra", "brillaba"]),
    ("auditory", &["oyó", "escuchó", "sonido", "ruido", "silencio", "voz"]),
    ("tactile", &["tocó", "frío", "caliente", "suave", "áspero", "piel"]),
    ("olfactory", &["olor", "aroma", "perfume", "hedor", "olía"]),
    ("gustatory", &["sabor", "dulce", "amargo", "salado", "probó"]),
];

const NEAR_DUPLICATE_THRESHOLD: f64 = 0.75;
const DUPLICATE_NGRAM_SIZE: usize = 5;

fn split_sentences(text: &str) -> Vec<&str> {
    Regex::new(r"[^.!?]+[.!?]*")
        .expect("sentence split pattern compiles")
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect()
}

fn split_paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n").map(|p| p.trim()).filter(|p| !p.is_empty()).collect()
}

fn base_alert(project_id: Uuid, category: &str, alert_type: &str, chapter: i64, excerpt: &str) -> NewAlert {
    NewAlert {
        project_id,
        category: category.to_string(),
        alert_type: alert_type.to_string(),
        severity: AlertSeverity::Info,
        title: String::new(),
        description: String::new(),
        explanation: String::new(),
        suggestion: String::new(),
        excerpt: excerpt.chars().take(200).collect(),
        chapter: Some(chapter),
        start_char: None,
        end_char: None,
        confidence: 0.5,
        related_entity_ids: vec![],
        extra_data: serde_json::json!({}),
        key_fields: vec![],
    }
}

/// Flag chapters whose mean sentence length deviates sharply (2x or more)
/// from the project average — either a dense wall of prose or a
/// staccato-fast passage that may be unintentional.
pub fn analyze_pacing_tension(project_id: Uuid, chapters: &[(i64, String)]) -> Vec<NewAlert> {
    let means: Vec<(i64, f64)> = chapters
        .iter()
        .map(|(idx, text)| {
            let sentences = split_sentences(text);
            let mean = if sentences.is_empty() {
                0.0
            } else {
                sentences.iter().map(|s| s.split_whitespace().count()).sum::<usize>() as f64 / sentences.len() as f64
            };
            (*idx, mean)
        })
        .collect();

    let overall: f64 = if means.is_empty() { 0.0 } else { means.iter().map(|(_, m)| m).sum::<f64>() / means.len() as f64 };
    if overall == 0.0 {
        return Vec::new();
    }

    means
        .into_iter()
        .filter(|(_, mean)| *mean > overall * 2.0 || (*mean > 0.0 && *mean < overall * 0.4))
        .map(|(chapter, mean)| {
            let mut alert = base_alert(project_id, "pacing", "pacing_outlier", chapter, "");
            alert.title = "Sentence length diverges sharply from the manuscript's pacing".to_string();
            alert.description = format!("Chapter {chapter} averages {mean:.1} words/sentence against a project mean of {overall:.1}.");
            alert.confidence = 0.5;
            alert
        })
        .collect()
}

/// Sentences overloaded with the relative pronoun "que" read as
/// grammatically tangled ("sticky"): flag sentences with 3+ occurrences.
pub fn detect_sticky_sentences(project_id: Uuid, chapter: i64, text: &str) -> Vec<NewAlert> {
    let que_re = Regex::new(r"(?i)\bque\b").expect("que pattern compiles");
    split_sentences(text)
        .into_iter()
        .filter(|s| que_re.find_iter(s).count() >= 3)
        .map(|s| {
            let mut alert = base_alert(project_id, "style", "sticky_sentence", chapter, s);
            alert.title = "Sentence may read as grammatically tangled".to_string();
            alert.description = "Three or more relative clauses chained with \"que\" in one sentence.".to_string();
            alert.suggestion = "Consider splitting into shorter sentences.".to_string();
            alert
        })
        .collect()
}

/// Sentences dominated by copular/existential verbs ("ser", "estar",
/// "haber") read as low-energy description rather than action.
pub fn detect_low_energy_sentences(project_id: Uuid, chapter: i64, text: &str) -> Vec<NewAlert> {
    split_sentences(text)
        .into_iter()
        .filter(|s| {
            let words: Vec<&str> = s.split_whitespace().collect();
            if words.len() < 6 {
                return false;
            }
            let weak_count = words.iter().filter(|w| WEAK_VERBS.contains(&w.to_lowercase().as_str())).count();
            weak_count as f64 / words.len() as f64 > 0.15
        })
        .map(|s| {
            let mut alert = base_alert(project_id, "style", "low_sentence_energy", chapter, s);
            alert.title = "Sentence leans heavily on static/copular verbs".to_string();
            alert.description = "High density of \"ser\"/\"estar\"/\"haber\" relative to sentence length.".to_string();
            alert
        })
        .collect()
}

/// A content word (4+ letters, not a weak verb) repeated within a 20-word
/// span reads as an unintentional echo.
pub fn detect_close_repetitions(project_id: Uuid, chapter: i64, text: &str) -> Vec<NewAlert> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut alerts = Vec::new();
    let mut last_seen: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for (i, word) in words.iter().enumerate() {
        let normalized = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        if normalized.chars().count() < 4 || WEAK_VERBS.contains(&normalized.as_str()) {
            continue;
        }
        if let Some(&prev_idx) = last_seen.get(&normalized) {
            if i - prev_idx <= 20 {
                let start = prev_idx.saturating_sub(3);
                let end = (i + 3).min(words.len());
                let excerpt = words[start..end].join(" ");
                let mut alert = base_alert(project_id, "style", "close_repetition", chapter, &excerpt);
                alert.title = format!("\"{normalized}\" repeats within a short span");
                alert.description = format!("Repeated {} words apart.", i - prev_idx);
                alerts.push(alert);
            }
        }
        last_seen.insert(normalized, i);
    }
    alerts
}

/// Exact or near-duplicate paragraphs within the same chapter, via trigram
/// Jaccard similarity (same technique as entity fuzzy matching).
pub fn detect_duplicate_paragraphs(project_id: Uuid, chapter: i64, text: &str) -> Vec<NewAlert> {
    let paragraphs = split_paragraphs(text);
    let grams: Vec<_> = paragraphs.iter().map(|p| char_ngrams(&p.to_lowercase(), DUPLICATE_NGRAM_SIZE)).collect();
    let mut alerts = Vec::new();
    for i in 0..paragraphs.len() {
        for j in (i + 1)..paragraphs.len() {
            let similarity = jaccard_similarity(&grams[i], &grams[j]);
            if similarity >= NEAR_DUPLICATE_THRESHOLD {
                let mut alert = base_alert(project_id, "structure", "duplicate_paragraph", chapter, paragraphs[j]);
                alert.title = "Paragraph closely duplicates an earlier one".to_string();
                alert.description = format!("Trigram similarity {similarity:.2} with an earlier paragraph in this chapter.");
                alert.confidence = similarity;
                alerts.push(alert);
            }
        }
    }
    alerts
}

/// Capability for embedding-based near-duplicate detection across
/// chapters; a capability, not a requirement, so a deployment without an
/// embeddings backend still gets the lexical duplicate pass above
/// (`spec.md` §7 "Degraded capability").
pub trait SemanticRedundancyIndex: Send + Sync {
    fn nearest(&self, text: &str, candidates: &[&str]) -> Option<(usize, f64)>;
}

const SEMANTIC_REDUNDANCY_THRESHOLD: f64 = 0.92;

pub fn detect_semantic_redundancy(
    project_id: Uuid,
    chapter: i64,
    text: &str,
    index: &dyn SemanticRedundancyIndex,
) -> Vec<NewAlert> {
    let paragraphs = split_paragraphs(text);
    let mut alerts = Vec::new();
    for i in 1..paragraphs.len() {
        let earlier: Vec<&str> = paragraphs[..i].to_vec();
        if let Some((match_idx, score)) = index.nearest(paragraphs[i], &earlier) {
            if score >= SEMANTIC_REDUNDANCY_THRESHOLD {
                let mut alert = base_alert(project_id, "structure", "semantic_redundancy", chapter, paragraphs[i]);
                alert.title = "Paragraph is semantically redundant with an earlier one".to_string();
                alert.description = format!("Embedding similarity {score:.2} with paragraph {match_idx} in this chapter.");
                alert.confidence = score;
                alerts.push(alert);
            }
        }
    }
    alerts
}

/// Flag chapters whose sensory vocabulary is almost entirely one sense —
/// usually visual — leaving the prose flat in the others.
pub fn analyze_sensory_balance(project_id: Uuid, chapter: i64, text: &str) -> Vec<NewAlert> {
    let lower = text.to_lowercase();
    let counts: Vec<(&str, usize)> = SENSORY_LEXICON
        .iter()
        .map(|(sense, words)| (*sense, words.iter().filter(|w| lower.contains(*w)).count()))
        .collect();
    let total: usize = counts.iter().map(|(_, c)| c).sum();
    if total < 5 {
        return Vec::new();
    }
    let Some(&(dominant_sense, dominant_count)) = counts.iter().max_by_key(|(_, c)| *c) else { return Vec::new() };
    if dominant_count as f64 / total as f64 >= 0.85 {
        let mut alert = base_alert(project_id, "style", "sensory_imbalance", chapter, "");
        alert.title = format!("Sensory detail is almost entirely {dominant_sense}");
        alert.description = format!("{dominant_count} of {total} sensory words in this chapter are {dominant_sense}.");
        vec![alert]
    } else {
        Vec::new()
    }
}

/// Flag chapters whose narration mixes formal ("usted") and informal
/// ("tú"/"vos") register markers outside of dialogue, which usually
/// indicates an inconsistent narrative voice rather than intentional
/// character contrast.
pub fn analyze_register_consistency(project_id: Uuid, chapter: i64, narration_text: &str) -> Vec<NewAlert> {
    let lower = narration_text.to_lowercase();
    let formal = FORMAL_MARKERS.iter().filter(|m| lower.contains(*m)).count();
    let informal = INFORMAL_MARKERS.iter().filter(|m| lower.contains(*m)).count();
    if formal > 0 && informal > 0 {
        let mut alert = base_alert(project_id, "style", "register_inconsistency", chapter, "");
        alert.title = "Narration mixes formal and informal address".to_string();
        alert.description = format!("Found {formal} formal and {informal} informal address markers outside dialogue.");
        vec![alert]
    } else {
        Vec::new()
    }
}

/// Flag a chapter whose narrative voice (detected independently per half)
/// shifts between first and third person without a scene break, which
/// usually signals an editing slip rather than a deliberate focalization
/// change.
pub fn analyze_focalization(project_id: Uuid, chapter: i64, text: &str) -> Vec<NewAlert> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < 40 {
        return Vec::new();
    }
    let midpoint = tokens.len() / 2;
    let first_half = detect_narrative_voice(&tokens[..midpoint]);
    let second_half = detect_narrative_voice(&tokens[midpoint..]);

    let shifted = matches!(
        (first_half, second_half),
        (NarrativeVoice::FirstPerson, NarrativeVoice::ThirdPersonLimited | NarrativeVoice::ThirdPersonOmniscient)
            | (NarrativeVoice::ThirdPersonLimited | NarrativeVoice::ThirdPersonOmniscient, NarrativeVoice::FirstPerson)
    );
    if shifted {
        let mut alert = base_alert(project_id, "structure", "focalization_shift", chapter, "");
        alert.title = "Narrative point of view shifts within the chapter".to_string();
        alert.description = "The first and second half of this chapter were detected as different narrative voices.".to_string();
        vec![alert]
    } else {
        Vec::new()
    }
}

/// Flag occurrences of a project's own banned phrases (`spec.md` §3
/// "editorial rules" — a free-text per-project house style list, one
/// phrase per line) found verbatim in a chapter. Disabled rule sets are
/// the caller's concern: this function only matches whatever text it is
/// given.
pub fn apply_editorial_rules(project_id: Uuid, chapter: i64, text: &str, rules_text: &str) -> Vec<NewAlert> {
    let lower = text.to_lowercase();
    rules_text
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .filter(|phrase| lower.contains(&phrase.to_lowercase()))
        .map(|phrase| {
            let mut alert = base_alert(project_id, "editorial", "editorial_rule_violation", chapter, phrase);
            alert.title = format!("Contains a phrase the project's house style bans: \"{phrase}\"");
            alert.description = "Matched a line from this project's editorial rules.".to_string();
            alert.confidence = 1.0;
            alert
        })
        .collect()
}

/// Run every text-only analyzer (those not requiring a capability) over a
/// project's chapters and return their combined alerts.
pub fn analyze_style_structure(project_id: Uuid, chapters: &[(i64, String)]) -> Vec<NewAlert> {
    let mut alerts = analyze_pacing_tension(project_id, chapters);
    for (chapter, text) in chapters {
        alerts.extend(detect_sticky_sentences(project_id, *chapter, text));
        alerts.extend(detect_low_energy_sentences(project_id, *chapter, text));
        alerts.extend(detect_close_repetitions(project_id, *chapter, text));
        alerts.extend(detect_duplicate_paragraphs(project_id, *chapter, text));
        alerts.extend(analyze_sensory_balance(project_id, *chapter, text));
        alerts.extend(analyze_register_consistency(project_id, *chapter, text));
        alerts.extend(analyze_focalization(project_id, *chapter, text));
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sticky_sentence_with_many_que_is_flagged() {
        let text = "Ella dijo que el hombre que vino ayer era el mismo que la había visto que la siguió.";
        let alerts = detect_sticky_sentences(Uuid::new_v4(), 1, text);
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn close_repetition_of_a_content_word_is_flagged() {
        let text = "El bosque oscuro se extendía sin fin entre montañas y el bosque parecía respirar.";
        let alerts = detect_close_repetitions(Uuid::new_v4(), 1, text);
        assert!(alerts.iter().any(|a| a.title.contains("bosque")));
    }

    #[test]
    fn near_identical_paragraphs_are_flagged_as_duplicates() {
        let text = "Ana caminó despacio por la calle vacía mirando las luces apagadas de las casas.\n\nAna caminaba despacio por la calle vacía mirando las luces apagadas de las casas.";
        let alerts = detect_duplicate_paragraphs(Uuid::new_v4(), 1, text);
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn mixed_register_markers_are_flagged() {
        let text = "Usted debería saber que vos nunca vienes a tiempo.";
        let alerts = analyze_register_consistency(Uuid::new_v4(), 1, text);
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn consistent_third_person_chapter_has_no_focalization_alert() {
        let text = "Ella caminó hasta la puerta y miró hacia fuera. ".repeat(20);
        let alerts = analyze_focalization(Uuid::new_v4(), 1, &text);
        assert!(alerts.is_empty());
    }

    #[test]
    fn editorial_rule_match_is_flagged() {
        let text = "El detective avanzó a pasos agigantados hacia la puerta.";
        let alerts = apply_editorial_rules(Uuid::new_v4(), 1, text, "a pasos agigantados\notra frase prohibida");
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].title.contains("pasos agigantados"));
    }

    #[test]
    fn editorial_rules_with_no_match_produce_no_alerts() {
        let text = "Ella caminó despacio hasta la ventana.";
        let alerts = apply_editorial_rules(Uuid::new_v4(), 1, text, "a pasos agigantados");
        assert!(alerts.is_empty());
    }
}
