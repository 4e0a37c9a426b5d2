//! Speech-change detection service (`spec.md` §4.7 "Speech-Change
//! Detector"): slides a window of dialogue over a character's chapters,
//! runs the significance test in `manuscript_core::speech_change`, and
//! mitigates the resulting alert's severity when a dramatic narrative event
//! plausibly explains the shift (a character grieving speaks differently
//! without that being a voice-consistency bug).

use manuscript_core::alert::{AlertSeverity, NewAlert};
use manuscript_core::speech_change::detect_change;
use manuscript_core::voice::compute_profile;
use manuscript_types::SpeechChangeSettings;
use regex::Regex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DramaticEvent {
    Muerte,
    Boda,
    Pelea,
    Trauma,
    Enfermedad,
    Viaje,
    Revelacion,
}

impl DramaticEvent {
    fn keywords(self) -> &'static [&'static str] {
        match self {
            DramaticEvent::Muerte => &[
                "murió", "muerto", "falleció", "fallecimiento", "funeral", "entierro", "luto", "difunto", "cadáver",
                "asesinato", "suicidio", "pérdida", "velatorio", "cementerio",
            ],
            DramaticEvent::Boda => &["boda", "casamiento", "novia", "novio", "matrimonio", "altar", "anillo"],
            DramaticEvent::Pelea => &["pelea", "discusión", "golpe", "gritó", "insultó", "enfrentamiento", "riña"],
            DramaticEvent::Trauma => &["trauma", "pesadilla", "shock", "horror", "pánico", "terror"],
            DramaticEvent::Enfermedad => &["enfermo", "enfermedad", "hospital", "diagnóstico", "fiebre", "dolencia"],
            DramaticEvent::Viaje => &["viaje", "partió", "llegó", "estación", "puerto", "equipaje", "maleta"],
            DramaticEvent::Revelacion => &["descubrió", "secreto", "verdad", "confesó", "reveló", "traición"],
        }
    }

    /// Relative severity of the event type (`spec.md` §4.7): death outweighs
    /// a trip, so the mitigation is proportional rather than all-or-nothing.
    fn weight(self) -> f64 {
        match self {
            DramaticEvent::Muerte => 1.0,
            DramaticEvent::Trauma => 0.9,
            DramaticEvent::Enfermedad => 0.8,
            DramaticEvent::Revelacion => 0.7,
            DramaticEvent::Pelea => 0.6,
            DramaticEvent::Boda => 0.5,
            DramaticEvent::Viaje => 0.4,
        }
    }

    const ALL: [DramaticEvent; 7] = [
        DramaticEvent::Muerte,
        DramaticEvent::Boda,
        DramaticEvent::Pelea,
        DramaticEvent::Trauma,
        DramaticEvent::Enfermedad,
        DramaticEvent::Viaje,
        DramaticEvent::Revelacion,
    ];
}

#[derive(Debug, Clone, Default)]
pub struct NarrativeContext {
    pub has_dramatic_event: bool,
    pub event_type: Option<DramaticEvent>,
    pub keywords_found: Vec<String>,
}

/// Scan the text spanning a speech-change window pair for the
/// highest-scoring dramatic event, if any clears a minimum of one keyword.
pub fn analyze_context(combined_text: &str) -> NarrativeContext {
    let lower = combined_text.to_lowercase();
    let mut best: Option<(DramaticEvent, f64, Vec<String>)> = None;

    for event in DramaticEvent::ALL {
        let mut found = Vec::new();
        for keyword in event.keywords() {
            let pattern = format!(r"\b{}\b", regex::escape(keyword));
            if Regex::new(&pattern).expect("keyword pattern compiles").is_match(&lower) {
                found.push((*keyword).to_string());
            }
        }
        if found.is_empty() {
            continue;
        }
        let score = found.len() as f64 * event.weight();
        if best.as_ref().map(|(_, best_score, _)| score > *best_score).unwrap_or(true) {
            best = Some((event, score, found));
        }
    }

    match best {
        Some((event_type, _, mut keywords_found)) => {
            keywords_found.truncate(5);
            NarrativeContext { has_dramatic_event: true, event_type: Some(event_type), keywords_found }
        }
        None => NarrativeContext::default(),
    }
}

/// Whether a detected narrative event justifies stepping the alert's
/// severity down one notch. Weak events (a trip) paired with low detector
/// confidence should not silently swallow a real voice-consistency bug.
pub fn should_reduce_severity(context: &NarrativeContext, detector_confidence: f64) -> bool {
    match context.event_type {
        Some(event) => context.has_dramatic_event && event.weight() * detector_confidence >= 0.3,
        None => false,
    }
}

pub struct ChapterWindow {
    pub chapter_indices: Vec<i64>,
    pub dialogue_lines: Vec<String>,
    pub text: String,
}

/// Split a character's chapters into overlapping windows per
/// `SpeechChangeSettings`, skipping windows below the minimum word count.
pub fn windows_for_chapters(chapters: &[(i64, String, Vec<String>)], settings: &SpeechChangeSettings) -> Vec<ChapterWindow> {
    if chapters.is_empty() || settings.window_size_chapters == 0 {
        return Vec::new();
    }
    let step = settings.window_size_chapters.saturating_sub(settings.window_overlap_chapters).max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    while start < chapters.len() {
        let end = (start + settings.window_size_chapters).min(chapters.len());
        let slice = &chapters[start..end];
        let text = slice.iter().map(|(_, t, _)| t.as_str()).collect::<Vec<_>>().join("\n");
        if text.split_whitespace().count() >= settings.min_window_words {
            windows.push(ChapterWindow {
                chapter_indices: slice.iter().map(|(idx, _, _)| *idx).collect(),
                dialogue_lines: slice.iter().flat_map(|(_, _, lines)| lines.iter().cloned()).collect(),
                text,
            });
        }
        if end == chapters.len() {
            break;
        }
        start += step;
    }
    windows
}

/// Compare each window against the one immediately before it for
/// `entity_id` and emit a mitigated alert for every significant shift
/// (`spec.md` §4.7, `speech_tracker.py::detect_changes`'s
/// `for i in range(len(windows) - 1)`: adjacent pairs, not a fixed
/// baseline, so a shift is measured against where the voice actually was
/// just before it, not against the start of the manuscript).
pub fn detect_speech_changes(
    project_id: Uuid,
    entity_id: Uuid,
    entity_name: &str,
    document_fingerprint: &str,
    windows: &[ChapterWindow],
    settings: &SpeechChangeSettings,
) -> Vec<NewAlert> {
    if windows.len() < 2 {
        return Vec::new();
    }

    let mut alerts = Vec::new();
    for pair in windows.windows(2) {
        let (baseline, window) = (&pair[0], &pair[1]);
        let baseline_profile = compute_profile(entity_id, document_fingerprint, &baseline.dialogue_lines);
        let window_profile = compute_profile(entity_id, document_fingerprint, &window.dialogue_lines);
        let result = detect_change(&baseline_profile.discrete, &baseline_profile.continuous, &window_profile.discrete, &window_profile.continuous, settings);
        if !result.flagged {
            continue;
        }

        let combined_text = format!("{}\n{}", baseline.text, window.text);
        let context = analyze_context(&combined_text);
        let confidence = (result.significant_count as f64 / result.shifts.len().max(1) as f64).clamp(0.0, 1.0);
        let mut severity = AlertSeverity::Warning;
        if should_reduce_severity(&context, confidence) {
            severity = severity.step_down();
        }

        let chapter = window.chapter_indices.first().copied();
        alerts.push(NewAlert {
            project_id,
            category: "voice".to_string(),
            alert_type: "speech_change".to_string(),
            severity,
            title: format!("{entity_name}'s dialogue shifts noticeably"),
            description: format!(
                "{} of {} tracked metrics moved significantly from this character's established baseline.",
                result.significant_count,
                result.shifts.len()
            ),
            explanation: result
                .shifts
                .iter()
                .filter(|s| s.significant)
                .map(|s| format!("{}: {:.2} -> {:.2} (p={:.3})", s.metric_name, s.baseline_value, s.window_value, s.p_value))
                .collect::<Vec<_>>()
                .join("; "),
            suggestion: "Confirm this shift is intentional characterization rather than drift.".to_string(),
            excerpt: window.dialogue_lines.first().cloned().unwrap_or_default(),
            chapter,
            start_char: None,
            end_char: None,
            confidence,
            related_entity_ids: vec![entity_id],
            extra_data: serde_json::json!({ "dramatic_event": context.event_type.map(|e| format!("{e:?}")), "keywords": context.keywords_found }),
            key_fields: vec![entity_id.to_string()],
        });
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn death_keywords_are_detected_and_outweigh_a_trip() {
        let text = "El funeral fue doloroso. Todos lloraron por el difunto. Luego hicieron un viaje corto.";
        let context = analyze_context(text);
        assert!(context.has_dramatic_event);
        assert_eq!(context.event_type, Some(DramaticEvent::Muerte));
    }

    #[test]
    fn no_keywords_yields_no_event() {
        let context = analyze_context("Caminaron por la plaza y tomaron café.");
        assert!(!context.has_dramatic_event);
        assert!(!should_reduce_severity(&context, 0.9));
    }

    #[test]
    fn windowing_skips_short_windows() {
        let settings = SpeechChangeSettings { window_size_chapters: 2, window_overlap_chapters: 0, min_window_words: 5, ..SpeechChangeSettings::default() };
        let chapters = vec![
            (1i64, "uno dos".to_string(), vec!["—Hola.".to_string()]),
            (2i64, "tres cuatro cinco seis".to_string(), vec!["—Adiós.".to_string()]),
        ];
        let windows = windows_for_chapters(&chapters, &settings);
        assert_eq!(windows.len(), 1);
    }
}
