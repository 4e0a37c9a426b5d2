//! Narrator detection and dialogue segmentation (`spec.md` §4.2 "Narrator
//! binding", §4.10 "Dialogue detection").

use regex::Regex;

/// Narration point of view, inferred per chapter from pronoun/verb-person
/// density (`spec.md` §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrativeVoice {
    FirstPerson,
    SecondPerson,
    ThirdPersonLimited,
    ThirdPersonOmniscient,
}

/// First-person narrator pronoun surface forms, used both to detect
/// first-person narration and to bind zero-pro-drop subjects to "the
/// narrator" rather than a character entity.
const FIRST_PERSON_MARKERS: &[&str] = &["yo", "me", "mí", "conmigo", "nosotros", "nosotras"];
const SECOND_PERSON_MARKERS: &[&str] = &["tú", "vos", "usted", "te", "contigo"];

/// Classify a chapter's dominant narrative voice by counting first/second
/// person marker tokens against total tokens. Falls back to third-person
/// limited when neither first nor second person markers clear a minimal
/// density threshold.
pub fn detect_narrative_voice(tokens: &[&str]) -> NarrativeVoice {
    if tokens.is_empty() {
        return NarrativeVoice::ThirdPersonLimited;
    }
    let total = tokens.len() as f64;
    let first_count = tokens
        .iter()
        .filter(|t| FIRST_PERSON_MARKERS.contains(&t.to_lowercase().as_str()))
        .count() as f64;
    let second_count = tokens
        .iter()
        .filter(|t| SECOND_PERSON_MARKERS.contains(&t.to_lowercase().as_str()))
        .count() as f64;

    const DENSITY_THRESHOLD: f64 = 0.01;
    if first_count / total >= DENSITY_THRESHOLD && first_count >= second_count {
        NarrativeVoice::FirstPerson
    } else if second_count / total >= DENSITY_THRESHOLD {
        NarrativeVoice::SecondPerson
    } else {
        NarrativeVoice::ThirdPersonLimited
    }
}

/// Dialogue line styles found in Spanish-language prose (`spec.md` §4.10):
/// the em-dash convention (`—Dijo ella.`) and the guillemet/quote
/// convention (`«Dijo ella.»` or `"Dijo ella."`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueStyle {
    EmDash,
    Guillemet,
    StraightQuote,
}

#[derive(Debug, Clone)]
pub struct DialogueLine {
    pub style: DialogueStyle,
    pub start_char: usize,
    pub end_char: usize,
    pub text: String,
}

/// Find dialogue lines by scanning for each of the three conventions.
/// Matches never overlap: a line already claimed by the em-dash pass is
/// not reconsidered by the quote passes.
pub fn detect_dialogue_lines(text: &str) -> Vec<DialogueLine> {
    let mut lines = Vec::new();
    let mut claimed: Vec<(usize, usize)> = Vec::new();

    for m in em_dash_re().find_iter(text) {
        lines.push(DialogueLine {
            style: DialogueStyle::EmDash,
            start_char: m.start(),
            end_char: m.end(),
            text: m.as_str().to_string(),
        });
        claimed.push((m.start(), m.end()));
    }

    for m in guillemet_re().find_iter(text) {
        if overlaps(&claimed, m.start(), m.end()) {
            continue;
        }
        lines.push(DialogueLine {
            style: DialogueStyle::Guillemet,
            start_char: m.start(),
            end_char: m.end(),
            text: m.as_str().to_string(),
        });
        claimed.push((m.start(), m.end()));
    }

    for m in straight_quote_re().find_iter(text) {
        if overlaps(&claimed, m.start(), m.end()) {
            continue;
        }
        lines.push(DialogueLine {
            style: DialogueStyle::StraightQuote,
            start_char: m.start(),
            end_char: m.end(),
            text: m.as_str().to_string(),
        });
        claimed.push((m.start(), m.end()));
    }

    lines.sort_by_key(|l| l.start_char);
    lines
}

fn overlaps(claimed: &[(usize, usize)], start: usize, end: usize) -> bool {
    claimed.iter().any(|&(cs, ce)| start < ce && end > cs)
}

fn em_dash_re() -> Regex {
    Regex::new(r"(?m)^\s*—[^\n]*").unwrap()
}

fn guillemet_re() -> Regex {
    Regex::new(r"«[^»]*»").unwrap()
}

fn straight_quote_re() -> Regex {
    Regex::new("\"[^\"]*\"").unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_first_person_voice() {
        let tokens = vec!["Yo", "caminé", "hasta", "el", "final", "de", "la", "calle", "y", "me", "detuve"];
        assert_eq!(detect_narrative_voice(&tokens), NarrativeVoice::FirstPerson);
    }

    #[test]
    fn detects_third_person_by_default() {
        let tokens = vec!["Ella", "caminó", "hasta", "el", "final", "de", "la", "calle"];
        assert_eq!(detect_narrative_voice(&tokens), NarrativeVoice::ThirdPersonLimited);
    }

    #[test]
    fn em_dash_dialogue_is_detected() {
        let text = "—Buenas noches —dijo Ana.\nSiguió caminando.";
        let lines = detect_dialogue_lines(text);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].style, DialogueStyle::EmDash);
    }

    #[test]
    fn quote_styles_do_not_overlap_each_other() {
        let text = "«Hola» dijo ella, y \"adiós\" respondió él.";
        let lines = detect_dialogue_lines(text);
        assert_eq!(lines.len(), 2);
    }
}
