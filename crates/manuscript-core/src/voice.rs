//! Voice profile metrics (`spec.md` §4.9 "Voice Profiler").
//!
//! A voice profile is computed per speaking entity from their collected
//! dialogue lines, and is the unit both the profiler and the speech-change
//! detector (`spec.md` §4.7) operate on.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discrete stylistic markers tallied as counts/frequencies rather than
/// continuous measurements (`spec.md` §4.7 "discrete metrics" -> chi-squared
/// rather than z-test at comparison time).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscreteMetrics {
    pub formal_register_count: u64,
    pub informal_register_count: u64,
    pub question_count: u64,
    pub exclamation_count: u64,
    pub filler_count: u64,
    pub total_lines: u64,
}

/// Continuous stylistic measurements (`spec.md` §4.7 "continuous metrics"
/// -> z-test at comparison time).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContinuousMetrics {
    /// Share of lines carrying a formal-register marker. A ratio in shape,
    /// but tested with a z-test rather than chi-squared: formality is a
    /// gradual register shift, not a count of discrete events
    /// (`spec.md` §4.7, `change_detector.py`'s `DISCRETE_METRICS` excludes
    /// `formality_score`).
    pub formal_register_ratio: f64,
    pub mean_sentence_length: f64,
    pub mean_word_length: f64,
    pub vocabulary_richness: f64,
    pub punctuation_density: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub id: Uuid,
    pub entity_id: Uuid,
    /// Fingerprint of the document text this profile was computed from, so
    /// the profiler's cache can be invalidated precisely when the
    /// underlying dialogue changes (`spec.md` §4.9 "LRU cache keyed by
    /// document fingerprint").
    pub document_fingerprint: String,
    pub discrete: DiscreteMetrics,
    pub continuous: ContinuousMetrics,
    pub sample_line_count: u64,
}

const FORMAL_MARKERS: &[&str] = &["usted", "ustedes"];
const INFORMAL_MARKERS: &[&str] = &["tú", "vos", "che", "pibe"];
const FILLER_MARKERS: &[&str] = &["eh", "este", "o sea", "bueno", "pues", "digamos", "mmm", "en fin"];

/// Compute a profile from the raw dialogue lines attributed to one entity.
pub fn compute_profile(entity_id: Uuid, document_fingerprint: &str, lines: &[String]) -> VoiceProfile {
    let mut discrete = DiscreteMetrics::default();
    let mut total_sentence_len = 0.0;
    let mut total_word_len = 0.0;
    let mut total_words = 0u64;
    let mut punctuation_chars = 0u64;
    let mut total_chars = 0u64;
    let mut unique_words = std::collections::HashSet::new();

    for line in lines {
        discrete.total_lines += 1;
        let lower = line.to_lowercase();
        if FORMAL_MARKERS.iter().any(|m| lower.contains(m)) {
            discrete.formal_register_count += 1;
        }
        if INFORMAL_MARKERS.iter().any(|m| lower.contains(m)) {
            discrete.informal_register_count += 1;
        }
        if line.contains('?') || line.contains('¿') {
            discrete.question_count += 1;
        }
        if line.contains('!') || line.contains('¡') {
            discrete.exclamation_count += 1;
        }
        if FILLER_MARKERS.iter().any(|m| lower.contains(m)) {
            discrete.filler_count += 1;
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        total_sentence_len += words.len() as f64;
        for word in &words {
            total_word_len += word.chars().count() as f64;
            total_words += 1;
            unique_words.insert(word.to_lowercase());
        }
        total_chars += line.chars().count() as u64;
        punctuation_chars += line.chars().filter(|c| c.is_ascii_punctuation()).count() as u64;
    }

    let sample_line_count = lines.len() as u64;
    let continuous = if sample_line_count > 0 {
        ContinuousMetrics {
            formal_register_ratio: discrete.formal_register_count as f64 / sample_line_count as f64,
            mean_sentence_length: total_sentence_len / sample_line_count as f64,
            mean_word_length: if total_words > 0 { total_word_len / total_words as f64 } else { 0.0 },
            vocabulary_richness: if total_words > 0 { unique_words.len() as f64 / total_words as f64 } else { 0.0 },
            punctuation_density: if total_chars > 0 { punctuation_chars as f64 / total_chars as f64 } else { 0.0 },
        }
    } else {
        ContinuousMetrics::default()
    };

    VoiceProfile {
        id: Uuid::new_v4(),
        entity_id,
        document_fingerprint: document_fingerprint.to_string(),
        discrete,
        continuous,
        sample_line_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formal_register_is_tallied() {
        let lines = vec!["¿Usted sabe la hora?".to_string(), "Usted debería irse.".to_string()];
        let profile = compute_profile(Uuid::new_v4(), "fp", &lines);
        assert_eq!(profile.discrete.formal_register_count, 2);
        assert_eq!(profile.discrete.question_count, 1);
    }

    #[test]
    fn empty_lines_yield_zeroed_continuous_metrics() {
        let profile = compute_profile(Uuid::new_v4(), "fp", &[]);
        assert_eq!(profile.continuous.mean_sentence_length, 0.0);
    }
}
