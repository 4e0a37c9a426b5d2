//! Scoring Methods (`spec.md` §4.3). Each method implements the same
//! contract: given an anaphor, a list of candidate antecedents, and the
//! document, return `{candidate -> (score, reasoning)}`.
//!
//! Morphology and Heuristics are pure (no external capability). Embeddings
//! and LLM are capability-backed: the scorer takes a `&dyn` capability
//! reference and simply omits itself from the result map when the
//! capability reports unavailable, per `spec.md` §7 "Degraded capability".

use crate::mention::{Gender, Mention, MentionType, Number};
use async_trait::async_trait;
use std::collections::HashMap;

/// Closed set of scoring method identifiers (`spec.md` §9 "tagged
/// variants").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Morphology,
    Embeddings,
    Llm,
    Heuristics,
    ProDropSaliency,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Morphology => "morphology",
            Method::Embeddings => "embeddings",
            Method::Llm => "llm",
            Method::Heuristics => "heuristics",
            Method::ProDropSaliency => "pro_drop_saliency",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MethodScore {
    pub score: f64,
    pub reasoning: String,
}

pub type ScoreMap = HashMap<usize, MethodScore>;

/// Morphology scoring (`spec.md` §4.3 "Morphology"): 1.0 if gender AND
/// number both match; partial credit for partial match; 0.5 for unknowns
/// on either side (non-committal); 0 for outright conflict.
pub fn score_morphology(anaphor: &Mention, candidates: &[&Mention]) -> ScoreMap {
    let mut out = ScoreMap::new();
    for (idx, cand) in candidates.iter().enumerate() {
        let gender_score = agreement_score(anaphor.gender_matchable(), cand.gender_matchable());
        let number_score = agreement_score(anaphor.number_matchable(), cand.number_matchable());
        let score = if gender_score == 1.0 && number_score == 1.0 {
            1.0
        } else if gender_score == 0.0 || number_score == 0.0 {
            0.0
        } else {
            (gender_score + number_score) / 2.0
        };
        let reasoning = format!(
            "gender={:?}/{:?} number={:?}/{:?}",
            anaphor.gender, cand.gender, anaphor.number, cand.number
        );
        out.insert(idx, MethodScore { score, reasoning });
    }
    out
}

fn agreement_score<T: PartialEq>(a: Option<T>, b: Option<T>) -> f64 {
    match (a, b) {
        (None, _) | (_, None) => 0.5,
        (Some(a), Some(b)) => {
            if a == b {
                1.0
            } else {
                0.0
            }
        }
    }
}

trait Matchable {
    fn gender_matchable(&self) -> Option<Gender>;
    fn number_matchable(&self) -> Option<Number>;
}

impl Matchable for Mention {
    fn gender_matchable(&self) -> Option<Gender> {
        match self.gender {
            Gender::Unknown => None,
            g => Some(g),
        }
    }
    fn number_matchable(&self) -> Option<Number> {
        match self.number {
            Number::Unknown => None,
            n => Some(n),
        }
    }
}

/// Heuristics scoring (`spec.md` §4.3 "Heuristics"): closer candidates
/// score higher with exponential decay; subjects of the immediately
/// preceding sentence get a discourse bonus; proper nouns outrank definite
/// NPs at equal distance.
pub fn score_heuristics(anaphor: &Mention, candidates: &[&Mention]) -> ScoreMap {
    let mut out = ScoreMap::new();
    for (idx, cand) in candidates.iter().enumerate() {
        let char_distance = anaphor.start_char.saturating_sub(cand.end_char) as f64;
        let recency = recency_score(char_distance);

        let sentence_distance = anaphor.sentence_idx.abs_diff(cand.sentence_idx);
        let discourse_bonus = if sentence_distance == 1 { 0.15 } else { 0.0 };

        let type_bonus = if cand.mention_type == MentionType::ProperNoun {
            0.1
        } else {
            0.0
        };

        let score = (recency + discourse_bonus + type_bonus).min(1.0);
        let reasoning = format!(
            "recency={:.2} discourse_bonus={:.2} type_bonus={:.2}",
            recency, discourse_bonus, type_bonus
        );
        out.insert(idx, MethodScore { score, reasoning });
    }
    out
}

/// Recency score: 1.0 at 0 chars, ~0 at 500+ chars (`spec.md` §4.3).
pub fn recency_score(char_distance: f64) -> f64 {
    (1.0 - (char_distance / 500.0)).clamp(0.0, 1.0)
}

/// Pro-drop saliency (`spec.md` §4.3 "Pro-drop saliency"): only scores
/// zero/pro-drop anaphors, combining five weighted sub-factors into a
/// single per-candidate score — recency (0.30), multi-factor saliency over
/// the segment (0.25), gender concord (0.20), discourse position (0.15),
/// number concord (0.10). `mention_frequency` is how many times each
/// candidate's surface form was seen as a named/definite mention so far in
/// the chapter, standing in for "mentions per entity" ahead of entity
/// assignment; it is normalized by the most-mentioned candidate.
pub fn score_pro_drop_saliency(
    anaphor: &Mention,
    candidates: &[&Mention],
    mention_frequency: &HashMap<String, usize>,
) -> ScoreMap {
    let mut out = ScoreMap::new();
    if anaphor.mention_type != MentionType::ZeroProDrop {
        return out;
    }
    let max_frequency = mention_frequency.values().copied().max().unwrap_or(0).max(1) as f64;

    for (idx, cand) in candidates.iter().enumerate() {
        let char_distance = anaphor.start_char.saturating_sub(cand.end_char) as f64;
        let recency = recency_score(char_distance);

        let frequency = *mention_frequency.get(&cand.surface_form.to_lowercase()).unwrap_or(&0) as f64;
        let subject_bonus = if cand.mention_type == MentionType::ProperNoun || cand.mention_type == MentionType::DefiniteNp {
            0.1
        } else {
            0.0
        };
        let saliency = (frequency / max_frequency + subject_bonus).clamp(0.0, 1.0);

        let gender_concord = agreement_score(anaphor.gender_matchable(), cand.gender_matchable());
        let number_concord = agreement_score(anaphor.number_matchable(), cand.number_matchable());

        let sentence_distance = anaphor.sentence_idx.abs_diff(cand.sentence_idx) as f64;
        let discourse_position = (1.0 - sentence_distance * 0.25).clamp(0.0, 1.0);

        let score = recency * 0.30 + saliency * 0.25 + gender_concord * 0.20 + discourse_position * 0.15 + number_concord * 0.10;
        let reasoning = format!(
            "recency={:.2} saliency={:.2} gender_concord={:.2} discourse={:.2} number_concord={:.2}",
            recency, saliency, gender_concord, discourse_position, number_concord
        );
        out.insert(idx, MethodScore { score: score.clamp(0.0, 1.0), reasoning });
    }
    out
}

/// Embeddings scoring capability: cosine similarity between sentence-level
/// embeddings of the anaphor's context and each candidate's context,
/// mapped monotonically into `[0, 1]`.
#[async_trait]
pub trait EmbeddingSimilarity: Send + Sync {
    /// Returns `None` when the capability is unavailable for this call
    /// (model not loaded, timeout) — this is a degraded-capability signal,
    /// not an error.
    async fn similarity(&self, text_a: &str, text_b: &str) -> Option<f64>;
}

pub async fn score_embeddings(
    anaphor: &Mention,
    candidates: &[&Mention],
    provider: &dyn EmbeddingSimilarity,
) -> ScoreMap {
    let mut out = ScoreMap::new();
    let anaphor_ctx = format!("{}{}{}", anaphor.context_before, anaphor.surface_form, anaphor.context_after);
    for (idx, cand) in candidates.iter().enumerate() {
        let cand_ctx = format!("{}{}{}", cand.context_before, cand.surface_form, cand.context_after);
        if let Some(cos) = provider.similarity(&anaphor_ctx, &cand_ctx).await {
            // cosine in [-1, 1] -> [0, 1]
            let mapped = ((cos + 1.0) / 2.0).clamp(0.0, 1.0);
            out.insert(
                idx,
                MethodScore {
                    score: mapped,
                    reasoning: format!("cosine={:.3}", cos),
                },
            );
        }
    }
    out
}

/// LLM scoring capability: a structured (chosen candidate index, confidence,
/// short justification) response, or `None` if the LLM is unavailable.
#[async_trait]
pub trait LlmCorefAssistant: Send + Sync {
    async fn resolve(&self, anaphor_text: &str, candidates: &[&str], surrounding: &str) -> Option<LlmVerdict>;
}

#[derive(Debug, Clone)]
pub struct LlmVerdict {
    pub chosen_index: usize,
    pub confidence: f64,
    pub justification: String,
}

pub async fn score_llm(
    anaphor: &Mention,
    candidates: &[&Mention],
    surrounding: &str,
    assistant: &dyn LlmCorefAssistant,
) -> ScoreMap {
    let mut out = ScoreMap::new();
    let candidate_texts: Vec<&str> = candidates.iter().map(|c| c.surface_form.as_str()).collect();
    if let Some(verdict) = assistant.resolve(&anaphor.surface_form, &candidate_texts, surrounding).await {
        if verdict.chosen_index < candidates.len() {
            out.insert(
                verdict.chosen_index,
                MethodScore {
                    score: verdict.confidence.clamp(0.0, 1.0),
                    reasoning: verdict.justification,
                },
            );
            // Candidates not chosen by the LLM receive a low residual score
            // rather than being silently omitted, so the voter's
            // denominator still reflects the LLM's opinion about them.
            for (idx, _) in candidates.iter().enumerate() {
                out.entry(idx).or_insert(MethodScore {
                    score: 0.05,
                    reasoning: "not chosen by LLM".to_string(),
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mention::{MentionSource, SentenceIdxBasis};

    fn mention_at(start: usize, end: usize, sentence_idx: usize, mt: MentionType) -> Mention {
        Mention::new("x", start, end, mt, sentence_idx, SentenceIdxBasis::Dense, MentionSource::MorphAnalyzer)
    }

    #[test]
    fn morphology_perfect_match_scores_one() {
        let mut anaphor = mention_at(100, 104, 4, MentionType::Pronoun);
        anaphor.gender = Gender::Feminine;
        anaphor.number = Number::Singular;
        let mut cand = mention_at(10, 20, 3, MentionType::ProperNoun);
        cand.gender = Gender::Feminine;
        cand.number = Number::Singular;
        let scores = score_morphology(&anaphor, &[&cand]);
        assert_eq!(scores[&0].score, 1.0);
    }

    #[test]
    fn morphology_conflict_scores_zero() {
        let mut anaphor = mention_at(100, 104, 4, MentionType::Pronoun);
        anaphor.gender = Gender::Feminine;
        anaphor.number = Number::Singular;
        let mut cand = mention_at(10, 20, 3, MentionType::ProperNoun);
        cand.gender = Gender::Masculine;
        cand.number = Number::Singular;
        let scores = score_morphology(&anaphor, &[&cand]);
        assert_eq!(scores[&0].score, 0.0);
    }

    #[test]
    fn recency_decays_to_near_zero_past_500_chars() {
        assert_eq!(recency_score(0.0), 1.0);
        assert!(recency_score(500.0) <= 0.01);
        assert!(recency_score(250.0) > 0.4 && recency_score(250.0) < 0.6);
    }

    #[test]
    fn heuristics_prefers_proper_noun_at_equal_distance() {
        let anaphor = mention_at(100, 104, 4, MentionType::Pronoun);
        let proper = mention_at(10, 20, 3, MentionType::ProperNoun);
        let np = mention_at(10, 30, 3, MentionType::DefiniteNp);
        let scores = score_heuristics(&anaphor, &[&proper, &np]);
        assert!(scores[&0].score >= scores[&1].score);
    }

    #[test]
    fn pro_drop_saliency_ignores_non_zero_anaphors() {
        let anaphor = mention_at(100, 104, 4, MentionType::Pronoun);
        let cand = mention_at(10, 20, 3, MentionType::ProperNoun);
        let scores = score_pro_drop_saliency(&anaphor, &[&cand], &HashMap::new());
        assert!(scores.is_empty());
    }

    #[test]
    fn pro_drop_saliency_favors_the_more_frequently_mentioned_candidate() {
        let anaphor = mention_at(200, 200, 5, MentionType::ZeroProDrop);
        let mut maria = mention_at(10, 20, 3, MentionType::ProperNoun);
        maria.surface_form = "Maria".to_string();
        let mut juan = mention_at(30, 40, 3, MentionType::ProperNoun);
        juan.surface_form = "Juan".to_string();

        let mut frequency = HashMap::new();
        frequency.insert("maria".to_string(), 5);
        frequency.insert("juan".to_string(), 1);

        let scores = score_pro_drop_saliency(&anaphor, &[&maria, &juan], &frequency);
        assert!(scores[&0].score > scores[&1].score);
    }
}
