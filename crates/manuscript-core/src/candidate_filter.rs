//! Antecedent candidate admissibility (`spec.md` §4.4 "Candidate window").
//!
//! Restricts the antecedent search space before scoring: candidates must
//! precede the anaphor, fall within the configured sentence-distance
//! window, optionally not cross a chapter boundary, and agree in number
//! when both are known (a hard morphological veto, distinct from the
//! morphology scoring method's soft partial credit).

use crate::mention::{Mention, Number};
use manuscript_types::VotingSettings;

/// Returns the indices (into `mentions`) of admissible antecedent
/// candidates for the mention at `anaphor_idx`, in document order.
pub fn admissible_candidates(
    mentions: &[Mention],
    anaphor_idx: usize,
    settings: &VotingSettings,
) -> Vec<usize> {
    let anaphor = &mentions[anaphor_idx];
    let mut out = Vec::new();

    for (idx, candidate) in mentions.iter().enumerate() {
        if idx == anaphor_idx {
            continue;
        }
        if candidate.start_char >= anaphor.start_char {
            continue;
        }
        if candidate.id == anaphor.id {
            continue;
        }

        let sentence_distance = anaphor.sentence_idx.saturating_sub(candidate.sentence_idx) as i64;
        if sentence_distance > settings.max_antecedent_sentence_distance {
            continue;
        }

        if settings.use_chapter_boundaries {
            match (anaphor.chapter_id, candidate.chapter_id) {
                (Some(a), Some(c)) if a != c => continue,
                _ => {}
            }
        }

        if !numbers_compatible(anaphor.number, candidate.number) {
            continue;
        }

        out.push(idx);
    }

    out
}

fn numbers_compatible(a: Number, b: Number) -> bool {
    match (a, b) {
        (Number::Unknown, _) | (_, Number::Unknown) => true,
        (a, b) => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mention::{MentionSource, MentionType, SentenceIdxBasis};
    use uuid::Uuid;

    fn mention(start: usize, sentence_idx: usize, chapter: Option<Uuid>, number: Number) -> Mention {
        let mut m = Mention::new(
            "x",
            start,
            start + 1,
            MentionType::Pronoun,
            sentence_idx,
            SentenceIdxBasis::Dense,
            MentionSource::MorphAnalyzer,
        );
        m.chapter_id = chapter;
        m.number = number;
        m
    }

    #[test]
    fn future_mentions_are_never_candidates() {
        let mentions = vec![mention(0, 0, None, Number::Unknown), mention(100, 1, None, Number::Unknown)];
        let candidates = admissible_candidates(&mentions, 0, &VotingSettings::default());
        assert!(candidates.is_empty());
    }

    #[test]
    fn distant_sentences_are_excluded() {
        let mentions = vec![
            mention(0, 0, None, Number::Unknown),
            mention(100, 10, None, Number::Unknown),
        ];
        let candidates = admissible_candidates(&mentions, 1, &VotingSettings::default());
        assert!(candidates.is_empty());
    }

    #[test]
    fn chapter_boundary_blocks_candidate_when_enabled() {
        let ch_a = Uuid::new_v4();
        let ch_b = Uuid::new_v4();
        let mentions = vec![
            mention(0, 0, Some(ch_a), Number::Unknown),
            mention(100, 1, Some(ch_b), Number::Unknown),
        ];
        let mut settings = VotingSettings::default();
        settings.use_chapter_boundaries = true;
        assert!(admissible_candidates(&mentions, 1, &settings).is_empty());
        settings.use_chapter_boundaries = false;
        assert_eq!(admissible_candidates(&mentions, 1, &settings), vec![0]);
    }

    #[test]
    fn number_mismatch_is_a_hard_veto() {
        let mentions = vec![
            mention(0, 0, None, Number::Plural),
            mention(100, 1, None, Number::Singular),
        ];
        assert!(admissible_candidates(&mentions, 1, &VotingSettings::default()).is_empty());
    }
}
