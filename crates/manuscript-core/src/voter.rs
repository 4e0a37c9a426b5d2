//! Weighted voting resolver (`spec.md` §4.4 "Voter").
//!
//! Combines per-method scores into a single ranked candidate list plus an
//! ambiguity score, and produces the `method_votes` wire structure stored on
//! the winning mention's `metadata` (`spec.md` §6).

use crate::scoring::{Method, ScoreMap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One method's contribution to one candidate, as serialized into
/// `method_votes` (`spec.md` §6: "array of {method, candidate_idx, score,
/// weight, reasoning}").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteDetail {
    pub method: String,
    pub candidate_idx: usize,
    pub score: f64,
    pub weight: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResult {
    /// Index into the candidate slice the voter was given, or `None` only
    /// when there were no candidates to rank at all. There is no minimum
    /// combined-score floor: a weak field still produces a winner, just
    /// with ambiguity close to 1.
    pub winner_idx: Option<usize>,
    pub winner_score: f64,
    /// `spec.md` §4.4: `1 - (best - second_best) / best`, 0 when there is a
    /// single candidate or no winner.
    pub ambiguity: f64,
    pub votes: Vec<VoteDetail>,
}

/// A method did not run for this call at all (capability absent), vs. ran
/// but had nothing to say about a given candidate (absent from its
/// `ScoreMap`). Only the former removes the method from renormalization.
pub struct MethodContribution {
    pub method: Method,
    pub scores: ScoreMap,
}

/// Combine contributions from however many methods actually ran (embeddings
/// and LLM may be absent) into a single ranked result. Weights of the
/// methods that did run are renormalized to sum to 1.0, so coverage gaps
/// from degraded capabilities don't silently deflate every score
/// (`spec.md` §7 "Degraded capability").
pub fn vote(
    contributions: &[MethodContribution],
    candidate_count: usize,
    method_weights: &HashMap<String, f64>,
) -> VoteResult {
    let weight_sum: f64 = contributions
        .iter()
        .map(|c| *method_weights.get(c.method.as_str()).unwrap_or(&0.0))
        .sum();

    let mut votes = Vec::new();
    let mut combined = vec![0.0_f64; candidate_count];

    for contribution in contributions {
        let raw_weight = *method_weights.get(contribution.method.as_str()).unwrap_or(&0.0);
        let weight = if weight_sum > 0.0 { raw_weight / weight_sum } else { 0.0 };
        for idx in 0..candidate_count {
            if let Some(method_score) = contribution.scores.get(&idx) {
                combined[idx] += method_score.score * weight;
                votes.push(VoteDetail {
                    method: contribution.method.as_str().to_string(),
                    candidate_idx: idx,
                    score: method_score.score,
                    weight,
                    reasoning: method_score.reasoning.clone(),
                });
            }
        }
    }

    let mut ranked: Vec<(usize, f64)> = combined.into_iter().enumerate().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (winner_idx, winner_score, ambiguity) = match ranked.first() {
        Some(&(best_idx, best_score)) => {
            let ambiguity = match ranked.get(1) {
                Some(&(_, second_score)) if best_score > 0.0 => {
                    (1.0 - (best_score - second_score) / best_score).clamp(0.0, 1.0)
                }
                _ => 0.0,
            };
            (Some(best_idx), best_score, ambiguity)
        }
        None => (None, 0.0, 1.0),
    };

    VoteResult {
        winner_idx,
        winner_score,
        ambiguity,
        votes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::MethodScore;

    fn contribution(method: Method, scores: &[(usize, f64)]) -> MethodContribution {
        let mut map = ScoreMap::new();
        for &(idx, score) in scores {
            map.insert(
                idx,
                MethodScore {
                    score,
                    reasoning: "test".to_string(),
                },
            );
        }
        MethodContribution { method, scores: map }
    }

    fn default_weights() -> HashMap<String, f64> {
        let mut w = HashMap::new();
        w.insert("morphology".to_string(), 0.20);
        w.insert("embeddings".to_string(), 0.30);
        w.insert("llm".to_string(), 0.35);
        w.insert("heuristics".to_string(), 0.15);
        w
    }

    #[test]
    fn clear_winner_has_low_ambiguity() {
        let contributions = vec![
            contribution(Method::Morphology, &[(0, 1.0), (1, 0.0)]),
            contribution(Method::Heuristics, &[(0, 0.9), (1, 0.1)]),
        ];
        let result = vote(&contributions, 2, &default_weights());
        assert_eq!(result.winner_idx, Some(0));
        assert!(result.ambiguity < 0.3);
    }

    #[test]
    fn close_race_has_high_ambiguity() {
        let contributions = vec![contribution(Method::Morphology, &[(0, 0.55), (1, 0.5)])];
        let result = vote(&contributions, 2, &default_weights());
        assert_eq!(result.winner_idx, Some(0));
        assert!(result.ambiguity > 0.05);
    }

    #[test]
    fn missing_capability_renormalizes_remaining_weights() {
        // Only heuristics ran (embeddings/llm capabilities unavailable);
        // its weight alone should still be able to win outright.
        let contributions = vec![contribution(Method::Heuristics, &[(0, 0.9), (1, 0.1)])];
        let result = vote(&contributions, 2, &default_weights());
        assert_eq!(result.winner_idx, Some(0));
        assert!((result.winner_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn low_scores_still_pick_the_best_candidate() {
        // No floor on the winning score: the voter always picks the max, it
        // just reports high ambiguity when every candidate scored poorly.
        let contributions = vec![contribution(Method::Morphology, &[(0, 0.2), (1, 0.1)])];
        let result = vote(&contributions, 2, &default_weights());
        assert_eq!(result.winner_idx, Some(0));
        assert!(result.ambiguity > 0.4);
    }

    #[test]
    fn no_candidates_yields_no_winner() {
        let contributions = vec![contribution(Method::Morphology, &[])];
        let result = vote(&contributions, 0, &default_weights());
        assert_eq!(result.winner_idx, None);
    }

    #[test]
    fn single_candidate_has_zero_ambiguity() {
        let contributions = vec![contribution(Method::Morphology, &[(0, 0.9)])];
        let result = vote(&contributions, 1, &default_weights());
        assert_eq!(result.winner_idx, Some(0));
        assert_eq!(result.ambiguity, 0.0);
    }
}
