//! Coreference pipeline stage: extracts mentions, restricts each anaphor's
//! antecedent search to the admissible window, runs every scoring method
//! that can run, and lets the weighted voter decide a winner. This is the
//! orchestration glue around the pure pieces in `manuscript_core` — nothing
//! here is itself an algorithm, it is the composition order.

use manuscript_core::candidate_filter::admissible_candidates;
use manuscript_core::chain::{build_chains, CoreferenceChain, ResolvedLink};
use manuscript_core::mention::{Mention, MentionType};
use manuscript_core::mention_extractor::{extract_mentions, ExtractionResult};
use manuscript_core::morphology::MorphAnnotator;
use manuscript_core::scoring::{
    score_embeddings, score_heuristics, score_llm, score_morphology, score_pro_drop_saliency, EmbeddingSimilarity,
    LlmCorefAssistant, Method,
};
use manuscript_core::voter::{vote, MethodContribution, VoteResult};
use manuscript_types::VotingSettings;
use serde_json::json;
use std::collections::HashMap;

/// Optional heavy capabilities for one resolution run. Any field left
/// `None` degrades gracefully: the voter renormalizes over whatever ran
/// (`spec.md` §7 "Degraded capability").
pub struct ResolutionCapabilities<'a> {
    pub embeddings: Option<&'a dyn EmbeddingSimilarity>,
    pub llm: Option<&'a dyn LlmCorefAssistant>,
}

impl<'a> ResolutionCapabilities<'a> {
    pub fn none() -> Self {
        Self { embeddings: None, llm: None }
    }
}

pub struct ChapterResolution {
    pub mentions: Vec<Mention>,
    pub chains: Vec<CoreferenceChain>,
}

/// Run extraction, candidate filtering, scoring, and voting for a single
/// chapter's text, returning mentions (now carrying `method_votes` metadata
/// for anaphoric ones) plus the resulting coreference chains.
pub async fn resolve_chapter(
    text: &str,
    annotator: &dyn MorphAnnotator,
    settings: &VotingSettings,
    capabilities: &ResolutionCapabilities<'_>,
) -> ChapterResolution {
    let ExtractionResult { mut mentions, .. } = extract_mentions(text, annotator);
    for mention in &mut mentions {
        mention.fill_context(text);
    }

    let mut links = Vec::new();

    // How often each named/definite candidate surface form already appears
    // in this chapter, standing in for "mentions per entity" ahead of
    // entity assignment — feeds pro-drop saliency scoring below.
    let mut mention_frequency: HashMap<String, usize> = HashMap::new();
    for mention in &mentions {
        if matches!(mention.mention_type, MentionType::ProperNoun | MentionType::DefiniteNp) {
            *mention_frequency.entry(mention.surface_form.to_lowercase()).or_insert(0) += 1;
        }
    }

    for anaphor_idx in 0..mentions.len() {
        if !mentions[anaphor_idx].is_anaphoric() {
            continue;
        }
        let candidate_indices = admissible_candidates(&mentions, anaphor_idx, settings);
        if candidate_indices.is_empty() {
            continue;
        }

        let anaphor = mentions[anaphor_idx].clone();
        let candidate_refs: Vec<&Mention> = candidate_indices.iter().map(|&i| &mentions[i]).collect();

        let mut contributions = vec![
            MethodContribution {
                method: Method::Morphology,
                scores: score_morphology(&anaphor, &candidate_refs),
            },
            MethodContribution {
                method: Method::Heuristics,
                scores: score_heuristics(&anaphor, &candidate_refs),
            },
        ];

        if let Some(provider) = capabilities.embeddings {
            let scores = score_embeddings(&anaphor, &candidate_refs, provider).await;
            if !scores.is_empty() {
                contributions.push(MethodContribution { method: Method::Embeddings, scores });
            }
        }

        if let Some(assistant) = capabilities.llm {
            let surrounding = format!("{}{}{}", anaphor.context_before, anaphor.surface_form, anaphor.context_after);
            let scores = score_llm(&anaphor, &candidate_refs, &surrounding, assistant).await;
            if !scores.is_empty() {
                contributions.push(MethodContribution { method: Method::Llm, scores });
            }
        }

        if anaphor.mention_type == MentionType::ZeroProDrop {
            let scores = score_pro_drop_saliency(&anaphor, &candidate_refs, &mention_frequency);
            if !scores.is_empty() {
                contributions.push(MethodContribution { method: Method::ProDropSaliency, scores });
            }
        }

        let result = vote(&contributions, candidate_indices.len(), &settings.method_weights);
        attach_vote_metadata(&mut mentions[anaphor_idx], &result);

        if let Some(winner) = result.winner_idx {
            let antecedent_idx = candidate_indices[winner];
            links.push(ResolvedLink {
                mention_idx: anaphor_idx,
                antecedent_idx,
                ambiguity: result.ambiguity,
            });
        }
    }

    let chains = build_chains(mentions.len(), &links);
    ChapterResolution { mentions, chains }
}

/// Serialize a `VoteResult` into the `method_votes` wire structure
/// documented in `spec.md` §6 and attach it to the anaphor's metadata.
fn attach_vote_metadata(anaphor: &mut Mention, result: &VoteResult) {
    let mut method_votes: HashMap<String, serde_json::Value> = HashMap::new();
    for detail in &result.votes {
        method_votes.insert(
            detail.method.clone(),
            json!({
                "score": detail.score,
                "reasoning": detail.reasoning,
                "weight": detail.weight,
                "weighted_score": detail.score * detail.weight,
            }),
        );
    }
    method_votes.insert(
        "_ambiguity".to_string(),
        json!({ "score": result.ambiguity, "reasoning": "1 - (best - second) / best" }),
    );
    anaphor
        .metadata
        .insert("method_votes".to_string(), serde_json::Value::Object(method_votes.into_iter().collect()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_core::mention::{Gender, Number};
    use manuscript_core::morphology::{FallbackTokenizer, PartOfSpeech, Token};

    /// `FallbackTokenizer` never assigns part-of-speech tags, so it alone
    /// can't produce a `ProperNoun` mention to resolve against; this test
    /// annotator layers a minimal proper-noun tag onto its tokenization so
    /// the full candidate-filter/scoring/voting chain has something to do.
    struct ProperNounAnnotator;
    impl MorphAnnotator for ProperNounAnnotator {
        fn annotate(&self, text: &str) -> Option<Vec<Token>> {
            let mut tokens = FallbackTokenizer.annotate(text)?;
            for token in &mut tokens {
                let lower = token.text.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
                if lower == "maria" {
                    token.pos = PartOfSpeech::ProperNoun;
                    token.gender = Gender::Feminine;
                    token.number = Number::Singular;
                }
            }
            Some(tokens)
        }
    }

    #[tokio::test]
    async fn resolves_a_pronoun_to_its_proper_noun_antecedent() {
        let text = "Maria llego temprano. Ella saludo a todos.";
        let settings = VotingSettings::default();
        let resolution =
            resolve_chapter(text, &ProperNounAnnotator, &settings, &ResolutionCapabilities::none()).await;
        let pronoun = resolution
            .mentions
            .iter()
            .find(|m| m.surface_form.eq_ignore_ascii_case("ella"))
            .expect("pronoun mention should be extracted");
        assert!(pronoun.metadata.contains_key("method_votes"));
    }
}
