//! Mention extraction (`spec.md` §4.2 "Mention Extractor").
//!
//! Turns morphologically annotated tokens into the closed set of mention
//! types: proper nouns and definite NPs come straight from POS tags;
//! pronouns, demonstratives and possessives come from closed lexicons
//! (so detection doesn't depend on POS tagging quality); zero pro-drop
//! subjects are detected from finite verbs with no preceding overt
//! subject in the same clause.

use crate::mention::{Mention, MentionSource, MentionType, SentenceIdxBasis};
use crate::morphology::{MorphAnnotator, PartOfSpeech, Person, Token};

const PRONOUNS: &[&str] = &[
    "yo", "tú", "vos", "usted", "él", "ella", "nosotros", "nosotras", "vosotros", "vosotras", "ustedes", "ellos",
    "ellas", "me", "te", "lo", "la", "le", "nos", "os", "los", "las", "les", "se", "mí", "ti", "sí",
];
const DEMONSTRATIVES: &[&str] = &["este", "esta", "esto", "estos", "estas", "ese", "esa", "eso", "esos", "esas", "aquel", "aquella", "aquello"];
const POSSESSIVES: &[&str] = &["mi", "mis", "tu", "tus", "su", "sus", "nuestro", "nuestra", "nuestros", "nuestras"];

/// Finite-verb endings used to spot a likely zero pro-drop clause start: a
/// 3rd-person conjugated verb whose immediately preceding token (within the
/// same sentence) is not a pronoun, proper noun, or definite NP. 1st/2nd
/// person zeros are excluded (`spec.md` §4.2: "not useful for narrative
/// coreference").
fn looks_finite_verb(token: &Token) -> bool {
    token.pos == PartOfSpeech::Verb && token.person == Person::Third
}

pub struct ExtractionResult {
    pub mentions: Vec<Mention>,
    pub sentence_idx_basis: SentenceIdxBasis,
}

/// Extract all mention types from one chapter's text using whichever
/// morphological capability is passed in (possibly the degraded
/// fallback tokenizer).
pub fn extract_mentions(text: &str, annotator: &dyn MorphAnnotator) -> ExtractionResult {
    let (tokens, basis) = match annotator.annotate(text) {
        Some(t) => (t, SentenceIdxBasis::Dense),
        None => (crate::morphology::FallbackTokenizer.annotate(text).unwrap_or_default(), SentenceIdxBasis::TokenFallback),
    };

    let mut mentions = Vec::new();
    let mut sentence_idx = 0usize;
    let mut prev_was_overt_subject_candidate = false;

    for (i, token) in tokens.iter().enumerate() {
        let lower = token.text.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();

        let mention_type = if token.pos == PartOfSpeech::ProperNoun {
            Some(MentionType::ProperNoun)
        } else if PRONOUNS.contains(&lower.as_str()) {
            Some(MentionType::Pronoun)
        } else if DEMONSTRATIVES.contains(&lower.as_str()) {
            Some(MentionType::Demonstrative)
        } else if POSSESSIVES.contains(&lower.as_str()) {
            Some(MentionType::Possessive)
        } else if token.pos == PartOfSpeech::Determiner && is_definite_article(&lower) {
            // Definite article heading a noun phrase: absorb the following
            // common-noun run into one DefiniteNp mention.
            if let Some(np_end_idx) = find_np_end(&tokens, i) {
                let np = &tokens[i..=np_end_idx];
                let start = np.first().unwrap().start_char;
                let end = np.last().unwrap().end_char;
                let surface: String = np.iter().map(|t| t.text.as_str()).collect::<Vec<_>>().join(" ");
                let mut mention = Mention::new(
                    surface,
                    start,
                    end,
                    MentionType::DefiniteNp,
                    sentence_idx,
                    basis,
                    MentionSource::DefiniteNpLexicon,
                );
                mention.gender = np.last().unwrap().gender;
                mention.number = np.last().unwrap().number;
                mentions.push(mention);
            }
            if token.sentence_end {
                sentence_idx += 1;
            }
            prev_was_overt_subject_candidate = false;
            continue;
        } else if looks_finite_verb(token) && !prev_was_overt_subject_candidate {
            let mut mention = Mention::new(
                "",
                token.start_char,
                token.start_char,
                MentionType::ZeroProDrop,
                sentence_idx,
                basis,
                MentionSource::ZeroProDropDetector,
            );
            mention.confidence = 0.6;
            mentions.push(mention);
            if token.sentence_end {
                sentence_idx += 1;
            }
            prev_was_overt_subject_candidate = false;
            continue;
        } else {
            None
        };

        if let Some(mention_type) = mention_type {
            let source = match mention_type {
                MentionType::ProperNoun => MentionSource::MorphAnalyzer,
                MentionType::Pronoun => MentionSource::PronounLexicon,
                MentionType::Demonstrative => MentionSource::DemonstrativeLexicon,
                MentionType::Possessive => MentionSource::PossessiveLexicon,
                _ => MentionSource::MorphAnalyzer,
            };
            let mut mention = Mention::new(
                token.text.clone(),
                token.start_char,
                token.end_char,
                mention_type,
                sentence_idx,
                basis,
                source,
            );
            mention.gender = token.gender;
            mention.number = token.number;
            mentions.push(mention);
            prev_was_overt_subject_candidate = true;
        } else if token.pos != PartOfSpeech::Other {
            prev_was_overt_subject_candidate = false;
        }

        if token.sentence_end {
            sentence_idx += 1;
        }
    }

    for mention in &mut mentions {
        mention.fill_context(text);
    }

    ExtractionResult { mentions, sentence_idx_basis: basis }
}

fn is_definite_article(lower: &str) -> bool {
    matches!(lower, "el" | "la" | "los" | "las")
}

/// Absorb consecutive adjective/common-noun tokens following a definite
/// article into the same NP, stopping at the first token that isn't a
/// plausible NP continuation.
fn find_np_end(tokens: &[Token], article_idx: usize) -> Option<usize> {
    let mut end = None;
    for (offset, token) in tokens.iter().enumerate().skip(article_idx + 1) {
        match token.pos {
            PartOfSpeech::CommonNoun | PartOfSpeech::Adjective => end = Some(offset),
            _ => break,
        }
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::FallbackTokenizer;

    struct UnavailableAnnotator;
    impl MorphAnnotator for UnavailableAnnotator {
        fn annotate(&self, _text: &str) -> Option<Vec<Token>> {
            None
        }
    }

    #[test]
    fn unavailable_analyzer_falls_back_to_token_basis() {
        let result = extract_mentions("Ella camina despacio por la calle.", &UnavailableAnnotator);
        assert_eq!(result.sentence_idx_basis, SentenceIdxBasis::TokenFallback);
    }

    #[test]
    fn pronoun_lexicon_detects_ella() {
        let result = extract_mentions("Ella camina despacio.", &FallbackTokenizer);
        assert!(result.mentions.iter().any(|m| m.mention_type == MentionType::Pronoun && m.surface_form.to_lowercase() == "ella"));
    }
}
