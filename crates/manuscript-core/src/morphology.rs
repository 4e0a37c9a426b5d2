//! Morphological analysis capability (`spec.md` §7 "Morphological
//! analyzer"). `manuscript-core` consumes this trait rather than a
//! concrete NLP library so the pipeline can run with the analyzer degraded
//! (falling back to lexicon-based heuristics) without the domain logic
//! knowing the difference.

use crate::mention::{Gender, Number};

/// A single analyzed token, as a capability implementation would emit it
/// for one whitespace/punctuation-delimited unit of text.
#[derive(Debug, Clone)]
pub struct Token {
    pub text: String,
    pub start_char: usize,
    pub end_char: usize,
    pub lemma: String,
    pub pos: PartOfSpeech,
    pub gender: Gender,
    pub number: Number,
    /// Grammatical person, meaningful only on `Verb` tokens — gates
    /// zero/pro-drop detection to 3rd person (`spec.md` §4.2).
    pub person: Person,
    /// True when this token heads a sentence boundary immediately after it.
    pub sentence_end: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Person {
    First,
    Second,
    Third,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartOfSpeech {
    ProperNoun,
    CommonNoun,
    Pronoun,
    Determiner,
    Verb,
    Adjective,
    Other,
}

/// Capability interface for morphological annotation of a chapter's text.
pub trait MorphAnnotator {
    /// Returns `None` when the analyzer is unavailable (model not loaded);
    /// callers fall back to lexicon-only extraction in that case.
    fn annotate(&self, text: &str) -> Option<Vec<Token>>;
}

/// Trivial analyzer used when no real capability is registered: splits on
/// whitespace, never assigns POS/gender/number, and treats `.`/`!`/`?` as
/// sentence terminators. This keeps `sentence_idx` populated (with
/// `SentenceIdxBasis::TokenFallback`) even with zero NLP infrastructure.
pub struct FallbackTokenizer;

impl MorphAnnotator for FallbackTokenizer {
    fn annotate(&self, text: &str) -> Option<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut char_idx = 0usize;
        for word in text.split_whitespace() {
            let start = match text[char_idx..].find(word) {
                Some(offset) => char_idx + offset,
                None => char_idx,
            };
            let end = start + word.len();
            char_idx = end;
            let sentence_end = word.ends_with(['.', '!', '?']);
            tokens.push(Token {
                text: word.to_string(),
                start_char: start,
                end_char: end,
                lemma: word.to_lowercase(),
                pos: PartOfSpeech::Other,
                gender: Gender::Unknown,
                number: Number::Unknown,
                person: Person::Unknown,
                sentence_end,
            });
        }
        Some(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_tokenizer_marks_sentence_ends() {
        let tokens = FallbackTokenizer.annotate("Ella corrió. El se quedó.").unwrap();
        assert!(tokens.iter().any(|t| t.sentence_end && t.text == "corrió."));
    }
}
