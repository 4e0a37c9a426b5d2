//! Mention domain types (`spec.md` §3 "Mention", §4.2 "Mention Extractor").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Grammatical gender, inferred per mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Masculine,
    Feminine,
    Neutral,
    Unknown,
}

/// Grammatical number, inferred per mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Number {
    Singular,
    Plural,
    Unknown,
}

/// Closed set of mention types (`spec.md` §9 "Dynamic dispatch → tagged
/// variants").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MentionType {
    ProperNoun,
    DefiniteNp,
    Pronoun,
    Demonstrative,
    Possessive,
    ZeroProDrop,
}

/// Which extraction backend produced `sentence_idx`: the two bases are not
/// comparable (`spec.md` §9 Open Questions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentenceIdxBasis {
    /// 0-based dense sentence index, one increment per detected sentence.
    Dense,
    /// The morphological analyzer failed to segment sentences; this is a
    /// raw token index instead.
    TokenFallback,
}

/// Which component produced a mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MentionSource {
    MorphAnalyzer,
    PronounLexicon,
    DemonstrativeLexicon,
    PossessiveLexicon,
    DefiniteNpLexicon,
    ZeroProDropDetector,
    NarratorBinding,
    UserCorrection,
}

/// A single textual occurrence (`spec.md` §3 "Mention").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    pub id: Uuid,
    pub surface_form: String,
    pub start_char: usize,
    pub end_char: usize,
    pub chapter_id: Option<Uuid>,
    pub mention_type: MentionType,
    pub gender: Gender,
    pub number: Number,
    pub sentence_idx: usize,
    pub sentence_idx_basis: SentenceIdxBasis,
    pub context_before: String,
    pub context_after: String,
    pub source: MentionSource,
    pub confidence: f64,
    /// Free-form metadata, including (for voting-derived mentions) the
    /// `method_votes` wire structure documented in `spec.md` §6.
    pub metadata: HashMap<String, serde_json::Value>,
}

pub const CONTEXT_WINDOW: usize = 50;

impl Mention {
    pub fn new(
        surface_form: impl Into<String>,
        start_char: usize,
        end_char: usize,
        mention_type: MentionType,
        sentence_idx: usize,
        sentence_idx_basis: SentenceIdxBasis,
        source: MentionSource,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            surface_form: surface_form.into(),
            start_char,
            end_char,
            chapter_id: None,
            mention_type,
            gender: Gender::Unknown,
            number: Number::Unknown,
            sentence_idx,
            sentence_idx_basis,
            context_before: String::new(),
            context_after: String::new(),
            source,
            confidence: 1.0,
            metadata: HashMap::new(),
        }
    }

    /// Fill `context_before`/`context_after` from the full document text
    /// using the standard ~50 char window (`spec.md` §3).
    pub fn fill_context(&mut self, text: &str) {
        let before_start = self.start_char.saturating_sub(CONTEXT_WINDOW);
        let after_end = (self.end_char + CONTEXT_WINDOW).min(text.len());
        self.context_before = safe_slice(text, before_start, self.start_char);
        self.context_after = safe_slice(text, self.end_char, after_end);
    }

    pub fn is_anaphoric(&self) -> bool {
        matches!(
            self.mention_type,
            MentionType::Pronoun
                | MentionType::Demonstrative
                | MentionType::Possessive
                | MentionType::ZeroProDrop
                | MentionType::DefiniteNp
        )
    }

    pub fn is_proper_noun(&self) -> bool {
        self.mention_type == MentionType::ProperNoun
    }
}

/// Slice a string on character boundaries even when the byte offsets given
/// don't land on one (defensive against analyzer offset drift).
fn safe_slice(text: &str, start: usize, end: usize) -> String {
    let start = start.min(text.len());
    let end = end.min(text.len());
    if start >= end {
        return String::new();
    }
    let mut s = start;
    while s < text.len() && !text.is_char_boundary(s) {
        s += 1;
    }
    let mut e = end;
    while e < text.len() && !text.is_char_boundary(e) {
        e += 1;
    }
    text.get(s..e).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_context_windows_around_mention() {
        let text = "María entró al cuarto despacio. Salió cansada poco después de eso.";
        let mut m = Mention::new(
            "María",
            0,
            5,
            MentionType::ProperNoun,
            0,
            SentenceIdxBasis::Dense,
            MentionSource::MorphAnalyzer,
        );
        m.fill_context(text);
        assert_eq!(m.context_before, "");
        assert!(m.context_after.starts_with(" entr"));
    }
}
