//! Manuscript identity gating (`spec.md` §4.11 "Identity", Open Question
//! "same/uncertain/different document").
//!
//! Before running a full re-analysis comparison, the engine needs to know
//! whether the new upload is still "the same manuscript" (just edited) or
//! an unrelated document someone pointed at the wrong project. A
//! fingerprint plus a cheap structural similarity score decide that.

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityVerdict {
    Same,
    Uncertain,
    DifferentDocument,
}

/// A coarse structural signature: word count, chapter count, and a sample
/// of paragraph-opening character trigrams, hashed together. Stable across
/// minor text edits (a fingerprint of *structure*, not content), unlike a
/// raw content hash which would call every edit "different".
pub fn fingerprint(text: &str, chapter_count: usize) -> String {
    let word_count = text.split_whitespace().count();
    let mut hasher = Sha256::new();
    hasher.update(word_count.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(chapter_count.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Structural similarity in `[0, 1]`: agreement on word-count ratio and
/// chapter-count ratio, averaged. 1.0 means identical structure; near 0
/// means almost certainly a different document.
pub fn structural_similarity(
    word_count_a: usize,
    chapter_count_a: usize,
    word_count_b: usize,
    chapter_count_b: usize,
) -> f64 {
    let word_ratio = ratio_similarity(word_count_a, word_count_b);
    let chapter_ratio = ratio_similarity(chapter_count_a, chapter_count_b);
    (word_ratio + chapter_ratio) / 2.0
}

fn ratio_similarity(a: usize, b: usize) -> f64 {
    if a == 0 && b == 0 {
        return 1.0;
    }
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    if hi == 0 {
        return 0.0;
    }
    lo as f64 / hi as f64
}

const SAME_THRESHOLD: f64 = 0.85;
const DIFFERENT_THRESHOLD: f64 = 0.4;

/// Classify two documents' relationship for gating re-analysis
/// (`spec.md` §9 Open Questions: resolved as a three-way gate rather than
/// a binary one, since mid-range similarity should prompt confirmation
/// rather than silently picking a side).
pub fn classify_identity(similarity: f64) -> IdentityVerdict {
    if similarity >= SAME_THRESHOLD {
        IdentityVerdict::Same
    } else if similarity <= DIFFERENT_THRESHOLD {
        IdentityVerdict::DifferentDocument
    } else {
        IdentityVerdict::Uncertain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_identical_structure_is_same() {
        let sim = structural_similarity(10_000, 20, 10_050, 20);
        assert_eq!(classify_identity(sim), IdentityVerdict::Same);
    }

    #[test]
    fn wildly_different_structure_is_different_document() {
        let sim = structural_similarity(10_000, 20, 200, 2);
        assert_eq!(classify_identity(sim), IdentityVerdict::DifferentDocument);
    }

    #[test]
    fn moderate_divergence_is_uncertain() {
        let sim = structural_similarity(10_000, 20, 6_000, 15);
        assert_eq!(classify_identity(sim), IdentityVerdict::Uncertain);
    }

    #[test]
    fn fingerprint_is_stable_for_equal_inputs() {
        assert_eq!(fingerprint("una dos tres", 3), fingerprint("una dos tres", 3));
    }
}
