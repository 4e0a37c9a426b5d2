//! Paragraph-level text diffing (`spec.md` §4.11 "Content Diff"), used by
//! the comparison pass to decide whether an alert's underlying text moved,
//! changed, or disappeared between two analysis runs.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Equal,
    Replace,
    Delete,
    Insert,
}

#[derive(Debug, Clone, Copy)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }

    pub fn overlaps(&self, other: &TextRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One diff opcode between the old and new paragraph sequences, expressed
/// as half-open index ranges into each sequence (mirrors
/// `difflib.SequenceMatcher.get_opcodes`).
#[derive(Debug, Clone)]
pub struct DiffOp {
    pub kind: OpKind,
    pub old_range: TextRange,
    pub new_range: TextRange,
}

/// A chapter-level diff: opcodes over paragraphs plus the derived character
/// ranges in the new text that were removed or modified.
#[derive(Debug, Clone)]
pub struct ChapterDiff {
    pub ops: Vec<DiffOp>,
    pub removed_char_ranges: Vec<TextRange>,
    pub modified_char_ranges: Vec<TextRange>,
}

fn split_paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n").collect()
}

/// Longest common subsequence of paragraphs, via dynamic programming, then
/// walked to recover opcodes. Paragraph-level (rather than line- or
/// character-level) diffing keeps this cheap on full manuscripts and
/// matches how the original alert content was chunked.
pub fn diff_chapter_texts(old_text: &str, new_text: &str) -> ChapterDiff {
    let old_paras = split_paragraphs(old_text);
    let new_paras = split_paragraphs(new_text);

    let ops = lcs_opcodes(&old_paras, &new_paras);

    let mut removed_char_ranges = Vec::new();
    let mut modified_char_ranges = Vec::new();

    let new_offsets = paragraph_char_offsets(new_text, &new_paras);

    for op in &ops {
        match op.kind {
            OpKind::Delete => {
                // A pure deletion has no footprint in the new text; record
                // its anchor as a zero-width range at the insertion point
                // so callers can still test proximity.
                if op.new_range.start < new_offsets.len() {
                    let anchor = new_offsets[op.new_range.start].0;
                    removed_char_ranges.push(TextRange { start: anchor, end: anchor });
                } else if let Some(last) = new_offsets.last() {
                    removed_char_ranges.push(TextRange { start: last.1, end: last.1 });
                }
            }
            OpKind::Replace => {
                if let (Some(first), Some(last)) = (
                    new_offsets.get(op.new_range.start),
                    new_offsets.get(op.new_range.end.saturating_sub(1)),
                ) {
                    modified_char_ranges.push(TextRange { start: first.0, end: last.1 });
                }
            }
            OpKind::Insert | OpKind::Equal => {}
        }
    }

    ChapterDiff { ops, removed_char_ranges, modified_char_ranges }
}

fn paragraph_char_offsets(text: &str, paragraphs: &[&str]) -> Vec<(usize, usize)> {
    let mut offsets = Vec::with_capacity(paragraphs.len());
    let mut cursor = 0usize;
    for para in paragraphs {
        let start = text[cursor..].find(para).map(|o| cursor + o).unwrap_or(cursor);
        let end = start + para.len();
        offsets.push((start, end));
        cursor = end;
    }
    offsets
}

fn lcs_opcodes(old: &[&str], new: &[&str]) -> Vec<DiffOp> {
    let n = old.len();
    let m = new.len();
    let mut dp = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if old[i] == new[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    let (mut del_start, mut ins_start) = (0usize, 0usize);

    macro_rules! flush {
        () => {
            if del_start < i || ins_start < j {
                let kind = if del_start < i && ins_start < j {
                    OpKind::Replace
                } else if del_start < i {
                    OpKind::Delete
                } else {
                    OpKind::Insert
                };
                ops.push(DiffOp {
                    kind,
                    old_range: TextRange { start: del_start, end: i },
                    new_range: TextRange { start: ins_start, end: j },
                });
            }
        };
    }

    while i < n && j < m {
        if old[i] == new[j] {
            flush!();
            ops.push(DiffOp {
                kind: OpKind::Equal,
                old_range: TextRange { start: i, end: i + 1 },
                new_range: TextRange { start: j, end: j + 1 },
            });
            i += 1;
            j += 1;
            del_start = i;
            ins_start = j;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    i = n;
    j = m;
    flush!();

    ops
}

/// An alert's anchor overlapping a removed range counts only on strict
/// containment — the content it was anchored to is actually gone, not just
/// nearby (`spec.md` §4.10).
pub fn is_position_in_removed_range(ranges: &[TextRange], pos: usize) -> bool {
    ranges.iter().any(|r| r.contains(pos))
}

/// An alert's anchor near a modified area counts within `proximity`
/// characters of the area's bounds — surrounding-paragraph edits can shift
/// an anchor's exact offset without the content it refers to having moved
/// (`spec.md` §4.10).
pub fn is_position_in_modified_area(ranges: &[TextRange], pos: usize, proximity: usize) -> bool {
    ranges.iter().any(|r| r.contains(pos) || pos.abs_diff(r.start) <= proximity || pos.abs_diff(r.end) <= proximity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_only_equal_ops() {
        let diff = diff_chapter_texts("Uno.\n\nDos.", "Uno.\n\nDos.");
        assert!(diff.ops.iter().all(|op| op.kind == OpKind::Equal));
        assert!(diff.removed_char_ranges.is_empty());
        assert!(diff.modified_char_ranges.is_empty());
    }

    #[test]
    fn removed_paragraph_is_tracked() {
        let diff = diff_chapter_texts("Uno.\n\nDos.\n\nTres.", "Uno.\n\nTres.");
        assert!(!diff.removed_char_ranges.is_empty());
    }

    #[test]
    fn replaced_paragraph_is_a_modified_range() {
        let diff = diff_chapter_texts("Uno.\n\nDos.", "Uno.\n\nDos cambiado.");
        assert!(!diff.modified_char_ranges.is_empty());
    }

    #[test]
    fn modified_area_containment_check() {
        let ranges = vec![TextRange { start: 10, end: 20 }];
        assert!(is_position_in_modified_area(&ranges, 15, 0));
        assert!(!is_position_in_modified_area(&ranges, 100, 0));
    }

    #[test]
    fn modified_area_allows_a_proximity_margin() {
        let ranges = vec![TextRange { start: 10, end: 20 }];
        assert!(is_position_in_modified_area(&ranges, 25, 10));
        assert!(!is_position_in_modified_area(&ranges, 25, 2));
    }

    #[test]
    fn removed_range_requires_strict_containment() {
        let ranges = vec![TextRange { start: 10, end: 20 }];
        assert!(is_position_in_removed_range(&ranges, 15));
        assert!(!is_position_in_removed_range(&ranges, 21));
    }
}
