//! Attribute extraction (`spec.md` §4.8 "Attribute Extractor").
//!
//! Scans the context window around an entity's mentions for lexicon-backed
//! physical/psychological/relational descriptor patterns, the same
//! closed-lexicon approach `manuscript-core::narrator` uses for voice
//! markers — cheap, explainable, and capability-free.

use manuscript_core::attribute::{category_allowed, Attribute, AttributeCategory};
use manuscript_core::entity::EntityType;
use manuscript_core::mention::Mention;
use regex::Regex;
use uuid::Uuid;

struct DescriptorPattern {
    category: AttributeCategory,
    key: &'static str,
    regex_src: &'static str,
}

fn patterns() -> Vec<DescriptorPattern> {
    vec![
        DescriptorPattern {
            category: AttributeCategory::Physical,
            key: "altura",
            regex_src: r"(?i)\b(alt[oa]|baj[oa]|de estatura \w+)\b",
        },
        DescriptorPattern {
            category: AttributeCategory::Physical,
            key: "cabello",
            regex_src: r"(?i)\bcabello (\w+)\b",
        },
        DescriptorPattern {
            category: AttributeCategory::Physical,
            key: "ojos",
            regex_src: r"(?i)\bojos (\w+)\b",
        },
        DescriptorPattern {
            category: AttributeCategory::Psychological,
            key: "temperamento",
            regex_src: r"(?i)\b(tímid[oa]|valient[e]|orgullos[oa]|generos[oa]|ansios[oa]|melancólic[oa])\b",
        },
        DescriptorPattern {
            category: AttributeCategory::Relational,
            key: "parentesco",
            regex_src: r"(?i)\b(madre|padre|hij[oa]|herman[oa]|espos[oa]|novi[oa])\s+de\b",
        },
    ]
}

/// Extract attributes for one entity from the context windows of its
/// mentions. Only categories `category_allowed` for `entity_type` are
/// emitted; everything else is silently skipped rather than rejected loudly,
/// since a location incidentally sitting next to a psychological-sounding
/// word is expected noise, not an error.
pub fn extract_attributes(entity_id: Uuid, entity_type: EntityType, mentions: &[&Mention]) -> Vec<Attribute> {
    let compiled: Vec<(Regex, DescriptorPattern)> = patterns()
        .into_iter()
        .map(|p| (Regex::new(p.regex_src).expect("static pattern is valid regex"), p))
        .collect();

    let mut attributes = Vec::new();
    for mention in mentions {
        let window = format!("{} {}", mention.context_before, mention.context_after);
        for (re, pattern) in &compiled {
            if !category_allowed(entity_type, pattern.category) {
                continue;
            }
            if let Some(m) = re.find(&window) {
                attributes.push(Attribute::new(entity_id, pattern.category, pattern.key, m.as_str().trim(), 0.55));
            }
        }
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_core::mention::{MentionSource, MentionType, SentenceIdxBasis};

    fn mention_with_context(before: &str, after: &str) -> Mention {
        let mut m = Mention::new("Ana", 100, 103, MentionType::ProperNoun, 0, SentenceIdxBasis::Dense, MentionSource::MorphAnalyzer);
        m.context_before = before.to_string();
        m.context_after = after.to_string();
        m
    }

    #[test]
    fn detects_physical_hair_descriptor() {
        let m = mention_with_context("Tenía el cabello negro y", "sonreía siempre");
        let attrs = extract_attributes(Uuid::new_v4(), EntityType::Character, &[&m]);
        assert!(attrs.iter().any(|a| a.key == "cabello"));
    }

    #[test]
    fn location_does_not_receive_psychological_attributes() {
        let m = mention_with_context("era un lugar tímido y", "extraño");
        let attrs = extract_attributes(Uuid::new_v4(), EntityType::Location, &[&m]);
        assert!(attrs.iter().all(|a| a.category != AttributeCategory::Psychological));
    }
}
