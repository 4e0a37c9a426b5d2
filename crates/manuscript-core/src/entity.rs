//! Entity domain types and canonicalization/merge logic
//! (`spec.md` §3 "Entity", §4.6 "Chain Builder and Entity Canonicalization").

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Character,
    Location,
    Organization,
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Importance {
    Minimal,
    Low,
    Medium,
    High,
    MainCritical,
    Principal,
    Secondary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub project_id: Uuid,
    pub canonical_name: String,
    pub aliases: HashSet<String>,
    pub entity_type: EntityType,
    pub importance: Importance,
    pub first_appearance_char: usize,
    pub mention_count: u64,
    pub is_active: bool,
    pub merged_from_ids: Vec<Uuid>,
}

impl Entity {
    pub fn new(project_id: Uuid, canonical_name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            canonical_name: canonical_name.into(),
            aliases: HashSet::new(),
            entity_type,
            importance: Importance::Medium,
            first_appearance_char: 0,
            mention_count: 0,
            is_active: true,
            merged_from_ids: Vec::new(),
        }
    }

    /// Derived relevance score (`spec.md` §4.6 "Relevance"):
    /// `mentions_per_k = mention_count / max(word_count/1000, 1)`,
    /// `relevance = mentions_per_k / (mentions_per_k + 2)`.
    pub fn relevance(&self, document_word_count: u64) -> f64 {
        if self.mention_count == 0 {
            return 0.0;
        }
        let denom = (document_word_count as f64 / 1000.0).max(1.0);
        let mentions_per_k = self.mention_count as f64 / denom;
        mentions_per_k / (mentions_per_k + 2.0)
    }
}

/// Proper-noun candidate scoring weights for canonical-name selection
/// (`spec.md` §4.6: "prefer 2-3 tokens, initial capital, penalize leading
/// articles, longer names up to a cap").
const LEADING_ARTICLES: &[&str] = &["el", "la", "los", "las", "un", "una"];
const CANONICAL_NAME_LENGTH_CAP: usize = 60;

/// Score a proper-noun surface form as a canonical-name candidate. Higher
/// is better.
pub fn canonical_name_score(surface: &str) -> f64 {
    let tokens: Vec<&str> = surface.split_whitespace().collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let mut score = 1.0;

    // Prefer 2-3 tokens.
    score += match tokens.len() {
        2 | 3 => 1.0,
        1 => 0.3,
        _ => -0.5,
    };

    // Initial capital on the first token.
    if tokens[0].chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
        score += 0.5;
    }

    // Penalize a leading article (these indicate a definite-NP mistakenly
    // treated as a proper noun).
    if let Some(first) = tokens.first() {
        if LEADING_ARTICLES.contains(&first.to_lowercase().as_str()) {
            score -= 1.0;
        }
    }

    // Longer names score slightly higher up to a cap, beyond which we stop
    // rewarding length (avoids picking up run-on fragments).
    let len = surface.chars().count().min(CANONICAL_NAME_LENGTH_CAP);
    score += len as f64 * 0.01;

    score
}

/// Pick the best canonical name among a chain's proper-noun surface forms.
pub fn choose_canonical_name(proper_noun_surfaces: &[String]) -> Option<String> {
    proper_noun_surfaces
        .iter()
        .max_by(|a, b| {
            canonical_name_score(a)
                .partial_cmp(&canonical_name_score(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned()
}

/// Record of an atomic merge, append-only so cycles never form
/// (`spec.md` §9 "Cyclic graphs").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeHistoryEntry {
    pub id: Uuid,
    pub project_id: Uuid,
    pub primary_id: Uuid,
    pub source_ids: Vec<Uuid>,
    /// Per-source mention id -> original entity id, so `undo_merge` can
    /// restore exact assignment rather than guessing.
    pub reassigned_mentions: Vec<(Uuid, Uuid)>,
    pub source_snapshots: Vec<Entity>,
    pub combined_aliases: HashSet<String>,
    pub total_mention_delta: u64,
    pub actor: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub undone: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevance_is_zero_for_unmentioned_entity() {
        let e = Entity::new(Uuid::new_v4(), "Ana", EntityType::Character);
        assert_eq!(e.relevance(10_000), 0.0);
    }

    #[test]
    fn relevance_increases_with_mentions() {
        let mut e = Entity::new(Uuid::new_v4(), "Ana", EntityType::Character);
        e.mention_count = 50;
        let low = e.relevance(100_000);
        e.mention_count = 500;
        let high = e.relevance(100_000);
        assert!(high > low);
        assert!(high < 1.0);
    }

    #[test]
    fn canonical_name_prefers_two_to_three_tokens_over_single_or_long() {
        let best = choose_canonical_name(&[
            "María".to_string(),
            "María García".to_string(),
            "María García de la Torre y Mendoza".to_string(),
        ]);
        assert_eq!(best.as_deref(), Some("María García"));
    }

    #[test]
    fn canonical_name_penalizes_leading_article() {
        assert!(canonical_name_score("Juan Pérez") > canonical_name_score("La Casa"));
    }
}
