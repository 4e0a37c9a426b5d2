//! Entity attributes (`spec.md` §3 "Attribute", §4.8 "Attribute Extractor").

use crate::entity::EntityType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeCategory {
    Physical,
    Psychological,
    Relational,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub category: AttributeCategory,
    pub key: String,
    pub value: String,
    pub confidence: f64,
    pub verified: bool,
    pub first_mention_chapter: Option<Uuid>,
}

/// Category gating per entity type (`spec.md` §3 invariant: "category must
/// be allowed for the entity type"). Locations/organizations/objects do
/// not have psychology; only characters do.
pub fn category_allowed(entity_type: EntityType, category: AttributeCategory) -> bool {
    match entity_type {
        EntityType::Character => true,
        EntityType::Location | EntityType::Organization | EntityType::Object => {
            matches!(category, AttributeCategory::Physical | AttributeCategory::Other)
        }
    }
}

impl Attribute {
    pub fn new(
        entity_id: Uuid,
        category: AttributeCategory,
        key: impl Into<String>,
        value: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id,
            category,
            key: key.into(),
            value: value.into(),
            confidence,
            verified: false,
            first_mention_chapter: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psychological_attributes_rejected_for_locations() {
        assert!(!category_allowed(
            EntityType::Location,
            AttributeCategory::Psychological
        ));
        assert!(category_allowed(
            EntityType::Character,
            AttributeCategory::Psychological
        ));
    }
}
