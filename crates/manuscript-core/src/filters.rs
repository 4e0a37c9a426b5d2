//! Entity filtering precedence (`spec.md` §4.6 "Filters").
//!
//! Three layers apply in order of increasing specificity: a system pattern
//! (built-in denylist, e.g. common nouns mistaken for names) can flag a
//! surface form as probably-not-an-entity; a project-level rejection
//! overrides that for the whole project; and a single override on one
//! specific occurrence overrides both.

use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    Accept,
    Reject,
}

/// A built-in pattern the system itself flags as a likely false positive
/// (`spec.md` §4.6: common nouns capitalized at a sentence start).
#[derive(Debug, Clone)]
pub struct SystemPattern {
    pub surface_lower: String,
}

/// A project-level decision that a given normalized surface form is never
/// a real entity in this manuscript.
#[derive(Debug, Clone)]
pub struct RejectedEntity {
    pub project_id: Uuid,
    pub surface_lower: String,
}

/// A one-off correction on a single mention occurrence, taking precedence
/// over both of the above.
#[derive(Debug, Clone)]
pub struct FilterOverride {
    pub mention_id: Uuid,
    pub verdict: FilterVerdict,
}

pub struct FilterContext<'a> {
    pub system_patterns: &'a [SystemPattern],
    pub rejected_entities: &'a HashSet<String>,
    pub overrides: &'a std::collections::HashMap<Uuid, FilterVerdict>,
}

/// Resolve the effective verdict for a specific mention, applying
/// overrides first, then project-level rejections, then system patterns,
/// defaulting to accept when nothing says otherwise.
pub fn resolve_verdict(ctx: &FilterContext, mention_id: Uuid, surface_form: &str) -> FilterVerdict {
    if let Some(verdict) = ctx.overrides.get(&mention_id) {
        return *verdict;
    }

    let normalized = surface_form.to_lowercase();
    if ctx.rejected_entities.contains(&normalized) {
        return FilterVerdict::Reject;
    }

    if ctx.system_patterns.iter().any(|p| p.surface_lower == normalized) {
        return FilterVerdict::Reject;
    }

    FilterVerdict::Accept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_beats_project_rejection() {
        let mention_id = Uuid::new_v4();
        let mut overrides = std::collections::HashMap::new();
        overrides.insert(mention_id, FilterVerdict::Accept);
        let rejected: HashSet<String> = ["juan".to_string()].into_iter().collect();
        let ctx = FilterContext {
            system_patterns: &[],
            rejected_entities: &rejected,
            overrides: &overrides,
        };
        assert_eq!(resolve_verdict(&ctx, mention_id, "Juan"), FilterVerdict::Accept);
    }

    #[test]
    fn project_rejection_beats_system_pattern_silence() {
        let rejected: HashSet<String> = ["casa".to_string()].into_iter().collect();
        let ctx = FilterContext {
            system_patterns: &[],
            rejected_entities: &rejected,
            overrides: &std::collections::HashMap::new(),
        };
        assert_eq!(resolve_verdict(&ctx, Uuid::new_v4(), "Casa"), FilterVerdict::Reject);
    }

    #[test]
    fn system_pattern_rejects_when_nothing_else_applies() {
        let patterns = vec![SystemPattern { surface_lower: "señor".to_string() }];
        let ctx = FilterContext {
            system_patterns: &patterns,
            rejected_entities: &HashSet::new(),
            overrides: &std::collections::HashMap::new(),
        };
        assert_eq!(resolve_verdict(&ctx, Uuid::new_v4(), "Señor"), FilterVerdict::Reject);
    }

    #[test]
    fn unflagged_surface_form_is_accepted() {
        let ctx = FilterContext {
            system_patterns: &[],
            rejected_entities: &HashSet::new(),
            overrides: &std::collections::HashMap::new(),
        };
        assert_eq!(resolve_verdict(&ctx, Uuid::new_v4(), "Ana"), FilterVerdict::Accept);
    }
}
