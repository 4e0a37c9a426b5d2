//! Snapshot comparison (`spec.md` §4.11 "Snapshot & Comparison"): classifies
//! alerts across two analysis runs as new / resolved(text_changed) /
//! resolved(detector_improved) / unchanged, and entities as added / removed
//! / unchanged, then (optionally) writes the lineage links back.
//!
//! Four-pass alert matching, in decreasing confidence: (1) exact
//! `content_hash`, (2) fuzzy match on `(alert_type, chapter)` plus entity
//! overlap or title equality, (3) proximity to a removed/modified text
//! range from a paragraph-level content diff, (4) proximity to a `.docx`
//! tracked-deletion range. Anything still unmatched is presumed fixed by a
//! detector improvement rather than a text change.

use manuscript_core::alert::{Alert, ResolutionReason};
use manuscript_core::content_diff::{is_position_in_modified_area, is_position_in_removed_range, ChapterDiff};
use manuscript_core::entity::Entity;
use manuscript_core::entity_matcher::{exact_match, fuzzy_match_score};
use manuscript_core::repository::AlertRepository;
use manuscript_types::Result;
use std::collections::HashSet;
use uuid::Uuid;

const FUZZY_ENTITY_MATCH_THRESHOLD: f64 = 0.7;
/// Proximity window for pass-3 content-diff alert matching: an alert
/// anchored near (not just inside) a modified paragraph still counts as
/// plausibly explained by that edit (`spec.md` §4.11: "±200 characters").
const REMOVED_RANGE_PROXIMITY: usize = 200;

/// An alert plus the entity names it references, resolved at the time its
/// run happened — ids alone aren't stable across re-canonicalization, so
/// matching works on names the way `spec.md`'s snapshot schema does.
#[derive(Debug, Clone)]
pub struct ComparableAlert {
    pub alert: Alert,
    pub entity_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedAlert {
    pub alert: Alert,
    pub resolution_reason: ResolutionReason,
    pub match_confidence: f64,
}

#[derive(Debug, Clone)]
pub struct AlertMatch {
    pub current_index: usize,
    pub old_index: usize,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct AlertDiffReport {
    pub new_alerts: Vec<Alert>,
    pub resolved_alerts: Vec<ResolvedAlert>,
    pub unchanged_count: usize,
    pub matches: Vec<AlertMatch>,
}

/// Run the four-pass alert matching algorithm between a snapshot's alerts
/// and the current run's alerts.
pub fn diff_alerts(
    old: &[ComparableAlert],
    current: &[ComparableAlert],
    doc_diff: Option<&ChapterDiff>,
    docx_del_ranges: &[(usize, usize)],
) -> AlertDiffReport {
    let mut old_matched = vec![false; old.len()];
    let mut new_matched = vec![false; current.len()];
    let mut matches = Vec::new();

    // Pass 1: exact content_hash.
    for (j, ca) in current.iter().enumerate() {
        if ca.alert.content_hash.is_empty() {
            continue;
        }
        let found = old.iter().enumerate().position(|(i, oa)| !old_matched[i] && oa.alert.content_hash == ca.alert.content_hash);
        if let Some(i) = found {
            old_matched[i] = true;
            new_matched[j] = true;
            matches.push(AlertMatch { current_index: j, old_index: i, confidence: 1.0 });
        }
    }

    // Pass 2: fuzzy match on (alert_type, chapter) + entity overlap or title equality.
    for (j, ca) in current.iter().enumerate() {
        if new_matched[j] {
            continue;
        }
        for (i, oa) in old.iter().enumerate() {
            if old_matched[i] {
                continue;
            }
            if ca.alert.alert_type != oa.alert.alert_type || ca.alert.chapter != oa.alert.chapter {
                continue;
            }
            let old_names: HashSet<&str> = oa.entity_names.iter().map(|s| s.as_str()).collect();
            let new_names: HashSet<&str> = ca.entity_names.iter().map(|s| s.as_str()).collect();
            let confidence = if !old_names.is_empty() && !new_names.is_empty() && old_names.intersection(&new_names).next().is_some() {
                Some(0.8)
            } else if !oa.alert.title.is_empty() && oa.alert.title == ca.alert.title {
                Some(0.7)
            } else {
                None
            };
            if let Some(confidence) = confidence {
                old_matched[i] = true;
                new_matched[j] = true;
                matches.push(AlertMatch { current_index: j, old_index: i, confidence });
                break;
            }
        }
    }

    // Pass 3: proximity to a removed/modified text range from the content diff.
    let mut resolution_reasons = vec![None; old.len()];
    let mut match_confidences = vec![0.0; old.len()];
    if let Some(diff) = doc_diff {
        for (i, oa) in old.iter().enumerate() {
            if old_matched[i] {
                continue;
            }
            let Some(start) = oa.alert.start_char else { continue };
            if is_position_in_removed_range(&diff.removed_char_ranges, start) {
                resolution_reasons[i] = Some(ResolutionReason::TextChanged);
                match_confidences[i] = 0.9;
            } else if is_position_in_modified_area(&diff.modified_char_ranges, start, REMOVED_RANGE_PROXIMITY) {
                resolution_reasons[i] = Some(ResolutionReason::TextChanged);
                match_confidences[i] = 0.7;
            }
        }
    }

    // Pass 4: .docx tracked-deletion ranges — explicit evidence the text was removed.
    for (i, oa) in old.iter().enumerate() {
        if old_matched[i] || resolution_reasons[i].is_some() {
            continue;
        }
        let (Some(start), Some(end)) = (oa.alert.start_char, oa.alert.end_char) else { continue };
        if docx_del_ranges.iter().any(|&(del_start, del_end)| start < del_end && end > del_start) {
            resolution_reasons[i] = Some(ResolutionReason::TextChanged);
            match_confidences[i] = 0.95;
        }
    }

    for i in 0..old.len() {
        if !old_matched[i] && resolution_reasons[i].is_none() {
            resolution_reasons[i] = Some(ResolutionReason::DetectorImproved);
            match_confidences[i] = 0.5;
        }
    }

    let new_alerts = current.iter().enumerate().filter(|(j, _)| !new_matched[*j]).map(|(_, ca)| ca.alert.clone()).collect();

    let resolved_alerts = old
        .iter()
        .enumerate()
        .filter(|(i, _)| !old_matched[*i])
        .map(|(i, oa)| ResolvedAlert {
            alert: oa.alert.clone(),
            resolution_reason: resolution_reasons[i].expect("every unmatched old alert gets a reason"),
            match_confidence: match_confidences[i],
        })
        .collect();

    AlertDiffReport { new_alerts, resolved_alerts, unchanged_count: matches.len(), matches }
}

/// Best fuzzy score across every (name-or-alias) pair between two entities,
/// since either side's comparison-worthy name might be an alias rather than
/// the current canonical name.
fn best_fuzzy_score(name_a: &str, aliases_a: &HashSet<String>, name_b: &str, aliases_b: &HashSet<String>) -> f64 {
    let candidates_a: Vec<&str> = std::iter::once(name_a).chain(aliases_a.iter().map(|s| s.as_str())).collect();
    let candidates_b: Vec<&str> = std::iter::once(name_b).chain(aliases_b.iter().map(|s| s.as_str())).collect();
    candidates_a
        .iter()
        .flat_map(|a| candidates_b.iter().map(move |b| fuzzy_match_score(a, b)))
        .fold(0.0_f64, f64::max)
}

#[derive(Debug, Clone, Default)]
pub struct EntityDiffReport {
    pub added: Vec<Entity>,
    pub removed: Vec<Entity>,
    pub unchanged_count: usize,
}

/// Two-pass entity matching: exact name/alias match first, then fuzzy
/// trigram similarity within the same entity type.
pub fn diff_entities(old: &[Entity], current: &[Entity]) -> EntityDiffReport {
    let mut old_matched = vec![false; old.len()];
    let mut new_matched = vec![false; current.len()];

    for (j, ce) in current.iter().enumerate() {
        for (i, oe) in old.iter().enumerate() {
            if old_matched[i] {
                continue;
            }
            if ce.entity_type == oe.entity_type && exact_match(&ce.canonical_name, &ce.aliases, &oe.canonical_name, &oe.aliases) {
                old_matched[i] = true;
                new_matched[j] = true;
                break;
            }
        }
    }

    for (j, ce) in current.iter().enumerate() {
        if new_matched[j] {
            continue;
        }
        for (i, oe) in old.iter().enumerate() {
            if old_matched[i] || ce.entity_type != oe.entity_type {
                continue;
            }
            if best_fuzzy_score(&ce.canonical_name, &ce.aliases, &oe.canonical_name, &oe.aliases) >= FUZZY_ENTITY_MATCH_THRESHOLD {
                old_matched[i] = true;
                new_matched[j] = true;
                break;
            }
        }
    }

    EntityDiffReport {
        added: current.iter().enumerate().filter(|(j, _)| !new_matched[*j]).map(|(_, e)| e.clone()).collect(),
        removed: old.iter().enumerate().filter(|(i, _)| !old_matched[*i]).map(|(_, e)| e.clone()).collect(),
        unchanged_count: old_matched.iter().filter(|&&m| m).count(),
    }
}

/// Write the computed lineage back onto the current run's alerts.
pub async fn apply_alert_links<R: AlertRepository>(
    repo: &R,
    current_ids: &[Uuid],
    old_ids: &[Uuid],
    report: &AlertDiffReport,
) -> Result<()> {
    for m in &report.matches {
        repo.link_to_previous(current_ids[m.current_index], old_ids[m.old_index], m.confidence).await?;
    }
    for resolved in &report.resolved_alerts {
        repo.resolve_alert(resolved.alert.id, resolved.resolution_reason).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_core::alert::NewAlert;
    use manuscript_core::entity::EntityType;

    fn alert(alert_type: &str, chapter: i64, title: &str, content_hash_seed: &str) -> Alert {
        let mut a = NewAlert {
            project_id: Uuid::nil(),
            category: "style".to_string(),
            alert_type: alert_type.to_string(),
            severity: manuscript_core::alert::AlertSeverity::Warning,
            title: title.to_string(),
            description: String::new(),
            explanation: String::new(),
            suggestion: String::new(),
            excerpt: content_hash_seed.to_string(),
            chapter: Some(chapter),
            start_char: Some(100),
            end_char: Some(120),
            confidence: 0.8,
            related_entity_ids: vec![],
            extra_data: serde_json::json!({}),
            key_fields: vec![],
        }
        .into_alert();
        a.id = Uuid::new_v4();
        a
    }

    #[test]
    fn identical_content_hash_matches_exactly() {
        let old = vec![ComparableAlert { alert: alert("sticky_sentence", 1, "t", "same"), entity_names: vec![] }];
        let current = vec![ComparableAlert { alert: alert("sticky_sentence", 1, "t", "same"), entity_names: vec![] }];
        let report = diff_alerts(&old, &current, None, &[]);
        assert_eq!(report.unchanged_count, 1);
        assert!(report.new_alerts.is_empty());
        assert!(report.resolved_alerts.is_empty());
    }

    #[test]
    fn unmatched_old_alert_without_diff_info_is_detector_improved() {
        let old = vec![ComparableAlert { alert: alert("sticky_sentence", 1, "t", "old"), entity_names: vec![] }];
        let current: Vec<ComparableAlert> = vec![];
        let report = diff_alerts(&old, &current, None, &[]);
        assert_eq!(report.resolved_alerts.len(), 1);
        assert_eq!(report.resolved_alerts[0].resolution_reason, ResolutionReason::DetectorImproved);
        assert_eq!(report.resolved_alerts[0].match_confidence, 0.5);
    }

    #[test]
    fn docx_deletion_range_covering_old_alert_is_text_changed() {
        let old = vec![ComparableAlert { alert: alert("sticky_sentence", 1, "t", "old"), entity_names: vec![] }];
        let current: Vec<ComparableAlert> = vec![];
        let report = diff_alerts(&old, &current, None, &[(90, 130)]);
        assert_eq!(report.resolved_alerts[0].resolution_reason, ResolutionReason::TextChanged);
        assert_eq!(report.resolved_alerts[0].match_confidence, 0.95);
    }

    #[test]
    fn exact_entity_match_counts_as_unchanged() {
        let mut e1 = Entity::new(Uuid::nil(), "Ana García", EntityType::Character);
        e1.aliases.insert("Ana".to_string());
        let mut e2 = Entity::new(Uuid::nil(), "ana garcía", EntityType::Character);
        e2.aliases.insert("Anita".to_string());
        let report = diff_entities(&[e1], &[e2]);
        assert_eq!(report.unchanged_count, 1);
        assert!(report.added.is_empty());
        assert!(report.removed.is_empty());
    }
}
