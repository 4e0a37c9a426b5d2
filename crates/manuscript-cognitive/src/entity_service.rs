//! Entity canonicalization and atomic merge/undo
//! (`spec.md` §4.6 "Chain Builder and Entity Canonicalization",
//! TESTABLE PROPERTIES invariant 2).
//!
//! Builds a fresh `Entity` from a resolved coreference chain, and performs
//! merges as a single recorded operation so `undo_merge` can restore the
//! exact prior state rather than reconstructing it heuristically.

use manuscript_core::chain::{proper_noun_indices_in_chain, CoreferenceChain};
use manuscript_core::entity::{choose_canonical_name, Entity, EntityType, Importance, MergeHistoryEntry};
use manuscript_core::mention::Mention;
use manuscript_core::repository::{EntityRepository, MentionRepository};
use manuscript_types::{ManuscriptError, Result};
use std::collections::HashSet;
use uuid::Uuid;

/// Build an `Entity` from one coreference chain: canonical name chosen from
/// the chain's proper-noun mentions (falling back to the longest surface
/// form when the chain has none), aliases from every distinct surface
/// form, mention count from chain size.
pub fn entity_from_chain(project_id: Uuid, chain: &CoreferenceChain, mentions: &[Mention]) -> Entity {
    let proper_noun_idxs = proper_noun_indices_in_chain(chain, mentions);
    let proper_noun_surfaces: Vec<String> = proper_noun_idxs.iter().map(|&i| mentions[i].surface_form.clone()).collect();

    let canonical_name = choose_canonical_name(&proper_noun_surfaces).unwrap_or_else(|| {
        chain
            .mention_indices
            .iter()
            .map(|&i| mentions[i].surface_form.clone())
            .max_by_key(|s| s.chars().count())
            .unwrap_or_else(|| "desconocido".to_string())
    });

    let aliases: HashSet<String> = chain
        .mention_indices
        .iter()
        .map(|&i| mentions[i].surface_form.clone())
        .filter(|s| s != &canonical_name && !s.is_empty())
        .collect();

    let first_appearance_char = chain
        .mention_indices
        .iter()
        .map(|&i| mentions[i].start_char)
        .min()
        .unwrap_or(0);

    let mut entity = Entity::new(project_id, canonical_name, EntityType::Character);
    entity.aliases = aliases;
    entity.first_appearance_char = first_appearance_char;
    entity.mention_count = chain.mention_indices.len() as u64;
    entity.importance = if !proper_noun_idxs.is_empty() { Importance::Secondary } else { Importance::Minimal };
    entity
}

/// Merge `source_ids` into `primary_id` atomically: reassign every mention,
/// accumulate aliases, and record a `MergeHistoryEntry` carrying the exact
/// prior state of each source so `undo_merge` needs no guesswork
/// (`spec.md` TESTABLE PROPERTIES invariant 2).
pub async fn merge_entities<R>(
    repo: &R,
    project_id: Uuid,
    primary_id: Uuid,
    source_ids: &[Uuid],
    actor: &str,
) -> Result<MergeHistoryEntry>
where
    R: EntityRepository + MentionRepository,
{
    let mut primary = repo
        .get_entity(primary_id)
        .await?
        .ok_or_else(|| ManuscriptError::NotFound(format!("entity {primary_id}")))?;

    let mut source_snapshots = Vec::new();
    let mut reassigned_mentions = Vec::new();
    let mut combined_aliases = primary.aliases.clone();
    let mut total_mention_delta = 0u64;

    for &source_id in source_ids {
        let source = repo
            .get_entity(source_id)
            .await?
            .ok_or_else(|| ManuscriptError::NotFound(format!("entity {source_id}")))?;

        combined_aliases.insert(source.canonical_name.clone());
        combined_aliases.extend(source.aliases.iter().cloned());
        combined_aliases.remove(&primary.canonical_name);

        let mentions = repo.list_mentions_for_entity(source_id).await?;
        for mention in &mentions {
            repo.assign_entity(mention.id, primary_id).await?;
            reassigned_mentions.push((mention.id, source_id));
        }

        total_mention_delta += source.mention_count;
        source_snapshots.push(source.clone());

        let mut deactivated = source;
        deactivated.is_active = false;
        repo.update_entity(&deactivated).await?;

        primary.merged_from_ids.push(source_id);
    }

    primary.aliases = combined_aliases.clone();
    primary.mention_count += total_mention_delta;
    repo.update_entity(&primary).await?;

    let entry = MergeHistoryEntry {
        id: Uuid::new_v4(),
        project_id,
        primary_id,
        source_ids: source_ids.to_vec(),
        reassigned_mentions,
        source_snapshots,
        combined_aliases,
        total_mention_delta,
        actor: actor.to_string(),
        created_at: chrono::Utc::now(),
        undone: false,
    };
    repo.record_merge(entry.clone()).await?;
    Ok(entry)
}

/// Reverse a recorded merge: restore source entities verbatim, reassign
/// mentions back to their original owners, and mark the history entry
/// undone so it can't be undone twice.
pub async fn undo_merge<R>(repo: &R, merge_id: Uuid) -> Result<()>
where
    R: EntityRepository + MentionRepository,
{
    let entry = repo
        .get_merge_history(merge_id)
        .await?
        .ok_or_else(|| ManuscriptError::NotFound(format!("merge history {merge_id}")))?;
    if entry.undone {
        return Err(ManuscriptError::Conflict(format!("merge {merge_id} was already undone")));
    }

    for (mention_id, original_entity_id) in &entry.reassigned_mentions {
        repo.assign_entity(*mention_id, *original_entity_id).await?;
    }

    for source in &entry.source_snapshots {
        repo.update_entity(source).await?;
    }

    let mut primary = repo
        .get_entity(entry.primary_id)
        .await?
        .ok_or_else(|| ManuscriptError::NotFound(format!("entity {}", entry.primary_id)))?;
    primary.mention_count = primary.mention_count.saturating_sub(entry.total_mention_delta);
    // Strip back out exactly what each source contributed to the merged
    // alias set, rather than discarding every alias the primary happened
    // to already share with a source.
    for source in &entry.source_snapshots {
        primary.aliases.remove(&source.canonical_name);
        for alias in &source.aliases {
            primary.aliases.remove(alias);
        }
    }
    repo.update_entity(&primary).await?;

    repo.mark_merge_undone(merge_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_core::mention::{MentionSource, MentionType, SentenceIdxBasis};

    fn mention_at(surface: &str, start: usize, mention_type: MentionType) -> Mention {
        Mention::new(surface, start, start + surface.len(), mention_type, 0, SentenceIdxBasis::Dense, MentionSource::MorphAnalyzer)
    }

    #[test]
    fn entity_from_chain_prefers_proper_noun_canonical_name() {
        let mentions = vec![
            mention_at("Ana", 0, MentionType::ProperNoun),
            mention_at("ella", 20, MentionType::Pronoun),
        ];
        let chain = CoreferenceChain {
            id: Uuid::new_v4(),
            mention_indices: vec![0, 1],
            mean_ambiguity: 0.1,
        };
        let entity = entity_from_chain(Uuid::new_v4(), &chain, &mentions);
        assert_eq!(entity.canonical_name, "Ana");
        assert!(entity.aliases.contains("ella"));
        assert_eq!(entity.mention_count, 2);
    }
}
