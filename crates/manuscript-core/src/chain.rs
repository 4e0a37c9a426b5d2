//! Coreference chain construction (`spec.md` §4.5 "Chain Builder").
//!
//! Each resolved mention->antecedent edge is a union between two mention
//! slots; chains fall out as connected components. Using union-find rather
//! than growing chains incrementally keeps merges (a later mention linking
//! two previously separate chains) O(alpha(n)) instead of O(n).

use crate::mention::Mention;
use uuid::Uuid;

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// A resolved anaphor -> antecedent edge, as produced by the voter for a
/// single mention. `antecedent_idx` indexes into the same mention slice
/// passed to `build_chains`.
#[derive(Debug, Clone)]
pub struct ResolvedLink {
    pub mention_idx: usize,
    pub antecedent_idx: usize,
    pub ambiguity: f64,
}

#[derive(Debug, Clone)]
pub struct CoreferenceChain {
    pub id: Uuid,
    pub mention_indices: Vec<usize>,
    /// Mean ambiguity across the edges that built this chain; high values
    /// flag chains worth surfacing for manual review (`spec.md` §4.5).
    pub mean_ambiguity: f64,
}

/// Group mentions into chains by unioning every resolved link, then
/// collecting connected components in original mention order.
pub fn build_chains(mention_count: usize, links: &[ResolvedLink]) -> Vec<CoreferenceChain> {
    let mut uf = UnionFind::new(mention_count);
    for link in links {
        uf.union(link.mention_idx, link.antecedent_idx);
    }

    let mut ambiguity_by_root: std::collections::HashMap<usize, Vec<f64>> = std::collections::HashMap::new();
    for link in links {
        let root = uf.find(link.mention_idx);
        ambiguity_by_root.entry(root).or_default().push(link.ambiguity);
    }

    let mut groups: std::collections::BTreeMap<usize, Vec<usize>> = std::collections::BTreeMap::new();
    for idx in 0..mention_count {
        let root = uf.find(idx);
        groups.entry(root).or_default().push(idx);
    }

    groups
        .into_iter()
        .map(|(root, mention_indices)| {
            let ambiguities = ambiguity_by_root.get(&root);
            let mean_ambiguity = ambiguities
                .map(|v| v.iter().sum::<f64>() / v.len() as f64)
                .unwrap_or(0.0);
            CoreferenceChain {
                id: Uuid::new_v4(),
                mention_indices,
                mean_ambiguity,
            }
        })
        .filter(|chain| chain.mention_indices.len() > 1)
        .collect()
}

/// Pick the best proper-noun surface form among a chain's member mentions,
/// for canonical-name selection (`spec.md` §4.6). Returns indices rather
/// than owned strings so the caller can look up full `Mention` records.
pub fn proper_noun_indices_in_chain<'a>(chain: &CoreferenceChain, mentions: &'a [Mention]) -> Vec<usize> {
    chain
        .mention_indices
        .iter()
        .copied()
        .filter(|&idx| mentions[idx].is_proper_noun())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mention::{MentionSource, MentionType, SentenceIdxBasis};

    fn dummy_mention(surface: &str, mention_type: MentionType) -> Mention {
        Mention::new(surface, 0, 0, mention_type, 0, SentenceIdxBasis::Dense, MentionSource::MorphAnalyzer)
    }

    #[test]
    fn transitive_links_merge_into_one_chain() {
        // mention 2 -> 1, mention 1 -> 0: all three should end up together.
        let links = vec![
            ResolvedLink { mention_idx: 1, antecedent_idx: 0, ambiguity: 0.1 },
            ResolvedLink { mention_idx: 2, antecedent_idx: 1, ambiguity: 0.2 },
        ];
        let chains = build_chains(3, &links);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].mention_indices, vec![0, 1, 2]);
        assert!((chains[0].mean_ambiguity - 0.15).abs() < 1e-9);
    }

    #[test]
    fn singleton_mentions_do_not_form_chains() {
        let chains = build_chains(3, &[]);
        assert!(chains.is_empty());
    }

    #[test]
    fn disjoint_links_produce_separate_chains() {
        let links = vec![
            ResolvedLink { mention_idx: 1, antecedent_idx: 0, ambiguity: 0.0 },
            ResolvedLink { mention_idx: 3, antecedent_idx: 2, ambiguity: 0.0 },
        ];
        let chains = build_chains(4, &links);
        assert_eq!(chains.len(), 2);
    }

    #[test]
    fn proper_noun_filter_respects_mention_type() {
        let mentions = vec![
            dummy_mention("Ana", MentionType::ProperNoun),
            dummy_mention("ella", MentionType::Pronoun),
        ];
        let chain = CoreferenceChain {
            id: Uuid::new_v4(),
            mention_indices: vec![0, 1],
            mean_ambiguity: 0.0,
        };
        let proper = proper_noun_indices_in_chain(&chain, &mentions);
        assert_eq!(proper, vec![0]);
    }
}
