//! Identity gate (`spec.md` §4.11 "Identity"): decides, against the most
//! recent snapshot, whether an incoming upload is an edit of the same
//! manuscript, an unrelated document, or ambiguous enough to ask the user.

use manuscript_core::manuscript_identity::{classify_identity, fingerprint, structural_similarity, IdentityVerdict};
use manuscript_core::repository::{Snapshot, SnapshotRepository};
use manuscript_types::Result;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct IdentityCheck {
    pub verdict: IdentityVerdict,
    pub similarity: f64,
    pub fingerprint: String,
    pub previous_snapshot: Option<Snapshot>,
}

/// Compare an incoming document's structure against the project's latest
/// snapshot. With no prior snapshot there is nothing to gate against, so
/// any upload is treated as the first, authoritative version.
pub async fn check_identity<R: SnapshotRepository>(
    repo: &R,
    project_id: Uuid,
    text: &str,
    chapter_count: usize,
) -> Result<IdentityCheck> {
    let word_count = text.split_whitespace().count();
    let new_fingerprint = fingerprint(text, chapter_count);

    let Some(previous) = repo.get_latest_snapshot(project_id).await? else {
        return Ok(IdentityCheck {
            verdict: IdentityVerdict::Same,
            similarity: 1.0,
            fingerprint: new_fingerprint,
            previous_snapshot: None,
        });
    };

    let similarity = structural_similarity(previous.word_count as usize, previous.chapter_count as usize, word_count, chapter_count);
    let verdict = classify_identity(similarity);

    Ok(IdentityCheck { verdict, similarity, fingerprint: new_fingerprint, previous_snapshot: Some(previous) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct FakeSnapshotRepo {
        snapshots: Mutex<Vec<Snapshot>>,
    }

    #[async_trait]
    #[allow(async_fn_in_trait)]
    impl SnapshotRepository for FakeSnapshotRepo {
        async fn create_snapshot(&self, snapshot: Snapshot) -> Result<Uuid> {
            let id = snapshot.id;
            self.snapshots.lock().unwrap().push(snapshot);
            Ok(id)
        }
        async fn list_snapshots(&self, project_id: Uuid) -> Result<Vec<Snapshot>> {
            Ok(self.snapshots.lock().unwrap().iter().filter(|s| s.project_id == project_id).cloned().collect())
        }
        async fn get_latest_snapshot(&self, project_id: Uuid) -> Result<Option<Snapshot>> {
            Ok(self.snapshots.lock().unwrap().iter().filter(|s| s.project_id == project_id).max_by_key(|s| s.created_at).cloned())
        }
        async fn prune_snapshots(&self, project_id: Uuid, retain_newest: usize) -> Result<usize> {
            let mut snapshots = self.snapshots.lock().unwrap();
            let mut kept: Vec<Snapshot> = snapshots.iter().filter(|s| s.project_id != project_id).cloned().collect();
            let mut project_snapshots: Vec<Snapshot> = snapshots.iter().filter(|s| s.project_id == project_id).cloned().collect();
            project_snapshots.sort_by_key(|s| std::cmp::Reverse(s.created_at));
            let pruned = project_snapshots.len().saturating_sub(retain_newest);
            project_snapshots.truncate(retain_newest);
            kept.extend(project_snapshots);
            *snapshots = kept;
            Ok(pruned)
        }
        async fn record_entity_diff(&self, _snapshot_id: Uuid, _added_entity_ids: &[Uuid], _removed_entity_ids: &[Uuid]) -> Result<()> {
            Ok(())
        }
        async fn get_entity_diff(&self, _snapshot_id: Uuid) -> Result<Option<(Vec<Uuid>, Vec<Uuid>)>> {
            Ok(None)
        }
    }

    fn snapshot(project_id: Uuid, word_count: i64, chapter_count: i64) -> Snapshot {
        Snapshot { id: Uuid::new_v4(), project_id, created_at: Utc::now(), fingerprint: "f".to_string(), word_count, chapter_count }
    }

    #[tokio::test]
    async fn no_prior_snapshot_is_treated_as_same() {
        let repo = FakeSnapshotRepo { snapshots: Mutex::new(Vec::new()) };
        let project_id = Uuid::new_v4();
        let check = check_identity(&repo, project_id, "uno dos tres", 1).await.unwrap();
        assert_eq!(check.verdict, IdentityVerdict::Same);
        assert!(check.previous_snapshot.is_none());
    }

    #[tokio::test]
    async fn drastically_shorter_document_is_flagged_different() {
        let project_id = Uuid::new_v4();
        let repo = FakeSnapshotRepo { snapshots: Mutex::new(vec![snapshot(project_id, 50_000, 25)]) };
        let text = "uno dos tres";
        let check = check_identity(&repo, project_id, text, 1).await.unwrap();
        assert_eq!(check.verdict, IdentityVerdict::DifferentDocument);
    }

    #[tokio::test]
    async fn near_identical_structure_passes_as_same() {
        let project_id = Uuid::new_v4();
        let repo = FakeSnapshotRepo { snapshots: Mutex::new(vec![snapshot(project_id, 10_000, 20)]) };
        let text = "palabra ".repeat(10_050);
        let check = check_identity(&repo, project_id, &text, 20).await.unwrap();
        assert_eq!(check.verdict, IdentityVerdict::Same);
    }
}
