//! Project-scoped progress tracking (`spec.md` §5 "Concurrency & Resource
//! Model"). An explicit owning struct constructed once and passed by
//! `Arc`, never a `static`/`lazy_static` global, so tests can construct
//! their own isolated tracker instead of sharing process-wide state.

use chrono::{DateTime, Utc};
use manuscript_types::{ManuscriptError, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageName {
    Parsing,
    EntityExtraction,
    AttributeExtraction,
    SpeechAttribution,
    VoiceProfiling,
    Temporal,
    StyleStructure,
    Alerts,
    Snapshot,
}

#[derive(Debug, Clone)]
struct RunState {
    stage: StageName,
    updated_at: DateTime<Utc>,
}

/// Tracks one in-flight analysis run per project and rejects a second
/// concurrent run for the same project rather than letting two pipelines
/// race over the same rows.
pub struct ProgressTracker {
    runs: Mutex<HashMap<Uuid, RunState>>,
    stuck_after: Duration,
}

impl ProgressTracker {
    pub fn new(stuck_after: Duration) -> Self {
        Self { runs: Mutex::new(HashMap::new()), stuck_after }
    }

    /// Claim the project-scoped lock for a new run. Fails if another run is
    /// already in flight and not yet stuck (past `stuck_after` with no
    /// update is treated as abandoned and reclaimable).
    pub fn start(&self, project_id: Uuid) -> Result<()> {
        let mut runs = self.runs.lock().map_err(|e| ManuscriptError::Lock(e.to_string()))?;
        if let Some(existing) = runs.get(&project_id) {
            let elapsed = Utc::now().signed_duration_since(existing.updated_at);
            if elapsed.to_std().unwrap_or(Duration::ZERO) < self.stuck_after {
                return Err(ManuscriptError::Conflict(format!("analysis already running for project {project_id}")));
            }
        }
        runs.insert(project_id, RunState { stage: StageName::Parsing, updated_at: Utc::now() });
        Ok(())
    }

    pub fn advance(&self, project_id: Uuid, stage: StageName) -> Result<()> {
        let mut runs = self.runs.lock().map_err(|e| ManuscriptError::Lock(e.to_string()))?;
        runs.insert(project_id, RunState { stage, updated_at: Utc::now() });
        Ok(())
    }

    pub fn finish(&self, project_id: Uuid) -> Result<()> {
        let mut runs = self.runs.lock().map_err(|e| ManuscriptError::Lock(e.to_string()))?;
        runs.remove(&project_id);
        Ok(())
    }

    pub fn current_stage(&self, project_id: Uuid) -> Option<StageName> {
        self.runs.lock().ok()?.get(&project_id).map(|s| s.stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_start_for_same_project_is_rejected_while_fresh() {
        let tracker = ProgressTracker::new(Duration::from_secs(600));
        let project_id = Uuid::new_v4();
        tracker.start(project_id).unwrap();
        assert!(tracker.start(project_id).is_err());
    }

    #[test]
    fn finish_releases_the_lock() {
        let tracker = ProgressTracker::new(Duration::from_secs(600));
        let project_id = Uuid::new_v4();
        tracker.start(project_id).unwrap();
        tracker.finish(project_id).unwrap();
        assert!(tracker.start(project_id).is_ok());
    }

    #[test]
    fn stuck_run_past_the_timeout_is_reclaimable() {
        let tracker = ProgressTracker::new(Duration::from_millis(1));
        let project_id = Uuid::new_v4();
        tracker.start(project_id).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(tracker.start(project_id).is_ok());
    }
}
