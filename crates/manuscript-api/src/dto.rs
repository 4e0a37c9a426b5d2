//! Wire-format views over core domain types that don't derive `Serialize`
//! themselves (the repository traits keep `manuscript-core` free of a
//! serde dependency on its own structs where nothing else needs it).

use chrono::{DateTime, Utc};
use manuscript_core::repository::{Chapter, Project, Snapshot};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ProjectView {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_analyzed_at: Option<DateTime<Utc>>,
}

impl From<Project> for ProjectView {
    fn from(p: Project) -> Self {
        Self { id: p.id, name: p.name, created_at: p.created_at, last_analyzed_at: p.last_analyzed_at }
    }
}

#[derive(Debug, Serialize)]
pub struct ChapterView {
    pub id: Uuid,
    pub project_id: Uuid,
    pub index: i64,
    pub title: Option<String>,
    pub word_count: usize,
}

impl From<Chapter> for ChapterView {
    fn from(c: Chapter) -> Self {
        Self { id: c.id, project_id: c.project_id, index: c.index, title: c.title, word_count: c.text.split_whitespace().count() }
    }
}

#[derive(Debug, Serialize)]
pub struct SnapshotView {
    pub id: Uuid,
    pub project_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub fingerprint: String,
    pub word_count: i64,
    pub chapter_count: i64,
}

impl From<Snapshot> for SnapshotView {
    fn from(s: Snapshot) -> Self {
        Self { id: s.id, project_id: s.project_id, created_at: s.created_at, fingerprint: s.fingerprint, word_count: s.word_count, chapter_count: s.chapter_count }
    }
}
