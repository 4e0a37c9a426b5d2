//! Route handlers (`spec.md` §6 "External Interfaces"): a thin read-through
//! over `manuscript-core`'s repository traits and `manuscript-cognitive`'s
//! services. No business logic lives here — every handler delegates.

use crate::dto::{ChapterView, ProjectView, SnapshotView};
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use manuscript_core::alert::Alert;
use manuscript_core::entity::Entity;
use manuscript_core::repository::{AlertRepository, ChapterRepository, EntityRepository, ProjectRepository, SnapshotRepository};
use manuscript_cognitive::entity_service::{merge_entities, undo_merge};
use manuscript_cognitive::identity_service::{check_identity, IdentityCheck};
use serde::Deserialize;
use uuid::Uuid;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/projects", get(list_projects))
        .route("/projects/:id", get(get_project))
        .route("/projects/:id/chapters", get(list_chapters))
        .route("/projects/:id/entities", get(list_entities))
        .route("/projects/:id/alerts", get(list_open_alerts))
        .route("/projects/:id/alerts/all", get(list_all_alerts))
        .route("/projects/:id/snapshots", get(list_snapshots))
        .route("/projects/:id/identity-check", post(identity_check))
        .route("/entities/merge", post(merge))
        .route("/entities/merge/:merge_id/undo", post(undo))
        .with_state(state)
}

async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<ProjectView>>, ApiError> {
    let projects = state.repo.list_projects().await?;
    Ok(Json(projects.into_iter().map(ProjectView::from).collect()))
}

async fn get_project(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ProjectView>, ApiError> {
    let project = state
        .repo
        .get_project(id)
        .await?
        .ok_or_else(|| manuscript_types::ManuscriptError::NotFound(format!("project {id}")))?;
    Ok(Json(ProjectView::from(project)))
}

async fn list_chapters(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<ChapterView>>, ApiError> {
    let chapters = state.repo.list_chapters(id).await?;
    Ok(Json(chapters.into_iter().map(ChapterView::from).collect()))
}

async fn list_entities(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<Entity>>, ApiError> {
    Ok(Json(state.repo.list_entities(id).await?))
}

async fn list_open_alerts(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<Alert>>, ApiError> {
    Ok(Json(state.repo.list_open_alerts(id).await?))
}

async fn list_all_alerts(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<Alert>>, ApiError> {
    Ok(Json(state.repo.list_alerts(id).await?))
}

async fn list_snapshots(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<SnapshotView>>, ApiError> {
    let snapshots = state.repo.list_snapshots(id).await?;
    Ok(Json(snapshots.into_iter().map(SnapshotView::from).collect()))
}

#[derive(Debug, Deserialize)]
struct IdentityCheckRequest {
    text: String,
    chapter_count: usize,
}

async fn identity_check(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<IdentityCheckRequest>,
) -> Result<Json<IdentityCheckView>, ApiError> {
    let check: IdentityCheck = check_identity(&*state.repo, id, &body.text, body.chapter_count).await?;
    Ok(Json(IdentityCheckView {
        verdict: format!("{:?}", check.verdict),
        similarity: check.similarity,
        fingerprint: check.fingerprint,
    }))
}

#[derive(Debug, serde::Serialize)]
struct IdentityCheckView {
    verdict: String,
    similarity: f64,
    fingerprint: String,
}

#[derive(Debug, Deserialize)]
struct MergeRequest {
    project_id: Uuid,
    primary_id: Uuid,
    source_ids: Vec<Uuid>,
    actor: String,
}

async fn merge(State(state): State<AppState>, Json(body): Json<MergeRequest>) -> Result<Json<Uuid>, ApiError> {
    let entry = merge_entities(&*state.repo, body.project_id, body.primary_id, &body.source_ids, &body.actor).await?;
    Ok(Json(entry.id))
}

async fn undo(State(state): State<AppState>, Path(merge_id): Path<Uuid>) -> Result<Json<()>, ApiError> {
    undo_merge(&*state.repo, merge_id).await?;
    Ok(Json(()))
}
