//! End-to-end exercise of `AnalysisPipeline` against a real (in-memory)
//! SQLite-backed repository: one run from raw chapter text to a persisted
//! snapshot, then a second run over lightly edited text to confirm alert and
//! entity lineage carries across snapshots.

use manuscript_cognitive::coref_resolver::ResolutionCapabilities;
use manuscript_cognitive::orchestrator::{AnalysisPipeline, InputChapter, ProgressTracker};
use manuscript_core::morphology::FallbackTokenizer;
use manuscript_core::repository::{
    AlertRepository, EditorialRuleRepository, EditorialRules, EntityRepository, FilterRepository, ProjectRepository,
};
use manuscript_infra::database::DatabaseManager;
use manuscript_infra::repository::SqliteRepository;
use manuscript_types::Settings;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const CHAPTER_ONE: &str = "Maria caminó hacia la puerta. Ella abrió la puerta despacio. \
\"No quiero ir,\" dijo Maria. Juan la miró en silencio.";

const CHAPTER_TWO: &str = "Al día siguiente, Maria volvió a la casa. \
\"Tenemos que hablar,\" dijo Juan. Ella asintió.";

async fn fresh_repo() -> Arc<SqliteRepository> {
    let db = Arc::new(DatabaseManager::new_in_memory().await.unwrap());
    db.initialize_schema().await.unwrap();
    Arc::new(SqliteRepository::new(db))
}

fn chapters() -> Vec<InputChapter> {
    vec![
        InputChapter { index: 0, title: Some("uno".to_string()), text: CHAPTER_ONE.to_string() },
        InputChapter { index: 1, title: Some("dos".to_string()), text: CHAPTER_TWO.to_string() },
    ]
}

#[tokio::test]
async fn first_run_persists_chapters_and_entities() {
    let repo = fresh_repo().await;
    let project_id = repo
        .create_project(manuscript_core::repository::Project {
            id: Uuid::new_v4(),
            name: "La Puerta".to_string(),
            created_at: chrono::Utc::now(),
            last_analyzed_at: None,
        })
        .await
        .unwrap();

    let progress = Arc::new(ProgressTracker::new(Duration::from_secs(60)));
    let pipeline = AnalysisPipeline::new(repo.clone(), progress);
    let annotator = FallbackTokenizer;
    let capabilities = ResolutionCapabilities::none();
    let settings = Settings::default();

    let report = pipeline
        .run(project_id, chapters(), &annotator, &settings, &capabilities)
        .await
        .expect("first analysis run should succeed");

    assert_eq!(report.chapters_persisted, 2);
    assert!(report.entities_created > 0);
    assert!(report.snapshot_id.is_some());

    let entities = repo.list_entities(project_id).await.unwrap();
    assert_eq!(entities.len(), report.entities_created);
}

#[tokio::test]
async fn second_run_over_same_text_reuses_entities_without_duplicating() {
    let repo = fresh_repo().await;
    let project_id = repo
        .create_project(manuscript_core::repository::Project {
            id: Uuid::new_v4(),
            name: "La Puerta".to_string(),
            created_at: chrono::Utc::now(),
            last_analyzed_at: None,
        })
        .await
        .unwrap();

    let progress = Arc::new(ProgressTracker::new(Duration::from_secs(60)));
    let pipeline = AnalysisPipeline::new(repo.clone(), progress);
    let annotator = FallbackTokenizer;
    let capabilities = ResolutionCapabilities::none();
    let settings = Settings::default();

    let first = pipeline
        .run(project_id, chapters(), &annotator, &settings, &capabilities)
        .await
        .unwrap();
    assert_eq!(first.identity_verdict.as_deref(), Some("Same"));

    let second = pipeline
        .run(project_id, chapters(), &annotator, &settings, &capabilities)
        .await
        .expect("re-analysis of an unchanged manuscript should succeed");

    assert_eq!(second.identity_verdict.as_deref(), Some("Same"));
    assert_eq!(second.chapters_persisted, 2);
}

#[tokio::test]
async fn rejecting_a_surface_form_keeps_the_pipeline_from_creating_that_entity() {
    let repo = fresh_repo().await;
    let project_id = repo
        .create_project(manuscript_core::repository::Project {
            id: Uuid::new_v4(),
            name: "La Puerta".to_string(),
            created_at: chrono::Utc::now(),
            last_analyzed_at: None,
        })
        .await
        .unwrap();
    repo.reject_entity(project_id, "maria".to_string()).await.unwrap();

    let progress = Arc::new(ProgressTracker::new(Duration::from_secs(60)));
    let pipeline = AnalysisPipeline::new(repo.clone(), progress);
    let annotator = FallbackTokenizer;
    let capabilities = ResolutionCapabilities::none();
    let settings = Settings::default();

    pipeline.run(project_id, chapters(), &annotator, &settings, &capabilities).await.unwrap();

    let entities = repo.list_entities(project_id).await.unwrap();
    assert!(entities.iter().all(|e| e.canonical_name.to_lowercase() != "maria"));
}

#[tokio::test]
async fn enabled_editorial_rule_produces_an_alert_for_a_banned_phrase() {
    let repo = fresh_repo().await;
    let project_id = repo
        .create_project(manuscript_core::repository::Project {
            id: Uuid::new_v4(),
            name: "La Puerta".to_string(),
            created_at: chrono::Utc::now(),
            last_analyzed_at: None,
        })
        .await
        .unwrap();
    repo.set_editorial_rules(project_id, EditorialRules { rules_text: "en silencio".to_string(), enabled: true })
        .await
        .unwrap();

    let progress = Arc::new(ProgressTracker::new(Duration::from_secs(60)));
    let pipeline = AnalysisPipeline::new(repo.clone(), progress);
    let annotator = FallbackTokenizer;
    let capabilities = ResolutionCapabilities::none();
    let settings = Settings::default();

    pipeline.run(project_id, chapters(), &annotator, &settings, &capabilities).await.unwrap();

    let alerts = repo.list_alerts(project_id).await.unwrap();
    assert!(alerts.iter().any(|a| a.alert_type == "editorial_rule_violation"));
}
