//! Command-line entry point: initialize a project database, run a full
//! analysis pass over a set of chapter files, or serve the HTTP API.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use manuscript_cognitive::coref_resolver::ResolutionCapabilities;
use manuscript_cognitive::orchestrator::{AnalysisPipeline, InputChapter, ProgressTracker};
use manuscript_core::repository::{Project, ProjectRepository};
use manuscript_infra::database::DatabaseManager;
use manuscript_infra::morphology::RuleBasedMorphAnnotator;
use manuscript_infra::repository::SqliteRepository;
use manuscript_types::{init_tracing, LogFormat, Settings};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "manuscript", about = "Narrative-analysis engine for long-form Spanish prose")]
struct Cli {
    /// Path to the SQLite database file.
    #[arg(long, global = true, default_value = "manuscript.db")]
    db: PathBuf,

    /// Emit logs as JSON instead of the default pretty format.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema if it doesn't already exist.
    InitDb,
    /// Run a full analysis pass over a project's chapters.
    Analyze {
        /// Project name; created if it doesn't already exist.
        #[arg(long)]
        project: String,
        /// Chapter text files, in narrative order.
        chapters: Vec<PathBuf>,
    },
    /// Serve the HTTP read API.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(if cli.json_logs { LogFormat::Json } else { LogFormat::Pretty });

    let db = Arc::new(DatabaseManager::new_file(&cli.db).await.context("connecting to database")?);
    db.initialize_schema().await.context("initializing schema")?;

    match cli.command {
        Command::InitDb => {
            tracing::info!(db = %cli.db.display(), "schema ready");
        }
        Command::Analyze { project, chapters } => run_analyze(db, project, chapters).await?,
        Command::Serve { addr } => {
            let state = manuscript_api::AppState::new(db);
            manuscript_api::serve(state, addr).await?;
        }
    }

    Ok(())
}

async fn run_analyze(db: Arc<DatabaseManager>, project_name: String, chapter_paths: Vec<PathBuf>) -> Result<()> {
    if chapter_paths.is_empty() {
        bail!("analyze requires at least one chapter file");
    }

    let repo = Arc::new(SqliteRepository::new(db));
    let project_id = find_or_create_project(&*repo, &project_name).await?;

    let mut chapters = Vec::with_capacity(chapter_paths.len());
    for (index, path) in chapter_paths.iter().enumerate() {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let title = path.file_stem().map(|s| s.to_string_lossy().into_owned());
        chapters.push(InputChapter { index: index as i64, title, text });
    }

    let settings = Settings::default();
    let progress = Arc::new(ProgressTracker::new(Duration::from_secs(settings.scheduler.heavy_task_timeout_secs)));
    let pipeline = AnalysisPipeline::new(repo, progress);
    let annotator = RuleBasedMorphAnnotator;
    let capabilities = ResolutionCapabilities::none();

    let report = pipeline.run(project_id, chapters, &annotator, &settings, &capabilities).await?;

    println!("project:            {project_name} ({project_id})");
    println!("chapters persisted: {}", report.chapters_persisted);
    println!("entities created:   {}", report.entities_created);
    println!("alerts created:     {}", report.alerts_created);
    println!("alerts resolved:    {}", report.alerts_resolved);
    println!("identity verdict:   {}", report.identity_verdict.unwrap_or_default());
    if let Some(snapshot_id) = report.snapshot_id {
        println!("snapshot:           {snapshot_id}");
    }

    Ok(())
}

async fn find_or_create_project<R: ProjectRepository>(repo: &R, name: &str) -> Result<uuid::Uuid> {
    if let Some(existing) = repo.list_projects().await?.into_iter().find(|p| p.name == name) {
        return Ok(existing.id);
    }
    let project = Project { id: uuid::Uuid::new_v4(), name: name.to_string(), created_at: chrono::Utc::now(), last_analyzed_at: None };
    Ok(repo.create_project(project).await?)
}
