//! Top-level analysis orchestration: project-scoped run locking
//! (`progress`) plus the linear stage pipeline (`pipeline`) that ties every
//! other module in this crate together for one end-to-end manuscript run.

pub mod pipeline;
pub mod progress;

pub use pipeline::{AnalysisPipeline, AnalysisReport, InputChapter, Repositories};
pub use progress::{ProgressTracker, StageName};
