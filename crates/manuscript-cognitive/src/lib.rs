//! Manuscript Cognitive Pipeline
//!
//! The analysis stages that sit between raw chapter text and the persisted
//! knowledge graph:
//! - Coreference resolution (weighted multi-method voting)
//! - Entity canonicalization, merge and undo
//! - Attribute extraction and speech attribution
//! - Voice profiling and speech-change detection
//! - Temporal timeline stitching
//! - Style/structure analyzers
//! - Alert submission and snapshot comparison
//! - Document identity gating
//! - Top-level orchestration of all of the above

pub mod alert_engine;
pub mod attribute_extractor;
pub mod coref_resolver;
pub mod entity_service;
pub mod identity_service;
pub mod orchestrator;
pub mod snapshot_service;
pub mod speech_attribution;
pub mod speech_change_service;
pub mod style_structure;
pub mod temporal_service;
pub mod voice_profiler;

pub use alert_engine::AlertEngine;
pub use coref_resolver::{ChapterResolution, ResolutionCapabilities};
pub use entity_service::{entity_from_chain, merge_entities, undo_merge};
pub use identity_service::{check_identity, IdentityCheck};
pub use orchestrator::{AnalysisPipeline, AnalysisReport, InputChapter, ProgressTracker, Repositories, StageName};
pub use snapshot_service::{diff_alerts, diff_entities, AlertDiffReport, ComparableAlert, EntityDiffReport};
pub use voice_profiler::VoiceProfiler;
