//! Configuration types for the manuscript analysis engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level settings, loaded as defaults → config file → env overrides by
/// the binary crates (`manuscript-cli`, `manuscript-api`).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub voting: VotingSettings,
    pub scheduler: SchedulerSettings,
    pub speech_change: SpeechChangeSettings,
    pub snapshot: SnapshotSettings,
    pub identity: IdentitySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            voting: VotingSettings::default(),
            scheduler: SchedulerSettings::default(),
            speech_change: SpeechChangeSettings::default(),
            snapshot: SnapshotSettings::default(),
            identity: IdentitySettings::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite:manuscript.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Method weights for the weighted voter (§4.4), keyed by method name so
/// new scoring methods can be added without breaking deserialization.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VotingSettings {
    pub method_weights: HashMap<String, f64>,
    pub max_antecedent_sentence_distance: i64,
    pub use_chapter_boundaries: bool,
}

impl Default for VotingSettings {
    fn default() -> Self {
        let mut method_weights = HashMap::new();
        method_weights.insert("embeddings".to_string(), 0.30);
        method_weights.insert("llm".to_string(), 0.35);
        method_weights.insert("morphology".to_string(), 0.20);
        method_weights.insert("heuristics".to_string(), 0.15);
        method_weights.insert("pro_drop_saliency".to_string(), 0.25);
        Self {
            method_weights,
            max_antecedent_sentence_distance: 3,
            use_chapter_boundaries: true,
        }
    }
}

/// Capability-tier driven scheduler bounds (§4.1, §5).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SchedulerSettings {
    pub heavy_task_timeout_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            heavy_task_timeout_secs: 600,
        }
    }
}

/// Speech-change detector thresholds (§4.7), ported from the original
/// `METRIC_THRESHOLDS` / `DISCRETE_METRICS` tables.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpeechChangeSettings {
    pub window_size_chapters: usize,
    pub window_overlap_chapters: usize,
    pub min_window_words: usize,
    pub min_significant_metrics: usize,
    pub significance_p_value: f64,
}

impl Default for SpeechChangeSettings {
    fn default() -> Self {
        Self {
            window_size_chapters: 3,
            window_overlap_chapters: 1,
            min_window_words: 200,
            min_significant_metrics: 2,
            significance_p_value: 0.05,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SnapshotSettings {
    pub retain_newest: usize,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self { retain_newest: 10 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IdentitySettings {
    pub uncertain_window_days: i64,
    pub uncertain_budget: u32,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            uncertain_window_days: 30,
            uncertain_budget: 3,
        }
    }
}
