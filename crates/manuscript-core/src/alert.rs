//! Alert domain types and content-hash identity
//! (`spec.md` §3 "Alert", §4.9 "Alert Engine").

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

impl AlertSeverity {
    /// One step down, used by the contextual mitigation pass
    /// (`spec.md` §4.7: "if a high-impact event is found, the alert
    /// severity is reduced one step").
    pub fn step_down(self) -> Self {
        match self {
            AlertSeverity::Critical => AlertSeverity::Warning,
            AlertSeverity::Warning => AlertSeverity::Info,
            AlertSeverity::Info => AlertSeverity::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertStatus {
    New,
    Open,
    Acknowledged,
    InProgress,
    Resolved,
}

impl AlertStatus {
    pub fn is_open(self) -> bool {
        matches!(
            self,
            AlertStatus::New | AlertStatus::Open | AlertStatus::Acknowledged | AlertStatus::InProgress
        )
    }
}

/// Why an alert disappeared between runs (`spec.md` GLOSSARY "Resolution
/// reason"). The empty string in the original schema maps to `None` here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionReason {
    TextChanged,
    DetectorImproved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub project_id: Uuid,
    pub category: String,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub title: String,
    pub description: String,
    pub explanation: String,
    pub suggestion: String,
    pub excerpt: String,
    pub chapter: Option<i64>,
    pub start_char: Option<usize>,
    pub end_char: Option<usize>,
    pub confidence: f64,
    pub content_hash: String,
    pub related_entity_ids: Vec<Uuid>,
    pub extra_data: serde_json::Value,
    pub previous_snapshot_alert_id: Option<Uuid>,
    pub match_confidence: Option<f64>,
    pub resolution_reason: Option<ResolutionReason>,
}

/// Collapse runs of whitespace to single spaces and trim, so that
/// formatting-only text differences don't change an alert's identity.
fn normalize_excerpt(excerpt: &str) -> String {
    excerpt.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Quantize a character position to a bucket so small position drift across
/// runs (e.g. a prior paragraph gained one whitespace char) doesn't change
/// identity for position-sensitive alert types.
fn quantize_position(pos: usize, bucket: usize) -> usize {
    if bucket == 0 {
        return pos;
    }
    (pos / bucket) * bucket
}

/// Alert categories whose identity should be position-quantized rather than
/// exact (structural/style findings drift a few characters across minor
/// edits elsewhere in the chapter; entity/temporal ones should not).
const POSITION_QUANTIZED_CATEGORIES: &[&str] = &["style", "structure", "pacing"];

/// Compute the stable content hash documented in `spec.md` §4.9: a function
/// of alert type, chapter, normalized excerpt (with position quantization
/// for type-appropriate categories), and category-specific key fields.
pub fn compute_content_hash(
    alert_type: &str,
    category: &str,
    chapter: Option<i64>,
    excerpt: &str,
    start_char: Option<usize>,
    key_fields: &[&str],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(alert_type.as_bytes());
    hasher.update(b"|");
    hasher.update(category.as_bytes());
    hasher.update(b"|");
    if let Some(ch) = chapter {
        hasher.update(ch.to_string().as_bytes());
    }
    hasher.update(b"|");
    hasher.update(normalize_excerpt(excerpt).as_bytes());
    hasher.update(b"|");
    if POSITION_QUANTIZED_CATEGORIES.contains(&category) {
        if let Some(start) = start_char {
            hasher.update(quantize_position(start, 50).to_string().as_bytes());
        }
    } else if let Some(start) = start_char {
        hasher.update(start.to_string().as_bytes());
    }
    for field in key_fields {
        hasher.update(b"|");
        hasher.update(field.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub project_id: Uuid,
    pub category: String,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
    pub explanation: String,
    pub suggestion: String,
    pub excerpt: String,
    pub chapter: Option<i64>,
    pub start_char: Option<usize>,
    pub end_char: Option<usize>,
    pub confidence: f64,
    pub related_entity_ids: Vec<Uuid>,
    pub extra_data: serde_json::Value,
    pub key_fields: Vec<String>,
}

impl NewAlert {
    pub fn into_alert(self) -> Alert {
        let key_fields: Vec<&str> = self.key_fields.iter().map(|s| s.as_str()).collect();
        let content_hash = compute_content_hash(
            &self.alert_type,
            &self.category,
            self.chapter,
            &self.excerpt,
            self.start_char,
            &key_fields,
        );
        Alert {
            id: Uuid::new_v4(),
            project_id: self.project_id,
            category: self.category,
            alert_type: self.alert_type,
            severity: self.severity,
            status: AlertStatus::New,
            title: self.title,
            description: self.description,
            explanation: self.explanation,
            suggestion: self.suggestion,
            excerpt: self.excerpt,
            chapter: self.chapter,
            start_char: self.start_char,
            end_char: self.end_char,
            confidence: self.confidence,
            content_hash,
            related_entity_ids: self.related_entity_ids,
            extra_data: self.extra_data,
            previous_snapshot_alert_id: None,
            match_confidence: None,
            resolution_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn base_alert(excerpt: &str) -> NewAlert {
        NewAlert {
            project_id: Uuid::nil(),
            category: "grammar".to_string(),
            alert_type: "agreement_error".to_string(),
            severity: AlertSeverity::Warning,
            title: "t".to_string(),
            description: "d".to_string(),
            explanation: "e".to_string(),
            suggestion: "s".to_string(),
            excerpt: excerpt.to_string(),
            chapter: Some(3),
            start_char: Some(1200),
            end_char: Some(1260),
            confidence: 0.8,
            related_entity_ids: vec![],
            extra_data: serde_json::json!({}),
            key_fields: vec![],
        }
    }

    #[test]
    fn equal_inputs_produce_equal_hash() {
        let a = base_alert("la noche oscuro").into_alert();
        let b = base_alert("la noche oscuro").into_alert();
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn differing_excerpt_changes_hash() {
        let a = base_alert("la noche oscuro").into_alert();
        let b = base_alert("la mañana clara").into_alert();
        assert_ne!(a.content_hash, b.content_hash);
    }

    #[test]
    fn whitespace_only_difference_does_not_change_hash() {
        let a = base_alert("la  noche   oscuro").into_alert();
        let b = base_alert("la noche oscuro").into_alert();
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn severity_steps_down_once_then_floors_at_info() {
        assert_eq!(AlertSeverity::Critical.step_down(), AlertSeverity::Warning);
        assert_eq!(AlertSeverity::Warning.step_down(), AlertSeverity::Info);
        assert_eq!(AlertSeverity::Info.step_down(), AlertSeverity::Info);
    }
}
