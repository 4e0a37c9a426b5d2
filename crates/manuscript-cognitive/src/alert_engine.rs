//! Alert submission (`spec.md` §4 "Alert Engine").
//!
//! The `min_severity` floor filters at alert **creation**, not display: an
//! alert scored below the configured floor is never persisted, which keeps
//! the alerts table from accumulating rows nobody will ever see. The
//! unique-on-open constraint itself lives in the repository implementation
//! (`AlertRepository::submit_alert` returns `None` on a same-content-hash
//! open duplicate); this engine is just the policy layer in front of it.

use manuscript_core::alert::{AlertSeverity, NewAlert};
use manuscript_core::repository::AlertRepository;
use manuscript_types::Result;
use uuid::Uuid;

fn severity_rank(severity: AlertSeverity) -> u8 {
    match severity {
        AlertSeverity::Info => 0,
        AlertSeverity::Warning => 1,
        AlertSeverity::Critical => 2,
    }
}

pub struct AlertEngine {
    min_severity: AlertSeverity,
}

impl AlertEngine {
    pub fn new(min_severity: AlertSeverity) -> Self {
        Self { min_severity }
    }

    /// Submit one alert, returning its id unless it was filtered by the
    /// severity floor or deduplicated as an open-alert repeat.
    pub async fn submit<R: AlertRepository>(&self, repo: &R, alert: NewAlert) -> Result<Option<Uuid>> {
        if severity_rank(alert.severity) < severity_rank(self.min_severity) {
            return Ok(None);
        }
        repo.submit_alert(alert.into_alert()).await
    }

    /// Submit a batch, returning only the ids that were actually persisted.
    pub async fn submit_many<R: AlertRepository>(&self, repo: &R, alerts: Vec<NewAlert>) -> Result<Vec<Uuid>> {
        let mut ids = Vec::with_capacity(alerts.len());
        for alert in alerts {
            if let Some(id) = self.submit(repo, alert).await? {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use manuscript_core::alert::{Alert, AlertStatus, ResolutionReason};
    use std::sync::Mutex;

    struct FakeAlertRepo {
        open: Mutex<Vec<Alert>>,
    }

    #[async_trait]
    #[allow(async_fn_in_trait)]
    impl AlertRepository for FakeAlertRepo {
        async fn submit_alert(&self, alert: Alert) -> Result<Option<Uuid>> {
            let mut open = self.open.lock().unwrap();
            if open.iter().any(|a| a.content_hash == alert.content_hash && a.status.is_open()) {
                return Ok(None);
            }
            let id = alert.id;
            open.push(alert);
            Ok(Some(id))
        }
        async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>> {
            Ok(self.open.lock().unwrap().iter().find(|a| a.id == id).cloned())
        }
        async fn list_alerts(&self, _project_id: Uuid) -> Result<Vec<Alert>> {
            Ok(self.open.lock().unwrap().clone())
        }
        async fn list_open_alerts(&self, _project_id: Uuid) -> Result<Vec<Alert>> {
            Ok(self.open.lock().unwrap().iter().filter(|a| a.status.is_open()).cloned().collect())
        }
        async fn update_alert_status(&self, _id: Uuid, _status: AlertStatus) -> Result<()> {
            Ok(())
        }
        async fn resolve_alert(&self, _id: Uuid, _reason: ResolutionReason) -> Result<()> {
            Ok(())
        }
        async fn link_to_previous(&self, _new_id: Uuid, _previous_id: Uuid, _match_confidence: f64) -> Result<()> {
            Ok(())
        }
    }

    fn sample_alert(severity: AlertSeverity, excerpt: &str) -> NewAlert {
        NewAlert {
            project_id: Uuid::nil(),
            category: "style".to_string(),
            alert_type: "test".to_string(),
            severity,
            title: "t".to_string(),
            description: "d".to_string(),
            explanation: "e".to_string(),
            suggestion: "s".to_string(),
            excerpt: excerpt.to_string(),
            chapter: Some(1),
            start_char: Some(10),
            end_char: Some(20),
            confidence: 0.5,
            related_entity_ids: vec![],
            extra_data: serde_json::json!({}),
            key_fields: vec![],
        }
    }

    #[tokio::test]
    async fn alert_below_floor_is_not_persisted() {
        let repo = FakeAlertRepo { open: Mutex::new(Vec::new()) };
        let engine = AlertEngine::new(AlertSeverity::Warning);
        let result = engine.submit(&repo, sample_alert(AlertSeverity::Info, "x")).await.unwrap();
        assert!(result.is_none());
        assert!(repo.open.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_content_hash_is_deduplicated() {
        let repo = FakeAlertRepo { open: Mutex::new(Vec::new()) };
        let engine = AlertEngine::new(AlertSeverity::Info);
        let first = engine.submit(&repo, sample_alert(AlertSeverity::Warning, "same excerpt")).await.unwrap();
        let second = engine.submit(&repo, sample_alert(AlertSeverity::Warning, "same excerpt")).await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
    }
}
