//! The alert log: creation, acknowledge/resolve, persistence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::storage::{decode_versioned, encode_versioned, KeyValueStore, KEY_ALERT_LOG};

use super::rules::Severity;

/// Schema version of the persisted alert log.
pub const ALERT_LOG_VERSION: u32 = 1;

/// A raised alert.
///
/// State transitions only via explicit [`AlertLog::acknowledge`] and
/// [`AlertLog::resolve`] — nothing resolves automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert id.
    pub id: String,
    /// Rule that raised it.
    pub rule_id: String,
    /// When it was raised.
    pub at: DateTime<Utc>,
    /// Severity inherited from the rule.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Structured payload (signal values, budget ratios).
    pub payload: serde_json::Value,
    /// Acknowledged by an operator.
    pub acknowledged: bool,
    /// Resolved by an operator.
    pub resolved: bool,
}

/// Errors from alert state transitions.
#[derive(Debug, Error, PartialEq)]
pub enum AlertLogError {
    /// No alert with that id exists.
    #[error("alert '{0}' not found")]
    NotFound(String),
}

/// Append-only alert store with explicit state transitions.
pub struct AlertLog {
    alerts: Mutex<Vec<Alert>>,
    next_id: AtomicU64,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl AlertLog {
    /// Create an empty, unpersisted log.
    pub fn new() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            store: None,
        }
    }

    /// Attach a persistence store.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Restore persisted alerts; a version mismatch starts empty.
    pub async fn load_persisted(&self) {
        let Some(store) = &self.store else { return };
        let raw = match store.get(KEY_ALERT_LOG).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                debug!(error = %e, "Could not read persisted alerts");
                return;
            }
        };

        if let Some(persisted) = decode_versioned::<Vec<Alert>>(&raw, ALERT_LOG_VERSION) {
            let next = persisted.len() as u64 + 1;
            *self.alerts.lock() = persisted;
            self.next_id.store(next, Ordering::SeqCst);
        }
    }

    /// Create and persist a new alert.
    pub fn record(
        &self,
        rule_id: &str,
        severity: Severity,
        message: String,
        payload: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Alert {
        let id = format!("alert-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let alert = Alert {
            id,
            rule_id: rule_id.to_string(),
            at,
            severity,
            message,
            payload,
            acknowledged: false,
            resolved: false,
        };
        self.alerts.lock().push(alert.clone());
        self.persist_async();
        alert
    }

    /// Mark an alert acknowledged.
    pub fn acknowledge(&self, id: &str) -> Result<(), AlertLogError> {
        self.transition(id, |alert| alert.acknowledged = true)
    }

    /// Mark an alert resolved.
    pub fn resolve(&self, id: &str) -> Result<(), AlertLogError> {
        self.transition(id, |alert| alert.resolved = true)
    }

    fn transition(
        &self,
        id: &str,
        update: impl FnOnce(&mut Alert),
    ) -> Result<(), AlertLogError> {
        {
            let mut alerts = self.alerts.lock();
            let alert = alerts
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| AlertLogError::NotFound(id.to_string()))?;
            update(alert);
        }
        self.persist_async();
        Ok(())
    }

    /// Snapshot of every alert.
    pub fn all(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    /// Snapshot of unresolved alerts.
    pub fn unresolved(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .iter()
            .filter(|a| !a.resolved)
            .cloned()
            .collect()
    }

    /// Number of recorded alerts.
    pub fn len(&self) -> usize {
        self.alerts.lock().len()
    }

    /// Whether no alert has been recorded.
    pub fn is_empty(&self) -> bool {
        self.alerts.lock().is_empty()
    }

    fn persist_async(&self) {
        let Some(store) = &self.store else { return };
        let Some(encoded) = encode_versioned(ALERT_LOG_VERSION, &*self.alerts.lock()) else {
            return;
        };
        let store = Arc::clone(store);
        tokio::spawn(async move {
            if let Err(e) = store.set(KEY_ALERT_LOG, encoded).await {
                debug!(error = %e, "Best-effort alert persistence failed");
            }
        });
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn record_one(log: &AlertLog) -> Alert {
        log.record(
            "rule-1",
            Severity::Warning,
            "LCP regressed".to_string(),
            serde_json::json!({"percent": 25.0}),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_record_assigns_sequential_ids() {
        let log = AlertLog::new();
        let a = record_one(&log);
        let b = record_one(&log);

        assert_eq!(a.id, "alert-1");
        assert_eq!(b.id, "alert-2");
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_acknowledge_and_resolve_are_explicit() {
        let log = AlertLog::new();
        let alert = record_one(&log);

        assert!(!log.all()[0].acknowledged);
        log.acknowledge(&alert.id).unwrap();
        assert!(log.all()[0].acknowledged);
        assert!(!log.all()[0].resolved);

        log.resolve(&alert.id).unwrap();
        assert!(log.all()[0].resolved);
        assert!(log.unresolved().is_empty());
    }

    #[tokio::test]
    async fn test_transition_unknown_id() {
        let log = AlertLog::new();
        assert_eq!(
            log.acknowledge("alert-404"),
            Err(AlertLogError::NotFound("alert-404".to_string()))
        );
    }

    #[tokio::test]
    async fn test_persistence_roundtrip() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let log = AlertLog::new().with_store(Arc::clone(&store));
        record_one(&log);
        tokio::task::yield_now().await;

        let restored = AlertLog::new().with_store(store);
        restored.load_persisted().await;

        assert_eq!(restored.len(), 1);
        assert_eq!(restored.all()[0].rule_id, "rule-1");

        // New ids continue after the restored ones.
        let next = record_one(&restored);
        assert_eq!(next.id, "alert-2");
    }
}
