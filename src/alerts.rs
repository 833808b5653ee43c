// =============================================================================
// Alert Records — immutable cooling alerts with dispatch outcome
// =============================================================================
//
// Records are created only by the alert scanner, in a single all-or-nothing
// batch per run: if any record in the batch fails validation, nothing is
// inserted and the run reports failure, so a retry next cycle starts from a
// clean slate. After creation the only permitted mutation is recording the
// notification dispatch outcome.
// =============================================================================

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::contacts::Contact;
use crate::types::WatchStatus;
use crate::warmth::WarmthBand;

/// Maximum alert records retained in memory (oldest evicted first).
const MAX_ALERT_RECORDS: usize = 10_000;

/// Why an alert was raised. Single variant today; the enum keeps the wire
/// shape stable if edge-triggered alerts are ever added alongside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    DroppedBelow,
}

/// A cooling alert for one contact, captured at scan time.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub id: String,
    pub user_id: String,
    pub contact_id: String,
    pub alert_type: AlertType,
    /// Warmth score at the moment the alert fired.
    pub warmth_at_alert: u8,
    /// The per-contact threshold that was crossed.
    pub warmth_threshold: u8,
    pub days_since_interaction: Option<i64>,
    /// Contextual metadata frozen at alert time.
    pub contact_name: String,
    pub watch_status: WatchStatus,
    pub band: WarmthBand,
    pub created_at: DateTime<Utc>,
    /// Dispatch outcome — aggregate over the user's devices.
    pub notification_sent: bool,
    pub notification_error: Option<String>,
    pub notification_sent_at: Option<DateTime<Utc>>,
}

impl AlertRecord {
    /// Build a record for a qualifying contact at scan time.
    pub fn for_contact(
        contact: &Contact,
        score: u8,
        band: WarmthBand,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: contact.user_id.clone(),
            contact_id: contact.id.clone(),
            alert_type: AlertType::DroppedBelow,
            warmth_at_alert: score,
            warmth_threshold: contact.alert_threshold,
            days_since_interaction: contact.days_since_interaction(now),
            contact_name: contact.display_name.clone(),
            watch_status: contact.watch_status,
            band,
            created_at: now,
            notification_sent: false,
            notification_error: None,
            notification_sent_at: None,
        }
    }
}

// =============================================================================
// Alert Store
// =============================================================================

/// Thread-safe store of alert records.
pub struct AlertStore {
    records: RwLock<Vec<AlertRecord>>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Insert a batch of freshly built records.
    ///
    /// All-or-nothing: the batch is validated in full before anything is
    /// appended, so a failed run leaves no partial state behind.
    pub fn insert_batch(&self, batch: Vec<AlertRecord>) -> Result<Vec<AlertRecord>> {
        let mut records = self.records.write();

        let mut seen = std::collections::HashSet::new();
        for record in &batch {
            if record.user_id.is_empty() || record.contact_id.is_empty() {
                bail!("alert record {} is missing owner references", record.id);
            }
            if !seen.insert(record.id.clone()) {
                bail!("duplicate alert id {} in batch", record.id);
            }
            if records.iter().any(|r| r.id == record.id) {
                bail!("alert id {} already exists", record.id);
            }
        }

        records.extend(batch.iter().cloned());
        while records.len() > MAX_ALERT_RECORDS {
            records.remove(0);
        }

        info!(count = batch.len(), "alert records inserted");
        Ok(batch)
    }

    /// Record the aggregate notification outcome for one alert.
    ///
    /// `sent` wins over any earlier error; when all sends failed, the most
    /// recent error message is retained.
    pub fn record_outcome(
        &self,
        alert_id: &str,
        sent: bool,
        error: Option<String>,
        at: DateTime<Utc>,
    ) {
        let mut records = self.records.write();
        if let Some(record) = records.iter_mut().find(|r| r.id == alert_id) {
            record.notification_sent = sent;
            record.notification_error = error;
            record.notification_sent_at = if sent { Some(at) } else { None };
            debug!(alert_id, sent, "alert dispatch outcome recorded");
        }
    }

    pub fn get(&self, alert_id: &str) -> Option<AlertRecord> {
        self.records.read().iter().find(|r| r.id == alert_id).cloned()
    }

    /// Most recent alerts, optionally filtered by user, newest first.
    pub fn recent(&self, user_id: Option<&str>, limit: usize) -> Vec<AlertRecord> {
        self.records
            .read()
            .iter()
            .rev()
            .filter(|r| user_id.map_or(true, |u| r.user_id == u))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.records.read().len()
    }
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DecayMode;

    fn record(id: &str, user: &str) -> AlertRecord {
        AlertRecord {
            id: id.to_string(),
            user_id: user.to_string(),
            contact_id: "c1".to_string(),
            alert_type: AlertType::DroppedBelow,
            warmth_at_alert: 25,
            warmth_threshold: 40,
            days_since_interaction: Some(12),
            contact_name: "Ada".to_string(),
            watch_status: WatchStatus::Vip,
            band: WarmthBand::Cold,
            created_at: Utc::now(),
            notification_sent: false,
            notification_error: None,
            notification_sent_at: None,
        }
    }

    #[test]
    fn batch_insert_appends_all() {
        let store = AlertStore::new();
        store
            .insert_batch(vec![record("a1", "u1"), record("a2", "u2")])
            .unwrap();
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn duplicate_id_fails_whole_batch() {
        let store = AlertStore::new();
        let result = store.insert_batch(vec![record("a1", "u1"), record("a1", "u1")]);
        assert!(result.is_err());
        assert_eq!(store.count(), 0, "partial batch must not be inserted");
    }

    #[test]
    fn missing_owner_fails_whole_batch() {
        let store = AlertStore::new();
        let result = store.insert_batch(vec![record("a1", "u1"), record("a2", "")]);
        assert!(result.is_err());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn outcome_recorded_on_the_right_record() {
        let store = AlertStore::new();
        store
            .insert_batch(vec![record("a1", "u1"), record("a2", "u1")])
            .unwrap();

        let at = Utc::now();
        store.record_outcome("a2", true, None, at);

        let a2 = store.get("a2").unwrap();
        assert!(a2.notification_sent);
        assert_eq!(a2.notification_sent_at, Some(at));
        assert!(a2.notification_error.is_none());

        let a1 = store.get("a1").unwrap();
        assert!(!a1.notification_sent);
    }

    #[test]
    fn failed_dispatch_keeps_error_without_sent_at() {
        let store = AlertStore::new();
        store.insert_batch(vec![record("a1", "u1")]).unwrap();
        store.record_outcome("a1", false, Some("gateway 503".to_string()), Utc::now());

        let a1 = store.get("a1").unwrap();
        assert!(!a1.notification_sent);
        assert_eq!(a1.notification_error.as_deref(), Some("gateway 503"));
        assert!(a1.notification_sent_at.is_none());
    }

    #[test]
    fn recent_filters_by_user_newest_first() {
        let store = AlertStore::new();
        store
            .insert_batch(vec![record("a1", "u1"), record("a2", "u2"), record("a3", "u1")])
            .unwrap();

        let u1 = store.recent(Some("u1"), 10);
        assert_eq!(
            u1.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["a3", "a1"]
        );
        assert_eq!(store.recent(None, 2).len(), 2);
    }

    #[test]
    fn for_contact_freezes_scan_context() {
        let contacts = crate::contacts::ContactStore::new();
        let now = Utc::now();
        let c = contacts.create(
            "u1",
            "Grace",
            DecayMode::Fast,
            WatchStatus::Important,
            45,
            10.0,
            now,
        );
        let record = AlertRecord::for_contact(&c, 33, WarmthBand::Cool, now);
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.contact_name, "Grace");
        assert_eq!(record.warmth_threshold, 45);
        assert_eq!(record.warmth_at_alert, 33);
        assert_eq!(record.band, WarmthBand::Cool);
        assert!(record.days_since_interaction.is_none());
    }
}
