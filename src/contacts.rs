// =============================================================================
// Contact Store — tracked relationships and their warmth state
// =============================================================================
//
// Owns the Contact records and the only write path for the amplitude /
// last-interaction pair. `apply_interaction` performs the whole
// decay-then-impulse update as a single read-modify-write under the store's
// write lock, with a per-contact version counter bumped on every mutation, so
// two interactions recorded concurrently for the same contact cannot lose an
// update.
//
// The displayed score is never stored here: it is derived on read from
// (amplitude, last_interaction_at, decay_mode) via the decay model.
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{DecayMode, InteractionKind, WatchStatus};
use crate::warmth::{apply_impulse, score};

/// Milliseconds per day, for fractional elapsed-day arithmetic.
const MS_PER_DAY: f64 = 86_400_000.0;

/// Maximum number of recent interactions retained for the audit ring.
const MAX_RECENT_INTERACTIONS: usize = 200;

/// A tracked relationship.
#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Owning user.
    pub user_id: String,
    pub display_name: String,
    /// Decaying interaction energy. Never negative; not the displayed score.
    pub amplitude: f64,
    /// Anchor timestamp the stored amplitude decays from.
    pub last_interaction_at: Option<DateTime<Utc>>,
    pub decay_mode: DecayMode,
    pub watch_status: WatchStatus,
    /// Score below which the scanner raises an alert (0–100).
    pub alert_threshold: u8,
    /// Cooldown anchor — set when an alert record is created, not delivered.
    pub last_alert_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Bumped on every write; readers can detect concurrent modification.
    pub version: u64,
}

impl Contact {
    /// Fractional days between the amplitude anchor and `now`. Zero when the
    /// contact has never interacted or the anchor is in the future.
    pub fn days_elapsed(&self, now: DateTime<Utc>) -> f64 {
        match self.last_interaction_at {
            Some(at) => ((now - at).num_milliseconds() as f64 / MS_PER_DAY).max(0.0),
            None => 0.0,
        }
    }

    /// Present-moment warmth score. Pure derivation — repeated calls with the
    /// same `now` always agree and nothing is written back.
    pub fn score_at(&self, now: DateTime<Utc>) -> u8 {
        score(self.amplitude, self.days_elapsed(now), self.decay_mode)
    }

    /// Amplitude decayed to `now`, without rounding or the base offset.
    pub fn amplitude_at(&self, now: DateTime<Utc>) -> f64 {
        self.amplitude * (-self.decay_mode.lambda() * self.days_elapsed(now)).exp()
    }

    /// Whole days since the last interaction, for display and alert metadata.
    pub fn days_since_interaction(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_interaction_at
            .map(|at| (now - at).num_days().max(0))
    }

    /// A contact with no interaction history has no score baseline and is
    /// skipped by the alert scanner.
    pub fn has_baseline(&self) -> bool {
        self.last_interaction_at.is_some()
    }
}

/// An interaction event folded into a contact's amplitude. Append-only.
#[derive(Debug, Clone, Serialize)]
pub struct Interaction {
    pub id: String,
    pub contact_id: String,
    pub user_id: String,
    pub kind: InteractionKind,
    pub occurred_at: DateTime<Utc>,
}

/// Mutable profile fields accepted by `update_profile`.
#[derive(Debug, Default)]
pub struct ContactUpdate {
    pub display_name: Option<String>,
    pub decay_mode: Option<DecayMode>,
    pub watch_status: Option<WatchStatus>,
    pub alert_threshold: Option<u8>,
}

// =============================================================================
// Contact Store
// =============================================================================

/// Thread-safe owner of all contact records.
pub struct ContactStore {
    contacts: RwLock<HashMap<String, Contact>>,
    recent_interactions: RwLock<Vec<Interaction>>,
}

impl ContactStore {
    pub fn new() -> Self {
        Self {
            contacts: RwLock::new(HashMap::new()),
            recent_interactions: RwLock::new(Vec::new()),
        }
    }

    // -------------------------------------------------------------------------
    // Creation / profile
    // -------------------------------------------------------------------------

    /// Create a new contact and return a snapshot of it.
    ///
    /// `initial_amplitude` comes from the owner's warmth settings
    /// (`default_amplitude`); there is no interaction anchor yet, so the
    /// contact has no baseline until the first interaction lands.
    pub fn create(
        &self,
        user_id: &str,
        display_name: &str,
        decay_mode: DecayMode,
        watch_status: WatchStatus,
        alert_threshold: u8,
        initial_amplitude: f64,
        now: DateTime<Utc>,
    ) -> Contact {
        let contact = Contact {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            amplitude: initial_amplitude.clamp(0.0, 100.0),
            last_interaction_at: None,
            decay_mode,
            watch_status,
            alert_threshold,
            last_alert_sent_at: None,
            created_at: now,
            version: 1,
        };

        info!(
            contact_id = %contact.id,
            user_id,
            display_name,
            decay_mode = %decay_mode,
            watch_status = %watch_status,
            "contact created"
        );

        self.contacts
            .write()
            .insert(contact.id.clone(), contact.clone());
        contact
    }

    pub fn get(&self, id: &str) -> Option<Contact> {
        self.contacts.read().get(id).cloned()
    }

    pub fn list_for_user(&self, user_id: &str) -> Vec<Contact> {
        let mut out: Vec<Contact> = self
            .contacts
            .read()
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        out
    }

    /// Apply partial profile updates. Returns the updated snapshot, or `None`
    /// when the contact does not exist.
    pub fn update_profile(&self, id: &str, update: ContactUpdate) -> Option<Contact> {
        let mut contacts = self.contacts.write();
        let contact = contacts.get_mut(id)?;

        if let Some(name) = update.display_name {
            contact.display_name = name;
        }
        if let Some(mode) = update.decay_mode {
            contact.decay_mode = mode;
        }
        if let Some(status) = update.watch_status {
            contact.watch_status = status;
        }
        if let Some(threshold) = update.alert_threshold {
            contact.alert_threshold = threshold.min(100);
        }
        contact.version += 1;

        debug!(contact_id = %id, version = contact.version, "contact profile updated");
        Some(contact.clone())
    }

    // -------------------------------------------------------------------------
    // Interaction write path
    // -------------------------------------------------------------------------

    /// Fold an interaction into the contact's amplitude.
    ///
    /// This is the only place amplitude and `last_interaction_at` are written:
    /// decay-to-event, add impulse, clamp, advance the anchor — all under one
    /// write-lock guard so concurrent interactions serialise cleanly.
    pub fn apply_interaction(
        &self,
        contact_id: &str,
        kind: InteractionKind,
        occurred_at: DateTime<Utc>,
    ) -> Option<Contact> {
        let snapshot = {
            let mut contacts = self.contacts.write();
            let contact = contacts.get_mut(contact_id)?;

            let days_since_update = match contact.last_interaction_at {
                Some(at) => ((occurred_at - at).num_milliseconds() as f64 / MS_PER_DAY).max(0.0),
                None => 0.0,
            };

            contact.amplitude = apply_impulse(
                contact.amplitude,
                days_since_update,
                kind,
                contact.decay_mode,
            );
            contact.last_interaction_at = Some(occurred_at);
            contact.version += 1;

            debug!(
                contact_id,
                kind = %kind,
                amplitude = format!("{:.2}", contact.amplitude),
                version = contact.version,
                "interaction applied"
            );
            contact.clone()
        };

        let interaction = Interaction {
            id: Uuid::new_v4().to_string(),
            contact_id: contact_id.to_string(),
            user_id: snapshot.user_id.clone(),
            kind,
            occurred_at,
        };
        let mut ring = self.recent_interactions.write();
        ring.push(interaction);
        while ring.len() > MAX_RECENT_INTERACTIONS {
            ring.remove(0);
        }

        Some(snapshot)
    }

    // -------------------------------------------------------------------------
    // Scanner queries
    // -------------------------------------------------------------------------

    /// Snapshot of every contact eligible for alert scanning.
    pub fn watched_snapshot(&self) -> Vec<Contact> {
        self.contacts
            .read()
            .values()
            .filter(|c| c.watch_status.is_watched())
            .cloned()
            .collect()
    }

    /// Record that an alert was created for each contact — the cooldown
    /// anchor. Driven by alert creation, never by delivery outcome.
    pub fn mark_alerted(&self, contact_ids: &[String], now: DateTime<Utc>) {
        let mut contacts = self.contacts.write();
        for id in contact_ids {
            if let Some(contact) = contacts.get_mut(id) {
                contact.last_alert_sent_at = Some(now);
                contact.version += 1;
            }
        }
    }

    pub fn recent_interactions(&self, limit: usize) -> Vec<Interaction> {
        let ring = self.recent_interactions.read();
        ring.iter().rev().take(limit).cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.contacts.read().len()
    }
}

impl Default for ContactStore {
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
    use chrono::Duration;

    fn store_with_contact(watch: WatchStatus) -> (ContactStore, Contact) {
        let store = ContactStore::new();
        let contact = store.create(
            "u1",
            "Ada Lovelace",
            DecayMode::Medium,
            watch,
            30,
            30.0,
            Utc::now(),
        );
        (store, contact)
    }

    #[test]
    fn new_contact_has_no_baseline() {
        let (_store, contact) = store_with_contact(WatchStatus::Watch);
        assert!(!contact.has_baseline());
        assert!(contact.days_since_interaction(Utc::now()).is_none());
        // Fresh default amplitude 30 displays as 30 + 30 = 60.
        assert_eq!(contact.score_at(Utc::now()), 60);
    }

    #[test]
    fn apply_interaction_advances_anchor_and_version() {
        let (store, contact) = store_with_contact(WatchStatus::Watch);
        let at = Utc::now();

        let updated = store
            .apply_interaction(&contact.id, InteractionKind::Meeting, at)
            .unwrap();
        assert_eq!(updated.last_interaction_at, Some(at));
        assert_eq!(updated.version, contact.version + 1);
        assert!((updated.amplitude - 39.0).abs() < 1e-9);
    }

    #[test]
    fn interaction_on_unknown_contact_is_none() {
        let store = ContactStore::new();
        assert!(store
            .apply_interaction("missing", InteractionKind::Call, Utc::now())
            .is_none());
    }

    #[test]
    fn score_read_never_mutates() {
        let (store, contact) = store_with_contact(WatchStatus::Watch);
        let at = Utc::now();
        store
            .apply_interaction(&contact.id, InteractionKind::Call, at)
            .unwrap();

        let later = at + Duration::days(10);
        let before = store.get(&contact.id).unwrap();
        let s1 = before.score_at(later);
        let s2 = before.score_at(later);
        let after = store.get(&contact.id).unwrap();

        assert_eq!(s1, s2);
        assert_eq!(before.amplitude, after.amplitude);
        assert_eq!(before.version, after.version);
    }

    #[test]
    fn decayed_amplitude_is_reanchored_on_next_interaction() {
        let (store, contact) = store_with_contact(WatchStatus::Watch);
        let t0 = Utc::now();
        store
            .apply_interaction(&contact.id, InteractionKind::Meeting, t0)
            .unwrap();

        // One medium half-life later, a note lands on the halved amplitude.
        let t1 = t0 + Duration::days(8);
        let updated = store
            .apply_interaction(&contact.id, InteractionKind::Note, t1)
            .unwrap();
        assert!((updated.amplitude - (39.0 / 2.0 + 3.0)).abs() < 1e-6);
        assert_eq!(updated.last_interaction_at, Some(t1));
    }

    #[test]
    fn watched_snapshot_excludes_unwatched() {
        let store = ContactStore::new();
        let now = Utc::now();
        store.create("u1", "A", DecayMode::Fast, WatchStatus::None, 30, 0.0, now);
        let b = store.create("u1", "B", DecayMode::Fast, WatchStatus::Vip, 30, 0.0, now);
        let c = store.create("u2", "C", DecayMode::Slow, WatchStatus::Watch, 30, 0.0, now);

        let mut ids: Vec<String> = store.watched_snapshot().into_iter().map(|c| c.id).collect();
        ids.sort();
        let mut expected = vec![b.id, c.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn mark_alerted_sets_cooldown_anchor() {
        let (store, contact) = store_with_contact(WatchStatus::Important);
        let now = Utc::now();
        store.mark_alerted(&[contact.id.clone()], now);

        let updated = store.get(&contact.id).unwrap();
        assert_eq!(updated.last_alert_sent_at, Some(now));
        assert_eq!(updated.version, contact.version + 1);
    }

    #[test]
    fn interaction_ring_is_capped() {
        let (store, contact) = store_with_contact(WatchStatus::Watch);
        let now = Utc::now();
        for i in 0..(MAX_RECENT_INTERACTIONS + 25) {
            store.apply_interaction(
                &contact.id,
                InteractionKind::Note,
                now + Duration::seconds(i as i64),
            );
        }
        assert_eq!(
            store.recent_interactions(usize::MAX).len(),
            MAX_RECENT_INTERACTIONS
        );
    }

    #[test]
    fn update_profile_caps_threshold() {
        let (store, contact) = store_with_contact(WatchStatus::Watch);
        let updated = store
            .update_profile(
                &contact.id,
                ContactUpdate {
                    alert_threshold: Some(200),
                    ..ContactUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.alert_threshold, 100);
    }
}
