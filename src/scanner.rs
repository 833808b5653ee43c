// =============================================================================
// Alert Scanner — scheduled cooling detection
// =============================================================================
//
// One run walks every watched contact, recomputes its present-moment score
// through the decay model, and raises an alert record for each contact that
// has cooled below its threshold and is out of cooldown:
//
//   1. candidates: watch_status != none; contacts with no interaction
//      baseline are skipped (no alert without a baseline)
//   2. cooldown: skip if the last alert is younger than `cooldown_days`
//   3. threshold: level-triggered — `score < alert_threshold` qualifies,
//      whether or not the contact was above the threshold last run
//   4. all-or-nothing batch insert of the new alert records
//   5. notification dispatch (per-device failure isolation)
//   6. cooldown anchors updated on every alerted contact, regardless of
//      delivery outcome — alert creation drives the cooldown, so a broken
//      push pipeline cannot cause duplicate records
//
// A run always completes (success or reported failure) and is safe to invoke
// again early: repeated invocation only risks redundant scanning, never
// duplicate alerts. The run deadline truncates evaluation; contacts not
// reached stay un-alerted and are picked up next cycle.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::alerts::AlertRecord;
use crate::app_state::AppState;
use crate::push::dispatch_alerts;
use crate::settings::WarmthSettings;
use crate::warmth::WarmthBand;

/// Structured summary of one scan run, returned to the trigger caller and
/// retained on the report ring for observability.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub run_id: String,
    pub started_at: String,
    pub success: bool,
    pub contacts_checked: usize,
    pub alerts_created: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub skipped_cooldown: usize,
    pub skipped_no_baseline: usize,
    pub users_without_tokens: usize,
    /// True when the run deadline expired before every candidate was
    /// evaluated; the remainder is picked up next cycle.
    pub deadline_truncated: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Execute one scan run. Returns `None` when a run is already in flight
/// (the caller should report busy rather than wait).
pub async fn run_scan(state: &AppState, now: DateTime<Utc>) -> Option<ScanReport> {
    if !state.begin_scan() {
        return None;
    }
    let report = scan_inner(state, now).await;
    state.end_scan();

    info!(
        run_id = %report.run_id,
        success = report.success,
        contacts_checked = report.contacts_checked,
        alerts_created = report.alerts_created,
        notifications_sent = report.notifications_sent,
        notifications_failed = report.notifications_failed,
        skipped_cooldown = report.skipped_cooldown,
        skipped_no_baseline = report.skipped_no_baseline,
        duration_ms = report.duration_ms,
        "scan run complete"
    );

    state.push_scan_report(report.clone());
    Some(report)
}

async fn scan_inner(state: &AppState, now: DateTime<Utc>) -> ScanReport {
    let started = Instant::now();
    let deadline = started + StdDuration::from_secs(state.config.scan_timeout_secs);
    let cooldown = Duration::days(state.config.cooldown_days);

    let mut report = ScanReport {
        run_id: Uuid::new_v4().to_string(),
        started_at: now.to_rfc3339(),
        ..ScanReport::default()
    };

    // ── 1–3. Evaluate candidates ────────────────────────────────────────
    let candidates = state.contacts.watched_snapshot();
    debug!(candidates = candidates.len(), "scan candidates fetched");

    let mut settings_memo: HashMap<String, WarmthSettings> = HashMap::new();
    let mut qualifying: Vec<AlertRecord> = Vec::new();

    for contact in &candidates {
        if Instant::now() >= deadline {
            warn!(
                remaining = candidates.len() - report.contacts_checked,
                "scan deadline reached mid-evaluation, remainder deferred to next run"
            );
            report.deadline_truncated = true;
            break;
        }
        report.contacts_checked += 1;

        // No alert without a score baseline.
        if !contact.has_baseline() {
            report.skipped_no_baseline += 1;
            continue;
        }

        // Cooldown: already alerted recently.
        if let Some(last_alert) = contact.last_alert_sent_at {
            if now - last_alert < cooldown {
                report.skipped_cooldown += 1;
                continue;
            }
        }

        // Level-triggered threshold check on the recomputed score.
        let score = contact.score_at(now);
        if score >= contact.alert_threshold {
            continue;
        }

        let settings = settings_memo
            .entry(contact.user_id.clone())
            .or_insert_with(|| state.settings.for_user(&contact.user_id));
        let band = WarmthBand::classify(score, settings);

        debug!(
            contact_id = %contact.id,
            score,
            threshold = contact.alert_threshold,
            band = %band,
            "contact qualifies for alert"
        );
        qualifying.push(AlertRecord::for_contact(contact, score, band, now));
    }

    if qualifying.is_empty() {
        report.success = true;
        report.duration_ms = started.elapsed().as_millis() as u64;
        return report;
    }

    // ── 4. All-or-nothing batch insert ──────────────────────────────────
    let inserted = match state.alerts.insert_batch(qualifying) {
        Ok(records) => records,
        Err(e) => {
            // No records landed and no cooldowns move, so the next scheduled
            // run retries cleanly.
            warn!(error = %e, "alert batch insert failed, aborting run");
            report.error = Some(e.to_string());
            report.duration_ms = started.elapsed().as_millis() as u64;
            return report;
        }
    };
    report.alerts_created = inserted.len();

    // ── 5. Dispatch notifications ───────────────────────────────────────
    let summary = dispatch_alerts(
        &state.push,
        &state.tokens,
        &state.alerts,
        &inserted,
        state.config.push_concurrency,
        deadline,
    )
    .await;
    report.notifications_sent = summary.sent;
    report.notifications_failed = summary.failed;
    report.users_without_tokens = summary.users_without_tokens;

    // ── 6. Cooldown anchors, delivery outcome notwithstanding ───────────
    let alerted_contacts: Vec<String> = inserted.iter().map(|a| a.contact_id.clone()).collect();
    state.contacts.mark_alerted(&alerted_contacts, now);
    state.increment_version();

    report.success = true;
    report.duration_ms = started.elapsed().as_millis() as u64;
    report
}

// =============================================================================
// Scheduler loop
// =============================================================================

/// Run the scan on a fixed schedule. Spawned once at engine startup:
///
///   tokio::spawn(run_scan_scheduler(Arc::clone(&state)));
///
/// The first run fires one full interval after startup; operators can trigger
/// an immediate run through the authenticated cron endpoint.
pub async fn run_scan_scheduler(state: Arc<AppState>) {
    let period = StdDuration::from_secs(state.config.scan_interval_secs.max(60));
    info!(interval_secs = period.as_secs(), "scan scheduler started");

    let mut ticker = interval(period);
    // Consume the immediate first tick so startup does not trigger a scan.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        match run_scan(&state, Utc::now()).await {
            Some(report) if report.success => {}
            Some(report) => {
                warn!(error = ?report.error, "scheduled scan reported failure");
            }
            None => {
                warn!("previous scan still in flight, skipping scheduled run");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
