// =============================================================================
// Notification Dispatcher — per-device fan-out with failure isolation
// =============================================================================
//
// Takes the batch of freshly created alert records and attempts delivery to
// every eligible device of every affected user:
//
//   - records are grouped by user so tokens are resolved once per user
//   - each (alert, token) pair is attempted independently; one failing send
//     never blocks or fails the others
//   - per-record aggregate: sent if ANY token succeeded; when every token
//     failed, the latest error message is retained on the record
//   - a user with zero eligible tokens is an expected outcome — the record
//     simply stays unsent with no error
//
// Delivery is fire-and-forget at-least-once; the scanner's cooldown contract
// is the only repeat-guard.
// =============================================================================

use std::collections::HashMap;
use std::time::Instant;

use anyhow::anyhow;
use chrono::Utc;
use futures_util::{stream, StreamExt};
use tracing::{debug, info, warn};

use crate::alerts::{AlertRecord, AlertStore};
use crate::push::client::{PushClient, PushMessage, PushPriority};
use crate::tokens::TokenStore;
use crate::types::WatchStatus;

/// Attempt-level counters for the scan report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub attempts: usize,
    pub sent: usize,
    pub failed: usize,
    pub users_without_tokens: usize,
}

/// Deliver notifications for a batch of alert records and write each record's
/// aggregate outcome back to the store.
///
/// `deadline` bounds the fan-out: attempts starting after it has passed are
/// recorded as failures instead of hitting the gateway, so a stalled
/// downstream cannot hang the scan run.
pub async fn dispatch_alerts(
    push: &PushClient,
    tokens: &TokenStore,
    alert_store: &AlertStore,
    alerts: &[AlertRecord],
    concurrency: usize,
    deadline: Instant,
) -> DispatchSummary {
    let mut summary = DispatchSummary::default();

    // ── Group by user, resolve tokens once per user ─────────────────────
    let mut by_user: HashMap<&str, Vec<&AlertRecord>> = HashMap::new();
    for alert in alerts {
        by_user.entry(alert.user_id.as_str()).or_default().push(alert);
    }

    struct Attempt {
        alert_id: String,
        message: PushMessage,
    }

    let mut attempts: Vec<Attempt> = Vec::new();
    for (user_id, user_alerts) in &by_user {
        let eligible = tokens.eligible_for_user(user_id);
        if eligible.is_empty() {
            debug!(user_id = %user_id, alerts = user_alerts.len(), "no eligible devices, leaving alerts unsent");
            summary.users_without_tokens += 1;
            continue;
        }

        for alert in user_alerts {
            for token in &eligible {
                attempts.push(Attempt {
                    alert_id: alert.id.clone(),
                    message: build_message(alert, &token.push_token),
                });
            }
        }
    }

    summary.attempts = attempts.len();
    if attempts.is_empty() {
        return summary;
    }

    // ── Bounded fan-out over (alert, token) pairs ───────────────────────
    let outcomes: Vec<(String, Result<(), anyhow::Error>)> = stream::iter(attempts)
        .map(|attempt| async move {
            let result = if Instant::now() >= deadline {
                Err(anyhow!("dispatch deadline exceeded"))
            } else {
                push.send(&attempt.message).await
            };
            (attempt.alert_id, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    // ── Aggregate per record: any success wins, else keep latest error ──
    let mut aggregate: HashMap<String, (bool, Option<String>)> = HashMap::new();
    for (alert_id, result) in outcomes {
        let entry = aggregate.entry(alert_id).or_insert((false, None));
        match result {
            Ok(()) => {
                summary.sent += 1;
                entry.0 = true;
            }
            Err(e) => {
                summary.failed += 1;
                entry.1 = Some(e.to_string());
            }
        }
    }

    let now = Utc::now();
    for (alert_id, (sent, error)) in aggregate {
        if !sent {
            warn!(alert_id = %alert_id, error = ?error, "all delivery attempts failed");
        }
        let error = if sent { None } else { error };
        alert_store.record_outcome(&alert_id, sent, error, now);
    }

    info!(
        attempts = summary.attempts,
        sent = summary.sent,
        failed = summary.failed,
        users_without_tokens = summary.users_without_tokens,
        "notification dispatch complete"
    );

    summary
}

// -------------------------------------------------------------------------
// Notification content
// -------------------------------------------------------------------------

fn build_message(alert: &AlertRecord, token: &str) -> PushMessage {
    PushMessage::new(
        token.to_string(),
        notification_title(&alert.contact_name, alert.watch_status),
        notification_body(alert.warmth_at_alert, alert.days_since_interaction),
        serde_json::json!({
            "type": "warmth_alert",
            "alert_id": alert.id,
            "contact_id": alert.contact_id,
            "warmth": alert.warmth_at_alert,
            "screen": format!("/contact/{}", alert.contact_id),
            "action": "compose",
        }),
        priority_for(alert.watch_status),
    )
}

/// Title carries the contact name plus a severity cue by watch tier.
fn notification_title(contact_name: &str, status: WatchStatus) -> String {
    let cue = match status {
        WatchStatus::Vip => "⭐",
        WatchStatus::Important => "🔥",
        _ => "📉",
    };
    format!("{cue} {contact_name} is getting cold")
}

/// Body carries the numeric score and, when known, the interaction gap.
fn notification_body(score: u8, days_since_interaction: Option<i64>) -> String {
    match days_since_interaction {
        Some(days) => format!("Warmth: {score}/100 • {days} days since last contact"),
        None => format!("Warmth: {score}/100 • No recent interactions"),
    }
}

fn priority_for(status: WatchStatus) -> PushPriority {
    match status {
        WatchStatus::Vip | WatchStatus::Important => PushPriority::High,
        _ => PushPriority::Default,
    }
}

// =============================================================================
// Tests (against a loopback mock gateway)
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertType;
    use crate::tokens::NotificationToken;
    use crate::warmth::WarmthBand;
    use axum::{routing::post, Json, Router};
    use chrono::Utc;
    use std::time::Duration;

    /// Mock gateway: tokens starting with "bad" get an error ticket, the
    /// rest succeed.
    async fn spawn_selective_gateway() -> String {
        let app = Router::new().route(
            "/",
            post(|Json(body): Json<serde_json::Value>| async move {
                let to = body["to"].as_str().unwrap_or_default();
                if to.starts_with("bad") {
                    Json(serde_json::json!({
                        "data": [{ "status": "error", "message": "DeviceNotRegistered" }]
                    }))
                } else {
                    Json(serde_json::json!({ "data": [{ "status": "ok" }] }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn alert(id: &str, user: &str) -> AlertRecord {
        AlertRecord {
            id: id.to_string(),
            user_id: user.to_string(),
            contact_id: "c1".to_string(),
            alert_type: AlertType::DroppedBelow,
            warmth_at_alert: 22,
            warmth_threshold: 40,
            days_since_interaction: Some(15),
            contact_name: "Ada".to_string(),
            watch_status: WatchStatus::Vip,
            band: WarmthBand::Cold,
            created_at: Utc::now(),
            notification_sent: false,
            notification_error: None,
            notification_sent_at: None,
        }
    }

    fn token(user: &str, push_token: &str) -> NotificationToken {
        NotificationToken {
            user_id: user.to_string(),
            push_token: push_token.to_string(),
            platform: "ios".to_string(),
            enabled: true,
            warmth_alerts_enabled: true,
            registered_at: Utc::now(),
        }
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[tokio::test]
    async fn partial_token_failure_still_marks_sent() {
        let url = spawn_selective_gateway().await;
        let push = PushClient::new(url);
        let tokens = TokenStore::new();
        tokens.upsert(token("u1", "good-1"));
        tokens.upsert(token("u1", "bad-1"));

        let store = AlertStore::new();
        let batch = store.insert_batch(vec![alert("a1", "u1")]).unwrap();

        let summary =
            dispatch_alerts(&push, &tokens, &store, &batch, 4, far_deadline()).await;

        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 1);

        let record = store.get("a1").unwrap();
        assert!(record.notification_sent);
        assert!(record.notification_error.is_none());
        assert!(record.notification_sent_at.is_some());
    }

    #[tokio::test]
    async fn all_failures_retain_latest_error() {
        let url = spawn_selective_gateway().await;
        let push = PushClient::new(url);
        let tokens = TokenStore::new();
        tokens.upsert(token("u1", "bad-1"));
        tokens.upsert(token("u1", "bad-2"));

        let store = AlertStore::new();
        let batch = store.insert_batch(vec![alert("a1", "u1")]).unwrap();

        let summary =
            dispatch_alerts(&push, &tokens, &store, &batch, 4, far_deadline()).await;

        assert_eq!(summary.sent, 0);
        assert_eq!(summary.failed, 2);

        let record = store.get("a1").unwrap();
        assert!(!record.notification_sent);
        assert!(record
            .notification_error
            .as_deref()
            .unwrap()
            .contains("DeviceNotRegistered"));
    }

    #[tokio::test]
    async fn no_tokens_is_not_an_error() {
        // Gateway is never contacted, so an unreachable URL is fine here.
        let push = PushClient::new("http://127.0.0.1:1/");
        let tokens = TokenStore::new();

        let store = AlertStore::new();
        let batch = store.insert_batch(vec![alert("a1", "u1")]).unwrap();

        let summary =
            dispatch_alerts(&push, &tokens, &store, &batch, 4, far_deadline()).await;

        assert_eq!(summary.attempts, 0);
        assert_eq!(summary.users_without_tokens, 1);

        let record = store.get("a1").unwrap();
        assert!(!record.notification_sent);
        assert!(record.notification_error.is_none());
    }

    #[tokio::test]
    async fn one_alert_failure_does_not_block_another() {
        let url = spawn_selective_gateway().await;
        let push = PushClient::new(url);
        let tokens = TokenStore::new();
        tokens.upsert(token("u1", "bad-1"));
        tokens.upsert(token("u2", "good-1"));

        let store = AlertStore::new();
        let batch = store
            .insert_batch(vec![alert("a1", "u1"), alert("a2", "u2")])
            .unwrap();

        dispatch_alerts(&push, &tokens, &store, &batch, 4, far_deadline()).await;

        assert!(!store.get("a1").unwrap().notification_sent);
        assert!(store.get("a2").unwrap().notification_sent);
    }

    #[tokio::test]
    async fn expired_deadline_fails_attempts_without_network() {
        let push = PushClient::new("http://127.0.0.1:1/");
        let tokens = TokenStore::new();
        tokens.upsert(token("u1", "good-1"));

        let store = AlertStore::new();
        let batch = store.insert_batch(vec![alert("a1", "u1")]).unwrap();

        let summary = dispatch_alerts(
            &push,
            &tokens,
            &store,
            &batch,
            4,
            Instant::now() - Duration::from_secs(1),
        )
        .await;

        assert_eq!(summary.sent, 0);
        assert_eq!(summary.failed, 1);
        let record = store.get("a1").unwrap();
        assert!(record
            .notification_error
            .as_deref()
            .unwrap()
            .contains("deadline"));
    }

    #[test]
    fn title_carries_severity_cue() {
        assert!(notification_title("Ada", WatchStatus::Vip).starts_with("⭐"));
        assert!(notification_title("Ada", WatchStatus::Important).starts_with("🔥"));
        assert!(notification_title("Ada", WatchStatus::Watch).starts_with("📉"));
        assert!(notification_title("Ada", WatchStatus::Vip).contains("Ada"));
    }

    #[test]
    fn body_states_score_and_gap() {
        assert_eq!(
            notification_body(25, Some(12)),
            "Warmth: 25/100 • 12 days since last contact"
        );
        assert_eq!(
            notification_body(31, None),
            "Warmth: 31/100 • No recent interactions"
        );
    }

    #[test]
    fn vip_and_important_are_high_priority() {
        assert_eq!(priority_for(WatchStatus::Vip), PushPriority::High);
        assert_eq!(priority_for(WatchStatus::Important), PushPriority::High);
        assert_eq!(priority_for(WatchStatus::Watch), PushPriority::Default);
    }
}
