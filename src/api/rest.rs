// =============================================================================
// REST API Endpoints — Axum
// =============================================================================
//
// All endpoints live under `/api/v1/`. The health endpoint is public. The
// management/read surface requires the API bearer token; the scan trigger
// requires the scheduler credential instead, so a cron dispatcher holding
// only that secret cannot read or mutate anything else.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::auth::{AuthBearer, CronAuth};
use crate::app_state::AppState;
use crate::contacts::{Contact, ContactUpdate};
use crate::scanner::run_scan;
use crate::settings::WarmthSettings;
use crate::tokens::NotificationToken;
use crate::types::{DecayMode, InteractionKind, WatchStatus};
use crate::warmth::{days_until_threshold, WarmthBand};

type ApiError = (StatusCode, Json<serde_json::Value>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message.into() })),
    )
}

fn not_found(message: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": message })),
    )
}

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        // ── Authenticated (API token) ───────────────────────────────
        .route("/api/v1/contacts", post(create_contact).get(list_contacts))
        .route("/api/v1/contacts/{id}", patch(update_contact))
        .route(
            "/api/v1/contacts/{id}/interactions",
            post(record_interaction),
        )
        .route("/api/v1/contacts/{id}/warmth", get(contact_warmth))
        .route(
            "/api/v1/users/{user_id}/warmth-settings",
            get(get_settings).put(put_settings),
        )
        .route("/api/v1/users/{user_id}/devices", post(register_device))
        .route("/api/v1/alerts", get(recent_alerts))
        .route("/api/v1/interactions", get(recent_interactions))
        .route("/api/v1/warmth/modes", get(warmth_modes))
        .route("/api/v1/warmth/summary", get(warmth_summary))
        .route("/api/v1/scans", get(recent_scans))
        // ── Authenticated (scheduler credential) ────────────────────
        .route("/api/v1/cron/scan", post(trigger_scan))
        // ── Middleware & State ──────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Shared view types
// =============================================================================

/// Contact snapshot enriched with the derived score — what the UI layer
/// actually renders.
#[derive(Serialize)]
struct ContactView {
    id: String,
    user_id: String,
    display_name: String,
    amplitude: f64,
    last_interaction_at: Option<DateTime<Utc>>,
    decay_mode: DecayMode,
    watch_status: WatchStatus,
    alert_threshold: u8,
    last_alert_sent_at: Option<DateTime<Utc>>,
    score: u8,
    band: WarmthBand,
    days_since_interaction: Option<i64>,
}

impl ContactView {
    fn build(contact: Contact, settings: &WarmthSettings, now: DateTime<Utc>) -> Self {
        let score = contact.score_at(now);
        let band = WarmthBand::classify(score, settings);
        let days_since_interaction = contact.days_since_interaction(now);
        Self {
            id: contact.id,
            user_id: contact.user_id,
            display_name: contact.display_name,
            amplitude: contact.amplitude,
            last_interaction_at: contact.last_interaction_at,
            decay_mode: contact.decay_mode,
            watch_status: contact.watch_status,
            alert_threshold: contact.alert_threshold,
            last_alert_sent_at: contact.last_alert_sent_at,
            score,
            band,
            days_since_interaction,
        }
    }
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        server_time: Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Contacts (authenticated)
// =============================================================================

#[derive(Deserialize)]
struct CreateContactRequest {
    user_id: String,
    display_name: String,
    #[serde(default)]
    decay_mode: DecayMode,
    #[serde(default)]
    watch_status: WatchStatus,
    #[serde(default)]
    alert_threshold: Option<u8>,
}

async fn create_contact(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateContactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.user_id.trim().is_empty() {
        return Err(bad_request("user_id must not be empty"));
    }
    if req.display_name.trim().is_empty() {
        return Err(bad_request("display_name must not be empty"));
    }
    let threshold = match req.alert_threshold {
        Some(t) if t > 100 => return Err(bad_request("alert_threshold must be within 0–100")),
        Some(t) => t,
        None => state.config.default_alert_threshold,
    };

    let now = Utc::now();
    let settings = state.settings.for_user(&req.user_id);
    let contact = state.contacts.create(
        &req.user_id,
        req.display_name.trim(),
        req.decay_mode,
        req.watch_status,
        threshold,
        settings.default_amplitude,
        now,
    );
    state.increment_version();

    Ok((
        StatusCode::CREATED,
        Json(ContactView::build(contact, &settings, now)),
    ))
}

#[derive(Deserialize)]
struct UserQuery {
    user_id: String,
}

async fn list_contacts(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> impl IntoResponse {
    let now = Utc::now();
    let settings = state.settings.for_user(&query.user_id);
    let views: Vec<ContactView> = state
        .contacts
        .list_for_user(&query.user_id)
        .into_iter()
        .map(|c| ContactView::build(c, &settings, now))
        .collect();
    Json(views)
}

#[derive(Deserialize)]
struct UpdateContactRequest {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    decay_mode: Option<DecayMode>,
    #[serde(default)]
    watch_status: Option<WatchStatus>,
    #[serde(default)]
    alert_threshold: Option<u8>,
}

async fn update_contact(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateContactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(t) = req.alert_threshold {
        if t > 100 {
            return Err(bad_request("alert_threshold must be within 0–100"));
        }
    }
    if let Some(name) = &req.display_name {
        if name.trim().is_empty() {
            return Err(bad_request("display_name must not be empty"));
        }
    }

    let update = ContactUpdate {
        display_name: req.display_name.map(|n| n.trim().to_string()),
        decay_mode: req.decay_mode,
        watch_status: req.watch_status,
        alert_threshold: req.alert_threshold,
    };
    let contact = state
        .contacts
        .update_profile(&id, update)
        .ok_or_else(|| not_found("contact not found"))?;
    state.increment_version();

    let now = Utc::now();
    let settings = state.settings.for_user(&contact.user_id);
    Ok(Json(ContactView::build(contact, &settings, now)))
}

// =============================================================================
// Interactions (authenticated)
// =============================================================================

#[derive(Deserialize)]
struct RecordInteractionRequest {
    kind: InteractionKind,
    /// Defaults to the server clock when the event carries no timestamp.
    #[serde(default)]
    occurred_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct InteractionResponse {
    contact_id: String,
    kind: InteractionKind,
    amplitude: f64,
    score: u8,
    band: WarmthBand,
}

async fn record_interaction(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RecordInteractionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let occurred_at = req.occurred_at.unwrap_or(now);

    let contact = state
        .contacts
        .apply_interaction(&id, req.kind, occurred_at)
        .ok_or_else(|| not_found("contact not found"))?;
    state.increment_version();

    let settings = state.settings.for_user(&contact.user_id);
    let score = contact.score_at(now);
    Ok(Json(InteractionResponse {
        contact_id: contact.id,
        kind: req.kind,
        amplitude: contact.amplitude,
        score,
        band: WarmthBand::classify(score, &settings),
    }))
}

// =============================================================================
// Warmth read (authenticated, side-effect free)
// =============================================================================

#[derive(Serialize)]
struct WarmthResponse {
    contact_id: String,
    score: u8,
    band: WarmthBand,
    decay_mode: DecayMode,
    days_since_interaction: Option<i64>,
    /// Days until the score decays to the contact's alert threshold, assuming
    /// no further interactions. Absent when the threshold sits at or below
    /// the score floor and is therefore never reached.
    days_until_threshold: Option<f64>,
}

async fn contact_warmth(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let contact = state
        .contacts
        .get(&id)
        .ok_or_else(|| not_found("contact not found"))?;

    let settings = state.settings.for_user(&contact.user_id);
    let score = contact.score_at(now);

    Ok(Json(WarmthResponse {
        contact_id: contact.id.clone(),
        score,
        band: WarmthBand::classify(score, &settings),
        decay_mode: contact.decay_mode,
        days_since_interaction: contact.days_since_interaction(now),
        days_until_threshold: days_until_threshold(
            contact.amplitude_at(now),
            contact.alert_threshold,
            contact.decay_mode,
        ),
    }))
}

// =============================================================================
// Warmth settings (authenticated)
// =============================================================================

async fn get_settings(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    Json(state.settings.for_user(&user_id))
}

async fn put_settings(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(settings): Json<WarmthSettings>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .settings
        .put(&user_id, settings.clone())
        .map_err(|e| bad_request(e.to_string()))?;
    state.increment_version();
    Ok(Json(settings))
}

// =============================================================================
// Device registration (authenticated)
// =============================================================================

#[derive(Deserialize)]
struct RegisterDeviceRequest {
    push_token: String,
    platform: String,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_true")]
    warmth_alerts_enabled: bool,
}

fn default_true() -> bool {
    true
}

async fn register_device(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(req): Json<RegisterDeviceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.push_token.trim().is_empty() {
        return Err(bad_request("push_token must not be empty"));
    }

    state.tokens.upsert(NotificationToken {
        user_id: user_id.clone(),
        push_token: req.push_token.trim().to_string(),
        platform: req.platform,
        enabled: req.enabled,
        warmth_alerts_enabled: req.warmth_alerts_enabled,
        registered_at: Utc::now(),
    });
    state.increment_version();

    Ok(Json(serde_json::json!({
        "registered": true,
        "device_count": state.tokens.count(),
    })))
}

// =============================================================================
// Alerts & scan reports (authenticated)
// =============================================================================

#[derive(Deserialize)]
struct AlertsQuery {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn recent_alerts(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(100).min(1000);
    Json(state.alerts.recent(query.user_id.as_deref(), limit))
}

async fn recent_scans(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(state.recent_scan_reports())
}

#[derive(Deserialize)]
struct LimitQuery {
    #[serde(default)]
    limit: Option<usize>,
}

async fn recent_interactions(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50).min(200);
    Json(state.contacts.recent_interactions(limit))
}

// =============================================================================
// Warmth modes & summary (authenticated)
// =============================================================================

#[derive(Serialize)]
struct ModeInfo {
    mode: DecayMode,
    lambda: f64,
    half_life_days: f64,
    description: &'static str,
}

async fn warmth_modes(_auth: AuthBearer) -> impl IntoResponse {
    let modes: Vec<ModeInfo> = DecayMode::ALL
        .into_iter()
        .map(|mode| ModeInfo {
            mode,
            lambda: mode.lambda(),
            half_life_days: mode.half_life_days(),
            description: mode.description(),
        })
        .collect();
    Json(serde_json::json!({ "modes": modes }))
}

#[derive(Serialize, Default)]
struct BandCounts {
    hot: usize,
    warm: usize,
    cool: usize,
    cold: usize,
}

#[derive(Serialize)]
struct SummaryResponse {
    total_contacts: usize,
    by_band: BandCounts,
    average_score: f64,
    contacts_needing_attention: usize,
}

async fn warmth_summary(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> impl IntoResponse {
    let now = Utc::now();
    let settings = state.settings.for_user(&query.user_id);
    let contacts = state.contacts.list_for_user(&query.user_id);

    let mut by_band = BandCounts::default();
    let mut score_sum: u64 = 0;
    let mut needing_attention = 0;

    for contact in &contacts {
        let score = contact.score_at(now);
        score_sum += score as u64;
        match WarmthBand::classify(score, &settings) {
            WarmthBand::Hot => by_band.hot += 1,
            WarmthBand::Warm => by_band.warm += 1,
            WarmthBand::Cool => by_band.cool += 1,
            WarmthBand::Cold => by_band.cold += 1,
        }
        if contact.has_baseline() && score < contact.alert_threshold {
            needing_attention += 1;
        }
    }

    let average_score = if contacts.is_empty() {
        0.0
    } else {
        score_sum as f64 / contacts.len() as f64
    };

    Json(SummaryResponse {
        total_contacts: contacts.len(),
        by_band,
        average_score,
        contacts_needing_attention: needing_attention,
    })
}

// =============================================================================
// Scheduler trigger (cron credential)
// =============================================================================

async fn trigger_scan(
    _auth: CronAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!("scan triggered via cron endpoint");
    match run_scan(&state, Utc::now()).await {
        Some(report) => Json(report).into_response(),
        None => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "a scan run is already in flight" })),
        )
            .into_response(),
    }
}
