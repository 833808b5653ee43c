// =============================================================================
// Push Gateway Client — Expo-compatible push delivery over HTTP
// =============================================================================
//
// One message per (alert, token) attempt. A non-2xx response OR an
// error-shaped ticket in a 2xx body both count as a per-token failure — the
// gateway acknowledges malformed/expired tokens with 200 + an error ticket.
//
// The client is built once at startup with a request timeout so a stalled
// gateway bounds itself instead of hanging a scan run.
// =============================================================================

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, instrument};

/// Delivery priority hint passed through to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushPriority {
    Default,
    High,
}

/// One notification addressed to one device token.
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    /// Deep-link payload delivered alongside the notification.
    pub data: serde_json::Value,
    pub priority: PushPriority,
    pub sound: &'static str,
    pub badge: u32,
    #[serde(rename = "channelId")]
    pub channel_id: &'static str,
}

impl PushMessage {
    pub fn new(
        to: String,
        title: String,
        body: String,
        data: serde_json::Value,
        priority: PushPriority,
    ) -> Self {
        Self {
            to,
            title,
            body,
            data,
            priority,
            sound: "default",
            badge: 1,
            channel_id: "warmth-alerts",
        }
    }
}

/// HTTP client for the external push gateway.
#[derive(Clone)]
pub struct PushClient {
    gateway_url: String,
    client: reqwest::Client,
}

impl PushClient {
    /// Create a new `PushClient` pointed at `gateway_url`.
    pub fn new(gateway_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self {
            gateway_url: gateway_url.into(),
            client,
        }
    }

    /// Deliver one message. `Err` means this token's attempt failed; the
    /// caller isolates it from the rest of the batch.
    #[instrument(skip(self, message), name = "push::send", fields(priority = ?message.priority))]
    pub async fn send(&self, message: &PushMessage) -> Result<()> {
        let resp = self
            .client
            .post(&self.gateway_url)
            .json(message)
            .send()
            .await
            .context("push gateway request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse push gateway response")?;

        if !status.is_success() {
            bail!("push gateway returned {status}: {body}");
        }

        // 2xx with an error-shaped ticket is still a per-token failure.
        if let Some(ticket) = body.get("data").and_then(|d| d.as_array()).and_then(|a| a.first()) {
            if ticket.get("status").and_then(|s| s.as_str()) == Some("error") {
                let message = ticket
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("push delivery rejected by gateway");
                bail!("{message}");
            }
        }

        debug!("push delivered");
        Ok(())
    }
}

impl std::fmt::Debug for PushClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushClient")
            .field("gateway_url", &self.gateway_url)
            .finish()
    }
}

// =============================================================================
// Tests (against a loopback mock gateway)
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};

    /// Spawn a one-route mock gateway returning `status` + `body`.
    async fn spawn_gateway(status: StatusCode, body: serde_json::Value) -> String {
        let app = Router::new().route(
            "/",
            post(move || {
                let body = body.clone();
                async move { (status, Json(body)) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn message(to: &str) -> PushMessage {
        PushMessage::new(
            to.to_string(),
            "title".to_string(),
            "body".to_string(),
            serde_json::json!({ "type": "warmth_alert" }),
            PushPriority::Default,
        )
    }

    #[tokio::test]
    async fn ok_ticket_is_success() {
        let url = spawn_gateway(
            StatusCode::OK,
            serde_json::json!({ "data": [{ "status": "ok", "id": "ticket-1" }] }),
        )
        .await;

        let client = PushClient::new(url);
        assert!(client.send(&message("tok-1")).await.is_ok());
    }

    #[tokio::test]
    async fn non_2xx_is_failure() {
        let url = spawn_gateway(
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "errors": ["upstream down"] }),
        )
        .await;

        let client = PushClient::new(url);
        let err = client.send(&message("tok-1")).await.unwrap_err();
        assert!(err.to_string().contains("500"), "got: {err}");
    }

    #[tokio::test]
    async fn error_shaped_ticket_is_failure() {
        let url = spawn_gateway(
            StatusCode::OK,
            serde_json::json!({
                "data": [{ "status": "error", "message": "DeviceNotRegistered" }]
            }),
        )
        .await;

        let client = PushClient::new(url);
        let err = client.send(&message("tok-dead")).await.unwrap_err();
        assert!(err.to_string().contains("DeviceNotRegistered"), "got: {err}");
    }

    #[tokio::test]
    async fn unreachable_gateway_is_failure() {
        // Nothing listens on this port.
        let client = PushClient::new("http://127.0.0.1:1/");
        assert!(client.send(&message("tok-1")).await.is_err());
    }
}
