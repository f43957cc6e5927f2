//! HTTP routes for the ticket gateway.
//!
//! Every route sits behind the middleware stack, so the access gate has
//! already passed the request when a handler runs. Handlers log failure
//! detail and return only the fixed user-facing messages.

use crate::domain::config::GatewayConfig;
use crate::domain::error::{ApiError, ApiResult};
use crate::domain::types::{
    CloseTicketRequest, CloseTicketResponse, CreateTicketRequest, CreateTicketResponse,
    PlatformId, TransactionTicket,
};
use crate::middleware::{GatewayMetrics, MiddlewareStack};
use crate::services::{ChannelProvisioner, ChannelTeardown};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub provisioner: Arc<ChannelProvisioner>,
    pub teardown: Arc<ChannelTeardown>,
    pub metrics: Arc<GatewayMetrics>,
}

/// Build the gateway router with its middleware stack.
pub fn build_router(state: AppState, stack: &MiddlewareStack, config: &GatewayConfig) -> Router {
    let admin_metrics_path = format!("/{}/metrics", config.gate.admin_path.trim_matches('/'));

    // First layer is outermost
    let middleware = ServiceBuilder::new()
        .layer(stack.ip_protection.clone())
        .layer(stack.tracing.clone())
        .layer(stack.access_gate.clone());

    Router::new()
        .route("/api/create-ticket", post(create_ticket))
        .route("/api/close-ticket", post(close_ticket))
        .route("/health", get(health_check))
        .route(&admin_metrics_path, get(admin_metrics))
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(config.http.max_body_bytes))
        .layer(middleware)
        .with_state(state)
}

/// `POST /api/create-ticket`
async fn create_ticket(
    State(state): State<AppState>,
    payload: Result<Json<CreateTicketRequest>, JsonRejection>,
) -> ApiResult<Json<CreateTicketResponse>> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Malformed ticket request");
        ApiError::invalid_ticket(rejection.body_text())
    })?;

    let ticket = TransactionTicket::try_from(request).map_err(|e| {
        warn!(error = %e, "Ticket request rejected");
        ApiError::invalid_ticket(e)
    })?;

    match state.provisioner.create_transaction_channel(&ticket).await {
        Ok(provisioned) => Ok(Json(CreateTicketResponse {
            success: true,
            channel_url: provisioned.url(),
        })),
        Err(e) => {
            error!(error = %e, seller_id = %ticket.counterparty_id, "Ticket creation failed");
            Err(ApiError::ticket_failed())
        }
    }
}

/// Validated close request: target channel and acting seller.
fn close_target(request: CloseTicketRequest) -> Result<(PlatformId, String), String> {
    let channel_id = request
        .channel_id
        .ok_or_else(|| "missing field `channelId`".to_string())?;
    let channel_id = PlatformId::parse(&channel_id).map_err(|e| e.to_string())?;

    let actor = request.seller_name.unwrap_or_default();
    let actor = actor.trim();
    if actor.is_empty() {
        return Err("missing field `sellerName`".to_string());
    }

    Ok((channel_id, actor.to_string()))
}

/// `POST /api/close-ticket`
async fn close_ticket(
    State(state): State<AppState>,
    payload: Result<Json<CloseTicketRequest>, JsonRejection>,
) -> ApiResult<Json<CloseTicketResponse>> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Malformed close request");
        ApiError::invalid_close(rejection.body_text())
    })?;

    let (channel_id, actor) = close_target(request).map_err(|e| {
        warn!(error = %e, "Close request rejected");
        ApiError::invalid_close(e)
    })?;

    match state.teardown.close_channel(&channel_id, &actor).await {
        Ok(ack) => Ok(Json(CloseTicketResponse {
            success: true,
            status: ack.status().to_string(),
        })),
        Err(e) => {
            error!(error = %e, channel_id = %channel_id, "Ticket close failed");
            Err(ApiError::close_failed())
        }
    }
}

/// Unknown paths still pass through the gate before answering 404.
async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "zstore-gateway",
        "version": crate::VERSION,
    }))
}

/// Gateway counters plus the live teardown queue.
async fn admin_metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut body = state.metrics.to_json();
    body["teardown"]["pending"] = serde_json::json!(state.teardown.pending_count());
    Json(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_target_validation() {
        let (id, actor) = close_target(CloseTicketRequest {
            channel_id: Some("C1".into()),
            seller_name: Some(" Sam ".into()),
        })
        .unwrap();
        assert_eq!(id.as_str(), "C1");
        assert_eq!(actor, "Sam");

        assert!(close_target(CloseTicketRequest {
            channel_id: None,
            seller_name: Some("Sam".into()),
        })
        .is_err());

        assert!(close_target(CloseTicketRequest {
            channel_id: Some("1/../2".into()),
            seller_name: Some("Sam".into()),
        })
        .is_err());

        assert!(close_target(CloseTicketRequest {
            channel_id: Some("C1".into()),
            seller_name: Some("  ".into()),
        })
        .is_err());
    }
}
