//! Status and protection switch handlers.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::super::types::{ControlSettings, ControlState, StatusResponse};
use super::{ok_text, update_and_reconfigure};

/// `GET /control/status`
pub async fn status_handler(State(state): State<ControlState>) -> Response {
    let https_running = state.https_listener.is_bound().await;
    let settings = state.settings.read().await;
    Json(StatusResponse {
        dns_address: settings.dns_address.clone(),
        http_port: settings.bind_port,
        dns_port: settings.dns_port,
        protection_enabled: settings.protection_enabled,
        upstream_dns: settings.upstream_dns.clone(),
        https_running,
        version: env!("CARGO_PKG_VERSION"),
    })
    .into_response()
}

async fn set_protection(state: ControlState, enabled: bool) -> Response {
    let update = |settings: &mut ControlSettings| settings.protection_enabled = enabled;
    if let Err(response) = update_and_reconfigure(&state, update).await {
        return response;
    }
    log::info!("Protection {}", if enabled { "enabled" } else { "disabled" });
    ok_text("OK\n")
}

/// `POST /control/enable_protection`
pub async fn enable_protection_handler(State(state): State<ControlState>) -> Response {
    set_protection(state, true).await
}

/// `POST /control/disable_protection`
pub async fn disable_protection_handler(State(state): State<ControlState>) -> Response {
    set_protection(state, false).await
}
