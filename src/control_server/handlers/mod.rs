//! Control API HTTP handlers.
//!
//! Errors are returned as plain text with the status code of their class:
//! 400 for anything wrong with the request, 500 when persisting or applying
//! the configuration failed.

mod filtering;
mod http;
mod stats;
mod status;
mod tls;
mod upstream;

use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::types::{ControlSettings, ControlState};
use crate::error_handling::ReconfigureError;

pub use filtering::{
    add_url_handler, disable_url_handler, enable_url_handler, filtering_disable_handler,
    filtering_enable_handler, filtering_status_handler, refresh_handler, remove_url_handler,
    set_rules_handler,
};
pub use http::http_configure_handler;
pub use stats::{stats_handler, stats_history_handler, stats_reset_handler, stats_top_handler};
pub use status::{disable_protection_handler, enable_protection_handler, status_handler};
pub use tls::{tls_configure_handler, tls_status_handler, tls_validate_handler};
pub use upstream::{set_upstream_dns_handler, test_upstream_dns_handler};

/// Logs `text` and returns it with `status`.
pub(crate) fn http_error(status: StatusCode, text: impl Into<String>) -> Response {
    let text = text.into();
    if status.is_server_error() {
        log::error!("{text}");
    } else {
        log::warn!("{text}");
    }
    (status, text).into_response()
}

pub(crate) fn ok_text(text: impl Into<String>) -> Response {
    (StatusCode::OK, text.into()).into_response()
}

pub(crate) fn reconfigure_error(e: ReconfigureError) -> Response {
    http_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Persists the configuration, then asks the filtering engine to reload it.
pub(crate) async fn write_and_reconfigure(state: &ControlState) -> Result<(), Response> {
    state.save_and_reload().await.map_err(reconfigure_error)
}

/// Commits a settings change once it is persisted, then reloads.
pub(crate) async fn update_and_reconfigure(
    state: &ControlState,
    update: impl FnOnce(&mut ControlSettings),
) -> Result<(), Response> {
    state.save_settings(update).await.map_err(reconfigure_error)?;
    state.reload().await.map_err(reconfigure_error)
}

/// Persists and reloads, then answers `OK`.
pub(crate) async fn reconfigure_and_return_ok(state: &ControlState) -> Response {
    match write_and_reconfigure(state).await {
        Ok(()) => ok_text("OK\n"),
        Err(response) => response,
    }
}

/// Parses a `key=value` per line request body.
///
/// Blank lines are ignored; later keys override earlier ones.
pub(crate) fn parse_parameters(body: &str) -> Result<HashMap<String, String>, String> {
    let mut parameters = HashMap::new();
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| format!("Got invalid request body: {line}"))?;
        parameters.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(parameters)
}
