//! Upstream resolver handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::super::types::ControlState;
use super::{http_error, ok_text, update_and_reconfigure};
use crate::upstream::{effective_upstreams, parse_upstream_list};

/// `POST /control/set_upstream_dns`, whitespace separated addresses
///
/// An empty body restores the default upstreams.
pub async fn set_upstream_dns_handler(State(state): State<ControlState>, body: String) -> Response {
    let hosts = parse_upstream_list(&body);
    let upstreams = effective_upstreams(&hosts);
    if let Err(response) = update_and_reconfigure(&state, |settings| settings.upstream_dns = upstreams).await {
        return response;
    }
    ok_text(format!("OK {} servers\n", hosts.len()))
}

/// `POST /control/test_upstream_dns`, whitespace separated addresses
pub async fn test_upstream_dns_handler(State(state): State<ControlState>, body: String) -> Response {
    let hosts = parse_upstream_list(&body);
    match state.prober.probe_all(&hosts).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => http_error(StatusCode::BAD_REQUEST, e.to_string()),
    }
}
