//! Filter list handlers.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::super::types::{AddUrlRequest, ControlState};
use super::{
    http_error, ok_text, parse_parameters, reconfigure_and_return_ok, write_and_reconfigure,
};
use crate::error_handling::FilterError;

fn filter_error(e: FilterError) -> Response {
    let status = match e {
        FilterError::Save { .. } | FilterError::Remove(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    http_error(status, e.to_string())
}

/// Extracts the `url` parameter of a `key=value` body.
fn url_parameter(body: &str) -> Result<String, Response> {
    let mut parameters = parse_parameters(body).map_err(|e| {
        http_error(
            StatusCode::BAD_REQUEST,
            format!("failed to parse parameters from body: {e}"),
        )
    })?;
    parameters
        .remove("url")
        .ok_or_else(|| filter_error(FilterError::MissingUrl))
}

/// `GET /control/filtering/status`
pub async fn filtering_status_handler(State(state): State<ControlState>) -> Response {
    Json(state.filters.status().await).into_response()
}

async fn set_filtering(state: ControlState, enabled: bool) -> Response {
    state.filters.set_filtering_enabled(enabled);
    reconfigure_and_return_ok(&state).await
}

/// `POST /control/filtering/enable`
pub async fn filtering_enable_handler(State(state): State<ControlState>) -> Response {
    set_filtering(state, true).await
}

/// `POST /control/filtering/disable`
pub async fn filtering_disable_handler(State(state): State<ControlState>) -> Response {
    set_filtering(state, false).await
}

/// `PUT /control/filtering/add_url`, body `{"url": ..., "name": ...}`
pub async fn add_url_handler(State(state): State<ControlState>, body: Bytes) -> Response {
    let request: AddUrlRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return http_error(
                StatusCode::BAD_REQUEST,
                format!("Failed to parse request body json: {e}"),
            )
        }
    };

    let list = match state.filters.add(&request.url, request.name.as_deref()).await {
        Ok(list) => list,
        Err(e) => return filter_error(e),
    };
    if let Err(response) = write_and_reconfigure(&state).await {
        return response;
    }
    ok_text(format!("OK {} rules\n", list.rules_count))
}

/// `DELETE /control/filtering/remove_url`, body `url=...`
pub async fn remove_url_handler(State(state): State<ControlState>, body: String) -> Response {
    let url = match url_parameter(&body) {
        Ok(url) => url,
        Err(response) => return response,
    };
    if let Err(e) = state.filters.remove(&url).await {
        return filter_error(e);
    }
    reconfigure_and_return_ok(&state).await
}

/// `POST /control/filtering/enable_url`, body `url=...`
pub async fn enable_url_handler(State(state): State<ControlState>, body: String) -> Response {
    let url = match url_parameter(&body) {
        Ok(url) => url,
        Err(response) => return response,
    };
    if let Err(e) = state.filters.enable(&url).await {
        return filter_error(e);
    }
    reconfigure_and_return_ok(&state).await
}

/// `POST /control/filtering/disable_url`, body `url=...`
pub async fn disable_url_handler(State(state): State<ControlState>, body: String) -> Response {
    let url = match url_parameter(&body) {
        Ok(url) => url,
        Err(response) => return response,
    };
    if let Err(e) = state.filters.disable(&url).await {
        return filter_error(e);
    }
    reconfigure_and_return_ok(&state).await
}

/// `POST /control/filtering/refresh[?force=1]`
pub async fn refresh_handler(
    State(state): State<ControlState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let force = params.get("force").is_some_and(|v| !v.is_empty());
    let updated = state.filters.refresh(force).await;
    if updated > 0 {
        if let Err(response) = write_and_reconfigure(&state).await {
            return response;
        }
    }
    ok_text(format!("OK {updated} filters updated\n"))
}

/// `PUT /control/filtering/set_rules`, one rule per line
pub async fn set_rules_handler(State(state): State<ControlState>, body: String) -> Response {
    state.filters.set_user_rules(&body).await;
    reconfigure_and_return_ok(&state).await
}
