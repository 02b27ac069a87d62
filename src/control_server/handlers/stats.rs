//! Statistics handlers.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::super::types::ControlState;
use super::{http_error, ok_text};
use crate::stats::HistoryQuery;

/// `GET /control/stats`
pub async fn stats_handler(State(state): State<ControlState>) -> Response {
    Json(state.stats.aggregate()).into_response()
}

/// `GET /control/stats_top`
pub async fn stats_top_handler(State(state): State<ControlState>) -> Response {
    Json(state.stats.top_all()).into_response()
}

fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> &'a str {
    params.get(name).map(String::as_str).unwrap_or_default()
}

/// `GET /control/stats_history?time_unit=..&start_time=..&end_time=..`
pub async fn stats_history_handler(
    State(state): State<ControlState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query = HistoryQuery::parse(
        param(&params, "time_unit"),
        param(&params, "start_time"),
        param(&params, "end_time"),
    );
    match query {
        Ok(query) => Json(state.stats.history(&query)).into_response(),
        Err(e) => http_error(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// `POST /control/stats_reset`
pub async fn stats_reset_handler(State(state): State<ControlState>) -> Response {
    state.stats.purge();
    ok_text("OK\n")
}
