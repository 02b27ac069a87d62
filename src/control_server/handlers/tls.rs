//! TLS settings handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::super::types::ControlState;
use super::{http_error, reconfigure_error};
use crate::listener::{check_port_available, with_flush_ack};
use crate::tls::{
    decode_tls_payload, encode_tls_payload, restart_required, validate_certificates, TlsSettings,
};

/// Decodes the request and checks the HTTPS port unless the listener already holds it.
async fn decode_and_check_port(state: &ControlState, body: &[u8]) -> Result<TlsSettings, Response> {
    let data = decode_tls_payload(body).map_err(|e| {
        http_error(
            StatusCode::BAD_REQUEST,
            format!("Failed to unmarshal TLS config: {e}"),
        )
    })?;

    if data.enabled && !state.https_listener.is_bound().await {
        let host = state.settings.read().await.bind_host.clone();
        if let Err(e) = check_port_available(&host, data.port_https).await {
            log::debug!("HTTPS port check failed: {e}");
            return Err(http_error(
                StatusCode::BAD_REQUEST,
                format!(
                    "port {} is not available, cannot enable HTTPS on it",
                    data.port_https
                ),
            ));
        }
    }
    Ok(data)
}

/// `GET /control/tls/status`
pub async fn tls_status_handler(State(state): State<ControlState>) -> Response {
    let settings = state.settings.read().await;
    Json(encode_tls_payload(&settings.tls, &settings.tls_status)).into_response()
}

/// `POST /control/tls/validate`
pub async fn tls_validate_handler(State(state): State<ControlState>, body: Bytes) -> Response {
    let data = match decode_and_check_port(&state, &body).await {
        Ok(data) => data,
        Err(response) => return response,
    };
    let status = validate_certificates(&data);
    Json(encode_tls_payload(&data, &status)).into_response()
}

/// `POST /control/tls/configure`
///
/// When a listener-affecting setting changed, the HTTPS listener is restarted
/// once this response has been written.
pub async fn tls_configure_handler(State(state): State<ControlState>, body: Bytes) -> Response {
    let data = match decode_and_check_port(&state, &body).await {
        Ok(data) => data,
        Err(response) => return response,
    };
    let status = validate_certificates(&data);

    // Compared against the settings that were last written successfully
    let committed = state
        .save_settings(|settings| {
            let restart = restart_required(&settings.tls, &data);
            settings.tls = data.clone();
            settings.tls_status = status.clone();
            restart
        })
        .await;
    let restart = match committed {
        Ok(restart) => restart,
        Err(e) => return reconfigure_error(e),
    };

    // The new settings are current even if the reload fails, so the
    // restart still has to happen
    let response = match state.reload().await {
        Ok(()) => Json(encode_tls_payload(&data, &status)).into_response(),
        Err(e) => reconfigure_error(e),
    };
    if !restart {
        return response;
    }
    log::info!("TLS settings have changed, will restart HTTPS listener");
    let (response, flushed) = with_flush_ack(response);
    state.https_listener.request_restart(Some(flushed));
    response
}
