//! Control listener rebind handler.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;

use super::super::types::{ControlState, HttpSettingsRequest};
use super::{http_error, ok_text, reconfigure_error};
use crate::error_handling::ListenerError;
use crate::listener::{check_port_available, join_host_port, with_flush_ack};

/// `POST /control/http/configure`, body `{"ip": ..., "port": ...}`
///
/// Moves the plain control listener. The new address is checked first; the
/// old listener closes after this response has been written and the
/// supervisor binds the new one.
pub async fn http_configure_handler(State(state): State<ControlState>, body: Bytes) -> Response {
    let request: HttpSettingsRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return http_error(
                StatusCode::BAD_REQUEST,
                format!("Failed to parse new config json: {e}"),
            )
        }
    };
    let ip = request.ip.trim().to_string();
    if ip.is_empty() || request.port == 0 {
        return http_error(StatusCode::BAD_REQUEST, "Must specify valid ip and port");
    }

    let moving = {
        let settings = state.settings.read().await;
        settings.bind_host != ip || settings.bind_port != request.port
    };
    if moving {
        if let Err(e) = check_port_available(&ip, request.port).await {
            let reason = match &e {
                ListenerError::Bind { source, .. } => source.to_string(),
                other => other.to_string(),
            };
            return http_error(
                StatusCode::BAD_REQUEST,
                format!(
                    "Impossible to listen on IP:port {} due to {reason}",
                    join_host_port(&ip, request.port)
                ),
            );
        }
    }

    let committed = state
        .save_settings(|settings| {
            let restart = settings.bind_host != ip || settings.bind_port != request.port;
            settings.bind_host = ip;
            settings.bind_port = request.port;
            restart
        })
        .await;
    let restart = match committed {
        Ok(restart) => restart,
        Err(e) => return reconfigure_error(e),
    };

    let response = match state.reload().await {
        Ok(()) => ok_text("OK\n"),
        Err(e) => reconfigure_error(e),
    };
    if !restart {
        return response;
    }
    log::info!("Control listener address changed, will rebind");
    let (response, flushed) = with_flush_ack(response);
    state.control_listener.request_restart(Some(flushed));
    response
}
