//! HTTP control API.
//!
//! Serves the administrative endpoints under `/control/` on a plain HTTP
//! listener and, when TLS is configured and usable, on an HTTPS listener.
//! Both listeners are kept armed by supervisors and can be moved at runtime
//! through the API itself.

mod handlers;
mod hooks;
mod types;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_HTTPS_PORT;
use crate::error_handling::ListenerError;
use crate::listener::{join_host_port, supervise, ListenerSlot, ManagedListener};
use crate::tls::build_server_config;

use handlers::*;
pub use hooks::{FileConfigHooks, ReconfigureHooks};
pub use types::{ConfigSnapshot, ControlSettings, ControlState, StatusResponse};

fn routes() -> Router<ControlState> {
    Router::new()
        .route("/control/status", get(status_handler))
        .route("/control/enable_protection", post(enable_protection_handler))
        .route("/control/disable_protection", post(disable_protection_handler))
        .route("/control/filtering/status", get(filtering_status_handler))
        .route("/control/filtering/enable", post(filtering_enable_handler))
        .route("/control/filtering/disable", post(filtering_disable_handler))
        .route("/control/filtering/add_url", put(add_url_handler))
        .route("/control/filtering/remove_url", delete(remove_url_handler))
        .route("/control/filtering/enable_url", post(enable_url_handler))
        .route("/control/filtering/disable_url", post(disable_url_handler))
        .route("/control/filtering/refresh", post(refresh_handler))
        .route("/control/filtering/set_rules", put(set_rules_handler))
        .route("/control/tls/status", get(tls_status_handler))
        .route("/control/tls/validate", post(tls_validate_handler))
        .route("/control/tls/configure", post(tls_configure_handler))
        .route("/control/stats", get(stats_handler))
        .route("/control/stats_top", get(stats_top_handler))
        .route("/control/stats_history", get(stats_history_handler))
        .route("/control/stats_reset", post(stats_reset_handler))
        .route("/control/set_upstream_dns", post(set_upstream_dns_handler))
        .route("/control/test_upstream_dns", post(test_upstream_dns_handler))
        .route("/control/http/configure", post(http_configure_handler))
}

/// Router served on the plain HTTP listener.
///
/// Redirects to HTTPS when `force_https` is set and the HTTPS listener is up.
pub fn control_router(state: ControlState) -> Router {
    routes()
        .layer(middleware::from_fn_with_state(state.clone(), redirect_to_https))
        .with_state(state)
}

/// Router served on the HTTPS listener.
pub fn https_router(state: ControlState) -> Router {
    routes().with_state(state)
}

/// Strips the port from a `Host` header value.
fn host_without_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}

fn https_location(host: &str, port: u16, uri: &Uri) -> String {
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    if port == DEFAULT_HTTPS_PORT {
        format!("https://{host}{path}")
    } else {
        format!("https://{host}:{port}{path}")
    }
}

async fn redirect_to_https(State(state): State<ControlState>, request: Request, next: Next) -> Response {
    let target = {
        let settings = state.settings.read().await;
        let tls = &settings.tls;
        (tls.enabled && tls.force_https && settings.tls_status.usable)
            .then(|| (tls.server_name.clone(), tls.port_https))
    };
    let Some((server_name, port)) = target else {
        return next.run(request).await;
    };
    if !state.https_listener.is_bound().await {
        return next.run(request).await;
    }

    let host = if server_name.is_empty() {
        request
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(host_without_port)
            .unwrap_or_default()
            .to_string()
    } else {
        server_name
    };
    if host.is_empty() {
        return next.run(request).await;
    }
    Redirect::temporary(&https_location(&host, port, request.uri())).into_response()
}

async fn bind_control(state: ControlState) -> Result<Option<Arc<dyn ManagedListener>>, ListenerError> {
    let addr = {
        let settings = state.settings.read().await;
        join_host_port(&settings.bind_host, settings.bind_port)
    };
    let slot = ListenerSlot::serve_plain(&addr, control_router(state.clone())).await?;
    log::info!("Control API available at http://{}/", slot.local_addr());
    Ok(Some(Arc::new(slot) as Arc<dyn ManagedListener>))
}

async fn bind_https(state: ControlState) -> Result<Option<Arc<dyn ManagedListener>>, ListenerError> {
    let (addr, tls) = {
        let settings = state.settings.read().await;
        if !settings.tls.enabled {
            return Ok(None);
        }
        if !settings.tls_status.usable {
            log::warn!(
                "HTTPS is enabled but the certificate is not usable: {}",
                settings.tls_status.warning_validation
            );
            return Ok(None);
        }
        (
            join_host_port(&settings.bind_host, settings.tls.port_https),
            settings.tls.clone(),
        )
    };
    let config = build_server_config(&tls)?;
    let slot = ListenerSlot::serve_tls(&addr, https_router(state.clone()), config).await?;
    log::info!("Control API available at https://{}/", slot.local_addr());
    Ok(Some(Arc::new(slot) as Arc<dyn ManagedListener>))
}

/// Serves the plain control listener until `cancel` fires, rebinding after every restart.
pub async fn run_control_listener(state: ControlState, cancel: CancellationToken) {
    let coordinator = state.control_listener.clone();
    supervise(coordinator, cancel, move || bind_control(state.clone())).await;
}

/// Serves the HTTPS listener until `cancel` fires, rebinding after every restart.
///
/// Nothing is served while TLS is disabled or the certificate is not usable.
pub async fn run_https_listener(state: ControlState, cancel: CancellationToken) {
    let coordinator = state.https_listener.clone();
    supervise(coordinator, cancel, move || bind_https(state.clone())).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_without_port() {
        assert_eq!(host_without_port("dns.example.test:3000"), "dns.example.test");
        assert_eq!(host_without_port("dns.example.test"), "dns.example.test");
        assert_eq!(host_without_port("[::1]:3000"), "[::1]");
        assert_eq!(host_without_port("[::1"), "[::1");
    }

    #[test]
    fn test_https_location() {
        let uri: Uri = "/control/status?x=1".parse().unwrap();
        assert_eq!(
            https_location("dns.example.test", 443, &uri),
            "https://dns.example.test/control/status?x=1"
        );
        assert_eq!(
            https_location("dns.example.test", 8443, &uri),
            "https://dns.example.test:8443/control/status?x=1"
        );
    }
}
