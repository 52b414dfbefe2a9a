mod routes;
pub mod types;

#[cfg(feature = "openapi")]
mod openapi;

use crate::config::HTTPConfig;
use crate::http::routes::*;
use crate::http::types::HttpError;
use crate::relay::Relay;
use crate::TracingReloadHandle;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::routing::{get, post};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, warn};

#[cfg(feature = "openapi")]
use utoipa::OpenApi;

#[cfg(feature = "sentry")]
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};

#[derive(Clone)]
pub struct HttpState {
    pub relay: Arc<Relay>,
    pub tracing_reload: TracingReloadHandle,
}

async fn auth_middleware(
    axum::extract::State(expected_token): axum::extract::State<String>,
    headers: axum::http::HeaderMap,
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, HttpError> {
    let auth_header = headers.get("authorization").ok_or(HttpError {
        status: StatusCode::UNAUTHORIZED,
        message: "Missing authorization header".to_string(),
    })?;

    let auth_str = auth_header.to_str().map_err(|_| HttpError {
        status: StatusCode::BAD_REQUEST,
        message: "Invalid authorization header".to_string(),
    })?;

    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str).trim();
    if token != expected_token {
        return Err(HttpError {
            status: StatusCode::UNAUTHORIZED,
            message: "Invalid token".to_string(),
        });
    }

    Ok(next.run(request).await)
}

/// The webhook is always public. System routes are mounted behind the bearer
/// token, unmounted when a token is required but missing, or public when
/// authentication is disabled.
pub fn create_app(
    config: &HTTPConfig,
    http_auth_token: Option<String>,
    relay: Arc<Relay>,
    _sentry: bool,
    tracing_reload: TracingReloadHandle,
) -> axum::Router {
    let mut router = axum::Router::new().route("/webhook", post(webhook));

    let system_routes = axum::Router::new()
        .route("/sys/version", get(sys_version))
        .route("/sys/set-log-level", post(sys_set_log_level));

    match (config.require_authentication, http_auth_token) {
        (true, Some(token)) => {
            debug!("Adding HTTP authentication middleware to system routes!");
            router = router.merge(
                system_routes.layer(axum::middleware::from_fn_with_state(token, auth_middleware)),
            );
        }
        (true, None) => {
            warn!("Missing RELAY_HTTP_AUTH_TOKEN environment variable while require_authentication is enabled, system routes are disabled!");
        }
        (false, _) => {
            warn!("Serving system routes without authentication middleware, as require_authentication is disabled!");
            router = router.merge(system_routes);
        }
    }

    #[cfg(feature = "openapi")]
    {
        debug!("Adding OpenAPI SwaggerUi at /docs!");
        router = router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs")
                .url("/docs/openapi.json", openapi::ApiDoc::openapi()),
        );
    }

    router = router.layer(ServiceBuilder::new().layer(SetResponseHeaderLayer::overriding(
        HeaderName::from_static("x-version"),
        HeaderValue::from_static(crate::VERSION),
    )));

    // If Sentry is enabled, include axum integration layers.
    #[cfg(feature = "sentry")]
    if _sentry {
        debug!("Adding Sentry HTTP layer!");
        router = router
            .layer(
                ServiceBuilder::new()
                    .layer(NewSentryLayer::<axum::http::Request<axum::body::Body>>::new_from_top()),
            )
            .layer(ServiceBuilder::new().layer(SentryHttpLayer::new().enable_transaction()))
    }

    let state = HttpState {
        relay,
        tracing_reload,
    };
    router.with_state(state)
}
