use crate::http::types::{HttpError, HttpResult, HttpSuccess, SetLogLevelRequest, WebhookAck};
use crate::http::HttpState;
use crate::relay::{RelayOutcome, SkipReason, WebhookPayload};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::str::FromStr;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Returned to webhook callers on failure, upstream error bodies stay in the logs.
pub const RELAY_FAILED_MESSAGE: &str = "Failed to relay message";

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/webhook",
    tag = "Webhook",
    request_body = crate::relay::WebhookPayload,
    responses(
        (status = 200, description = "Delivery handled or ignored", body = crate::http::types::WebhookAck,
            example = json!({"status": "success"})),
        (status = 500, description = "Completion or messaging call failed", body = crate::http::types::ErrorResponse,
            example = json!({"success": false, "error": "Failed to relay message"}))
    )
))]
#[instrument(skip_all, fields(delivery_id = %Uuid::new_v4()))]
pub async fn webhook(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<Json<WebhookAck>, HttpError> {
    let outcome = match serde_json::from_slice::<WebhookPayload>(&body) {
        Ok(payload) => state.relay.handle(payload).await,
        Err(e) => {
            debug!("Ignoring unparseable webhook body: {e}");
            Ok(RelayOutcome::Skipped(SkipReason::Malformed))
        }
    };

    match outcome {
        Ok(RelayOutcome::Replied { to, .. }) => debug!("Reply delivered to {to}"),
        Ok(RelayOutcome::Skipped(reason)) => debug!("Acknowledged without reply: {reason}"),
        Err(e) => {
            error!("Failed to relay webhook: {e}");
            return Err(HttpError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: RELAY_FAILED_MESSAGE.to_string(),
            });
        }
    }

    Ok(Json(WebhookAck::SUCCESS))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/sys/version",
    tag = "System",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Version retrieved successfully", body = crate::http::types::SuccessfulResponse<String>,
            example = json!({"success": true, "response": "0.1.0+rustls"}))
    )
))]
pub async fn sys_version(State(_state): State<HttpState>) -> HttpResult<String> {
    Ok(HttpSuccess(crate::VERSION.to_string()))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/sys/set-log-level",
    tag = "System",
    security(("bearer_auth" = [])),
    request_body = crate::http::types::SetLogLevelRequest,
    responses(
        (status = 200, body = crate::http::types::SuccessfulResponse<bool>)
    )
))]
pub async fn sys_set_log_level(
    State(state): State<HttpState>,
    Json(payload): Json<SetLogLevelRequest>,
) -> HttpResult<bool> {
    let filter = EnvFilter::from_str(&payload.level).map_err(|e| HttpError {
        status: StatusCode::BAD_REQUEST,
        message: e.to_string(),
    })?;

    info!("Setting log level to {filter} via API");
    let success = state
        .tracing_reload
        .reload(filter)
        .map(|_| true)
        .map_err(|e| HttpError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        })?;

    Ok(HttpSuccess(success))
}
