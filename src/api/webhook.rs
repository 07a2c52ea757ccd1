use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{info, warn};

use crate::api::middleware::TraceId;
use crate::infrastructure::logging::Timer;
use crate::models::BuildEvent;
use crate::state::AppContext;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "circleci-signature";

#[derive(Serialize)]
pub struct WebhookResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl WebhookResponse {
    fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            status: "error",
            message: Some(message),
        }
    }
}

/// Build results posted by the CircleCI orb
pub async fn circleci_webhook(
    State(ctx): State<AppContext>,
    Extension(TraceId(trace_id)): Extension<TraceId>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let timer = Timer::start();
    ctx.logger.api_entry(&trace_id, "POST", "/webhook", "webhook_received");

    if let Some(secret) = ctx.config.webhook_secret.as_deref() {
        if let Err(e) = verify_signature(secret, &headers, &body) {
            warn!("[{}] Webhook signature verification failed: {}", trace_id, e);
            ctx.logger.api_exit(&trace_id, "POST", "/webhook", timer.elapsed_ms(), 401);
            return (
                StatusCode::UNAUTHORIZED,
                Json(WebhookResponse::error("Invalid signature".to_string())),
            );
        }
    }

    let event: BuildEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("[{}] Failed to parse webhook payload: {}", trace_id, e);
            ctx.logger.api_exit(&trace_id, "POST", "/webhook", timer.elapsed_ms(), 400);
            return (
                StatusCode::BAD_REQUEST,
                Json(WebhookResponse::error(format!("Invalid payload: {}", e))),
            );
        }
    };

    info!(
        "[{}] Received {} result for {}/{} build {}",
        trace_id, event.status, event.org_name, event.repo_name, event.build_num
    );

    // Delivery problems never bounce back to CircleCI
    if let Err(e) = ctx.notification_service.dispatch(&trace_id, &event).await {
        warn!("[{}] Failed to dispatch build result: {}", trace_id, e);
    }

    ctx.logger.api_exit(&trace_id, "POST", "/webhook", timer.elapsed_ms(), 200);
    (StatusCode::OK, Json(WebhookResponse::ok()))
}

/// `circleci-signature: v1=<hex hmac-sha256(body)>`, possibly among other
/// comma-separated versions
fn verify_signature(secret: &str, headers: &HeaderMap, body: &[u8]) -> Result<(), String> {
    let signature_header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or("Missing signature header")?;

    let signature = signature_header
        .split(',')
        .find_map(|part| part.trim().strip_prefix("v1="))
        .ok_or("Invalid signature format")?;
    let signature = hex::decode(signature).map_err(|e| format!("Invalid signature encoding: {}", e))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| format!("Invalid key: {}", e))?;
    mac.update(body);

    mac.verify_slice(&signature).map_err(|_| "Signature mismatch".to_string())
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(signature: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(signature).unwrap());
        headers
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"status":"success"}"#;
        assert!(verify_signature("s3cret", &headers(&sign("s3cret", body)), body).is_ok());

        let multi = format!("v2=ffff,{}", sign("s3cret", body));
        assert!(verify_signature("s3cret", &headers(&multi), body).is_ok());
    }

    #[test]
    fn test_invalid_signatures() {
        let body = br#"{"status":"success"}"#;
        assert!(verify_signature("s3cret", &HeaderMap::new(), body).is_err());
        assert!(verify_signature("s3cret", &headers(&sign("other", body)), body).is_err());
        assert!(verify_signature("s3cret", &headers("sha256=abcd"), body).is_err());
        assert!(verify_signature("s3cret", &headers("v1=zz"), body).is_err());
    }
}
