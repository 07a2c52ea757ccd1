use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

use crate::infrastructure::logging::{TraceContext, TRACE_HEADER};

/// Trace ID of the current request, available to handlers as an extension
#[derive(Debug, Clone)]
pub struct TraceId(pub String);

/// - reuses an incoming `x-trace-id` header, otherwise generates one
/// - echoes it on the response
pub async fn add_trace_id(mut request: Request, next: Next) -> Response {
    let trace_id = TraceContext::extract_or_generate(request.headers());
    request.extensions_mut().insert(TraceId(trace_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(header_value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_HEADER, header_value);
    }

    response
}
