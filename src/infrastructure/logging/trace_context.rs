use axum::http::HeaderMap;

pub const TRACE_HEADER: &str = "x-trace-id";

/// Trace ID creation and propagation
pub struct TraceContext;

impl TraceContext {
    pub fn new_trace_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Trace ID from the `x-trace-id` header, or a fresh one
    pub fn extract_or_generate(headers: &HeaderMap) -> String {
        headers
            .get(TRACE_HEADER)
            .and_then(|h| h.to_str().ok())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(Self::new_trace_id)
    }
}
