//! Outbound propagation of W3C trace context and request ids.
//!
//! See: https://www.w3.org/TR/trace-context/

use opentelemetry::trace::TraceContextExt;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Header name for W3C traceparent
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Header name for request correlation ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Format the current span as a `traceparent` value
/// (`version-trace_id-span_id-flags`), if it carries a valid OTel context.
pub fn traceparent() -> Option<String> {
    let context = Span::current().context();
    let otel_span = context.span();
    let span_context = otel_span.span_context();

    if !span_context.is_valid() {
        return None;
    }

    Some(format!(
        "00-{}-{}-{:02x}",
        span_context.trace_id(),
        span_context.span_id(),
        span_context.trace_flags().to_u8()
    ))
}

/// Attach correlation headers to an outgoing `reqwest` request.
pub trait TraceHeadersExt: Sized {
    /// Add `traceparent` for the current span when one is active.
    fn with_trace_context(self) -> Self;

    /// Forward the caller's request id, if any.
    fn with_request_id(self, request_id: Option<&str>) -> Self;
}

impl TraceHeadersExt for reqwest::RequestBuilder {
    fn with_trace_context(self) -> Self {
        match traceparent() {
            Some(value) => self.header(TRACEPARENT_HEADER, value),
            None => self,
        }
    }

    fn with_request_id(self, request_id: Option<&str>) -> Self {
        match request_id {
            Some(id) if !id.is_empty() => self.header(REQUEST_ID_HEADER, id),
            _ => self,
        }
    }
}
