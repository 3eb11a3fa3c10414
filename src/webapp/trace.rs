//! Request tracing middleware
//!
//! Adds a correlation ID span to each request for log tracing.

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{Instrument, info_span};

/// Generate a short random hex ID
fn gen_id() -> String {
    format!("{:06x}", rand::random::<u32>() & 0xFFFFFF)
}

/// Wrap each request in a root span carrying a correlation ID.
///
/// The span has no parent so a client retrying with an `Authorization`
/// header starts a fresh trace rather than nesting under the challenge.
pub async fn trace_request(request: Request, next: Next) -> Response {
    let id = gen_id();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = info_span!(parent: None, "httpd", %id, %method, %path);

    async move {
        let response = next.run(request).await;
        tracing::debug!(status = response.status().as_u16(), "Request finished");
        response
    }
    .instrument(span)
    .await
}
