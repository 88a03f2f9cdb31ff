//! HTTP request metrics.
//!
//! Labels use the matched route template (`/api/tenants/{tenant}/logs`),
//! not the raw path, so tenant ids never become label values.

use std::time::Instant;

use {
    axum::{
        body::Body,
        extract::MatchedPath,
        http::Request,
        middleware::Next,
        response::Response,
    },
    therra_metrics::{counter, histogram, http as http_metrics, labels},
};

pub async fn http_metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    let status = response.status().as_u16().to_string();

    counter!(
        http_metrics::REQUESTS_TOTAL,
        labels::ROUTE => route.clone(),
        labels::STATUS => status.clone()
    )
    .increment(1);
    histogram!(
        http_metrics::REQUEST_DURATION_SECONDS,
        labels::ROUTE => route,
        labels::STATUS => status
    )
    .record(start.elapsed().as_secs_f64());

    response
}
