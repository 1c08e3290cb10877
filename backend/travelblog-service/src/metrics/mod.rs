//! Prometheus collectors for the travel blog.
//!
//! `feed` counts feed controller operations by outcome and times full feed
//! fetches. Everything registers in the default registry and is rendered as
//! text by `GET /metrics`.

use actix_web::HttpResponse;
use prometheus::{Encoder, TextEncoder};

pub mod feed;

/// Render the default registry in the Prometheus text format.
pub fn render() -> Result<(String, Vec<u8>), prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}

pub async fn serve_metrics() -> HttpResponse {
    match render() {
        Ok((content_type, body)) => HttpResponse::Ok().content_type(content_type).body(body),
        Err(err) => {
            tracing::error!("metrics encoding failed: {}", err);
            HttpResponse::InternalServerError().body(err.to_string())
        }
    }
}
