use crate::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Dependency check: document store and object storage must both answer.
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let documents = match state.store.ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            tracing::warn!("document store health check failed: {}", e);
            format!("error: {}", e)
        }
    };
    let storage = match state.storage.ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            tracing::warn!("object storage health check failed: {}", e);
            format!("error: {}", e)
        }
    };

    let healthy = documents == "ok" && storage == "ok";
    let body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "checks": {
            "documents": documents,
            "storage": storage,
        },
    });

    if healthy {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "alive" }))
}
