use crate::error::{AppError, Result};
use crate::AppState;
use actix_web::{web, HttpResponse};

/// Serve an uploaded image by object key
pub async fn get_media(state: web::Data<AppState>, key: web::Path<String>) -> Result<HttpResponse> {
    let key = key.into_inner();
    let object = state
        .storage
        .download(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No image stored at {}", key)))?;

    Ok(HttpResponse::Ok()
        .content_type(object.content_type)
        .insert_header(("Cache-Control", "public, max-age=31536000, immutable"))
        .body(object.bytes))
}
