use crate::error::Result;
use crate::models::{Region, TagIndexEntry};
use crate::AppState;
use actix_web::{web, HttpResponse};

/// Post ids tagged with a region
pub async fn get_tag(state: web::Data<AppState>, region: web::Path<String>) -> Result<HttpResponse> {
    let region: Region = region.parse()?;
    let post_ids = state.feed.tags().posts_for(region).await?;

    Ok(HttpResponse::Ok().json(TagIndexEntry { region, post_ids }))
}
