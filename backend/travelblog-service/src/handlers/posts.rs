/// Post handlers - feed, compose, like, comment, delete and "my blogs"
use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::{BlogStats, Post};
use crate::services::{ImageUpload, PostDraft};
use crate::AppState;
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures_util::stream::StreamExt;
use serde::{Deserialize, Serialize};

/// A post as rendered for one viewer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub liked_by_viewer: bool,
    pub preview: String,
    pub truncated: bool,
}

impl PostView {
    pub fn for_viewer(post: Post, viewer_id: &str) -> Self {
        Self {
            liked_by_viewer: post.is_liked_by(viewer_id),
            preview: post.preview(),
            truncated: post.is_truncated(),
            post,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub posts: Vec<PostView>,
    /// True when the store could not be reached and the last fetched feed is shown.
    pub stale: bool,
}

#[derive(Debug, Serialize)]
pub struct MyPostsResponse {
    pub posts: Vec<PostView>,
    pub stats: BlogStats,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

fn views(posts: Vec<Post>, viewer_id: &str) -> Vec<PostView> {
    posts
        .into_iter()
        .map(|post| PostView::for_viewer(post, viewer_id))
        .collect()
}

/// Full feed, newest first
pub async fn get_feed(state: web::Data<AppState>, current: CurrentUser) -> Result<HttpResponse> {
    let (posts, stale) = match state.feed.fetch_feed().await {
        Ok(posts) => (posts, false),
        Err(err) if err.is_transport() => (state.feed.cached_feed().await, true),
        Err(err) => return Err(err),
    };

    Ok(HttpResponse::Ok().json(FeedResponse {
        posts: views(posts, &current.user.uid),
        stale,
    }))
}

/// Create a post from a multipart form with `text`, `region` and `image` fields
pub async fn create_post(
    state: web::Data<AppState>,
    current: CurrentUser,
    mut payload: Multipart,
) -> Result<HttpResponse> {
    let limit = state.feed.max_image_bytes();
    let mut draft = PostDraft::default();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::Validation(format!("Malformed upload: {}", e)))?;

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => draft.text = read_text(&mut field).await?,
            "region" => draft.region = Some(read_text(&mut field).await?),
            "image" => {
                let file_name = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .unwrap_or("image")
                    .to_string();
                let content_type = field
                    .content_type()
                    .map(|m| m.essence_str().to_string())
                    .unwrap_or_default();
                let bytes = read_bytes(&mut field, limit).await?;

                // Browsers send an empty part when no file was picked.
                if !bytes.is_empty() {
                    draft.image = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            other => {
                tracing::debug!(field = other, "ignoring unknown form field");
                read_bytes(&mut field, 0).await?;
            }
        }
    }

    let post = state.feed.create_post(&current.user, draft).await?;
    Ok(HttpResponse::Created().json(PostView::for_viewer(post, &current.user.uid)))
}

/// Toggle the viewer's like
pub async fn like_post(
    state: web::Data<AppState>,
    current: CurrentUser,
    post_id: web::Path<String>,
) -> Result<HttpResponse> {
    let post = state.feed.toggle_like(&post_id, &current.user.uid).await?;
    Ok(HttpResponse::Ok().json(PostView::for_viewer(post, &current.user.uid)))
}

pub async fn add_comment(
    state: web::Data<AppState>,
    current: CurrentUser,
    post_id: web::Path<String>,
    req: web::Json<CommentRequest>,
) -> Result<HttpResponse> {
    let comment = state
        .feed
        .add_comment(
            &post_id,
            &req.text,
            &current.user.uid,
            &current.user.display_name,
        )
        .await?;

    Ok(HttpResponse::Created().json(comment))
}

pub async fn delete_post(
    state: web::Data<AppState>,
    current: CurrentUser,
    post_id: web::Path<String>,
) -> Result<HttpResponse> {
    state.feed.delete_post(&post_id, &current.user.uid).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// The viewer's own posts with aggregate counts
pub async fn my_posts(state: web::Data<AppState>, current: CurrentUser) -> Result<HttpResponse> {
    let posts = state.feed.posts_by_author(&current.user.uid).await?;
    let stats = BlogStats::from_posts(&posts);

    Ok(HttpResponse::Ok().json(MyPostsResponse {
        posts: views(posts, &current.user.uid),
        stats,
    }))
}

async fn read_text(field: &mut Field) -> Result<String> {
    let bytes = read_bytes(field, 4 * 1024).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Drain a field, keeping at most `limit + 1` bytes so oversize uploads are
/// still detectable without buffering them whole.
async fn read_bytes(field: &mut Field, limit: usize) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::Validation(format!("Malformed upload: {}", e)))?;
        let room = (limit + 1).saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
    Ok(buf.freeze())
}
