/// Feed controller - fetch, create, like, comment and delete posts
///
/// Owns the last fetched feed. Writes go to the document store first and the
/// cache is only touched once the remote write succeeded, so a failed call
/// leaves the feed exactly as it was.
///
/// Create ordering: image upload -> post write -> tag update -> refetch.
/// An uploaded image without a post is tolerated; a post without its tag
/// entry is not and gets deleted again.
use super::tags::TagIndexer;
use crate::error::{AppError, Result};
use crate::metrics::feed::{record, FEED_FETCH_DURATION_SECONDS};
use crate::models::{
    BlogStats, Comment, CommentRecord, NewCommentRecord, NewPostRecord, Post, PostRecord, Region,
    UserIdentity, MAX_POST_CHARS,
};
use crate::storage::ObjectStorage;
use crate::store::{
    encode, Direction, Document, DocumentSnapshot, DocumentStore, Query, StoreError, StoreResult,
    CREATED_AT_FIELD,
};
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

const POSTS: &str = "posts";
const COMMENTS: &str = "comments";
const LIKED_BY_FIELD: &str = "likedByUserIds";
const UPVOTE_COUNT_FIELD: &str = "upvoteCount";

static UNSAFE_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid file name pattern"));

/// Image file picked in the composer.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Unvalidated composer input.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    pub region: Option<String>,
    pub image: Option<ImageUpload>,
}

/// Draft that passed local validation.
struct ValidPost {
    text: String,
    region: Region,
    image: ImageUpload,
}

pub struct FeedController {
    store: Arc<dyn DocumentStore>,
    storage: Arc<dyn ObjectStorage>,
    tags: TagIndexer,
    cache: RwLock<Vec<Post>>,
    max_image_bytes: usize,
}

impl FeedController {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            tags: TagIndexer::new(store.clone()),
            store,
            storage,
            cache: RwLock::new(Vec::new()),
            max_image_bytes,
        }
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    pub fn tags(&self) -> &TagIndexer {
        &self.tags
    }

    /// Last fetched feed, newest first.
    pub async fn cached_feed(&self) -> Vec<Post> {
        self.cache.read().await.clone()
    }

    pub async fn cached_post(&self, post_id: &str) -> Option<Post> {
        self.cache
            .read()
            .await
            .iter()
            .find(|post| post.id == post_id)
            .cloned()
    }

    /// Fetch every post newest first, with comments, and replace the cache.
    ///
    /// The cache stays write-locked for the whole load so a like or comment
    /// landing mid-fetch is applied on top of the new snapshot, not under it.
    pub async fn fetch_feed(&self) -> Result<Vec<Post>> {
        let mut cache = self.cache.write().await;
        let timer = FEED_FETCH_DURATION_SECONDS.start_timer();
        let result = self.load_posts(Query::new()).await;
        timer.observe_duration();

        let posts = observe("fetch_feed", result)?;
        *cache = posts.clone();
        tracing::debug!(count = posts.len(), "feed refreshed");
        Ok(posts)
    }

    /// Validate, upload the image, write the post, tag it and refresh the feed.
    pub async fn create_post(&self, author: &UserIdentity, draft: PostDraft) -> Result<Post> {
        let result: Result<Post> = async {
            let valid = self.validate(draft)?;
            self.publish(author, valid).await
        }
        .await;
        observe("create_post", result)
    }

    /// Flip `user_id`'s like on a cached post.
    ///
    /// The toggle runs atomically against the stored document and keeps
    /// `upvoteCount` equal to the size of `likedByUserIds`.
    pub async fn toggle_like(&self, post_id: &str, user_id: &str) -> Result<Post> {
        let result = self.apply_like(post_id, user_id).await;
        observe("toggle_like", result)
    }

    /// Store a comment and append it to the cached post.
    pub async fn add_comment(
        &self,
        post_id: &str,
        text: &str,
        author_id: &str,
        author_name: &str,
    ) -> Result<Comment> {
        let result = self
            .write_comment(post_id, text, author_id, author_name)
            .await;
        observe("add_comment", result)
    }

    /// Delete a post owned by `requester_id`. Its comments and tag entry stay behind.
    pub async fn delete_post(&self, post_id: &str, requester_id: &str) -> Result<()> {
        let result = self.remove_post(post_id, requester_id).await;
        observe("delete_post", result)
    }

    /// Posts written by `author_id`, newest first.
    pub async fn posts_by_author(&self, author_id: &str) -> Result<Vec<Post>> {
        let result = self
            .load_posts(Query::new().where_eq("authorId", author_id))
            .await;
        observe("posts_by_author", result)
    }

    pub async fn blog_stats(&self, author_id: &str) -> Result<BlogStats> {
        let posts = self.posts_by_author(author_id).await?;
        Ok(BlogStats::from_posts(&posts))
    }

    fn validate(&self, draft: PostDraft) -> Result<ValidPost> {
        let text = draft.text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Post text is required".to_string()));
        }
        if text.chars().count() > MAX_POST_CHARS {
            return Err(AppError::Validation(format!(
                "Post text must be at most {} characters",
                MAX_POST_CHARS
            )));
        }

        let region: Region = draft.region.as_deref().unwrap_or_default().parse()?;

        let image = draft
            .image
            .ok_or_else(|| AppError::Validation("Please select an image".to_string()))?;

        let is_image = image
            .content_type
            .parse::<mime::Mime>()
            .map(|m| m.type_() == mime::IMAGE)
            .unwrap_or(false);
        if !is_image {
            return Err(AppError::Validation(format!(
                "Unsupported image type '{}'",
                image.content_type
            )));
        }
        if image.bytes.is_empty() {
            return Err(AppError::Validation("Image file is empty".to_string()));
        }
        if image.bytes.len() > self.max_image_bytes {
            return Err(AppError::Validation(format!(
                "Image exceeds the {} byte limit",
                self.max_image_bytes
            )));
        }

        Ok(ValidPost {
            text: text.to_string(),
            region,
            image,
        })
    }

    async fn publish(&self, author: &UserIdentity, post: ValidPost) -> Result<Post> {
        let key = format!(
            "images/{}-{}",
            Uuid::new_v4(),
            sanitize_file_name(&post.image.file_name)
        );
        let image_url = self
            .storage
            .upload(&key, post.image.bytes, &post.image.content_type)
            .await?;

        let record = NewPostRecord {
            author_id: author.uid.clone(),
            author_name: author.display_name.clone(),
            author_photo: author.photo_url.clone(),
            text: post.text,
            image_url,
            region: post.region,
            upvote_count: 0,
            liked_by_user_ids: Vec::new(),
        };
        let snapshot = self.store.add(POSTS, encode(&record)?).await?;
        let post_id = snapshot.id.clone();

        if let Err(err) = self.tags.record_tag(post.region, &post_id).await {
            tracing::error!(%post_id, region = %post.region, "tag update failed: {}", err);
            if let Err(cleanup) = self.store.delete(POSTS, &post_id).await {
                tracing::error!(%post_id, "failed to remove untagged post: {}", cleanup);
            }
            return Err(AppError::Transport(format!(
                "Could not tag post with {}: {}",
                post.region, err
            )));
        }

        tracing::info!(%post_id, user_id = %author.uid, region = %post.region, "post created");

        let created = post_from_snapshot(&snapshot)?;
        match self.fetch_feed().await {
            Ok(feed) => Ok(feed
                .into_iter()
                .find(|p| p.id == post_id)
                .unwrap_or(created)),
            Err(err) => {
                tracing::warn!(%post_id, "refetch after create failed: {}", err);
                self.cache.write().await.insert(0, created.clone());
                Ok(created)
            }
        }
    }

    async fn apply_like(&self, post_id: &str, user_id: &str) -> Result<Post> {
        let comments = self
            .cached_post(post_id)
            .await
            .map(|post| post.comments)
            .ok_or_else(|| AppError::NotFound(format!("Post {} is not in the feed", post_id)))?;

        let id = post_id.to_string();
        let uid = user_id.to_string();
        let snapshot = self
            .store
            .modify(
                POSTS,
                post_id,
                Box::new(move |current: Option<Document>| -> StoreResult<Document> {
                    let mut data = current.ok_or_else(|| StoreError::not_found(POSTS, &id))?;
                    let mut liked: Vec<String> = match data.get(LIKED_BY_FIELD) {
                        Some(value) => serde_json::from_value(value.clone())?,
                        None => Vec::new(),
                    };

                    if liked.contains(&uid) {
                        liked.retain(|existing| existing != &uid);
                    } else {
                        liked.push(uid);
                    }

                    data.insert(UPVOTE_COUNT_FIELD.to_string(), Value::from(liked.len()));
                    data.insert(LIKED_BY_FIELD.to_string(), Value::from(liked));
                    Ok(data)
                }),
            )
            .await?;

        let mut post = post_from_snapshot(&snapshot)?;
        post.comments = comments;

        let mut cache = self.cache.write().await;
        if let Some(slot) = cache.iter_mut().find(|p| p.id == post.id) {
            *slot = post.clone();
        }

        tracing::debug!(post_id, user_id, likes = post.upvote_count, "like toggled");
        Ok(post)
    }

    async fn write_comment(
        &self,
        post_id: &str,
        text: &str,
        author_id: &str,
        author_name: &str,
    ) -> Result<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Comment cannot be empty".to_string()));
        }
        if self.cached_post(post_id).await.is_none() {
            return Err(AppError::NotFound(format!(
                "Post {} is not in the feed",
                post_id
            )));
        }

        let author_name = match author_name.trim() {
            "" => "Anonymous",
            name => name,
        };
        let record = NewCommentRecord {
            post_id: post_id.to_string(),
            author_id: author_id.to_string(),
            author_name: author_name.to_string(),
            text: text.to_string(),
        };
        let snapshot = self.store.add(COMMENTS, encode(&record)?).await?;
        let comment = Comment::from_record(snapshot.id.clone(), snapshot.decode::<CommentRecord>()?);

        let mut cache = self.cache.write().await;
        if let Some(post) = cache.iter_mut().find(|p| p.id == post_id) {
            post.comments.push(comment.clone());
        }

        tracing::debug!(post_id, comment_id = %comment.id, "comment added");
        Ok(comment)
    }

    async fn remove_post(&self, post_id: &str, requester_id: &str) -> Result<()> {
        let author_id = self
            .cached_post(post_id)
            .await
            .map(|post| post.author_id)
            .ok_or_else(|| AppError::NotFound(format!("Post {} is not in the feed", post_id)))?;

        if author_id != requester_id {
            return Err(AppError::Forbidden(
                "Only the author can delete this post".to_string(),
            ));
        }

        if !self.store.delete(POSTS, post_id).await? {
            tracing::warn!(post_id, "post was already gone from the store");
        }
        self.cache.write().await.retain(|p| p.id != post_id);

        tracing::info!(post_id, user_id = requester_id, "post deleted");
        Ok(())
    }

    async fn load_posts(&self, query: Query) -> Result<Vec<Post>> {
        let snapshots = self
            .store
            .query(POSTS, query.order_by(CREATED_AT_FIELD, Direction::Descending))
            .await?;

        let mut comments: HashMap<String, Vec<Comment>> = HashMap::new();
        for snapshot in self
            .store
            .query(
                COMMENTS,
                Query::new().order_by(CREATED_AT_FIELD, Direction::Ascending),
            )
            .await?
        {
            let comment = Comment::from_record(snapshot.id.clone(), snapshot.decode()?);
            comments
                .entry(comment.post_id.clone())
                .or_default()
                .push(comment);
        }

        snapshots
            .iter()
            .map(|snapshot| {
                let mut post = post_from_snapshot(snapshot)?;
                post.comments = comments.remove(&post.id).unwrap_or_default();
                Ok(post)
            })
            .collect()
    }
}

fn post_from_snapshot(snapshot: &DocumentSnapshot) -> Result<Post> {
    let record: PostRecord = snapshot.decode()?;
    Ok(Post::from_record(snapshot.id.clone(), record))
}

/// Keep object keys URL-safe: anything outside `[A-Za-z0-9._-]` becomes `_`.
fn sanitize_file_name(name: &str) -> String {
    let cleaned = UNSAFE_FILE_CHARS.replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Count the outcome and log remote failures.
fn observe<T>(operation: &str, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => record(operation, "success"),
        Err(err) => {
            if err.is_transport() {
                tracing::error!(operation, "remote call failed: {}", err);
            }
            record(operation, err.kind());
        }
    }
    result
}
