/// Data models for the travel blog
///
/// This module defines:
/// - Post / Comment: feed entities with denormalized author snapshots
/// - Region: the fixed set of region tags
/// - TagIndexEntry: region -> post ids side index
/// - UserIdentity: the signed-in user as seen by the rest of the app
///
/// `*Record` types are the stored document shapes (camelCase field names);
/// the store assigns `id` and `createdAt`.
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Characters shown before the feed collapses post text behind "See More".
pub const PREVIEW_CHARS: usize = 20;

/// Maximum post text length in characters.
pub const MAX_POST_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Luzon,
    Visayas,
    Mindanao,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Luzon, Region::Visayas, Region::Mindanao];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Luzon => "Luzon",
            Region::Visayas => "Visayas",
            Region::Mindanao => "Mindanao",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("Please select a region".to_string()));
        }

        Region::ALL
            .into_iter()
            .find(|region| region.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| AppError::Validation(format!("Unknown region '{}'", trimmed)))
    }
}

/// Identity of a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub uid: String,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
}

/// Post document as written on creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPostRecord {
    pub author_id: String,
    pub author_name: String,
    pub author_photo: Option<String>,
    pub text: String,
    pub image_url: String,
    pub region: Region,
    pub upvote_count: u32,
    pub liked_by_user_ids: Vec<String>,
}

/// Post document as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub author_id: String,
    pub author_name: String,
    #[serde(default)]
    pub author_photo: Option<String>,
    pub text: String,
    #[serde(default)]
    pub image_url: String,
    pub region: Region,
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub upvote_count: u32,
    #[serde(default)]
    pub liked_by_user_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_photo: Option<String>,
    pub text: String,
    pub image_url: String,
    pub region: Region,
    pub created_at: DateTime<Utc>,
    pub upvote_count: u32,
    pub liked_by_user_ids: Vec<String>,
    pub comments: Vec<Comment>,
}

impl Post {
    pub fn from_record(id: String, record: PostRecord) -> Self {
        Self {
            id,
            author_id: record.author_id,
            author_name: record.author_name,
            author_photo: record.author_photo,
            text: record.text,
            image_url: record.image_url,
            region: record.region,
            created_at: record.created_at,
            upvote_count: record.upvote_count,
            liked_by_user_ids: record.liked_by_user_ids,
            comments: Vec::new(),
        }
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.liked_by_user_ids.iter().any(|id| id == user_id)
    }

    /// Text collapsed to `PREVIEW_CHARS` characters with a trailing ellipsis.
    pub fn preview(&self) -> String {
        if self.is_truncated() {
            let head: String = self.text.chars().take(PREVIEW_CHARS).collect();
            format!("{}...", head)
        } else {
            self.text.clone()
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.text.chars().count() > PREVIEW_CHARS
    }
}

/// Comment document as written on creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommentRecord {
    pub post_id: String,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub post_id: String,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn from_record(id: String, record: CommentRecord) -> Self {
        Self {
            id,
            post_id: record.post_id,
            author_id: record.author_id,
            author_name: record.author_name,
            text: record.text,
            created_at: record.created_at,
        }
    }
}

/// Stored shape of `tags/{region}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRecord {
    #[serde(default)]
    pub post_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagIndexEntry {
    pub region: Region,
    pub post_ids: Vec<String>,
}

/// Aggregate counts shown on the "my blogs" page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogStats {
    pub total_posts: usize,
    pub total_likes: usize,
}

impl BlogStats {
    pub fn from_posts<'a>(posts: impl IntoIterator<Item = &'a Post>) -> Self {
        posts.into_iter().fold(BlogStats::default(), |acc, post| BlogStats {
            total_posts: acc.total_posts + 1,
            total_likes: acc.total_likes + post.liked_by_user_ids.len(),
        })
    }
}
