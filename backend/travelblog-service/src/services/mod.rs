/// Business logic layer for the travel blog
///
/// - `feed`: the feed controller (fetch, create, like, comment, delete)
/// - `tags`: region -> post id side index written after post creation
pub mod feed;
pub mod tags;

pub use feed::{FeedController, ImageUpload, PostDraft};
pub use tags::TagIndexer;
