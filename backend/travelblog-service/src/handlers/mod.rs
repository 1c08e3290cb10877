/// HTTP handlers for the travel blog API
///
/// - auth: sign-up, sign-in, sign-out, current user
/// - posts: feed, compose, like, comment, delete, "my blogs"
/// - tags: region tag index lookup
/// - media: serves images held by in-process object storage
/// - health: liveness and dependency checks
pub mod auth;
pub mod health;
pub mod media;
pub mod posts;
pub mod tags;

pub use auth::{me, sign_in, sign_out, sign_up};
pub use health::{health, liveness};
pub use media::get_media;
pub use posts::{add_comment, create_post, delete_post, get_feed, like_post, my_posts};
pub use tags::get_tag;
