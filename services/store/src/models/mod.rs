//! Record store models

pub mod notification;
pub mod post;
pub mod user;

// Re-export for convenience
pub use notification::{JUST_NOW, NewNotification, Notification};
pub use post::{FeedEntry, NewPost, Post};
pub use user::{NewUser, User};
