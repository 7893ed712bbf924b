//! SQLite repositories backing the local record store

pub mod like;
pub mod notification;
pub mod post;
pub mod user;

pub use like::LikeRepository;
pub use notification::NotificationRepository;
pub use post::PostRepository;
pub use user::UserRepository;
