pub mod comment_dto;
pub mod feed_dto;
pub mod post_dto;

pub use comment_dto::CommentView;
pub use feed_dto::FeedPageView;
pub use post_dto::PostView;
