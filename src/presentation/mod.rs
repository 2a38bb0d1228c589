pub mod dto;

pub use dto::{CommentView, FeedPageView, PostView};
