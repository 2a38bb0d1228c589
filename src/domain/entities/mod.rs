pub mod comment;
pub mod engagement;
pub mod post;

pub use comment::Comment;
pub use engagement::{EngagementKind, EngagementRecord};
pub use post::{Post, PostStatus};
