pub mod admin_service;
pub mod comment_service;
pub mod engagement_service;
pub mod feed_service;
pub mod related_service;

pub use admin_service::{AdminService, BulkDeleteOutcome};
pub use comment_service::CommentService;
pub use engagement_service::{EngagementService, EngagementSnapshot};
pub use feed_service::{FeedPage, FeedService};
pub use related_service::RelatedService;
