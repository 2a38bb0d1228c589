pub mod ports;
pub mod services;
pub mod shared;

pub use services::{AdminService, CommentService, EngagementService, FeedService, RelatedService};
