pub mod engagement_state;
pub mod feed_query;
pub mod principal;

pub use engagement_state::EngagementState;
pub use feed_query::{FeedQuery, SortKey};
pub use principal::Principal;
