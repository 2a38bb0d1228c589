pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
pub mod shared;
pub mod state;

pub use application::services::{
    AdminService, BulkDeleteOutcome, CommentService, EngagementService, FeedPage, FeedService,
    RelatedService,
};
pub use domain::entities::{Comment, EngagementKind, Post, PostStatus};
pub use domain::value_objects::{EngagementState, FeedQuery, Principal, SortKey};
pub use shared::{AppConfig, AppError, Result};
pub use state::AppState;

/// ログ設定の初期化。組み込み側が一度だけ呼ぶ。
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tsuzuri_core=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
