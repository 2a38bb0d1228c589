use crate::application::ports::data_source::DataSource;
use crate::application::services::{
    AdminService, CommentService, EngagementService, FeedService, RelatedService,
};
use crate::domain::value_objects::Principal;
use crate::infrastructure::database::{ConnectionPool, SqliteDataSource};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use tokio::sync::RwLock;

/// 1ページ分のアプリケーション状態。
///
/// 単一の DataSource を全サービスへ配線する。認証主体はページ読み込み時に
/// 一度だけ解決し、以降のイベントハンドラはそのスナップショットを参照する。
/// タブやページをまたいだ共有はしない。
pub struct AppState {
    pub data_source: Arc<dyn DataSource>,
    pub feed: Arc<FeedService>,
    pub admin_feed: Arc<FeedService>,
    pub engagement: Arc<EngagementService>,
    pub comments: Arc<CommentService>,
    pub related: Arc<RelatedService>,
    pub admin: Arc<AdminService>,
    related_limit: usize,
    principal: RwLock<Option<Principal>>,
}

impl AppState {
    pub fn new(data_source: Arc<dyn DataSource>, config: &AppConfig) -> Self {
        Self {
            feed: Arc::new(FeedService::new(data_source.clone(), config.feed.page_size)),
            admin_feed: Arc::new(FeedService::for_admin(
                data_source.clone(),
                config.feed.admin_page_size,
            )),
            engagement: Arc::new(EngagementService::new(data_source.clone())),
            comments: Arc::new(CommentService::new(data_source.clone())),
            related: Arc::new(RelatedService::new(data_source.clone())),
            admin: Arc::new(AdminService::new(data_source.clone())),
            related_limit: config.related.limit as usize,
            principal: RwLock::new(None),
            data_source,
        }
    }

    /// SQLite バックエンドで初期化する（スキーマ適用込み）。
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        config.validate().map_err(AppError::Configuration)?;

        let pool = ConnectionPool::new(
            &config.database.url,
            config.database.max_connections,
        )
        .await?;
        pool.migrate().await?;

        let data_source: Arc<dyn DataSource> = Arc::new(SqliteDataSource::new(pool));
        Ok(Self::new(data_source, config))
    }

    /// ページ読み込みの起点。認証主体をここで一度だけ解決する。
    pub async fn begin_page(&self) -> Result<Option<Principal>, AppError> {
        let principal = self.data_source.current_principal().await?;
        *self.principal.write().await = principal.clone();
        Ok(principal)
    }

    /// 直近の begin_page で解決した主体
    pub async fn principal(&self) -> Option<Principal> {
        self.principal.read().await.clone()
    }

    pub fn related_limit(&self) -> usize {
        self.related_limit
    }
}
