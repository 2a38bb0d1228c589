use crate::application::ports::data_source::{
    Collection, DataSource, Predicate, QueryOptions, SortSpec,
};
use crate::application::shared::mappers::map_post;
use crate::domain::entities::{Post, PostStatus};
use crate::domain::value_objects::{FeedQuery, SortKey};
use crate::shared::error::AppError;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const SEARCH_COLUMNS: [&str; 2] = ["title", "body"];

/// フィード1ページ分の表示状態
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub items: Vec<Post>,
    pub total_count: u64,
    pub query: FeedQuery,
}

#[derive(Default)]
struct FeedState {
    /// 発行済みリクエストの通し番号
    last_issued: u64,
    /// 表示に反映済みの最大通し番号
    last_applied: u64,
    /// 最後に成功したページ（失敗時はこれを維持する）
    current: Option<FeedPage>,
}

/// 記事コレクションに対するページング・検索・ソート付きビューを駆動する。
///
/// 各 load / append には単調増加の通し番号が付き、より新しい番号の結果が
/// 反映済みであれば古い結果は到着時に破棄される（last-request-wins）。
/// 検索入力のデバウンスは呼び出し側の責務で、ここでは順序付けのみ行う。
pub struct FeedService {
    data_source: Arc<dyn DataSource>,
    page_size: u32,
    include_drafts: bool,
    state: Mutex<FeedState>,
}

impl FeedService {
    /// ページサイズは構築時に固定される。
    pub fn new(data_source: Arc<dyn DataSource>, page_size: u32) -> Self {
        Self {
            data_source,
            page_size: page_size.max(1),
            include_drafts: false,
            state: Mutex::new(FeedState::default()),
        }
    }

    /// 管理画面用。下書きも対象に含める。
    pub fn for_admin(data_source: Arc<dyn DataSource>, page_size: u32) -> Self {
        Self {
            include_drafts: true,
            ..Self::new(data_source, page_size)
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// 現在表示中のページ（最後に成功した結果）
    pub async fn current(&self) -> Option<FeedPage> {
        self.state.lock().await.current.clone()
    }

    fn build_options(&self, query: &FeedQuery) -> QueryOptions {
        let mut options = QueryOptions::default();

        if !self.include_drafts {
            options = options.filter(Predicate::eq("status", PostStatus::Published.as_str()));
        }

        if query.has_search() {
            options = options.search(
                SEARCH_COLUMNS.iter().map(|c| c.to_string()).collect(),
                query.search(),
            );
        }

        options = match query.sort() {
            SortKey::Newest => options.sort(SortSpec::desc("created_at")),
            SortKey::Oldest => options.sort(SortSpec::asc("created_at")),
            SortKey::Popular => options
                .sort(SortSpec::desc("like_count"))
                .sort(SortSpec::desc("created_at")),
        };

        options
            .range(query.offset(self.page_size), self.page_size)
            .with_count()
    }

    async fn issue_sequence(&self) -> u64 {
        let mut state = self.state.lock().await;
        state.last_issued += 1;
        state.last_issued
    }

    async fn fetch_page(&self, query: &FeedQuery) -> Result<FeedPage, AppError> {
        let result = self
            .data_source
            .query(Collection::Posts, self.build_options(query))
            .await?;

        let mut items = Vec::with_capacity(result.rows.len());
        for row in &result.rows {
            items.push(map_post(row)?);
        }

        let total_count = result.total_count.unwrap_or(items.len() as u64);

        Ok(FeedPage {
            items,
            total_count,
            query: query.clone(),
        })
    }

    /// 1ページ分を取得して表示状態を置き換える。
    ///
    /// 失敗時は直前の成功結果を維持したままエラーを返す（ビューは消さない）。
    /// より新しいリクエストの結果が先に反映されていた場合、この結果は破棄され、
    /// 反映済みのページを返す。
    pub async fn load(&self, query: FeedQuery) -> Result<FeedPage, AppError> {
        let sequence = self.issue_sequence().await;

        let page = match self.fetch_page(&query).await {
            Ok(page) => page,
            Err(err) => {
                warn!(sequence, "feed load failed, keeping last good page: {err}");
                return Err(err);
            }
        };

        let mut state = self.state.lock().await;
        if sequence <= state.last_applied {
            debug!(sequence, "discarding stale feed response");
            // 反映済みのより新しい結果をそのまま返す
            return Ok(state
                .current
                .clone()
                .unwrap_or(page));
        }

        state.last_applied = sequence;
        state.current = Some(page.clone());
        Ok(page)
    }

    /// 次ページを取得して現在の結果列に追記する（無限スクロール用）。
    ///
    /// 反映条件は「現在のページと同じ (search, sort) で、かつ直後のページ番号」。
    /// 条件を満たさない応答（フィルタ変更後に届いた古い続きページなど）は破棄する。
    pub async fn append_next(&self) -> Result<FeedPage, AppError> {
        let next_query = {
            let state = self.state.lock().await;
            let current = state.current.as_ref().ok_or_else(|| {
                AppError::validation("Cannot append before an initial load has succeeded")
            })?;
            current.query.next_page()
        };

        let sequence = self.issue_sequence().await;
        let page = match self.fetch_page(&next_query).await {
            Ok(page) => page,
            Err(err) => {
                warn!(sequence, "feed append failed, keeping last good page: {err}");
                return Err(err);
            }
        };

        let mut state = self.state.lock().await;
        let appendable = sequence > state.last_applied
            && state
                .current
                .as_ref()
                .map(|current| {
                    current.query.same_filters(&next_query)
                        && next_query.page() == current.query.page() + 1
                })
                .unwrap_or(false);

        if !appendable {
            debug!(sequence, "discarding stale feed append response");
            return Ok(state.current.clone().unwrap_or(page));
        }

        state.last_applied = sequence;
        let Some(current) = state.current.as_mut() else {
            return Ok(page);
        };
        current.items.extend(page.items);
        current.total_count = page.total_count;
        current.query = next_query;
        Ok(current.clone())
    }

    /// 記事詳細ページ用の単一記事ローダ。
    pub async fn load_post(&self, id: &str) -> Result<Post, AppError> {
        let mut options = QueryOptions::default()
            .filter(Predicate::eq("id", id))
            .range(0, 1);
        if !self.include_drafts {
            options = options.filter(Predicate::eq("status", PostStatus::Published.as_str()));
        }

        let result = self.data_source.query(Collection::Posts, options).await?;
        let row = result
            .rows
            .first()
            .ok_or_else(|| AppError::not_found(format!("Post '{id}' not found")))?;
        map_post(row)
    }
}
