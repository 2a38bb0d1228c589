use crate::application::ports::data_source::{
    Collection, DataSource, Predicate, QueryOptions, SortSpec,
};
use crate::application::shared::mappers::map_post;
use crate::domain::entities::{Post, PostStatus};
use crate::shared::error::AppError;
use std::sync::Arc;
use tracing::warn;

/// 候補の取り過ぎを防ぐ上限。limit 件へ絞る前のランキング対象数。
const CANDIDATE_FETCH_LIMIT: u32 = 20;

/// 記事詳細ページの「関連記事」を解決する。
///
/// カテゴリ一致を一次条件、タグの重なり数を二次条件として順位付けする。
/// ベストエフォートであり、失敗しても本文の描画を妨げない（空リストに縮退）。
pub struct RelatedService {
    data_source: Arc<dyn DataSource>,
}

impl RelatedService {
    pub fn new(data_source: Arc<dyn DataSource>) -> Self {
        Self { data_source }
    }

    pub async fn related_to(&self, post: &Post, limit: usize) -> Vec<Post> {
        match self.fetch_candidates(post).await {
            Ok(mut candidates) => {
                // タグの重なりが多い順、同数なら新しい順
                candidates.sort_by(|a, b| {
                    post.tag_overlap(b)
                        .cmp(&post.tag_overlap(a))
                        .then_with(|| b.created_at.cmp(&a.created_at))
                });
                candidates.truncate(limit);
                candidates
            }
            Err(err) => {
                warn!("related content lookup failed for post {}: {err}", post.id);
                Vec::new()
            }
        }
    }

    async fn fetch_candidates(&self, post: &Post) -> Result<Vec<Post>, AppError> {
        let options = QueryOptions::default()
            .filter(Predicate::eq("category", post.category.as_str()))
            .filter(Predicate::eq("status", PostStatus::Published.as_str()))
            .filter(Predicate::ne("id", post.id.as_str()))
            .sort(SortSpec::desc("created_at"))
            .range(0, CANDIDATE_FETCH_LIMIT);
        let result = self.data_source.query(Collection::Posts, options).await?;

        let mut candidates = Vec::with_capacity(result.rows.len());
        for row in &result.rows {
            candidates.push(map_post(row)?);
        }
        Ok(candidates)
    }
}
