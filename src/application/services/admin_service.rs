use crate::application::ports::data_source::{Collection, DataSource, RecordKey};
use crate::shared::error::AppError;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// 一括削除の部分成功レポート。真偽値ではなく件数で返す。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkDeleteOutcome {
    pub success_count: usize,
    pub error_count: usize,
    pub failed_ids: Vec<String>,
}

/// 管理画面の操作。削除は子レコード（コメント、エンゲージメント）を
/// 先に消し、最後に記事本体を消す。1件の失敗でバッチは止めない。
pub struct AdminService {
    data_source: Arc<dyn DataSource>,
}

impl AdminService {
    pub fn new(data_source: Arc<dyn DataSource>) -> Self {
        Self { data_source }
    }

    /// 記事を1件削除する。子レコードの削除失敗は記事を残したまま失敗として返す。
    pub async fn delete_post(&self, post_id: &str) -> Result<(), AppError> {
        self.delete_children(post_id, Collection::Comments).await?;
        self.delete_children(post_id, Collection::Engagements).await?;
        self.data_source
            .delete(Collection::Posts, RecordKey::id(post_id))
            .await
    }

    /// 記事の一括削除。途中で失敗しても残りを続行し、成功/失敗件数を返す。
    pub async fn bulk_delete(&self, post_ids: &[String]) -> BulkDeleteOutcome {
        let mut outcome = BulkDeleteOutcome::default();
        for post_id in post_ids {
            match self.delete_post(post_id).await {
                Ok(()) => outcome.success_count += 1,
                Err(err) => {
                    warn!("bulk delete failed for post {post_id}: {err}");
                    outcome.error_count += 1;
                    outcome.failed_ids.push(post_id.clone());
                }
            }
        }
        outcome
    }

    /// 子レコードは存在しないこともある。NotFound は空として扱う。
    async fn delete_children(
        &self,
        post_id: &str,
        collection: Collection,
    ) -> Result<(), AppError> {
        let key = RecordKey::composite(vec![(
            "post_id".to_string(),
            Value::from(post_id),
        )]);
        match self.data_source.delete(collection, key).await {
            Ok(()) | Err(AppError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}
