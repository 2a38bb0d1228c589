use crate::application::ports::data_source::{
    Collection, DataSource, Predicate, QueryOptions, SortSpec,
};
use crate::application::shared::mappers::{comment_record, map_comment};
use crate::domain::entities::Comment;
use crate::domain::value_objects::Principal;
use crate::shared::error::AppError;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct Thread {
    post_id: String,
    comments: Vec<Comment>,
    count: u32,
}

/// 表示中の記事1件に対するコメント一覧と件数の投影を管理する。
///
/// 送信成功時のみ一覧へ追記し件数を +1 する。失敗時は一覧も件数も
/// 変更しない（入力テキストの保持は呼び出し側の責務）。
pub struct CommentService {
    data_source: Arc<dyn DataSource>,
    thread: Mutex<Option<Thread>>,
}

impl CommentService {
    pub fn new(data_source: Arc<dyn DataSource>) -> Self {
        Self {
            data_source,
            thread: Mutex::new(None),
        }
    }

    /// 記事のコメントスレッドを開く。作成日時の昇順で取得する。
    pub async fn open(&self, post_id: &str) -> Result<Vec<Comment>, AppError> {
        let options = QueryOptions::default()
            .filter(Predicate::eq("post_id", post_id))
            .sort(SortSpec::asc("created_at"));
        let result = self.data_source.query(Collection::Comments, options).await?;

        let mut comments = Vec::with_capacity(result.rows.len());
        for row in &result.rows {
            comments.push(map_comment(row)?);
        }

        let mut thread = self.thread.lock().await;
        *thread = Some(Thread {
            post_id: post_id.to_string(),
            count: comments.len() as u32,
            comments: comments.clone(),
        });
        Ok(comments)
    }

    /// コメントを送信する。本文が空白のみの場合はネットワークに触れず拒否する。
    pub async fn submit(
        &self,
        post_id: &str,
        principal: &Principal,
        body: &str,
    ) -> Result<Comment, AppError> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Err(AppError::validation("Comment body must not be empty"));
        }

        let comment = Comment::new(
            post_id.to_string(),
            principal.id().to_string(),
            trimmed.to_string(),
        );
        let inserted = self
            .data_source
            .insert(Collection::Comments, comment_record(&comment))
            .await?;
        let comment = map_comment(&inserted)?;

        let mut thread = self.thread.lock().await;
        match thread.as_mut() {
            Some(thread) if thread.post_id == post_id => {
                thread.comments.push(comment.clone());
                thread.count += 1;
            }
            _ => {
                *thread = Some(Thread {
                    post_id: post_id.to_string(),
                    comments: vec![comment.clone()],
                    count: 1,
                });
            }
        }
        Ok(comment)
    }

    /// 開いているスレッドのコメント一覧（作成順）。
    pub async fn comments(&self) -> Vec<Comment> {
        let thread = self.thread.lock().await;
        thread
            .as_ref()
            .map(|thread| thread.comments.clone())
            .unwrap_or_default()
    }

    /// 表示用のコメント件数投影。
    pub async fn count(&self) -> u32 {
        let thread = self.thread.lock().await;
        thread.as_ref().map_or(0, |thread| thread.count)
    }
}
