use super::{require_str, timestamp_field};
use crate::domain::entities::Comment;
use crate::shared::error::AppError;
use serde_json::{json, Value};

pub fn map_comment(row: &Value) -> Result<Comment, AppError> {
    Ok(Comment {
        id: require_str(row, "id")?.to_string(),
        post_id: require_str(row, "post_id")?.to_string(),
        author_id: require_str(row, "author_id")?.to_string(),
        body: require_str(row, "body")?.to_string(),
        created_at: timestamp_field(row, "created_at")?,
    })
}

/// insert 用のレコード表現
pub fn comment_record(comment: &Comment) -> Value {
    json!({
        "id": comment.id,
        "post_id": comment.post_id,
        "author_id": comment.author_id,
        "body": comment.body,
        "created_at": comment.created_at.timestamp_millis(),
    })
}
