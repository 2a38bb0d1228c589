use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// コメントエンティティ。作成後は不変。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(post_id: String, author_id: String, body: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            post_id,
            author_id,
            body,
            created_at: Utc::now(),
        }
    }
}
