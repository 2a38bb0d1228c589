use crate::domain::entities::Post;
use serde::{Deserialize, Serialize};

/// 描画層へ渡す記事ビュー。振る舞いは持たない。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: String,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub category: String,
    pub tags: Vec<String>,
    pub author_id: String,
    pub author_name: String,
    pub created_at: i64,
    pub status: String,
    pub like_count: u32,
    pub comment_count: u32,
    pub featured_image: Option<String>,
}

impl From<&Post> for PostView {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            body: post.body.clone(),
            excerpt: post.excerpt_or_derived(),
            category: post.category.clone(),
            tags: post.tags.clone(),
            author_id: post.author_id.clone(),
            author_name: post.author_name.clone(),
            created_at: post.created_at.timestamp_millis(),
            status: post.status.as_str().to_string(),
            like_count: post.like_count,
            comment_count: post.comment_count,
            featured_image: post.featured_image.clone(),
        }
    }
}
