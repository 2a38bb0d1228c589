use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const EXCERPT_MAX_CHARS: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            _ => None,
        }
    }
}

/// ブログ記事エンティティ。
/// like_count / comment_count は表示用の投影値であり、
/// クライアント側では楽観的更新または再取得でのみ変化する。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub body: String,
    pub excerpt: Option<String>,
    pub category: String,
    pub tags: Vec<String>,
    pub author_id: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub status: PostStatus,
    pub like_count: u32,
    pub comment_count: u32,
    pub featured_image: Option<String>,
}

impl Post {
    /// 明示的な抜粋がなければ本文先頭から導出する
    pub fn excerpt_or_derived(&self) -> String {
        if let Some(excerpt) = self.excerpt.as_ref() {
            if !excerpt.trim().is_empty() {
                return excerpt.clone();
            }
        }
        derive_excerpt(&self.body)
    }

    /// タグを順序維持のまま重複排除する
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = dedup_tags(tags);
        self
    }

    pub fn tag_overlap(&self, other: &Post) -> usize {
        self.tags
            .iter()
            .filter(|tag| other.tags.contains(tag))
            .count()
    }
}

fn derive_excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= EXCERPT_MAX_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().take(EXCERPT_MAX_CHARS).collect()
}

fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}
