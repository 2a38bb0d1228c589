use super::post_dto::PostView;
use crate::application::services::FeedPage;
use crate::domain::value_objects::SortKey;
use serde::{Deserialize, Serialize};

fn sort_label(sort: SortKey) -> &'static str {
    match sort {
        SortKey::Newest => "newest",
        SortKey::Oldest => "oldest",
        SortKey::Popular => "popular",
    }
}

/// フィード1ページ分のビュー。検索・ソート条件も描画層へそのまま渡す。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPageView {
    pub items: Vec<PostView>,
    pub total_count: u64,
    pub page: u32,
    pub search: String,
    pub sort: String,
}

impl From<&FeedPage> for FeedPageView {
    fn from(page: &FeedPage) -> Self {
        Self {
            items: page.items.iter().map(PostView::from).collect(),
            total_count: page.total_count,
            page: page.query.page(),
            search: page.query.search().to_string(),
            sort: sort_label(page.query.sort()).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Post, PostStatus};
    use crate::domain::value_objects::FeedQuery;
    use chrono::Utc;

    #[test]
    fn feed_page_maps_to_plain_view_data() {
        let post = Post {
            id: "p1".into(),
            title: "Title".into(),
            body: "a".repeat(200),
            excerpt: None,
            category: "tech".into(),
            tags: vec!["rust".into()],
            author_id: "author-1".into(),
            author_name: "Alice".into(),
            created_at: Utc::now(),
            status: PostStatus::Published,
            like_count: 3,
            comment_count: 1,
            featured_image: None,
        };
        let page = FeedPage {
            items: vec![post],
            total_count: 25,
            query: FeedQuery::first_page("rust", SortKey::Popular),
        };

        let view = FeedPageView::from(&page);
        assert_eq!(view.page, 1);
        assert_eq!(view.sort, "popular");
        assert_eq!(view.search, "rust");
        assert_eq!(view.items[0].excerpt.chars().count(), 160);
    }
}
