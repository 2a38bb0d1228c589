use super::{count_field, opt_str, require_str, timestamp_field};
use crate::domain::entities::{Post, PostStatus};
use crate::shared::error::AppError;
use serde_json::Value;

pub fn map_post(row: &Value) -> Result<Post, AppError> {
    let status_raw = require_str(row, "status")?;
    let status = PostStatus::parse(status_raw).ok_or_else(|| {
        AppError::Serialization(format!("Unknown post status '{status_raw}'"))
    })?;

    let tags = match row.get("tags") {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .map(|tag| tag.to_string())
            .collect(),
        _ => Vec::new(),
    };

    let post = Post {
        id: require_str(row, "id")?.to_string(),
        title: require_str(row, "title")?.to_string(),
        body: require_str(row, "body")?.to_string(),
        excerpt: opt_str(row, "excerpt"),
        category: require_str(row, "category")?.to_string(),
        tags: Vec::new(),
        author_id: require_str(row, "author_id")?.to_string(),
        author_name: require_str(row, "author_name")?.to_string(),
        created_at: timestamp_field(row, "created_at")?,
        status,
        like_count: count_field(row, "like_count"),
        comment_count: count_field(row, "comment_count"),
        featured_image: opt_str(row, "featured_image"),
    };

    Ok(post.with_tags(tags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_row() -> Value {
        json!({
            "id": "post-1",
            "title": "Hello",
            "body": "Body text",
            "excerpt": null,
            "category": "tech",
            "tags": ["rust", "blog", "rust"],
            "author_id": "user-1",
            "author_name": "Alice",
            "created_at": 1_700_000_000_000_i64,
            "status": "published",
            "like_count": 4,
            "comment_count": 2,
            "featured_image": "img/cover.png"
        })
    }

    #[test]
    fn maps_full_row() {
        let post = map_post(&sample_row()).unwrap();
        assert_eq!(post.id, "post-1");
        assert_eq!(post.status, PostStatus::Published);
        assert_eq!(post.tags, vec!["rust".to_string(), "blog".to_string()]);
        assert_eq!(post.like_count, 4);
        assert_eq!(post.featured_image.as_deref(), Some("img/cover.png"));
    }

    #[test]
    fn unknown_status_is_a_serialization_error() {
        let mut row = sample_row();
        row["status"] = json!("archived");
        let err = map_post(&row).unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn missing_title_is_rejected() {
        let mut row = sample_row();
        row.as_object_mut().unwrap().remove("title");
        assert!(map_post(&row).is_err());
    }
}
