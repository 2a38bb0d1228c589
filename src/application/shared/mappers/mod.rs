//! DataSource 境界の直後で生レコードを型付きエンティティへ変換する層。
//! 内部ロジックはここを通過した値しか扱わない。

pub mod comments;
pub mod engagements;
pub mod posts;

use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use serde_json::Value;

pub use comments::{comment_record, map_comment};
pub use engagements::{engagement_record, map_engagement};
pub use posts::map_post;

pub(crate) fn require_str<'a>(row: &'a Value, field: &str) -> Result<&'a str, AppError> {
    row.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| missing(field))
}

pub(crate) fn opt_str(row: &Value, field: &str) -> Option<String> {
    row.get(field)
        .and_then(Value::as_str)
        .map(|value| value.to_string())
}

pub(crate) fn require_i64(row: &Value, field: &str) -> Result<i64, AppError> {
    row.get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| missing(field))
}

pub(crate) fn count_field(row: &Value, field: &str) -> u32 {
    let raw = row.get(field).and_then(Value::as_i64).unwrap_or(0);
    u32::try_from(raw.max(0)).unwrap_or(u32::MAX)
}

/// created_at はエポックミリ秒で境界を通過する
pub(crate) fn timestamp_field(row: &Value, field: &str) -> Result<DateTime<Utc>, AppError> {
    let millis = require_i64(row, field)?;
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::Serialization(format!("Invalid timestamp in field '{field}'")))
}

fn missing(field: &str) -> AppError {
    AppError::Serialization(format!("Row is missing required field '{field}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_field_reports_its_name() {
        let row = json!({"id": "a"});
        let err = require_str(&row, "title").unwrap_err();
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn count_field_clamps_negative_values() {
        let row = json!({"like_count": -3});
        assert_eq!(count_field(&row, "like_count"), 0);
    }
}
