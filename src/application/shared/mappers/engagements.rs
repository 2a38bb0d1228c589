use super::{require_str, timestamp_field};
use crate::domain::entities::{EngagementKind, EngagementRecord};
use crate::shared::error::AppError;
use serde_json::{json, Value};

pub fn map_engagement(row: &Value) -> Result<EngagementRecord, AppError> {
    let kind_raw = require_str(row, "kind")?;
    let kind = EngagementKind::parse(kind_raw).ok_or_else(|| {
        AppError::Serialization(format!("Unknown engagement kind '{kind_raw}'"))
    })?;

    Ok(EngagementRecord::from_parts(
        require_str(row, "post_id")?.to_string(),
        require_str(row, "user_id")?.to_string(),
        kind,
        timestamp_field(row, "created_at")?,
    ))
}

/// insert 用のレコード表現
pub fn engagement_record(record: &EngagementRecord) -> Value {
    json!({
        "post_id": record.post_id(),
        "user_id": record.user_id(),
        "kind": record.kind().as_str(),
        "created_at": record.created_at().timestamp_millis(),
    })
}
