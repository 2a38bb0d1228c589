use crate::domain::value_objects::Principal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// エンゲージメントの種別（いいね / 保存）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    Like,
    Save,
}

impl EngagementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementKind::Like => "like",
            EngagementKind::Save => "save",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "like" => Some(EngagementKind::Like),
            "save" => Some(EngagementKind::Save),
            _ => None,
        }
    }
}

impl fmt::Display for EngagementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ユーザーと記事の間のエンゲージメント関係。
/// (post_id, user_id, kind) が複合キーで、レコードの存在が関係の成立を意味する。
/// 更新されることはなく、作成と削除のみ。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementRecord {
    post_id: String,
    user_id: String,
    kind: EngagementKind,
    created_at: DateTime<Utc>,
}

impl EngagementRecord {
    /// 現在時刻で新しいエンゲージメントを作成する。
    pub fn new(post_id: String, principal: &Principal, kind: EngagementKind) -> Self {
        Self {
            post_id,
            user_id: principal.id().to_string(),
            kind,
            created_at: Utc::now(),
        }
    }

    /// 既存レコードから復元する。
    pub fn from_parts(
        post_id: String,
        user_id: String,
        kind: EngagementKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            post_id,
            user_id,
            kind,
            created_at,
        }
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn kind(&self) -> EngagementKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrips_through_str() {
        assert_eq!(EngagementKind::parse("like"), Some(EngagementKind::Like));
        assert_eq!(EngagementKind::parse("save"), Some(EngagementKind::Save));
        assert_eq!(EngagementKind::parse("boost"), None);
        assert_eq!(EngagementKind::Like.as_str(), "like");
    }
}
