use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub feed: FeedConfig,
    pub related: RelatedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// 1ページあたりの取得件数
    pub page_size: u32,
    pub admin_page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedConfig {
    /// 関連記事の最大表示件数
    pub limit: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/tsuzuri.db".to_string(),
                max_connections: 5,
                connection_timeout: 30,
            },
            feed: FeedConfig {
                page_size: 10,
                admin_page_size: 20,
            },
            related: RelatedConfig { limit: 3 },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("TSUZURI_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v;
            }
        }
        if let Ok(v) = std::env::var("TSUZURI_FEED_PAGE_SIZE") {
            if let Some(value) = parse_u32(&v) {
                cfg.feed.page_size = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("TSUZURI_ADMIN_PAGE_SIZE") {
            if let Some(value) = parse_u32(&v) {
                cfg.feed.admin_page_size = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("TSUZURI_RELATED_LIMIT") {
            if let Some(value) = parse_u32(&v) {
                cfg.related.limit = value;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.feed.page_size == 0 {
            return Err("Feed page_size must be greater than 0".to_string());
        }
        if self.feed.admin_page_size == 0 {
            return Err("Feed admin_page_size must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}
