use serde::{Deserialize, Serialize};

/// フィードの並び順
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Newest,
    Oldest,
    /// いいね数の降順。同数の場合は作成日時の降順。
    Popular,
}

/// フィード1ページ分の問い合わせ条件。
/// ページサイズはコントローラ構築時に固定され、クエリには含めない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedQuery {
    search: String,
    sort: SortKey,
    page: u32,
}

impl FeedQuery {
    /// ページ番号は1始まり。
    pub fn new(search: impl Into<String>, sort: SortKey, page: u32) -> Result<Self, String> {
        if page == 0 {
            return Err("Feed page number must be 1 or greater".to_string());
        }
        Ok(Self {
            search: search.into().trim().to_string(),
            sort,
            page,
        })
    }

    pub fn first_page(search: impl Into<String>, sort: SortKey) -> Self {
        Self {
            search: search.into().trim().to_string(),
            sort,
            page: 1,
        }
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn has_search(&self) -> bool {
        !self.search.is_empty()
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// 同じ (search, sort) を指すクエリか。
    /// 異なる場合は前ページまでの結果キャッシュを破棄しなければならない。
    pub fn same_filters(&self, other: &FeedQuery) -> bool {
        self.search == other.search && self.sort == other.sort
    }

    pub fn next_page(&self) -> FeedQuery {
        FeedQuery {
            search: self.search.clone(),
            sort: self.sort,
            page: self.page + 1,
        }
    }

    pub fn offset(&self, page_size: u32) -> u32 {
        (self.page - 1) * page_size
    }
}
