use crate::domain::value_objects::Principal;
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// リモートストア上のコレクション名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Posts,
    Comments,
    Engagements,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Posts => "posts",
            Collection::Comments => "comments",
            Collection::Engagements => "engagements",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 等値・不等値・集合包含の述語。フィルタは述語の論理積。
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq(column.into(), value.into())
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Ne(column.into(), value.into())
    }

    pub fn is_in(column: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In(column.into(), values)
    }

    pub fn column(&self) -> &str {
        match self {
            Predicate::Eq(column, _) | Predicate::Ne(column, _) | Predicate::In(column, _) => {
                column
            }
        }
    }
}

/// 大文字小文字を無視した部分一致検索
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpec {
    pub columns: Vec<String>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: &'static str,
    pub ascending: bool,
}

impl SortSpec {
    pub fn asc(column: &'static str) -> Self {
        Self {
            column,
            ascending: true,
        }
    }

    pub fn desc(column: &'static str) -> Self {
        Self {
            column,
            ascending: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub offset: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub filters: Vec<Predicate>,
    pub search: Option<SearchSpec>,
    /// 先頭のキーが主ソート、以降がタイブレーク
    pub sort: Vec<SortSpec>,
    pub range: Option<Range>,
    /// totalCount の算出を要求するか
    pub count: bool,
}

impl QueryOptions {
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn search(mut self, columns: Vec<String>, text: impl Into<String>) -> Self {
        self.search = Some(SearchSpec {
            columns,
            text: text.into(),
        });
        self
    }

    pub fn sort(mut self, spec: SortSpec) -> Self {
        self.sort.push(spec);
        self
    }

    pub fn range(mut self, offset: u32, limit: u32) -> Self {
        self.range = Some(Range { offset, limit });
        self
    }

    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }
}

/// 生レコードはこの境界を型付けされないまま通過する。
/// 型付けは呼び出し直後にマッパ層で行う。
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub rows: Vec<Value>,
    pub total_count: Option<u64>,
}

/// 単一レコードを指すキー。posts / comments は id 単独、
/// engagements は (post_id, user_id, kind) の複合キー。
#[derive(Debug, Clone, PartialEq)]
pub struct RecordKey(Vec<(String, Value)>);

impl RecordKey {
    pub fn id(value: impl Into<Value>) -> Self {
        Self(vec![("id".to_string(), value.into())])
    }

    pub fn composite(parts: Vec<(String, Value)>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[(String, Value)] {
        &self.0
    }
}

/// リモートリレーショナルストアへの問い合わせ境界。
/// 全操作は非同期で、トランスポート・認可・NotFound の失敗があり得る。
/// 複数コレクションにまたがる操作のアトミック性は保証しない。
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn query(
        &self,
        collection: Collection,
        options: QueryOptions,
    ) -> Result<QueryResult, AppError>;

    async fn insert(&self, collection: Collection, record: Value) -> Result<Value, AppError>;

    async fn update(
        &self,
        collection: Collection,
        key: RecordKey,
        patch: Value,
    ) -> Result<Value, AppError>;

    async fn delete(&self, collection: Collection, key: RecordKey) -> Result<(), AppError>;

    /// 現在の認証主体。匿名の場合は None。
    async fn current_principal(&self) -> Result<Option<Principal>, AppError>;
}
