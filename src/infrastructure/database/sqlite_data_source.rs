use super::connection_pool::ConnectionPool;
use crate::application::ports::data_source::{
    Collection, DataSource, Predicate, QueryOptions, QueryResult, RecordKey,
};
use crate::domain::value_objects::Principal;
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Copy)]
enum ColumnKind {
    Text,
    OptionalText,
    Integer,
    /// JSON 文字列として保存し、行変換時に展開する
    Json,
}

#[derive(Clone, Copy)]
struct Column {
    name: &'static str,
    kind: ColumnKind,
}

const fn text(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Text,
    }
}

const fn optional_text(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::OptionalText,
    }
}

const fn integer(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Integer,
    }
}

const POST_COLUMNS: &[Column] = &[
    text("id"),
    text("title"),
    text("body"),
    optional_text("excerpt"),
    text("category"),
    Column {
        name: "tags",
        kind: ColumnKind::Json,
    },
    text("author_id"),
    text("author_name"),
    integer("created_at"),
    text("status"),
    integer("like_count"),
    integer("comment_count"),
    optional_text("featured_image"),
];

const COMMENT_COLUMNS: &[Column] = &[
    text("id"),
    text("post_id"),
    text("author_id"),
    text("body"),
    integer("created_at"),
];

const ENGAGEMENT_COLUMNS: &[Column] = &[
    text("post_id"),
    text("user_id"),
    text("kind"),
    integer("created_at"),
];

fn columns(collection: Collection) -> &'static [Column] {
    match collection {
        Collection::Posts => POST_COLUMNS,
        Collection::Comments => COMMENT_COLUMNS,
        Collection::Engagements => ENGAGEMENT_COLUMNS,
    }
}

/// 動的に組み立てるSQLへ列名を渡す前のホワイトリスト検査
fn ensure_column(collection: Collection, name: &str) -> Result<(), AppError> {
    if columns(collection).iter().any(|column| column.name == name) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "Unknown column '{name}' for collection '{collection}'"
        )))
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::String(text) => {
            builder.push_bind(text.clone());
        }
        Value::Number(number) if number.is_i64() => {
            builder.push_bind(number.as_i64().unwrap_or_default());
        }
        Value::Number(number) => {
            builder.push_bind(number.as_f64().unwrap_or_default());
        }
        Value::Bool(flag) => {
            builder.push_bind(*flag);
        }
        Value::Null => {
            builder.push("NULL");
        }
        other => {
            builder.push_bind(other.to_string());
        }
    }
}

fn push_where(
    builder: &mut QueryBuilder<'_, Sqlite>,
    collection: Collection,
    options: &QueryOptions,
) -> Result<(), AppError> {
    let mut has_clause = false;

    for predicate in &options.filters {
        ensure_column(collection, predicate.column())?;
        builder.push(if has_clause { " AND " } else { " WHERE " });
        has_clause = true;
        match predicate {
            Predicate::Eq(column, value) => {
                builder.push(column.as_str());
                builder.push(" = ");
                push_value(builder, value);
            }
            Predicate::Ne(column, value) => {
                builder.push(column.as_str());
                builder.push(" != ");
                push_value(builder, value);
            }
            Predicate::In(column, values) => {
                builder.push(column.as_str());
                builder.push(" IN (");
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        builder.push(", ");
                    }
                    push_value(builder, value);
                }
                builder.push(")");
            }
        }
    }

    if let Some(search) = &options.search {
        for column in &search.columns {
            ensure_column(collection, column)?;
        }
        let needle = format!("%{}%", escape_like(&search.text.to_lowercase()));
        builder.push(if has_clause { " AND " } else { " WHERE " });
        builder.push("(");
        for (index, column) in search.columns.iter().enumerate() {
            if index > 0 {
                builder.push(" OR ");
            }
            builder.push("lower(");
            builder.push(column.as_str());
            builder.push(") LIKE ");
            builder.push_bind(needle.clone());
            builder.push(" ESCAPE '\\'");
        }
        builder.push(")");
    }

    Ok(())
}

/// 検索文字列はリテラルな部分一致。LIKE のワイルドカードを無効化する。
fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn row_to_value(collection: Collection, row: &SqliteRow) -> Result<Value, AppError> {
    let mut map = serde_json::Map::new();
    for column in columns(collection) {
        let cell = match column.kind {
            ColumnKind::Text => Value::from(row.try_get::<String, _>(column.name)?),
            ColumnKind::OptionalText => row
                .try_get::<Option<String>, _>(column.name)?
                .map(Value::from)
                .unwrap_or(Value::Null),
            ColumnKind::Integer => Value::from(row.try_get::<i64, _>(column.name)?),
            ColumnKind::Json => {
                let raw: String = row.try_get(column.name)?;
                serde_json::from_str(&raw)?
            }
        };
        map.insert(column.name.to_string(), cell);
    }
    Ok(Value::Object(map))
}

/// sqlx/SQLite による DataSource 実装。
///
/// 問い合わせは QueryBuilder で組み立てる。列名は述語・検索・ソートの
/// いずれもコレクションごとのホワイトリストを通ったものだけをSQLに渡す。
pub struct SqliteDataSource {
    pool: ConnectionPool,
    principal: Arc<RwLock<Option<Principal>>>,
}

impl SqliteDataSource {
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool,
            principal: Arc::new(RwLock::new(None)),
        }
    }

    /// 認証コラボレータが解決した主体を差し込む。匿名なら None。
    pub async fn set_principal(&self, principal: Option<Principal>) {
        *self.principal.write().await = principal;
    }

    async fn count(&self, collection: Collection, options: &QueryOptions) -> Result<u64, AppError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT COUNT(*) AS total FROM {collection}"));
        push_where(&mut builder, collection, options)?;

        let row = builder.build().fetch_one(self.pool.get_pool()).await?;
        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }
}

#[async_trait]
impl DataSource for SqliteDataSource {
    async fn query(
        &self,
        collection: Collection,
        options: QueryOptions,
    ) -> Result<QueryResult, AppError> {
        let total_count = if options.count {
            Some(self.count(collection, &options).await?)
        } else {
            None
        };

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT * FROM {collection}"));
        push_where(&mut builder, collection, &options)?;

        if !options.sort.is_empty() {
            builder.push(" ORDER BY ");
            for (index, spec) in options.sort.iter().enumerate() {
                ensure_column(collection, spec.column)?;
                if index > 0 {
                    builder.push(", ");
                }
                builder.push(spec.column);
                builder.push(if spec.ascending { " ASC" } else { " DESC" });
            }
        }

        if let Some(range) = options.range {
            builder.push(" LIMIT ");
            builder.push_bind(range.limit as i64);
            builder.push(" OFFSET ");
            builder.push_bind(range.offset as i64);
        }

        let rows = builder.build().fetch_all(self.pool.get_pool()).await?;
        let mut values = Vec::with_capacity(rows.len());
        for row in &rows {
            values.push(row_to_value(collection, row)?);
        }

        Ok(QueryResult {
            rows: values,
            total_count,
        })
    }

    async fn insert(&self, collection: Collection, record: Value) -> Result<Value, AppError> {
        let map = match &record {
            Value::Object(map) => map,
            _ => {
                return Err(AppError::validation("Insert record must be a JSON object"));
            }
        };

        let present: Vec<&Column> = columns(collection)
            .iter()
            .filter(|column| map.contains_key(column.name))
            .collect();
        if present.is_empty() {
            return Err(AppError::validation(format!(
                "Insert record has no known columns for '{collection}'"
            )));
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("INSERT INTO {collection} ("));
        for (index, column) in present.iter().enumerate() {
            if index > 0 {
                builder.push(", ");
            }
            builder.push(column.name);
        }
        builder.push(") VALUES (");
        for (index, column) in present.iter().enumerate() {
            if index > 0 {
                builder.push(", ");
            }
            match (&map[column.name], column.kind) {
                (value @ Value::Array(_), ColumnKind::Json)
                | (value @ Value::Object(_), ColumnKind::Json) => {
                    builder.push_bind(value.to_string());
                }
                (value, _) => push_value(&mut builder, value),
            }
        }
        builder.push(")");

        builder.build().execute(self.pool.get_pool()).await?;
        Ok(record)
    }

    async fn update(
        &self,
        collection: Collection,
        key: RecordKey,
        patch: Value,
    ) -> Result<Value, AppError> {
        let map = match patch {
            Value::Object(map) => map,
            _ => {
                return Err(AppError::validation("Update patch must be a JSON object"));
            }
        };
        if map.is_empty() {
            return Err(AppError::validation("Update patch must not be empty"));
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("UPDATE {collection} SET "));
        let mut first = true;
        for (field, value) in &map {
            ensure_column(collection, field)?;
            if !first {
                builder.push(", ");
            }
            first = false;
            builder.push(field.as_str());
            builder.push(" = ");
            match value {
                value @ (Value::Array(_) | Value::Object(_)) => {
                    builder.push_bind(value.to_string());
                }
                value => push_value(&mut builder, value),
            }
        }

        for (index, (column, value)) in key.parts().iter().enumerate() {
            ensure_column(collection, column)?;
            builder.push(if index == 0 { " WHERE " } else { " AND " });
            builder.push(column.as_str());
            builder.push(" = ");
            push_value(&mut builder, value);
        }

        let result = builder.build().execute(self.pool.get_pool()).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "No record matching key in '{collection}'"
            )));
        }

        // 変更後の行を読み直して返す
        let mut select: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT * FROM {collection}"));
        for (index, (column, value)) in key.parts().iter().enumerate() {
            select.push(if index == 0 { " WHERE " } else { " AND " });
            select.push(column.as_str());
            select.push(" = ");
            push_value(&mut select, value);
        }
        let row = select.build().fetch_one(self.pool.get_pool()).await?;
        row_to_value(collection, &row)
    }

    async fn delete(&self, collection: Collection, key: RecordKey) -> Result<(), AppError> {
        if key.parts().is_empty() {
            return Err(AppError::validation("Delete key must not be empty"));
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("DELETE FROM {collection}"));
        for (index, (column, value)) in key.parts().iter().enumerate() {
            ensure_column(collection, column)?;
            builder.push(if index == 0 { " WHERE " } else { " AND " });
            builder.push(column.as_str());
            builder.push(" = ");
            push_value(&mut builder, value);
        }

        let result = builder.build().execute(self.pool.get_pool()).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "No record matching key in '{collection}'"
            )));
        }
        Ok(())
    }

    async fn current_principal(&self) -> Result<Option<Principal>, AppError> {
        Ok(self.principal.read().await.clone())
    }
}
