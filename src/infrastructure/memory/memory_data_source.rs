use crate::application::ports::data_source::{
    Collection, DataSource, Predicate, QueryOptions, QueryResult, RecordKey, SearchSpec,
};
use crate::domain::value_objects::Principal;
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// インメモリの DataSource 実装。
/// テストと組み込み用途向けで、リモートストアと同じ問い合わせ意味論を持つ。
#[derive(Clone, Default)]
pub struct MemoryDataSource {
    tables: Arc<RwLock<HashMap<Collection, Vec<Value>>>>,
    principal: Arc<RwLock<Option<Principal>>>,
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, collection: Collection, rows: Vec<Value>) {
        let mut tables = self.tables.write().await;
        tables.entry(collection).or_default().extend(rows);
    }

    pub async fn set_principal(&self, principal: Option<Principal>) {
        *self.principal.write().await = principal;
    }

    pub async fn row_count(&self, collection: Collection) -> usize {
        let tables = self.tables.read().await;
        tables.get(&collection).map_or(0, Vec::len)
    }
}

fn matches_predicate(row: &Value, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Eq(column, value) => row.get(column) == Some(value),
        Predicate::Ne(column, value) => row.get(column) != Some(value),
        Predicate::In(column, values) => row
            .get(column)
            .map(|cell| values.contains(cell))
            .unwrap_or(false),
    }
}

fn matches_search(row: &Value, search: &SearchSpec) -> bool {
    let needle = search.text.to_lowercase();
    search.columns.iter().any(|column| {
        row.get(column)
            .and_then(Value::as_str)
            .map(|cell| cell.to_lowercase().contains(&needle))
            .unwrap_or(false)
    })
}

fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

fn matches_key(row: &Value, key: &RecordKey) -> bool {
    key.parts()
        .iter()
        .all(|(column, value)| row.get(column) == Some(value))
}

#[async_trait]
impl DataSource for MemoryDataSource {
    async fn query(
        &self,
        collection: Collection,
        options: QueryOptions,
    ) -> Result<QueryResult, AppError> {
        let tables = self.tables.read().await;
        let rows = tables.get(&collection).cloned().unwrap_or_default();

        let mut filtered: Vec<Value> = rows
            .into_iter()
            .filter(|row| {
                options
                    .filters
                    .iter()
                    .all(|predicate| matches_predicate(row, predicate))
            })
            .filter(|row| {
                options
                    .search
                    .as_ref()
                    .map(|search| matches_search(row, search))
                    .unwrap_or(true)
            })
            .collect();

        for spec in options.sort.iter().rev() {
            filtered.sort_by(|a, b| {
                let ordering = compare_cells(a.get(spec.column), b.get(spec.column));
                if spec.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        let total_count = options.count.then_some(filtered.len() as u64);

        let rows = match options.range {
            Some(range) => filtered
                .into_iter()
                .skip(range.offset as usize)
                .take(range.limit as usize)
                .collect(),
            None => filtered,
        };

        Ok(QueryResult { rows, total_count })
    }

    async fn insert(&self, collection: Collection, record: Value) -> Result<Value, AppError> {
        let mut tables = self.tables.write().await;
        tables.entry(collection).or_default().push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: Collection,
        key: RecordKey,
        patch: Value,
    ) -> Result<Value, AppError> {
        let patch_map = match patch {
            Value::Object(map) => map,
            _ => {
                return Err(AppError::Validation(
                    "Update patch must be a JSON object".to_string(),
                ));
            }
        };

        let mut tables = self.tables.write().await;
        let rows = tables.entry(collection).or_default();
        let row = rows
            .iter_mut()
            .find(|row| matches_key(row, &key))
            .ok_or_else(|| {
                AppError::NotFound(format!("No record matching key in '{collection}'"))
            })?;

        if let Value::Object(map) = row {
            for (field, value) in patch_map {
                map.insert(field, value);
            }
        }

        Ok(row.clone())
    }

    async fn delete(&self, collection: Collection, key: RecordKey) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(collection).or_default();
        let before = rows.len();
        rows.retain(|row| !matches_key(row, &key));

        if rows.len() == before {
            return Err(AppError::NotFound(format!(
                "No record matching key in '{collection}'"
            )));
        }
        Ok(())
    }

    async fn current_principal(&self) -> Result<Option<Principal>, AppError> {
        Ok(self.principal.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::data_source::SortSpec;
    use serde_json::json;

    fn post_row(id: &str, likes: i64, created_at: i64) -> Value {
        json!({
            "id": id,
            "title": format!("Post {id}"),
            "body": "body",
            "like_count": likes,
            "created_at": created_at,
            "status": "published",
        })
    }

    #[tokio::test]
    async fn filters_and_sorts_with_tiebreak() {
        let source = MemoryDataSource::new();
        source
            .seed(
                Collection::Posts,
                vec![
                    post_row("a", 5, 100),
                    post_row("b", 5, 200),
                    post_row("c", 9, 50),
                ],
            )
            .await;

        let result = source
            .query(
                Collection::Posts,
                QueryOptions::default()
                    .filter(Predicate::eq("status", "published"))
                    .sort(SortSpec::desc("like_count"))
                    .sort(SortSpec::desc("created_at"))
                    .with_count(),
            )
            .await
            .unwrap();

        let ids: Vec<&str> = result
            .rows
            .iter()
            .map(|row| row["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(result.total_count, Some(3));
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring() {
        let source = MemoryDataSource::new();
        source
            .seed(
                Collection::Posts,
                vec![
                    json!({"id": "a", "title": "Learning Rust", "body": "x"}),
                    json!({"id": "b", "title": "Go basics", "body": "also about RUST"}),
                    json!({"id": "c", "title": "Python", "body": "none"}),
                ],
            )
            .await;

        let result = source
            .query(
                Collection::Posts,
                QueryOptions::default()
                    .search(vec!["title".into(), "body".into()], "rust"),
            )
            .await
            .unwrap();
        assert_eq!(result.rows.len(), 2);
    }

    #[tokio::test]
    async fn range_pages_through_results() {
        let source = MemoryDataSource::new();
        let rows = (0..25)
            .map(|i| post_row(&format!("p{i:02}"), 0, i))
            .collect();
        source.seed(Collection::Posts, rows).await;

        let result = source
            .query(
                Collection::Posts,
                QueryOptions::default()
                    .sort(SortSpec::desc("created_at"))
                    .range(20, 10)
                    .with_count(),
            )
            .await
            .unwrap();
        assert_eq!(result.rows.len(), 5);
        assert_eq!(result.total_count, Some(25));
    }

    #[tokio::test]
    async fn delete_missing_record_is_not_found() {
        let source = MemoryDataSource::new();
        let err = source
            .delete(Collection::Engagements, RecordKey::id("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_merges_patch_fields() {
        let source = MemoryDataSource::new();
        source
            .seed(Collection::Posts, vec![post_row("a", 1, 10)])
            .await;

        let updated = source
            .update(
                Collection::Posts,
                RecordKey::id("a"),
                json!({"like_count": 2}),
            )
            .await
            .unwrap();
        assert_eq!(updated["like_count"], json!(2));
        assert_eq!(updated["title"], json!("Post a"));
    }
}
