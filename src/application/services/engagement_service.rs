use crate::application::ports::data_source::{
    Collection, DataSource, Predicate, QueryOptions, RecordKey, SortSpec,
};
use crate::application::shared::mappers::{engagement_record, map_engagement, map_post};
use crate::domain::entities::{EngagementKind, EngagementRecord, Post, PostStatus};
use crate::domain::value_objects::{EngagementState, Principal};
use crate::shared::error::AppError;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// (記事, 種別) の表示用スナップショット。
/// count は楽観的更新を反映したローカル投影値。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngagementSnapshot {
    pub state: EngagementState,
    pub count: u32,
}

impl EngagementSnapshot {
    fn unknown() -> Self {
        Self {
            state: EngagementState::Unknown,
            count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    state: EngagementState,
    count: u32,
    /// Pending 中のみ保持するトグル適用前のカウント。
    /// 楽観適用は 0 で飽和するため、差分の逆適用ではなくこの実値へ戻す。
    count_before_toggle: Option<u32>,
}

impl Entry {
    fn new(state: EngagementState, count: u32) -> Self {
        Self {
            state,
            count,
            count_before_toggle: None,
        }
    }

    fn snapshot(&self) -> EngagementSnapshot {
        EngagementSnapshot {
            state: self.state,
            count: self.count,
        }
    }

    fn begin_toggle(&mut self) -> Option<EngagementState> {
        let (next, delta) = self.state.begin_toggle()?;
        self.count_before_toggle = Some(self.count);
        self.state = next;
        self.count = if delta >= 0 {
            self.count.saturating_add(delta as u32)
        } else {
            self.count.saturating_sub((-delta) as u32)
        };
        Some(next)
    }

    fn settle(&mut self) {
        self.state = self.state.settle();
        self.count_before_toggle = None;
    }

    fn roll_back(&mut self) {
        self.state = self.state.roll_back();
        if let Some(count) = self.count_before_toggle.take() {
            self.count = count;
        }
    }
}

/// (記事, 種別) ごとのエンゲージメント状態を管理する。
///
/// トグルは楽観的に即時反映し、バックエンド失敗時は状態とカウントを
/// トグル前の値へ巻き戻す。同じ (記事, 種別) に対する未確定のトグルが
/// ある間、新たなトグルは拒否される（キューイングしない）。
pub struct EngagementService {
    data_source: Arc<dyn DataSource>,
    entries: Mutex<HashMap<(String, EngagementKind), Entry>>,
}

impl EngagementService {
    pub fn new(data_source: Arc<dyn DataSource>) -> Self {
        Self {
            data_source,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn snapshot(&self, post_id: &str, kind: EngagementKind) -> EngagementSnapshot {
        let entries = self.entries.lock().await;
        entries
            .get(&(post_id.to_string(), kind))
            .map(Entry::snapshot)
            .unwrap_or_else(EngagementSnapshot::unknown)
    }

    /// 描画された1ページ分の初期状態をまとめて取り込む。
    /// 存在チェックは記事ID集合に対する1回のバッチクエリで行う。
    /// 未認証の場合は全件 Off 固定（トグル不可）。
    pub async fn prime(&self, posts: &[Post], kind: EngagementKind) -> Result<(), AppError> {
        let principal = self.data_source.current_principal().await?;
        let ids: Vec<String> = posts.iter().map(|post| post.id.clone()).collect();

        let engaged = match principal {
            Some(ref principal) => self.engaged_subset(&ids, principal, kind).await?,
            None => HashSet::new(),
        };

        let mut entries = self.entries.lock().await;
        for post in posts {
            let count = match kind {
                EngagementKind::Like => post.like_count,
                EngagementKind::Save => 0,
            };
            entries.insert(
                (post.id.clone(), kind),
                Entry::new(EngagementState::primed(engaged.contains(&post.id)), count),
            );
        }
        Ok(())
    }

    /// 指定ID集合のうち、現在 On のものを返す（バッチ存在クエリ）。
    pub async fn engaged_subset(
        &self,
        post_ids: &[String],
        principal: &Principal,
        kind: EngagementKind,
    ) -> Result<HashSet<String>, AppError> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let options = QueryOptions::default()
            .filter(Predicate::eq("user_id", principal.id()))
            .filter(Predicate::eq("kind", kind.as_str()))
            .filter(Predicate::is_in(
                "post_id",
                post_ids.iter().map(|id| Value::from(id.as_str())).collect(),
            ));

        let result = self
            .data_source
            .query(Collection::Engagements, options)
            .await?;

        let mut engaged = HashSet::with_capacity(result.rows.len());
        for row in &result.rows {
            engaged.insert(map_engagement(row)?.post_id().to_string());
        }
        Ok(engaged)
    }

    /// トグル1回分。成功時は確定後、失敗時はロールバック後のスナップショットを持つ。
    ///
    /// Pending 中の再トグルはネットワークに触れず現状を返す（no-op）。
    pub async fn toggle(
        &self,
        post_id: &str,
        kind: EngagementKind,
    ) -> Result<EngagementSnapshot, AppError> {
        let principal = self
            .data_source
            .current_principal()
            .await?
            .ok_or_else(|| {
                AppError::unauthorized("Sign-in is required to like or save a post")
            })?;

        let key = (post_id.to_string(), kind);

        // 楽観的適用。Pending 中なら何もせず現状を返す。
        let pending_state = {
            let mut entries = self.entries.lock().await;
            let entry = entries.get_mut(&key).ok_or_else(|| {
                AppError::validation(format!(
                    "Engagement state for post '{post_id}' has not been primed"
                ))
            })?;

            if entry.state.is_pending() {
                return Ok(entry.snapshot());
            }
            let Some(next) = entry.begin_toggle() else {
                return Err(AppError::validation(format!(
                    "Cannot toggle engagement from state {:?}",
                    entry.state
                )));
            };
            next
        };

        let mutation = if pending_state == EngagementState::PendingOn {
            let record = EngagementRecord::new(post_id.to_string(), &principal, kind);
            self.data_source
                .insert(Collection::Engagements, engagement_record(&record))
                .await
                .map(|_| ())
        } else {
            self.data_source
                .delete(
                    Collection::Engagements,
                    Self::record_key(post_id, &principal, kind),
                )
                .await
        };

        match mutation {
            Ok(()) => {
                let mut entries = self.entries.lock().await;
                let entry = entries
                    .entry(key)
                    .or_insert_with(|| Entry::new(pending_state, 0));
                entry.settle();
                Ok(entry.snapshot())
            }
            Err(err) => {
                {
                    let mut entries = self.entries.lock().await;
                    if let Some(entry) = entries.get_mut(&key) {
                        entry.roll_back();
                    }
                }
                warn!("engagement toggle rolled back for post {post_id} ({kind}): {err}");

                // レコードが消えていた場合はローカル状態をリモートに合わせ直す
                if matches!(err, AppError::NotFound(_)) {
                    if let Err(refresh_err) =
                        self.refresh_entry(post_id, &principal, kind).await
                    {
                        warn!("engagement state refresh failed: {refresh_err}");
                    }
                }
                Err(err)
            }
        }
    }

    /// プロフィールの「いいねした記事」一覧。エンゲージメントの新しい順。
    pub async fn engaged_posts(&self, kind: EngagementKind) -> Result<Vec<Post>, AppError> {
        let principal = self
            .data_source
            .current_principal()
            .await?
            .ok_or_else(|| {
                AppError::unauthorized("Sign-in is required to list engaged posts")
            })?;

        let options = QueryOptions::default()
            .filter(Predicate::eq("user_id", principal.id()))
            .filter(Predicate::eq("kind", kind.as_str()))
            .sort(SortSpec::desc("created_at"));
        let result = self
            .data_source
            .query(Collection::Engagements, options)
            .await?;

        let mut ordered_ids = Vec::with_capacity(result.rows.len());
        for row in &result.rows {
            ordered_ids.push(map_engagement(row)?.post_id().to_string());
        }
        if ordered_ids.is_empty() {
            return Ok(Vec::new());
        }

        let options = QueryOptions::default()
            .filter(Predicate::is_in(
                "id",
                ordered_ids.iter().map(|id| Value::from(id.as_str())).collect(),
            ))
            .filter(Predicate::eq("status", PostStatus::Published.as_str()));
        let result = self.data_source.query(Collection::Posts, options).await?;

        let mut by_id = HashMap::with_capacity(result.rows.len());
        for row in &result.rows {
            let post = map_post(row)?;
            by_id.insert(post.id.clone(), post);
        }

        // エンゲージメント順を維持する
        Ok(ordered_ids
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .collect())
    }

    fn record_key(post_id: &str, principal: &Principal, kind: EngagementKind) -> RecordKey {
        RecordKey::composite(vec![
            ("post_id".to_string(), Value::from(post_id)),
            ("user_id".to_string(), Value::from(principal.id())),
            ("kind".to_string(), Value::from(kind.as_str())),
        ])
    }

    async fn refresh_entry(
        &self,
        post_id: &str,
        principal: &Principal,
        kind: EngagementKind,
    ) -> Result<(), AppError> {
        let engaged = self
            .engaged_subset(&[post_id.to_string()], principal, kind)
            .await?;
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(&(post_id.to_string(), kind)) {
            entry.state = EngagementState::primed(engaged.contains(post_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::data_source::QueryResult;
    use crate::infrastructure::memory::MemoryDataSource;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{oneshot, Mutex as AsyncMutex};

    fn sample_post(id: &str, likes: u32) -> Post {
        Post {
            id: id.into(),
            title: format!("Post {id}"),
            body: "body".into(),
            excerpt: None,
            category: "tech".into(),
            tags: vec![],
            author_id: "author-1".into(),
            author_name: "Alice".into(),
            created_at: Utc::now(),
            status: crate::domain::entities::PostStatus::Published,
            like_count: likes,
            comment_count: 0,
            featured_image: None,
        }
    }

    fn post_row(post: &Post) -> Value {
        json!({
            "id": post.id,
            "title": post.title,
            "body": post.body,
            "excerpt": null,
            "category": post.category,
            "tags": [],
            "author_id": post.author_id,
            "author_name": post.author_name,
            "created_at": post.created_at.timestamp_millis(),
            "status": "published",
            "like_count": post.like_count,
            "comment_count": post.comment_count,
            "featured_image": null,
        })
    }

    /// 変更系呼び出しを数え、必要に応じてゲートや失敗を差し込むラッパ
    struct RecordingDataSource {
        inner: MemoryDataSource,
        insert_calls: AtomicUsize,
        delete_calls: AtomicUsize,
        insert_gates: AsyncMutex<VecDeque<oneshot::Receiver<()>>>,
        fail_next_mutation: AsyncMutex<Option<AppError>>,
    }

    impl RecordingDataSource {
        fn new(inner: MemoryDataSource) -> Self {
            Self {
                inner,
                insert_calls: AtomicUsize::new(0),
                delete_calls: AtomicUsize::new(0),
                insert_gates: AsyncMutex::new(VecDeque::new()),
                fail_next_mutation: AsyncMutex::new(None),
            }
        }

        async fn gate_next_insert(&self) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.insert_gates.lock().await.push_back(rx);
            tx
        }

        async fn fail_next_mutation(&self, err: AppError) {
            *self.fail_next_mutation.lock().await = Some(err);
        }

        fn mutation_count(&self) -> usize {
            self.insert_calls.load(Ordering::SeqCst) + self.delete_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DataSource for RecordingDataSource {
        async fn query(
            &self,
            collection: Collection,
            options: QueryOptions,
        ) -> Result<QueryResult, AppError> {
            self.inner.query(collection, options).await
        }

        async fn insert(&self, collection: Collection, record: Value) -> Result<Value, AppError> {
            self.insert_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.fail_next_mutation.lock().await.take() {
                return Err(err);
            }
            let gate = self.insert_gates.lock().await.pop_front();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.inner.insert(collection, record).await
        }

        async fn update(
            &self,
            collection: Collection,
            key: RecordKey,
            patch: Value,
        ) -> Result<Value, AppError> {
            self.inner.update(collection, key, patch).await
        }

        async fn delete(&self, collection: Collection, key: RecordKey) -> Result<(), AppError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.fail_next_mutation.lock().await.take() {
                return Err(err);
            }
            self.inner.delete(collection, key).await
        }

        async fn current_principal(&self) -> Result<Option<Principal>, AppError> {
            self.inner.current_principal().await
        }
    }

    async fn setup(
        posts: Vec<Post>,
        principal: Option<&str>,
    ) -> (EngagementService, Arc<RecordingDataSource>) {
        let memory = MemoryDataSource::new();
        memory
            .seed(Collection::Posts, posts.iter().map(post_row).collect())
            .await;
        memory
            .set_principal(principal.map(|id| Principal::new(id.into()).unwrap()))
            .await;

        let source = Arc::new(RecordingDataSource::new(memory));
        let service = EngagementService::new(source.clone());
        service.prime(&posts, EngagementKind::Like).await.unwrap();
        (service, source)
    }

    #[tokio::test]
    async fn prime_marks_existing_engagements_on() {
        let posts = vec![sample_post("p1", 3), sample_post("p2", 0)];
        let memory = MemoryDataSource::new();
        memory
            .seed(Collection::Posts, posts.iter().map(post_row).collect())
            .await;
        memory
            .set_principal(Some(Principal::new("user-1".into()).unwrap()))
            .await;
        memory
            .seed(
                Collection::Engagements,
                vec![json!({
                    "post_id": "p1",
                    "user_id": "user-1",
                    "kind": "like",
                    "created_at": 1000,
                })],
            )
            .await;

        let service = EngagementService::new(Arc::new(memory));
        service.prime(&posts, EngagementKind::Like).await.unwrap();

        let p1 = service.snapshot("p1", EngagementKind::Like).await;
        assert_eq!(p1.state, EngagementState::On);
        assert_eq!(p1.count, 3);

        let p2 = service.snapshot("p2", EngagementKind::Like).await;
        assert_eq!(p2.state, EngagementState::Off);
    }

    #[tokio::test]
    async fn anonymous_prime_fixes_state_off() {
        let posts = vec![sample_post("p1", 5)];
        let (service, source) = setup(posts, None).await;

        let snapshot = service.snapshot("p1", EngagementKind::Like).await;
        assert_eq!(snapshot.state, EngagementState::Off);
        assert_eq!(snapshot.count, 5);

        let err = service.toggle("p1", EngagementKind::Like).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
        assert_eq!(source.mutation_count(), 0);
        // カウントも不変
        let snapshot = service.snapshot("p1", EngagementKind::Like).await;
        assert_eq!(snapshot.count, 5);
    }

    #[tokio::test]
    async fn toggle_on_applies_optimistic_count_and_settles() {
        let (service, source) = setup(vec![sample_post("p1", 2)], Some("user-1")).await;

        let snapshot = service.toggle("p1", EngagementKind::Like).await.unwrap();
        assert_eq!(snapshot.state, EngagementState::On);
        assert_eq!(snapshot.count, 3);
        assert_eq!(source.mutation_count(), 1);
        assert_eq!(source.inner.row_count(Collection::Engagements).await, 1);
    }

    #[tokio::test]
    async fn toggle_off_deletes_record_and_decrements() {
        let (service, source) = setup(vec![sample_post("p1", 2)], Some("user-1")).await;

        service.toggle("p1", EngagementKind::Like).await.unwrap();
        let snapshot = service.toggle("p1", EngagementKind::Like).await.unwrap();
        assert_eq!(snapshot.state, EngagementState::Off);
        assert_eq!(snapshot.count, 2);
        assert_eq!(source.inner.row_count(Collection::Engagements).await, 0);
    }

    #[tokio::test]
    async fn concurrent_toggle_is_rejected_with_single_mutation() {
        let (service, source) = setup(vec![sample_post("p1", 0)], Some("user-1")).await;
        let service = Arc::new(service);

        let gate = source.gate_next_insert().await;
        let first = {
            let service = service.clone();
            tokio::spawn(async move { service.toggle("p1", EngagementKind::Like).await })
        };
        // 1回目が Pending に入るのを待ってから2回目を撃つ
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let second = service.toggle("p1", EngagementKind::Like).await.unwrap();
        assert_eq!(second.state, EngagementState::PendingOn);
        assert_eq!(second.count, 1);

        gate.send(()).unwrap();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.state, EngagementState::On);
        assert_eq!(first.count, 1);

        // ネットワーク変更はちょうど1回
        assert_eq!(source.mutation_count(), 1);
    }

    #[tokio::test]
    async fn failed_toggle_rolls_back_state_and_count() {
        let (service, source) = setup(vec![sample_post("p1", 4)], Some("user-1")).await;

        source
            .fail_next_mutation(AppError::Transport("timeout".into()))
            .await;
        let err = service.toggle("p1", EngagementKind::Like).await.unwrap_err();
        assert!(err.is_retryable());

        let snapshot = service.snapshot("p1", EngagementKind::Like).await;
        assert_eq!(snapshot.state, EngagementState::Off);
        assert_eq!(snapshot.count, 4);
    }

    #[tokio::test]
    async fn failed_save_untoggle_restores_exact_zero_count() {
        // Save はカウント投影を持たず 0 で開始するため、楽観 -1 は 0 で飽和する。
        // ロールバックは差分の逆適用ではなくトグル前の実値へ戻ること。
        let posts = vec![sample_post("p1", 5)];
        let memory = MemoryDataSource::new();
        memory
            .seed(Collection::Posts, posts.iter().map(post_row).collect())
            .await;
        memory
            .set_principal(Some(Principal::new("user-1".into()).unwrap()))
            .await;
        memory
            .seed(
                Collection::Engagements,
                vec![json!({
                    "post_id": "p1",
                    "user_id": "user-1",
                    "kind": "save",
                    "created_at": 1000,
                })],
            )
            .await;

        let source = Arc::new(RecordingDataSource::new(memory));
        let service = EngagementService::new(source.clone());
        service.prime(&posts, EngagementKind::Save).await.unwrap();

        let before = service.snapshot("p1", EngagementKind::Save).await;
        assert_eq!(before.state, EngagementState::On);
        assert_eq!(before.count, 0);

        source
            .fail_next_mutation(AppError::Transport("timeout".into()))
            .await;
        let err = service.toggle("p1", EngagementKind::Save).await.unwrap_err();
        assert!(err.is_retryable());

        let after = service.snapshot("p1", EngagementKind::Save).await;
        assert_eq!(after.state, EngagementState::On);
        assert_eq!(after.count, 0);
    }

    #[tokio::test]
    async fn not_found_on_untoggle_resyncs_local_state() {
        let (service, source) = setup(vec![sample_post("p1", 1)], Some("user-1")).await;

        service.toggle("p1", EngagementKind::Like).await.unwrap();
        // リモート側でレコードが先に消えている状況を作る
        source
            .inner
            .delete(
                Collection::Engagements,
                RecordKey::composite(vec![
                    ("post_id".to_string(), Value::from("p1")),
                    ("user_id".to_string(), Value::from("user-1")),
                    ("kind".to_string(), Value::from("like")),
                ]),
            )
            .await
            .unwrap();

        let err = service.toggle("p1", EngagementKind::Like).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // ロールバック後の再同期でリモートの実状態 (Off) に揃う
        let snapshot = service.snapshot("p1", EngagementKind::Like).await;
        assert_eq!(snapshot.state, EngagementState::Off);
    }

    #[tokio::test]
    async fn unprimed_toggle_is_rejected() {
        let (service, _source) = setup(vec![sample_post("p1", 0)], Some("user-1")).await;
        let err = service
            .toggle("unprimed", EngagementKind::Like)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn engaged_posts_returns_posts_in_engagement_order() {
        let posts = vec![sample_post("p1", 0), sample_post("p2", 0), sample_post("p3", 0)];
        let memory = MemoryDataSource::new();
        memory
            .seed(Collection::Posts, posts.iter().map(post_row).collect())
            .await;
        memory
            .set_principal(Some(Principal::new("user-1".into()).unwrap()))
            .await;
        memory
            .seed(
                Collection::Engagements,
                vec![
                    json!({"post_id": "p3", "user_id": "user-1", "kind": "like", "created_at": 100}),
                    json!({"post_id": "p1", "user_id": "user-1", "kind": "like", "created_at": 300}),
                    json!({"post_id": "p2", "user_id": "other", "kind": "like", "created_at": 200}),
                ],
            )
            .await;

        let service = EngagementService::new(Arc::new(memory));
        let engaged = service.engaged_posts(EngagementKind::Like).await.unwrap();
        let ids: Vec<&str> = engaged.iter().map(|post| post.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);
    }
}
