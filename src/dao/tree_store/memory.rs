//! In-process realtime document tree, used for local runs and tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::dao::storage::{StorageError, StorageResult};

use super::{TreePath, TreeStore, TreeStream, value_at, write_at};

/// Realtime tree kept in a watch channel; every write is applied under the channel lock so it
/// is atomic with respect to readers and other writers.
#[derive(Clone)]
pub struct MemoryTreeStore {
    inner: Arc<Inner>,
}

struct Inner {
    root: watch::Sender<Value>,
    writes: AtomicUsize,
    failure: Mutex<Option<String>>,
}

impl MemoryTreeStore {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::with_document(Value::Null)
    }

    /// Create a tree seeded with `document`.
    pub fn with_document(document: Value) -> Self {
        let (root, _rx) = watch::channel(document);
        Self {
            inner: Arc::new(Inner {
                root,
                writes: AtomicUsize::new(0),
                failure: Mutex::new(None),
            }),
        }
    }

    /// Clone of the whole document as currently stored.
    pub fn document(&self) -> Value {
        self.inner.root.borrow().clone()
    }

    /// Number of write calls that reached the store, failed ones included.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail with `message` until cleared with `None`.
    pub fn fail_writes(&self, message: Option<&str>) {
        if let Ok(mut slot) = self.inner.failure.lock() {
            *slot = message.map(str::to_owned);
        }
    }

    fn apply<F>(&self, write: F) -> StorageResult<()>
    where
        F: FnOnce(&mut Value),
    {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .inner
            .failure
            .lock()
            .map(|slot| slot.clone())
            .unwrap_or_default();
        if let Some(message) = failure {
            return Err(StorageError::Rejected(message));
        }

        self.inner.root.send_modify(write);
        Ok(())
    }
}

impl Default for MemoryTreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore for MemoryTreeStore {
    fn subscribe(&self, path: &TreePath) -> TreeStream {
        let mut rx = self.inner.root.subscribe();
        let path = path.clone();
        Box::pin(async_stream::stream! {
            let mut last: Option<Option<Value>> = None;
            loop {
                let current = {
                    let root = rx.borrow_and_update();
                    value_at(&root, &path).cloned()
                };
                if last.as_ref() != Some(&current) {
                    last = Some(current.clone());
                    yield Ok(current);
                }
                if rx.changed().await.is_err() {
                    debug!(%path, "memory tree dropped; ending subscription");
                    break;
                }
            }
        })
    }

    fn set_whole_tree(&self, path: &TreePath, value: Value) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let path = path.clone();
        Box::pin(async move { store.apply(|root| write_at(root, &path, value)) })
    }

    fn merge_update(
        &self,
        updates: IndexMap<TreePath, Value>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.apply(|root| {
                for (path, value) in updates {
                    write_at(root, &path, value);
                }
            })
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use serde_json::json;
    use tokio::time::timeout;

    use super::*;

    async fn next(stream: &mut TreeStream) -> Option<Value> {
        timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("subscription delivered in time")
            .expect("stream still open")
            .expect("no read failure")
    }

    #[tokio::test]
    async fn subscribe_delivers_current_value_first() {
        let store = MemoryTreeStore::with_document(json!({"lastResetDate": "2024-01-01"}));
        let mut marker = store.subscribe(&TreePath::parse("lastResetDate"));
        assert_eq!(next(&mut marker).await, Some(json!("2024-01-01")));

        let mut matches = store.subscribe(&TreePath::parse("matches"));
        assert_eq!(next(&mut matches).await, None);
    }

    #[tokio::test]
    async fn subscribers_only_see_changes_at_their_path() {
        let store = MemoryTreeStore::with_document(json!({"lastResetDate": "2024-01-01"}));
        let mut marker = store.subscribe(&TreePath::parse("lastResetDate"));
        assert_eq!(next(&mut marker).await, Some(json!("2024-01-01")));

        let mut updates = IndexMap::new();
        updates.insert(TreePath::parse("matches/match1/team1"), json!([{"id": "a"}]));
        store.merge_update(updates).await.unwrap();
        store
            .set_whole_tree(&TreePath::parse("lastResetDate"), json!("2024-01-02"))
            .await
            .unwrap();

        assert_eq!(next(&mut marker).await, Some(json!("2024-01-02")));
    }

    #[tokio::test]
    async fn merge_update_leaves_unlisted_paths_untouched() {
        let store = MemoryTreeStore::with_document(json!({
            "matches": {"match1": {"time": "13:00", "team1": [], "team2": []}},
            "lastResetDate": "2024-01-01"
        }));

        let mut updates = IndexMap::new();
        updates.insert(
            TreePath::parse("matches/match1/team2"),
            json!([{"id": "x", "name": "Ann", "phone": "1"}]),
        );
        store.merge_update(updates).await.unwrap();

        assert_eq!(
            store.document(),
            json!({
                "matches": {"match1": {
                    "time": "13:00",
                    "team1": [],
                    "team2": [{"id": "x", "name": "Ann", "phone": "1"}]
                }},
                "lastResetDate": "2024-01-01"
            })
        );
    }

    #[tokio::test]
    async fn failing_writes_leave_the_tree_unchanged() {
        let store = MemoryTreeStore::with_document(json!({"lastResetDate": "2024-01-01"}));
        store.fail_writes(Some("permission denied"));

        let err = store
            .set_whole_tree(&TreePath::root(), json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("permission denied"));
        assert_eq!(store.document(), json!({"lastResetDate": "2024-01-01"}));
        assert_eq!(store.write_count(), 1);

        store.fail_writes(None);
        store.set_whole_tree(&TreePath::root(), json!({})).await.unwrap();
        assert_eq!(store.document(), json!({}));
    }
}
