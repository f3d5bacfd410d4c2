/// Firebase Realtime Database backend.
#[cfg(feature = "firebase-store")]
pub mod firebase;
/// In-process backend.
pub mod memory;
mod path;

use futures::{future::BoxFuture, stream::BoxStream};
use indexmap::IndexMap;
use serde_json::Value;

use crate::dao::storage::StorageResult;

pub use self::path::TreePath;

/// Live feed of the value stored at a path; `None` means nothing is stored there.
pub type TreeStream = BoxStream<'static, StorageResult<Option<Value>>>;

/// Abstraction over a shared, path-addressable JSON document tree with live subscriptions.
pub trait TreeStore: Send + Sync {
    /// Open a live subscription on `path`.
    ///
    /// The stream yields the current value first and again after every change at or below
    /// `path`. Dropping the stream releases the subscription.
    fn subscribe(&self, path: &TreePath) -> TreeStream;
    /// Atomically overwrite everything at `path` and below with `value`.
    fn set_whole_tree(&self, path: &TreePath, value: Value) -> BoxFuture<'static, StorageResult<()>>;
    /// Atomically apply every `path -> value` overwrite in one write. Unlisted paths are untouched.
    fn merge_update(
        &self,
        updates: IndexMap<TreePath, Value>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Read the value stored at `path` inside `root`, treating `null` as absent.
pub(crate) fn value_at<'a>(root: &'a Value, path: &TreePath) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.segments() {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!current.is_null()).then_some(current)
}

/// Overwrite the value at `path` inside `root`. A `null` value removes the key.
///
/// Intermediate nodes that are missing or not objects are replaced by objects.
pub(crate) fn write_at(root: &mut Value, path: &TreePath, value: Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Default::default());
        }
        current = match current {
            Value::Object(map) => map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Default::default())),
            _ => unreachable!("node was just replaced by an object"),
        };
    }

    if !current.is_object() {
        if value.is_null() {
            return;
        }
        *current = Value::Object(Default::default());
    }
    if let Value::Object(map) = current {
        if value.is_null() {
            map.remove(last);
        } else {
            map.insert(last.clone(), value);
        }
    }
}
