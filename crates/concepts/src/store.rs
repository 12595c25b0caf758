//! In-memory document collections backing every concept.

use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// A stored document with a string id.
pub trait Document: Clone + Send + Sync {
    fn id(&self) -> &str;
}

/// A collection of documents behind an async lock.
///
/// Actions that check a precondition and then write hold the write guard
/// for the whole action, so each action is atomic with respect to others
/// on the same collection.
pub struct Collection<T> {
    docs: Arc<RwLock<Vec<T>>>,
}

impl<T: Document> Collection<T> {
    pub fn new() -> Self {
        Self {
            docs: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.docs.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.docs.write().await
    }

    /// First document satisfying `pred`.
    pub async fn find_one(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.docs.read().await.iter().find(|d| pred(d)).cloned()
    }

    /// All documents satisfying `pred`, in insertion order.
    pub async fn find(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.docs
            .read()
            .await
            .iter()
            .filter(|d| pred(d))
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: &str) -> Option<T> {
        self.find_one(|d| d.id() == id).await
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

impl<T: Document> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove the document with `id`. Returns whether one was removed.
pub fn remove_by_id<T: Document>(docs: &mut Vec<T>, id: &str) -> bool {
    let before = docs.len();
    docs.retain(|d| d.id() != id);
    docs.len() < before
}

/// A fresh document id.
pub fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}
