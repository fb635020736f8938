use crate::error::StorageError;
use async_trait::async_trait;

/// Whole-collection persistence used by the proxy pool and the key store.
///
/// Read everything, or replace everything.
/// Callers own ordering and mutation; a store only mirrors the latest list.
#[async_trait]
pub trait Store<T>: Send + Sync
where
    T: Send + Sync,
{
    /// Load the persisted list. A store with nothing persisted yet returns an empty list.
    async fn load(&self) -> Result<Vec<T>, StorageError>;

    /// Replace the persisted list with `items`.
    async fn rewrite(&self, items: &[T]) -> Result<(), StorageError>;

    /// Human-readable location for log lines.
    fn describe(&self) -> String;
}
