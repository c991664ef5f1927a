//! Record store abstraction over the event table.

use async_trait::async_trait;

use crate::models::{FieldValue, Item};
use crate::Result;

/// Key-value access to event records keyed by `id`.
///
/// Implementations must be safe to share across concurrent invocations.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the record stored under `id`.
    async fn get(&self, id: &str) -> Result<Option<Item>>;

    /// Write `item` in full, replacing any record with the same id.
    async fn put(&self, item: Item) -> Result<()>;

    /// Set a single field on an existing record and return the updated record.
    ///
    /// Fails with `Error::NotFound` when no record exists for `id`; nothing is
    /// written in that case.
    async fn update_field(&self, id: &str, field: &str, value: FieldValue) -> Result<Item>;

    /// Remove the record stored under `id`. Absent records are not an error.
    async fn delete(&self, id: &str) -> Result<()>;
}
