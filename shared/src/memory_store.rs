//! In-memory record store with the same conditional semantics as the table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::models::{fields, record_id, FieldValue, Item};
use crate::store::RecordStore;
use crate::{Error, Result};

#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<Mutex<HashMap<String, Item>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the given records.
    pub fn with_records(items: impl IntoIterator<Item = Item>) -> Result<Self> {
        let store = Self::new();
        {
            let mut records = store.lock()?;
            for item in items {
                let id = required_id(&item)?;
                records.insert(id, item);
            }
        }
        Ok(store)
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Item>>> {
        self.records
            .lock()
            .map_err(|_| Error::Store("record store lock poisoned".to_string()))
    }
}

fn required_id(item: &Item) -> Result<String> {
    record_id(item)
        .map(str::to_string)
        .ok_or_else(|| Error::validation("record is missing a string id"))
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, id: &str) -> Result<Option<Item>> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn put(&self, item: Item) -> Result<()> {
        let id = required_id(&item)?;
        self.lock()?.insert(id, item);
        Ok(())
    }

    async fn update_field(&self, id: &str, field: &str, value: FieldValue) -> Result<Item> {
        if field == fields::ID {
            return Err(Error::validation("the id field cannot be updated"));
        }

        let mut records = self.lock()?;
        let record = records
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        record.insert(field.to_string(), value);
        Ok(record.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.lock()?.remove(id);
        Ok(())
    }
}
