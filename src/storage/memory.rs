#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;

use std::collections::HashMap;

use async_trait::async_trait;
use eyre::Result;
use tokio::sync::{RwLock, broadcast};

use super::{CHANGE_CAPACITY, Store, StoreChange, notify};

/// Process-local store. Nothing survives a restart.
pub struct Memory {
    entries: RwLock<HashMap<String, String>>,
    changes: broadcast::Sender<StoreChange>,
}

impl Memory {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            changes,
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for Memory {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        notify(&self.changes, key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if self.entries.write().await.remove(key).is_some() {
            notify(&self.changes, key);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
