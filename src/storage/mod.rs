pub mod conversations;
pub mod credentials;
pub mod memory;
pub mod sqlite;

pub use conversations::ConversationBook;
pub use credentials::Credentials;

use std::sync::Arc;

use crate::config::{StorageConfig, utils};
use async_trait::async_trait;
use eyre::Result;
use memory::Memory;
use sqlite::Sqlite;
use tokio::sync::broadcast;

pub const CONVERSATIONS_KEY: &str = "chatConversations";
pub const CURRENT_CONVERSATION_KEY: &str = "currentChatConversationId";
pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const TOKEN_TYPE_KEY: &str = "token_type";
pub const USER_INFO_KEY: &str = "user_info";

pub(crate) const CHANGE_CAPACITY: usize = 64;

/// A key written or removed through a [`Store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
}

/// Durable string key/value store.
#[async_trait]
pub trait Store {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;

    /// Changes made through this store after the call.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

pub type ArcStore = Arc<dyn Store + Send + Sync>;

pub async fn new_storage(config: &StorageConfig) -> Result<ArcStore> {
    let store: ArcStore = match config {
        StorageConfig::Sqlite(sqlite_config) => {
            let path = match sqlite_config.path() {
                Some(path) => {
                    let path = utils::resolve_path(path)?;
                    utils::init_parent_dir(&path)?;
                    Some(path)
                }
                None => None,
            };
            let sqlite = Sqlite::new(path.as_deref()).await?;
            sqlite.run_migration().await?;
            Arc::new(sqlite)
        }
        StorageConfig::Memory => Arc::new(Memory::new()),
    };
    Ok(store)
}

pub(crate) fn notify(tx: &broadcast::Sender<StoreChange>, key: &str) {
    // No receivers is fine
    let _ = tx.send(StoreChange {
        key: key.to_string(),
    });
}
