#[cfg(test)]
#[path = "sqlite_test.rs"]
mod tests;

pub(crate) mod migration;

use async_trait::async_trait;
use eyre::{Context, Result};
use tokio::sync::broadcast;
use tokio_rusqlite::{Connection, params};

use super::{CHANGE_CAPACITY, Store, StoreChange, notify};

pub struct Sqlite {
    conn: Connection,
    changes: broadcast::Sender<StoreChange>,
}

impl Sqlite {
    pub async fn new(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(path) => Connection::open(path)
                .await
                .wrap_err(format!("opening database path: {}", path))?,
            None => Connection::open_in_memory()
                .await
                .wrap_err("opening in-memory database")?,
        };

        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Ok(Self { conn, changes })
    }

    pub async fn run_migration(&self) -> Result<()> {
        self.conn
            .call(|conn| Ok(conn.execute_batch(migration::MIGRATION)?))
            .await
            .wrap_err("executing migration")?;
        Ok(())
    }
}

#[async_trait]
impl Store for Sqlite {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        let value = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?")?;
                let mut rows = stmt.query(params![key])?;
                let value = match rows.next()? {
                    Some(row) => Some(row.get::<_, String>(0)?),
                    None => None,
                };
                Ok(value)
            })
            .await
            .wrap_err("reading key")?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let owned_key = key.to_string();
        let value = value.to_string();
        let now = chrono::Utc::now().timestamp_millis();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![owned_key, value, now],
                )?;
                Ok(())
            })
            .await
            .wrap_err(format!("writing key {}", key))?;
        notify(&self.changes, key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let owned_key = key.to_string();
        let removed = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM kv WHERE key = ?", params![owned_key])?))
            .await
            .wrap_err(format!("removing key {}", key))?;
        if removed > 0 {
            notify(&self.changes, key);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
