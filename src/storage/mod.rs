use anyhow::Result;
use async_trait::async_trait;

mod memory;
mod repository;
mod sqlite;

pub use memory::*;
pub use repository::*;
pub use sqlite::*;

/// Key holding the passbook collection (JSON array).
pub const PASSBOOKS_KEY: &str = "passbooks";
/// Key holding the transaction collection (JSON array).
pub const TRANSACTIONS_KEY: &str = "transactions";
/// Key holding the legacy needs/wants/savings split.
pub const RATIO_SETTINGS_KEY: &str = "ratio_settings";

/// SQL migration for the key/value table
pub const MIGRATION_001_KV: &str = include_str!("migrations/001_kv.sql");

/// Durable key/value store holding serialized collections.
///
/// The store has no cross-call transactions; `write_batch` is the only way to
/// change several keys as one unit.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Write every entry and remove every key in `removals`, or change nothing.
    async fn write_batch(&self, entries: Vec<(String, Vec<u8>)>, removals: &[&str]) -> Result<()>;

    async fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        self.write_batch(entries, &[]).await
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        self.write_batch(Vec::new(), keys).await
    }
}
