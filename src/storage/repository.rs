use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::{default_passbooks, Passbook, RatioSetting, Transaction};

use super::{Store, PASSBOOKS_KEY, RATIO_SETTINGS_KEY, TRANSACTIONS_KEY};

/// Repository for persisting and loading the passbook and transaction
/// collections as JSON documents in a key/value store.
pub struct Repository<S> {
    store: S,
}

impl<S: Store> Repository<S> {
    /// Create a new repository over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ========================
    // Passbook collection
    // ========================

    /// Load all passbooks, in stored order.
    /// A store that has never held passbooks is seeded with the default set,
    /// which is persisted so later reads see the same ids.
    pub async fn load_passbooks(&self) -> Result<Vec<Passbook>> {
        if let Some(passbooks) = self.read_json::<Vec<Passbook>>(PASSBOOKS_KEY).await? {
            return Ok(passbooks);
        }

        let seeds = default_passbooks();
        self.save_passbooks(&seeds).await?;
        tracing::info!("Seeded {} default passbooks", seeds.len());
        Ok(seeds)
    }

    pub async fn save_passbooks(&self, passbooks: &[Passbook]) -> Result<()> {
        let bytes = encode(PASSBOOKS_KEY, passbooks)?;
        self.store
            .set(PASSBOOKS_KEY, bytes)
            .await
            .context("Failed to save passbooks")
    }

    // ========================
    // Transaction collection
    // ========================

    /// Load all transactions, in stored (creation) order.
    pub async fn load_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self
            .read_json::<Vec<Transaction>>(TRANSACTIONS_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn save_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        let bytes = encode(TRANSACTIONS_KEY, transactions)?;
        self.store
            .set(TRANSACTIONS_KEY, bytes)
            .await
            .context("Failed to save transactions")
    }

    /// Persist both collections as a single write.
    pub async fn save_ledger(
        &self,
        passbooks: &[Passbook],
        transactions: &[Transaction],
    ) -> Result<()> {
        let entries = vec![
            (PASSBOOKS_KEY.to_string(), encode(PASSBOOKS_KEY, passbooks)?),
            (
                TRANSACTIONS_KEY.to_string(),
                encode(TRANSACTIONS_KEY, transactions)?,
            ),
        ];
        self.store
            .set_many(entries)
            .await
            .context("Failed to save ledger")
    }

    // ========================
    // Ratio settings
    // ========================

    pub async fn load_ratio_settings(&self) -> Result<RatioSetting> {
        Ok(self
            .read_json::<RatioSetting>(RATIO_SETTINGS_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn save_ratio_settings(&self, settings: &RatioSetting) -> Result<()> {
        let bytes = encode(RATIO_SETTINGS_KEY, settings)?;
        self.store
            .set(RATIO_SETTINGS_KEY, bytes)
            .await
            .context("Failed to save ratio settings")
    }

    /// Store `passbooks`, an empty transaction log and no ratio settings in
    /// a single batch.
    pub async fn reset_ledger(&self, passbooks: &[Passbook]) -> Result<()> {
        let empty: &[Transaction] = &[];
        let entries = vec![
            (PASSBOOKS_KEY.to_string(), encode(PASSBOOKS_KEY, passbooks)?),
            (TRANSACTIONS_KEY.to_string(), encode(TRANSACTIONS_KEY, empty)?),
        ];
        self.store
            .write_batch(entries, &[RATIO_SETTINGS_KEY])
            .await
            .context("Failed to reset ledger")
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.store.get(key).await? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt data stored under '{}'", key))?;
        Ok(Some(value))
    }
}

fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).with_context(|| format!("Failed to serialize '{}'", key))
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::domain::TransactionKind;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_empty_store_is_seeded_once() -> Result<()> {
        let repo = Repository::new(MemoryStore::new());
        let first = repo.load_passbooks().await?;
        assert_eq!(first.len(), 3);

        let second = repo.load_passbooks().await?;
        assert_eq!(first, second);
        assert!(repo.load_transactions().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_collection_is_not_reseeded() -> Result<()> {
        let repo = Repository::new(MemoryStore::new());
        repo.save_passbooks(&[]).await?;
        assert!(repo.load_passbooks().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_dates_survive_reload() -> Result<()> {
        let repo = Repository::new(MemoryStore::new());
        let passbook = Passbook::new("Main", "#7B68EE");
        let date = DateTime::parse_from_rfc3339("2024-02-29T23:15:00Z")?.with_timezone(&Utc);
        let tx = Transaction::new(&passbook, 1200, TransactionKind::Expense, date);

        repo.save_ledger(&[passbook], &[tx.clone()]).await?;

        let raw = repo.store().get(TRANSACTIONS_KEY).await?.unwrap();
        let raw = String::from_utf8(raw)?;
        assert!(raw.contains("\"date\":\"2024-02-29T23:15:00Z\""));

        let loaded = repo.load_transactions().await?;
        assert_eq!(loaded, vec![tx]);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_data_is_an_error() -> Result<()> {
        let store = MemoryStore::new();
        store.set(PASSBOOKS_KEY, b"{not json".to_vec()).await?;
        let repo = Repository::new(store);

        let err = repo.load_passbooks().await.unwrap_err();
        assert!(err.to_string().contains("Corrupt data stored under 'passbooks'"));
        Ok(())
    }

    #[tokio::test]
    async fn test_ratio_settings_default_and_clear() -> Result<()> {
        let repo = Repository::new(MemoryStore::new());
        assert_eq!(repo.load_ratio_settings().await?.needs_ratio, 0.5);

        repo.save_ratio_settings(&RatioSetting::new(0.6, 0.2, 0.2))
            .await?;
        assert_eq!(repo.load_ratio_settings().await?.needs_ratio, 0.6);

        let passbooks = repo.load_passbooks().await?;
        repo.save_transactions(&[Transaction::new(
            &passbooks[0],
            100,
            TransactionKind::Income,
            Utc::now(),
        )])
        .await?;

        repo.reset_ledger(&passbooks).await?;
        assert_eq!(repo.load_ratio_settings().await?.needs_ratio, 0.5);
        assert!(repo.load_transactions().await?.is_empty());
        assert_eq!(repo.load_passbooks().await?, passbooks);
        Ok(())
    }
}
