// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use finora::application::LedgerService;
use finora::domain::{Cents, Passbook, PassbookUpdate, Transaction, TransactionKind};
use finora::storage::{MemoryStore, Store};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to create a service that keeps everything in memory
pub fn memory_service() -> LedgerService<MemoryStore> {
    LedgerService::in_memory()
}

/// Memory store whose writes can be switched to fail on demand.
/// A failed write changes nothing.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
    fail_removals: AtomicBool,
}

impl FailingStore {
    /// Fail every write.
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    /// Fail only batches that remove keys.
    pub fn fail_removals(&self, on: bool) {
        self.fail_removals.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("disk full while writing '{}'", key);
        }
        self.inner.set(key, value).await
    }

    async fn write_batch(&self, entries: Vec<(String, Vec<u8>)>, removals: &[&str]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("disk full while writing {} key(s)", entries.len());
        }
        if !removals.is_empty() && self.fail_removals.load(Ordering::SeqCst) {
            bail!("failed to remove {:?}", removals);
        }
        self.inner.write_batch(entries, removals).await
    }
}

/// Helper to create a service whose store can be made to fail
pub fn failing_service() -> LedgerService<FailingStore> {
    LedgerService::new(FailingStore::default())
}

/// Both collections, for comparing state before and after an operation
pub async fn snapshot<S: Store>(
    service: &LedgerService<S>,
) -> Result<(Vec<Passbook>, Vec<Transaction>)> {
    Ok((
        service.list_passbooks().await?,
        service.all_transactions().await?,
    ))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

pub async fn create_passbook<S: Store>(service: &LedgerService<S>, name: &str) -> Result<Passbook> {
    Ok(service
        .create_passbook(name.to_string(), "#7B68EE".to_string(), None)
        .await?)
}

pub async fn create_with_ratio<S: Store>(
    service: &LedgerService<S>,
    name: &str,
    ratio: u8,
) -> Result<Passbook> {
    let passbook = create_passbook(service, name).await?;
    let update = PassbookUpdate {
        ratio: Some(ratio),
        ..Default::default()
    };
    Ok(service.update_passbook(passbook.id, update).await?)
}

pub async fn income<S: Store>(
    service: &LedgerService<S>,
    passbook: &Passbook,
    amount: Cents,
) -> Result<Transaction> {
    Ok(service
        .create_transaction(
            passbook.id,
            amount,
            TransactionKind::Income,
            Utc::now(),
            None,
            None,
        )
        .await?)
}

pub async fn expense<S: Store>(
    service: &LedgerService<S>,
    passbook: &Passbook,
    amount: Cents,
) -> Result<Transaction> {
    Ok(service
        .create_transaction(
            passbook.id,
            amount,
            TransactionKind::Expense,
            Utc::now(),
            None,
            None,
        )
        .await?)
}

pub async fn balance_of<S: Store>(service: &LedgerService<S>, passbook: &Passbook) -> Result<Cents> {
    Ok(service.get_passbook(passbook.id).await?.balance)
}

/// Every stored balance equals the replay of its transactions.
pub async fn assert_consistent<S: Store>(service: &LedgerService<S>) -> Result<()> {
    let report = service.check_integrity().await?;
    assert!(report.is_healthy(), "ledger drifted: {:?}", report.issues);
    Ok(())
}
