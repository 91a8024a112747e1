use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{
    allocate_by_ratio, build_integrity_report, compute_all_balances, BalanceDrift, Cents,
    IntegrityReport, Passbook, PassbookId, PassbookUpdate, RatioSetting, Transaction,
    TransactionCategory, TransactionId, TransactionKind, TransactionUpdate, FULL_RATIO,
};
use crate::storage::{MemoryStore, Repository, SqliteStore, Store};

use super::reporting::{self, CategorySummary, MonthTotals, PassbookMonthSummary, PeriodTotals};
use super::{AppError, LedgerConfig, TransactionFilter};

/// Application service owning all mutation of passbooks and transactions.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
///
/// Every operation runs as one read-modify-write cycle under a single ledger
/// lock, and persists both collections with one store write, so no caller
/// ever observes a transaction without its balance effect.
///
/// Operations on a missing passbook or transaction id fail with
/// `PassbookNotFound` / `TransactionNotFound`; none of them is a silent no-op.
pub struct LedgerService<S = SqliteStore> {
    repo: Repository<S>,
    config: LedgerConfig,
    lock: Mutex<()>,
}

/// Result of deleting a passbook
#[derive(Debug, Clone)]
pub struct DeletedPassbook {
    pub passbook: Passbook,
    pub removed_transactions: usize,
}

impl LedgerService<SqliteStore> {
    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let store = SqliteStore::init(&db_url).await?;
        Ok(Self::new(store))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let store = SqliteStore::connect(&db_url).await?;
        Ok(Self::new(store))
    }
}

impl LedgerService<MemoryStore> {
    /// A ledger that lives only as long as the service.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl<S: Store> LedgerService<S> {
    /// Create a new ledger service over the given store.
    pub fn new(store: S) -> Self {
        Self::with_config(store, LedgerConfig::default())
    }

    pub fn with_config(store: S, config: LedgerConfig) -> Self {
        Self {
            repo: Repository::new(store),
            config,
            lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        self.repo.store()
    }

    // ========================
    // Passbook operations
    // ========================

    /// Create a new passbook with a zero balance.
    /// Callers must reject empty names before calling.
    pub async fn create_passbook(
        &self,
        name: String,
        color: String,
        photo_uri: Option<String>,
    ) -> Result<Passbook, AppError> {
        let _guard = self.lock.lock().await;
        let mut passbooks = self.repo.load_passbooks().await?;

        let mut passbook = Passbook::new(name, color);
        if let Some(uri) = photo_uri {
            passbook = passbook.with_photo_uri(uri);
        }

        passbooks.push(passbook.clone());
        self.repo.save_passbooks(&passbooks).await?;

        tracing::debug!("Created passbook: {} ({})", passbook.name, passbook.id);
        Ok(passbook)
    }

    /// Get a passbook by ID.
    pub async fn get_passbook(&self, id: PassbookId) -> Result<Passbook, AppError> {
        let _guard = self.lock.lock().await;
        let passbooks = self.repo.load_passbooks().await?;
        passbooks
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::PassbookNotFound(id.to_string()))
    }

    /// Get a passbook by name (case-insensitive). The first match wins.
    pub async fn find_passbook(&self, name: &str) -> Result<Passbook, AppError> {
        let _guard = self.lock.lock().await;
        let passbooks = self.repo.load_passbooks().await?;
        let wanted = name.to_lowercase();
        passbooks
            .into_iter()
            .find(|p| p.name.to_lowercase() == wanted)
            .ok_or_else(|| AppError::PassbookNotFound(name.to_string()))
    }

    /// List all passbooks in their stored order.
    pub async fn list_passbooks(&self) -> Result<Vec<Passbook>, AppError> {
        let _guard = self.lock.lock().await;
        Ok(self.repo.load_passbooks().await?)
    }

    /// List passbooks selectable for new transactions.
    pub async fn list_active_passbooks(&self) -> Result<Vec<Passbook>, AppError> {
        let mut passbooks = self.list_passbooks().await?;
        passbooks.retain(|p| p.is_active);
        Ok(passbooks)
    }

    /// Merge `update` into a passbook.
    pub async fn update_passbook(
        &self,
        id: PassbookId,
        update: PassbookUpdate,
    ) -> Result<Passbook, AppError> {
        if let Some(ratio) = update.ratio {
            validate_ratio(ratio)?;
        }

        let _guard = self.lock.lock().await;
        let mut passbooks = self.repo.load_passbooks().await?;
        let passbook = passbooks
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::PassbookNotFound(id.to_string()))?;

        update.apply_to(passbook);
        let updated = passbook.clone();
        self.repo.save_passbooks(&passbooks).await?;

        tracing::debug!("Updated passbook: {} ({})", updated.name, updated.id);
        Ok(updated)
    }

    /// Delete a passbook together with every transaction recorded against it.
    pub async fn delete_passbook(&self, id: PassbookId) -> Result<DeletedPassbook, AppError> {
        let _guard = self.lock.lock().await;
        let mut passbooks = self.repo.load_passbooks().await?;
        let mut transactions = self.repo.load_transactions().await?;

        let index = passbooks
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| AppError::PassbookNotFound(id.to_string()))?;
        let passbook = passbooks.remove(index);

        let before = transactions.len();
        transactions.retain(|t| t.passbook_id != id);
        let removed_transactions = before - transactions.len();

        self.repo.save_ledger(&passbooks, &transactions).await?;

        tracing::info!(
            "Deleted passbook {} and {} transaction(s)",
            passbook.name,
            removed_transactions
        );
        Ok(DeletedPassbook {
            passbook,
            removed_transactions,
        })
    }

    /// Assign allocation ratios to several passbooks at once.
    /// The given ratios must add up to exactly 100; passbooks not listed keep
    /// their current ratio.
    pub async fn set_ratios(
        &self,
        ratios: &[(PassbookId, u8)],
    ) -> Result<Vec<Passbook>, AppError> {
        for (_, ratio) in ratios {
            validate_ratio(*ratio)?;
        }
        let sum: u32 = ratios.iter().map(|(_, r)| u32::from(*r)).sum();
        if sum != FULL_RATIO {
            return Err(AppError::RatioMismatch { sum });
        }

        let _guard = self.lock.lock().await;
        let mut passbooks = self.repo.load_passbooks().await?;

        for (id, ratio) in ratios {
            let passbook = passbooks
                .iter_mut()
                .find(|p| p.id == *id)
                .ok_or_else(|| AppError::PassbookNotFound(id.to_string()))?;
            passbook.ratio = Some(*ratio);
            passbook.touch();
        }

        self.repo.save_passbooks(&passbooks).await?;
        tracing::debug!("Saved ratios for {} passbook(s)", ratios.len());
        Ok(passbooks)
    }

    /// Active passbooks with a positive ratio, in stored order.
    pub async fn allocation_candidates(&self) -> Result<Vec<Passbook>, AppError> {
        let mut passbooks = self.list_passbooks().await?;
        passbooks.retain(Passbook::is_allocation_candidate);
        Ok(passbooks)
    }

    // ========================
    // Transaction operations
    // ========================

    /// Record a new transaction and apply its effect to the passbook balance.
    pub async fn create_transaction(
        &self,
        passbook_id: PassbookId,
        amount_cents: Cents,
        kind: TransactionKind,
        date: DateTime<Utc>,
        description: Option<String>,
        category: Option<TransactionCategory>,
    ) -> Result<Transaction, AppError> {
        validate_amount(amount_cents)?;

        let _guard = self.lock.lock().await;
        let mut passbooks = self.repo.load_passbooks().await?;
        let mut transactions = self.repo.load_transactions().await?;

        let passbook = passbooks
            .iter_mut()
            .find(|p| p.id == passbook_id)
            .ok_or_else(|| AppError::PassbookNotFound(passbook_id.to_string()))?;

        let mut transaction = Transaction::new(passbook, amount_cents, kind, date)
            .with_description(description.unwrap_or_default());
        if let Some(category) = category {
            transaction = transaction.with_category(category);
        }

        passbook.apply(kind, amount_cents)?;
        transactions.push(transaction.clone());
        self.repo.save_ledger(&passbooks, &transactions).await?;

        tracing::debug!(
            "Created {} transaction {} of {} on passbook {}",
            kind,
            transaction.id,
            amount_cents,
            transaction.passbook_name
        );
        Ok(transaction)
    }

    /// Get a transaction by ID.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        let _guard = self.lock.lock().await;
        let transactions = self.repo.load_transactions().await?;
        transactions
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))
    }

    /// All transactions in recording order.
    pub async fn all_transactions(&self) -> Result<Vec<Transaction>, AppError> {
        let _guard = self.lock.lock().await;
        Ok(self.repo.load_transactions().await?)
    }

    /// List transactions matching `filter`, newest `date` first.
    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, AppError> {
        let mut transactions = self.all_transactions().await?;
        transactions.retain(|t| filter.matches(t));
        transactions.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            transactions.truncate(limit);
        }
        Ok(transactions)
    }

    /// The `limit` most recent transactions across all passbooks.
    pub async fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>, AppError> {
        let filter = TransactionFilter {
            limit: Some(limit),
            ..Default::default()
        };
        self.list_transactions(&filter).await
    }

    /// Update a transaction and reconcile the affected passbook balances.
    ///
    /// A changed amount on the same passbook moves its balance by the
    /// difference. A changed passbook reverses the old amount on the old
    /// passbook and applies the (possibly new) amount on the new one, and
    /// refreshes the passbook snapshot on the transaction.
    pub async fn update_transaction(
        &self,
        id: TransactionId,
        update: TransactionUpdate,
    ) -> Result<Transaction, AppError> {
        if let Some(amount) = update.amount_cents {
            validate_amount(amount)?;
        }

        let _guard = self.lock.lock().await;
        let mut passbooks = self.repo.load_passbooks().await?;
        let mut transactions = self.repo.load_transactions().await?;

        let index = transactions
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))?;

        let old = transactions[index].clone();
        let kind = old.kind();
        let new_amount = update.amount_cents.unwrap_or(old.amount_cents);
        let new_passbook_id = update.passbook_id.unwrap_or(old.passbook_id);
        let passbook_changed = new_passbook_id != old.passbook_id;
        let amount_changed = new_amount != old.amount_cents;

        let old_index = passbooks.iter().position(|p| p.id == old.passbook_id);
        if passbook_changed {
            let new_index = passbooks
                .iter()
                .position(|p| p.id == new_passbook_id)
                .ok_or_else(|| AppError::PassbookNotFound(new_passbook_id.to_string()))?;

            match old_index {
                Some(i) => passbooks[i].revert(kind, old.amount_cents)?,
                None => tracing::warn!(
                    "Transaction {} pointed at missing passbook {}",
                    id,
                    old.passbook_id
                ),
            }
            passbooks[new_index].apply(kind, new_amount)?;
            transactions[index].move_to(&passbooks[new_index]);
        } else if amount_changed {
            match old_index {
                Some(i) => {
                    passbooks[i].revert(kind, old.amount_cents)?;
                    passbooks[i].apply(kind, new_amount)?;
                }
                None => tracing::warn!(
                    "Transaction {} pointed at missing passbook {}",
                    id,
                    old.passbook_id
                ),
            }
        }

        let transaction = &mut transactions[index];
        transaction.amount_cents = new_amount;
        if let Some(description) = update.description {
            transaction.description = description;
        }
        if let Some(date) = update.date {
            transaction.date = date;
        }
        if let Some(category) = update.category {
            transaction.category = Some(category);
        }
        transaction.updated_at = Utc::now();
        let updated = transaction.clone();

        if passbook_changed || amount_changed {
            self.repo.save_ledger(&passbooks, &transactions).await?;
        } else {
            self.repo.save_transactions(&transactions).await?;
        }

        tracing::debug!(
            "Updated transaction {} (amount changed: {}, passbook changed: {})",
            id,
            amount_changed,
            passbook_changed
        );
        Ok(updated)
    }

    /// Delete a transaction and reverse its effect on its passbook.
    pub async fn delete_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        let _guard = self.lock.lock().await;
        let mut passbooks = self.repo.load_passbooks().await?;
        let mut transactions = self.repo.load_transactions().await?;

        let index = transactions
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))?;
        let transaction = transactions.remove(index);

        match passbooks
            .iter_mut()
            .find(|p| p.id == transaction.passbook_id)
        {
            Some(passbook) => passbook.revert(transaction.kind(), transaction.amount_cents)?,
            None => tracing::warn!(
                "Deleted transaction {} pointed at missing passbook {}",
                id,
                transaction.passbook_id
            ),
        }

        self.repo.save_ledger(&passbooks, &transactions).await?;

        tracing::debug!("Deleted transaction {}", id);
        Ok(transaction)
    }

    // ========================
    // Ratio distribution
    // ========================

    /// Split one income across `candidates` by their ratios.
    ///
    /// Candidates are processed in the given order; the last one absorbs the
    /// rounding residue so the created amounts add up to `total_cents`
    /// exactly. Nothing is written unless every slice can be recorded.
    ///
    /// A total too small for the ratios, such that any slice would round to
    /// zero or below (1 cent split 50/50), fails with `InvalidAmount`.
    pub async fn distribute_income(
        &self,
        total_cents: Cents,
        candidates: &[PassbookId],
        description: Option<String>,
        date: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, AppError> {
        validate_amount(total_cents)?;
        if candidates.is_empty() {
            return Err(AppError::NoCandidates);
        }
        let mut seen = HashSet::new();
        if let Some(dup) = candidates.iter().find(|id| !seen.insert(**id)) {
            return Err(AppError::InvalidRatio(format!(
                "passbook {} is listed more than once",
                dup
            )));
        }

        let _guard = self.lock.lock().await;
        let mut passbooks = self.repo.load_passbooks().await?;
        let mut transactions = self.repo.load_transactions().await?;

        let selected = candidates
            .iter()
            .map(|id| {
                passbooks
                    .iter()
                    .find(|p| p.id == *id)
                    .cloned()
                    .ok_or_else(|| AppError::PassbookNotFound(id.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let allocations = allocate_by_ratio(total_cents, &selected)?;
        if allocations.iter().any(|a| a.amount_cents <= 0) {
            return Err(AppError::InvalidAmount(format!(
                "{} is too small to split across {} passbooks",
                crate::domain::format_cents(total_cents),
                allocations.len()
            )));
        }

        let mut created = Vec::with_capacity(allocations.len());
        for allocation in &allocations {
            let passbook = passbooks
                .iter_mut()
                .find(|p| p.id == allocation.passbook_id)
                .ok_or_else(|| AppError::PassbookNotFound(allocation.passbook_id.to_string()))?;

            let text = description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| self.config.allocation_description(&passbook.name));
            let transaction = Transaction::new(
                passbook,
                allocation.amount_cents,
                TransactionKind::Income,
                date,
            )
            .with_description(text);

            passbook.apply(TransactionKind::Income, allocation.amount_cents)?;
            transactions.push(transaction.clone());
            created.push(transaction);
        }

        self.repo.save_ledger(&passbooks, &transactions).await?;

        tracing::info!(
            "Allocated {} across {} passbook(s)",
            crate::domain::format_cents(total_cents),
            created.len()
        );
        Ok(created)
    }

    /// Distribute income over every current allocation candidate.
    pub async fn distribute_income_by_ratio(
        &self,
        total_cents: Cents,
        description: Option<String>,
        date: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, AppError> {
        let candidates: Vec<PassbookId> = self
            .allocation_candidates()
            .await?
            .iter()
            .map(|p| p.id)
            .collect();
        self.distribute_income(total_cents, &candidates, description, date)
            .await
    }

    // ========================
    // Legacy ratio settings
    // ========================

    pub async fn get_ratio_settings(&self) -> Result<RatioSetting, AppError> {
        let _guard = self.lock.lock().await;
        Ok(self.repo.load_ratio_settings().await?)
    }

    pub async fn save_ratio_settings(
        &self,
        mut settings: RatioSetting,
    ) -> Result<RatioSetting, AppError> {
        if !settings.is_valid() {
            return Err(AppError::InvalidRatio(format!(
                "needs/wants/savings must each be within 0..1 and sum to 1, got {:.3}",
                settings.total()
            )));
        }
        settings.updated_at = Utc::now();

        let _guard = self.lock.lock().await;
        self.repo.save_ratio_settings(&settings).await?;
        Ok(settings)
    }

    // ========================
    // Maintenance
    // ========================

    /// Remove every transaction and the ratio settings, and zero every
    /// passbook balance. Passbooks themselves are kept.
    pub async fn reset_all_data(&self) -> Result<(), AppError> {
        let _guard = self.lock.lock().await;
        let mut passbooks = self.repo.load_passbooks().await?;
        for passbook in &mut passbooks {
            passbook.balance = 0;
            passbook.touch();
        }

        self.repo.reset_ledger(&passbooks).await?;

        tracing::info!("Cleared all transactions, {} passbook(s) reset", passbooks.len());
        Ok(())
    }

    /// Check stored balances against a replay of the transaction log.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let _guard = self.lock.lock().await;
        let passbooks = self.repo.load_passbooks().await?;
        let transactions = self.repo.load_transactions().await?;
        Ok(build_integrity_report(&passbooks, &transactions))
    }

    /// Overwrite every stored balance with the replayed sum of its
    /// transactions. Returns the passbooks that were corrected.
    pub async fn rebuild_balances(&self) -> Result<Vec<BalanceDrift>, AppError> {
        let _guard = self.lock.lock().await;
        let mut passbooks = self.repo.load_passbooks().await?;
        let transactions = self.repo.load_transactions().await?;
        let replayed = compute_all_balances(&transactions);

        let mut corrected = Vec::new();
        for passbook in &mut passbooks {
            let expected = replayed.get(&passbook.id).copied().unwrap_or(0);
            if passbook.balance != expected {
                corrected.push(BalanceDrift {
                    passbook_id: passbook.id,
                    passbook_name: passbook.name.clone(),
                    stored: passbook.balance,
                    replayed: expected,
                });
                passbook.balance = expected;
                passbook.touch();
            }
        }

        if !corrected.is_empty() {
            self.repo.save_passbooks(&passbooks).await?;
            tracing::info!("Rebuilt {} passbook balance(s)", corrected.len());
        }
        Ok(corrected)
    }

    // ========================
    // Reporting
    // ========================

    /// Income, expense and net of the transactions matching `filter`.
    pub async fn totals(&self, filter: &TransactionFilter) -> Result<PeriodTotals, AppError> {
        let transactions = self.all_transactions().await?;
        Ok(reporting::totals(&transactions, filter))
    }

    /// Per-passbook figures for one calendar month.
    pub async fn passbook_month_summaries(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<PassbookMonthSummary>, AppError> {
        let _guard = self.lock.lock().await;
        let passbooks = self.repo.load_passbooks().await?;
        let transactions = self.repo.load_transactions().await?;
        Ok(reporting::passbook_month_summaries(
            &passbooks,
            &transactions,
            year,
            month,
        ))
    }

    /// Totals for the last `months` months, oldest first.
    pub async fn monthly_trend(
        &self,
        passbook_id: Option<PassbookId>,
        months: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<MonthTotals>, AppError> {
        let transactions = self.all_transactions().await?;
        Ok(reporting::monthly_trend(
            &transactions,
            passbook_id,
            months,
            now,
        ))
    }

    /// Per-category totals between two dates.
    pub async fn category_breakdown(
        &self,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        kind: TransactionKind,
    ) -> Result<Vec<CategorySummary>, AppError> {
        let transactions = self.all_transactions().await?;
        Ok(reporting::category_breakdown(
            &transactions,
            from_date,
            to_date,
            kind,
        ))
    }
}

fn validate_amount(amount_cents: Cents) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(AppError::InvalidAmount(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_ratio(ratio: u8) -> Result<(), AppError> {
    if u32::from(ratio) > FULL_RATIO {
        return Err(AppError::InvalidRatio(format!(
            "{}% is outside 0-100%",
            ratio
        )));
    }
    Ok(())
}
