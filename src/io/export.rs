use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;

use crate::application::{LedgerService, TransactionFilter};
use crate::domain::{format_cents, Passbook, RatioSetting, Transaction};
use crate::storage::Store;

/// Full ledger snapshot for backups
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub passbooks: Vec<Passbook>,
    pub transactions: Vec<Transaction>,
    pub ratio_settings: RatioSetting,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a, S> {
    service: &'a LedgerService<S>,
}

impl<'a, S: Store> Exporter<'a, S> {
    pub fn new(service: &'a LedgerService<S>) -> Self {
        Self { service }
    }

    /// Export transactions matching `filter` to CSV, newest first.
    pub async fn export_transactions_csv<W: Write>(
        &self,
        writer: W,
        filter: &TransactionFilter,
    ) -> Result<usize> {
        let transactions = self.service.list_transactions(filter).await?;
        let passbooks: HashMap<_, _> = self
            .service
            .list_passbooks()
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "date",
            "type",
            "amount",
            "amount_cents",
            "passbook",
            "passbook_at_entry",
            "category",
            "description",
        ])?;

        for tx in &transactions {
            // Name at export time; the stored snapshot may be older
            let current_name = passbooks
                .get(&tx.passbook_id)
                .map(String::as_str)
                .unwrap_or("");
            csv_writer.write_record([
                tx.id.to_string().as_str(),
                &tx.date.to_rfc3339(),
                tx.kind().as_str(),
                &format_cents(tx.amount_cents),
                &tx.amount_cents.to_string(),
                current_name,
                &tx.passbook_name,
                tx.category.map(|c| c.as_str()).unwrap_or(""),
                &tx.description,
            ])?;
        }

        csv_writer.flush()?;
        tracing::debug!("Exported {} transaction(s) to CSV", transactions.len());
        Ok(transactions.len())
    }

    /// Export passbook balances to CSV format
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let passbooks = self.service.list_passbooks().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["passbook", "color", "active", "ratio", "balance", "balance_cents"])?;

        for passbook in &passbooks {
            csv_writer.write_record([
                passbook.name.as_str(),
                &passbook.color,
                if passbook.is_active { "yes" } else { "no" },
                &passbook.ratio.map(|r| r.to_string()).unwrap_or_default(),
                &format_cents(passbook.balance),
                &passbook.balance.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(passbooks.len())
    }

    /// Export the full ledger as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            passbooks: self.service.list_passbooks().await?,
            transactions: self.service.all_transactions().await?,
            ratio_settings: self.service.get_ratio_settings().await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
