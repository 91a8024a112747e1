use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, Passbook, PassbookId, TransactionCategory};

pub type TransactionId = Uuid;

/// Direction of a transaction's effect on its passbook balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn from_is_income(is_income: bool) -> Self {
        if is_income {
            TransactionKind::Income
        } else {
            TransactionKind::Expense
        }
    }

    /// Signed balance effect of a positive `amount`.
    pub fn signed(&self, amount: Cents) -> Cents {
        match self {
            TransactionKind::Income => amount,
            TransactionKind::Expense => -amount,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single recorded money movement against exactly one passbook.
///
/// `passbook_name` and `passbook_color` are snapshots taken when the
/// transaction is recorded; later passbook edits do not rewrite them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    /// Amount in cents (always positive, sign comes from `is_income`)
    pub amount_cents: Cents,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<TransactionCategory>,
    pub passbook_id: PassbookId,
    pub passbook_name: String,
    pub passbook_color: String,
    /// When the movement happened in the real world
    pub date: DateTime<Utc>,
    pub is_income: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a transaction against `passbook`, snapshotting its display fields.
    pub fn new(
        passbook: &Passbook,
        amount_cents: Cents,
        kind: TransactionKind,
        date: DateTime<Utc>,
    ) -> Self {
        assert!(amount_cents > 0, "Transaction amount must be positive");
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            amount_cents,
            description: String::new(),
            category: None,
            passbook_id: passbook.id,
            passbook_name: passbook.name.clone(),
            passbook_color: passbook.color.clone(),
            date,
            is_income: kind == TransactionKind::Income,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: TransactionCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn kind(&self) -> TransactionKind {
        TransactionKind::from_is_income(self.is_income)
    }

    /// Signed effect of this transaction on its passbook balance.
    pub fn signed_amount(&self) -> Cents {
        self.kind().signed(self.amount_cents)
    }

    /// Point this transaction at another passbook, refreshing the snapshot.
    pub fn move_to(&mut self, passbook: &Passbook) {
        self.passbook_id = passbook.id;
        self.passbook_name = passbook.name.clone();
        self.passbook_color = passbook.color.clone();
    }
}

/// Partial update for a transaction. `None` fields are left unchanged.
/// The income/expense nature cannot be changed.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub amount_cents: Option<Cents>,
    pub description: Option<String>,
    pub passbook_id: Option<PassbookId>,
    pub date: Option<DateTime<Utc>>,
    pub category: Option<TransactionCategory>,
}

impl TransactionUpdate {
    pub fn amount(amount_cents: Cents) -> Self {
        Self {
            amount_cents: Some(amount_cents),
            ..Default::default()
        }
    }

    pub fn passbook(passbook_id: PassbookId) -> Self {
        Self {
            passbook_id: Some(passbook_id),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_transaction_snapshots_passbook() {
        let passbook = Passbook::new("Main", "#87A96B");
        let tx = Transaction::new(&passbook, 5000, TransactionKind::Expense, Utc::now())
            .with_description("Lunch")
            .with_category(TransactionCategory::Dining);

        assert_eq!(tx.passbook_id, passbook.id);
        assert_eq!(tx.passbook_name, "Main");
        assert_eq!(tx.passbook_color, "#87A96B");
        assert_eq!(tx.signed_amount(), -5000);
        assert!(!tx.is_income);
    }

    #[test]
    fn test_ids_are_time_ordered() {
        let passbook = Passbook::new("Main", "#87A96B");
        let first = Transaction::new(&passbook, 1, TransactionKind::Income, Utc::now());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = Transaction::new(&passbook, 1, TransactionKind::Income, Utc::now());
        assert!(first.id < second.id);
    }

    #[test]
    fn test_move_to_refreshes_snapshot() {
        let from = Passbook::new("Main", "#87A96B");
        let to = Passbook::new("Travel", "#D4A5A5");
        let mut tx = Transaction::new(&from, 100, TransactionKind::Income, Utc::now());

        tx.move_to(&to);
        assert_eq!(tx.passbook_id, to.id);
        assert_eq!(tx.passbook_name, "Travel");
    }

    #[test]
    fn test_dates_serialize_as_rfc3339() {
        let passbook = Passbook::new("Main", "#87A96B");
        let date = DateTime::parse_from_rfc3339("2024-03-15T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let tx = Transaction::new(&passbook, 100, TransactionKind::Income, date);

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["date"], "2024-03-15T09:30:00Z");
        assert_eq!(json["isIncome"], true);
        assert_eq!(json["amountCents"], 100);

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back.date, date);
    }

    #[test]
    #[should_panic(expected = "Transaction amount must be positive")]
    fn test_transaction_requires_positive_amount() {
        let passbook = Passbook::new("Main", "#87A96B");
        Transaction::new(&passbook, 0, TransactionKind::Income, Utc::now());
    }
}
