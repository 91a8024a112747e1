use std::collections::{HashMap, HashSet};

use super::{format_cents, Cents, Passbook, PassbookId, Transaction, TransactionId};

/// Compute the balance for a single passbook by replaying its transactions.
/// Balance = sum of income amounts - sum of expense amounts
pub fn compute_balance(passbook_id: PassbookId, transactions: &[Transaction]) -> Cents {
    transactions
        .iter()
        .filter(|t| t.passbook_id == passbook_id)
        .map(Transaction::signed_amount)
        .fold(0, Cents::saturating_add)
}

/// Compute balances for every passbook referenced by `transactions`.
/// Passbooks without transactions are absent from the map (balance = 0).
pub fn compute_all_balances(transactions: &[Transaction]) -> HashMap<PassbookId, Cents> {
    let mut balances: HashMap<PassbookId, Cents> = HashMap::new();

    for transaction in transactions {
        let balance = balances.entry(transaction.passbook_id).or_insert(0);
        *balance = balance.saturating_add(transaction.signed_amount());
    }

    balances
}

/// Sum of the stored balances of `passbooks`, clamped to the `Cents` range.
pub fn total_balance(passbooks: &[Passbook]) -> Cents {
    passbooks
        .iter()
        .map(|p| p.balance)
        .fold(0, Cents::saturating_add)
}

/// A passbook whose stored balance disagrees with a replay of its transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDrift {
    pub passbook_id: PassbookId,
    pub passbook_name: String,
    pub stored: Cents,
    pub replayed: Cents,
}

impl BalanceDrift {
    pub fn difference(&self) -> Cents {
        self.stored - self.replayed
    }
}

/// Result of a ledger consistency check.
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub passbook_count: usize,
    pub transaction_count: usize,
    pub total_balance: Cents,
    pub drifts: Vec<BalanceDrift>,
    pub orphaned_transactions: Vec<TransactionId>,
    pub invalid_amounts: Vec<TransactionId>,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check every stored balance against a full replay of the transaction log,
/// and flag transactions that point at missing passbooks or carry a
/// non-positive amount.
pub fn build_integrity_report(
    passbooks: &[Passbook],
    transactions: &[Transaction],
) -> IntegrityReport {
    let replayed = compute_all_balances(transactions);
    let known: HashSet<PassbookId> = passbooks.iter().map(|p| p.id).collect();

    let mut report = IntegrityReport {
        passbook_count: passbooks.len(),
        transaction_count: transactions.len(),
        total_balance: total_balance(passbooks),
        ..Default::default()
    };

    for passbook in passbooks {
        let expected = replayed.get(&passbook.id).copied().unwrap_or(0);
        if passbook.balance != expected {
            report.issues.push(format!(
                "Passbook '{}' balance {} does not match transactions ({})",
                passbook.name,
                format_cents(passbook.balance),
                format_cents(expected)
            ));
            report.drifts.push(BalanceDrift {
                passbook_id: passbook.id,
                passbook_name: passbook.name.clone(),
                stored: passbook.balance,
                replayed: expected,
            });
        }
    }

    for transaction in transactions {
        if !known.contains(&transaction.passbook_id) {
            report.issues.push(format!(
                "Transaction {} references missing passbook {}",
                transaction.id, transaction.passbook_id
            ));
            report.orphaned_transactions.push(transaction.id);
        }
        if transaction.amount_cents <= 0 {
            report.issues.push(format!(
                "Transaction {} has non-positive amount {}",
                transaction.id,
                format_cents(transaction.amount_cents)
            ));
            report.invalid_amounts.push(transaction.id);
        }
    }

    report
}
