use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Cents, Passbook, PassbookId, Transaction, TransactionCategory, TransactionKind,
};

/// Filter for querying transactions. Date bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub passbook_id: Option<PassbookId>,
    pub category: Option<TransactionCategory>,
    pub kind: Option<TransactionKind>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl TransactionFilter {
    pub fn for_passbook(passbook_id: PassbookId) -> Self {
        Self {
            passbook_id: Some(passbook_id),
            ..Default::default()
        }
    }

    pub fn between(from_date: DateTime<Utc>, to_date: DateTime<Utc>) -> Self {
        Self {
            from_date: Some(from_date),
            to_date: Some(to_date),
            ..Default::default()
        }
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.passbook_id.is_none_or(|id| transaction.passbook_id == id)
            && self
                .category
                .is_none_or(|c| transaction.category == Some(c))
            && self.kind.is_none_or(|k| transaction.kind() == k)
            && self.from_date.is_none_or(|from| transaction.date >= from)
            && self.to_date.is_none_or(|to| transaction.date <= to)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub income: Cents,
    pub expense: Cents,
    pub net: Cents,
    pub count: usize,
}

impl PeriodTotals {
    pub fn add(&mut self, transaction: &Transaction) {
        match transaction.kind() {
            TransactionKind::Income => {
                self.income = self.income.saturating_add(transaction.amount_cents)
            }
            TransactionKind::Expense => {
                self.expense = self.expense.saturating_add(transaction.amount_cents)
            }
        }
        self.net = self.income.saturating_sub(self.expense);
        self.count += 1;
    }
}

impl<'a> FromIterator<&'a Transaction> for PeriodTotals {
    fn from_iter<I: IntoIterator<Item = &'a Transaction>>(iter: I) -> Self {
        let mut totals = PeriodTotals::default();
        for transaction in iter {
            totals.add(transaction);
        }
        totals
    }
}

/// Income and expense of one passbook within a calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassbookMonthSummary {
    pub passbook_id: PassbookId,
    pub name: String,
    pub color: String,
    pub photo_uri: Option<String>,
    pub income: Cents,
    pub expense: Cents,
    pub net: Cents,
    /// Current all-time balance, for display next to the month figures
    pub balance: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthTotals {
    pub year: i32,
    pub month: u32,
    pub income: Cents,
    pub expense: Cents,
    pub net: Cents,
}

impl MonthTotals {
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: Option<TransactionCategory>,
    pub total: Cents,
    pub count: usize,
    pub percentage: f64,
}

impl CategorySummary {
    pub fn label(&self) -> &'static str {
        self.category.map(|c| c.as_str()).unwrap_or("uncategorized")
    }
}

pub fn totals(transactions: &[Transaction], filter: &TransactionFilter) -> PeriodTotals {
    transactions.iter().filter(|t| filter.matches(t)).collect()
}

fn in_month(transaction: &Transaction, year: i32, month: u32) -> bool {
    transaction.date.year() == year && transaction.date.month() == month
}

/// Per-passbook income, expense and net for a calendar month (UTC).
pub fn passbook_month_summaries(
    passbooks: &[Passbook],
    transactions: &[Transaction],
    year: i32,
    month: u32,
) -> Vec<PassbookMonthSummary> {
    passbooks
        .iter()
        .map(|passbook| {
            let totals: PeriodTotals = transactions
                .iter()
                .filter(|t| t.passbook_id == passbook.id && in_month(t, year, month))
                .collect();

            PassbookMonthSummary {
                passbook_id: passbook.id,
                name: passbook.name.clone(),
                color: passbook.color.clone(),
                photo_uri: passbook.photo_uri.clone(),
                income: totals.income,
                expense: totals.expense,
                net: totals.net,
                balance: passbook.balance,
            }
        })
        .collect()
}

/// Longest window `monthly_trend` reports on.
pub const MAX_TREND_MONTHS: usize = 1200;

/// Totals for the last `months` calendar months up to and including the
/// month of `now`, oldest first. Months without activity are zero.
/// `months` is capped at `MAX_TREND_MONTHS`.
pub fn monthly_trend(
    transactions: &[Transaction],
    passbook_id: Option<PassbookId>,
    months: usize,
    now: DateTime<Utc>,
) -> Vec<MonthTotals> {
    let current = now.year() * 12 + now.month0() as i32;
    let months = i32::try_from(months.min(MAX_TREND_MONTHS)).unwrap_or(0);

    (0..months)
        .rev()
        .map(|back| {
            let index = current - back;
            let year = index.div_euclid(12);
            let month = index.rem_euclid(12) as u32 + 1;

            let totals: PeriodTotals = transactions
                .iter()
                .filter(|t| passbook_id.is_none_or(|id| t.passbook_id == id))
                .filter(|t| in_month(t, year, month))
                .collect();

            MonthTotals {
                year,
                month,
                income: totals.income,
                expense: totals.expense,
                net: totals.net,
            }
        })
        .collect()
}

/// Spending (or earning) per category between two dates, largest first.
pub fn category_breakdown(
    transactions: &[Transaction],
    from_date: DateTime<Utc>,
    to_date: DateTime<Utc>,
    kind: TransactionKind,
) -> Vec<CategorySummary> {
    let filter = TransactionFilter {
        kind: Some(kind),
        ..TransactionFilter::between(from_date, to_date)
    };

    let mut groups: BTreeMap<Option<TransactionCategory>, (Cents, usize)> = BTreeMap::new();
    for transaction in transactions.iter().filter(|t| filter.matches(t)) {
        let entry = groups.entry(transaction.category).or_insert((0, 0));
        entry.0 = entry.0.saturating_add(transaction.amount_cents);
        entry.1 += 1;
    }

    let grand_total = groups
        .values()
        .fold(0, |sum: Cents, (total, _)| sum.saturating_add(*total));
    let mut summaries: Vec<CategorySummary> = groups
        .into_iter()
        .map(|(category, (total, count))| CategorySummary {
            category,
            total,
            count,
            percentage: if grand_total > 0 {
                total as f64 / grand_total as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect();

    summaries.sort_by(|a, b| b.total.cmp(&a.total));
    summaries
}
