use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, TransactionKind};

pub type PassbookId = Uuid;

/// Preset display colors offered for new passbooks.
pub const PASSBOOK_COLORS: &[&str] = &[
    "#7B68EE", // primary blue
    "#87A96B", // sage green
    "#9A8194", // dusty purple
    "#E6D690", // warm yellow
    "#D4A5A5", // blush pink
    "#B8B8B8", // soft gray
    "#5A4FCF", // deep blue
    "#6B7B5A", // muted green
];

/// A named sub-account holding a running balance.
///
/// `balance` is an eagerly maintained cache of the signed sum of every
/// transaction that references this passbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passbook {
    pub id: PassbookId,
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_uri: Option<String>,
    pub balance: Cents,
    pub is_active: bool,
    /// Allocation share in percent (0-100) used by ratio distribution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Passbook {
    /// Create a new, empty and active passbook.
    /// Callers are responsible for rejecting empty names.
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            color: color.into(),
            photo_uri: None,
            balance: 0,
            is_active: true,
            ratio: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_photo_uri(mut self, photo_uri: impl Into<String>) -> Self {
        self.photo_uri = Some(photo_uri.into());
        self
    }

    pub fn with_ratio(mut self, ratio: u8) -> Self {
        self.ratio = Some(ratio);
        self
    }

    /// True when this passbook takes part in ratio distribution.
    pub fn is_allocation_candidate(&self) -> bool {
        self.is_active && self.ratio.is_some_and(|r| r > 0)
    }

    /// Apply the balance effect of a transaction of `amount` cents.
    /// The balance is left untouched when the result would not fit in `Cents`.
    pub fn apply(&mut self, kind: TransactionKind, amount: Cents) -> Result<(), BalanceOverflow> {
        self.balance = self
            .balance
            .checked_add(kind.signed(amount))
            .ok_or(BalanceOverflow)?;
        self.touch();
        Ok(())
    }

    /// Undo the balance effect of a transaction of `amount` cents.
    pub fn revert(&mut self, kind: TransactionKind, amount: Cents) -> Result<(), BalanceOverflow> {
        self.balance = self
            .balance
            .checked_sub(kind.signed(amount))
            .ok_or(BalanceOverflow)?;
        self.touch();
        Ok(())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceOverflow;

impl std::fmt::Display for BalanceOverflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "balance out of range")
    }
}

impl std::error::Error for BalanceOverflow {}

/// Partial update for a passbook. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct PassbookUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub photo_uri: Option<String>,
    pub is_active: Option<bool>,
    pub ratio: Option<u8>,
    pub balance: Option<Cents>,
}

impl PassbookUpdate {
    /// Merge the provided fields into `passbook` and bump `updated_at`.
    pub fn apply_to(self, passbook: &mut Passbook) {
        if let Some(name) = self.name {
            passbook.name = name;
        }
        if let Some(color) = self.color {
            passbook.color = color;
        }
        if let Some(photo_uri) = self.photo_uri {
            passbook.photo_uri = Some(photo_uri);
        }
        if let Some(is_active) = self.is_active {
            passbook.is_active = is_active;
        }
        if let Some(ratio) = self.ratio {
            passbook.ratio = Some(ratio);
        }
        if let Some(balance) = self.balance {
            passbook.balance = balance;
        }
        passbook.touch();
    }
}

/// Seed passbooks materialized when no passbook collection exists yet.
pub fn default_passbooks() -> Vec<Passbook> {
    vec![
        Passbook::new("Needs", "#7B68EE"),
        Passbook::new("Wants", "#87A96B"),
        Passbook::new("Savings", "#E6D690"),
    ]
}
