use thiserror::Error;

use crate::domain::{AllocationError, BalanceOverflow};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Passbook not found: {0}")]
    PassbookNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid ratio: {0}")]
    InvalidRatio(String),

    #[error("Passbook ratios must sum to 100%, current sum is {sum}%")]
    RatioMismatch { sum: u32 },

    #[error("No passbooks are set up for ratio allocation")]
    NoCandidates,

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl AppError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::PassbookNotFound(_) | AppError::TransactionNotFound(_)
        )
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::NoCandidates => AppError::NoCandidates,
            AllocationError::RatioMismatch { sum } => AppError::RatioMismatch { sum },
        }
    }
}

impl From<BalanceOverflow> for AppError {
    fn from(err: BalanceOverflow) -> Self {
        AppError::InvalidAmount(err.to_string())
    }
}
