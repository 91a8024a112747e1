use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{percent_of, Cents, Passbook, PassbookId};

/// Ratios of the passbooks taking part in a distribution must add up to this.
pub const FULL_RATIO: u32 = 100;

/// One slice of a ratio distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub passbook_id: PassbookId,
    pub ratio: u8,
    pub amount_cents: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    NoCandidates,
    RatioMismatch { sum: u32 },
}

impl std::fmt::Display for AllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationError::NoCandidates => write!(f, "no passbooks to allocate to"),
            AllocationError::RatioMismatch { sum } => {
                write!(f, "ratios must sum to {}%, got {}%", FULL_RATIO, sum)
            }
        }
    }
}

impl std::error::Error for AllocationError {}

/// Sum of the ratios of `passbooks`, treating unset ratios as 0.
pub fn ratio_sum(passbooks: &[Passbook]) -> u32 {
    passbooks
        .iter()
        .map(|p| u32::from(p.ratio.unwrap_or(0)))
        .sum()
}

/// Split `total` across `candidates` by their ratios, in the given order.
///
/// Every candidate but the last receives `total * ratio / 100` rounded half-up
/// to the cent. The last one receives whatever is left, so the allocated
/// amounts always add up to `total` exactly.
pub fn allocate_by_ratio(
    total: Cents,
    candidates: &[Passbook],
) -> Result<Vec<Allocation>, AllocationError> {
    let Some((last, rest)) = candidates.split_last() else {
        return Err(AllocationError::NoCandidates);
    };

    let sum = ratio_sum(candidates);
    if sum != FULL_RATIO {
        return Err(AllocationError::RatioMismatch { sum });
    }

    let mut remaining = total;
    let mut allocations = Vec::with_capacity(candidates.len());

    for passbook in rest {
        let ratio = passbook.ratio.unwrap_or(0);
        let amount_cents = percent_of(total, ratio);
        remaining -= amount_cents;
        allocations.push(Allocation {
            passbook_id: passbook.id,
            ratio,
            amount_cents,
        });
    }

    allocations.push(Allocation {
        passbook_id: last.id,
        ratio: last.ratio.unwrap_or(0),
        amount_cents: remaining,
    });

    Ok(allocations)
}

/// Equal split of 100% across `count` passbooks.
/// Each gets floor(100 / count); the first one also gets the remainder.
pub fn even_ratios(count: usize) -> Vec<u8> {
    if count == 0 {
        return Vec::new();
    }
    let count_u32 = u32::try_from(count).unwrap_or(u32::MAX);
    let share = FULL_RATIO / count_u32;
    let remainder = FULL_RATIO - share * count_u32;

    (0..count)
        .map(|index| {
            let ratio = if index == 0 { share + remainder } else { share };
            ratio as u8
        })
        .collect()
}

/// Legacy three-way budget split (needs / wants / savings), stored as fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatioSetting {
    pub id: String,
    pub needs_ratio: f64,
    pub wants_ratio: f64,
    pub savings_ratio: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RatioSetting {
    const TOLERANCE: f64 = 1e-6;

    pub fn new(needs_ratio: f64, wants_ratio: f64, savings_ratio: f64) -> Self {
        let now = Utc::now();
        Self {
            id: "default".to_string(),
            needs_ratio,
            wants_ratio,
            savings_ratio,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn total(&self) -> f64 {
        self.needs_ratio + self.wants_ratio + self.savings_ratio
    }

    /// True when every fraction is within [0, 1] and they add up to 1.
    pub fn is_valid(&self) -> bool {
        let parts = [self.needs_ratio, self.wants_ratio, self.savings_ratio];
        parts.iter().all(|r| (0.0..=1.0).contains(r))
            && (self.total() - 1.0).abs() < Self::TOLERANCE
    }
}

impl Default for RatioSetting {
    /// The 50/30/20 rule.
    fn default() -> Self {
        Self::new(0.5, 0.3, 0.2)
    }
}
