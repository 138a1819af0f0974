//! Deterministic partitioning of a principal into dated schedule lines.

use super::money::Amount;
use crate::error::{CreditError, Result};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Amounts strictly below `below` are split into `count` installments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub below: u64,
    pub count: u32,
}

/// Policy mapping payment amount ranges to installment counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TiersRepr", into = "TiersRepr")]
pub struct InstallmentTiers {
    tiers: Vec<Tier>,
    fallback: u32,
}

#[derive(Serialize, Deserialize)]
struct TiersRepr {
    tiers: Vec<Tier>,
    fallback: u32,
}

impl InstallmentTiers {
    /// Builds a tier table. Bounds must be strictly ascending and every count
    /// positive.
    pub fn new(tiers: Vec<Tier>, fallback: u32) -> Result<Self> {
        if fallback == 0 || tiers.iter().any(|t| t.count == 0) {
            return Err(CreditError::ValidationError(
                "Installment counts must be positive".to_string(),
            ));
        }
        if tiers.windows(2).any(|w| w[0].below >= w[1].below) {
            return Err(CreditError::ValidationError(
                "Installment tier bounds must be strictly ascending".to_string(),
            ));
        }
        Ok(Self { tiers, fallback })
    }

    pub fn count_for(&self, amount: Amount) -> u32 {
        self.tiers
            .iter()
            .find(|t| amount.value() < t.below)
            .map_or(self.fallback, |t| t.count)
    }
}

impl Default for InstallmentTiers {
    fn default() -> Self {
        Self {
            tiers: vec![
                Tier {
                    below: 1000,
                    count: 3,
                },
                Tier {
                    below: 5000,
                    count: 6,
                },
            ],
            fallback: 12,
        }
    }
}

impl TryFrom<TiersRepr> for InstallmentTiers {
    type Error = CreditError;

    fn try_from(repr: TiersRepr) -> Result<Self> {
        Self::new(repr.tiers, repr.fallback)
    }
}

impl From<InstallmentTiers> for TiersRepr {
    fn from(tiers: InstallmentTiers) -> Self {
        Self {
            tiers: tiers.tiers,
            fallback: tiers.fallback,
        }
    }
}

/// How an obligation's principal is turned into a number of installments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleStrategy {
    /// Count chosen from the amount by a tier table (credit-line payments).
    Tiered(InstallmentTiers),
    /// One installment per month of the term (loans).
    FixedTerm { months: u32 },
}

impl ScheduleStrategy {
    /// Number of installments for `principal`, never more than the principal
    /// itself so that no installment is worth zero.
    pub fn installment_count(&self, principal: Amount) -> u32 {
        let count = match self {
            Self::Tiered(tiers) => tiers.count_for(principal),
            Self::FixedTerm { months } => *months,
        };
        let cap = u32::try_from(principal.value()).unwrap_or(u32::MAX);
        count.min(cap)
    }

    pub fn plan(&self, principal: Amount, start: NaiveDate) -> Result<Vec<ScheduleLine>> {
        build_lines(principal, self.installment_count(principal), start)
    }
}

/// An installment before it is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleLine {
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub amount: Amount,
}

/// Splits `principal` into `count` lines due monthly after `start`.
///
/// Lines 1..count-1 carry `floor(principal / count)` and the last one carries
/// the remainder, so the total is exact.
pub fn build_lines(principal: Amount, count: u32, start: NaiveDate) -> Result<Vec<ScheduleLine>> {
    if count == 0 || u64::from(count) > principal.value() {
        return Err(CreditError::ValidationError(format!(
            "Cannot split {principal} into {count} installments"
        )));
    }

    let base = principal.value() / u64::from(count);
    let last = principal.value() - base * u64::from(count - 1);

    (1..=count)
        .map(|sequence| {
            let due_date = start
                .checked_add_months(Months::new(sequence))
                .ok_or_else(|| {
                    CreditError::ValidationError(format!(
                        "Due date {sequence} months after {start} is out of range"
                    ))
                })?;
            let amount = if sequence == count { last } else { base };
            Ok(ScheduleLine {
                sequence,
                due_date,
                amount: Amount::new(amount)?,
            })
        })
        .collect()
}
