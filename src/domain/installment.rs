use super::ids::{InstallmentId, LoanId, PaymentId};
use super::lifecycle::InstallmentStatus;
use super::money::Amount;
use crate::error::CreditError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The obligation a schedule entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ObligationRef {
    Payment(PaymentId),
    Loan(LoanId),
}

impl ObligationRef {
    pub fn entity(&self) -> &'static str {
        match self {
            Self::Payment(_) => "payment",
            Self::Loan(_) => "loan",
        }
    }

    pub fn raw_id(&self) -> u64 {
        match self {
            Self::Payment(id) => id.value(),
            Self::Loan(id) => id.value(),
        }
    }

    /// The error for scheduling an obligation a second time.
    pub fn already_scheduled(&self) -> CreditError {
        CreditError::Conflict {
            entity: self.entity(),
            id: self.raw_id(),
            current: "SCHEDULED".to_string(),
            requested: "SCHEDULED".to_string(),
        }
    }
}

impl fmt::Display for ObligationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.entity(), self.raw_id())
    }
}

/// One dated slice of an obligation's principal.
///
/// Payments call these installments and loans call them repayment entries;
/// both are created in a single batch and share the same state graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub owner: ObligationRef,
    /// Position in the schedule, starting at 1.
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub amount: Amount,
    pub status: InstallmentStatus,
}

pub type RepaymentEntry = Installment;

/// Owner shared by every entry of a schedule batch.
///
/// Fails on an empty batch or one that mixes owners.
pub fn batch_owner(installments: &[Installment]) -> Result<ObligationRef, CreditError> {
    let owner = installments
        .first()
        .map(|i| i.owner)
        .ok_or_else(|| CreditError::ValidationError("Empty installment batch".to_string()))?;
    if installments.iter().any(|i| i.owner != owner) {
        return Err(CreditError::ValidationError(
            "Installment batch spans several owners".to_string(),
        ));
    }
    Ok(owner)
}
