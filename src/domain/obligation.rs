use super::ids::InstallmentId;
use super::installment::{Installment, ObligationRef};
use super::lifecycle::InstallmentStatus;
use super::loan::Loan;
use super::money::Amount;
use super::payment::Payment;
use super::schedule::{InstallmentTiers, ScheduleStrategy};
use crate::error::{CreditError, Result};
use chrono::NaiveDate;

/// Something that must be repaid through a schedule.
///
/// Payments and loans differ only in how many installments they get and when
/// the schedule starts; everything after that is shared.
#[derive(Debug, Clone, PartialEq)]
pub enum Obligation {
    Payment(Payment),
    Loan(Loan),
}

impl Obligation {
    pub fn owner(&self) -> ObligationRef {
        match self {
            Self::Payment(p) => ObligationRef::Payment(p.id),
            Self::Loan(l) => ObligationRef::Loan(l.id),
        }
    }

    pub fn principal(&self) -> Amount {
        match self {
            Self::Payment(p) => p.amount,
            Self::Loan(l) => l.principal,
        }
    }

    pub fn strategy(&self, tiers: &InstallmentTiers) -> ScheduleStrategy {
        match self {
            Self::Payment(_) => ScheduleStrategy::Tiered(tiers.clone()),
            Self::Loan(l) => ScheduleStrategy::FixedTerm {
                months: l.original_term,
            },
        }
    }

    /// Date the schedule counts months from: settlement for payments,
    /// activation for loans.
    pub fn schedule_start(&self) -> Result<NaiveDate> {
        let started = match self {
            Self::Payment(p) => p.settled_at,
            Self::Loan(l) => l.activated_at,
        };
        started.map(|at| at.date_naive()).ok_or_else(|| {
            CreditError::ValidationError(format!(
                "{} has not started; no schedule can be built",
                self.owner()
            ))
        })
    }

    /// Unpersisted schedule entries for this obligation.
    pub fn draft_schedule(&self, tiers: &InstallmentTiers) -> Result<Vec<Installment>> {
        let owner = self.owner();
        let lines = self
            .strategy(tiers)
            .plan(self.principal(), self.schedule_start()?)?;
        Ok(lines
            .into_iter()
            .map(|line| Installment {
                id: InstallmentId::UNASSIGNED,
                owner,
                sequence: line.sequence,
                due_date: line.due_date,
                amount: line.amount,
                status: InstallmentStatus::Pending,
            })
            .collect())
    }
}
