use super::ids::{LoanId, RepaymentId};
use super::lifecycle::LoanStatus;
use super::money::{Amount, Currency, PaymentMethod};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A longer-running obligation repaid over a fixed number of months.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub user_id: String,
    pub principal: Amount,
    pub currency: Currency,
    /// Term in months at creation.
    pub original_term: u32,
    /// Months with an unpaid repayment entry.
    pub remaining_term: u32,
    pub status: LoanStatus,
    pub remaining_amount: u64,
    pub total_paid: u64,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub activated_at: Option<DateTime<Utc>>,
    pub next_payment_date: Option<NaiveDate>,
}

impl Loan {
    pub fn new(
        user_id: impl Into<String>,
        principal: Amount,
        currency: Currency,
        term_months: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LoanId::UNASSIGNED,
            user_id: user_id.into(),
            principal,
            currency,
            original_term: term_months,
            remaining_term: term_months,
            status: LoanStatus::Pending,
            remaining_amount: principal.value(),
            total_paid: 0,
            created_at,
            approved_at: None,
            activated_at: None,
            next_payment_date: None,
        }
    }
}

/// Input to `create_loan`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub user_id: String,
    pub principal: u64,
    pub currency: String,
    pub term_months: u32,
}

/// A loan with its repayment schedule, ordered by sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanDetails {
    pub loan: Loan,
    pub schedule: Vec<super::installment::RepaymentEntry>,
}

/// Input to `repay_loan`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentRequest {
    pub amount: u64,
    pub method: String,
}

/// A completed repayment against an ACTIVE loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRepayment {
    pub id: RepaymentId,
    pub loan_id: LoanId,
    pub amount: Amount,
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
}
