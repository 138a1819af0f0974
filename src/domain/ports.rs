use super::application::CreditApplication;
use super::ids::{ApplicationId, InstallmentId, LoanId, PaymentId};
use super::installment::{Installment, ObligationRef};
use super::loan::{Loan, LoanRepayment};
use super::payment::Payment;
use crate::error::{CreditError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

// Lookups return `Ok(None)` for unknown ids so callers can tell "not found"
// apart from a failing backend. `update` on an unknown id is `NotFound`.

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Persists a new application and returns it with its assigned id.
    async fn create(&self, application: CreditApplication) -> Result<CreditApplication>;
    async fn get(&self, id: ApplicationId) -> Result<Option<CreditApplication>>;
    async fn update(&self, application: CreditApplication) -> Result<()>;
    async fn list(&self) -> Result<Vec<CreditApplication>>;
    async fn get_by_user(&self, user_id: &str) -> Result<Vec<CreditApplication>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Payment>;
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>>;
    async fn update(&self, payment: Payment) -> Result<()>;
    async fn list(&self) -> Result<Vec<Payment>>;
    async fn get_by_application(&self, application_id: ApplicationId) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait InstallmentStore: Send + Sync {
    /// Persists a whole schedule atomically: either every entry is written or
    /// none is. Fails with `Conflict` if the owner already has a schedule.
    async fn create_batch(&self, installments: Vec<Installment>) -> Result<Vec<Installment>>;
    async fn get(&self, id: InstallmentId) -> Result<Option<Installment>>;
    async fn update(&self, installment: Installment) -> Result<()>;
    /// Overwrites several existing entries atomically. Fails with `NotFound`
    /// and writes nothing if any entry is unknown.
    async fn update_batch(&self, installments: Vec<Installment>) -> Result<()>;
    /// Entries owned by `owner`, ordered by sequence.
    async fn get_by_owner(&self, owner: ObligationRef) -> Result<Vec<Installment>>;
    /// Removes a schedule, returning how many entries were deleted.
    async fn delete_by_owner(&self, owner: ObligationRef) -> Result<usize>;
}

#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn create(&self, loan: Loan) -> Result<Loan>;
    async fn get(&self, id: LoanId) -> Result<Option<Loan>>;
    async fn update(&self, loan: Loan) -> Result<()>;
    async fn list(&self) -> Result<Vec<Loan>>;
    async fn get_by_user(&self, user_id: &str) -> Result<Vec<Loan>>;
    /// Stores `loan` and appends `repayment` to its history in one atomic
    /// write, returning the repayment with its assigned id.
    async fn record_repayment(
        &self,
        loan: Loan,
        repayment: LoanRepayment,
    ) -> Result<LoanRepayment>;
    /// Repayments of `loan_id`, oldest first.
    async fn get_repayments(&self, loan_id: LoanId) -> Result<Vec<LoanRepayment>>;
}

pub type ApplicationStoreBox = Box<dyn ApplicationStore>;
pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type InstallmentStoreBox = Box<dyn InstallmentStore>;
pub type LoanStoreBox = Box<dyn LoanStore>;

/// The full set of stores the engine persists through.
pub struct Ledger {
    pub applications: ApplicationStoreBox,
    pub payments: PaymentStoreBox,
    pub installments: InstallmentStoreBox,
    pub loans: LoanStoreBox,
}

impl Ledger {
    pub fn new(
        applications: ApplicationStoreBox,
        payments: PaymentStoreBox,
        installments: InstallmentStoreBox,
        loans: LoanStoreBox,
    ) -> Self {
        Self {
            applications,
            payments,
            installments,
            loans,
        }
    }

    /// Builds a ledger where one backend serves every entity.
    pub fn from_store<S>(store: S) -> Self
    where
        S: ApplicationStore + PaymentStore + InstallmentStore + LoanStore + Clone + 'static,
    {
        Self::new(
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(store),
        )
    }
}

/// A credit-worthiness score in the conventional 300..=850 band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CreditScore(u16);

impl CreditScore {
    pub const MIN: u16 = 300;
    pub const MAX: u16 = 850;

    pub fn new(value: u16) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CreditError::Scoring(format!(
                "score {value} outside {}..={}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

/// Source of credit scores for applicants.
#[async_trait]
pub trait CreditScorer: Send + Sync {
    async fn score(&self, user_id: &str) -> Result<CreditScore>;
}

pub type CreditScorerBox = Box<dyn CreditScorer>;

/// Wall-clock source, injectable so timers can be driven deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type ClockHandle = Arc<dyn Clock>;
