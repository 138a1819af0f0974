#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use creditline::application::{CreditEngine, Deadline};
use creditline::config::EngineConfig;
use creditline::domain::application::{ApplicationRequest, CreditApplication};
use creditline::domain::ids::{ApplicationId, InstallmentId, LoanId, PaymentId};
use creditline::domain::installment::{Installment, ObligationRef};
use creditline::domain::loan::{Loan, LoanRepayment};
use creditline::domain::payment::{Payment, PaymentRequest};
use creditline::domain::ports::{
    ApplicationStore, CreditScorerBox, InstallmentStore, Ledger, LoanStore, PaymentStore,
};
use creditline::error::{CreditError, Result};
use creditline::infrastructure::clock::ManualClock;
use creditline::infrastructure::in_memory::InMemoryLedger;
use creditline::infrastructure::scoring::FixedScorer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct Harness {
    pub engine: Arc<CreditEngine>,
    pub clock: ManualClock,
}

pub fn harness(score: u16) -> Harness {
    harness_with(Box::new(FixedScorer(score)), EngineConfig::default())
}

pub fn harness_with(scorer: CreditScorerBox, config: EngineConfig) -> Harness {
    harness_on(Ledger::from_store(InMemoryLedger::new()), scorer, config)
}

pub fn harness_on(ledger: Ledger, scorer: CreditScorerBox, config: EngineConfig) -> Harness {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
    let engine = CreditEngine::new(ledger, scorer, Arc::new(clock.clone()), config).unwrap();
    Harness {
        engine: Arc::new(engine),
        clock,
    }
}

pub fn no_deadline() -> Deadline {
    Deadline::unbounded()
}

pub async fn apply(engine: &CreditEngine, user: &str, amount: u64) -> ApplicationId {
    engine
        .create_credit_application(
            ApplicationRequest {
                user_id: user.into(),
                amount,
                currency: "USD".into(),
            },
            &no_deadline(),
        )
        .await
        .unwrap()
}

/// Creates and approves a USD credit line. The engine's scorer must approve.
pub async fn approved_line(engine: &CreditEngine, user: &str, amount: u64) -> ApplicationId {
    let id = apply(engine, user, amount).await;
    engine
        .approve_or_reject_application(id, &no_deadline())
        .await
        .unwrap();
    id
}

pub fn payment(application_id: ApplicationId, user: &str, amount: u64) -> PaymentRequest {
    PaymentRequest {
        application_id,
        user_id: user.into(),
        amount,
        currency: "USD".into(),
        method: "card".into(),
    }
}

/// Write paths of a [`FaultyLedger`] that can be made to fail.
#[derive(Clone, Default)]
pub struct Faults {
    pub payment_updates: Arc<AtomicBool>,
    pub installment_updates: Arc<AtomicBool>,
    pub loan_writes: Arc<AtomicBool>,
}

impl Faults {
    fn check(flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(CreditError::persistence("disk full"))
        } else {
            Ok(())
        }
    }
}

/// An in-memory ledger whose writes fail while the matching switch is set.
#[derive(Clone, Default)]
pub struct FaultyLedger {
    inner: InMemoryLedger,
    pub faults: Faults,
}

/// A harness over a [`FaultyLedger`], plus a handle sharing its tables and
/// switches.
pub fn faulty_harness(score: u16) -> (Harness, FaultyLedger) {
    let ledger = FaultyLedger::default();
    let harness = harness_on(
        Ledger::from_store(ledger.clone()),
        Box::new(FixedScorer(score)),
        EngineConfig::default(),
    );
    (harness, ledger)
}


#[async_trait]
impl ApplicationStore for FaultyLedger {
    async fn create(&self, application: CreditApplication) -> Result<CreditApplication> {
        ApplicationStore::create(&self.inner, application).await
    }

    async fn get(&self, id: ApplicationId) -> Result<Option<CreditApplication>> {
        ApplicationStore::get(&self.inner, id).await
    }

    async fn update(&self, application: CreditApplication) -> Result<()> {
        ApplicationStore::update(&self.inner, application).await
    }

    async fn list(&self) -> Result<Vec<CreditApplication>> {
        ApplicationStore::list(&self.inner).await
    }

    async fn get_by_user(&self, user_id: &str) -> Result<Vec<CreditApplication>> {
        ApplicationStore::get_by_user(&self.inner, user_id).await
    }
}

#[async_trait]
impl PaymentStore for FaultyLedger {
    async fn create(&self, payment: Payment) -> Result<Payment> {
        PaymentStore::create(&self.inner, payment).await
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        PaymentStore::get(&self.inner, id).await
    }

    async fn update(&self, payment: Payment) -> Result<()> {
        Faults::check(&self.faults.payment_updates)?;
        PaymentStore::update(&self.inner, payment).await
    }

    async fn list(&self) -> Result<Vec<Payment>> {
        PaymentStore::list(&self.inner).await
    }

    async fn get_by_application(&self, application_id: ApplicationId) -> Result<Vec<Payment>> {
        self.inner.get_by_application(application_id).await
    }
}

#[async_trait]
impl InstallmentStore for FaultyLedger {
    async fn create_batch(&self, installments: Vec<Installment>) -> Result<Vec<Installment>> {
        self.inner.create_batch(installments).await
    }

    async fn get(&self, id: InstallmentId) -> Result<Option<Installment>> {
        InstallmentStore::get(&self.inner, id).await
    }

    async fn update(&self, installment: Installment) -> Result<()> {
        Faults::check(&self.faults.installment_updates)?;
        InstallmentStore::update(&self.inner, installment).await
    }

    async fn update_batch(&self, installments: Vec<Installment>) -> Result<()> {
        Faults::check(&self.faults.installment_updates)?;
        self.inner.update_batch(installments).await
    }

    async fn get_by_owner(&self, owner: ObligationRef) -> Result<Vec<Installment>> {
        self.inner.get_by_owner(owner).await
    }

    async fn delete_by_owner(&self, owner: ObligationRef) -> Result<usize> {
        self.inner.delete_by_owner(owner).await
    }
}

#[async_trait]
impl LoanStore for FaultyLedger {
    async fn create(&self, loan: Loan) -> Result<Loan> {
        LoanStore::create(&self.inner, loan).await
    }

    async fn get(&self, id: LoanId) -> Result<Option<Loan>> {
        LoanStore::get(&self.inner, id).await
    }

    async fn update(&self, loan: Loan) -> Result<()> {
        Faults::check(&self.faults.loan_writes)?;
        LoanStore::update(&self.inner, loan).await
    }

    async fn list(&self) -> Result<Vec<Loan>> {
        LoanStore::list(&self.inner).await
    }

    async fn get_by_user(&self, user_id: &str) -> Result<Vec<Loan>> {
        LoanStore::get_by_user(&self.inner, user_id).await
    }

    async fn record_repayment(
        &self,
        loan: Loan,
        repayment: LoanRepayment,
    ) -> Result<LoanRepayment> {
        Faults::check(&self.faults.loan_writes)?;
        self.inner.record_repayment(loan, repayment).await
    }

    async fn get_repayments(&self, loan_id: LoanId) -> Result<Vec<LoanRepayment>> {
        self.inner.get_repayments(loan_id).await
    }
}
