use super::admission::PaymentAdmission;
use super::deadline::Deadline;
use super::decision::CreditDecision;
use super::loans::LoanLifecycle;
use super::locks::{KeyedLocks, LockKey};
use super::notifications::{Notification, SettlementQueue};
use super::scheduler::InstallmentScheduler;
use super::settlement::{Ack, SettlementProcessor};
use crate::config::EngineConfig;
use crate::domain::application::{ApplicationRequest, CreditApplication};
use crate::domain::ids::{ApplicationId, InstallmentId, LoanId, PaymentId};
use crate::domain::installment::ObligationRef;
use crate::domain::lifecycle::{ApplicationStatus, LoanStatus};
use crate::domain::loan::{Loan, LoanDetails, LoanRepayment, LoanRequest, RepaymentRequest};
use crate::domain::money::{Amount, Currency};
use crate::domain::payment::{Payment, PaymentDetails, PaymentRequest};
use crate::domain::ports::{ClockHandle, CreditScorerBox, Ledger};
use crate::error::{CreditError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// The main entry point of the credit lifecycle.
///
/// `CreditEngine` takes a credit application through scoring, payment
/// admission, settlement and installment scheduling, and runs loans through
/// the same stages. It is `Send + Sync`; share it as `Arc<CreditEngine>` and
/// call it from as many tasks as needed. Operations on the same entity are
/// serialized internally.
pub struct CreditEngine {
    ledger: Arc<Ledger>,
    config: Arc<EngineConfig>,
    clock: ClockHandle,
    locks: Arc<KeyedLocks<LockKey>>,
    decision: Arc<CreditDecision>,
    admission: PaymentAdmission,
    settlement: SettlementProcessor,
    loans: LoanLifecycle,
}

impl CreditEngine {
    /// Creates a new `CreditEngine`.
    ///
    /// # Arguments
    ///
    /// * `ledger` - The stores every entity is persisted through.
    /// * `scorer` - Source of applicant credit scores.
    /// * `clock` - Time source for timestamps and delayed notifications.
    /// * `config` - Policy knobs; rejected with `ValidationError` if invalid.
    pub fn new(
        ledger: Ledger,
        scorer: CreditScorerBox,
        clock: ClockHandle,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let ledger = Arc::new(ledger);
        let config = Arc::new(config);
        let locks = Arc::new(KeyedLocks::new());
        let queue = Arc::new(SettlementQueue::new());

        let decision = Arc::new(CreditDecision::new(
            Arc::clone(&ledger),
            Arc::clone(&locks),
            scorer,
            Arc::clone(&clock),
            config.approval_threshold,
        ));
        let scheduler = Arc::new(InstallmentScheduler::new(
            Arc::clone(&ledger),
            config.installment_tiers.clone(),
        ));
        let admission = PaymentAdmission::new(
            Arc::clone(&ledger),
            Arc::clone(&locks),
            Arc::clone(&queue),
            Arc::clone(&clock),
            Arc::clone(&config),
        );
        let settlement = SettlementProcessor::new(
            Arc::clone(&ledger),
            Arc::clone(&locks),
            Arc::clone(&scheduler),
            queue,
            Arc::clone(&clock),
            config.settlement_delay(),
        );
        let loans = LoanLifecycle::new(
            Arc::clone(&ledger),
            Arc::clone(&locks),
            Arc::clone(&decision),
            scheduler,
            Arc::clone(&clock),
            Arc::clone(&config),
        );

        Ok(Self {
            ledger,
            config,
            clock,
            locks,
            decision,
            admission,
            settlement,
            loans,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Records a new PENDING credit application.
    pub async fn create_credit_application(
        &self,
        request: ApplicationRequest,
        deadline: &Deadline,
    ) -> Result<ApplicationId> {
        if request.user_id.trim().is_empty() {
            return Err(CreditError::ValidationError(
                "User id must not be empty".to_string(),
            ));
        }
        let amount = Amount::new(request.amount)?;
        let currency = Currency::new(request.currency)?;
        if !self.config.supports_currency(&currency) {
            return Err(CreditError::ValidationError(format!(
                "Unsupported currency {currency}"
            )));
        }

        deadline.check()?;
        let application = self
            .ledger
            .applications
            .create(CreditApplication::new(
                request.user_id,
                amount,
                currency,
                self.clock.now(),
            ))
            .await?;
        info!(
            application = %application.id,
            user = %application.user_id,
            amount = amount.value(),
            "credit application created"
        );
        Ok(application.id)
    }

    pub async fn approve_or_reject_application(
        &self,
        id: ApplicationId,
        deadline: &Deadline,
    ) -> Result<ApplicationStatus> {
        self.decision.decide(id, deadline).await
    }

    pub async fn get_application(
        &self,
        id: ApplicationId,
        deadline: &Deadline,
    ) -> Result<CreditApplication> {
        deadline
            .bound(self.ledger.applications.get(id))
            .await??
            .ok_or(CreditError::NotFound {
                entity: "credit application",
                id: id.value(),
            })
    }

    /// Every application filed by `user_id`, ordered by id.
    pub async fn list_applications_by_user(
        &self,
        user_id: &str,
        deadline: &Deadline,
    ) -> Result<Vec<CreditApplication>> {
        deadline
            .bound(self.ledger.applications.get_by_user(user_id))
            .await?
    }

    /// Admits a PENDING payment and queues its simulated settlement.
    pub async fn create_payment(
        &self,
        request: PaymentRequest,
        deadline: &Deadline,
    ) -> Result<PaymentId> {
        Ok(self.admission.admit(request, deadline).await?.id)
    }

    pub async fn get_payment_details(
        &self,
        id: PaymentId,
        deadline: &Deadline,
    ) -> Result<PaymentDetails> {
        let payment = deadline
            .bound(self.ledger.payments.get(id))
            .await??
            .ok_or(CreditError::NotFound {
                entity: "payment",
                id: id.value(),
            })?;
        let installments = deadline
            .bound(
                self.ledger
                    .installments
                    .get_by_owner(ObligationRef::Payment(id)),
            )
            .await??;
        Ok(PaymentDetails {
            payment,
            installments,
        })
    }

    pub async fn list_payments(&self, deadline: &Deadline) -> Result<Vec<Payment>> {
        deadline.bound(self.ledger.payments.list()).await?
    }

    /// Every payment with its schedule, ordered by payment id.
    pub async fn all_payment_details(&self, deadline: &Deadline) -> Result<Vec<PaymentDetails>> {
        let mut details = Vec::new();
        for payment in self.list_payments(deadline).await? {
            details.push(self.get_payment_details(payment.id, deadline).await?);
        }
        Ok(details)
    }

    pub async fn handle_payment_webhook(
        &self,
        id: PaymentId,
        status: &str,
        deadline: &Deadline,
    ) -> Result<Ack> {
        self.settlement
            .handle_payment_webhook(id, status, deadline)
            .await
    }

    pub async fn handle_installment_webhook(
        &self,
        id: InstallmentId,
        status: &str,
        deadline: &Deadline,
    ) -> Result<Ack> {
        self.settlement
            .handle_installment_webhook(id, status, deadline)
            .await
    }

    pub async fn request_installment_collection(
        &self,
        id: InstallmentId,
        deadline: &Deadline,
    ) -> Result<DateTime<Utc>> {
        self.settlement
            .request_installment_collection(id, deadline)
            .await
    }

    /// Delivers every delayed notification whose time has come.
    pub async fn run_due_notifications(&self) -> Vec<(Notification, Result<Ack>)> {
        let outcomes = self.settlement.run_due().await;
        if !outcomes.is_empty() {
            debug!(delivered = outcomes.len(), "settlement queue drained");
        }
        self.locks.prune();
        outcomes
    }

    /// Withdraws a queued notification. Returns `false` if none was pending.
    pub fn cancel_settlement(&self, notification: Notification) -> bool {
        self.settlement.cancel(notification)
    }

    pub fn pending_notifications(&self) -> usize {
        self.settlement.pending()
    }

    pub async fn create_loan(&self, request: LoanRequest, deadline: &Deadline) -> Result<LoanId> {
        Ok(self.loans.create_loan(request, deadline).await?.id)
    }

    pub async fn decide_loan(&self, id: LoanId, deadline: &Deadline) -> Result<LoanStatus> {
        self.loans.decide_loan(id, deadline).await
    }

    pub async fn activate_loan(&self, id: LoanId, deadline: &Deadline) -> Result<LoanDetails> {
        self.loans.activate_loan(id, deadline).await
    }

    pub async fn repay_loan(
        &self,
        id: LoanId,
        request: RepaymentRequest,
        deadline: &Deadline,
    ) -> Result<Loan> {
        self.loans.repay_loan(id, request, deadline).await
    }

    pub async fn list_loan_repayments(
        &self,
        id: LoanId,
        deadline: &Deadline,
    ) -> Result<Vec<LoanRepayment>> {
        self.loans.list_loan_repayments(id, deadline).await
    }

    pub async fn mark_loan_defaulted(&self, id: LoanId, deadline: &Deadline) -> Result<Ack> {
        self.loans.mark_loan_defaulted(id, deadline).await
    }

    pub async fn get_loan_details(&self, id: LoanId, deadline: &Deadline) -> Result<LoanDetails> {
        self.loans.get_loan_details(id, deadline).await
    }

    pub async fn list_loans_by_user(
        &self,
        user_id: &str,
        deadline: &Deadline,
    ) -> Result<Vec<Loan>> {
        self.loans.list_loans_by_user(user_id, deadline).await
    }
}

/// Background task draining the settlement queue. Aborted on drop.
pub struct SettlementPump {
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

impl SettlementPump {
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops ticking and waits for an in-flight drain to complete.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        if let Err(e) = (&mut self.handle).await {
            if !e.is_cancelled() {
                warn!(error = %e, "settlement pump ended abnormally");
            }
        }
    }
}

impl Drop for SettlementPump {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Runs [`CreditEngine::run_due_notifications`] every `every` on the current
/// runtime.
pub fn spawn_settlement_pump(engine: Arc<CreditEngine>, every: Duration) -> SettlementPump {
    let period = every.max(Duration::from_millis(1));
    let (stop, mut stopped) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    engine.run_due_notifications().await;
                }
                _ = stopped.changed() => break,
            }
        }
        debug!("settlement pump stopped");
    });
    SettlementPump { handle, stop }
}
