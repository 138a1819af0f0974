use super::decision::CreditDecision;
use super::deadline::Deadline;
use super::locks::{KeyedLocks, LockKey};
use super::scheduler::InstallmentScheduler;
use super::settlement::Ack;
use crate::config::EngineConfig;
use crate::domain::ids::{LoanId, RepaymentId};
use crate::domain::installment::{Installment, ObligationRef};
use crate::domain::lifecycle::{InstallmentStatus, LoanStatus, Transition, advance};
use crate::domain::loan::{Loan, LoanDetails, LoanRepayment, LoanRequest, RepaymentRequest};
use crate::domain::money::{Amount, Currency, PaymentMethod};
use crate::domain::obligation::Obligation;
use crate::domain::ports::{ClockHandle, Ledger};
use crate::error::{CreditError, Result};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Loan origination, activation and repayment. Every operation holds the
/// loan's lock.
pub struct LoanLifecycle {
    ledger: Arc<Ledger>,
    locks: Arc<KeyedLocks<LockKey>>,
    decision: Arc<CreditDecision>,
    scheduler: Arc<InstallmentScheduler>,
    clock: ClockHandle,
    config: Arc<EngineConfig>,
}

impl LoanLifecycle {
    pub fn new(
        ledger: Arc<Ledger>,
        locks: Arc<KeyedLocks<LockKey>>,
        decision: Arc<CreditDecision>,
        scheduler: Arc<InstallmentScheduler>,
        clock: ClockHandle,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            ledger,
            locks,
            decision,
            scheduler,
            clock,
            config,
        }
    }

    pub async fn create_loan(&self, request: LoanRequest, deadline: &Deadline) -> Result<Loan> {
        if request.user_id.trim().is_empty() {
            return Err(CreditError::ValidationError(
                "User id must not be empty".to_string(),
            ));
        }
        let principal = Amount::new(request.principal)?;
        let currency = Currency::new(request.currency)?;
        if !self.config.supports_currency(&currency) {
            return Err(CreditError::ValidationError(format!(
                "Unsupported currency {currency}"
            )));
        }
        let max = self.config.max_loan_term_months;
        if !(1..=max).contains(&request.term_months) {
            return Err(CreditError::ValidationError(format!(
                "Loan term must be between 1 and {max} months, got {}",
                request.term_months
            )));
        }

        deadline.check()?;
        let loan = self
            .ledger
            .loans
            .create(Loan::new(
                request.user_id,
                principal,
                currency,
                request.term_months,
                self.clock.now(),
            ))
            .await?;
        info!(
            loan = %loan.id,
            principal = principal.value(),
            term = loan.original_term,
            "loan created"
        );
        Ok(loan)
    }

    #[instrument(skip_all, fields(loan = %id))]
    pub async fn decide_loan(&self, id: LoanId, deadline: &Deadline) -> Result<LoanStatus> {
        let _guard = deadline.bound(self.locks.lock(LockKey::Loan(id))).await?;
        let mut loan = self.load(id, deadline).await?;

        if loan.status != LoanStatus::Pending {
            return Err(CreditError::InvalidState {
                entity: "loan",
                id: id.value(),
                status: loan.status.to_string(),
                operation: "decide".to_string(),
            });
        }

        let verdict = self.decision.evaluate(&loan.user_id, deadline).await?;
        let next = if verdict.approved {
            LoanStatus::Approved
        } else {
            LoanStatus::Rejected
        };
        advance(id.value(), loan.status, next)?;

        deadline.check()?;
        loan.status = next;
        if verdict.approved {
            loan.approved_at = Some(self.clock.now());
        }
        self.ledger.loans.update(loan).await?;
        info!(score = verdict.score.value(), status = %next, "loan decided");
        Ok(next)
    }

    /// Moves an APPROVED loan to ACTIVE and writes its repayment schedule.
    #[instrument(skip_all, fields(loan = %id))]
    pub async fn activate_loan(&self, id: LoanId, deadline: &Deadline) -> Result<LoanDetails> {
        let _guard = deadline.bound(self.locks.lock(LockKey::Loan(id))).await?;
        let mut loan = self.load(id, deadline).await?;
        advance(id.value(), loan.status, LoanStatus::Active)?;

        deadline.check()?;
        loan.status = LoanStatus::Active;
        loan.activated_at = Some(self.clock.now());
        let schedule = self
            .scheduler
            .schedule(&Obligation::Loan(loan.clone()))
            .await?;
        loan.next_payment_date = schedule.first().map(|entry| entry.due_date);
        loan.remaining_term = u32::try_from(schedule.len()).unwrap_or(u32::MAX);

        if let Err(e) = self.ledger.loans.update(loan.clone()).await {
            if let Err(rollback) = self.scheduler.unschedule(ObligationRef::Loan(id)).await {
                warn!(error = %rollback, "schedule rollback failed");
            }
            return Err(e);
        }
        info!(entries = schedule.len(), "loan activated");
        Ok(LoanDetails { loan, schedule })
    }

    /// Records a repayment against an ACTIVE loan.
    ///
    /// Entries are paid in sequence order: an entry counts as paid once the
    /// cumulative schedule total up to and including it is covered by
    /// `total_paid`. Newly covered entries are written first; if the loan and
    /// its repayment record then fail to commit, they are reverted.
    #[instrument(skip_all, fields(loan = %id, amount = request.amount))]
    pub async fn repay_loan(
        &self,
        id: LoanId,
        request: RepaymentRequest,
        deadline: &Deadline,
    ) -> Result<Loan> {
        let amount = Amount::new(request.amount)?;
        let method = PaymentMethod::new(request.method)?;
        if !self.config.supports_method(&method) {
            return Err(CreditError::ValidationError(format!(
                "Unsupported payment method {method}"
            )));
        }
        let _guard = deadline.bound(self.locks.lock(LockKey::Loan(id))).await?;
        let mut loan = self.load(id, deadline).await?;

        if loan.status != LoanStatus::Active {
            return Err(CreditError::InvalidState {
                entity: "loan",
                id: id.value(),
                status: loan.status.to_string(),
                operation: "repay".to_string(),
            });
        }
        if amount.value() > loan.remaining_amount {
            return Err(CreditError::ValidationError(format!(
                "Repayment {amount} exceeds remaining amount {}",
                loan.remaining_amount
            )));
        }

        let mut schedule = self.schedule_of(id, deadline).await?;

        deadline.check()?;
        loan.total_paid += amount.value();
        loan.remaining_amount -= amount.value();

        let mut cumulative = 0u64;
        let mut newly_paid = Vec::new();
        for entry in &mut schedule {
            cumulative = cumulative.saturating_add(entry.amount.value());
            if cumulative <= loan.total_paid && entry.status == InstallmentStatus::Pending {
                entry.status = InstallmentStatus::Paid;
                newly_paid.push(entry.clone());
            }
        }

        let unpaid: Vec<_> = schedule
            .iter()
            .filter(|entry| entry.status == InstallmentStatus::Pending)
            .collect();
        loan.remaining_term = u32::try_from(unpaid.len()).unwrap_or(u32::MAX);
        loan.next_payment_date = unpaid.first().map(|entry| entry.due_date);
        if loan.remaining_amount == 0 {
            advance(id.value(), loan.status, LoanStatus::Paid)?;
            loan.status = LoanStatus::Paid;
        }

        self.write_entries(&newly_paid).await?;
        let repayment = LoanRepayment {
            id: RepaymentId::UNASSIGNED,
            loan_id: id,
            amount,
            method,
            paid_at: self.clock.now(),
        };
        let repayment = match self
            .ledger
            .loans
            .record_repayment(loan.clone(), repayment)
            .await
        {
            Ok(repayment) => repayment,
            Err(e) => {
                self.revert_entries(newly_paid).await;
                return Err(e);
            }
        };

        info!(
            repayment = %repayment.id,
            total_paid = loan.total_paid,
            remaining = loan.remaining_amount,
            status = %loan.status,
            "loan repayment recorded"
        );
        Ok(loan)
    }

    /// ACTIVE to DEFAULTED; pending entries become FAILED.
    ///
    /// On an already defaulted loan this only fails entries still left
    /// PENDING, and acks as a duplicate when there are none.
    #[instrument(skip_all, fields(loan = %id))]
    pub async fn mark_loan_defaulted(&self, id: LoanId, deadline: &Deadline) -> Result<Ack> {
        let _guard = deadline.bound(self.locks.lock(LockKey::Loan(id))).await?;
        let mut loan = self.load(id, deadline).await?;
        let transition = advance(id.value(), loan.status, LoanStatus::Defaulted)?;

        let failed: Vec<Installment> = self
            .schedule_of(id, deadline)
            .await?
            .into_iter()
            .filter(|entry| entry.status == InstallmentStatus::Pending)
            .map(|mut entry| {
                entry.status = InstallmentStatus::Failed;
                entry
            })
            .collect();
        if transition == Transition::Unchanged && failed.is_empty() {
            return Ok(Ack::Duplicate);
        }

        deadline.check()?;
        self.write_entries(&failed).await?;
        if transition == Transition::Applied {
            loan.status = LoanStatus::Defaulted;
            loan.next_payment_date = None;
            if let Err(e) = self.ledger.loans.update(loan).await {
                self.revert_entries(failed).await;
                return Err(e);
            }
        }
        warn!(failed_entries = failed.len(), "loan defaulted");
        Ok(Ack::Applied)
    }

    pub async fn list_loans_by_user(
        &self,
        user_id: &str,
        deadline: &Deadline,
    ) -> Result<Vec<Loan>> {
        deadline.bound(self.ledger.loans.get_by_user(user_id)).await?
    }

    /// Repayments recorded against `id`, oldest first.
    pub async fn list_loan_repayments(
        &self,
        id: LoanId,
        deadline: &Deadline,
    ) -> Result<Vec<LoanRepayment>> {
        self.load(id, deadline).await?;
        deadline.bound(self.ledger.loans.get_repayments(id)).await?
    }

    pub async fn get_loan_details(&self, id: LoanId, deadline: &Deadline) -> Result<LoanDetails> {
        let loan = self.load(id, deadline).await?;
        let schedule = self.schedule_of(id, deadline).await?;
        Ok(LoanDetails { loan, schedule })
    }

    async fn schedule_of(&self, id: LoanId, deadline: &Deadline) -> Result<Vec<Installment>> {
        deadline
            .bound(self.ledger.installments.get_by_owner(ObligationRef::Loan(id)))
            .await?
    }

    async fn write_entries(&self, entries: &[Installment]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.ledger.installments.update_batch(entries.to_vec()).await
    }

    /// Puts entries written by a failed operation back to PENDING.
    async fn revert_entries(&self, mut entries: Vec<Installment>) {
        if entries.is_empty() {
            return;
        }
        for entry in &mut entries {
            entry.status = InstallmentStatus::Pending;
        }
        if let Err(rollback) = self.ledger.installments.update_batch(entries).await {
            warn!(error = %rollback, "schedule entry rollback failed");
        }
    }

    async fn load(&self, id: LoanId, deadline: &Deadline) -> Result<Loan> {
        deadline
            .bound(self.ledger.loans.get(id))
            .await??
            .ok_or(CreditError::NotFound {
                entity: "loan",
                id: id.value(),
            })
    }
}
