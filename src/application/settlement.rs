use super::admission::settled_total;
use super::deadline::Deadline;
use super::locks::{KeyedLocks, LockKey};
use super::notifications::{Notification, SettlementQueue};
use super::scheduler::InstallmentScheduler;
use crate::domain::ids::{InstallmentId, PaymentId};
use crate::domain::installment::ObligationRef;
use crate::domain::lifecycle::{InstallmentStatus, PaymentStatus, Transition, advance};
use crate::domain::obligation::Obligation;
use crate::domain::ports::{ClockHandle, Ledger};
use crate::error::{CreditError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Acknowledgement returned to a webhook sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The status was recorded.
    Applied,
    /// The entity already had this status; nothing changed.
    Duplicate,
}

/// Applies gateway outcomes to payments and installments.
///
/// Every webhook runs under the target entity's lock. A SUCCESSFUL payment
/// also takes its application's lock (always after the payment's) to re-check
/// the credit limit and then builds the installment schedule.
pub struct SettlementProcessor {
    ledger: Arc<Ledger>,
    locks: Arc<KeyedLocks<LockKey>>,
    scheduler: Arc<InstallmentScheduler>,
    queue: Arc<SettlementQueue>,
    clock: ClockHandle,
    delay: chrono::Duration,
}

impl SettlementProcessor {
    pub fn new(
        ledger: Arc<Ledger>,
        locks: Arc<KeyedLocks<LockKey>>,
        scheduler: Arc<InstallmentScheduler>,
        queue: Arc<SettlementQueue>,
        clock: ClockHandle,
        delay: chrono::Duration,
    ) -> Self {
        Self {
            ledger,
            locks,
            scheduler,
            queue,
            clock,
            delay,
        }
    }

    #[instrument(skip_all, fields(payment = %id, status = token))]
    pub async fn handle_payment_webhook(
        &self,
        id: PaymentId,
        token: &str,
        deadline: &Deadline,
    ) -> Result<Ack> {
        let next = PaymentStatus::from_webhook(token)?;
        let _payment_guard = deadline.bound(self.locks.lock(LockKey::Payment(id))).await?;

        let mut payment = deadline
            .bound(self.ledger.payments.get(id))
            .await??
            .ok_or(CreditError::NotFound {
                entity: "payment",
                id: id.value(),
            })?;

        if advance(id.value(), payment.status, next)? == Transition::Unchanged {
            debug!("duplicate payment webhook");
            return Ok(Ack::Duplicate);
        }

        match next {
            PaymentStatus::Successful => {
                let application_id = payment.application_id;
                let _application_guard = deadline
                    .bound(self.locks.lock(LockKey::Application(application_id)))
                    .await?;

                let application = deadline
                    .bound(self.ledger.applications.get(application_id))
                    .await??
                    .ok_or(CreditError::NotFound {
                        entity: "credit application",
                        id: application_id.value(),
                    })?;
                let settled = deadline
                    .bound(settled_total(&self.ledger, application_id))
                    .await??;
                let available = application.amount.value().saturating_sub(settled);
                if payment.amount.value() > available {
                    warn!(
                        requested = payment.amount.value(),
                        available, "settlement would exceed the credit limit"
                    );
                    return Err(CreditError::InsufficientCredit {
                        requested: payment.amount.value(),
                        available,
                    });
                }

                deadline.check()?;
                payment.status = PaymentStatus::Successful;
                payment.settled_at = Some(self.clock.now());
                let owner = ObligationRef::Payment(id);
                let installments = self
                    .scheduler
                    .schedule(&Obligation::Payment(payment.clone()))
                    .await?;
                if let Err(e) = self.ledger.payments.update(payment).await {
                    if let Err(rollback) = self.scheduler.unschedule(owner).await {
                        warn!(error = %rollback, "schedule rollback failed");
                    }
                    return Err(e);
                }
                info!(installments = installments.len(), "payment settled");
            }
            _ => {
                deadline.check()?;
                payment.status = next;
                self.ledger.payments.update(payment).await?;
                info!("payment failed");
            }
        }

        self.queue.cancel(Notification::PaymentSettled(id));
        Ok(Ack::Applied)
    }

    #[instrument(skip_all, fields(installment = %id, status = token))]
    pub async fn handle_installment_webhook(
        &self,
        id: InstallmentId,
        token: &str,
        deadline: &Deadline,
    ) -> Result<Ack> {
        let next = InstallmentStatus::from_webhook(token)?;
        let _guard = deadline
            .bound(self.locks.lock(LockKey::Installment(id)))
            .await?;

        let mut installment = deadline
            .bound(self.ledger.installments.get(id))
            .await??
            .ok_or(CreditError::NotFound {
                entity: "installment",
                id: id.value(),
            })?;

        if let ObligationRef::Loan(_) = installment.owner {
            return Err(CreditError::InvalidState {
                entity: "installment",
                id: id.value(),
                status: installment.status.to_string(),
                operation: format!(
                    "settle by webhook ({} entries settle by repayment)",
                    installment.owner
                ),
            });
        }

        if advance(id.value(), installment.status, next)? == Transition::Unchanged {
            debug!("duplicate installment webhook");
            return Ok(Ack::Duplicate);
        }

        deadline.check()?;
        installment.status = next;
        self.ledger.installments.update(installment).await?;
        self.queue.cancel(Notification::InstallmentCollected(id));
        info!("installment updated");
        Ok(Ack::Applied)
    }

    /// Queues a delayed PAID notification for a pending payment installment.
    /// Returns the instant it becomes due.
    pub async fn request_installment_collection(
        &self,
        id: InstallmentId,
        deadline: &Deadline,
    ) -> Result<DateTime<Utc>> {
        let _guard = deadline
            .bound(self.locks.lock(LockKey::Installment(id)))
            .await?;
        let installment = deadline
            .bound(self.ledger.installments.get(id))
            .await??
            .ok_or(CreditError::NotFound {
                entity: "installment",
                id: id.value(),
            })?;

        if installment.status != InstallmentStatus::Pending
            || !matches!(installment.owner, ObligationRef::Payment(_))
        {
            return Err(CreditError::InvalidState {
                entity: "installment",
                id: id.value(),
                status: installment.status.to_string(),
                operation: "request collection".to_string(),
            });
        }

        let due = self.clock.now() + self.delay;
        self.queue
            .schedule(Notification::InstallmentCollected(id), due);
        info!(installment = %id, %due, "installment collection requested");
        Ok(due)
    }

    /// Fires every notification that is due, in due order.
    ///
    /// Failures are logged and returned alongside the notification; nothing is
    /// re-queued.
    pub async fn run_due(&self) -> Vec<(Notification, Result<Ack>)> {
        let due = self.queue.take_due(self.clock.now());
        let mut outcomes = Vec::with_capacity(due.len());
        for notification in due {
            let deadline = Deadline::unbounded();
            let outcome = match notification {
                Notification::PaymentSettled(id) => {
                    self.handle_payment_webhook(id, PaymentStatus::Successful.as_str(), &deadline)
                        .await
                }
                Notification::InstallmentCollected(id) => {
                    self.handle_installment_webhook(id, InstallmentStatus::Paid.as_str(), &deadline)
                        .await
                }
            };
            match &outcome {
                Ok(ack) => info!(?notification, ?ack, "notification delivered"),
                Err(e) => warn!(?notification, error = %e, "notification rejected"),
            }
            outcomes.push((notification, outcome));
        }
        outcomes
    }

    pub fn cancel(&self, notification: Notification) -> bool {
        self.queue.cancel(notification)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
