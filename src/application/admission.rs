use super::deadline::Deadline;
use super::locks::{KeyedLocks, LockKey};
use super::notifications::{Notification, SettlementQueue};
use crate::config::EngineConfig;
use crate::domain::ids::{ApplicationId, PaymentId};
use crate::domain::lifecycle::{ApplicationStatus, PaymentStatus};
use crate::domain::money::{Amount, Currency, PaymentMethod, checked_total};
use crate::domain::payment::{Payment, PaymentRequest};
use crate::domain::ports::{ClockHandle, Ledger};
use crate::error::{CreditError, Result};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Sum of SUCCESSFUL payments drawn against an application.
pub(crate) async fn settled_total(ledger: &Ledger, application_id: ApplicationId) -> Result<u64> {
    let payments = ledger.payments.get_by_application(application_id).await?;
    checked_total(
        payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Successful)
            .map(|p| p.amount.value()),
    )
}

/// Admits new payments against approved credit lines.
///
/// The outstanding-balance read and the payment insert happen under the
/// application's lock, the same lock settlement takes before marking a
/// payment SUCCESSFUL, so the balance cannot move in between.
pub struct PaymentAdmission {
    ledger: Arc<Ledger>,
    locks: Arc<KeyedLocks<LockKey>>,
    queue: Arc<SettlementQueue>,
    clock: ClockHandle,
    config: Arc<EngineConfig>,
}

impl PaymentAdmission {
    pub fn new(
        ledger: Arc<Ledger>,
        locks: Arc<KeyedLocks<LockKey>>,
        queue: Arc<SettlementQueue>,
        clock: ClockHandle,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            ledger,
            locks,
            queue,
            clock,
            config,
        }
    }

    #[instrument(skip_all, fields(application = %request.application_id, amount = request.amount))]
    pub async fn admit(&self, request: PaymentRequest, deadline: &Deadline) -> Result<Payment> {
        let amount = Amount::new(request.amount)?;
        let currency = Currency::new(request.currency)?;
        let method = PaymentMethod::new(request.method)?;
        if !self.config.supports_currency(&currency) {
            return Err(CreditError::ValidationError(format!(
                "Unsupported currency {currency}"
            )));
        }
        if !self.config.supports_method(&method) {
            return Err(CreditError::ValidationError(format!(
                "Unsupported payment method {method}"
            )));
        }

        let application_id = request.application_id;
        let _guard = deadline
            .bound(self.locks.lock(LockKey::Application(application_id)))
            .await?;

        let application = deadline
            .bound(self.ledger.applications.get(application_id))
            .await??
            .ok_or(CreditError::NotFound {
                entity: "credit application",
                id: application_id.value(),
            })?;

        if application.status != ApplicationStatus::Approved {
            warn!(status = %application.status, "payment against unapproved application");
            return Err(CreditError::InvalidState {
                entity: "credit application",
                id: application_id.value(),
                status: application.status.to_string(),
                operation: "accept payments".to_string(),
            });
        }
        if application.user_id != request.user_id {
            return Err(CreditError::ValidationError(format!(
                "Credit application {application_id} does not belong to user {}",
                request.user_id
            )));
        }
        if application.currency != currency {
            return Err(CreditError::ValidationError(format!(
                "Payment currency {currency} does not match credit line currency {}",
                application.currency
            )));
        }

        let outstanding = deadline
            .bound(settled_total(&self.ledger, application_id))
            .await??;
        let available = application.amount.value().saturating_sub(outstanding);
        if amount.value() > available {
            warn!(requested = amount.value(), available, "insufficient credit");
            return Err(CreditError::InsufficientCredit {
                requested: amount.value(),
                available,
            });
        }

        deadline.check()?;
        let now = self.clock.now();
        let payment = self
            .ledger
            .payments
            .create(Payment {
                id: PaymentId::UNASSIGNED,
                application_id,
                user_id: request.user_id,
                order_id: Uuid::new_v4().to_string(),
                amount,
                currency,
                method,
                status: PaymentStatus::Pending,
                created_at: now,
                settled_at: None,
            })
            .await?;

        let due = now + self.config.settlement_delay();
        self.queue
            .schedule(Notification::PaymentSettled(payment.id), due);

        info!(payment = %payment.id, order = %payment.order_id, %due, "payment admitted");
        Ok(payment)
    }
}
