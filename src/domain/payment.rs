use super::ids::{ApplicationId, PaymentId};
use super::installment::Installment;
use super::lifecycle::PaymentStatus;
use super::money::{Amount, Currency, PaymentMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Funds drawn against an approved credit application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub application_id: ApplicationId,
    pub user_id: String,
    /// Unique order reference handed to the payment gateway.
    pub order_id: String,
    pub amount: Amount,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Input to `CreatePayment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub application_id: ApplicationId,
    pub user_id: String,
    pub amount: u64,
    pub currency: String,
    pub method: String,
}

/// A payment together with its installment schedule, ordered by sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub payment: Payment,
    pub installments: Vec<Installment>,
}

impl PaymentDetails {
    /// Sum of all scheduled installment amounts.
    pub fn scheduled_total(&self) -> u64 {
        self.installments.iter().map(|i| i.amount.value()).sum()
    }
}
