use super::ids::ApplicationId;
use super::lifecycle::ApplicationStatus;
use super::money::{Amount, Currency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's request for a credit line.
///
/// Once decided, `amount` is the approved limit that every successful payment
/// against the application draws from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditApplication {
    pub id: ApplicationId,
    pub user_id: String,
    pub amount: Amount,
    pub currency: Currency,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    /// When the credit decision was recorded.
    pub decided_at: Option<DateTime<Utc>>,
    /// Score the decision was based on.
    pub credit_score: Option<u16>,
}

impl CreditApplication {
    pub fn new(
        user_id: impl Into<String>,
        amount: Amount,
        currency: Currency,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApplicationId::UNASSIGNED,
            user_id: user_id.into(),
            amount,
            currency,
            status: ApplicationStatus::Pending,
            created_at,
            decided_at: None,
            credit_score: None,
        }
    }
}

/// Input to `CreateCreditApplication`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRequest {
    pub user_id: String,
    pub amount: u64,
    pub currency: String,
}
