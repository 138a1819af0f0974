//! State graphs for every obligation kind.
//!
//! Each status enum declares its legal successors; [`advance`] is the single
//! place that decides whether a requested transition applies, is an idempotent
//! repeat, or is refused. Applications, payments, schedule entries and loans
//! all go through it.

use crate::error::{CreditError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A status enum with a fixed transition graph.
pub trait Lifecycle: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Entity name used in error messages.
    const ENTITY: &'static str;

    /// Statuses directly reachable from `self`.
    fn successors(self) -> &'static [Self];

    fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    fn can_transition_to(self, next: Self) -> bool {
        self.successors().contains(&next)
    }
}

/// Outcome of a legal transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The status changed.
    Applied,
    /// The entity already sits in the requested terminal status.
    Unchanged,
}

/// Validates moving `id` from `current` to `next`.
///
/// First write wins: repeating the terminal status already reached is a no-op,
/// asking for a different status once terminal is a conflict.
pub fn advance<S: Lifecycle>(id: u64, current: S, next: S) -> Result<Transition> {
    if current == next && current.is_terminal() {
        return Ok(Transition::Unchanged);
    }
    if current.can_transition_to(next) {
        return Ok(Transition::Applied);
    }
    if current.is_terminal() {
        return Err(CreditError::Conflict {
            entity: S::ENTITY,
            id,
            current: current.to_string(),
            requested: next.to_string(),
        });
    }
    Err(CreditError::InvalidState {
        entity: S::ENTITY,
        id,
        status: current.to_string(),
        operation: format!("move to {next}"),
    })
}

macro_rules! status_display {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

status_display!(ApplicationStatus {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
});

impl Lifecycle for ApplicationStatus {
    const ENTITY: &'static str = "credit application";

    fn successors(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Approved, Self::Rejected],
            Self::Approved | Self::Rejected => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Successful,
    Failed,
}

status_display!(PaymentStatus {
    Pending => "PENDING",
    Successful => "SUCCESSFUL",
    Failed => "FAILED",
});

impl PaymentStatus {
    /// Parses the status token carried by a payment webhook. Only terminal
    /// statuses can be delivered.
    pub fn from_webhook(token: &str) -> Result<Self> {
        match token {
            "SUCCESSFUL" => Ok(Self::Successful),
            "FAILED" => Ok(Self::Failed),
            other => Err(CreditError::UnknownStatus {
                entity: Self::ENTITY,
                status: other.to_string(),
            }),
        }
    }
}

impl Lifecycle for PaymentStatus {
    const ENTITY: &'static str = "payment";

    fn successors(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Successful, Self::Failed],
            Self::Successful | Self::Failed => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallmentStatus {
    Pending,
    Paid,
    Failed,
}

status_display!(InstallmentStatus {
    Pending => "PENDING",
    Paid => "PAID",
    Failed => "FAILED",
});

impl InstallmentStatus {
    /// Parses the status token carried by an installment webhook.
    pub fn from_webhook(token: &str) -> Result<Self> {
        match token {
            "PAID" => Ok(Self::Paid),
            "FAILED" => Ok(Self::Failed),
            other => Err(CreditError::UnknownStatus {
                entity: Self::ENTITY,
                status: other.to_string(),
            }),
        }
    }
}

impl Lifecycle for InstallmentStatus {
    const ENTITY: &'static str = "installment";

    fn successors(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Paid, Self::Failed],
            Self::Paid | Self::Failed => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Pending,
    Approved,
    Rejected,
    Active,
    Paid,
    Defaulted,
}

status_display!(LoanStatus {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
    Active => "ACTIVE",
    Paid => "PAID",
    Defaulted => "DEFAULTED",
});

impl Lifecycle for LoanStatus {
    const ENTITY: &'static str = "loan";

    fn successors(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Approved, Self::Rejected],
            Self::Approved => &[Self::Active],
            Self::Active => &[Self::Paid, Self::Defaulted],
            Self::Rejected | Self::Paid | Self::Defaulted => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_moves_one_way() {
        assert_eq!(
            advance(1, ApplicationStatus::Pending, ApplicationStatus::Approved).unwrap(),
            Transition::Applied
        );
        assert_eq!(
            advance(1, ApplicationStatus::Pending, ApplicationStatus::Rejected).unwrap(),
            Transition::Applied
        );
        assert!(matches!(
            advance(1, ApplicationStatus::Rejected, ApplicationStatus::Approved),
            Err(CreditError::Conflict { .. })
        ));
        assert!(matches!(
            advance(1, ApplicationStatus::Approved, ApplicationStatus::Pending),
            Err(CreditError::Conflict { .. })
        ));
    }

    #[test]
    fn test_repeated_terminal_status_is_unchanged() {
        assert_eq!(
            advance(9, PaymentStatus::Successful, PaymentStatus::Successful).unwrap(),
            Transition::Unchanged
        );
        assert_eq!(
            advance(9, InstallmentStatus::Failed, InstallmentStatus::Failed).unwrap(),
            Transition::Unchanged
        );
    }

    #[test]
    fn test_conflicting_terminal_status() {
        let err = advance(3, PaymentStatus::Successful, PaymentStatus::Failed).unwrap_err();
        match err {
            CreditError::Conflict {
                entity,
                id,
                current,
                requested,
            } => {
                assert_eq!(entity, "payment");
                assert_eq!(id, 3);
                assert_eq!(current, "SUCCESSFUL");
                assert_eq!(requested, "FAILED");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_loan_graph() {
        assert!(LoanStatus::Approved.can_transition_to(LoanStatus::Active));
        assert!(!LoanStatus::Pending.can_transition_to(LoanStatus::Active));
        assert!(matches!(
            advance(4, LoanStatus::Pending, LoanStatus::Active),
            Err(CreditError::InvalidState { .. })
        ));
        assert!(matches!(
            advance(4, LoanStatus::Active, LoanStatus::Active),
            Err(CreditError::InvalidState { .. })
        ));
        assert!(LoanStatus::Paid.is_terminal());
        assert!(LoanStatus::Defaulted.is_terminal());
        assert!(!LoanStatus::Active.is_terminal());
    }

    #[test]
    fn test_webhook_tokens() {
        assert_eq!(
            PaymentStatus::from_webhook("SUCCESSFUL").unwrap(),
            PaymentStatus::Successful
        );
        assert!(matches!(
            PaymentStatus::from_webhook("PENDING"),
            Err(CreditError::UnknownStatus { .. })
        ));
        assert!(matches!(
            PaymentStatus::from_webhook("successful"),
            Err(CreditError::UnknownStatus { .. })
        ));
        assert_eq!(
            InstallmentStatus::from_webhook("PAID").unwrap(),
            InstallmentStatus::Paid
        );
        assert!(InstallmentStatus::from_webhook("SUCCESSFUL").is_err());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Successful).unwrap(),
            "\"SUCCESSFUL\""
        );
        assert_eq!(LoanStatus::Defaulted.to_string(), "DEFAULTED");
    }
}
