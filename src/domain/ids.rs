use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Placeholder carried by an entity until the store assigns its id.
            pub const UNASSIGNED: Self = Self(0);

            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(
    /// Identity of a credit application.
    ApplicationId
);
entity_id!(
    /// Identity of a payment drawn against a credit application.
    PaymentId
);
entity_id!(
    /// Identity of a schedule entry (installment or loan repayment).
    InstallmentId
);
entity_id!(
    /// Identity of a loan.
    LoanId
);
entity_id!(
    /// Identity of a recorded loan repayment.
    RepaymentId
);
