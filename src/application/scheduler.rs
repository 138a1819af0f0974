use crate::domain::installment::{Installment, ObligationRef};
use crate::domain::obligation::Obligation;
use crate::domain::ports::Ledger;
use crate::domain::schedule::InstallmentTiers;
use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Persists an obligation's schedule exactly once.
///
/// The schedule is written in one atomic store call. Callers must hold the
/// owner's lock; the explicit existence check plus the store's own refusal of
/// a second batch keep a schedule from ever being created twice.
pub struct InstallmentScheduler {
    ledger: Arc<Ledger>,
    tiers: InstallmentTiers,
}

impl InstallmentScheduler {
    pub fn new(ledger: Arc<Ledger>, tiers: InstallmentTiers) -> Self {
        Self { ledger, tiers }
    }

    pub async fn schedule(&self, obligation: &Obligation) -> Result<Vec<Installment>> {
        let owner = obligation.owner();
        if !self.ledger.installments.get_by_owner(owner).await?.is_empty() {
            return Err(owner.already_scheduled());
        }

        let drafts = obligation.draft_schedule(&self.tiers)?;
        let created = self.ledger.installments.create_batch(drafts).await?;
        info!(
            %owner,
            count = created.len(),
            principal = obligation.principal().value(),
            "schedule created"
        );
        Ok(created)
    }

    /// Removes a schedule whose owner failed to commit its own transition.
    pub async fn unschedule(&self, owner: ObligationRef) -> Result<usize> {
        let removed = self.ledger.installments.delete_by_owner(owner).await?;
        debug!(%owner, removed, "schedule rolled back");
        Ok(removed)
    }
}
