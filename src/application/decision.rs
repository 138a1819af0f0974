use super::deadline::Deadline;
use super::locks::{KeyedLocks, LockKey};
use crate::domain::ids::ApplicationId;
use crate::domain::lifecycle::{ApplicationStatus, advance};
use crate::domain::ports::{ClockHandle, CreditScore, CreditScorerBox, Ledger};
use crate::error::{CreditError, Result};
use std::sync::Arc;
use tracing::{info, instrument};

/// Outcome of scoring one applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub score: CreditScore,
    pub approved: bool,
}

/// Approves or rejects credit based on an external score.
///
/// The rule is a single threshold: `score >= threshold` approves.
pub struct CreditDecision {
    ledger: Arc<Ledger>,
    locks: Arc<KeyedLocks<LockKey>>,
    scorer: CreditScorerBox,
    clock: ClockHandle,
    threshold: u16,
}

impl CreditDecision {
    pub fn new(
        ledger: Arc<Ledger>,
        locks: Arc<KeyedLocks<LockKey>>,
        scorer: CreditScorerBox,
        clock: ClockHandle,
        threshold: u16,
    ) -> Self {
        Self {
            ledger,
            locks,
            scorer,
            clock,
            threshold,
        }
    }

    /// Scores `user_id` and applies the threshold rule.
    pub async fn evaluate(&self, user_id: &str, deadline: &Deadline) -> Result<Verdict> {
        let score = deadline.bound(self.scorer.score(user_id)).await??;
        Ok(Verdict {
            score,
            approved: score.value() >= self.threshold,
        })
    }

    /// Moves a PENDING application to APPROVED or REJECTED.
    #[instrument(skip_all, fields(application = %id))]
    pub async fn decide(&self, id: ApplicationId, deadline: &Deadline) -> Result<ApplicationStatus> {
        let _guard = deadline
            .bound(self.locks.lock(LockKey::Application(id)))
            .await?;

        let mut application = deadline
            .bound(self.ledger.applications.get(id))
            .await??
            .ok_or(CreditError::NotFound {
                entity: "credit application",
                id: id.value(),
            })?;

        if application.status != ApplicationStatus::Pending {
            return Err(CreditError::InvalidState {
                entity: "credit application",
                id: id.value(),
                status: application.status.to_string(),
                operation: "decide".to_string(),
            });
        }

        let verdict = self.evaluate(&application.user_id, deadline).await?;
        let next = if verdict.approved {
            ApplicationStatus::Approved
        } else {
            ApplicationStatus::Rejected
        };
        advance(id.value(), application.status, next)?;

        deadline.check()?;
        application.status = next;
        application.decided_at = Some(self.clock.now());
        application.credit_score = Some(verdict.score.value());
        self.ledger.applications.update(application).await?;

        info!(
            score = verdict.score.value(),
            threshold = self.threshold,
            status = %next,
            "credit application decided"
        );
        Ok(next)
    }
}
