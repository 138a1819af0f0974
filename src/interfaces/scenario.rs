use super::csv::command_reader::{CommandKind, ScenarioCommand};
use crate::application::{CreditEngine, Deadline};
use crate::domain::application::ApplicationRequest;
use crate::domain::ids::{ApplicationId, InstallmentId, LoanId, PaymentId};
use crate::domain::loan::{LoanRequest, RepaymentRequest};
use crate::domain::payment::PaymentRequest;
use crate::error::Result;
use crate::infrastructure::clock::ManualClock;
use std::sync::Arc;
use tracing::{info, warn};

/// How `settle` rows move time.
enum Timeline {
    /// The engine runs on this clock; `settle` advances it.
    Manual(ManualClock),
    /// The engine runs on the system clock; `settle` sleeps.
    Wall,
}

/// Replays scenario commands against an engine.
///
/// With a [`ManualClock`] the runner owns, `settle` rows move time forward by
/// exactly one settlement delay instead of sleeping.
pub struct ScenarioRunner {
    engine: Arc<CreditEngine>,
    timeline: Timeline,
}

impl ScenarioRunner {
    pub fn new(engine: Arc<CreditEngine>, clock: ManualClock) -> Self {
        Self {
            engine,
            timeline: Timeline::Manual(clock),
        }
    }

    /// A runner for an engine built on the system clock.
    pub fn wall_clock(engine: Arc<CreditEngine>) -> Self {
        Self {
            engine,
            timeline: Timeline::Wall,
        }
    }

    pub fn engine(&self) -> &Arc<CreditEngine> {
        &self.engine
    }

    /// Runs one command under the configured request timeout.
    pub async fn execute(&self, command: ScenarioCommand) -> Result<()> {
        let deadline = Deadline::within(self.engine.config().request_timeout());
        let engine = &self.engine;
        match command.op {
            CommandKind::Apply => {
                let id = engine
                    .create_credit_application(
                        ApplicationRequest {
                            user_id: command.user()?,
                            amount: command.amount()?,
                            currency: command.currency()?,
                        },
                        &deadline,
                    )
                    .await?;
                info!(application = %id, "apply");
            }
            CommandKind::Decide => {
                let id = ApplicationId(command.id()?);
                let status = engine.approve_or_reject_application(id, &deadline).await?;
                info!(application = %id, %status, "decide");
            }
            CommandKind::Pay => {
                let application_id = ApplicationId(command.id()?);
                let id = engine
                    .create_payment(
                        PaymentRequest {
                            application_id,
                            user_id: command.user()?,
                            amount: command.amount()?,
                            currency: command.currency()?,
                            method: command.method()?,
                        },
                        &deadline,
                    )
                    .await?;
                info!(payment = %id, "pay");
            }
            CommandKind::PaymentWebhook => {
                let id = PaymentId(command.id()?);
                let ack = engine
                    .handle_payment_webhook(id, command.status()?, &deadline)
                    .await?;
                info!(payment = %id, ?ack, "payment webhook");
            }
            CommandKind::InstallmentWebhook => {
                let id = InstallmentId(command.id()?);
                let ack = engine
                    .handle_installment_webhook(id, command.status()?, &deadline)
                    .await?;
                info!(installment = %id, ?ack, "installment webhook");
            }
            CommandKind::Collect => {
                let id = InstallmentId(command.id()?);
                engine
                    .request_installment_collection(id, &deadline)
                    .await?;
            }
            CommandKind::Settle => {
                let delay = engine.config().settlement_delay();
                match &self.timeline {
                    Timeline::Manual(clock) => clock.advance(delay),
                    Timeline::Wall => {
                        tokio::time::sleep(delay.to_std().unwrap_or_default()).await;
                    }
                }
                let outcomes = engine.run_due_notifications().await;
                let rejected = outcomes.iter().filter(|(_, r)| r.is_err()).count();
                if rejected > 0 {
                    warn!(delivered = outcomes.len(), rejected, "settle");
                } else {
                    info!(delivered = outcomes.len(), "settle");
                }
            }
            CommandKind::Loan => {
                let id = engine
                    .create_loan(
                        LoanRequest {
                            user_id: command.user()?,
                            principal: command.amount()?,
                            currency: command.currency()?,
                            term_months: command.term()?,
                        },
                        &deadline,
                    )
                    .await?;
                info!(loan = %id, "loan");
            }
            CommandKind::LoanDecide => {
                let status = engine.decide_loan(LoanId(command.id()?), &deadline).await?;
                info!(%status, "loan decide");
            }
            CommandKind::LoanActivate => {
                engine
                    .activate_loan(LoanId(command.id()?), &deadline)
                    .await?;
            }
            CommandKind::LoanRepay => {
                let loan = engine
                    .repay_loan(
                        LoanId(command.id()?),
                        RepaymentRequest {
                            amount: command.amount()?,
                            method: command.method()?,
                        },
                        &deadline,
                    )
                    .await?;
                info!(loan = %loan.id, remaining = loan.remaining_amount, "loan repay");
            }
            CommandKind::LoanDefault => {
                engine
                    .mark_loan_defaulted(LoanId(command.id()?), &deadline)
                    .await?;
            }
        }
        Ok(())
    }
}
