use crate::error::{CreditError, Result};
use serde::Deserialize;
use std::fmt;
use std::io::Read;

/// Operations a scenario row can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Apply,
    Decide,
    Pay,
    PaymentWebhook,
    InstallmentWebhook,
    Collect,
    Settle,
    Loan,
    LoanDecide,
    LoanActivate,
    LoanRepay,
    LoanDefault,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Apply => "apply",
            Self::Decide => "decide",
            Self::Pay => "pay",
            Self::PaymentWebhook => "payment_webhook",
            Self::InstallmentWebhook => "installment_webhook",
            Self::Collect => "collect",
            Self::Settle => "settle",
            Self::Loan => "loan",
            Self::LoanDecide => "loan_decide",
            Self::LoanActivate => "loan_activate",
            Self::LoanRepay => "loan_repay",
            Self::LoanDefault => "loan_default",
        };
        f.write_str(name)
    }
}

/// One row of a scenario file. Columns an operation does not use stay empty.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScenarioCommand {
    pub op: CommandKind,
    pub id: Option<u64>,
    pub user: Option<String>,
    pub amount: Option<u64>,
    pub currency: Option<String>,
    pub method: Option<String>,
    pub status: Option<String>,
    pub term: Option<u32>,
}

impl ScenarioCommand {
    pub fn id(&self) -> Result<u64> {
        self.id.ok_or_else(|| self.missing("id"))
    }

    pub fn user(&self) -> Result<String> {
        self.user.clone().ok_or_else(|| self.missing("user"))
    }

    pub fn amount(&self) -> Result<u64> {
        self.amount.ok_or_else(|| self.missing("amount"))
    }

    pub fn currency(&self) -> Result<String> {
        self.currency.clone().ok_or_else(|| self.missing("currency"))
    }

    pub fn method(&self) -> Result<String> {
        self.method.clone().ok_or_else(|| self.missing("method"))
    }

    pub fn status(&self) -> Result<&str> {
        self.status.as_deref().ok_or_else(|| self.missing("status"))
    }

    pub fn term(&self) -> Result<u32> {
        self.term.ok_or_else(|| self.missing("term"))
    }

    fn missing(&self, column: &str) -> CreditError {
        CreditError::ValidationError(format!("'{}' requires the '{column}' column", self.op))
    }
}

/// Reads scenario commands from a CSV source.
///
/// Whitespace is trimmed and short rows are accepted; absent trailing columns
/// read as empty.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes one command per row.
    pub fn commands(self) -> impl Iterator<Item = Result<ScenarioCommand>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(CreditError::from))
    }
}
