//! Engine policy knobs, loadable from a JSON file.

use crate::domain::money::{Currency, PaymentMethod};
use crate::domain::ports::CreditScore;
use crate::domain::schedule::InstallmentTiers;
use crate::error::{CreditError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// One day.
const MAX_SETTLEMENT_DELAY_SECS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Minimum score for an approval.
    pub approval_threshold: u16,
    pub supported_currencies: Vec<String>,
    pub payment_methods: Vec<String>,
    pub installment_tiers: InstallmentTiers,
    /// Delay before the simulated gateway confirms a payment.
    pub settlement_delay_secs: u64,
    /// Deadline applied to CLI-originated operations.
    pub request_timeout_ms: u64,
    pub max_loan_term_months: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            approval_threshold: 650,
            supported_currencies: ["USD", "EUR", "GBP", "MAD"]
                .map(String::from)
                .to_vec(),
            payment_methods: ["card", "bank_transfer", "wallet"]
                .map(String::from)
                .to_vec(),
            installment_tiers: InstallmentTiers::default(),
            settlement_delay_secs: 5,
            request_timeout_ms: 30_000,
            max_loan_term_months: 360,
        }
    }
}

impl EngineConfig {
    /// Reads and validates a JSON config file. Missing fields keep their
    /// defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| CreditError::ValidationError(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        CreditScore::new(self.approval_threshold).map_err(|_| {
            CreditError::ValidationError(format!(
                "approval_threshold {} outside {}..={}",
                self.approval_threshold,
                CreditScore::MIN,
                CreditScore::MAX
            ))
        })?;
        if self.supported_currencies.is_empty() || self.payment_methods.is_empty() {
            return Err(CreditError::ValidationError(
                "At least one currency and one payment method must be supported".to_string(),
            ));
        }
        for code in &self.supported_currencies {
            Currency::new(code.clone())?;
        }
        for method in &self.payment_methods {
            PaymentMethod::new(method.clone())?;
        }
        if self.settlement_delay_secs > MAX_SETTLEMENT_DELAY_SECS {
            return Err(CreditError::ValidationError(format!(
                "settlement_delay_secs must not exceed {MAX_SETTLEMENT_DELAY_SECS}"
            )));
        }
        if self.max_loan_term_months == 0 {
            return Err(CreditError::ValidationError(
                "max_loan_term_months must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn supports_currency(&self, currency: &Currency) -> bool {
        self.supported_currencies
            .iter()
            .any(|c| c == currency.as_str())
    }

    pub fn supports_method(&self, method: &PaymentMethod) -> bool {
        self.payment_methods.iter().any(|m| m == method.as_str())
    }

    pub fn settlement_delay(&self) -> chrono::Duration {
        i64::try_from(self.settlement_delay_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::zero())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
