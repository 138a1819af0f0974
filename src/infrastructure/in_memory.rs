use crate::domain::application::CreditApplication;
use crate::domain::ids::{ApplicationId, InstallmentId, LoanId, PaymentId, RepaymentId};
use crate::domain::installment::{Installment, ObligationRef, batch_owner};
use crate::domain::loan::{Loan, LoanRepayment};
use crate::domain::payment::Payment;
use crate::domain::ports::{ApplicationStore, InstallmentStore, LoanStore, PaymentStore};
use crate::error::{CreditError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Sequences {
    application: u64,
    payment: u64,
    installment: u64,
    loan: u64,
    repayment: u64,
}

#[derive(Default)]
struct Tables {
    sequences: Sequences,
    applications: BTreeMap<ApplicationId, CreditApplication>,
    payments: BTreeMap<PaymentId, Payment>,
    installments: BTreeMap<InstallmentId, Installment>,
    loans: BTreeMap<LoanId, Loan>,
    repayments: BTreeMap<RepaymentId, LoanRepayment>,
}

fn next(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

/// A thread-safe in-memory ledger serving every entity store.
///
/// Uses `Arc<RwLock<..>>` so clones share the same tables; a single write lock
/// makes schedule batches atomic. Ideal for tests and the scenario CLI.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryLedger {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(entity: &'static str, id: u64) -> CreditError {
    CreditError::NotFound { entity, id }
}

#[async_trait]
impl ApplicationStore for InMemoryLedger {
    async fn create(&self, mut application: CreditApplication) -> Result<CreditApplication> {
        let mut tables = self.tables.write().await;
        application.id = ApplicationId(next(&mut tables.sequences.application));
        tables
            .applications
            .insert(application.id, application.clone());
        Ok(application)
    }

    async fn get(&self, id: ApplicationId) -> Result<Option<CreditApplication>> {
        let tables = self.tables.read().await;
        Ok(tables.applications.get(&id).cloned())
    }

    async fn update(&self, application: CreditApplication) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.applications.get_mut(&application.id) {
            Some(slot) => {
                *slot = application;
                Ok(())
            }
            None => Err(not_found("credit application", application.id.value())),
        }
    }

    async fn list(&self) -> Result<Vec<CreditApplication>> {
        let tables = self.tables.read().await;
        Ok(tables.applications.values().cloned().collect())
    }

    async fn get_by_user(&self, user_id: &str) -> Result<Vec<CreditApplication>> {
        let tables = self.tables.read().await;
        Ok(tables
            .applications
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentStore for InMemoryLedger {
    async fn create(&self, mut payment: Payment) -> Result<Payment> {
        let mut tables = self.tables.write().await;
        if tables.payments.values().any(|p| p.order_id == payment.order_id) {
            return Err(CreditError::ValidationError(format!(
                "Duplicate order id {}",
                payment.order_id
            )));
        }
        payment.id = PaymentId(next(&mut tables.sequences.payment));
        tables.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables.payments.get(&id).cloned())
    }

    async fn update(&self, payment: Payment) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.payments.get_mut(&payment.id) {
            Some(slot) => {
                *slot = payment;
                Ok(())
            }
            None => Err(not_found("payment", payment.id.value())),
        }
    }

    async fn list(&self) -> Result<Vec<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables.payments.values().cloned().collect())
    }

    async fn get_by_application(&self, application_id: ApplicationId) -> Result<Vec<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .filter(|p| p.application_id == application_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InstallmentStore for InMemoryLedger {
    async fn create_batch(&self, installments: Vec<Installment>) -> Result<Vec<Installment>> {
        let owner = batch_owner(&installments)?;
        let mut tables = self.tables.write().await;
        if tables.installments.values().any(|i| i.owner == owner) {
            return Err(owner.already_scheduled());
        }

        let mut created = Vec::with_capacity(installments.len());
        for mut installment in installments {
            installment.id = InstallmentId(next(&mut tables.sequences.installment));
            tables
                .installments
                .insert(installment.id, installment.clone());
            created.push(installment);
        }
        Ok(created)
    }

    async fn get(&self, id: InstallmentId) -> Result<Option<Installment>> {
        let tables = self.tables.read().await;
        Ok(tables.installments.get(&id).cloned())
    }

    async fn update(&self, installment: Installment) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.installments.get_mut(&installment.id) {
            Some(slot) => {
                *slot = installment;
                Ok(())
            }
            None => Err(not_found("installment", installment.id.value())),
        }
    }

    async fn update_batch(&self, installments: Vec<Installment>) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(missing) = installments
            .iter()
            .find(|i| !tables.installments.contains_key(&i.id))
        {
            return Err(not_found("installment", missing.id.value()));
        }
        for installment in installments {
            tables.installments.insert(installment.id, installment);
        }
        Ok(())
    }

    async fn get_by_owner(&self, owner: ObligationRef) -> Result<Vec<Installment>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<Installment> = tables
            .installments
            .values()
            .filter(|i| i.owner == owner)
            .cloned()
            .collect();
        entries.sort_by_key(|i| i.sequence);
        Ok(entries)
    }

    async fn delete_by_owner(&self, owner: ObligationRef) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let before = tables.installments.len();
        tables.installments.retain(|_, i| i.owner != owner);
        Ok(before - tables.installments.len())
    }
}

#[async_trait]
impl LoanStore for InMemoryLedger {
    async fn create(&self, mut loan: Loan) -> Result<Loan> {
        let mut tables = self.tables.write().await;
        loan.id = LoanId(next(&mut tables.sequences.loan));
        tables.loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    async fn get(&self, id: LoanId) -> Result<Option<Loan>> {
        let tables = self.tables.read().await;
        Ok(tables.loans.get(&id).cloned())
    }

    async fn update(&self, loan: Loan) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.loans.get_mut(&loan.id) {
            Some(slot) => {
                *slot = loan;
                Ok(())
            }
            None => Err(not_found("loan", loan.id.value())),
        }
    }

    async fn list(&self) -> Result<Vec<Loan>> {
        let tables = self.tables.read().await;
        Ok(tables.loans.values().cloned().collect())
    }

    async fn get_by_user(&self, user_id: &str) -> Result<Vec<Loan>> {
        let tables = self.tables.read().await;
        Ok(tables
            .loans
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn record_repayment(
        &self,
        loan: Loan,
        mut repayment: LoanRepayment,
    ) -> Result<LoanRepayment> {
        let mut tables = self.tables.write().await;
        let Some(slot) = tables.loans.get_mut(&loan.id) else {
            return Err(not_found("loan", loan.id.value()));
        };
        *slot = loan;
        repayment.id = RepaymentId(next(&mut tables.sequences.repayment));
        tables.repayments.insert(repayment.id, repayment.clone());
        Ok(repayment)
    }

    async fn get_repayments(&self, loan_id: LoanId) -> Result<Vec<LoanRepayment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .repayments
            .values()
            .filter(|r| r.loan_id == loan_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lifecycle::{InstallmentStatus, PaymentStatus};
    use crate::domain::money::{Amount, Currency, PaymentMethod};
    use chrono::{NaiveDate, Utc};

    fn application(user: &str) -> CreditApplication {
        CreditApplication::new(
            user,
            Amount::new(10_000).unwrap(),
            Currency::new("USD").unwrap(),
            Utc::now(),
        )
    }

    fn payment(application_id: ApplicationId, order: &str) -> Payment {
        Payment {
            id: PaymentId::UNASSIGNED,
            application_id,
            user_id: "u1".into(),
            order_id: order.into(),
            amount: Amount::new(4000).unwrap(),
            currency: Currency::new("USD").unwrap(),
            method: PaymentMethod::new("card").unwrap(),
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
            settled_at: None,
        }
    }

    fn entry(owner: ObligationRef, sequence: u32) -> Installment {
        Installment {
            id: InstallmentId::UNASSIGNED,
            owner,
            sequence,
            due_date: NaiveDate::from_ymd_opt(2026, 1, sequence).unwrap(),
            amount: Amount::new(100).unwrap(),
            status: InstallmentStatus::Pending,
        }
    }

    #[tokio::test]
    async fn test_in_memory_application_store() {
        let store = InMemoryLedger::new();
        let created = ApplicationStore::create(&store, application("u1"))
            .await
            .unwrap();
        assert_ne!(created.id, ApplicationId::UNASSIGNED);

        let retrieved = ApplicationStore::get(&store, created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(retrieved, created);
        assert!(
            ApplicationStore::get(&store, ApplicationId(999))
                .await
                .unwrap()
                .is_none()
        );

        ApplicationStore::create(&store, application("u2"))
            .await
            .unwrap();
        assert_eq!(
            ApplicationStore::get_by_user(&store, "u1")
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(ApplicationStore::list(&store).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let store = InMemoryLedger::new();
        let mut app = application("u1");
        app.id = ApplicationId(42);
        assert!(matches!(
            ApplicationStore::update(&store, app).await,
            Err(CreditError::NotFound { id: 42, .. })
        ));
    }

    #[tokio::test]
    async fn test_in_memory_payment_store() {
        let store = InMemoryLedger::new();
        let app = ApplicationStore::create(&store, application("u1"))
            .await
            .unwrap();
        PaymentStore::create(&store, payment(app.id, "o-1"))
            .await
            .unwrap();
        PaymentStore::create(&store, payment(ApplicationId(77), "o-2"))
            .await
            .unwrap();

        let by_app = store.get_by_application(app.id).await.unwrap();
        assert_eq!(by_app.len(), 1);
        assert_eq!(by_app[0].order_id, "o-1");

        assert!(matches!(
            PaymentStore::create(&store, payment(app.id, "o-1")).await,
            Err(CreditError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_batch_is_rejected_when_schedule_exists() {
        let store = InMemoryLedger::new();
        let owner = ObligationRef::Payment(PaymentId(1));

        let created = store
            .create_batch(vec![entry(owner, 2), entry(owner, 1)])
            .await
            .unwrap();
        assert_eq!(created.len(), 2);

        let err = store.create_batch(vec![entry(owner, 1)]).await.unwrap_err();
        assert!(matches!(err, CreditError::Conflict { .. }));

        let stored = store.get_by_owner(owner).await.unwrap();
        let sequences: Vec<u32> = stored.iter().map(|i| i.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_batch_owner_checks() {
        let store = InMemoryLedger::new();
        assert!(store.create_batch(vec![]).await.is_err());

        let mixed = vec![
            entry(ObligationRef::Payment(PaymentId(1)), 1),
            entry(ObligationRef::Loan(LoanId(1)), 2),
        ];
        assert!(matches!(
            store.create_batch(mixed).await,
            Err(CreditError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_update_batch_is_all_or_nothing() {
        let store = InMemoryLedger::new();
        let owner = ObligationRef::Loan(LoanId(1));
        let mut created = store
            .create_batch(vec![entry(owner, 1), entry(owner, 2)])
            .await
            .unwrap();
        for installment in &mut created {
            installment.status = InstallmentStatus::Paid;
        }

        let mut ghost = created[0].clone();
        ghost.id = InstallmentId(99);
        let result = store
            .update_batch(vec![created[0].clone(), ghost])
            .await;
        assert!(matches!(result, Err(CreditError::NotFound { id: 99, .. })));
        assert!(
            store
                .get_by_owner(owner)
                .await
                .unwrap()
                .iter()
                .all(|i| i.status == InstallmentStatus::Pending)
        );

        store.update_batch(created).await.unwrap();
        assert!(
            store
                .get_by_owner(owner)
                .await
                .unwrap()
                .iter()
                .all(|i| i.status == InstallmentStatus::Paid)
        );
    }

    #[tokio::test]
    async fn test_record_repayment() {
        let store = InMemoryLedger::new();
        let mut loan = LoanStore::create(
            &store,
            Loan::new(
                "u1",
                Amount::new(1000).unwrap(),
                Currency::new("EUR").unwrap(),
                4,
                Utc::now(),
            ),
        )
        .await
        .unwrap();
        loan.total_paid = 250;
        loan.remaining_amount = 750;
        let repayment = LoanRepayment {
            id: RepaymentId::UNASSIGNED,
            loan_id: loan.id,
            amount: Amount::new(250).unwrap(),
            method: PaymentMethod::new("card").unwrap(),
            paid_at: Utc::now(),
        };

        let recorded = store
            .record_repayment(loan.clone(), repayment.clone())
            .await
            .unwrap();
        assert_eq!(recorded.id, RepaymentId(1));
        assert_eq!(
            LoanStore::get(&store, loan.id).await.unwrap().unwrap().total_paid,
            250
        );
        assert_eq!(store.get_repayments(loan.id).await.unwrap(), vec![recorded]);
        assert!(store.get_repayments(LoanId(9)).await.unwrap().is_empty());

        let mut ghost = loan;
        ghost.id = LoanId(9);
        assert!(matches!(
            store.record_repayment(ghost, repayment).await,
            Err(CreditError::NotFound { entity: "loan", .. })
        ));
        assert_eq!(store.get_repayments(LoanId(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_owner() {
        let store = InMemoryLedger::new();
        let a = ObligationRef::Payment(PaymentId(1));
        let b = ObligationRef::Loan(LoanId(1));
        store.create_batch(vec![entry(a, 1), entry(a, 2)]).await.unwrap();
        store.create_batch(vec![entry(b, 1)]).await.unwrap();

        assert_eq!(store.delete_by_owner(a).await.unwrap(), 2);
        assert!(store.get_by_owner(a).await.unwrap().is_empty());
        assert_eq!(store.get_by_owner(b).await.unwrap().len(), 1);
    }
}
