use crate::domain::application::CreditApplication;
use crate::domain::ids::{ApplicationId, InstallmentId, LoanId, PaymentId, RepaymentId};
use crate::domain::installment::{Installment, ObligationRef, batch_owner};
use crate::domain::loan::{Loan, LoanRepayment};
use crate::domain::payment::Payment;
use crate::domain::ports::{ApplicationStore, InstallmentStore, LoanStore, PaymentStore};
use crate::error::{CreditError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Column Family for credit applications.
pub const CF_APPLICATIONS: &str = "applications";
/// Column Family for payments.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for installments and loan repayment entries.
pub const CF_INSTALLMENTS: &str = "installments";
/// Column Family for loans.
pub const CF_LOANS: &str = "loans";
/// Column Family for loan repayments.
pub const CF_REPAYMENTS: &str = "repayments";

const COLUMN_FAMILIES: [&str; 5] = [
    CF_APPLICATIONS,
    CF_PAYMENTS,
    CF_INSTALLMENTS,
    CF_LOANS,
    CF_REPAYMENTS,
];

struct Sequences {
    application: AtomicU64,
    payment: AtomicU64,
    installment: AtomicU64,
    loan: AtomicU64,
    repayment: AtomicU64,
}

/// A persistent ledger backed by RocksDB.
///
/// Each entity lives in its own Column Family keyed by its big-endian id, so
/// iteration order is id order and the highest key seeds the id sequence on
/// reopen. Values are JSON.
///
/// Writes go through one process-local mutex so check-then-write sequences
/// (duplicate order ids, existing schedules) cannot interleave. Schedule
/// inserts, updates and removals are single `WriteBatch`es, as is a loan
/// update together with its repayment record.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBLedger {
    db: Arc<DB>,
    sequences: Arc<Sequences>,
    writes: Arc<Mutex<()>>,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CreditError::PersistenceError(Box::new(e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| CreditError::PersistenceError(Box::new(e)))
}

fn key_of(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| CreditError::persistence(format!("Malformed key of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

impl RocksDBLedger {
    /// Opens or creates a RocksDB instance at `path`, creating any missing
    /// Column Family.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let sequences = Sequences {
            application: AtomicU64::new(Self::max_key(&db, CF_APPLICATIONS)?),
            payment: AtomicU64::new(Self::max_key(&db, CF_PAYMENTS)?),
            installment: AtomicU64::new(Self::max_key(&db, CF_INSTALLMENTS)?),
            loan: AtomicU64::new(Self::max_key(&db, CF_LOANS)?),
            repayment: AtomicU64::new(Self::max_key(&db, CF_REPAYMENTS)?),
        };

        Ok(Self {
            db: Arc::new(db),
            sequences: Arc::new(sequences),
            writes: Arc::new(Mutex::new(())),
        })
    }

    fn max_key(db: &DB, name: &'static str) -> Result<u64> {
        let cf = db
            .cf_handle(name)
            .ok_or_else(|| CreditError::persistence(format!("{name} column family not found")))?;
        match db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => key_of(&item?.0),
            None => Ok(0),
        }
    }

    fn table(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| CreditError::persistence(format!("{name} column family not found")))
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T: DeserializeOwned>(&self, name: &'static str, id: u64) -> Result<Option<T>> {
        let cf = self.table(name)?;
        match self.db.get_pinned_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&self, name: &'static str, id: u64, value: &T) -> Result<()> {
        let cf = self.table(name)?;
        self.db.put_cf(cf, id.to_be_bytes(), encode(value)?)?;
        Ok(())
    }

    /// Overwrites an existing row; `NotFound` if `id` was never written.
    fn replace<T: Serialize>(
        &self,
        name: &'static str,
        entity: &'static str,
        id: u64,
        value: &T,
    ) -> Result<()> {
        let _guard = self.write_guard();
        let cf = self.table(name)?;
        if self.db.get_pinned_cf(cf, id.to_be_bytes())?.is_none() {
            return Err(CreditError::NotFound { entity, id });
        }
        self.put(name, id, value)
    }

    fn scan<T: DeserializeOwned>(&self, name: &'static str) -> Result<Vec<T>> {
        let cf = self.table(name)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(decode(&value)?);
        }
        Ok(rows)
    }

    fn next_id(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl ApplicationStore for RocksDBLedger {
    async fn create(&self, mut application: CreditApplication) -> Result<CreditApplication> {
        let _guard = self.write_guard();
        application.id = ApplicationId(Self::next_id(&self.sequences.application));
        self.put(CF_APPLICATIONS, application.id.value(), &application)?;
        Ok(application)
    }

    async fn get(&self, id: ApplicationId) -> Result<Option<CreditApplication>> {
        self.read(CF_APPLICATIONS, id.value())
    }

    async fn update(&self, application: CreditApplication) -> Result<()> {
        self.replace(
            CF_APPLICATIONS,
            "credit application",
            application.id.value(),
            &application,
        )
    }

    async fn list(&self) -> Result<Vec<CreditApplication>> {
        self.scan(CF_APPLICATIONS)
    }

    async fn get_by_user(&self, user_id: &str) -> Result<Vec<CreditApplication>> {
        let all: Vec<CreditApplication> = self.scan(CF_APPLICATIONS)?;
        Ok(all.into_iter().filter(|a| a.user_id == user_id).collect())
    }
}

#[async_trait]
impl PaymentStore for RocksDBLedger {
    async fn create(&self, mut payment: Payment) -> Result<Payment> {
        let _guard = self.write_guard();
        let existing: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        if existing.iter().any(|p| p.order_id == payment.order_id) {
            return Err(CreditError::ValidationError(format!(
                "Duplicate order id {}",
                payment.order_id
            )));
        }
        payment.id = PaymentId(Self::next_id(&self.sequences.payment));
        self.put(CF_PAYMENTS, payment.id.value(), &payment)?;
        Ok(payment)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.read(CF_PAYMENTS, id.value())
    }

    async fn update(&self, payment: Payment) -> Result<()> {
        self.replace(CF_PAYMENTS, "payment", payment.id.value(), &payment)
    }

    async fn list(&self) -> Result<Vec<Payment>> {
        self.scan(CF_PAYMENTS)
    }

    async fn get_by_application(&self, application_id: ApplicationId) -> Result<Vec<Payment>> {
        let all: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        Ok(all
            .into_iter()
            .filter(|p| p.application_id == application_id)
            .collect())
    }
}

#[async_trait]
impl InstallmentStore for RocksDBLedger {
    async fn create_batch(&self, installments: Vec<Installment>) -> Result<Vec<Installment>> {
        let owner = batch_owner(&installments)?;
        let _guard = self.write_guard();
        let existing: Vec<Installment> = self.scan(CF_INSTALLMENTS)?;
        if existing.iter().any(|i| i.owner == owner) {
            return Err(owner.already_scheduled());
        }

        let cf = self.table(CF_INSTALLMENTS)?;
        let mut batch = WriteBatch::default();
        let mut created = Vec::with_capacity(installments.len());
        for mut installment in installments {
            installment.id = InstallmentId(Self::next_id(&self.sequences.installment));
            batch.put_cf(cf, installment.id.value().to_be_bytes(), encode(&installment)?);
            created.push(installment);
        }
        self.db.write(batch)?;
        Ok(created)
    }

    async fn get(&self, id: InstallmentId) -> Result<Option<Installment>> {
        self.read(CF_INSTALLMENTS, id.value())
    }

    async fn update(&self, installment: Installment) -> Result<()> {
        self.replace(
            CF_INSTALLMENTS,
            "installment",
            installment.id.value(),
            &installment,
        )
    }

    async fn update_batch(&self, installments: Vec<Installment>) -> Result<()> {
        let _guard = self.write_guard();
        let cf = self.table(CF_INSTALLMENTS)?;
        let mut batch = WriteBatch::default();
        for installment in &installments {
            let key = installment.id.value().to_be_bytes();
            if self.db.get_pinned_cf(cf, key)?.is_none() {
                return Err(CreditError::NotFound {
                    entity: "installment",
                    id: installment.id.value(),
                });
            }
            batch.put_cf(cf, key, encode(installment)?);
        }
        self.db.write(batch)?;
        Ok(())
    }

    async fn get_by_owner(&self, owner: ObligationRef) -> Result<Vec<Installment>> {
        let all: Vec<Installment> = self.scan(CF_INSTALLMENTS)?;
        let mut entries: Vec<Installment> = all.into_iter().filter(|i| i.owner == owner).collect();
        entries.sort_by_key(|i| i.sequence);
        Ok(entries)
    }

    async fn delete_by_owner(&self, owner: ObligationRef) -> Result<usize> {
        let _guard = self.write_guard();
        let doomed: Vec<Installment> = self.scan(CF_INSTALLMENTS)?;
        let cf = self.table(CF_INSTALLMENTS)?;
        let mut batch = WriteBatch::default();
        let mut removed = 0;
        for installment in doomed.iter().filter(|i| i.owner == owner) {
            batch.delete_cf(cf, installment.id.value().to_be_bytes());
            removed += 1;
        }
        self.db.write(batch)?;
        Ok(removed)
    }
}

#[async_trait]
impl LoanStore for RocksDBLedger {
    async fn create(&self, mut loan: Loan) -> Result<Loan> {
        let _guard = self.write_guard();
        loan.id = LoanId(Self::next_id(&self.sequences.loan));
        self.put(CF_LOANS, loan.id.value(), &loan)?;
        Ok(loan)
    }

    async fn get(&self, id: LoanId) -> Result<Option<Loan>> {
        self.read(CF_LOANS, id.value())
    }

    async fn update(&self, loan: Loan) -> Result<()> {
        self.replace(CF_LOANS, "loan", loan.id.value(), &loan)
    }

    async fn list(&self) -> Result<Vec<Loan>> {
        self.scan(CF_LOANS)
    }

    async fn get_by_user(&self, user_id: &str) -> Result<Vec<Loan>> {
        let all: Vec<Loan> = self.scan(CF_LOANS)?;
        Ok(all.into_iter().filter(|l| l.user_id == user_id).collect())
    }

    async fn record_repayment(
        &self,
        loan: Loan,
        mut repayment: LoanRepayment,
    ) -> Result<LoanRepayment> {
        let _guard = self.write_guard();
        let loans = self.table(CF_LOANS)?;
        let key = loan.id.value().to_be_bytes();
        if self.db.get_pinned_cf(loans, key)?.is_none() {
            return Err(CreditError::NotFound {
                entity: "loan",
                id: loan.id.value(),
            });
        }

        repayment.id = RepaymentId(Self::next_id(&self.sequences.repayment));
        let mut batch = WriteBatch::default();
        batch.put_cf(loans, key, encode(&loan)?);
        batch.put_cf(
            self.table(CF_REPAYMENTS)?,
            repayment.id.value().to_be_bytes(),
            encode(&repayment)?,
        );
        self.db.write(batch)?;
        Ok(repayment)
    }

    async fn get_repayments(&self, loan_id: LoanId) -> Result<Vec<LoanRepayment>> {
        let all: Vec<LoanRepayment> = self.scan(CF_REPAYMENTS)?;
        Ok(all.into_iter().filter(|r| r.loan_id == loan_id).collect())
    }
}
