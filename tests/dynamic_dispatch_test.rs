mod common;

use chrono::Utc;
use common::{approved_line, faulty_harness, no_deadline, payment};
use creditline::application::Ack;
use creditline::domain::application::CreditApplication;
use creditline::domain::ids::{ApplicationId, PaymentId};
use creditline::domain::installment::{Installment, ObligationRef};
use creditline::domain::lifecycle::{InstallmentStatus, PaymentStatus};
use creditline::domain::money::{Amount, Currency};
use creditline::domain::ports::{ApplicationStoreBox, InstallmentStoreBox, Ledger};
use creditline::error::CreditError;
use creditline::infrastructure::in_memory::InMemoryLedger;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let store = InMemoryLedger::new();
    let application_store: ApplicationStoreBox = Box::new(store.clone());
    let installment_store: InstallmentStoreBox = Box::new(store);

    let application = CreditApplication::new(
        "alice",
        Amount::new(100).unwrap(),
        Currency::new("USD").unwrap(),
        Utc::now(),
    );
    let owner = ObligationRef::Payment(PaymentId(1));
    let entry = Installment {
        id: Default::default(),
        owner,
        sequence: 1,
        due_date: Utc::now().date_naive(),
        amount: Amount::new(100).unwrap(),
        status: InstallmentStatus::Pending,
    };

    // Verify Send + Sync by spawning tasks
    let as_handle = tokio::spawn(async move {
        let created = application_store.create(application).await.unwrap();
        application_store.get(created.id).await.unwrap().unwrap()
    });

    let is_handle = tokio::spawn(async move {
        installment_store.create_batch(vec![entry]).await.unwrap();
        installment_store.get_by_owner(owner).await.unwrap()
    });

    let retrieved = as_handle.await.unwrap();
    assert_eq!(retrieved.id, ApplicationId(1));

    let schedule = is_handle.await.unwrap();
    assert_eq!(schedule.len(), 1);
}

#[tokio::test]
async fn test_shared_ledger_across_tasks() {
    let ledger = std::sync::Arc::new(Ledger::from_store(InMemoryLedger::new()));

    let mut handles = Vec::new();
    for i in 0..8u64 {
        let ledger = std::sync::Arc::clone(&ledger);
        handles.push(tokio::spawn(async move {
            ledger
                .applications
                .create(CreditApplication::new(
                    format!("user-{i}"),
                    Amount::new(100 + i).unwrap(),
                    Currency::new("USD").unwrap(),
                    Utc::now(),
                ))
                .await
                .unwrap()
                .id
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().value());
    }
    ids.sort_unstable();
    assert_eq!(ids, (1..=8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_failed_settlement_write_rolls_back_schedule() {
    let (h, ledger) = faulty_harness(700);
    let d = no_deadline();
    let app = approved_line(&h.engine, "alice", 5000).await;
    let id = h
        .engine
        .create_payment(payment(app, "alice", 1200), &d)
        .await
        .unwrap();

    ledger.faults.payment_updates.store(true, Ordering::SeqCst);
    assert!(matches!(
        h.engine.handle_payment_webhook(id, "SUCCESSFUL", &d).await,
        Err(CreditError::PersistenceError(_))
    ));

    let details = h.engine.get_payment_details(id, &d).await.unwrap();
    assert_eq!(details.payment.status, PaymentStatus::Pending);
    assert!(details.payment.settled_at.is_none());
    assert!(details.installments.is_empty());

    ledger.faults.payment_updates.store(false, Ordering::SeqCst);
    assert_eq!(
        h.engine
            .handle_payment_webhook(id, "SUCCESSFUL", &d)
            .await
            .unwrap(),
        Ack::Applied
    );
    let details = h.engine.get_payment_details(id, &d).await.unwrap();
    assert_eq!(details.payment.status, PaymentStatus::Successful);
    assert_eq!(details.installments.len(), 6);
    assert_eq!(details.scheduled_total(), 1200);
}
