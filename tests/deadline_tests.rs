mod common;

use async_trait::async_trait;
use common::{harness, harness_with, no_deadline};
use creditline::application::Deadline;
use creditline::config::EngineConfig;
use creditline::domain::application::ApplicationRequest;
use creditline::domain::lifecycle::ApplicationStatus;
use creditline::domain::ports::{CreditScore, CreditScorer};
use creditline::error::{CreditError, Result};
use std::time::Duration;

/// A scorer that takes a while to answer.
struct SlowScorer {
    delay: Duration,
}

#[async_trait]
impl CreditScorer for SlowScorer {
    async fn score(&self, _user_id: &str) -> Result<CreditScore> {
        tokio::time::sleep(self.delay).await;
        CreditScore::new(800)
    }
}

fn request() -> ApplicationRequest {
    ApplicationRequest {
        user_id: "alice".into(),
        amount: 1000,
        currency: "USD".into(),
    }
}

#[tokio::test]
async fn test_expired_deadline_writes_nothing() {
    let h = harness(700);
    let expired = Deadline::within(Duration::ZERO);
    assert!(matches!(
        h.engine.create_credit_application(request(), &expired).await,
        Err(CreditError::Timeout)
    ));

    let id = h
        .engine
        .create_credit_application(request(), &no_deadline())
        .await
        .unwrap();
    assert_eq!(id.value(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_scorer_times_out_and_leaves_pending() {
    let h = harness_with(
        Box::new(SlowScorer {
            delay: Duration::from_secs(10),
        }),
        EngineConfig::default(),
    );
    let id = h
        .engine
        .create_credit_application(request(), &no_deadline())
        .await
        .unwrap();

    let result = h
        .engine
        .approve_or_reject_application(id, &Deadline::within(Duration::from_secs(1)))
        .await;
    assert!(matches!(result, Err(CreditError::Timeout)));
    assert_eq!(
        h.engine
            .get_application(id, &no_deadline())
            .await
            .unwrap()
            .status,
        ApplicationStatus::Pending
    );

    // A generous budget lets the same decision complete
    assert_eq!(
        h.engine
            .approve_or_reject_application(id, &Deadline::within(Duration::from_secs(60)))
            .await
            .unwrap(),
        ApplicationStatus::Approved
    );
}
