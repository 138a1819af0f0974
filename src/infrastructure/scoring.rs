use crate::domain::ports::{CreditScore, CreditScorer};
use crate::error::Result;
use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

/// Score bands and their relative weights: poor, fair, good, very good,
/// excellent.
const BANDS: [(u16, u16, u32); 5] = [
    (300, 579, 10),
    (580, 669, 25),
    (670, 739, 35),
    (740, 799, 20),
    (800, 850, 10),
];

/// Placeholder scorer that draws a weighted-random score.
///
/// Stands in for a credit bureau integration; it knows nothing about the
/// applicant and must not be used for real decisions.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedRandomScorer;

impl WeightedRandomScorer {
    pub fn new() -> Self {
        Self
    }

    fn draw<R: Rng>(rng: &mut R) -> u16 {
        let total: u32 = BANDS.iter().map(|(_, _, w)| w).sum();
        let mut pick = rng.gen_range(0..total);
        for (low, high, weight) in BANDS {
            if pick < weight {
                return rng.gen_range(low..=high);
            }
            pick -= weight;
        }
        // The weights cover `0..total`, so the loop always returns.
        BANDS[BANDS.len() - 1].1
    }
}

#[async_trait]
impl CreditScorer for WeightedRandomScorer {
    async fn score(&self, user_id: &str) -> Result<CreditScore> {
        let value = Self::draw(&mut rand::thread_rng());
        debug!(user_id, score = value, "drew placeholder credit score");
        CreditScore::new(value)
    }
}

/// Returns the same score for every applicant.
#[derive(Debug, Clone, Copy)]
pub struct FixedScorer(pub u16);

#[async_trait]
impl CreditScorer for FixedScorer {
    async fn score(&self, _user_id: &str) -> Result<CreditScore> {
        CreditScore::new(self.0)
    }
}
