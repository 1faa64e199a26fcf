//! Dashboard metrics
//!
//! Each counter comes from its own statement. A failing statement only zeroes its
//! own counter; the rest of the overview is still reported.

use tracing::warn;

use review_common::db::queries;
use review_common::models::MetricsOverview;
use review_common::warehouse::{Record, Statement};

use super::ReviewService;

/// Size of the random sample shown on the dashboard
const SAMPLE_SIZE: i64 = 20;

/// Largest score difference still counted as accurate
const ACCURACY_TOLERANCE: i64 = 1;

/// One (original, human) overall score pair from the accuracy join
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScorePair {
    pub original: i64,
    pub human: i64,
}

impl ScorePair {
    fn from_record(row: &Record) -> Self {
        Self {
            original: row.i64("orig_overall_score").unwrap_or(0),
            human: row.i64("human_overall_score").unwrap_or(0),
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Share of pairs within tolerance, rounded to 2 decimals
pub fn average_accuracy(pairs: &[ScorePair]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let accurate = pairs
        .iter()
        .filter(|p| (p.original - p.human).abs() <= ACCURACY_TOLERANCE)
        .count();
    round_to(accurate as f64 / pairs.len() as f64, 2)
}

/// Changed pairs per completed review, rounded to 1 decimal
pub fn corrections_per_review(pairs: &[ScorePair], completed: i64) -> f64 {
    if completed <= 0 {
        return 0.0;
    }
    let corrections = pairs.iter().filter(|p| p.original != p.human).count();
    round_to(corrections as f64 / completed as f64, 1)
}

impl ReviewService {
    async fn count(&self, statement: &Statement, column: &str) -> i64 {
        match self.query(statement).await {
            Ok(rows) => rows.first().and_then(|r| r.i64(column)).unwrap_or(0),
            Err(e) => {
                warn!(metric = column, error = %e, "Metric query failed; reporting 0");
                0
            }
        }
    }

    async fn score_pairs(&self) -> Vec<ScorePair> {
        match self.query(&queries::accuracy_pairs(&self.tables)).await {
            Ok(rows) => rows.iter().map(ScorePair::from_record).collect(),
            Err(e) => {
                warn!(error = %e, "Accuracy query failed; reporting 0");
                Vec::new()
            }
        }
    }

    /// Dashboard counters and ratios
    pub async fn metrics(&self) -> MetricsOverview {
        let total_reviews = self
            .count(&queries::count_source_responses(&self.tables), "total_count")
            .await;
        let completed = self
            .count(&queries::count_evaluations(&self.tables), "eval_count")
            .await;
        let recommended_reviews = self
            .count(&queries::count_recommended(&self.tables), "recommended_count")
            .await;

        let (average_accuracy, corrections_per_review) = if completed > 0 {
            let pairs = self.score_pairs().await;
            (
                average_accuracy(&pairs),
                corrections_per_review(&pairs, completed),
            )
        } else {
            (0.0, 0.0)
        };

        MetricsOverview {
            total_random_sample: total_reviews.min(SAMPLE_SIZE),
            completed_today: completed,
            recommended_reviews,
            total_reviews,
            average_accuracy,
            corrections_per_review,
        }
    }
}
