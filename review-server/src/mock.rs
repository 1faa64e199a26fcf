//! Built-in sample reviews
//!
//! Served when a request asks for `use_databricks=false` and as the fallback for
//! read paths when the warehouse is unreachable.

use chrono::{Duration, Utc};
use std::collections::BTreeMap;

use review_common::models::{
    MetricsOverview, ReviewDetail, ReviewStatus, ReviewSummary, SentimentAnalysis,
    ValidationStatus,
};

const ASPECT_NAMES: [&str; 7] = [
    "Pricing",
    "Other",
    "Food and Beverage",
    "Wait Time",
    "Service",
    "Cleanliness",
    "Ambiance",
];

struct MockReview {
    id: &'static str,
    label: &'static str,
    text: &'static str,
    profane: bool,
    rewritten: Option<&'static str>,
    /// Scores in `ASPECT_NAMES` order; `None` marks an irrelevant review with no aspects
    aspects: Option<[Option<f64>; 7]>,
    minutes_ago: i64,
    store: &'static str,
    status: ReviewStatus,
    accuracy: Option<f64>,
}

const MOCK_REVIEWS: &[MockReview] = &[
    MockReview {
        id: "R001",
        label: "Overall Experience",
        text: "The food was absolutely amazing! The steak was cooked perfectly and the service was outstanding. Will definitely come back!",
        profane: false,
        rewritten: None,
        aspects: Some([None, None, Some(0.9), None, Some(0.8), None, Some(0.7)]),
        minutes_ago: 120,
        store: "STORE_001",
        status: ReviewStatus::RandomSample,
        accuracy: None,
    },
    MockReview {
        id: "R002",
        label: "Service Quality",
        text: "The waitress was rude and took forever to take our order. Food was cold when it arrived.",
        profane: false,
        rewritten: None,
        aspects: Some([None, None, Some(-0.6), Some(-0.8), Some(-0.9), None, None]),
        minutes_ago: 60,
        store: "STORE_002",
        status: ReviewStatus::RandomSample,
        accuracy: None,
    },
    MockReview {
        id: "R003",
        label: "Food Quality",
        text: "The damn food was terrible and the fucking service sucked ass!",
        profane: true,
        rewritten: Some("The food was terrible and the service was very poor!"),
        aspects: Some([None, None, Some(-0.9), None, Some(-0.8), None, None]),
        minutes_ago: 30,
        store: "STORE_001",
        status: ReviewStatus::RandomSample,
        accuracy: None,
    },
    MockReview {
        id: "R004",
        label: "Value",
        text: "Great value for money! The portions were huge and prices reasonable.",
        profane: false,
        rewritten: None,
        aspects: Some([Some(0.9), None, Some(0.7), None, None, None, None]),
        minutes_ago: 15,
        store: "STORE_003",
        status: ReviewStatus::RandomSample,
        accuracy: None,
    },
    MockReview {
        id: "R005",
        label: "Atmosphere",
        text: "The restaurant was okay, nothing special. Average food, average service.",
        profane: false,
        rewritten: None,
        aspects: Some([None, None, Some(0.0), None, Some(0.0), None, Some(0.0)]),
        minutes_ago: 5,
        store: "STORE_002",
        status: ReviewStatus::RandomSample,
        accuracy: None,
    },
    MockReview {
        id: "R006",
        label: "Irrelevant Comment",
        text: "What time does the mall close?",
        profane: false,
        rewritten: None,
        aspects: None,
        minutes_ago: 45,
        store: "STORE_001",
        status: ReviewStatus::RandomSample,
        accuracy: None,
    },
    MockReview {
        id: "C001",
        label: "Completed Review",
        text: "The service was excellent and food was great!",
        profane: false,
        rewritten: None,
        aspects: Some([None, None, Some(0.8), None, Some(0.9), None, None]),
        minutes_ago: 180,
        store: "STORE_001",
        status: ReviewStatus::Completed,
        accuracy: Some(0.95),
    },
    MockReview {
        id: "REC001",
        label: "Recommended Review",
        text: "The ambiance was terrible but food was okay.",
        profane: false,
        rewritten: None,
        aspects: Some([None, None, Some(0.2), None, None, None, Some(-0.8)]),
        minutes_ago: 60,
        store: "STORE_002",
        status: ReviewStatus::Recommended,
        accuracy: None,
    },
];

impl MockReview {
    fn to_detail(&self) -> ReviewDetail {
        let aspects = self.aspects.map(|scores| {
            ASPECT_NAMES
                .iter()
                .zip(scores)
                .map(|(name, score)| (name.to_string(), score))
                .collect::<BTreeMap<_, _>>()
        });

        let summary = ReviewSummary {
            response_id: self.id.to_string(),
            question_label: self.label.to_string(),
            question_response: self.text.to_string(),
            relevant_comments: self.text.to_string(),
            profanity_check: self.profane,
            profane: self.profane,
            rewritten_comment: self.rewritten.map(str::to_string),
            sentiment_analysis: SentimentAnalysis {
                irrelevant: self.aspects.is_none(),
                aspects,
                category_sentiments: None,
            },
            created_at: Some(Utc::now() - Duration::minutes(self.minutes_ago)),
            store_id: Some(self.store.to_string()),
            status: self.status,
            overall_sentiment_label: None,
            overall_sentiment_score: None,
            category_sentiments: None,
        };

        let validation_status = match self.status {
            ReviewStatus::Completed => ValidationStatus::Completed,
            _ => ValidationStatus::Pending,
        };

        let mut detail = ReviewDetail::new(summary, validation_status);
        detail.accuracy_score = self.accuracy;
        detail
    }
}

/// One page of sample reviews in `status`
pub fn reviews(status: &str, limit: usize, offset: usize) -> Vec<ReviewSummary> {
    MOCK_REVIEWS
        .iter()
        .filter(|r| r.status.as_str() == status)
        .skip(offset)
        .take(limit)
        .map(|r| r.to_detail().summary)
        .collect()
}

pub fn review(response_id: &str) -> Option<ReviewDetail> {
    MOCK_REVIEWS
        .iter()
        .find(|r| r.id == response_id)
        .map(MockReview::to_detail)
}

pub fn metrics() -> MetricsOverview {
    let count = |status: ReviewStatus| {
        MOCK_REVIEWS.iter().filter(|r| r.status == status).count() as i64
    };

    MetricsOverview {
        total_random_sample: count(ReviewStatus::RandomSample),
        completed_today: count(ReviewStatus::Completed),
        recommended_reviews: count(ReviewStatus::Recommended),
        total_reviews: MOCK_REVIEWS.len() as i64,
        average_accuracy: 0.87,
        corrections_per_review: 2.3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_within_status() {
        assert_eq!(reviews("random_sample", 10, 0).len(), 6);
        let page = reviews("random_sample", 2, 4);
        let ids: Vec<_> = page.iter().map(|r| r.response_id.as_str()).collect();
        assert_eq!(ids, vec!["R005", "R006"]);
        assert!(reviews("bogus", 10, 0).is_empty());
    }

    #[test]
    fn test_irrelevant_review_has_no_aspects() {
        let detail = review("R006").unwrap();
        assert!(detail.summary.sentiment_analysis.irrelevant);
        assert!(detail.summary.sentiment_analysis.aspects.is_none());
    }

    #[test]
    fn test_completed_review_carries_accuracy() {
        let detail = review("C001").unwrap();
        assert_eq!(detail.validation_status, ValidationStatus::Completed);
        assert_eq!(detail.accuracy_score, Some(0.95));
        assert!(review("NOPE").is_none());
    }

    #[test]
    fn test_metrics_counts() {
        let m = metrics();
        assert_eq!(m.total_random_sample, 6);
        assert_eq!(m.completed_today, 1);
        assert_eq!(m.recommended_reviews, 1);
        assert_eq!(m.total_reviews, 8);
    }
}
