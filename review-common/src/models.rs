//! Review data model
//!
//! JSON field names follow what the review frontend consumes, so most structs
//! serialize with their Rust field names verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Default question label when the warehouse row carries none
pub const DEFAULT_QUESTION_LABEL: &str = "COMMENT";

/// Default sentiment label for category entries missing one
pub const NEUTRAL_LABEL: &str = "Neutral";

/// Which queue a review is shown in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    RandomSample,
    Completed,
    Recommended,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RandomSample => "random_sample",
            Self::Completed => "completed",
            Self::Recommended => "recommended",
        }
    }
}

impl Default for ReviewStatus {
    fn default() -> Self {
        Self::RandomSample
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reviewer decision on a machine annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationDecision {
    Accept,
    Override,
    Skip,
}

impl ValidationDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Override => "override",
            Self::Skip => "skip",
        }
    }

    /// Past tense used in response messages
    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Accept => "accepted",
            Self::Override => "overridden",
            Self::Skip => "skipped",
        }
    }
}

impl fmt::Display for ValidationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation progress of a single review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending,
    Completed,
}

impl Default for ValidationStatus {
    fn default() -> Self {
        Self::Pending
    }
}

fn neutral_label() -> String {
    NEUTRAL_LABEL.to_string()
}

/// Sentiment for one (category, subcategory) pair of a review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySentiment {
    #[serde(default)]
    pub category: String,
    #[serde(default = "neutral_label")]
    pub category_sentiment_label: String,
    #[serde(default)]
    pub category_sentiment_score: f64,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default = "neutral_label")]
    pub subcategory_sentiment_label: String,
    #[serde(default)]
    pub subcategory_sentiment_score: f64,
}

impl CategorySentiment {
    /// Both halves of the pair are present
    pub fn is_complete(&self) -> bool {
        !self.category.is_empty() && !self.subcategory.is_empty()
    }

    /// Extreme sentiment on either the category or subcategory score
    pub fn is_extreme(&self) -> bool {
        self.category_sentiment_score.abs() > FLAG_THRESHOLD
            || self.subcategory_sentiment_score.abs() > FLAG_THRESHOLD
    }
}

/// Absolute score above which a category entry flags its review
pub const FLAG_THRESHOLD: f64 = 0.5;

/// LLM sentiment output attached to a review
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentAnalysis {
    #[serde(default)]
    pub irrelevant: bool,
    /// Legacy per-aspect scores (pricing, service, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspects: Option<BTreeMap<String, Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_sentiments: Option<Vec<CategorySentiment>>,
}

/// One survey response as shown to reviewers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub response_id: String,
    pub question_label: String,
    pub question_response: String,
    pub relevant_comments: String,
    pub profanity_check: bool,
    pub profane: bool,
    pub rewritten_comment: Option<String>,
    pub sentiment_analysis: SentimentAnalysis,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default)]
    pub status: ReviewStatus,
    #[serde(default)]
    pub overall_sentiment_label: Option<String>,
    #[serde(default)]
    pub overall_sentiment_score: Option<i64>,
    #[serde(default)]
    pub category_sentiments: Option<Vec<CategorySentiment>>,
}

impl ReviewSummary {
    /// Category entries, empty when none were attached
    pub fn categories(&self) -> &[CategorySentiment] {
        self.category_sentiments.as_deref().unwrap_or(&[])
    }
}

/// Review plus its validation state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDetail {
    #[serde(flatten)]
    pub summary: ReviewSummary,
    #[serde(default)]
    pub validation_status: ValidationStatus,
    #[serde(default)]
    pub user_corrections: Option<Value>,
    /// How much the reviewer changed from the original
    #[serde(default)]
    pub accuracy_score: Option<f64>,
}

impl ReviewDetail {
    pub fn new(summary: ReviewSummary, validation_status: ValidationStatus) -> Self {
        Self {
            summary,
            validation_status,
            user_corrections: None,
            accuracy_score: None,
        }
    }
}

/// Irrelevance correction nested under `sentiment_analysis`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SentimentCorrection {
    #[serde(default)]
    pub irrelevant: Option<bool>,
}

/// Reviewer-supplied corrections; absent fields keep the displayed value
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UpdatedLabels {
    #[serde(default)]
    pub profane: Option<bool>,
    #[serde(default)]
    pub rewritten_comment: Option<String>,
    #[serde(default)]
    pub overall_sentiment_label: Option<String>,
    #[serde(default, deserialize_with = "deserialize_loose_score")]
    pub overall_sentiment_score: Option<i64>,
    #[serde(default)]
    pub category_sentiments: Option<Vec<CategorySentiment>>,
    #[serde(default)]
    pub sentiment_analysis: Option<SentimentCorrection>,
}

impl UpdatedLabels {
    pub fn irrelevant(&self) -> Option<bool> {
        self.sentiment_analysis.as_ref().and_then(|s| s.irrelevant)
    }
}

/// Body of `POST /reviews/{id}/validate`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ValidationRequest {
    pub decision: ValidationDecision,
    #[serde(default)]
    pub updated_labels: Option<UpdatedLabels>,
    /// Number of changes the reviewer made
    #[serde(default)]
    pub corrections_made: Option<u32>,
}

/// Dashboard counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsOverview {
    pub total_random_sample: i64,
    pub completed_today: i64,
    pub recommended_reviews: i64,
    pub total_reviews: i64,
    pub average_accuracy: f64,
    pub corrections_per_review: f64,
}

/// A review suggested because it resembles a corrected one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendedReview {
    #[serde(flatten)]
    pub review: ReviewSummary,
    pub similarity_score: f64,
}

/// All active recommendations produced by one source review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationGroup {
    pub source_review_id: String,
    pub source_review_text: String,
    pub recommendation_timestamp: Option<DateTime<Utc>>,
    pub recommendation_count: i64,
    pub recommended_reviews: Vec<RecommendedReview>,
}

/// Accept integer, float (truncated toward zero) or numeric-string scores
fn deserialize_loose_score<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid score: {}", n))),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid score: {}", s)))
        }
        Some(other) => Err(D::Error::custom(format!("invalid score: {}", other))),
    }
}
