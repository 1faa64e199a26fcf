//! Row-grouping converter
//!
//! Source queries return one row per (survey response, category, subcategory). The
//! functions here regroup those rows into one [`ReviewSummary`] per response, and turn
//! evaluation-table rows and vector-index hits into the same shape.

use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::{
    CategorySentiment, ReviewStatus, ReviewSummary, SentimentAnalysis, DEFAULT_QUESTION_LABEL,
    NEUTRAL_LABEL,
};
use crate::vector::{SimilarityHit, ASPECT_PREFIX};
use crate::warehouse::Record;

/// Column aliases produced by the source-table queries
pub mod col {
    pub const RESPONSE_ID: &str = "response_id";
    pub const QUESTION_LABEL: &str = "question_label";
    pub const QUESTION_RESPONSE: &str = "question_response";
    pub const RESPONSE_RELEVANCY: &str = "response_relevancy";
    pub const PROFANE: &str = "profane";
    pub const REWRITTEN_COMMENT: &str = "rewritten_comment";
    pub const OVERALL_SENTIMENT_LABEL: &str = "overall_sentiment_label";
    pub const OVERALL_SENTIMENT_SCORE: &str = "overall_sentiment_score";
    pub const COMMENT_CATEGORY: &str = "comment_category";
    pub const CATEGORY_SENTIMENT_LABEL: &str = "category_sentiment_label";
    pub const CATEGORY_SENTIMENT_SCORE: &str = "category_sentiment_score";
    pub const COMMENT_SUBCATEGORY: &str = "comment_subcategory";
    pub const SUBCATEGORY_SENTIMENT_LABEL: &str = "subcategory_sentiment_label";
    pub const SUBCATEGORY_SENTIMENT_SCORE: &str = "subcategory_sentiment_score";
    pub const STORE_KEY: &str = "store_key";
    pub const VISIT_DATETIME: &str = "visit_datetime";
}

/// Relevancy strings carrying either marker mean the response is noise
pub fn is_irrelevant(relevancy: &str) -> bool {
    let lower = relevancy.to_lowercase();
    lower.contains("irrelevant") || lower.contains("nonsense")
}

/// Partition rows by response id, keeping first-seen order of ids and row order within ids
pub fn group_rows(rows: Vec<Record>) -> Vec<(String, Vec<Record>)> {
    let mut groups: Vec<(String, Vec<Record>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let Some(id) = row.str(col::RESPONSE_ID).filter(|id| !id.is_empty()) else {
            warn!("Dropping warehouse row without a response id");
            continue;
        };
        match index.get(&id) {
            Some(&i) => groups[i].1.push(row),
            None => {
                index.insert(id.clone(), groups.len());
                groups.push((id, vec![row]));
            }
        }
    }

    groups
}

/// Group flattened rows and convert each group, skipping groups that fail to convert
pub fn group_and_convert(rows: Vec<Record>) -> Vec<ReviewSummary> {
    group_rows(rows)
        .into_iter()
        .filter_map(|(id, group)| match convert_flattened_rows(&group) {
            Ok(review) => Some(review),
            Err(e) => {
                warn!(response_id = %id, error = %e, "Skipping review that failed to convert");
                None
            }
        })
        .collect()
}

fn category_from_row(row: &Record) -> Option<CategorySentiment> {
    let category = row.str(col::COMMENT_CATEGORY).unwrap_or_default();
    let subcategory = row.str(col::COMMENT_SUBCATEGORY).unwrap_or_default();
    if category.is_empty() || subcategory.is_empty() {
        return None;
    }

    Some(CategorySentiment {
        category,
        category_sentiment_label: row
            .str(col::CATEGORY_SENTIMENT_LABEL)
            .unwrap_or_else(|| NEUTRAL_LABEL.to_string()),
        category_sentiment_score: row.f64(col::CATEGORY_SENTIMENT_SCORE).unwrap_or(0.0),
        subcategory,
        subcategory_sentiment_label: row
            .str(col::SUBCATEGORY_SENTIMENT_LABEL)
            .unwrap_or_else(|| NEUTRAL_LABEL.to_string()),
        subcategory_sentiment_score: row.f64(col::SUBCATEGORY_SENTIMENT_SCORE).unwrap_or(0.0),
    })
}

/// Convert all rows of one survey response into a single review
///
/// Shared fields come from the first row. Fails on an empty slice or when the rows
/// belong to more than one response.
pub fn convert_flattened_rows(rows: &[Record]) -> Result<ReviewSummary> {
    let first = rows.first().ok_or(Error::EmptyGroup)?;
    let response_id = first.str(col::RESPONSE_ID).unwrap_or_default();

    for row in &rows[1..] {
        let other = row.str(col::RESPONSE_ID).unwrap_or_default();
        if other != response_id {
            return Err(Error::MixedResponseIds {
                expected: response_id,
                found: other,
            });
        }
    }

    let category_sentiments: Vec<CategorySentiment> =
        rows.iter().filter_map(category_from_row).collect();

    let flagged = category_sentiments.iter().any(CategorySentiment::is_extreme);
    let irrelevant = first
        .str(col::RESPONSE_RELEVANCY)
        .map(|r| is_irrelevant(&r))
        .unwrap_or(false);
    let question_response = first.str(col::QUESTION_RESPONSE).unwrap_or_default();

    Ok(ReviewSummary {
        response_id,
        question_label: first
            .str(col::QUESTION_LABEL)
            .unwrap_or_else(|| DEFAULT_QUESTION_LABEL.to_string()),
        relevant_comments: question_response.clone(),
        question_response,
        profanity_check: true,
        profane: first.bool(col::PROFANE).unwrap_or(false),
        rewritten_comment: Some(first.str(col::REWRITTEN_COMMENT).unwrap_or_default()),
        sentiment_analysis: SentimentAnalysis {
            irrelevant,
            aspects: None,
            category_sentiments: Some(category_sentiments.clone()),
        },
        created_at: first.timestamp(col::VISIT_DATETIME),
        store_id: first.str(col::STORE_KEY),
        status: if flagged {
            ReviewStatus::Recommended
        } else {
            ReviewStatus::RandomSample
        },
        overall_sentiment_label: first.str(col::OVERALL_SENTIMENT_LABEL),
        overall_sentiment_score: first.i64(col::OVERALL_SENTIMENT_SCORE),
        category_sentiments: Some(category_sentiments),
    })
}

/// Parse a stored JSON list of category sentiments; bad JSON yields an empty list
pub fn parse_category_json(raw: Option<&str>) -> Vec<CategorySentiment> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Vec::new();
    };

    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(error = %e, "Could not parse stored category sentiments");
        Vec::new()
    })
}

/// Convert one evaluation-table row; the human-corrected columns are what gets shown
pub fn convert_evaluation_row(row: &Record) -> Result<ReviewSummary> {
    let response_id = row
        .str("survey_response_id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Conversion("evaluation row without survey_response_id".to_string()))?;

    let categories =
        parse_category_json(row.str("human_eval_category_sentiments").as_deref());
    let question_response = row.str("question_response").unwrap_or_default();

    Ok(ReviewSummary {
        response_id,
        question_label: row
            .str("question_label")
            .unwrap_or_else(|| DEFAULT_QUESTION_LABEL.to_string()),
        relevant_comments: question_response.clone(),
        question_response,
        profanity_check: true,
        profane: row.bool("human_eval_profane").unwrap_or(false),
        rewritten_comment: row.str("human_eval_rewritten_comment"),
        sentiment_analysis: SentimentAnalysis {
            irrelevant: row.bool("human_eval_irrelevant").unwrap_or(false),
            aspects: None,
            category_sentiments: Some(categories.clone()),
        },
        created_at: row.timestamp("visit_datetime"),
        store_id: row.str("store_key"),
        status: ReviewStatus::Completed,
        overall_sentiment_label: row.str("human_eval_overall_sentiment_label"),
        overall_sentiment_score: row.i64("human_eval_overall_sentiment_score"),
        category_sentiments: Some(categories),
    })
}

/// Display name for an index aspect column (`aspect_food_and_beverage` and friends)
fn aspect_name(column: &str) -> Option<&'static str> {
    match column.strip_prefix(ASPECT_PREFIX)? {
        "pricing" => Some("Pricing"),
        "other" => Some("Other"),
        "food_and_beverage" => Some("Food_Experience"),
        "wait_time" => Some("Wait_Time"),
        "service" => Some("Service"),
        "cleanliness" => Some("Cleanliness"),
        "ambiance" => Some("Ambiance"),
        _ => None,
    }
}

/// Convert a similarity hit into a recommended review carrying legacy aspect scores
pub fn convert_similarity_hit(hit: &SimilarityHit) -> Result<ReviewSummary> {
    let record = &hit.record;
    let response_id = record
        .str("Response_Id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Conversion("similarity hit without Response_Id".to_string()))?;

    let aspects: BTreeMap<String, Option<f64>> = record
        .columns()
        .filter_map(|c| aspect_name(c).map(|name| (name.to_string(), record.f64(c))))
        .collect();

    let question_response = record.str("Question_Response").unwrap_or_default();

    Ok(ReviewSummary {
        response_id,
        question_label: record
            .str("Question_Label")
            .unwrap_or_else(|| DEFAULT_QUESTION_LABEL.to_string()),
        relevant_comments: question_response.clone(),
        question_response,
        profanity_check: true,
        profane: false,
        rewritten_comment: Some(String::new()),
        sentiment_analysis: SentimentAnalysis {
            irrelevant: false,
            aspects: Some(aspects),
            category_sentiments: None,
        },
        created_at: None,
        store_id: None,
        status: ReviewStatus::Recommended,
        overall_sentiment_label: None,
        overall_sentiment_score: None,
        category_sentiments: None,
    })
}
