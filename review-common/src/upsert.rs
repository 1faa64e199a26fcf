//! Evaluation upsert builder
//!
//! A validated review becomes exactly one evaluation row per survey response. The row
//! key is a SHA-256 of response id and model version; the merge itself matches on the
//! response id, so re-validating a review overwrites the human columns in place.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::models::{CategorySentiment, ReviewSummary};
use crate::warehouse::{is_valid_table_name, Dialect, SqlValue, Statement};

pub const RELEVANCY_USEFUL: &str = "useful";
pub const RELEVANCY_PROFANE: &str = "profane but useful";
pub const RELEVANCY_IRRELEVANT: &str = "nonsense or irrelevant";

/// Legacy per-aspect columns, kept in the schema and always written NULL
pub const LEGACY_ASPECT_COLUMNS: &[&str] = &[
    "human_eval_pricing",
    "human_eval_other",
    "human_eval_food_experience",
    "human_eval_wait_time",
    "human_eval_service",
    "human_eval_cleanliness",
    "human_eval_ambiance",
];

/// Columns refreshed when the response already has an evaluation row
const MATCHED_UPDATE_COLUMNS: &[&str] = &[
    "response_relevancy",
    "overall_sentiment_label",
    "overall_sentiment_score",
    "category_subcategory_list",
    "human_eval_profane",
    "human_eval_rewritten_comment",
    "human_eval_irrelevant",
    "human_eval_overall_sentiment_label",
    "human_eval_overall_sentiment_score",
    "human_eval_category_sentiments",
    "human_eval_pricing",
    "human_eval_other",
    "human_eval_food_experience",
    "human_eval_wait_time",
    "human_eval_service",
    "human_eval_cleanliness",
    "human_eval_ambiance",
    "evaluation_model",
];

/// Label set written to either the human or the machine side of a row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationLabels {
    pub profane: bool,
    pub rewritten_comment: Option<String>,
    pub irrelevant: bool,
    pub overall_sentiment_label: Option<String>,
    pub overall_sentiment_score: Option<i64>,
    pub category_sentiments: Vec<CategorySentiment>,
}

impl EvaluationLabels {
    /// Snapshot of the labels currently shown for a review
    pub fn from_summary(review: &ReviewSummary) -> Self {
        Self {
            profane: review.profane,
            rewritten_comment: review.rewritten_comment.clone(),
            irrelevant: review.sentiment_analysis.irrelevant,
            overall_sentiment_label: review.overall_sentiment_label.clone(),
            overall_sentiment_score: review.overall_sentiment_score,
            category_sentiments: review.categories().to_vec(),
        }
    }

    /// Relevancy string written back to the warehouse
    pub fn relevancy(&self) -> &'static str {
        if self.irrelevant {
            RELEVANCY_IRRELEVANT
        } else if self.profane {
            RELEVANCY_PROFANE
        } else {
            RELEVANCY_USEFUL
        }
    }
}

/// Reviewer output plus the response context copied onto the row
#[derive(Debug, Clone, PartialEq)]
pub struct HumanEvaluation {
    pub question_label: String,
    pub question_response: String,
    pub store_key: Option<String>,
    pub visit_datetime: Option<DateTime<Utc>>,
    pub labels: EvaluationLabels,
}

impl HumanEvaluation {
    /// Context from `review`, labels supplied by the reviewer
    pub fn new(review: &ReviewSummary, labels: EvaluationLabels) -> Self {
        Self {
            question_label: review.question_label.clone(),
            question_response: review.question_response.clone(),
            store_key: review.store_id.clone(),
            visit_datetime: review.created_at,
            labels,
        }
    }
}

/// Deterministic row key for (response id, model version)
pub fn evaluation_hash_key(response_id: &str, model_version: &str) -> String {
    format!(
        "{:x}",
        Sha256::digest(format!("{}_{}", response_id, model_version).as_bytes())
    )
}

/// `category:subcategory` pairs for complete entries, comma separated
pub fn category_subcategory_list(categories: &[CategorySentiment]) -> String {
    categories
        .iter()
        .filter(|c| c.is_complete())
        .map(|c| format!("{}:{}", c.category, c.subcategory))
        .collect::<Vec<_>>()
        .join(", ")
}

fn categories_json(categories: &[CategorySentiment]) -> Result<String> {
    if categories.is_empty() {
        return Ok("[]".to_string());
    }
    Ok(serde_json::to_string(categories)?)
}

/// Ordered column values for one evaluation row
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationUpsert {
    pub hash_key: String,
    pub response_id: String,
    pub columns: Vec<(&'static str, SqlValue)>,
}

/// Build the evaluation row for `response_id`
pub fn build_upsert(
    response_id: &str,
    human: &HumanEvaluation,
    machine: Option<&EvaluationLabels>,
    model_version: &str,
) -> Result<EvaluationUpsert> {
    let hash_key = evaluation_hash_key(response_id, model_version);
    let labels = &human.labels;

    let mut columns: Vec<(&'static str, SqlValue)> = vec![
        ("evaluation_hash_key", hash_key.clone().into()),
        ("survey_response_id", response_id.into()),
        ("question_label", human.question_label.clone().into()),
        ("question_response", human.question_response.clone().into()),
        ("response_relevancy", labels.relevancy().into()),
        ("overall_sentiment_label", labels.overall_sentiment_label.clone().into()),
        ("overall_sentiment_score", labels.overall_sentiment_score.into()),
        (
            "category_subcategory_list",
            category_subcategory_list(&labels.category_sentiments).into(),
        ),
        ("human_eval_profane", labels.profane.into()),
        ("human_eval_rewritten_comment", labels.rewritten_comment.clone().into()),
        ("human_eval_irrelevant", labels.irrelevant.into()),
        (
            "human_eval_overall_sentiment_label",
            labels.overall_sentiment_label.clone().into(),
        ),
        (
            "human_eval_overall_sentiment_score",
            labels.overall_sentiment_score.into(),
        ),
        (
            "human_eval_category_sentiments",
            categories_json(&labels.category_sentiments)?.into(),
        ),
        ("machine_eval_profane", machine.map(|m| m.profane).unwrap_or(false).into()),
        (
            "machine_eval_rewritten_comment",
            machine.and_then(|m| m.rewritten_comment.clone()).into(),
        ),
        ("machine_eval_irrelevant", machine.map(|m| m.irrelevant).unwrap_or(false).into()),
        (
            "machine_eval_overall_sentiment_label",
            machine.and_then(|m| m.overall_sentiment_label.clone()).into(),
        ),
        (
            "machine_eval_overall_sentiment_score",
            machine.and_then(|m| m.overall_sentiment_score).into(),
        ),
        (
            "machine_eval_category_sentiments",
            match machine {
                Some(m) => categories_json(&m.category_sentiments)?,
                None => "[]".to_string(),
            }
            .into(),
        ),
    ];

    columns.extend(LEGACY_ASPECT_COLUMNS.iter().map(|c| (*c, SqlValue::Null)));
    columns.push(("store_key", human.store_key.clone().into()));
    columns.push(("visit_datetime", human.visit_datetime.into()));
    columns.push(("evaluation_model", model_version.into()));

    Ok(EvaluationUpsert {
        hash_key,
        response_id: response_id.to_string(),
        columns,
    })
}

impl EvaluationUpsert {
    pub fn value(&self, column: &str) -> Option<&SqlValue> {
        self.columns.iter().find(|(c, _)| *c == column).map(|(_, v)| v)
    }

    /// Render the dialect's upsert against `table`, stamping `now` as created/updated time
    pub fn to_statement(&self, table: &str, dialect: Dialect, now: DateTime<Utc>) -> Result<Statement> {
        if !is_valid_table_name(table) {
            return Err(Error::Config(format!("Invalid table name: {}", table)));
        }

        let names: Vec<&str> = self.columns.iter().map(|(c, _)| *c).collect();
        let sql = match dialect {
            Dialect::Databricks => render_merge(table, &names),
            Dialect::Sqlite => render_on_conflict(table, &names),
        };

        let statement = self
            .columns
            .iter()
            .fold(Statement::new(sql), |stmt, (column, value)| {
                stmt.bind(column, value.clone())
            })
            .bind("now", now);

        Ok(statement)
    }
}

fn render_merge(table: &str, names: &[&str]) -> String {
    let select_list = names
        .iter()
        .map(|c| format!(":{c} AS {c}"))
        .chain(["created_at", "updated_at"].iter().map(|c| format!(":now AS {c}")))
        .collect::<Vec<_>>()
        .join(",\n        ");

    let update_list = MATCHED_UPDATE_COLUMNS
        .iter()
        .chain(std::iter::once(&"updated_at"))
        .map(|c| format!("{c} = source.{c}"))
        .collect::<Vec<_>>()
        .join(",\n        ");

    let insert_columns: Vec<&str> = names
        .iter()
        .copied()
        .chain(["created_at", "updated_at"])
        .collect();
    let insert_values = insert_columns
        .iter()
        .map(|c| format!("source.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "MERGE INTO {table} AS target\n\
         USING (\n    SELECT\n        {select_list}\n) AS source\n\
         ON target.survey_response_id = source.survey_response_id\n\
         WHEN MATCHED THEN\n    UPDATE SET\n        {update_list}\n\
         WHEN NOT MATCHED THEN\n    INSERT ({columns})\n    VALUES ({insert_values})",
        columns = insert_columns.join(", "),
    )
}

fn render_on_conflict(table: &str, names: &[&str]) -> String {
    let columns = names
        .iter()
        .copied()
        .chain(["created_at", "updated_at"])
        .collect::<Vec<_>>()
        .join(", ");
    let values = names
        .iter()
        .map(|c| format!(":{c}"))
        .chain([":now".to_string(), ":now".to_string()])
        .collect::<Vec<_>>()
        .join(", ");
    let update_list = MATCHED_UPDATE_COLUMNS
        .iter()
        .chain(std::iter::once(&"updated_at"))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(",\n    ");

    format!(
        "INSERT INTO {table} ({columns})\nVALUES ({values})\n\
         ON CONFLICT(survey_response_id) DO UPDATE SET\n    {update_list}"
    )
}
