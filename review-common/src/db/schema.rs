//! Evaluation and recommendation table definitions
//!
//! Databricks tables are Delta tables with warehouse types. SQLite gets the same columns
//! with TEXT/INTEGER/REAL affinities and a UNIQUE response id so the upsert's
//! `ON CONFLICT` clause has something to match.

use tracing::info;

use super::Tables;
use crate::error::Result;
use crate::warehouse::{Dialect, Statement, Warehouse};

/// Logical column types, mapped per dialect
#[derive(Debug, Clone, Copy)]
enum ColumnType {
    Text,
    Bool,
    Int,
    Float,
    Timestamp,
}

impl ColumnType {
    fn sql(&self, dialect: Dialect) -> &'static str {
        match (dialect, self) {
            (Dialect::Databricks, ColumnType::Text) => "STRING",
            (Dialect::Databricks, ColumnType::Bool) => "BOOLEAN",
            (Dialect::Databricks, ColumnType::Int) => "INT",
            (Dialect::Databricks, ColumnType::Float) => "FLOAT",
            (Dialect::Databricks, ColumnType::Timestamp) => "TIMESTAMP",
            (Dialect::Sqlite, ColumnType::Text | ColumnType::Timestamp) => "TEXT",
            (Dialect::Sqlite, ColumnType::Bool | ColumnType::Int) => "INTEGER",
            (Dialect::Sqlite, ColumnType::Float) => "REAL",
        }
    }
}

use ColumnType::*;

const EVALUATION_COLUMNS: &[(&str, ColumnType)] = &[
    ("evaluation_hash_key", Text),
    ("survey_response_id", Text),
    ("question_label", Text),
    ("question_response", Text),
    ("response_relevancy", Text),
    ("overall_sentiment_label", Text),
    ("overall_sentiment_score", Int),
    ("category_subcategory_list", Text),
    ("human_eval_profane", Bool),
    ("human_eval_rewritten_comment", Text),
    ("human_eval_irrelevant", Bool),
    ("human_eval_overall_sentiment_label", Text),
    ("human_eval_overall_sentiment_score", Int),
    ("human_eval_category_sentiments", Text),
    ("machine_eval_profane", Bool),
    ("machine_eval_rewritten_comment", Text),
    ("machine_eval_irrelevant", Bool),
    ("machine_eval_overall_sentiment_label", Text),
    ("machine_eval_overall_sentiment_score", Int),
    ("machine_eval_category_sentiments", Text),
    ("human_eval_pricing", Float),
    ("human_eval_other", Float),
    ("human_eval_food_experience", Float),
    ("human_eval_wait_time", Float),
    ("human_eval_service", Float),
    ("human_eval_cleanliness", Float),
    ("human_eval_ambiance", Float),
    ("store_key", Text),
    ("visit_datetime", Timestamp),
    ("evaluation_model", Text),
    ("created_at", Timestamp),
    ("updated_at", Timestamp),
];

const RECOMMENDATION_COLUMNS: &[(&str, ColumnType)] = &[
    ("source_review_id", Text),
    ("recommended_review_id", Text),
    ("similarity_score", Float),
    ("recommendation_timestamp", Timestamp),
    ("source_review_text", Text),
    ("is_active", Bool),
];

const SOURCE_COLUMNS: &[(&str, ColumnType)] = &[
    ("SurveyResponseId", Text),
    ("QuestionLabel", Text),
    ("QuestionResponse", Text),
    ("ResponseRelevancy", Text),
    ("IsProfanityRewrittenFlag", Bool),
    ("RewrittenQuestionResponse", Text),
    ("OverallSentimentLabel", Text),
    ("OverallSentimentScore", Int),
    ("CommentCategory", Text),
    ("CategorySentimentLabel", Text),
    ("CategorySentimentScore", Float),
    ("CommentSubcategory", Text),
    ("SubCategorySentimentLabel", Text),
    ("SubCategorySentimentScore", Float),
    ("StoreKey", Text),
    ("VisitDateTime", Timestamp),
];

fn create_table(
    table: &str,
    columns: &[(&str, ColumnType)],
    dialect: Dialect,
    unique: Option<&str>,
) -> String {
    let body = columns
        .iter()
        .map(|(name, ty)| {
            let constraint = match (dialect, unique) {
                (Dialect::Sqlite, Some(u)) if u == *name => " UNIQUE",
                _ => "",
            };
            format!("    {} {}{}", name, ty.sql(dialect), constraint)
        })
        .collect::<Vec<_>>()
        .join(",\n");

    let suffix = match dialect {
        Dialect::Databricks => " USING DELTA",
        Dialect::Sqlite => "",
    };

    format!("CREATE TABLE IF NOT EXISTS {} (\n{}\n){}", table, body, suffix)
}

pub fn evaluation_table_ddl(table: &str, dialect: Dialect) -> String {
    create_table(table, EVALUATION_COLUMNS, dialect, Some("survey_response_id"))
}

pub fn recommendations_table_ddl(table: &str, dialect: Dialect) -> String {
    create_table(table, RECOMMENDATION_COLUMNS, dialect, None)
}

/// Flattened source table; only created for local SQLite warehouses
pub fn source_table_ddl(table: &str, dialect: Dialect) -> String {
    create_table(table, SOURCE_COLUMNS, dialect, None)
}

/// Create the evaluation and recommendation tables when missing
pub async fn ensure_evaluation_tables(warehouse: &dyn Warehouse, tables: &Tables) -> Result<()> {
    let dialect = warehouse.dialect();
    warehouse
        .execute(&Statement::new(evaluation_table_ddl(tables.evaluation(), dialect)))
        .await?;
    warehouse
        .execute(&Statement::new(recommendations_table_ddl(
            tables.recommendations(),
            dialect,
        )))
        .await?;

    info!(
        evaluation = tables.evaluation(),
        recommendations = tables.recommendations(),
        "Evaluation tables ready"
    );
    Ok(())
}

/// Create the source table when missing (local development warehouses)
pub async fn ensure_source_table(warehouse: &dyn Warehouse, tables: &Tables) -> Result<()> {
    warehouse
        .execute(&Statement::new(source_table_ddl(
            tables.source(),
            warehouse.dialect(),
        )))
        .await
}
