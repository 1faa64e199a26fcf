//! Shared fixtures for review-server integration tests
//!
//! Builds an in-memory SQLite warehouse seeded with flattened survey rows, plus
//! stand-ins for a broken warehouse and for the vector index.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use review_common::db::{schema, Tables};
use review_common::vector::{SimilarityHit, SimilarityIndex};
use review_common::warehouse::{Dialect, Record, SqliteWarehouse, Statement, Warehouse};
use review_common::{Error, Result};
use review_server::service::{ReviewService, ReviewSettings};

pub const SOURCE_TABLE: &str = "guest_sentiment_scores";
pub const EVALUATION_TABLE: &str = "guest_sentiment_scores_evaluation";
pub const MODEL: &str = "human_validation_test";

/// One flattened source row
pub struct Row {
    pub id: &'static str,
    pub text: &'static str,
    pub relevancy: &'static str,
    pub profane: bool,
    pub overall: (&'static str, i64),
    pub category: Option<(&'static str, f64, &'static str, f64)>,
    pub store: &'static str,
}

/// R1: two mild categories, R2: one category at 0.51, R3: irrelevant with no
/// categories, R4: profane at another store
pub fn seed_rows() -> Vec<Row> {
    vec![
        Row {
            id: "R1",
            text: "The steak was overcooked and the server ignored us",
            relevancy: "useful",
            profane: false,
            overall: ("Negative", -2),
            category: Some(("Food", -0.4, "Quality", -0.5)),
            store: "S1",
        },
        Row {
            id: "R1",
            text: "The steak was overcooked and the server ignored us",
            relevancy: "useful",
            profane: false,
            overall: ("Negative", -2),
            category: Some(("Service", -0.2, "Attentiveness", -0.3)),
            store: "S1",
        },
        Row {
            id: "R2",
            text: "Loved the dessert menu, will be back",
            relevancy: "useful",
            profane: false,
            overall: ("Positive", 2),
            category: Some(("Food", 0.51, "Dessert", 0.4)),
            store: "S1",
        },
        Row {
            id: "R3",
            text: "asdf",
            relevancy: "Nonsense Or Irrelevant",
            profane: false,
            overall: ("Neutral", 0),
            category: None,
            store: "S2",
        },
        Row {
            id: "R4",
            text: "Damn good burgers, slow kitchen though",
            relevancy: "profane but useful",
            profane: true,
            overall: ("Mixed", 0),
            category: Some(("Service", -0.3, "Speed", -0.2)),
            store: "S2",
        },
    ]
}

pub fn tables() -> Tables {
    Tables::new(SOURCE_TABLE, EVALUATION_TABLE).unwrap()
}

pub async fn insert_row(warehouse: &dyn Warehouse, row: &Row) {
    let (category, category_score, subcategory, subcategory_score) = match row.category {
        Some((c, cs, s, ss)) => (Some(c), Some(cs), Some(s), Some(ss)),
        None => (None, None, None, None),
    };

    let statement = Statement::new(format!(
        "INSERT INTO {} (
            SurveyResponseId, QuestionLabel, QuestionResponse, ResponseRelevancy,
            IsProfanityRewrittenFlag, RewrittenQuestionResponse, OverallSentimentLabel,
            OverallSentimentScore, CommentCategory, CategorySentimentLabel,
            CategorySentimentScore, CommentSubcategory, SubCategorySentimentLabel,
            SubCategorySentimentScore, StoreKey, VisitDateTime
        ) VALUES (
            :id, 'COMMENT', :text, :relevancy, :profane, NULL, :overall_label,
            :overall_score, :category, 'Negative', :category_score, :subcategory, 'Negative',
            :subcategory_score, :store, '2024-05-01 18:30:00'
        )",
        SOURCE_TABLE
    ))
    .bind("id", row.id)
    .bind("text", row.text)
    .bind("relevancy", row.relevancy)
    .bind("profane", row.profane)
    .bind("overall_label", row.overall.0)
    .bind("overall_score", row.overall.1)
    .bind("category", category)
    .bind("category_score", category_score)
    .bind("subcategory", subcategory)
    .bind("subcategory_score", subcategory_score)
    .bind("store", row.store);

    warehouse.execute(&statement).await.unwrap();
}

/// In-memory warehouse with all tables created and the seed rows loaded
pub async fn seeded_warehouse() -> Arc<SqliteWarehouse> {
    let warehouse = SqliteWarehouse::in_memory().await.unwrap();
    let tables = tables();
    schema::ensure_source_table(&warehouse, &tables).await.unwrap();
    schema::ensure_evaluation_tables(&warehouse, &tables)
        .await
        .unwrap();
    for row in seed_rows() {
        insert_row(&warehouse, &row).await;
    }
    Arc::new(warehouse)
}

pub fn service_with(
    warehouse: Arc<dyn Warehouse>,
    index: Option<Arc<dyn SimilarityIndex>>,
    recommendations_enabled: bool,
) -> ReviewService {
    ReviewService::new(
        warehouse,
        index,
        tables(),
        ReviewSettings {
            evaluation_model: MODEL.to_string(),
            recommendations_enabled,
        },
    )
}

pub async fn seeded_service() -> (ReviewService, Arc<SqliteWarehouse>) {
    let warehouse = seeded_warehouse().await;
    (service_with(warehouse.clone(), None, false), warehouse)
}

/// Rows in the evaluation table for one response id
pub async fn evaluation_rows(warehouse: &dyn Warehouse, response_id: &str) -> Vec<Record> {
    warehouse
        .query(
            &Statement::new(format!(
                "SELECT * FROM {} WHERE survey_response_id = :id",
                EVALUATION_TABLE
            ))
            .bind("id", response_id),
        )
        .await
        .unwrap()
}

pub async fn evaluation_count(warehouse: &dyn Warehouse) -> i64 {
    warehouse
        .query(&Statement::new(format!(
            "SELECT COUNT(*) AS n FROM {}",
            EVALUATION_TABLE
        )))
        .await
        .unwrap()[0]
        .i64("n")
        .unwrap()
}

/// Warehouse whose every statement fails
pub struct FailingWarehouse;

#[async_trait]
impl Warehouse for FailingWarehouse {
    fn dialect(&self) -> Dialect {
        Dialect::Databricks
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Record>> {
        Err(Error::Connection(format!(
            "warehouse unreachable for: {}",
            statement.sql.lines().next().unwrap_or_default()
        )))
    }
}

/// Index answering every query with the same ranked hits
pub struct FakeIndex {
    pub hits: Vec<(&'static str, &'static str, f64)>,
}

impl FakeIndex {
    /// R1 itself first, then R2 and R4
    pub fn ranked() -> Self {
        Self {
            hits: vec![
                ("R1", "The steak was overcooked and the server ignored us", 0.99),
                ("R4", "Damn good burgers, slow kitchen though", 0.81),
                ("R2", "Loved the dessert menu, will be back", 0.9),
            ],
        }
    }
}

#[async_trait]
impl SimilarityIndex for FakeIndex {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(vec![text.len() as f32, 0.5, 0.25])
    }

    async fn query_index(
        &self,
        _vector: &[f32],
        _columns: &[&str],
        k: usize,
    ) -> Result<Vec<SimilarityHit>> {
        Ok(self
            .hits
            .iter()
            .take(k)
            .map(|(id, text, score)| SimilarityHit {
                record: Record::new()
                    .with("Response_Id", json!(id))
                    .with("Question_Response", json!(text))
                    .with("aspect_service", json!(-0.4))
                    .with("aspect_pricing", json!(null)),
                score: *score,
            })
            .collect())
    }
}

/// Index whose embedding endpoint is down
pub struct BrokenIndex;

#[async_trait]
impl SimilarityIndex for BrokenIndex {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::Connection("serving endpoint unavailable".to_string()))
    }

    async fn query_index(
        &self,
        _vector: &[f32],
        _columns: &[&str],
        _k: usize,
    ) -> Result<Vec<SimilarityHit>> {
        Ok(Vec::new())
    }
}
