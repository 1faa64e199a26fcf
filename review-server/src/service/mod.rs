//! Review workflow over the warehouse and the similarity index
//!
//! The service holds the injected clients and knows which tables to use. Handlers call
//! it for every warehouse-backed operation and decide themselves whether a failure
//! degrades to sample data or reaches the caller.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use review_common::convert::{convert_evaluation_row, group_and_convert};
use review_common::db::{queries, Tables};
use review_common::models::{ReviewDetail, ReviewStatus, ReviewSummary, ValidationStatus};
use review_common::vector::SimilarityIndex;
use review_common::warehouse::{Dialect, Record, Statement, Warehouse};
use review_common::{Error, Result};

pub mod metrics;
pub mod recommendations;
pub mod similar;
pub mod validation;

pub use validation::ValidationOutcome;

/// Recommendation groups shown in the recommended queue
const RECOMMENDED_GROUP_LIMIT: usize = 5;

/// Behaviour switches for the review workflow
#[derive(Debug, Clone)]
pub struct ReviewSettings {
    /// Version tag written with every evaluation row
    pub evaluation_model: String,
    pub recommendations_enabled: bool,
}

/// Review workflow service
pub struct ReviewService {
    warehouse: Arc<dyn Warehouse>,
    index: Option<Arc<dyn SimilarityIndex>>,
    tables: Tables,
    settings: ReviewSettings,
}

impl ReviewService {
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        index: Option<Arc<dyn SimilarityIndex>>,
        tables: Tables,
        settings: ReviewSettings,
    ) -> Self {
        Self {
            warehouse,
            index,
            tables,
            settings,
        }
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn settings(&self) -> &ReviewSettings {
        &self.settings
    }

    pub fn dialect(&self) -> Dialect {
        self.warehouse.dialect()
    }

    pub fn warehouse(&self) -> &dyn Warehouse {
        self.warehouse.as_ref()
    }

    pub fn index(&self) -> Option<&dyn SimilarityIndex> {
        self.index.as_deref()
    }

    /// Run a statement, logging the inlined SQL when it fails
    pub(crate) async fn query(&self, statement: &Statement) -> Result<Vec<Record>> {
        debug!(sql = %statement, "Running statement");
        self.warehouse.query(statement).await.map_err(|e| {
            error!(sql = %statement.render_inline(), error = %e, "Statement failed");
            e
        })
    }

    pub(crate) async fn execute(&self, statement: &Statement) -> Result<()> {
        self.query(statement).await.map(|_| ())
    }

    /// Reviews in one queue
    ///
    /// `completed` reads the evaluation table, `recommended` the stored recommendation
    /// groups, anything else a random sample of source reviews. Only `random_sample`
    /// excludes reviews that already have an evaluation row.
    pub async fn list_reviews(
        &self,
        status: &str,
        limit: u32,
        offset: u32,
        store_id: Option<&str>,
    ) -> Result<Vec<ReviewSummary>> {
        let reviews = if status == ReviewStatus::Completed.as_str() {
            self.completed_reviews(limit, offset).await?
        } else if status == ReviewStatus::Recommended.as_str() {
            self.recommended_reviews(limit as usize, offset as usize).await?
        } else {
            let exclude_evaluated = status == ReviewStatus::RandomSample.as_str();
            self.pending_reviews(limit, offset, exclude_evaluated).await?
        };

        Ok(match store_id {
            Some(store) => reviews
                .into_iter()
                .filter(|r| r.store_id.as_deref() == Some(store))
                .collect(),
            None => reviews,
        })
    }

    async fn pending_reviews(
        &self,
        limit: u32,
        offset: u32,
        exclude_evaluated: bool,
    ) -> Result<Vec<ReviewSummary>> {
        let statement =
            queries::pending_reviews(&self.tables, self.dialect(), limit, offset, exclude_evaluated);
        let rows = self.query(&statement).await?;
        let reviews = group_and_convert(rows);
        debug!(count = reviews.len(), exclude_evaluated, "Loaded pending reviews");
        Ok(reviews)
    }

    async fn completed_reviews(&self, limit: u32, offset: u32) -> Result<Vec<ReviewSummary>> {
        let rows = self
            .query(&queries::completed_reviews(&self.tables, limit, offset))
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| match convert_evaluation_row(row) {
                Ok(review) => Some(review),
                Err(e) => {
                    warn!(error = %e, "Skipping evaluation row that failed to convert");
                    None
                }
            })
            .collect())
    }

    async fn recommended_reviews(&self, limit: usize, offset: usize) -> Result<Vec<ReviewSummary>> {
        if !self.settings.recommendations_enabled {
            debug!("Recommendations disabled; recommended queue is empty");
            return Ok(Vec::new());
        }

        let groups = self.recommendation_groups().await?;
        Ok(groups
            .into_iter()
            .take(RECOMMENDED_GROUP_LIMIT)
            .flat_map(|g| g.recommended_reviews)
            .map(|r| r.review)
            .skip(offset)
            .take(limit)
            .collect())
    }

    /// One review, preferring its evaluation row over the source rows
    ///
    /// A failed evaluation lookup is logged and the source table is consulted instead.
    pub async fn get_review(&self, response_id: &str) -> Result<ReviewDetail> {
        match self
            .query(&queries::evaluation_by_id(&self.tables, response_id))
            .await
        {
            Ok(rows) => {
                if let Some(row) = rows.first() {
                    let summary = convert_evaluation_row(row)?;
                    return Ok(ReviewDetail::new(summary, ValidationStatus::Completed));
                }
            }
            Err(e) => {
                warn!(response_id, error = %e, "Evaluation lookup failed; reading source rows");
            }
        }

        let rows = self
            .query(&queries::source_rows_by_id(&self.tables, response_id))
            .await?;
        let summary = group_and_convert(rows)
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("Review {}", response_id)))?;

        Ok(ReviewDetail::new(summary, ValidationStatus::Pending))
    }

    /// Draw a fresh random sample of unvalidated reviews, returning its size
    pub async fn refresh_random_sample(&self, limit: u32) -> Result<usize> {
        let reviews = self.pending_reviews(limit, 0, true).await?;
        info!("Generated new random sample of {} unvalidated reviews", reviews.len());
        Ok(reviews.len())
    }
}
