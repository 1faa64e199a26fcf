//! Vector similarity search
//!
//! The index stores one row per survey response with its text and the legacy
//! aspect scores. Lookups embed the query text and ask the index for the nearest rows.

use async_trait::async_trait;

use crate::error::Result;
use crate::warehouse::Record;

mod databricks;

pub use databricks::{DatabricksVectorIndex, VectorSettings};

/// Columns requested from the index for every hit
pub const SIMILAR_REVIEW_COLUMNS: &[&str] = &[
    "Response_Id",
    "Question_Response",
    "Question_Label",
    "aspect_service",
    "aspect_food_and_beverage",
    "aspect_pricing",
    "aspect_ambiance",
    "aspect_cleanliness",
    "aspect_wait_time",
    "aspect_other",
    "sentiment_analysis",
];

/// Index column prefix for aspect scores
pub const ASPECT_PREFIX: &str = "aspect_";

/// One nearest-neighbour result
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    pub record: Record,
    pub score: f64,
}

/// Embedding model plus vector index
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Embed `text` with the serving endpoint
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Nearest `k` rows to `vector`, best first
    async fn query_index(
        &self,
        vector: &[f32],
        columns: &[&str],
        k: usize,
    ) -> Result<Vec<SimilarityHit>>;
}
