//! Similar-review lookup through the vector index

use tracing::{debug, info, warn};

use review_common::convert::convert_similarity_hit;
use review_common::models::{RecommendedReview, ReviewSummary};
use review_common::vector::SIMILAR_REVIEW_COLUMNS;
use review_common::Result;

use super::ReviewService;

/// Shorter query texts are not worth embedding
const MIN_QUERY_CHARS: usize = 10;

/// Extra hits requested so that dropping the source review still fills the page
const SELF_EXCLUSION_SLACK: usize = 5;

impl ReviewService {
    /// Reviews resembling `response_id`; empty when the index is off or anything fails
    pub async fn similar_to(&self, response_id: &str, limit: usize) -> Vec<ReviewSummary> {
        if self.index.is_none() {
            debug!(response_id, "Vector search not configured");
            return Vec::new();
        }

        let source = match self.get_review(response_id).await {
            Ok(detail) => detail.summary,
            Err(e) => {
                warn!(response_id, error = %e, "Could not load review for similarity search");
                return Vec::new();
            }
        };

        let similar: Vec<ReviewSummary> = self
            .similar_reviews(&source, limit, true)
            .await
            .into_iter()
            .map(|r| r.review)
            .collect();

        info!(response_id, count = similar.len(), "Found similar reviews");
        similar
    }

    /// Nearest neighbours of `source` by its text, with their scores
    pub async fn similar_reviews(
        &self,
        source: &ReviewSummary,
        limit: usize,
        exclude_self: bool,
    ) -> Vec<RecommendedReview> {
        let text = source.question_response.trim();
        if text.chars().count() < MIN_QUERY_CHARS {
            warn!(
                response_id = %source.response_id,
                "Review has insufficient text for similarity search"
            );
            return Vec::new();
        }

        match self.search(text, &source.response_id, limit, exclude_self).await {
            Ok(found) => found,
            Err(e) => {
                warn!(response_id = %source.response_id, error = %e, "Similarity search failed");
                Vec::new()
            }
        }
    }

    async fn search(
        &self,
        text: &str,
        source_id: &str,
        limit: usize,
        exclude_self: bool,
    ) -> Result<Vec<RecommendedReview>> {
        let Some(index) = self.index() else {
            return Ok(Vec::new());
        };

        let vector = index.embed(text).await?;
        let k = if exclude_self {
            limit + SELF_EXCLUSION_SLACK
        } else {
            limit
        };
        let hits = index.query_index(&vector, SIMILAR_REVIEW_COLUMNS, k).await?;

        Ok(hits
            .iter()
            .filter_map(|hit| match convert_similarity_hit(hit) {
                Ok(review) => Some(RecommendedReview {
                    review,
                    similarity_score: hit.score,
                }),
                Err(e) => {
                    warn!(error = %e, "Skipping similarity hit that failed to convert");
                    None
                }
            })
            .filter(|r| !exclude_self || r.review.response_id != source_id)
            .take(limit)
            .collect())
    }
}
