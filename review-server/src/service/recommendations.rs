//! Stored recommendations: reviews suggested after a reviewer corrected a similar one

use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, info};

use review_common::convert::group_and_convert;
use review_common::db::queries;
use review_common::models::{RecommendationGroup, RecommendedReview, ReviewStatus};
use review_common::Result;

use super::ReviewService;

/// Source text shown on a group card is cut to this many characters
const SOURCE_PREVIEW_CHARS: usize = 200;

fn preview(text: &str) -> String {
    if text.chars().count() > SOURCE_PREVIEW_CHARS {
        let cut: String = text.chars().take(SOURCE_PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

impl ReviewService {
    /// Replace the active recommendations of `source_id` with `found`
    pub async fn store_recommendations(
        &self,
        source_id: &str,
        source_text: &str,
        found: &[RecommendedReview],
    ) -> Result<()> {
        self.execute(&queries::deactivate_recommendations(&self.tables, source_id))
            .await?;

        let now = Utc::now();
        for rec in found {
            let statement = queries::insert_recommendation(
                &self.tables,
                source_id,
                &rec.review.response_id,
                rec.similarity_score,
                source_text,
                now,
            );
            self.execute(&statement).await?;
        }

        info!(source_id, count = found.len(), "Recommendations stored");
        Ok(())
    }

    /// Active recommendation groups, newest first
    pub async fn recommendation_groups(&self) -> Result<Vec<RecommendationGroup>> {
        if !self.settings.recommendations_enabled {
            debug!("Recommendations disabled");
            return Ok(Vec::new());
        }

        let rows = self
            .query(&queries::recommendation_groups(&self.tables))
            .await?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(source_review_id) = row.str("source_review_id") else {
                continue;
            };
            let recommended_reviews = self.recommendations_for_source(&source_review_id).await?;

            groups.push(RecommendationGroup {
                source_review_text: preview(&row.str("source_review_text").unwrap_or_default()),
                recommendation_timestamp: row.timestamp("recommendation_timestamp"),
                recommendation_count: row.i64("recommendation_count").unwrap_or(0),
                source_review_id,
                recommended_reviews,
            });
        }

        Ok(groups)
    }

    /// Active recommendations of one source review, best match first
    ///
    /// Recommended ids that no longer exist in the source table are dropped.
    pub async fn recommendations_for_source(
        &self,
        source_id: &str,
    ) -> Result<Vec<RecommendedReview>> {
        if !self.settings.recommendations_enabled {
            return Ok(Vec::new());
        }

        let rows = self
            .query(&queries::recommendations_for_source(&self.tables, source_id))
            .await?;

        let scores: HashMap<String, f64> = rows
            .iter()
            .filter_map(|row| {
                Some((
                    row.str("recommended_review_id")?,
                    row.f64("similarity_score").unwrap_or(0.0),
                ))
            })
            .collect();
        if scores.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = scores.keys().cloned().collect();
        let source_rows = self
            .query(&queries::source_rows_by_ids(&self.tables, &ids))
            .await?;

        let mut reviews: Vec<RecommendedReview> = group_and_convert(source_rows)
            .into_iter()
            .filter_map(|mut review| {
                let similarity_score = *scores.get(&review.response_id)?;
                review.status = ReviewStatus::Recommended;
                Some(RecommendedReview {
                    review,
                    similarity_score,
                })
            })
            .collect();

        reviews.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        Ok(reviews)
    }
}
