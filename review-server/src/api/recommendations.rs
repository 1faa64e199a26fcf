//! Stored recommendation endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::warn;

use review_common::models::{RecommendationGroup, RecommendedReview};

use super::SourceQuery;
use crate::AppState;

/// GET /api/v1/recommendations
///
/// Empty while recommendations are disabled or when the lookup fails.
pub async fn get_recommendation_groups(
    State(state): State<AppState>,
    Query(query): Query<SourceQuery>,
) -> Json<Vec<RecommendationGroup>> {
    if !query.use_databricks {
        return Json(Vec::new());
    }

    match state.service.recommendation_groups().await {
        Ok(groups) => Json(groups),
        Err(e) => {
            warn!(error = %e, "Failed to get recommendation groups");
            Json(Vec::new())
        }
    }
}

/// GET /api/v1/recommendations/:source_review_id
pub async fn get_recommendations_by_source(
    State(state): State<AppState>,
    Path(source_review_id): Path<String>,
    Query(query): Query<SourceQuery>,
) -> Json<Vec<RecommendedReview>> {
    if !query.use_databricks {
        return Json(Vec::new());
    }

    match state
        .service
        .recommendations_for_source(&source_review_id)
        .await
    {
        Ok(reviews) => Json(reviews),
        Err(e) => {
            warn!(source = %source_review_id, error = %e, "Failed to get recommendations");
            Json(Vec::new())
        }
    }
}
