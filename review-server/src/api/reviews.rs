//! Review queue, detail, similarity and validation endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use review_common::models::{ReviewDetail, ReviewSummary, ValidationRequest};
use review_common::Error;

use super::{default_true, SourceQuery};
use crate::error::{ApiError, ApiResult};
use crate::mock;
use crate::service::ValidationOutcome;
use crate::AppState;

/// Query parameters for review listing
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_status")]
    pub status: String,

    #[serde(default = "default_limit")]
    pub limit: u32,

    #[serde(default)]
    pub offset: u32,

    pub store_id: Option<String>,

    #[serde(default = "default_true")]
    pub use_databricks: bool,
}

fn default_status() -> String {
    "random_sample".to_string()
}

fn default_limit() -> u32 {
    10
}

fn default_sample_limit() -> u32 {
    20
}

/// Query parameters for the similar-reviews lookup
#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,

    #[serde(default = "default_true")]
    pub use_databricks: bool,
}

/// Query parameters for refreshing the random sample
#[derive(Debug, Deserialize)]
pub struct RefreshQuery {
    #[serde(default = "default_sample_limit")]
    pub limit: u32,

    #[serde(default = "default_true")]
    pub use_databricks: bool,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub message: String,
    pub sample_size: usize,
}

fn mock_reviews(query: &ListQuery) -> Vec<ReviewSummary> {
    let reviews = mock::reviews(&query.status, query.limit as usize, query.offset as usize);
    match &query.store_id {
        Some(store) => reviews
            .into_iter()
            .filter(|r| r.store_id.as_deref() == Some(store.as_str()))
            .collect(),
        None => reviews,
    }
}

/// GET /api/v1/reviews
///
/// Falls back to sample data when the warehouse fails.
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<ReviewSummary>> {
    if !query.use_databricks {
        return Json(mock_reviews(&query));
    }

    match state
        .service
        .list_reviews(&query.status, query.limit, query.offset, query.store_id.as_deref())
        .await
    {
        Ok(reviews) => Json(reviews),
        Err(e) => {
            warn!(status = %query.status, error = %e, "Listing failed; serving sample data");
            Json(mock_reviews(&query))
        }
    }
}

fn mock_review(review_id: &str) -> ApiResult<Json<ReviewDetail>> {
    mock::review(review_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Review not found".to_string()))
}

/// GET /api/v1/reviews/:id
pub async fn get_review(
    State(state): State<AppState>,
    Path(review_id): Path<String>,
    Query(query): Query<SourceQuery>,
) -> ApiResult<Json<ReviewDetail>> {
    if !query.use_databricks {
        return mock_review(&review_id);
    }

    match state.service.get_review(&review_id).await {
        Ok(detail) => Ok(Json(detail)),
        Err(Error::NotFound(_)) => Err(ApiError::NotFound("Review not found".to_string())),
        Err(e) => {
            warn!(review_id = %review_id, error = %e, "Review lookup failed; serving sample data");
            mock_review(&review_id)
        }
    }
}

/// GET /api/v1/reviews/:id/similar
///
/// Always answers with a list; lookup failures produce an empty one.
pub async fn get_similar_reviews(
    State(state): State<AppState>,
    Path(review_id): Path<String>,
    Query(query): Query<SimilarQuery>,
) -> Json<Vec<ReviewSummary>> {
    if !query.use_databricks {
        return Json(Vec::new());
    }

    Json(
        state
            .service
            .similar_to(&review_id, query.limit as usize)
            .await,
    )
}

/// POST /api/v1/reviews/:id/validate
pub async fn validate_review(
    State(state): State<AppState>,
    Path(review_id): Path<String>,
    Query(query): Query<SourceQuery>,
    Json(request): Json<ValidationRequest>,
) -> ApiResult<Json<ValidationOutcome>> {
    if !query.use_databricks {
        if mock::review(&review_id).is_none() {
            return Err(ApiError::NotFound("Review not found".to_string()));
        }
        return Ok(Json(ValidationOutcome::mock(&review_id, request.decision)));
    }

    match state.service.validate(&review_id, &request).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(Error::NotFound(_)) => Err(ApiError::NotFound("Review not found".to_string())),
        Err(e) => {
            error!(review_id = %review_id, error = %e, "Failed to validate review");
            Err(ApiError::Internal(format!("Validation failed: {}", e)))
        }
    }
}

/// POST /api/v1/refresh-random-sample
pub async fn refresh_random_sample(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<RefreshResponse>> {
    if !query.use_databricks {
        let sample_size = mock::reviews("random_sample", query.limit as usize, 0).len();
        return Ok(Json(RefreshResponse {
            success: true,
            message: format!(
                "Generated new random sample of {} reviews (mock data)",
                sample_size
            ),
            sample_size,
        }));
    }

    let sample_size = state
        .service
        .refresh_random_sample(query.limit)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to generate new random sample");
            ApiError::Internal(format!("Failed to generate new random sample: {}", e))
        })?;

    Ok(Json(RefreshResponse {
        success: true,
        message: format!(
            "Generated new random sample of {} unvalidated reviews",
            sample_size
        ),
        sample_size,
    }))
}
