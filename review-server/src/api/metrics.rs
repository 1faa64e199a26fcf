//! Dashboard metrics endpoint

use axum::{
    extract::{Query, State},
    Json,
};

use review_common::models::MetricsOverview;

use super::SourceQuery;
use crate::mock;
use crate::AppState;

/// GET /api/v1/metrics/overview
///
/// Individual counters that fail to load are reported as zero.
pub async fn get_metrics_overview(
    State(state): State<AppState>,
    Query(query): Query<SourceQuery>,
) -> Json<MetricsOverview> {
    if !query.use_databricks {
        return Json(mock::metrics());
    }

    Json(state.service.metrics().await)
}
