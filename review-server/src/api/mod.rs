//! HTTP API handlers for review-server

use serde::Deserialize;

pub mod diagnostics;
pub mod health;
pub mod metrics;
pub mod recommendations;
pub mod reviews;
pub mod ui;

pub use diagnostics::{test_connection, test_evaluation_table};
pub use health::health_routes;
pub use metrics::get_metrics_overview;
pub use recommendations::{get_recommendation_groups, get_recommendations_by_source};
pub use reviews::{
    get_review, get_similar_reviews, list_reviews, refresh_random_sample, validate_review,
};
pub use ui::{debug_frontend, root_banner};

fn default_true() -> bool {
    true
}

/// `use_databricks=false` switches an endpoint to the built-in sample data
#[derive(Debug, Deserialize)]
pub struct SourceQuery {
    #[serde(default = "default_true")]
    pub use_databricks: bool,
}
