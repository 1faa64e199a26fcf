//! Connection diagnostics
//!
//! Both endpoints always answer 200 and describe failures in the body, so they can be
//! used from a browser while the warehouse is misconfigured.

use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use review_common::db::{queries, schema};
use review_common::warehouse::{Dialect, Statement};
use review_common::Result;

use crate::service::ReviewService;
use crate::AppState;

/// Text embedded to probe the serving endpoint
const PROBE_TEXT: &str = "test connection";

fn backend_name(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Databricks => "databricks",
        Dialect::Sqlite => "sqlite",
    }
}

/// (status, ready) of the embedding endpoint
async fn probe_vector_search(service: &ReviewService) -> (String, bool) {
    let Some(index) = service.index() else {
        return ("not_available".to_string(), false);
    };

    match index.embed(PROBE_TEXT).await {
        Ok(vector) if !vector.is_empty() => ("available".to_string(), true),
        Ok(_) => ("embeddings_failed".to_string(), false),
        Err(e) => (format!("error: {}", e), false),
    }
}

async fn run_connection_test(service: &ReviewService) -> Result<Value> {
    let warehouse = service.warehouse();
    let test_query_result = warehouse.query(&queries::select_one()).await?;
    let table_schema = warehouse
        .query(&queries::describe_source(service.tables(), service.dialect()))
        .await?;
    let (vector_search_status, vector_index_ready) = probe_vector_search(service).await;

    Ok(json!({
        "connection_status": "success",
        "backend": backend_name(service.dialect()),
        "test_query_result": test_query_result,
        "table_schema": table_schema,
        "source_table": service.tables().source(),
        "evaluation_table": service.tables().evaluation(),
        "vector_search_status": vector_search_status,
        "vector_index_ready": vector_index_ready,
    }))
}

/// GET /api/v1/test-connection
pub async fn test_connection(State(state): State<AppState>) -> Json<Value> {
    match run_connection_test(&state.service).await {
        Ok(report) => {
            info!("Connection test succeeded");
            Json(report)
        }
        Err(e) => {
            error!(error = %e, "Connection test failed");
            Json(json!({
                "connection_status": "failed",
                "error": e.to_string(),
            }))
        }
    }
}

async fn inspect_evaluation_table(service: &ReviewService) -> Result<Value> {
    let warehouse = service.warehouse();
    let tables = service.tables();
    let describe = Statement::new(service.dialect().describe_table(tables.evaluation()));
    let count = queries::count_evaluations(tables);

    let (schema_rows, count_rows) = match (
        warehouse.query(&describe).await,
        warehouse.query(&count).await,
    ) {
        (Ok(s), Ok(c)) => (s, c),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Evaluation table not readable; creating it");
            schema::ensure_evaluation_tables(warehouse, tables).await?;
            (
                warehouse.query(&describe).await?,
                warehouse.query(&count).await?,
            )
        }
    };

    Ok(json!({
        "table_exists": true,
        "schema": schema_rows,
        "row_count": count_rows.first().and_then(|r| r.i64("eval_count")).unwrap_or(0),
    }))
}

/// GET /api/v1/test-evaluation-table
///
/// Creates the evaluation tables when they cannot be read.
pub async fn test_evaluation_table(State(state): State<AppState>) -> Json<Value> {
    match inspect_evaluation_table(&state.service).await {
        Ok(report) => Json(report),
        Err(e) => {
            error!(error = %e, "Evaluation table test failed");
            Json(json!({
                "table_exists": false,
                "error": e.to_string(),
            }))
        }
    }
}
