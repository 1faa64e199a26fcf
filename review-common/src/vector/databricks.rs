//! Databricks model serving + vector search client

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{SimilarityHit, SimilarityIndex};
use crate::error::{Error, Result};
use crate::warehouse::databricks::{http_client, normalize_host};
use crate::warehouse::Record;

const SCORE_COLUMN: &str = "score";
// Hits arrive best first; indexes without a score column rank everything equally
const DEFAULT_SCORE: f64 = 1.0;

/// Endpoint names for the embedding model and the index
#[derive(Debug, Clone)]
pub struct VectorSettings {
    pub host: String,
    pub token: String,
    pub index_name: String,
    pub embedding_endpoint: String,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct IndexQueryResponse {
    #[serde(default)]
    manifest: Option<IndexManifest>,
    #[serde(default)]
    result: Option<IndexResult>,
}

#[derive(Debug, Deserialize)]
struct IndexManifest {
    #[serde(default)]
    columns: Vec<IndexColumn>,
}

#[derive(Debug, Deserialize)]
struct IndexColumn {
    name: String,
}

#[derive(Debug, Deserialize)]
struct IndexResult {
    #[serde(default)]
    data_array: Vec<Vec<Value>>,
}

pub struct DatabricksVectorIndex {
    http_client: reqwest::Client,
    host: String,
    token: String,
    index_name: String,
    embedding_endpoint: String,
}

impl DatabricksVectorIndex {
    pub fn new(settings: VectorSettings) -> Result<Self> {
        if settings.index_name.trim().is_empty() || settings.embedding_endpoint.trim().is_empty() {
            return Err(Error::Config(
                "vector search needs both an index name and an embedding endpoint".to_string(),
            ));
        }

        Ok(Self {
            http_client: http_client(settings.timeout)?,
            host: normalize_host(&settings.host),
            token: settings.token,
            index_name: settings.index_name,
            embedding_endpoint: settings.embedding_endpoint,
        })
    }

    async fn post(&self, url: String, body: Value) -> Result<reqwest::Response> {
        debug!(url = %url, "Calling Databricks endpoint");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Connection(format!(
                "{} returned {}: {}",
                url,
                status.as_u16(),
                text
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl SimilarityIndex for DatabricksVectorIndex {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{}/serving-endpoints/{}/invocations",
            self.host, self.embedding_endpoint
        );
        let body: EmbeddingResponse = self
            .post(url, json!({ "input": [text] }))
            .await?
            .json()
            .await
            .map_err(|e| Error::Conversion(format!("Invalid embedding response: {}", e)))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::Conversion("Embedding response carried no vectors".to_string()))
    }

    async fn query_index(
        &self,
        vector: &[f32],
        columns: &[&str],
        k: usize,
    ) -> Result<Vec<SimilarityHit>> {
        let url = format!(
            "{}/api/2.0/vector-search/indexes/{}/query",
            self.host, self.index_name
        );
        let body: IndexQueryResponse = self
            .post(
                url,
                json!({
                    "query_vector": vector,
                    "columns": columns,
                    "num_results": k,
                }),
            )
            .await?
            .json()
            .await
            .map_err(|e| Error::Conversion(format!("Invalid index response: {}", e)))?;

        let names: Vec<String> = body
            .manifest
            .map(|m| m.columns.into_iter().map(|c| c.name).collect())
            .unwrap_or_else(|| columns.iter().map(|c| c.to_string()).collect());

        let hits = body
            .result
            .map(|r| r.data_array)
            .unwrap_or_default()
            .into_iter()
            .map(|row| {
                let record: Record = names.iter().cloned().zip(row).collect();
                let score = record.f64(SCORE_COLUMN).unwrap_or(DEFAULT_SCORE);
                SimilarityHit { record, score }
            })
            .collect();

        Ok(hits)
    }
}
