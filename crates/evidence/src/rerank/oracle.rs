//! Rerank oracle adapters
//!
//! The engine depends only on the `RerankOracle` interface: one call,
//! `(query, texts) -> scores`. Each concrete adapter handles its own
//! construction-parameter mapping internally, so swapping oracle backends
//! never touches the engine.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lexforge_common::config::RerankConfig;
use lexforge_common::errors::{AppError, Result};
use lexforge_common::DEFAULT_RERANK_MODEL;

use super::RerankStrategy;

/// External relevance scorer: given a query and a list of texts, return
/// one score per text, in input order.
#[async_trait]
pub trait RerankOracle: Send + Sync {
    /// Score each text for relevance to the query.
    ///
    /// The returned vector must have the same length and order as `texts`.
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f64>>;

    /// Model identifier recorded in score details
    fn model_name(&self) -> &str;
}

/// Builds an oracle for a strategy; the engine treats any failure here as
/// a reason to fall back to deterministic score ordering.
pub trait OracleProvider: Send + Sync {
    fn build(&self, strategy: RerankStrategy, model: Option<&str>) -> Result<Arc<dyn RerankOracle>>;
}

#[derive(Serialize)]
struct RerankApiRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct RerankApiResponse {
    results: Vec<RerankApiResult>,
}

#[derive(Deserialize)]
struct RerankApiResult {
    index: usize,
    relevance_score: f64,
}

/// HTTP client for rerank endpoints speaking the common rerank API shape
/// (`{model, query, documents}` -> `{results: [{index, relevance_score}]}`),
/// which covers cross-encoder servers and LLM rerank gateways alike.
pub struct HttpRerankClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpRerankClient {
    /// Cross-encoder adapter; defaults to the standard reranker model.
    pub fn cross_encoder(config: &RerankConfig, model: Option<&str>) -> Result<Self> {
        Self::build(config, model.unwrap_or(DEFAULT_RERANK_MODEL))
    }

    /// LLM rerank adapter; the model id identifies the LLM deployment.
    pub fn llm(config: &RerankConfig, model: Option<&str>) -> Result<Self> {
        Self::build(config, model.unwrap_or("llm"))
    }

    fn build(config: &RerankConfig, model: &str) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "rerank oracle endpoint is not configured".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to create rerank HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            model: model.to_string(),
        })
    }

    async fn request(&self, query: &str, texts: &[String]) -> Result<Vec<f64>> {
        let payload = RerankApiRequest {
            model: &self.model,
            query,
            documents: texts,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| AppError::OracleError {
            message: format!("rerank request failed: {e}"),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::OracleError {
                message: format!("rerank API error {status}: {body}"),
            });
        }

        let parsed: RerankApiResponse =
            response.json().await.map_err(|e| AppError::OracleError {
                message: format!("failed to parse rerank response: {e}"),
            })?;

        // Responses index into the request's document list; every input
        // must come back scored exactly once.
        let mut scores: Vec<Option<f64>> = vec![None; texts.len()];
        for result in parsed.results {
            let slot = scores
                .get_mut(result.index)
                .ok_or_else(|| AppError::OracleError {
                    message: format!("rerank result index {} out of range", result.index),
                })?;
            *slot = Some(result.relevance_score);
        }
        scores
            .into_iter()
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| AppError::OracleError {
                message: "rerank response left documents unscored".to_string(),
            })
    }
}

#[async_trait]
impl RerankOracle for HttpRerankClient {
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f64>> {
        self.request(query, texts).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Default provider: builds `HttpRerankClient` adapters from shared
/// rerank configuration.
pub struct HttpOracleProvider {
    config: RerankConfig,
}

impl HttpOracleProvider {
    pub fn new(config: RerankConfig) -> Self {
        Self { config }
    }
}

impl OracleProvider for HttpOracleProvider {
    fn build(&self, strategy: RerankStrategy, model: Option<&str>) -> Result<Arc<dyn RerankOracle>> {
        match strategy {
            RerankStrategy::CrossEncoder => Ok(Arc::new(HttpRerankClient::cross_encoder(
                &self.config,
                model,
            )?)),
            RerankStrategy::Llm => Ok(Arc::new(HttpRerankClient::llm(&self.config, model)?)),
            RerankStrategy::None => Err(AppError::Configuration {
                message: "strategy none does not use an oracle".to_string(),
            }),
        }
    }
}
