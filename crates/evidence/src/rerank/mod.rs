//! Rerank engine
//!
//! Reorders fused candidates under interchangeable strategies with a
//! deterministic score-sort fallback. The engine never fails for a
//! missing, misconfigured, slow, or broken oracle; it degrades to
//! `(-score, node_id)` ordering and records a machine-readable reason on
//! every output candidate.

mod oracle;

pub use oracle::{HttpOracleProvider, HttpRerankClient, OracleProvider, RerankOracle};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use lexforge_common::config::RerankConfig;
use lexforge_common::metrics::record_rerank;

use crate::candidate::{Candidate, Stage};

/// Rerank strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerankStrategy {
    /// Deterministic score ordering, no oracle
    None,
    /// LLM rerank endpoint
    Llm,
    /// Cross-encoder relevance scorer
    CrossEncoder,
}

impl RerankStrategy {
    /// Strategy name as recorded in score details
    pub fn as_str(&self) -> &'static str {
        match self {
            RerankStrategy::None => "none",
            RerankStrategy::Llm => "llm",
            RerankStrategy::CrossEncoder => "cross_encoder",
        }
    }

    /// Normalize a raw strategy string.
    ///
    /// Unknown values fall back to `None`; the second element flags that
    /// fallback. `bge_reranker` is accepted as a legacy alias for the
    /// cross-encoder strategy.
    pub fn normalize(raw: &str) -> (Self, bool) {
        match raw.trim().to_lowercase().as_str() {
            "none" => (RerankStrategy::None, false),
            "llm" => (RerankStrategy::Llm, false),
            "cross_encoder" | "bge_reranker" => (RerankStrategy::CrossEncoder, false),
            _ => (RerankStrategy::None, true),
        }
    }
}

/// Rerank engine: one oracle round-trip per invocation, bounded by a
/// caller-supplied timeout, with deterministic fallback ordering.
pub struct RerankEngine {
    provider: Option<Arc<dyn OracleProvider>>,
    timeout: Duration,
}

impl RerankEngine {
    pub fn new(provider: Arc<dyn OracleProvider>, timeout: Duration) -> Self {
        Self {
            provider: Some(provider),
            timeout,
        }
    }

    /// Engine for deployments with no rerank backend: every llm /
    /// cross_encoder request degrades to score ordering with
    /// `reranker_unavailable` recorded.
    pub fn without_oracle() -> Self {
        Self {
            provider: None,
            timeout: Duration::from_secs(10),
        }
    }

    /// Engine wired to the HTTP oracle provider from shared configuration.
    pub fn from_config(config: &RerankConfig) -> Self {
        let timeout = config.timeout();
        Self::new(Arc::new(HttpOracleProvider::new(config.clone())), timeout)
    }

    /// Rerank candidates and return at most `top_k` of them, stage
    /// `reranked`, each annotated with rerank bookkeeping in
    /// `score_details`.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: &[Candidate],
        strategy: &str,
        top_k: usize,
        model: Option<&str>,
    ) -> Vec<Candidate> {
        if top_k == 0 || candidates.is_empty() {
            return Vec::new();
        }
        let started = Instant::now();

        let (normalized, strategy_fallback) = RerankStrategy::normalize(strategy);
        if strategy_fallback {
            warn!(raw = strategy, "Unknown rerank strategy, using none");
        }

        if normalized == RerankStrategy::None {
            let out = apply_rerank_result(
                score_sorted(candidates.iter().enumerate()),
                &HashMap::new(),
                normalized,
                model.unwrap_or("none"),
                strategy_fallback,
                None,
                top_k,
            );
            record_rerank(started.elapsed().as_secs_f64(), normalized.as_str(), strategy_fallback, out.len());
            return out;
        }

        let Some(provider) = &self.provider else {
            return self.fallback(candidates, model, "reranker_unavailable", top_k, started);
        };

        let oracle = match provider.build(normalized, model) {
            Ok(oracle) => oracle,
            Err(e) => {
                let reason = format!("rerank_init_error:{}", e.kind());
                return self.fallback(candidates, model, &reason, top_k, started);
            }
        };

        // Extract rerankable text; candidates without any stay out of the
        // oracle call but re-enter through the merge below.
        let mut texts: Vec<String> = Vec::new();
        let mut text_idx: Vec<usize> = Vec::new();
        for (idx, candidate) in candidates.iter().enumerate() {
            if let Some(text) = candidate.rerank_text() {
                texts.push(text.to_string());
                text_idx.push(idx);
            }
        }
        if texts.is_empty() {
            return self.fallback(candidates, model, "rerank_no_text", top_k, started);
        }

        // Single round-trip, bounded; timeout is indistinguishable from an
        // unavailable oracle.
        let scored = tokio::time::timeout(self.timeout, oracle.score(query, &texts)).await;
        let oracle_scores = match scored {
            Err(_) => {
                return self.fallback(candidates, model, "rerank_timeout", top_k, started);
            }
            Ok(Err(e)) => {
                let reason = format!("rerank_oracle_error:{}", e.kind());
                return self.fallback(candidates, model, &reason, top_k, started);
            }
            Ok(Ok(scores)) if scores.len() != texts.len() => {
                return self.fallback(
                    candidates,
                    model,
                    "rerank_oracle_error:length_mismatch",
                    top_k,
                    started,
                );
            }
            Ok(Ok(scores)) => scores,
        };

        let scores: HashMap<usize, f64> = text_idx.into_iter().zip(oracle_scores).collect();

        // Oracle-covered candidates first, ordered by oracle score; the
        // uncovered remainder follows, ordered by original score.
        let mut covered: Vec<(usize, &Candidate)> = candidates
            .iter()
            .enumerate()
            .filter(|(idx, _)| scores.contains_key(idx))
            .collect();
        covered.sort_by(|a, b| {
            let score_a = scores[&a.0];
            let score_b = scores[&b.0];
            score_b
                .total_cmp(&score_a)
                .then_with(|| a.1.node_id.cmp(&b.1.node_id))
        });

        let remaining = score_sorted(
            candidates
                .iter()
                .enumerate()
                .filter(|(idx, _)| !scores.contains_key(idx)),
        );

        let mut ordered = covered;
        ordered.extend(remaining);

        let model_name = model.unwrap_or_else(|| oracle.model_name());
        let out = apply_rerank_result(
            ordered,
            &scores,
            normalized,
            model_name,
            strategy_fallback,
            None,
            top_k,
        );
        debug!(
            strategy = normalized.as_str(),
            candidates = candidates.len(),
            scored = scores.len(),
            returned = out.len(),
            "Rerank applied"
        );
        record_rerank(started.elapsed().as_secs_f64(), normalized.as_str(), strategy_fallback, out.len());
        out
    }

    /// Degraded path: deterministic score ordering, strategy recorded as
    /// `none`, with the reason attached to every output candidate.
    fn fallback(
        &self,
        candidates: &[Candidate],
        model: Option<&str>,
        reason: &str,
        top_k: usize,
        started: Instant,
    ) -> Vec<Candidate> {
        warn!(reason, "Rerank degraded to deterministic score ordering");
        let out = apply_rerank_result(
            score_sorted(candidates.iter().enumerate()),
            &HashMap::new(),
            RerankStrategy::None,
            model.unwrap_or("none"),
            true,
            Some(reason),
            top_k,
        );
        record_rerank(started.elapsed().as_secs_f64(), "none", true, out.len());
        out
    }
}

/// Sort by score descending, node id ascending as the deterministic
/// tie-break.
fn score_sorted<'a>(
    candidates: impl Iterator<Item = (usize, &'a Candidate)>,
) -> Vec<(usize, &'a Candidate)> {
    let mut ordered: Vec<(usize, &'a Candidate)> = candidates.collect();
    ordered.sort_by(|a, b| {
        b.1.score
            .total_cmp(&a.1.score)
            .then_with(|| a.1.node_id.cmp(&b.1.node_id))
    });
    ordered
}

/// Materialize the ordered result: fresh `reranked`-stage candidates with
/// rerank bookkeeping merged into their score details, truncated to
/// `top_k`.
fn apply_rerank_result(
    ordered: Vec<(usize, &Candidate)>,
    scores: &HashMap<usize, f64>,
    strategy: RerankStrategy,
    model: &str,
    fallback: bool,
    fallback_reason: Option<&str>,
    top_k: usize,
) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = Vec::with_capacity(top_k.min(ordered.len()));

    for (idx, candidate) in ordered {
        if out.len() >= top_k {
            break;
        }
        let oracle_score = scores.get(&idx).copied();
        let applied = oracle_score.is_some();
        let score = oracle_score.unwrap_or(candidate.score);

        let mut details = candidate.score_details.clone();
        details.insert("rerank_applied".to_string(), Value::Bool(applied));
        details.insert(
            "rerank_score".to_string(),
            oracle_score.map(Value::from).unwrap_or(Value::Null),
        );
        details.insert(
            "rerank_strategy".to_string(),
            Value::String(strategy.as_str().to_string()),
        );
        details.insert("rerank_model".to_string(), Value::String(model.to_string()));
        details.insert("rerank_rank".to_string(), Value::from(out.len() as u64 + 1));
        details.insert("rerank_fallback".to_string(), Value::Bool(fallback));
        details.insert(
            "rerank_fallback_reason".to_string(),
            fallback_reason
                .map(|r| Value::String(r.to_string()))
                .unwrap_or(Value::Null),
        );

        out.push(Candidate {
            node_id: candidate.node_id.clone(),
            stage: Stage::Reranked,
            score,
            score_details: details,
            excerpt: candidate.excerpt.clone(),
            page: candidate.page,
            start_offset: candidate.start_offset,
            end_offset: candidate.end_offset,
            meta: candidate.meta.clone(),
        });
    }

    out
}
