//! Evidence pipeline snapshot
//!
//! Runs reranking and grouping for one query and captures the result as
//! an auditable bundle: record id, timing, the ordered candidates used to
//! build generation context, the capped grouping shown to the UI, and a
//! minimal gate decision. The service layer persists and routes bundles;
//! this module only assembles them.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::candidate::{Candidate, RawHit};
use crate::grouping::{group_evidence_hits, GroupedEvidence, GroupingCaps};
use crate::rerank::RerankEngine;

/// Whether the evidence supports continuing to generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceGateDecision {
    pub passed: bool,
    pub reasons: Vec<String>,
}

/// Per-phase timing in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTimings {
    pub total_ms: f64,
    pub rerank_ms: f64,
    pub grouping_ms: f64,
}

/// Reusable snapshot of one evidence pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub record_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub query: String,
    /// Ordered candidates used to build generation context
    pub reranked: Vec<Candidate>,
    /// Capped grouping for presentation and debugging
    pub grouped: GroupedEvidence,
    pub hits_count: usize,
    pub timing_ms: PhaseTimings,
    pub gate: EvidenceGateDecision,
}

fn evaluate_gate(hits_count: usize) -> EvidenceGateDecision {
    if hits_count == 0 {
        return EvidenceGateDecision {
            passed: false,
            reasons: vec!["no_evidence".to_string()],
        };
    }
    EvidenceGateDecision {
        passed: true,
        reasons: Vec::new(),
    }
}

/// Rerank + grouping over one query's materialized hits
pub struct EvidencePipeline {
    engine: RerankEngine,
    caps: GroupingCaps,
}

impl EvidencePipeline {
    pub fn new(engine: RerankEngine, caps: GroupingCaps) -> Self {
        Self { engine, caps }
    }

    pub async fn run(
        &self,
        query: &str,
        candidates: &[Candidate],
        hits: &[RawHit],
        strategy: &str,
        top_k: usize,
        model: Option<&str>,
    ) -> EvidenceBundle {
        let started = Instant::now();

        let rerank_started = Instant::now();
        let reranked = self
            .engine
            .rerank(query, candidates, strategy, top_k, model)
            .await;
        let rerank_ms = rerank_started.elapsed().as_secs_f64() * 1000.0;

        let grouping_started = Instant::now();
        let grouped = group_evidence_hits(hits, &self.caps);
        let grouping_ms = grouping_started.elapsed().as_secs_f64() * 1000.0;

        let hits_count = reranked.len();
        let gate = evaluate_gate(hits_count);
        let record_id = Uuid::new_v4();

        info!(
            record_id = %record_id,
            hits_count,
            gate_passed = gate.passed,
            "Evidence bundle assembled"
        );

        EvidenceBundle {
            record_id,
            created_at: Utc::now(),
            query: query.to_string(),
            reranked,
            grouped,
            hits_count,
            timing_ms: PhaseTimings {
                total_ms: started.elapsed().as_secs_f64() * 1000.0,
                rerank_ms,
                grouping_ms,
            },
            gate,
        }
    }
}
