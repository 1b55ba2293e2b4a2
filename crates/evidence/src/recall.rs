//! Keyword recall evaluator
//!
//! Measures the production keyword-retrieval path against an
//! independently computed ground truth: a plain substring scan over the
//! corpus node text supplied by the caller. The two deliberately use
//! different matching algorithms, so recall reflects real coverage
//! instead of echoing the index implementation.
//!
//! Anomalies (empty ground truth, empty hit set, capped recall) are
//! expected operating conditions reported as structured fields, never
//! errors.

use std::collections::BTreeSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use lexforge_common::config::RecallConfig;
use lexforge_common::metrics::record_recall;

/// Matching mode recorded on every metric row
const GT_MODE: &str = "substring";

/// One corpus node within the knowledge-base scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusNode {
    pub node_id: String,
    pub text: String,
}

/// Keyword-stage output for one keyword: the node ids the retrieval
/// engine returned
#[derive(Debug, Clone)]
pub struct KeywordHits {
    pub keyword: String,
    pub hit_node_ids: Vec<String>,
}

/// Recall/precision metrics for one keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRecallMetrics {
    pub keyword: String,
    /// Ground-truth matching mode ("substring")
    pub gt_mode: String,
    /// Top-k the keyword stage was configured with
    pub keyword_top_k: usize,
    pub gt_total: usize,
    pub kw_total: usize,
    pub overlap: usize,
    /// `|GT ∩ KW| / |GT|`; 1.0 when GT is empty (vacuously complete)
    pub recall: f64,
    /// `|GT ∩ KW| / |KW|`; None whenever KW is empty
    pub precision: Option<f64>,
    /// True when top-k truncation, not matching, explains missed ground truth
    pub capped: bool,
    /// Bounded sorted preview of GT − KW
    pub missing_sample: Vec<String>,
    /// Bounded sorted preview of KW − GT
    pub extra_sample: Vec<String>,
}

/// Timing breakdown for a multi-keyword evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallTiming {
    pub total_ms: f64,
    pub gt_ms: f64,
}

/// Evaluation context echoed back for display and audit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallReportMeta {
    pub raw_query: String,
    pub keywords_n: usize,
}

/// Multi-keyword recall evaluation report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallReport {
    pub metrics: Vec<KeywordRecallMetrics>,
    pub timing_ms: RecallTiming,
    pub meta: RecallReportMeta,
}

/// Trim and collapse internal whitespace
pub fn normalize_keyword(keyword: &str) -> String {
    keyword.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ground truth: node ids whose raw text contains the keyword as a
/// literal substring.
pub fn ground_truth_nodes(
    corpus: &[CorpusNode],
    keyword: &str,
    case_sensitive: bool,
) -> BTreeSet<String> {
    let keyword = normalize_keyword(keyword);
    if keyword.is_empty() {
        return BTreeSet::new();
    }

    let needle = if case_sensitive {
        keyword
    } else {
        keyword.to_lowercase()
    };

    corpus
        .iter()
        .filter(|node| {
            if case_sensitive {
                node.text.contains(&needle)
            } else {
                node.text.to_lowercase().contains(&needle)
            }
        })
        .map(|node| node.node_id.clone())
        .collect()
}

fn sample(sorted_ids: impl Iterator<Item = String>, n: usize) -> Vec<String> {
    sorted_ids.take(n).collect()
}

/// Evaluate one keyword's retrieval hits against the substring ground truth.
pub fn evaluate_recall(
    corpus: &[CorpusNode],
    keyword: &str,
    keyword_hit_node_ids: &[String],
    config: &RecallConfig,
) -> KeywordRecallMetrics {
    let keyword = normalize_keyword(keyword);
    let gt_nodes = ground_truth_nodes(corpus, &keyword, config.case_sensitive);
    let kw_nodes: BTreeSet<String> = keyword_hit_node_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    let gt_total = gt_nodes.len();
    let kw_total = kw_nodes.len();
    let overlap = gt_nodes.intersection(&kw_nodes).count();

    let recall = if gt_total == 0 {
        1.0
    } else {
        overlap as f64 / gt_total as f64
    };
    let precision = if kw_total == 0 {
        None
    } else {
        Some(overlap as f64 / kw_total as f64)
    };
    let capped = kw_total >= config.keyword_top_k && gt_total > kw_total;

    // Set differences over BTreeSets iterate in sorted order
    let missing_sample = sample(gt_nodes.difference(&kw_nodes).cloned(), config.sample_n);
    let extra_sample = sample(kw_nodes.difference(&gt_nodes).cloned(), config.sample_n);

    KeywordRecallMetrics {
        keyword,
        gt_mode: GT_MODE.to_string(),
        keyword_top_k: config.keyword_top_k,
        gt_total,
        kw_total,
        overlap,
        recall,
        precision,
        capped,
        missing_sample,
        extra_sample,
    }
}

/// Evaluate a keyword list, deduplicating normalized keywords while
/// preserving first-seen order, and report per-phase timing.
pub fn evaluate_keyword_set(
    corpus: &[CorpusNode],
    raw_query: &str,
    requests: &[KeywordHits],
    config: &RecallConfig,
) -> RecallReport {
    let started = Instant::now();
    let mut gt_ms = 0.0f64;
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut metrics: Vec<KeywordRecallMetrics> = Vec::new();

    for request in requests {
        let keyword = normalize_keyword(&request.keyword);
        if keyword.is_empty() || seen.contains(&keyword) {
            continue;
        }
        seen.insert(keyword.clone());

        let gt_started = Instant::now();
        let metric = evaluate_recall(corpus, &keyword, &request.hit_node_ids, config);
        gt_ms += gt_started.elapsed().as_secs_f64() * 1000.0;
        metrics.push(metric);
    }

    let keywords_n = metrics.len();
    debug!(
        raw_query,
        keywords_n,
        corpus_nodes = corpus.len(),
        "Keyword recall evaluated"
    );
    record_recall(keywords_n);

    RecallReport {
        metrics,
        timing_ms: RecallTiming {
            total_ms: started.elapsed().as_secs_f64() * 1000.0,
            gt_ms,
        },
        meta: RecallReportMeta {
            raw_query: raw_query.to_string(),
            keywords_n,
        },
    }
}
