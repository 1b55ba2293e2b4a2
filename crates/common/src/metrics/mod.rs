//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions. Exporter wiring is the
//! host service's responsibility.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all LexForge metrics
pub const METRICS_PREFIX: &str = "lexforge";

/// Histogram buckets for rerank oracle round-trips (in seconds).
/// Cross-encoder servers typically answer well under a second; LLM
/// rerank endpoints can take several.
pub const RERANK_BUCKETS: &[f64] = &[
    0.010, // 10ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Rerank metrics
    describe_counter!(
        format!("{}_rerank_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total rerank invocations"
    );

    describe_counter!(
        format!("{}_rerank_fallbacks_total", METRICS_PREFIX),
        Unit::Count,
        "Rerank invocations resolved by deterministic fallback"
    );

    describe_histogram!(
        format!("{}_rerank_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Rerank invocation latency in seconds"
    );

    // Evidence grouping metrics
    describe_counter!(
        format!("{}_evidence_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Evidence hits seen by the grouping engine"
    );

    describe_gauge!(
        format!("{}_evidence_hits_used", METRICS_PREFIX),
        Unit::Count,
        "Evidence hits placed into the last grouping tree"
    );

    // Replay metrics
    describe_counter!(
        format!("{}_replay_checks_total", METRICS_PREFIX),
        Unit::Count,
        "Citation replay verifications"
    );

    // Recall evaluator metrics
    describe_counter!(
        format!("{}_recall_evaluations_total", METRICS_PREFIX),
        Unit::Count,
        "Keyword recall evaluations"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record rerank metrics
pub fn record_rerank(duration_secs: f64, strategy: &str, fallback: bool, result_count: usize) {
    counter!(
        format!("{}_rerank_requests_total", METRICS_PREFIX),
        "strategy" => strategy.to_string()
    )
    .increment(1);

    if fallback {
        counter!(
            format!("{}_rerank_fallbacks_total", METRICS_PREFIX),
            "strategy" => strategy.to_string()
        )
        .increment(1);
    }

    histogram!(
        format!("{}_rerank_duration_seconds", METRICS_PREFIX),
        "strategy" => strategy.to_string()
    )
    .record(duration_secs);

    gauge!(format!("{}_rerank_results_count", METRICS_PREFIX)).set(result_count as f64);
}

/// Helper to record evidence grouping metrics
pub fn record_grouping(hits_in: usize, hits_used: usize) {
    counter!(format!("{}_evidence_hits_total", METRICS_PREFIX)).increment(hits_in as u64);
    gauge!(format!("{}_evidence_hits_used", METRICS_PREFIX)).set(hits_used as f64);
}

/// Helper to record citation replay metrics
pub fn record_replay(verified: bool) {
    let outcome = if verified { "verified" } else { "failed" };
    counter!(
        format!("{}_replay_checks_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Helper to record recall evaluation metrics
pub fn record_recall(keywords_n: usize) {
    counter!(format!("{}_recall_evaluations_total", METRICS_PREFIX)).increment(keywords_n as u64);
}
