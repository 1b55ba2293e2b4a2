//! LexForge Evidence Core
//!
//! The evidence fusion, reranking, grouping, and offset-replay subsystem:
//! - Shared candidate model flowing through all retrieval stages
//! - Rerank engine with interchangeable strategies and deterministic fallback
//! - Evidence grouping with presentation caps and audit statistics
//! - Page locator index for absolute -> page-local offset conversion
//! - Keyword recall evaluator against an independent ground truth
//! - Citation replay verification
//!
//! Every component is a stateless, reentrant computation over
//! already-materialized inputs; the only suspension point is the rerank
//! oracle round-trip. Correctness here is replayable: document/page/offset
//! alignment, coverage counters, and tie-breaking are all deterministic
//! and checked byte-for-byte by the tests.

pub mod candidate;
pub mod grouping;
pub mod locator;
pub mod pipeline;
pub mod recall;
pub mod replay;
pub mod rerank;

// Re-export the shapes most callers need
pub use candidate::{Candidate, RawHit, Stage};
pub use grouping::{group_evidence_hits, GroupedEvidence, GroupingCaps, GroupingStats, PageKey};
pub use locator::PageLocator;
pub use pipeline::{EvidenceBundle, EvidenceGateDecision, EvidencePipeline};
pub use recall::{evaluate_keyword_set, evaluate_recall, CorpusNode, KeywordHits, KeywordRecallMetrics};
pub use replay::{verify_citation, Citation, ReplayFailure, ReplayReport};
pub use rerank::{HttpOracleProvider, OracleProvider, RerankEngine, RerankOracle, RerankStrategy};
