//! Shared candidate model
//!
//! A `Candidate` is one scored passage at one pipeline stage. Stages
//! construct fresh candidates from their inputs; transformations copy
//! rather than mutate, so a node can appear once per stage with
//! stage-local scores and provenance.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Pipeline phase that produced a candidate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Keyword (full-text) retrieval
    Keyword,
    /// Vector similarity retrieval
    Vector,
    /// Merged keyword + vector results
    Fused,
    /// Output of the rerank engine
    Reranked,
}

impl Stage {
    /// Stage name as recorded in score details and hit snapshots
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Keyword => "keyword",
            Stage::Vector => "vector",
            Stage::Fused => "fused",
            Stage::Reranked => "reranked",
        }
    }
}

/// Meta keys scanned, in order, for rerankable text when `excerpt` is blank
pub const TEXT_KEYS: [&str; 6] = [
    "text",
    "content",
    "node_text",
    "chunk_text",
    "raw_text",
    "page_text",
];

/// One retrieval result at one pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Stable cross-stage identity of the passage
    pub node_id: String,

    /// Stage that produced this instance
    pub stage: Stage,

    /// Stage-local relevance; not comparable across stages
    pub score: f64,

    /// Per-signal sub-scores and rerank bookkeeping
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub score_details: Map<String, Value>,

    /// Best-effort display text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,

    /// Source page, 1-based; `None` means unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Start of the half-open char range into page-local text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_offset: Option<usize>,

    /// End of the half-open char range into page-local text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_offset: Option<usize>,

    /// Free-form passthrough (document id, file id, raw text fallbacks)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl Candidate {
    /// Create a candidate with the mandatory fields only
    pub fn new(node_id: impl Into<String>, stage: Stage, score: f64) -> Self {
        Self {
            node_id: node_id.into(),
            stage,
            score,
            score_details: Map::new(),
            excerpt: None,
            page: None,
            start_offset: None,
            end_offset: None,
            meta: Map::new(),
        }
    }

    /// Text used for reranking: `excerpt` first, then the fixed meta keys.
    ///
    /// Returns `None` when the candidate has no usable text; such
    /// candidates are excluded from the oracle call but still appear in
    /// the rerank output via the score-sort merge.
    pub fn rerank_text(&self) -> Option<&str> {
        if let Some(excerpt) = self.excerpt.as_deref() {
            if !excerpt.trim().is_empty() {
                return Some(excerpt);
            }
        }
        for key in TEXT_KEYS {
            if let Some(Value::String(text)) = self.meta.get(key) {
                if !text.trim().is_empty() {
                    return Some(text);
                }
            }
        }
        None
    }
}

/// Looser hit shape used for evidence presentation.
///
/// Unlike `Candidate`, identity fields are optional here: upstream data is
/// expected to be partial, and the grouping engine drops-and-counts hits
/// missing `node_id` or `document_id` instead of erroring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHit {
    #[serde(default)]
    pub node_id: Option<String>,

    #[serde(default)]
    pub document_id: Option<String>,

    /// Source page, 1-based; `None` buckets under the unknown page key
    #[serde(default)]
    pub page: Option<u32>,

    /// Retrieval source this hit came from (stage name)
    pub source: String,

    #[serde(default)]
    pub file_id: Option<String>,

    #[serde(default)]
    pub score: Option<f64>,

    #[serde(default)]
    pub excerpt: Option<String>,
}

impl RawHit {
    /// Build a presentation hit from a candidate, reading the document and
    /// file ids out of the candidate's meta passthrough.
    pub fn from_candidate(candidate: &Candidate) -> Self {
        let meta_str = |key: &str| {
            candidate
                .meta
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            node_id: Some(candidate.node_id.clone()),
            document_id: meta_str("document_id"),
            page: candidate.page,
            source: candidate.stage.as_str().to_string(),
            file_id: meta_str("file_id"),
            score: Some(candidate.score),
            excerpt: candidate.excerpt.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_serde_is_snake_case() {
        assert_eq!(serde_json::to_string(&Stage::Reranked).expect("ser"), "\"reranked\"");
        let stage: Stage = serde_json::from_str("\"keyword\"").expect("de");
        assert_eq!(stage, Stage::Keyword);
        assert_eq!(stage.as_str(), "keyword");
    }

    #[test]
    fn test_rerank_text_prefers_excerpt() {
        let mut candidate = Candidate::new("n1", Stage::Fused, 0.5);
        candidate.excerpt = Some("Article 12 applies.".to_string());
        candidate
            .meta
            .insert("text".to_string(), json!("meta text"));
        assert_eq!(candidate.rerank_text(), Some("Article 12 applies."));
    }

    #[test]
    fn test_rerank_text_blank_excerpt_falls_back_to_meta() {
        let mut candidate = Candidate::new("n1", Stage::Fused, 0.5);
        candidate.excerpt = Some("   ".to_string());
        // "content" outranks "raw_text" in the scan order
        candidate
            .meta
            .insert("raw_text".to_string(), json!("later key"));
        candidate
            .meta
            .insert("content".to_string(), json!("earlier key"));
        assert_eq!(candidate.rerank_text(), Some("earlier key"));
    }

    #[test]
    fn test_rerank_text_ignores_non_string_meta() {
        let mut candidate = Candidate::new("n1", Stage::Fused, 0.5);
        candidate.meta.insert("text".to_string(), json!(42));
        candidate
            .meta
            .insert("node_text".to_string(), json!("usable"));
        assert_eq!(candidate.rerank_text(), Some("usable"));
    }

    #[test]
    fn test_rerank_text_none_when_blank_everywhere() {
        let mut candidate = Candidate::new("n1", Stage::Fused, 0.5);
        candidate.meta.insert("text".to_string(), json!(""));
        assert_eq!(candidate.rerank_text(), None);
    }

    #[test]
    fn test_raw_hit_from_candidate() {
        let mut candidate = Candidate::new("n7", Stage::Keyword, 1.25);
        candidate.page = Some(3);
        candidate
            .meta
            .insert("document_id".to_string(), json!("doc1"));
        candidate.meta.insert("file_id".to_string(), json!("f1"));

        let hit = RawHit::from_candidate(&candidate);
        assert_eq!(hit.node_id.as_deref(), Some("n7"));
        assert_eq!(hit.document_id.as_deref(), Some("doc1"));
        assert_eq!(hit.file_id.as_deref(), Some("f1"));
        assert_eq!(hit.page, Some(3));
        assert_eq!(hit.source, "keyword");
        assert_eq!(hit.score, Some(1.25));
    }
}
