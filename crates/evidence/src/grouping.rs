//! Evidence grouping engine
//!
//! Collapses a flat multi-source hit list into a capped, nested tree keyed
//! by source -> document -> page, carrying audit counters instead of
//! passage text. Caps are order-sensitive: admission is strictly
//! first-seen over the input sequence, so the same hits in a different
//! order can produce a different (but equally deterministic) tree.
//!
//! The output is an index over identifiers only. Excerpt/content text must
//! never appear in it; downstream consumers rely on that to avoid leaking
//! ungated text.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use lexforge_common::config::EvidenceCaps;
use lexforge_common::metrics::record_grouping;

use crate::candidate::RawHit;

/// Bucket key for one page of a document.
///
/// Numbered pages sort ascending and the unknown bucket sorts last; the
/// serialized form is the stringified page number, or `"_"` for unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PageKey {
    Page(u32),
    Unknown,
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageKey::Page(n) => write!(f, "{n}"),
            PageKey::Unknown => write!(f, "_"),
        }
    }
}

impl Serialize for PageKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PageKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PageKeyVisitor;

        impl Visitor<'_> for PageKeyVisitor {
            type Value = PageKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a page number string or \"_\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<PageKey, E> {
                if value == "_" {
                    return Ok(PageKey::Unknown);
                }
                value
                    .parse::<u32>()
                    .map(PageKey::Page)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(value), &self))
            }
        }

        deserializer.deserialize_str(PageKeyVisitor)
    }
}

/// Caps applied while grouping
#[derive(Debug, Clone, Copy)]
pub struct GroupingCaps {
    /// Distinct documents admitted, in first-seen order
    pub max_documents: usize,
    /// Nodes admitted per (source, document) pair across all its pages
    pub max_nodes_per_document: usize,
    /// Distinct page buckets opened per (source, document) pair;
    /// the unknown bucket consumes a slot like any numbered page
    pub max_pages_per_document: usize,
}

impl Default for GroupingCaps {
    fn default() -> Self {
        Self::from(&EvidenceCaps::default())
    }
}

impl From<&EvidenceCaps> for GroupingCaps {
    fn from(caps: &EvidenceCaps) -> Self {
        Self {
            max_documents: caps.max_documents,
            max_nodes_per_document: caps.max_nodes_per_document,
            max_pages_per_document: caps.max_pages_per_document,
        }
    }
}

/// Audit counters reported with every grouping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingStats {
    /// Count of the original input
    pub total_hits_in: usize,
    /// Hits actually placed into the tree
    pub total_hits_used: usize,
    /// Hits dropped for a blank/absent node id
    pub dropped_missing_node_id: usize,
    /// Hits dropped for a blank/absent document id
    pub dropped_missing_document_id: usize,
    /// Document-admitted hits carrying no page number
    pub unknown_page_count: usize,
    /// In-bucket repeats of a node id (skipped, not re-emitted)
    pub deduped_node_count: usize,
}

/// Page buckets of one document under one source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentEvidence {
    pub pages: BTreeMap<PageKey, Vec<String>>,
}

/// Documents grouped under one retrieval source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceEvidence {
    pub by_document: BTreeMap<String, DocumentEvidence>,
}

/// Audit block attached to the grouping output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceMeta {
    pub stats: GroupingStats,
}

/// Capped, nested, audit-stat-bearing grouping of evidence hits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedEvidence {
    /// Admitted documents in first-seen order (not relevance order)
    pub document_ids: Vec<String>,
    pub by_source: BTreeMap<String, SourceEvidence>,
    pub meta: EvidenceMeta,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Group hits into a capped source/document/page tree.
///
/// Processing order per hit: identity checks (node id before document id),
/// document admission, page bucketing, in-bucket dedup, node cap, page
/// cap. Hits dropped by caps are reflected only in the difference between
/// `total_hits_in` and the other counters.
pub fn group_evidence_hits(hits: &[RawHit], caps: &GroupingCaps) -> GroupedEvidence {
    let mut out = GroupedEvidence::default();
    out.meta.stats.total_hits_in = hits.len();
    let stats = &mut out.meta.stats;

    // Admission set mirrors document_ids; HashSet for the membership test
    let mut admitted: HashSet<String> = HashSet::new();
    // Admitted node count per (source, document) pair
    let mut pair_nodes: HashMap<(String, String), usize> = HashMap::new();

    for hit in hits {
        let Some(node_id) = non_blank(&hit.node_id) else {
            stats.dropped_missing_node_id += 1;
            continue;
        };
        let Some(document_id) = non_blank(&hit.document_id) else {
            stats.dropped_missing_document_id += 1;
            continue;
        };

        // First max_documents distinct ids are admitted, in first-seen
        // order; hits for later-seen documents stay in total_hits_in only.
        if !admitted.contains(document_id) {
            if admitted.len() >= caps.max_documents {
                continue;
            }
            admitted.insert(document_id.to_string());
            out.document_ids.push(document_id.to_string());
        }

        let page_key = match hit.page {
            Some(page) => PageKey::Page(page),
            None => {
                stats.unknown_page_count += 1;
                PageKey::Unknown
            }
        };

        let pair = (hit.source.clone(), document_id.to_string());
        let nodes_in_pair = pair_nodes.get(&pair).copied().unwrap_or(0);

        let (is_dup, bucket_exists, open_pages) = match out
            .by_source
            .get(&hit.source)
            .and_then(|source| source.by_document.get(document_id))
        {
            Some(doc) => match doc.pages.get(&page_key) {
                Some(bucket) => (bucket.iter().any(|n| n == node_id), true, doc.pages.len()),
                None => (false, false, doc.pages.len()),
            },
            None => (false, false, 0),
        };

        if is_dup {
            stats.deduped_node_count += 1;
            continue;
        }
        if nodes_in_pair >= caps.max_nodes_per_document {
            continue;
        }
        if !bucket_exists && open_pages >= caps.max_pages_per_document {
            continue;
        }

        out.by_source
            .entry(hit.source.clone())
            .or_default()
            .by_document
            .entry(document_id.to_string())
            .or_default()
            .pages
            .entry(page_key)
            .or_default()
            .push(node_id.to_string());
        pair_nodes.insert(pair, nodes_in_pair + 1);
        stats.total_hits_used += 1;
    }

    debug!(
        total_hits_in = out.meta.stats.total_hits_in,
        total_hits_used = out.meta.stats.total_hits_used,
        dropped_missing_node_id = out.meta.stats.dropped_missing_node_id,
        dropped_missing_document_id = out.meta.stats.dropped_missing_document_id,
        unknown_page_count = out.meta.stats.unknown_page_count,
        deduped_node_count = out.meta.stats.deduped_node_count,
        documents = out.document_ids.len(),
        "Evidence grouped"
    );
    record_grouping(out.meta.stats.total_hits_in, out.meta.stats.total_hits_used);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn hit(node_id: &str, document_id: &str, page: Option<u32>, source: &str) -> RawHit {
        RawHit {
            node_id: (!node_id.is_empty()).then(|| node_id.to_string()),
            document_id: (!document_id.is_empty()).then(|| document_id.to_string()),
            page,
            source: source.to_string(),
            file_id: None,
            score: None,
            excerpt: None,
        }
    }

    /// 12 hits across 3 documents and 2 sources: one missing document id,
    /// one missing node id, one unknown page, one in-bucket duplicate.
    fn fixture_hits() -> Vec<RawHit> {
        vec![
            hit("n1", "doc1", Some(1), "keyword"),
            hit("n2", "doc1", Some(1), "keyword"),
            hit("n2", "doc1", Some(1), "keyword"),
            hit("n3", "doc1", Some(2), "keyword"),
            hit("n8", "doc1", None, "keyword"),
            hit("n9", "doc1", Some(2), "keyword"),
            hit("n4", "doc2", Some(1), "reranked"),
            hit("n5", "doc2", Some(2), "reranked"),
            hit("n6", "doc2", Some(3), "reranked"),
            hit("n7", "doc3", Some(1), "keyword"),
            hit("n_missing_doc", "", Some(1), "keyword"),
            hit("", "doc1", Some(1), "keyword"),
        ]
    }

    fn fixture_caps() -> GroupingCaps {
        GroupingCaps {
            max_documents: 2,
            max_nodes_per_document: 4,
            max_pages_per_document: 2,
        }
    }

    fn pages<'a>(
        evidence: &'a GroupedEvidence,
        source: &str,
        document: &str,
    ) -> &'a BTreeMap<PageKey, Vec<String>> {
        &evidence.by_source[source].by_document[document].pages
    }

    #[test]
    fn test_fixture_document_admission_and_stats() {
        let evidence = group_evidence_hits(&fixture_hits(), &fixture_caps());

        assert_eq!(evidence.document_ids, vec!["doc1", "doc2"]);
        assert!(!evidence.by_source["keyword"].by_document.contains_key("doc3"));
        assert_eq!(
            evidence.meta.stats,
            GroupingStats {
                total_hits_in: 12,
                total_hits_used: 6,
                dropped_missing_node_id: 1,
                dropped_missing_document_id: 1,
                unknown_page_count: 1,
                deduped_node_count: 1,
            }
        );
    }

    #[test]
    fn test_fixture_buckets() {
        let evidence = group_evidence_hits(&fixture_hits(), &fixture_caps());

        let doc1 = pages(&evidence, "keyword", "doc1");
        assert_eq!(doc1[&PageKey::Page(1)], vec!["n1", "n2"]);
        // The unknown-page hit for doc1 arrives after two numbered pages
        // are open, so it consumes no slot; n9 still fits under the node cap.
        assert_eq!(doc1[&PageKey::Page(2)], vec!["n3", "n9"]);
        assert!(!doc1.contains_key(&PageKey::Unknown));
        assert_eq!(doc1.len(), 2);

        let doc2 = pages(&evidence, "reranked", "doc2");
        assert_eq!(doc2[&PageKey::Page(1)], vec!["n4"]);
        assert_eq!(doc2[&PageKey::Page(2)], vec!["n5"]);
        assert!(!doc2.contains_key(&PageKey::Page(3)));
    }

    #[test]
    fn test_fixture_conservation() {
        let hits = fixture_hits();
        let evidence = group_evidence_hits(&hits, &fixture_caps());
        let stats = &evidence.meta.stats;

        // doc3 admission (1) + doc2 page 3 (1) + doc1 unknown page (1)
        let dropped_by_caps = 3;
        assert_eq!(
            stats.total_hits_in,
            stats.total_hits_used
                + stats.dropped_missing_node_id
                + stats.dropped_missing_document_id
                + stats.deduped_node_count
                + dropped_by_caps
        );
    }

    #[test]
    fn test_output_carries_no_text_fields() {
        let mut hits = fixture_hits();
        hits[0].excerpt = Some("Article 5 states that financing requires approval".to_string());
        let evidence = group_evidence_hits(&hits, &fixture_caps());

        let payload = serde_json::to_value(&evidence).expect("serialize");
        fn assert_no_text_keys(value: &Value) {
            match value {
                Value::Object(map) => {
                    for (key, nested) in map {
                        assert!(key != "excerpt" && key != "content", "leaked key {key}");
                        assert_no_text_keys(nested);
                    }
                }
                Value::Array(items) => items.iter().for_each(assert_no_text_keys),
                _ => {}
            }
        }
        assert_no_text_keys(&payload);
    }

    #[test]
    fn test_unknown_page_bucket_admitted_within_caps() {
        let hits = vec![
            hit("n1", "doc1", Some(1), "keyword"),
            hit("n2", "doc1", None, "keyword"),
        ];
        let evidence = group_evidence_hits(&hits, &GroupingCaps::default());

        let doc1 = pages(&evidence, "keyword", "doc1");
        assert_eq!(doc1[&PageKey::Unknown], vec!["n2"]);
        assert_eq!(evidence.meta.stats.unknown_page_count, 1);
        assert_eq!(evidence.meta.stats.total_hits_used, 2);
    }

    #[test]
    fn test_unknown_page_bucket_consumes_a_page_slot() {
        let caps = GroupingCaps {
            max_documents: 2,
            max_nodes_per_document: 8,
            max_pages_per_document: 2,
        };
        let hits = vec![
            hit("n1", "doc1", None, "keyword"),
            hit("n2", "doc1", Some(1), "keyword"),
            hit("n3", "doc1", Some(2), "keyword"),
        ];
        let evidence = group_evidence_hits(&hits, &caps);

        let doc1 = pages(&evidence, "keyword", "doc1");
        assert_eq!(doc1.len(), 2);
        assert_eq!(doc1[&PageKey::Unknown], vec!["n1"]);
        assert_eq!(doc1[&PageKey::Page(1)], vec!["n2"]);
        assert!(!doc1.contains_key(&PageKey::Page(2)));
    }

    #[test]
    fn test_cross_bucket_repeats_are_not_deduped() {
        let hits = vec![
            hit("n1", "doc1", Some(1), "keyword"),
            hit("n1", "doc1", Some(1), "reranked"),
            hit("n1", "doc1", Some(2), "keyword"),
        ];
        let evidence = group_evidence_hits(&hits, &GroupingCaps::default());

        assert_eq!(evidence.meta.stats.deduped_node_count, 0);
        assert_eq!(evidence.meta.stats.total_hits_used, 3);
        assert_eq!(pages(&evidence, "keyword", "doc1")[&PageKey::Page(2)], vec!["n1"]);
        assert_eq!(pages(&evidence, "reranked", "doc1")[&PageKey::Page(1)], vec!["n1"]);
    }

    #[test]
    fn test_hit_missing_both_ids_counts_once_under_node_id() {
        let hits = vec![hit("", "", Some(1), "keyword")];
        let evidence = group_evidence_hits(&hits, &GroupingCaps::default());

        assert_eq!(evidence.meta.stats.dropped_missing_node_id, 1);
        assert_eq!(evidence.meta.stats.dropped_missing_document_id, 0);
        assert!(evidence.document_ids.is_empty());
    }

    #[test]
    fn test_blank_ids_count_as_missing() {
        let hits = vec![hit("  ", "doc1", Some(1), "keyword")];
        let evidence = group_evidence_hits(&hits, &GroupingCaps::default());
        assert_eq!(evidence.meta.stats.dropped_missing_node_id, 1);
    }

    #[test]
    fn test_node_cap_spans_pages_within_a_pair() {
        let caps = GroupingCaps {
            max_documents: 1,
            max_nodes_per_document: 2,
            max_pages_per_document: 8,
        };
        let hits = vec![
            hit("n1", "doc1", Some(1), "keyword"),
            hit("n2", "doc1", Some(2), "keyword"),
            hit("n3", "doc1", Some(3), "keyword"),
        ];
        let evidence = group_evidence_hits(&hits, &caps);

        assert_eq!(evidence.meta.stats.total_hits_used, 2);
        assert!(!pages(&evidence, "keyword", "doc1").contains_key(&PageKey::Page(3)));
    }

    #[test]
    fn test_page_key_ordering_and_serde() {
        let mut buckets: BTreeMap<PageKey, Vec<String>> = BTreeMap::new();
        buckets.insert(PageKey::Unknown, vec![]);
        buckets.insert(PageKey::Page(10), vec![]);
        buckets.insert(PageKey::Page(2), vec![]);
        let order: Vec<PageKey> = buckets.keys().copied().collect();
        assert_eq!(order, vec![PageKey::Page(2), PageKey::Page(10), PageKey::Unknown]);

        assert_eq!(serde_json::to_string(&PageKey::Page(3)).expect("ser"), "\"3\"");
        assert_eq!(serde_json::to_string(&PageKey::Unknown).expect("ser"), "\"_\"");
        let parsed: PageKey = serde_json::from_str("\"_\"").expect("de");
        assert_eq!(parsed, PageKey::Unknown);
    }
}
