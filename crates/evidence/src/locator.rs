//! Page locator index
//!
//! Builds a page -> start-offset map from `<!-- page: N -->` markers in a
//! document's concatenated text, and rewrites node offsets from absolute
//! (whole document) to page-local. Offsets count chars (Unicode scalar
//! values), the convention of the upstream parser; the replay verifier
//! slices with the same convention so round-trips are exact.
//!
//! The index is pure and derived on demand; caching it is a caller
//! concern.

use std::collections::BTreeMap;

use regex_lite::Regex;
use serde_json::Value;
use tracing::debug;

use crate::candidate::Candidate;

/// Marker meaning "page N starts here" (case-insensitive, whitespace-tolerant)
const PAGE_MARK_PATTERN: &str = r"(?i)<!--\s*page:\s*(\d+)\s*-->";

/// Meta key recording that a node's offsets have been rewritten
pub const OFFSET_MODE_KEY: &str = "offset_mode";

/// Meta value marking page-local offsets
pub const OFFSET_MODE_PAGE_LOCAL: &str = "page_local";

/// Locator for page boundaries inside concatenated document text
pub struct PageLocator {
    marker: Regex,
}

impl PageLocator {
    pub fn new() -> Self {
        Self {
            marker: Regex::new(PAGE_MARK_PATTERN).expect("static pattern compiles"),
        }
    }

    /// Map each page number to the char offset where its content begins.
    ///
    /// A page's content starts at its marker, matching the page replay
    /// split. Documents without markers are a single page 1 at offset 0.
    pub fn page_start_index(&self, text: &str) -> BTreeMap<u32, usize> {
        let mut index = BTreeMap::new();
        let mut chars_before = 0usize;
        let mut scanned_bytes = 0usize;

        for captures in self.marker.captures_iter(text) {
            let Some(whole) = captures.get(0) else { continue };
            let Some(page_no) = captures.get(1).and_then(|g| g.as_str().parse::<u32>().ok())
            else {
                continue;
            };
            // Matches arrive in byte order; accumulate the char count
            // between consecutive marker starts.
            chars_before += text[scanned_bytes..whole.start()].chars().count();
            scanned_bytes = whole.start();
            index.insert(page_no, chars_before);
        }

        if index.is_empty() {
            index.insert(1, 0);
        }
        index
    }

    /// Rewrite absolute start/end offsets to page-local ones.
    ///
    /// Nodes already marked page-local are passed through untouched, which
    /// makes the conversion idempotent. Nodes without a page, or whose
    /// page is absent from the index, are also left untouched; downstream
    /// replay treats their offsets as absolute and degrades gracefully.
    pub fn normalize_to_page_local(&self, nodes: Vec<Candidate>, text: &str) -> Vec<Candidate> {
        let index = self.page_start_index(text);
        let mut converted = 0usize;

        let nodes: Vec<Candidate> = nodes
            .into_iter()
            .map(|mut node| {
                if node.meta.get(OFFSET_MODE_KEY).and_then(Value::as_str)
                    == Some(OFFSET_MODE_PAGE_LOCAL)
                {
                    return node;
                }
                let Some(page) = node.page else { return node };
                let Some(&base) = index.get(&page) else { return node };

                if let Some(start) = node.start_offset {
                    node.start_offset = Some(start.saturating_sub(base));
                }
                if let Some(end) = node.end_offset {
                    node.end_offset = Some(end.saturating_sub(base));
                }
                node.meta.insert(
                    OFFSET_MODE_KEY.to_string(),
                    Value::String(OFFSET_MODE_PAGE_LOCAL.to_string()),
                );
                converted += 1;
                node
            })
            .collect();

        debug!(
            pages = index.len(),
            nodes = nodes.len(),
            converted,
            "Offsets normalized to page-local"
        );
        nodes
    }
}

impl Default for PageLocator {
    fn default() -> Self {
        Self::new()
    }
}
