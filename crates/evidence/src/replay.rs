//! Citation replay verification
//!
//! Re-derives a citation's quoted text from raw page content: bounds-check
//! the page-local offsets, slice the content, and fuzzy-match the slice
//! against the quote. A failed check surfaces as "citation not
//! verifiable" in the report, never as a panic or a silent pass.
//!
//! Offsets are char offsets into the page content, the same convention
//! the locator index writes.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use lexforge_common::metrics::record_replay;

/// Tokens shorter than this are ignored by the overlap fallback
const MIN_TOKEN_LEN: usize = 4;

/// Shared tokens required for an overlap-based match
const MIN_SHARED_TOKENS: usize = 3;

/// A citation as emitted downstream: node identity plus the page-local
/// range its quote was taken from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub node_id: String,
    pub document_id: String,
    /// Source page, 1-based
    pub page: u32,
    /// Half-open char range into the page content
    pub start_offset: usize,
    pub end_offset: usize,
    /// Text the answer claims to be quoting
    pub quote: String,
}

/// Why a replay check failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayFailure {
    /// Page content was empty or whitespace
    EmptyContent,
    /// Offsets violate `0 <= start < end <= len(content)`
    OffsetOutOfBounds,
    /// The slice and the quote do not plausibly match
    QuoteMismatch,
}

/// Outcome of replaying one citation against page content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub verified: bool,
    pub bounds_ok: bool,
    pub match_ok: bool,
    /// Page content length in chars
    pub content_len: usize,
    /// Length of the extracted slice in chars (0 when bounds failed)
    pub slice_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ReplayFailure>,
}

impl ReplayReport {
    fn failed(failure: ReplayFailure, content_len: usize) -> Self {
        Self {
            verified: false,
            bounds_ok: failure == ReplayFailure::QuoteMismatch,
            match_ok: false,
            content_len,
            slice_len: 0,
            failure: Some(failure),
        }
    }
}

/// Trim, lowercase, and collapse whitespace runs to single spaces
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|token| token.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fuzzy text match for replay checks.
///
/// After normalization, passes if either string is a substring of the
/// other; otherwise falls back to requiring at least three shared tokens
/// of four or more chars.
pub fn fuzzy_match(slice_text: &str, ref_text: &str) -> bool {
    let a = normalize(slice_text);
    let b = normalize(ref_text);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a.contains(&b) || b.contains(&a) {
        return true;
    }

    let tokens_a: HashSet<&str> = a
        .split(' ')
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .collect();
    let tokens_b: HashSet<&str> = b
        .split(' ')
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .collect();
    tokens_a.intersection(&tokens_b).count() >= MIN_SHARED_TOKENS
}

/// Verify that a citation's quote can be re-derived from page content.
pub fn verify_citation(citation: &Citation, page_content: &str) -> ReplayReport {
    let content_len = page_content.chars().count();

    if page_content.trim().is_empty() {
        warn!(
            node_id = %citation.node_id,
            document_id = %citation.document_id,
            page = citation.page,
            "Replay failed: empty page content"
        );
        record_replay(false);
        return ReplayReport::failed(ReplayFailure::EmptyContent, content_len);
    }

    let bounds_ok = citation.start_offset < citation.end_offset && citation.end_offset <= content_len;
    if !bounds_ok {
        warn!(
            node_id = %citation.node_id,
            start = citation.start_offset,
            end = citation.end_offset,
            content_len,
            "Replay failed: offsets out of page bounds"
        );
        record_replay(false);
        return ReplayReport::failed(ReplayFailure::OffsetOutOfBounds, content_len);
    }

    let slice: String = page_content
        .chars()
        .skip(citation.start_offset)
        .take(citation.end_offset - citation.start_offset)
        .collect();
    let match_ok = fuzzy_match(&slice, &citation.quote);

    if match_ok {
        debug!(
            node_id = %citation.node_id,
            page = citation.page,
            slice_len = slice.chars().count(),
            "Citation replay verified"
        );
    } else {
        warn!(
            node_id = %citation.node_id,
            page = citation.page,
            "Replay failed: slice does not match quote"
        );
    }
    record_replay(match_ok);

    ReplayReport {
        verified: match_ok,
        bounds_ok: true,
        match_ok,
        content_len,
        slice_len: slice.chars().count(),
        failure: (!match_ok).then_some(ReplayFailure::QuoteMismatch),
    }
}
