//! Dedup, order and cap normalized candidates.

use crate::article::ArticleCandidate;
use std::collections::HashSet;

pub const DEFAULT_RESULT_CAP: usize = 4;

/// Keep the first occurrence of each URL, preserving input order.
pub fn dedup_by_url(candidates: Vec<ArticleCandidate>) -> Vec<ArticleCandidate> {
    let mut seen: HashSet<String> = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.url.clone()))
        .collect()
}

/// Dedup, stable-sort by score (descending), truncate to `cap`.
pub fn rank(candidates: Vec<ArticleCandidate>, cap: usize) -> Vec<ArticleCandidate> {
    let mut out = dedup_by_url(candidates);
    // `sort_by` is stable: equal scores keep discovery order.
    out.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    out.truncate(cap);
    out
}
