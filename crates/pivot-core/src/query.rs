//! Search query construction from an extracted topic.

pub const MAX_QUERIES: usize = 4;
/// Queries actually sent to providers per request.
pub const EXECUTED_QUERIES: usize = 2;
const TERMS_PER_QUERY: usize = 2;

pub fn fallback_query(topic: &str) -> String {
    format!("{topic} alternative viewpoint different perspective")
}

/// Ordered queries for `topic`. Never empty: the fallback query is always last.
pub fn build_queries(topic: &str, opposing_terms: &[String]) -> Vec<String> {
    let topic = topic.trim();
    let terms: Vec<&str> = opposing_terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();

    let mut out = Vec::with_capacity(3);
    if !terms.is_empty() {
        let head = terms
            .iter()
            .take(TERMS_PER_QUERY)
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        out.push(format!("{topic} {head}"));
        out.push(format!("{topic} criticism debate controversy"));
    }
    out.push(fallback_query(topic));
    out.truncate(MAX_QUERIES);
    out
}

/// The queries that get executed.
pub fn executed(queries: &[String]) -> &[String] {
    &queries[..queries.len().min(EXECUTED_QUERIES)]
}
