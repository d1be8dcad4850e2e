//! Topic extraction prompt, schema and response parsing.

use crate::json_text::{parse_object, truncate_chars};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Characters of article text sent to the topic extractor.
pub const TOPIC_INPUT_CHARS: usize = 4000;
const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicExtractionResult {
    pub topic: String,
    pub opposing_terms: Vec<String>,
}

pub fn topic_prompt(article: &str) -> String {
    let excerpt = truncate_chars(article, TOPIC_INPUT_CHARS);
    format!(
        "You analyze news articles. Find the core subject of the article below and \
propose search keywords that a writer holding the opposite view would use.\n\n\
Article:\n{excerpt}\n\n\
Return:\n\
1. \"core_subject\": the core subject as a short phrase of at most 10 words. It is used as the main search term.\n\
2. \"opposing_terms\": 3 to 5 short, commonly used keywords or phrases expressing a direct \
counter-argument or opposing stance to the article.\n\n\
Respond with a single JSON object with exactly those two keys and nothing else: \
no preamble, no markdown, no code fences."
    )
}

/// JSON schema handed to backends that support constrained output.
pub fn topic_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "core_subject": {
                "type": "string",
                "description": "Core subject of the article, at most 10 words."
            },
            "opposing_terms": {
                "type": "array",
                "items": { "type": "string" },
                "description": "3-5 short keywords expressing an opposing viewpoint."
            }
        },
        "required": ["core_subject", "opposing_terms"],
        "additionalProperties": false
    })
}

/// Parse a generator's answer into a topic and opposing terms.
pub fn parse_topic(provider: &str, raw: &str) -> Result<TopicExtractionResult> {
    let obj = parse_object(raw).ok_or_else(|| Error::MalformedResponse {
        provider: provider.to_string(),
        snippet: truncate_chars(raw.trim(), SNIPPET_CHARS).to_string(),
    })?;

    let topic = obj
        .get("core_subject")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(Error::MissingTopic)?;

    let opposing_terms = match obj.get("opposing_terms") {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        // Some models answer with a single comma-separated string.
        Some(serde_json::Value::String(s)) => s
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    Ok(TopicExtractionResult {
        topic,
        opposing_terms,
    })
}
