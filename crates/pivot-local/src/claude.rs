use crate::{env, env_any, provider_error, transport_error};
use pivot_core::{Error, GenerateRequest, Result, TextGenerator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
// Single tool forced via `tool_choice` when the caller asks for schema-constrained output.
const STRUCTURED_TOOL: &str = "emit_result";

fn claude_api_key_from_env() -> Option<String> {
    env_any(&["PIVOT_CLAUDE_API_KEY", "CLAUDE_API_KEY"])
}

fn claude_endpoint_from_env() -> Option<String> {
    env("PIVOT_CLAUDE_ENDPOINT")
}

/// Anthropic Messages API client.
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl ClaudeClient {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: claude_endpoint_from_env()
                .unwrap_or_else(|| "https://api.anthropic.com/v1/messages".to_string()),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = claude_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "Claude API key is not configured on the server (set CLAUDE_API_KEY)".to_string(),
            )
        })?;
        Ok(Self::new(client, api_key))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDefinition<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ToolDefinition<'a> {
    name: &'static str,
    description: &'static str,
    input_schema: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'static str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    input: Option<serde_json::Value>,
}

impl MessagesResponse {
    /// Tool input (as JSON text) if the model called the structured tool, else the joined text.
    fn into_text(self) -> Option<String> {
        let mut text = String::new();
        for block in self.content {
            if block.kind.as_deref() == Some("tool_use") {
                if let Some(input) = block.input {
                    return Some(input.to_string());
                }
            }
            if let Some(t) = block.text {
                text.push_str(&t);
            }
        }
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[async_trait::async_trait]
impl TextGenerator for ClaudeClient {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<String> {
        let timeout_ms = req.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        let model = req.model.as_deref().unwrap_or(&self.model);
        let (tools, tool_choice) = match req.json_schema.as_ref() {
            Some(schema) => (
                Some(vec![ToolDefinition {
                    name: STRUCTURED_TOOL,
                    description: "Return the requested result as structured JSON.",
                    input_schema: schema,
                }]),
                Some(ToolChoice {
                    kind: "tool",
                    name: STRUCTURED_TOOL,
                }),
            ),
            None => (None, None),
        };
        let body = MessagesRequest {
            model,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            messages: vec![WireMessage {
                role: "user",
                content: &req.prompt,
            }],
            tools,
            tool_choice,
        };

        tracing::debug!(model, max_tokens = req.max_tokens, "claude messages request");
        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&body)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| transport_error("claude", timeout_ms, e))?;

        if !resp.status().is_success() {
            return Err(provider_error("claude", resp).await);
        }

        let raw = resp
            .text()
            .await
            .map_err(|e| transport_error("claude", timeout_ms, e))?;
        let parsed: MessagesResponse =
            serde_json::from_str(&raw).map_err(|_| Error::MalformedResponse {
                provider: "claude".to_string(),
                snippet: pivot_core::json_text::truncate_chars(&raw, 200).to_string(),
            })?;
        parsed.into_text().ok_or_else(|| Error::MalformedResponse {
            provider: "claude".to_string(),
            snippet: pivot_core::json_text::truncate_chars(&raw, 200).to_string(),
        })
    }
}
