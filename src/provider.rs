//! The provider boundary (spec §6) plus one concrete OpenAI-compatible
//! adapter.
//!
//! `Provider` is the trait the Turn engine (C6) calls against; a concrete
//! HTTP wire-format implementation is explicitly out of scope for this
//! spec's core, but the crate ships one (`OpenAiProvider`) so the library
//! is runnable end to end, grounded in the teacher's `client.rs`/`utils.rs`
//! SSE handling and `types.rs` OpenAI wire structs.

use crate::config::{get_base_url, get_model, Provider as ProviderKind};
use crate::error::{Error, ProviderError, Result};
use crate::message::{ContentBlock, Message, MessageContent, MessageRole, Usage};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

/// Why the provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
}

/// The result of one provider call: the messages to append (normally a
/// single assistant message), the stop reason, and usage for this call.
#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub stop_reason: StopReason,
    pub messages: Vec<Message>,
    pub usage: Usage,
}

/// Configuration handed to a provider call: wire-level knobs plus the
/// (already-merged) system prompt and a receive timeout the Turn engine
/// computes from its deadline.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub receive_timeout_ms: u64,
}

pub type ChunkCallback = std::sync::Arc<dyn Fn(ContentBlock) + Send + Sync>;

/// The interface the Turn engine drives. Implementations own wire-format
/// translation, HTTP transport, and SSE parsing; errors must be string
/// messages using the recognized prefixes in spec §6 so
/// [`ProviderError::parse`] classifies them correctly.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        tool_defs: &[Value],
        config: &ProviderConfig,
    ) -> std::result::Result<CompletionResult, ProviderError>;

    /// Streaming variant. Default implementation falls back to `complete`
    /// for providers that don't support incremental delivery — callers
    /// detect this via `supports_streaming`.
    async fn stream(
        &self,
        messages: &[Message],
        tool_defs: &[Value],
        config: &ProviderConfig,
        on_chunk: ChunkCallback,
    ) -> std::result::Result<CompletionResult, ProviderError> {
        let _ = &on_chunk;
        self.complete(messages, tool_defs, config).await
    }

    fn supports_streaming(&self) -> bool {
        false
    }
}

// ===========================================================================
// OpenAI-compatible wire format (kept close to the teacher's types.rs/
// utils.rs, generalized to round-trip tool_use/tool_result blocks instead
// of dropping them).
// ===========================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<OpenAIContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIChunk {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIChoice {
    delta: OpenAIDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct OpenAIDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<OpenAIFunctionDelta>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct OpenAIFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Flattens our `Message` history into the OpenAI wire format, round
/// tripping `tool_use` into `tool_calls` and `tool_result` into
/// `tool_call_id`-tagged tool-role messages — unlike the teacher's
/// `Client::send`, which dropped these blocks when re-serializing.
fn to_openai_messages(system_prompt: Option<&str>, messages: &[Message]) -> Vec<OpenAIMessage> {
    let mut out = Vec::new();
    if let Some(prompt) = system_prompt {
        if !prompt.is_empty() {
            out.push(OpenAIMessage {
                role: "system".to_string(),
                content: Some(OpenAIContent::Text(prompt.to_string())),
                tool_calls: None,
                tool_call_id: None,
            });
        }
    }

    for message in messages {
        let role = match message.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        };

        match &message.content {
            MessageContent::Text(text) => {
                out.push(OpenAIMessage {
                    role: role.to_string(),
                    content: Some(OpenAIContent::Text(text.clone())),
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
            MessageContent::Blocks(blocks) => {
                let mut text_parts = Vec::new();
                let mut tool_calls = Vec::new();
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => text_parts.push(text.clone()),
                        ContentBlock::ToolUse { id, name, input } => {
                            tool_calls.push(OpenAIToolCall {
                                id: id.clone(),
                                call_type: "function".to_string(),
                                function: OpenAIFunction {
                                    name: name.clone(),
                                    arguments: serde_json::to_string(input).unwrap_or_default(),
                                },
                            });
                        }
                        ContentBlock::ToolResult { tool_use_id, content, .. } => {
                            out.push(OpenAIMessage {
                                role: "tool".to_string(),
                                content: Some(OpenAIContent::Text(content.clone())),
                                tool_calls: None,
                                tool_call_id: Some(tool_use_id.clone()),
                            });
                        }
                        ContentBlock::Media { .. } => {}
                    }
                }
                if !tool_calls.is_empty() || !text_parts.is_empty() {
                    out.push(OpenAIMessage {
                        role: role.to_string(),
                        content: if text_parts.is_empty() { None } else { Some(OpenAIContent::Text(text_parts.join(""))) },
                        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                        tool_call_id: None,
                    });
                }
            }
        }
    }

    out
}

/// Accumulates streamed deltas into final content blocks, mirroring the
/// teacher's `ToolCallAggregator`.
#[derive(Default)]
struct ToolCallAggregator {
    text_buffer: String,
    tool_calls: std::collections::HashMap<u32, (Option<String>, Option<String>, String)>,
}

impl ToolCallAggregator {
    fn process_delta(&mut self, delta: &OpenAIDelta) {
        if let Some(content) = &delta.content {
            self.text_buffer.push_str(content);
        }
        if let Some(tool_calls) = &delta.tool_calls {
            for tc in tool_calls {
                let entry = self.tool_calls.entry(tc.index).or_default();
                if let Some(id) = &tc.id {
                    entry.0 = Some(id.clone());
                }
                if let Some(function) = &tc.function {
                    if let Some(name) = &function.name {
                        entry.1 = Some(name.clone());
                    }
                    if let Some(args) = &function.arguments {
                        entry.2.push_str(args);
                    }
                }
            }
        }
    }

    fn finish(self) -> Result<Vec<ContentBlock>> {
        let mut blocks = Vec::new();
        if !self.text_buffer.is_empty() {
            blocks.push(ContentBlock::text(self.text_buffer));
        }
        let mut indices: Vec<_> = self.tool_calls.keys().copied().collect();
        indices.sort_unstable();
        for idx in indices {
            let (id, name, args) = self.tool_calls.get(&idx).unwrap();
            let input: Value = if args.is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(args).map_err(|e| Error::stream(format!("invalid tool call arguments: {e}")))?
            };
            blocks.push(ContentBlock::tool_use(
                id.clone().unwrap_or_default(),
                name.clone().unwrap_or_default(),
                input,
            ));
        }
        Ok(blocks)
    }
}

fn parse_sse_line(line: &str) -> Option<&str> {
    let line = line.trim();
    let data = line.strip_prefix("data: ")?;
    if data == "[DONE]" {
        None
    } else {
        Some(data)
    }
}

/// One OpenAI-compatible HTTP provider, talking to LM Studio / Ollama /
/// llama.cpp / vLLM-style local servers or any compatible cloud endpoint.
pub struct OpenAiProvider {
    http_client: reqwest::Client,
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiProvider {
    pub fn new() -> Self {
        OpenAiProvider { http_client: reqwest::Client::new() }
    }

    /// Resolves a base URL the way the teacher's `config.rs` does: env var
    /// override, else provider-default, else explicit fallback.
    pub fn resolve_base_url(provider: Option<ProviderKind>, fallback: Option<&str>) -> String {
        get_base_url(provider, fallback)
    }

    pub fn resolve_model(fallback: Option<&str>) -> Option<String> {
        get_model(fallback, true)
    }

    fn request_error_to_provider_error(err: &reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::parse("HTTP request failed: timed out :timeout")
        } else if err.is_connect() {
            ProviderError::parse("HTTP request failed: connect failed :econnrefused")
        } else if let Some(status) = err.status() {
            ProviderError::parse(format!("HTTP {}: {err}", status.as_u16()))
        } else {
            ProviderError::parse(format!("HTTP request failed: {err} :unprocessed"))
        }
    }

    async fn post(
        &self,
        messages: &[Message],
        tool_defs: &[Value],
        config: &ProviderConfig,
        stream: bool,
    ) -> std::result::Result<reqwest::Response, ProviderError> {
        let request = OpenAIRequest {
            model: config.model.clone(),
            messages: to_openai_messages(config.system_prompt.as_deref(), messages),
            stream,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            tools: if tool_defs.is_empty() { None } else { Some(tool_defs.to_vec()) },
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", config.base_url))
            .bearer_auth(&config.api_key)
            .timeout(std::time::Duration::from_millis(config.receive_timeout_ms))
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::request_error_to_provider_error(&e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let prefix = if (500..600).contains(&status) { "HTTP 5xx".to_string() } else { format!("HTTP {status}") };
            return Err(ProviderError::parse(format!("{prefix}: {body}")));
        }

        Ok(response)
    }

    fn sse_lines(response: reqwest::Response) -> Pin<Box<dyn Stream<Item = std::result::Result<String, ProviderError>> + Send>> {
        let byte_stream = response.bytes_stream();
        Box::pin(byte_stream.flat_map(|chunk| {
            let lines: Vec<std::result::Result<String, ProviderError>> = match chunk {
                Ok(bytes) => String::from_utf8_lossy(&bytes)
                    .lines()
                    .filter_map(|l| parse_sse_line(l).map(|d| Ok(d.to_string())))
                    .collect(),
                Err(e) => vec![Err(ProviderError::parse(format!("HTTP request failed: {e} :closed")))],
            };
            futures::stream::iter(lines)
        }))
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tool_defs: &[Value],
        config: &ProviderConfig,
    ) -> std::result::Result<CompletionResult, ProviderError> {
        self.stream(messages, tool_defs, config, std::sync::Arc::new(|_| {})).await
    }

    async fn stream(
        &self,
        messages: &[Message],
        tool_defs: &[Value],
        config: &ProviderConfig,
        on_chunk: ChunkCallback,
    ) -> std::result::Result<CompletionResult, ProviderError> {
        let response = self.post(messages, tool_defs, config, true).await?;
        let mut lines = Self::sse_lines(response);
        let mut aggregator = ToolCallAggregator::default();
        let mut finish_reason = None;
        let mut usage = Usage::default();

        while let Some(line) = lines.next().await {
            let data = line?;
            let parsed: OpenAIChunk = serde_json::from_str(&data)
                .map_err(|e| ProviderError::parse(format!("HTTP request failed: invalid chunk {e} :unprocessed")))?;
            if let Some(u) = parsed.usage {
                usage.input_tokens = u.prompt_tokens;
                usage.output_tokens = u.completion_tokens;
            }
            for choice in parsed.choices {
                if let Some(content) = &choice.delta.content {
                    on_chunk(ContentBlock::text(content.clone()));
                }
                aggregator.process_delta(&choice.delta);
                if choice.finish_reason.is_some() {
                    finish_reason = choice.finish_reason;
                }
            }
        }

        let blocks = aggregator.finish().map_err(|e| ProviderError::parse(e.to_string()))?;
        let has_tool_use = blocks.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. }));
        let stop_reason = if has_tool_use || finish_reason.as_deref() == Some("tool_calls") {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        };

        Ok(CompletionResult {
            stop_reason,
            messages: vec![Message::assistant_blocks(blocks)],
            usage,
        })
    }

    fn supports_streaming(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_openai_messages_round_trips_tool_use_and_result() {
        let history = vec![
            Message::user("uppercase hello"),
            Message::assistant_blocks(vec![ContentBlock::tool_use("t1", "uppercase", serde_json::json!({"text": "hello"}))]),
            Message::tool_results(vec![ContentBlock::tool_result("t1", "HELLO", false)]),
        ];
        let wire = to_openai_messages(None, &history);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[1].tool_calls.as_ref().unwrap()[0].function.name, "uppercase");
        assert_eq!(wire[2].role, "tool");
        assert_eq!(wire[2].tool_call_id.as_deref(), Some("t1"));
    }

    #[test]
    fn parse_sse_line_skips_done_sentinel() {
        assert_eq!(parse_sse_line("data: [DONE]"), None);
        assert_eq!(parse_sse_line("data: {\"x\":1}"), Some("{\"x\":1}"));
    }

    #[test]
    fn tool_call_aggregator_accumulates_streamed_arguments() {
        let mut agg = ToolCallAggregator::default();
        agg.process_delta(&OpenAIDelta {
            content: None,
            tool_calls: Some(vec![OpenAIToolCallDelta {
                index: 0,
                id: Some("t1".into()),
                function: Some(OpenAIFunctionDelta { name: Some("uppercase".into()), arguments: Some("{\"text\":".into()) }),
            }]),
        });
        agg.process_delta(&OpenAIDelta {
            content: None,
            tool_calls: Some(vec![OpenAIToolCallDelta {
                index: 0,
                id: None,
                function: Some(OpenAIFunctionDelta { name: None, arguments: Some("\"hi\"}".into()) }),
            }]),
        });
        let blocks = agg.finish().unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(matches!(&blocks[0], ContentBlock::ToolUse { name, .. } if name == "uppercase"));
    }
}
