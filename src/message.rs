//! Core message types: roles, content blocks, and usage accounting.
//!
//! Messages are immutable value types. Role alternation (tool results only
//! in user messages, tool_use ids always resolved by a prior assistant
//! message) is enforced by the constructors in this module, not by a
//! separate validation pass run after the fact.

use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// The kind of external media referenced by a [`ContentBlock::Media`] block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    Document,
}

/// Where a [`ContentBlock::Media`] block's bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaSource {
    /// Base64-encoded inline data.
    Data(String),
    /// A URI the provider should fetch (or a data: URL).
    Uri(String),
}

/// A single unit of message content. Tagged externally so the wire
/// representation is `{"type": "text", ...}` rather than an untagged map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    Media {
        kind: MediaKind,
        mime_type: String,
        #[serde(flatten)]
        source: MediaSource,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        ContentBlock::ToolUse { id: id.into(), name: name.into(), input }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// The body of a message: either a plain string (the common case for user
/// prompts) or an ordered list of content blocks (assistant tool calls,
/// tool result batches, multi-modal input).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Flattens to a single string for token estimation and simple display.
    /// Non-text blocks contribute their textual representation where one
    /// exists (tool results); others contribute nothing.
    pub fn to_plain_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.clone()),
                    ContentBlock::ToolResult { content, .. } => Some(content.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn blocks(&self) -> Option<&[ContentBlock]> {
        match self {
            MessageContent::Blocks(b) => Some(b),
            MessageContent::Text(_) => None,
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Message { role: MessageRole::User, content: MessageContent::Text(text.into()) }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Message { role: MessageRole::System, content: MessageContent::Text(text.into()) }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Message { role: MessageRole::Assistant, content: MessageContent::Text(text.into()) }
    }

    /// Builds an assistant message carrying tool_use blocks (and optionally
    /// leading text). Only assistant messages may carry `tool_use` blocks.
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Message { role: MessageRole::Assistant, content: MessageContent::Blocks(blocks) }
    }

    /// Builds the synthetic user message the tool executor produces:
    /// an ordered batch of `tool_result` blocks. Only user messages may
    /// carry `tool_result` blocks — enforced here by construction.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        debug_assert!(
            results.iter().all(|b| matches!(b, ContentBlock::ToolResult { .. })),
            "tool_results() must only be given ToolResult blocks"
        );
        Message { role: MessageRole::User, content: MessageContent::Blocks(results) }
    }

    pub fn text(&self) -> String {
        self.content.to_plain_text()
    }
}

/// Token/cost accounting for one or more provider calls. Merge is
/// field-wise addition: commutative and associative, so usage from any
/// subset of turns can be combined in any order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub estimated_cost_cents: f64,
}

impl Usage {
    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_creation_input_tokens += other.cache_creation_input_tokens;
        self.cache_read_input_tokens += other.cache_read_input_tokens;
        self.estimated_cost_cents += other.estimated_cost_cents;
    }

    pub fn merged(mut self, other: &Usage) -> Self {
        self.merge(other);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_merge_is_field_wise() {
        let a = Usage { input_tokens: 10, output_tokens: 5, ..Default::default() };
        let b = Usage { input_tokens: 3, output_tokens: 1, cache_read_input_tokens: 2, ..Default::default() };
        let merged = a.merged(&b);
        assert_eq!(merged.input_tokens, 13);
        assert_eq!(merged.output_tokens, 6);
        assert_eq!(merged.cache_read_input_tokens, 2);
    }

    #[test]
    fn usage_merge_commutative_and_associative() {
        let a = Usage { input_tokens: 10, output_tokens: 2, ..Default::default() };
        let b = Usage { input_tokens: 5, output_tokens: 7, ..Default::default() };
        let c = Usage { input_tokens: 1, output_tokens: 1, ..Default::default() };

        let ab_c = a.merged(&b).merged(&c);
        let ba_c = b.merged(&a).merged(&c);
        let a_bc = a.merged(&b.merged(&c));
        assert_eq!(ab_c, ba_c);
        assert_eq!(ab_c, a_bc);
    }

    #[test]
    fn tool_results_only_carries_tool_result_blocks() {
        let msg = Message::tool_results(vec![ContentBlock::tool_result("t1", "ok", false)]);
        assert_eq!(msg.role, MessageRole::User);
    }

    #[test]
    fn plain_text_flattens_tool_results() {
        let msg = Message::assistant_blocks(vec![
            ContentBlock::text("hello "),
            ContentBlock::tool_use("t1", "uppercase", serde_json::json!({"text": "hi"})),
        ]);
        assert_eq!(msg.text(), "hello ");
    }
}
