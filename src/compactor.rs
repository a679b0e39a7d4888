//! Context-window compaction (spec §4.4).
//!
//! Token estimation is a budget heuristic, not a billing-accurate count:
//! 1 token per 4 characters of text, fixed constants for non-text media,
//! and `tokens(name) + tokens(json(input))` for tool_use blocks.
//!
//! Compaction never reorders, drops, or merges messages — it only rewrites
//! the content of messages strictly between the first and the last
//! `keep_recent` messages: tool_result content becomes the literal
//! `"[compacted]"`, and long assistant text is truncated to 200 chars.

use crate::message::{ContentBlock, Message, MessageContent, MessageRole};

const IMAGE_TOKENS: usize = 1000;
const AUDIO_TOKENS: usize = 500;
const VIDEO_TOKENS: usize = 2000;
const DOCUMENT_TOKENS: usize = 3000;
const COMPACTION_THRESHOLD: f64 = 0.9;
const TRUNCATE_AT: usize = 200;

fn chars_to_tokens(chars: usize) -> usize {
    chars.div_ceil(4)
}

fn block_tokens(block: &ContentBlock) -> usize {
    match block {
        ContentBlock::Text { text } => chars_to_tokens(text.len()),
        ContentBlock::ToolUse { name, input, .. } => {
            chars_to_tokens(name.len()) + chars_to_tokens(serde_json::to_string(input).unwrap_or_default().len())
        }
        ContentBlock::ToolResult { content, .. } => chars_to_tokens(content.len()),
        ContentBlock::Media { kind, .. } => match kind {
            crate::message::MediaKind::Image => IMAGE_TOKENS,
            crate::message::MediaKind::Audio => AUDIO_TOKENS,
            crate::message::MediaKind::Video => VIDEO_TOKENS,
            crate::message::MediaKind::Document => DOCUMENT_TOKENS,
        },
    }
}

fn message_tokens(message: &Message) -> usize {
    match &message.content {
        MessageContent::Text(s) => chars_to_tokens(s.len()),
        MessageContent::Blocks(blocks) => blocks.iter().map(block_tokens).sum(),
    }
}

/// Estimates total tokens across a message history. A budget heuristic,
/// never used for billing.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages.iter().map(message_tokens).sum()
}

/// Returns true if `estimate_tokens(messages) >= threshold * max_tokens`.
pub fn should_compact(messages: &[Message], max_tokens: u32) -> bool {
    estimate_tokens(messages) as f64 >= COMPACTION_THRESHOLD * max_tokens as f64
}

fn compact_middle_message(message: &mut Message) {
    match &mut message.content {
        MessageContent::Blocks(blocks) => {
            for block in blocks.iter_mut() {
                if let ContentBlock::ToolResult { content, .. } = block {
                    *content = "[compacted]".to_string();
                }
            }
        }
        MessageContent::Text(text) => {
            if message.role == MessageRole::Assistant && text.chars().count() > TRUNCATE_AT {
                let truncated: String = text.chars().take(TRUNCATE_AT).collect();
                *text = format!("{truncated}...");
            }
        }
    }
}

/// Runs the compactor in place if the estimate is over threshold. Keeps
/// the first message and the last `keep_recent` messages byte-for-byte
/// identical; only middle messages are rewritten.
pub fn maybe_compact(messages: &mut [Message], max_tokens: u32) {
    if !should_compact(messages, max_tokens) {
        return;
    }

    let len = messages.len();
    if len <= 2 {
        return;
    }
    let keep_recent = (10usize).min((len - 2).max(1));
    let middle_end = len - keep_recent;

    for message in messages.iter_mut().take(middle_end).skip(1) {
        compact_middle_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn estimate_counts_four_chars_per_token() {
        let messages = vec![Message::user("a".repeat(8))];
        assert_eq!(estimate_tokens(&messages), 2);
    }

    #[test]
    fn estimate_uses_fixed_media_constants() {
        let messages = vec![Message::assistant_blocks(vec![ContentBlock::Media {
            kind: crate::message::MediaKind::Image,
            mime_type: "image/png".into(),
            source: crate::message::MediaSource::Uri("https://example.com/x.png".into()),
        }])];
        assert_eq!(estimate_tokens(&messages), IMAGE_TOKENS);
    }

    #[test]
    fn compaction_preserves_first_and_last_messages_verbatim() {
        let mut messages: Vec<Message> = (0..15).map(|i| Message::user(format!("msg-{i}"))).collect();
        messages[5] = Message::assistant_blocks(vec![ContentBlock::tool_result("t1", "x".repeat(10000), false)]);
        let first = messages[0].clone();
        let last_few: Vec<Message> = messages[messages.len() - 10..].to_vec();

        maybe_compact(&mut messages, 100);

        assert_eq!(messages[0], first);
        assert_eq!(&messages[messages.len() - 10..], last_few.as_slice());
    }

    #[test]
    fn compaction_rewrites_middle_tool_results() {
        let mut messages: Vec<Message> = (0..15).map(|i| Message::user(format!("msg-{i}"))).collect();
        messages[3] = Message::assistant_blocks(vec![ContentBlock::tool_result("t1", "x".repeat(10000), false)]);

        maybe_compact(&mut messages, 100);

        if let MessageContent::Blocks(blocks) = &messages[3].content {
            if let ContentBlock::ToolResult { content, .. } = &blocks[0] {
                assert_eq!(content, "[compacted]");
            } else {
                panic!("expected tool result block");
            }
        } else {
            panic!("expected block content");
        }
    }

    #[test]
    fn compaction_truncates_long_assistant_text() {
        let mut messages: Vec<Message> = (0..15).map(|i| Message::user(format!("msg-{i}"))).collect();
        messages[3] = Message::assistant_text("y".repeat(500));

        maybe_compact(&mut messages, 100);

        if let MessageContent::Text(text) = &messages[3].content {
            assert!(text.ends_with("..."));
            assert_eq!(text.chars().count(), 203);
        } else {
            panic!("expected text content");
        }
    }

    #[test]
    fn below_threshold_leaves_messages_untouched() {
        let mut messages = vec![Message::user("hi"), Message::assistant_text("hello")];
        let before = messages.clone();
        maybe_compact(&mut messages, 1_000_000);
        assert_eq!(messages, before);
    }
}
