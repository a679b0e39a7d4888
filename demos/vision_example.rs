//! Example demonstrating multimodal media support in the message model
//!
//! Complements `vision_api_demo.rs`: where that demo focuses on images,
//! this one walks through the other `MediaKind` variants (audio, video,
//! document) plus mixing media with a multi-turn conversation. Construction
//! only — no network call.
//!
//! Run: `cargo run --example vision_example`

use agentflow_rt::{ContentBlock, MediaKind, MediaSource, Message, MessageContent, MessageRole};

fn media(kind: MediaKind, mime_type: &str, uri: &str) -> ContentBlock {
    ContentBlock::Media { kind, mime_type: mime_type.to_string(), source: MediaSource::Uri(uri.to_string()) }
}

fn main() {
    println!("=== Example 1: Audio transcription request ===\n");

    let msg = Message {
        role: MessageRole::User,
        content: MessageContent::Blocks(vec![
            ContentBlock::text("Transcribe this recording and summarize the key points."),
            media(MediaKind::Audio, "audio/mpeg", "https://example.com/meeting.mp3"),
        ]),
    };
    describe(&msg);

    println!("\n=== Example 2: Video content description ===\n");

    let msg = Message {
        role: MessageRole::User,
        content: MessageContent::Blocks(vec![
            ContentBlock::text("What happens in the first 10 seconds of this clip?"),
            media(MediaKind::Video, "video/mp4", "https://example.com/clip.mp4"),
        ]),
    };
    describe(&msg);

    println!("\n=== Example 3: Document analysis ===\n");

    let msg = Message {
        role: MessageRole::User,
        content: MessageContent::Blocks(vec![
            ContentBlock::text("Extract the line items from this invoice."),
            media(MediaKind::Document, "application/pdf", "https://example.com/invoice.pdf"),
        ]),
    };
    describe(&msg);

    println!("\n=== Example 4: Mixed-media conversation history ===\n");

    let history = vec![
        Message::user("Here's a photo from the trip."),
        Message {
            role: MessageRole::User,
            content: MessageContent::Blocks(vec![media(MediaKind::Image, "image/jpeg", "https://example.com/trip1.jpg")]),
        },
        Message::assistant_text("Looks like a coastal town at sunset."),
        Message::user("And here's the itinerary for reference."),
        Message {
            role: MessageRole::User,
            content: MessageContent::Blocks(vec![media(MediaKind::Document, "application/pdf", "https://example.com/itinerary.pdf")]),
        },
    ];

    println!("Conversation has {} messages, {} of them carry media blocks:", history.len(), history.iter().filter(|m| has_media(m)).count());
    for (i, msg) in history.iter().enumerate() {
        println!("  {}. {:?} — media: {}", i + 1, msg.role, has_media(msg));
    }

    println!("\nVision/media example complete!");
    println!("\nNote: the same Message/ContentBlock model carries text, tool calls,");
    println!("tool results, and media uniformly — a provider that supports multimodal");
    println!("input sees media blocks the same way it sees text or tool_result blocks.");
}

fn describe(msg: &Message) {
    if let MessageContent::Blocks(blocks) = &msg.content {
        println!("{} content block(s):", blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            match block {
                ContentBlock::Text { text } => println!("  - Block {i}: Text ({})", &text[..text.len().min(40)]),
                ContentBlock::Media { kind, mime_type, .. } => println!("  - Block {i}: Media ({kind:?}, {mime_type})"),
                _ => {}
            }
        }
    }
}

fn has_media(msg: &Message) -> bool {
    matches!(&msg.content, MessageContent::Blocks(blocks) if blocks.iter().any(|b| matches!(b, ContentBlock::Media { .. })))
}
