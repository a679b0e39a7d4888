//! Vision API demonstration with multimodal media blocks
//!
//! Shows how to construct messages carrying `ContentBlock::Media` for
//! vision-capable models: URI references, inline base64 data, and
//! multi-image messages built by hand. Construction only — no network call.
//!
//! Run: `cargo run --example vision_api_demo`

use agentflow_rt::{ContentBlock, MediaKind, MediaSource, Message, MessageContent, MessageRole};

fn image_uri(url: &str) -> ContentBlock {
    ContentBlock::Media { kind: MediaKind::Image, mime_type: "image/jpeg".to_string(), source: MediaSource::Uri(url.to_string()) }
}

fn main() {
    println!("Vision API Demo\n");
    println!("This demo shows how to construct messages with media blocks.\n");

    // ========================================================================
    // Example 1: Simple image with text
    // ========================================================================
    println!("Example 1: Simple image + text message");
    println!("{}", "-".repeat(50));

    let msg1 = Message::assistant_blocks(vec![
        ContentBlock::text("What's in this image? Describe it in detail."),
        image_uri("https://example.com/photo.jpg"),
    ]);

    if let MessageContent::Blocks(blocks) = &msg1.content {
        println!("Created message with {} content blocks", blocks.len());
        println!("  - Block 0: Text");
        println!("  - Block 1: Media (image, uri)\n");
    }

    // ========================================================================
    // Example 2: Base64-encoded image
    // ========================================================================
    println!("Example 2: Base64-encoded image");
    println!("{}", "-".repeat(50));

    let base64_data = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";
    let msg2 = Message::assistant_blocks(vec![
        ContentBlock::text("What color is this pixel?"),
        ContentBlock::Media { kind: MediaKind::Image, mime_type: "image/png".to_string(), source: MediaSource::Data(base64_data.to_string()) },
    ]);

    if let MessageContent::Blocks(blocks) = &msg2.content {
        println!("Created message with {} content blocks", blocks.len());
        if let ContentBlock::Media { source: MediaSource::Data(data), .. } = &blocks[1] {
            println!("  - Block 0: Text");
            println!("  - Block 1: Media (image, base64), {} bytes of data\n", data.len());
        }
    }

    // ========================================================================
    // Example 3: Multi-image message, manually constructed
    // ========================================================================
    println!("Example 3: Complex multi-image message");
    println!("{}", "-".repeat(50));

    let msg3 = Message {
        role: MessageRole::User,
        content: MessageContent::Blocks(vec![
            ContentBlock::text("Compare these three aspects:"),
            ContentBlock::text("1. Composition:"),
            image_uri("https://example.com/photo1.jpg"),
            ContentBlock::text("2. Color palette:"),
            image_uri("https://example.com/photo2.jpg"),
            ContentBlock::text("3. Lighting:"),
            image_uri("https://example.com/photo3.jpg"),
        ]),
    };

    if let MessageContent::Blocks(blocks) = &msg3.content {
        println!("Created complex message with {} content blocks:", blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            match block {
                ContentBlock::Text { text } => println!("  - Block {i}: Text ({})", &text[..text.len().min(30)]),
                ContentBlock::Media { kind, .. } => println!("  - Block {i}: Media ({kind:?})"),
                _ => {}
            }
        }
    }

    // ========================================================================
    // Example 4: Other media kinds
    // ========================================================================
    println!("\nExample 4: Non-image media kinds");
    println!("{}", "-".repeat(50));
    println!("MediaKind::Audio, Video, and Document use the same block shape:");
    println!("  {{ kind, mime_type, data|uri }} — only `kind` and `mime_type` change.");

    println!("\nVision API demo complete!");
    println!("\nKey takeaways:");
    println!("- ContentBlock::Media{{kind, mime_type, source}} covers image/audio/video/document");
    println!("- MediaSource::Uri for remote references, MediaSource::Data for inline base64");
    println!("- assembled into Message like any other content block, no separate image type");
}
