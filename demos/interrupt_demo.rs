//! Interrupt Capability Demo
//!
//! Demonstrates cancelling an in-flight turn three ways:
//!
//! 1. Timeout-based interruption of a streaming `chat`
//! 2. Conditional interruption based on streamed content
//! 3. Concurrent interruption (simulated cancel button) of a background
//!    `send_message` turn via `stop()`
//!
//! Note: this demo targets a local OpenAI-compatible server (e.g. Ollama at
//! http://localhost:11434) with a model loaded.

use agentflow_rt::{Agent, ContentBlock, InMemoryPubSub, OpenAiProvider, PubSub, RunConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn config(pubsub: Option<Arc<dyn PubSub>>) -> Result<RunConfig, Box<dyn std::error::Error>> {
    let mut builder = RunConfig::builder()
        .provider(Arc::new(OpenAiProvider::new()))
        .system_prompt("You are a helpful assistant. Be verbose in your responses.")
        .model("qwen3:8b")
        .base_url("http://localhost:11434/v1")
        .temperature(0.7);
    if let Some(p) = pubsub {
        builder = builder.pubsub(p);
    }
    Ok(builder.build()?)
}

// ============================================================================
// Example 1: Timeout-based Interruption
// ============================================================================
async fn timeout_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(60));
    println!("Example 1: Timeout-based Interruption");
    println!("{}", "=".repeat(60));

    let agent = Agent::start(config(None)?).await?;
    let received = Arc::new(Mutex::new(String::new()));

    let chunks = received.clone();
    let on_chunk: agentflow_rt::ChunkCallback = Arc::new(move |block: ContentBlock| {
        if let ContentBlock::Text { text } = block {
            print!("{text}");
            chunks.lock().unwrap().push_str(&text);
        }
    });

    let call = agent.stream_chat("Write a detailed 1000-word essay about quantum computing", on_chunk);

    match tokio::time::timeout(Duration::from_secs(3), call).await {
        Ok(Ok(_)) => println!("\n\nResponse completed within timeout"),
        Ok(Err(e)) => println!("\n\nturn failed: {e}"),
        Err(_) => {
            agent.stop().await?;
            let chars = received.lock().unwrap().len();
            println!("\n\nOperation timed out and was interrupted!");
            println!("Received {chars} characters before timeout");
        }
    }

    Ok(())
}

// ============================================================================
// Example 2: Conditional Interruption
// ============================================================================
async fn conditional_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(60));
    println!("Example 2: Conditional Interruption");
    println!("{}", "=".repeat(60));

    let agent = Agent::start(config(None)?).await?;
    let full_text = Arc::new(Mutex::new(String::new()));
    let agent_for_stop = agent.clone();
    let hit = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let hit_for_cb = hit.clone();

    let text_clone = full_text.clone();
    let on_chunk: agentflow_rt::ChunkCallback = Arc::new(move |block: ContentBlock| {
        if let ContentBlock::Text { text } = block {
            print!("{text}");
            let mut buf = text_clone.lock().unwrap();
            buf.push_str(&text);
            if buf.to_lowercase().contains("neural network") && !hit_for_cb.swap(true, std::sync::atomic::Ordering::SeqCst) {
                let agent = agent_for_stop.clone();
                tokio::spawn(async move { let _ = agent.stop().await; });
            }
        }
    });

    let _ = agent.stream_chat("Tell me about machine learning", on_chunk).await;

    println!("\nReceived {} characters\n", full_text.lock().unwrap().len());
    Ok(())
}

// ============================================================================
// Example 3: Concurrent Interruption (simulated cancel button)
// ============================================================================
async fn concurrent_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(60));
    println!("Example 3: Concurrent Interruption (Simulated User Cancel)");
    println!("{}", "=".repeat(60));

    let bus: Arc<dyn PubSub> = Arc::new(InMemoryPubSub::default());
    let agent = Agent::start(config(Some(bus.clone()))?).await?;
    let topic = format!("agent:{}:responses", agent.health().await.agent_id);
    let mut responses = bus.subscribe(&topic);

    let request_id = agent.send_message("Explain artificial intelligence in detail", None).await?;
    println!("started request {request_id}, cancel button arms in 2s...");

    let cancel_agent = agent.clone();
    let cancel_handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        println!("User clicked cancel button!");
        let _ = cancel_agent.stop().await;
    });

    let _ = cancel_handle.await;
    if let Ok(Ok(result)) = tokio::time::timeout(Duration::from_millis(500), responses.recv()).await {
        println!("supervisor broadcast after cancel: {result}");
    }
    println!("status: {:?}\n", agent.health().await.status);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n{}", "=".repeat(60));
    println!("INTERRUPT CAPABILITY DEMO");
    println!("{}", "=".repeat(60));
    println!("\nThis demo requires a local OpenAI-compatible server (e.g. Ollama) at");
    println!("http://localhost:11434 with a model loaded.\n");

    if let Err(e) = timeout_example().await {
        eprintln!("Timeout example error: {e}");
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    if let Err(e) = conditional_example().await {
        eprintln!("Conditional example error: {e}");
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    if let Err(e) = concurrent_example().await {
        eprintln!("Concurrent example error: {e}");
    }

    println!("{}", "=".repeat(60));
    println!("All examples completed!");
    println!("{}", "=".repeat(60));

    Ok(())
}
