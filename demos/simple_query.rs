//! Simple query example
//!
//! Demonstrates the shortest path to a single reply: build a `RunConfig`,
//! start an `Agent`, call `chat`.

use agentflow_rt::{Agent, OpenAiProvider, RunConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = RunConfig::builder()
        .provider(Arc::new(OpenAiProvider::new()))
        .system_prompt("You are a helpful assistant")
        .model("qwen3:8b")
        .base_url("http://localhost:11434/v1")
        .temperature(0.7)
        .max_tokens(500)
        .build()?;

    let agent = Agent::start(config).await?;

    println!("Sending query to model...\n");
    let reply = agent.chat("What's the capital of France? Please be brief.").await?;
    println!("Response: {reply}");

    Ok(())
}
