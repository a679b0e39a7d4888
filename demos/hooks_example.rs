//! Middleware Example
//!
//! Demonstrates using the middleware pipeline to monitor and control agent
//! behavior at lifecycle phase boundaries: blocking a tool call before it
//! runs, and halting a turn outright.

use agentflow_rt::{
    tool, Agent, MiddlewareOutcome, MiddlewarePipeline, OpenAiProvider, Phase, RunConfig,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(70));
    println!("MIDDLEWARE EXAMPLE");
    println!("{}", "=".repeat(70));

    // Example 1: block a specific tool call before it runs.
    println!("\nExample 1: Blocking a dangerous tool call\n{}", "-".repeat(70));

    let delete_tool = tool("delete_file", "Delete a file").param("path", "string").build(
        |args, _ctx| Box::pin(async move { Ok(format!("deleted {}", args["path"])) }),
    );

    let blocking = MiddlewarePipeline::new().add(Arc::new(|phase, state| {
        Box::pin(async move {
            if phase == Phase::BeforeToolCall && state.tool_name.as_deref() == Some("delete_file") {
                return MiddlewareOutcome::Block("delete_file requires human approval".into());
            }
            MiddlewareOutcome::Continue(state)
        })
    }));

    let config = RunConfig::builder()
        .provider(Arc::new(OpenAiProvider::new()))
        .system_prompt("You are a helpful assistant")
        .model("qwen3:8b")
        .base_url("http://localhost:11434/v1")
        .tool(delete_tool)
        .middleware(blocking)
        .build()?;

    let agent = Agent::start(config).await?;
    let reply = agent.chat("Please delete /etc/passwd").await?;
    println!("Assistant: {reply}");

    // Example 2: halt the whole turn on a banned keyword.
    println!("\nExample 2: Halting on a banned keyword\n{}", "-".repeat(70));

    let halting = MiddlewarePipeline::new().add(Arc::new(|phase, state| {
        Box::pin(async move {
            if phase == Phase::BeforeCompletion {
                let last_user = state.messages.last().map(|m| m.text()).unwrap_or_default();
                if last_user.to_lowercase().contains("destroy") {
                    return MiddlewareOutcome::Halt("destructive request rejected".into());
                }
            }
            MiddlewareOutcome::Continue(state)
        })
    }));

    let config = RunConfig::builder()
        .provider(Arc::new(OpenAiProvider::new()))
        .system_prompt("You are a helpful assistant")
        .model("qwen3:8b")
        .base_url("http://localhost:11434/v1")
        .middleware(halting)
        .build()?;

    let agent = Agent::start(config).await?;
    agent.chat("destroy all the backups").await?;
    let health = agent.health().await;
    println!("status: {:?}", health.status);

    // Example 3: session_start middleware refuses to start the agent.
    println!("\nExample 3: Refusing to start\n{}", "-".repeat(70));

    let refusing = MiddlewarePipeline::new().add(Arc::new(|phase, state| {
        Box::pin(async move {
            if phase == Phase::SessionStart {
                return MiddlewareOutcome::Halt("maintenance mode: agents disabled".into());
            }
            MiddlewareOutcome::Continue(state)
        })
    }));

    let config = RunConfig::builder()
        .provider(Arc::new(OpenAiProvider::new()))
        .system_prompt("You are a helpful assistant")
        .model("qwen3:8b")
        .base_url("http://localhost:11434/v1")
        .middleware(refusing)
        .build()?;

    match Agent::start(config).await {
        Ok(_) => println!("unexpectedly started"),
        Err(e) => println!("start refused: {e}"),
    }

    Ok(())
}
