//! Auto-Execution Mode Demo
//!
//! The turn engine always executes tool calls automatically and folds their
//! results back into the conversation — there is no manual tool-loop mode to
//! opt into. This demo shows that behavior: `chat()` returns only the final
//! text answer, with every intermediate tool call/result pair tracked in
//! `agent.messages()`.
//!
//! Usage:
//!   cargo run --example auto_execution_demo
//!
//! Requires:
//!   - A local OpenAI-compatible server (e.g. Ollama) on localhost:11434
//!   - qwen3:8b model (or change model in code)

use agentflow_rt::{tool, Agent, OpenAiProvider, RunConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(70));
    println!("AUTO-EXECUTION MODE DEMO");
    println!("{}", "=".repeat(70));
    println!();
    println!("This example demonstrates automatic tool execution where:");
    println!("  - the turn engine executes tool calls automatically");
    println!("  - it keeps iterating until a text-only response is received");
    println!("  - chat() only returns the final answer, not tool blocks");
    println!();

    let add_tool = tool("add", "Add two numbers").param("a", "number").param("b", "number").build(|args, _ctx| {
        Box::pin(async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            let result = a + b;
            println!("  tool: add({a}, {b}) = {result}");
            Ok(result.to_string())
        })
    });

    let multiply_tool = tool("multiply", "Multiply two numbers").param("a", "number").param("b", "number").build(|args, _ctx| {
        Box::pin(async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            let result = a * b;
            println!("  tool: multiply({a}, {b}) = {result}");
            Ok(result.to_string())
        })
    });

    let subtract_tool = tool("subtract", "Subtract two numbers").param("a", "number").param("b", "number").build(|args, _ctx| {
        Box::pin(async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            let result = a - b;
            println!("  tool: subtract({a}, {b}) = {result}");
            Ok(result.to_string())
        })
    });

    let divide_tool = tool("divide", "Divide two numbers").param("a", "number").param("b", "number").build(|args, _ctx| {
        Box::pin(async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            if b == 0.0 {
                return Err("division by zero".to_string());
            }
            let result = a / b;
            println!("  tool: divide({a}, {b}) = {result}");
            Ok(result.to_string())
        })
    });

    let config = RunConfig::builder()
        .provider(Arc::new(OpenAiProvider::new()))
        .system_prompt(
            "You are a calculator assistant. Use the provided tools to perform calculations. \
             Show your work step by step.",
        )
        .model("qwen3:8b")
        .base_url("http://localhost:11434/v1")
        .tools(vec![add_tool, multiply_tool, subtract_tool, divide_tool])
        .max_turns(10)
        .build()?;

    let agent = Agent::start(config).await?;

    println!("{}", "-".repeat(70));

    for (label, query) in [
        ("Example 1: Simple Calculation", "Calculate 15 + 27"),
        ("Example 2: Multi-Step Calculation", "Calculate (10 + 5) * 3"),
        ("Example 3: Complex Expression", "Calculate (20 - 8) * 3 + 15"),
    ] {
        println!("\n{label}\n{}", "-".repeat(70));
        println!("Query: {query}\n");
        let response = agent.chat(query).await?;
        println!("\nAssistant: {}", response.trim());
    }

    println!("\n{}", "=".repeat(70));
    println!("CONVERSATION HISTORY");
    println!("{}", "=".repeat(70));
    println!("\nTotal messages in history: {}", agent.messages().await.len());
    println!("History includes every tool_use/tool_result block executed automatically.");

    println!("\n{}", "=".repeat(70));
    println!("AUTO-EXECUTION SUMMARY");
    println!("{}", "=".repeat(70));
    println!();
    println!("Key features demonstrated:");
    println!("   - tools executed automatically without manual intervention");
    println!("   - only final text responses delivered from chat()");
    println!("   - tool calls and results tracked in agent.messages()");
    println!("   - multi-step calculations handled seamlessly");

    Ok(())
}
