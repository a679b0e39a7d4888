//! Multi-Tool Agent Example
//!
//! Demonstrates a realistic agent with five tools and a middleware pipeline
//! providing safety checks before tool calls run.
//!
//! This agent can:
//! - Perform calculations
//! - Get the current date/time
//! - Convert units
//! - Search (mock)
//! - Format data
//!
//! Usage:
//!   cargo run --example multi_tool_agent
//!
//! Requires:
//!   - A local OpenAI-compatible server (e.g. Ollama) on localhost:11434
//!   - qwen3:8b model (or adjust model name)

use agentflow_rt::{tool, Agent, MiddlewareOutcome, MiddlewarePipeline, OpenAiProvider, Phase, RunConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(70));
    println!("MULTI-TOOL AGENT DEMO");
    println!("Realistic agent with 5 tools and a safety middleware");
    println!("{}", "=".repeat(70));
    println!();

    let calculator = tool("calculate", "Perform arithmetic")
        .param("operation", "string")
        .param("a", "number")
        .param("b", "number")
        .build(|args, _ctx| {
            Box::pin(async move {
                let op = args["operation"].as_str().unwrap_or("");
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                let result = match op {
                    "add" => a + b,
                    "subtract" => a - b,
                    "multiply" => a * b,
                    "divide" => {
                        if b == 0.0 {
                            return Err("division by zero".to_string());
                        }
                        a / b
                    }
                    _ => return Err(format!("unknown operation: {op}")),
                };
                Ok(format!("{result} ({op})"))
            })
        });

    let datetime = tool("get_datetime", "Get current date and time").param("format", "string").build(|args, _ctx| {
        Box::pin(async move {
            let format = args["format"].as_str().unwrap_or("unix").to_string();
            let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_secs();
            Ok(match format.as_str() {
                "unix" => now.to_string(),
                _ => format!("Unix timestamp: {now}"),
            })
        })
    });

    let converter = tool("convert_units", "Convert between units")
        .param("value", "number")
        .param("from_unit", "string")
        .param("to_unit", "string")
        .build(|args, _ctx| {
            Box::pin(async move {
                let value = args["value"].as_f64().unwrap_or(0.0);
                let from = args["from_unit"].as_str().unwrap_or("").to_string();
                let to = args["to_unit"].as_str().unwrap_or("").to_string();
                let result = match (from.as_str(), to.as_str()) {
                    ("km", "miles") => value * 0.621371,
                    ("miles", "km") => value / 0.621371,
                    ("kg", "lbs") => value * 2.20462,
                    ("lbs", "kg") => value / 2.20462,
                    ("celsius", "fahrenheit") => (value * 9.0 / 5.0) + 32.0,
                    ("fahrenheit", "celsius") => (value - 32.0) * 5.0 / 9.0,
                    _ => return Err(format!("unsupported conversion: {from} -> {to}")),
                };
                Ok(format!("{result} {to}"))
            })
        });

    let search = tool("search", "Search for information").param("query", "string").build(|args, _ctx| {
        Box::pin(async move {
            let query = args["query"].as_str().unwrap_or("").to_string();
            Ok(format!("1. Result for: {query} (relevance 0.95)\n2. Related information (relevance 0.80)"))
        })
    });

    let formatter = tool("format_data", "Format data as table/list").param("format", "string").build(|args, _ctx| {
        Box::pin(async move {
            let format = args["format"].as_str().unwrap_or("list").to_string();
            Ok(format!("data formatted as: {format}"))
        })
    });

    let safety = MiddlewarePipeline::new().add(Arc::new(|phase, state| {
        Box::pin(async move {
            if phase == Phase::BeforeToolCall {
                let name = state.tool_name.clone().unwrap_or_default();
                println!("PreToolUse: {name}");

                if name == "delete" || name == "modify_system" {
                    println!("   BLOCKED: dangerous operation");
                    return MiddlewareOutcome::Block("safety policy violation".into());
                }

                if name == "calculate" {
                    let input = state.tool_input.clone().unwrap_or_default();
                    let is_zero_divide = input.get("operation").and_then(|v| v.as_str()) == Some("divide")
                        && input.get("b").and_then(|v| v.as_f64()) == Some(0.0);
                    if is_zero_divide {
                        println!("   BLOCKED: division by zero");
                        return MiddlewareOutcome::Block("division by zero prevented".into());
                    }
                }

                println!("   allowed");
            }
            MiddlewareOutcome::Continue(state)
        })
    }));

    let config = RunConfig::builder()
        .provider(Arc::new(OpenAiProvider::new()))
        .system_prompt(
            "You are a helpful multi-tool assistant. You have access to: \
             calculator, datetime, unit converter, search, and data formatter. \
             Use these tools to help answer questions. \
             Always use tools for calculations and conversions.",
        )
        .model("qwen3:8b")
        .base_url("http://localhost:11434/v1")
        .tools(vec![calculator, datetime, converter, search, formatter])
        .middleware(safety)
        .max_turns(10)
        .temperature(0.3)
        .build()?;

    let agent = Agent::start(config).await?;

    println!("Agent configured with:");
    println!("- 5 tools: calculator, datetime, converter, search, formatter");
    println!("- Safety middleware: blocks dangerous ops and division by zero");
    println!();
    println!("{}", "-".repeat(70));
    println!();

    let queries = [
        "What's 15 kilometers in miles?",
        "Calculate 25 divided by 5, then multiply by 3",
        "What's the current Unix timestamp?",
        "Search for information about Rust programming",
    ];

    for (i, query) in queries.iter().enumerate() {
        println!("Query {}: {query}\n", i + 1);
        let reply = agent.chat(*query).await?;
        println!("Assistant: {reply}\n{}\n", "-".repeat(70));
    }

    let messages = agent.messages().await;
    println!("Conversation History: {} messages\n", messages.len());
    println!("History breakdown:");
    for (i, msg) in messages.iter().enumerate() {
        let blocks = match &msg.content {
            agentflow_rt::MessageContent::Blocks(blocks) => blocks.len(),
            agentflow_rt::MessageContent::Text(_) => 1,
        };
        println!("  {}. {:?} - {blocks} content block(s)", i + 1, msg.role);
    }

    println!("\n{}", "=".repeat(70));
    println!("DEMO COMPLETE");
    println!("{}", "=".repeat(70));
    println!();
    println!("Key features demonstrated:");
    println!("- multiple specialized tools working together");
    println!("- automatic tool execution folded back into the conversation");
    println!("- BeforeToolCall middleware for safety validation");
    println!("- division-by-zero prevented before the tool ever runs");
    println!("- full conversation history tracking");

    Ok(())
}
