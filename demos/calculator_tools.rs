//! Calculator with Tools Example
//!
//! Demonstrates giving a local LLM function-calling abilities via the tool
//! registry. Tool dispatch, parallel execution, and folding results back
//! into the conversation are all handled by the turn engine — the caller
//! just defines tools and calls `chat`.

use agentflow_rt::{tool, Agent, OpenAiProvider, RunConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let add = tool("add", "Add two numbers")
        .param("a", "number")
        .param("b", "number")
        .build(|args, _ctx| {
            Box::pin(async move {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok((a + b).to_string())
            })
        });

    let subtract = tool("subtract", "Subtract two numbers")
        .param("a", "number")
        .param("b", "number")
        .build(|args, _ctx| {
            Box::pin(async move {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok((a - b).to_string())
            })
        });

    let multiply = tool("multiply", "Multiply two numbers")
        .param("a", "number")
        .param("b", "number")
        .build(|args, _ctx| {
            Box::pin(async move {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok((a * b).to_string())
            })
        });

    let divide = tool("divide", "Divide two numbers")
        .param("a", "number")
        .param("b", "number")
        .build(|args, _ctx| {
            Box::pin(async move {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                if b == 0.0 {
                    return Err("cannot divide by zero".to_string());
                }
                Ok((a / b).to_string())
            })
        });

    let config = RunConfig::builder()
        .provider(Arc::new(OpenAiProvider::new()))
        .system_prompt(
            "You are a helpful calculator assistant. Use the provided tools \
             to perform calculations. Always show your work.",
        )
        .model("qwen3:8b")
        .base_url("http://localhost:11434/v1")
        .tools(vec![add, subtract, multiply, divide])
        .max_turns(5)
        .temperature(0.1)
        .build()?;

    let queries = [
        "What is 25 plus 17?",
        "Calculate 144 divided by 12",
        "What's 7 times 8, then add 5?",
    ];

    for query in queries {
        println!("User: {query}");
        let agent = Agent::start(config.clone()).await?;
        let reply = agent.chat(query).await?;
        println!("Assistant: {reply}\n");
    }

    Ok(())
}
