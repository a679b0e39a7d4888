//! Tool-execution integration tests.
//!
//! The turn engine always auto-executes tool calls and loops until the
//! provider yields a text-only turn (or a bound is hit) — there is no
//! opt-in flag, unlike the older manual/auto toggle this supersedes.

use agentflow_rt::{tool, Agent, CompletionResult, ContentBlock, Message, Provider, ProviderConfig, ProviderError, RunConfig, StopReason};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct ScriptedProvider {
    script: Mutex<Vec<std::result::Result<CompletionResult, ProviderError>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(script: Vec<std::result::Result<CompletionResult, ProviderError>>) -> Self {
        ScriptedProvider { script: Mutex::new(script), calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        _messages: &[Message],
        _tool_defs: &[Value],
        _config: &ProviderConfig,
    ) -> std::result::Result<CompletionResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Err(ProviderError::parse("INTERNAL: script exhausted"));
        }
        script.remove(0)
    }
}

fn end_turn(text: &str) -> std::result::Result<CompletionResult, ProviderError> {
    Ok(CompletionResult { stop_reason: StopReason::EndTurn, messages: vec![Message::assistant_text(text)], usage: Default::default() })
}

fn tool_use(id: &str, name: &str, input: Value) -> std::result::Result<CompletionResult, ProviderError> {
    Ok(CompletionResult {
        stop_reason: StopReason::ToolUse,
        messages: vec![Message::assistant_blocks(vec![ContentBlock::tool_use(id, name, input)])],
        usage: Default::default(),
    })
}

fn multi_tool_use(calls: &[(&str, &str, Value)]) -> std::result::Result<CompletionResult, ProviderError> {
    let blocks = calls.iter().map(|(id, name, input)| ContentBlock::tool_use(*id, *name, input.clone())).collect();
    Ok(CompletionResult { stop_reason: StopReason::ToolUse, messages: vec![Message::assistant_blocks(blocks)], usage: Default::default() })
}

fn add_tool() -> agentflow_rt::Tool {
    tool("add", "Add two numbers").param("a", "number").param("b", "number").build(|args, _ctx| {
        Box::pin(async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok((a + b).to_string())
        })
    })
}

fn multiply_tool() -> agentflow_rt::Tool {
    tool("multiply", "Multiply two numbers").param("a", "number").param("b", "number").build(|args, _ctx| {
        Box::pin(async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok((a * b).to_string())
        })
    })
}

#[tokio::test]
async fn sequential_tool_calls_run_automatically() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_use("t1", "add", json!({"a": 5, "b": 3})),
        tool_use("t2", "multiply", json!({"a": 8, "b": 2})),
        end_turn("The result is 16"),
    ]));
    let config = RunConfig::builder()
        .provider(provider)
        .model("test")
        .base_url("http://localhost:1234/v1")
        .tool(add_tool())
        .tool(multiply_tool())
        .build()
        .unwrap();
    let agent = Agent::start(config).await.unwrap();

    let reply = agent.chat("Calculate 5 + 3, then multiply the result by 2").await.unwrap();

    assert_eq!(reply, "The result is 16");
    // user, assistant(tool t1), tool-result t1, assistant(tool t2), tool-result t2, assistant(text)
    assert_eq!(agent.messages().await.len(), 6);
}

#[tokio::test]
async fn no_tools_needed_returns_text_immediately() {
    let provider = Arc::new(ScriptedProvider::new(vec![end_turn("Hello there!")]));
    let config = RunConfig::builder().provider(provider).model("test").base_url("http://localhost:1234/v1").build().unwrap();
    let agent = Agent::start(config).await.unwrap();

    let reply = agent.chat("Hello").await.unwrap();

    assert_eq!(reply, "Hello there!");
    assert_eq!(agent.health().await.turn_count, 1);
}

#[tokio::test]
async fn tool_execution_error_becomes_error_result_and_conversation_continues() {
    let divide = tool("divide", "Divide two numbers").param("a", "number").param("b", "number").build(|args, _ctx| {
        Box::pin(async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            if b == 0.0 {
                return Err("division by zero".to_string());
            }
            Ok((a / b).to_string())
        })
    });
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_use("t1", "divide", json!({"a": 10, "b": 0})),
        end_turn("Looks like that failed, let me know if you'd like another input."),
    ]));
    let config = RunConfig::builder()
        .provider(provider)
        .model("test")
        .base_url("http://localhost:1234/v1")
        .tool(divide)
        .build()
        .unwrap();
    let agent = Agent::start(config).await.unwrap();

    let reply = agent.chat("Divide 10 by 0").await.unwrap();

    assert!(reply.contains("failed"));
    let messages = agent.messages().await;
    match &messages[2].content {
        agentflow_rt::MessageContent::Blocks(blocks) => {
            assert!(matches!(&blocks[0], ContentBlock::ToolResult { is_error: true, content, .. } if content.contains("division by zero")));
        }
        _ => panic!("expected a tool-result block"),
    }
}

#[tokio::test]
async fn multiple_tool_calls_in_one_turn_all_execute() {
    let op_a = tool("op_a", "Operation A").param("x", "number").build(|args, _ctx| {
        Box::pin(async move { Ok(format!("a:{}", args["x"])) })
    });
    let op_b = tool("op_b", "Operation B").param("y", "number").build(|args, _ctx| {
        Box::pin(async move { Ok(format!("b:{}", args["y"])) })
    });

    let provider = Arc::new(ScriptedProvider::new(vec![
        multi_tool_use(&[("t1", "op_a", json!({"x": 1})), ("t2", "op_b", json!({"y": 2}))]),
        end_turn("both ran"),
    ]));
    let config = RunConfig::builder()
        .provider(provider)
        .model("test")
        .base_url("http://localhost:1234/v1")
        .tool(op_a)
        .tool(op_b)
        .build()
        .unwrap();
    let agent = Agent::start(config).await.unwrap();

    let reply = agent.chat("run both").await.unwrap();

    assert_eq!(reply, "both ran");
    let messages = agent.messages().await;
    // user, assistant(2 tool_use blocks), tool-result message (2 blocks), assistant(text)
    assert_eq!(messages.len(), 4);
    match &messages[2].content {
        agentflow_rt::MessageContent::Blocks(blocks) => assert_eq!(blocks.len(), 2),
        _ => panic!("expected two tool-result blocks"),
    }
}

#[tokio::test]
async fn large_tool_result_is_handled_without_truncation() {
    let big_data = tool("get_big_data", "Returns large data").build(|_args, _ctx| {
        Box::pin(async move { Ok("x".repeat(10_000)) })
    });
    let provider = Arc::new(ScriptedProvider::new(vec![tool_use("t1", "get_big_data", json!({})), end_turn("got it")]));
    let config = RunConfig::builder()
        .provider(provider)
        .model("test")
        .base_url("http://localhost:1234/v1")
        .tool(big_data)
        .build()
        .unwrap();
    let agent = Agent::start(config).await.unwrap();

    agent.chat("fetch the big blob").await.unwrap();

    let messages = agent.messages().await;
    match &messages[2].content {
        agentflow_rt::MessageContent::Blocks(blocks) => {
            assert!(matches!(&blocks[0], ContentBlock::ToolResult { content, .. } if content.len() == 10_000));
        }
        _ => panic!("expected a tool-result block"),
    }
}

#[tokio::test]
async fn unknown_tool_name_yields_error_result_not_a_panic() {
    let provider = Arc::new(ScriptedProvider::new(vec![tool_use("t1", "nonexistent_tool", json!({})), end_turn("handled")]));
    let config = RunConfig::builder().provider(provider).model("test").base_url("http://localhost:1234/v1").build().unwrap();
    let agent = Agent::start(config).await.unwrap();

    let reply = agent.chat("call a tool that doesn't exist").await.unwrap();

    assert_eq!(reply, "handled");
    let messages = agent.messages().await;
    match &messages[2].content {
        agentflow_rt::MessageContent::Blocks(blocks) => {
            assert!(matches!(&blocks[0], ContentBlock::ToolResult { is_error: true, .. }));
        }
        _ => panic!("expected a tool-result block"),
    }
}
