//! Advanced integration tests combining more than one feature at once:
//! middleware + tool execution, retries + tools, context compaction mid
//! conversation, and a multi-tool workflow with safety middleware.

use agentflow_rt::{
    retry::retry_with_backoff, tool, Agent, CompletionResult, ContentBlock, Message,
    MiddlewareOutcome, MiddlewarePipeline, Phase, Provider, ProviderConfig, ProviderError,
    RunConfig, StopReason,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct ScriptedProvider {
    script: Mutex<Vec<std::result::Result<CompletionResult, ProviderError>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(script: Vec<std::result::Result<CompletionResult, ProviderError>>) -> Self {
        ScriptedProvider { script: Mutex::new(script), calls: AtomicUsize::new(0) }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
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

/// Middleware + tool execution combined: a safety check blocks one call
/// before it runs, the tool itself rejects a different bad input, and the
/// conversation still reaches a final answer.
#[tokio::test]
async fn middleware_and_tool_execution_combined() {
    let divide = tool("divide", "Divide numbers").param("a", "number").param("b", "number").build(|args, _ctx| {
        Box::pin(async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            if b == 0.0 {
                return Err("division by zero".to_string());
            }
            Ok((a / b).to_string())
        })
    });

    let blocked = Arc::new(AtomicUsize::new(0));
    let blocked_clone = blocked.clone();
    let safety = MiddlewarePipeline::new().add(Arc::new(move |phase, state| {
        let blocked = blocked_clone.clone();
        Box::pin(async move {
            if phase == Phase::BeforeToolCall {
                if let Some(b) = state.tool_input.as_ref().and_then(|v| v.get("b")).and_then(|v| v.as_f64()) {
                    if b == 0.0 {
                        blocked.fetch_add(1, Ordering::SeqCst);
                        return MiddlewareOutcome::Block("division by zero prevented".to_string());
                    }
                }
            }
            MiddlewareOutcome::Continue(state)
        })
    }));

    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_use("t1", "divide", json!({"a": 10, "b": 0})),
        end_turn("I can't divide by zero."),
    ]));
    let config = RunConfig::builder()
        .provider(provider)
        .model("test")
        .base_url("http://localhost:1234/v1")
        .tool(divide)
        .middleware(safety)
        .build()
        .unwrap();
    let agent = Agent::start(config).await.unwrap();

    let reply = agent.chat("divide 10 by 0").await.unwrap();

    assert_eq!(reply, "I can't divide by zero.");
    assert_eq!(blocked.load(Ordering::SeqCst), 1);
}

/// Retry + tool execution coexisting: the provider call that produced the
/// tool_use itself had to be retried past a transient error first.
#[tokio::test]
async fn retry_and_tool_execution_coexist() {
    let echo = tool("echo", "Echo input").param("msg", "string").build(|args, _ctx| {
        Box::pin(async move { Ok(args["msg"].as_str().unwrap_or_default().to_string()) })
    });

    let provider = Arc::new(ScriptedProvider::new(vec![
        Err(ProviderError::parse("rate_limit_error: slow down")),
        tool_use("t1", "echo", json!({"msg": "hi"})),
        end_turn("echoed: hi"),
    ]));
    let provider_handle = provider.clone();
    let config = RunConfig::builder()
        .provider(provider)
        .model("test")
        .base_url("http://localhost:1234/v1")
        .tool(echo)
        .max_retries(3)
        .retry_backoff_ms(10)
        .build()
        .unwrap();
    let agent = Agent::start(config).await.unwrap();

    let start = Instant::now();
    let reply = agent.chat("echo hi").await.unwrap();

    assert_eq!(reply, "echoed: hi");
    assert_eq!(provider_handle.call_count(), 3);
    assert!(start.elapsed() < Duration::from_secs(1));
}

/// A realistic multi-tool workflow: calculate then format, with a safety
/// middleware guarding the calculator and a log of every call observed.
#[tokio::test]
async fn multi_tool_workflow_with_safety_and_logging() {
    let calc = tool("calculate", "Calculate").param("a", "number").param("b", "number").param("op", "string").build(|args, _ctx| {
        Box::pin(async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            let op = args["op"].as_str().unwrap_or("add");
            let result = match op {
                "add" => a + b,
                "multiply" => a * b,
                "divide" if b == 0.0 => return Err("division by zero".to_string()),
                "divide" => a / b,
                _ => a + b,
            };
            Ok(result.to_string())
        })
    });
    let format = tool("format", "Format a result").param("value", "number").build(|args, _ctx| {
        Box::pin(async move { Ok(format!("{:.2}", args["value"].as_f64().unwrap_or(0.0))) })
    });

    let log = Arc::new(Mutex::new(Vec::new()));
    let log_clone = log.clone();
    let safety = MiddlewarePipeline::new().add(Arc::new(move |phase, state| {
        let log = log_clone.clone();
        Box::pin(async move {
            if phase == Phase::BeforeToolCall {
                let name = state.tool_name.clone().unwrap_or_default();
                log.lock().unwrap().push(name.clone());
                if name == "calculate" {
                    let op = state.tool_input.as_ref().and_then(|v| v.get("op")).and_then(|v| v.as_str());
                    let b = state.tool_input.as_ref().and_then(|v| v.get("b")).and_then(|v| v.as_f64());
                    if op == Some("divide") && b == Some(0.0) {
                        return MiddlewareOutcome::Block("division by zero prevented".to_string());
                    }
                }
            }
            MiddlewareOutcome::Continue(state)
        })
    }));

    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_use("t1", "calculate", json!({"a": 7, "b": 6, "op": "multiply"})),
        tool_use("t2", "format", json!({"value": 42})),
        end_turn("Result: 42.00"),
    ]));
    let config = RunConfig::builder()
        .provider(provider)
        .model("test")
        .base_url("http://localhost:1234/v1")
        .tool(calc)
        .tool(format)
        .middleware(safety)
        .max_turns(10)
        .build()
        .unwrap();
    let agent = Agent::start(config).await.unwrap();

    let reply = agent.chat("multiply 7 and 6, then format it").await.unwrap();

    assert_eq!(reply, "Result: 42.00");
    assert_eq!(*log.lock().unwrap(), vec!["calculate", "format"]);
}

/// `retry_with_backoff` (the crate's public generic retry helper) used
/// around an `agent.chat` call, the way a caller would wrap any operation.
#[tokio::test]
async fn retry_with_backoff_wraps_agent_chat() {
    let provider = Arc::new(ScriptedProvider::new(vec![end_turn("ok")]));
    let config = RunConfig::builder().provider(provider).model("test").base_url("http://localhost:1234/v1").build().unwrap();
    let agent = Agent::start(config).await.unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = attempts.clone();
    let result = retry_with_backoff(Default::default(), || {
        let agent = agent.clone();
        let attempts = attempts_clone.clone();
        async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            agent.chat("hi").await
        }
    })
    .await
    .unwrap();

    assert_eq!(result, "ok");
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
