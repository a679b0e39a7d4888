//! Integration tests verifying that the crate's modules work together
//! correctly through their public API.

use agentflow_rt::{tool, retry::RetryConfig, ContentBlock, Error, Message, MessageRole, Result};

#[test]
fn run_config_builder_registers_tools() {
    let calculator = tool("add", "Add two numbers")
        .param("a", "number")
        .param("b", "number")
        .build(|args, _ctx| {
            Box::pin(async move {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok((a + b).to_string())
            })
        });

    let config = agentflow_rt::RunConfig::builder()
        .system_prompt("You are a calculator assistant")
        .model("test-model")
        .base_url("http://localhost:1234/v1")
        .tool(calculator)
        .provider(std::sync::Arc::new(agentflow_rt::OpenAiProvider::new()))
        .build()
        .unwrap();

    assert!(config.tools.get("add").is_some());
    assert!(!config.tools.is_empty());
}

#[test]
fn message_construction_flow() {
    let user_msg = Message::user("Hello");
    let system_msg = Message::system("You are helpful");
    let assistant_msg = Message::assistant_blocks(vec![ContentBlock::text("Hi there!")]);

    assert!(matches!(user_msg.role, MessageRole::User));
    assert!(matches!(system_msg.role, MessageRole::System));
    assert!(matches!(assistant_msg.role, MessageRole::Assistant));
}

#[test]
fn context_management_integration() {
    use agentflow_rt::{estimate_tokens, maybe_compact, should_compact};

    let mut messages = vec![
        Message::system("System prompt"),
        Message::user("User message 1"),
        Message::assistant_blocks(vec![ContentBlock::text("Response 1")]),
        Message::user("User message 2"),
    ];

    let tokens = estimate_tokens(&messages);
    assert!(tokens > 0);

    // Small history, well under budget: no compaction needed.
    assert!(!should_compact(&messages, 100_000));
    let before = messages.len();
    maybe_compact(&mut messages, 100_000);
    assert_eq!(messages.len(), before);
}

#[test]
fn retry_config_integration() {
    use std::time::Duration;

    let config = RetryConfig::new()
        .with_max_attempts(5)
        .with_initial_delay(Duration::from_millis(100))
        .with_backoff_multiplier(1.5);

    assert_eq!(config.max_attempts, 5);
    assert_eq!(config.initial_delay, Duration::from_millis(100));
    assert_eq!(config.backoff_multiplier, 1.5);
}

#[tokio::test]
async fn tool_execution() {
    let multiply = tool("multiply", "Multiply two numbers")
        .param("x", "number")
        .param("y", "number")
        .build(|args, _ctx| {
            Box::pin(async move {
                let x = args["x"].as_f64().unwrap_or(0.0);
                let y = args["y"].as_f64().unwrap_or(0.0);
                Ok((x * y).to_string())
            })
        });

    let result = multiply.execute(serde_json::json!({"x": 5.0, "y": 3.0}), agentflow_rt::ToolContext::default()).await.unwrap();

    assert_eq!(result, "15");
}

#[test]
fn error_handling_integration() {
    fn operation_that_fails() -> Result<()> {
        Err(Error::timeout())
    }

    fn operation_that_succeeds() -> Result<i32> {
        Ok(42)
    }

    assert!(operation_that_fails().is_err());
    assert_eq!(operation_that_succeeds().unwrap(), 42);
}

#[test]
fn content_blocks() {
    let text = ContentBlock::text("Hello");
    let tool_use = ContentBlock::tool_use("call_1", "tool_name", serde_json::json!({}));

    match text {
        ContentBlock::Text { text } => assert_eq!(text, "Hello"),
        _ => panic!("expected a text block"),
    }

    match tool_use {
        ContentBlock::ToolUse { name, .. } => assert_eq!(name, "tool_name"),
        _ => panic!("expected a tool-use block"),
    }
}

#[test]
fn builder_pattern_chain() {
    let result = agentflow_rt::RunConfig::builder()
        .system_prompt("Test")
        .model("model")
        .base_url("http://localhost:1234/v1")
        .temperature(Some(0.7))
        .provider(std::sync::Arc::new(agentflow_rt::OpenAiProvider::new()))
        .build();

    assert!(result.is_ok());
    let config = result.unwrap();
    assert_eq!(config.temperature, Some(0.7));
}

#[test]
fn builder_rejects_missing_provider() {
    let result = agentflow_rt::RunConfig::builder().model("model").base_url("http://localhost:1234/v1").build();
    assert!(result.is_err());
}
