//! The Turn engine (spec §4.5/§6): one provider call, parse, dispatch tool
//! calls, repeat — with deadline-bounded full-jitter retry, an optional
//! streaming path, and the middleware pipeline wired in at every phase.

use crate::compactor::maybe_compact;
use crate::executor::{execute_tool_calls, EventSequence, ExecutorResult};
use crate::message::{ContentBlock, Message, MessageContent};
use crate::middleware::{MiddlewareState, Phase, PipelineResult};
use crate::provider::{ChunkCallback, ProviderConfig, StopReason};
use crate::retry::retry_provider_call;
use crate::state::{AgentState, Status};
use crate::tools::ToolContext;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Caller-facing options for one `run_loop` invocation.
#[derive(Default, Clone)]
pub struct TurnOptions {
    pub streaming: bool,
    pub on_chunk: Option<ChunkCallback>,
}

/// Bound subtracted from `timeout_ms` so the Turn engine always has a
/// little room to finish bookkeeping before its caller's own deadline
/// would expire (spec §4.5 step 5 / §5).
const DEADLINE_SLACK_MS: u64 = 5000;
const MIN_RECEIVE_TIMEOUT_MS: u64 = 5000;

fn extract_tool_calls(messages: &[Message]) -> Vec<(String, String, serde_json::Value)> {
    messages
        .iter()
        .flat_map(|m| match &m.content {
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse { id, name, input } => Some((id.clone(), name.clone(), input.clone())),
                    _ => None,
                })
                .collect::<Vec<_>>(),
            MessageContent::Text(_) => Vec::new(),
        })
        .collect()
}

/// Drives `state` through turns until a terminal status is reached. On
/// return, `state.status` is one of completed/error/max_turns/halted and
/// `state.last_error` is set for the non-completed outcomes.
pub async fn run_loop(state: &mut AgentState, options: TurnOptions) -> crate::Result<()> {
    let start = Instant::now();
    let deadline = start + Duration::from_millis(state.config.timeout_ms.saturating_sub(DEADLINE_SLACK_MS).max(1000));
    let correlation_id = uuid::Uuid::new_v4().simple().to_string();
    let sequence = EventSequence::new();
    state.status = Status::Running;

    loop {
        if state.turn_count >= state.config.max_turns {
            state.status = Status::MaxTurns;
            state.last_error = Some("max_turns reached".to_string());
            return Ok(());
        }

        maybe_compact(&mut state.messages, state.config.max_tokens);

        let before = state
            .config
            .middleware
            .run(Phase::BeforeCompletion, MiddlewareState { messages: state.messages.clone(), ..Default::default() })
            .await?;
        match before {
            PipelineResult::Halted(reason) => {
                state.status = Status::Halted;
                state.last_error = Some(format!("Halted by middleware: {reason}"));
                return Ok(());
            }
            PipelineResult::Blocked(_) => {
                return Err(crate::Error::MiddlewareMisuse(
                    "middleware returned Block at before_completion".to_string(),
                ));
            }
            PipelineResult::Continue(_) => {}
        }

        let now = Instant::now();
        let receive_timeout_ms = deadline.saturating_duration_since(now).as_millis().max(MIN_RECEIVE_TIMEOUT_MS as u128) as u64;
        let provider_config = ProviderConfig {
            model: state.config.model.clone(),
            base_url: state.config.base_url.clone(),
            api_key: state.config.api_key.clone(),
            system_prompt: state.config.system_prompt.clone(),
            temperature: state.config.temperature,
            max_tokens: Some(state.config.max_tokens),
            receive_timeout_ms,
        };

        let retry_config = crate::retry::RetryConfig::new()
            .with_max_attempts(state.config.max_retries + 1)
            .with_initial_delay(Duration::from_millis(state.config.retry_backoff_ms));

        let streamed_any = Arc::new(AtomicBool::new(false));
        let tool_defs = state.config.tools.definitions();
        let messages = state.messages.clone();
        let provider = state.config.provider.clone();
        let streaming = options.streaming && provider.supports_streaming();
        let on_chunk = options.on_chunk.clone();

        let call_result = if streaming {
            let streamed_flag = streamed_any.clone();
            let on_chunk: ChunkCallback = {
                let on_chunk = on_chunk.clone();
                Arc::new(move |block: ContentBlock| {
                    streamed_flag.store(true, Ordering::SeqCst);
                    if let Some(cb) = &on_chunk {
                        cb(block);
                    }
                })
            };
            retry_provider_call(
                &retry_config,
                deadline,
                || streamed_any.load(Ordering::SeqCst),
                || {
                    let provider = provider.clone();
                    let messages = messages.clone();
                    let tool_defs = tool_defs.clone();
                    let provider_config = provider_config.clone();
                    let on_chunk = on_chunk.clone();
                    async move { provider.stream(&messages, &tool_defs, &provider_config, on_chunk).await }
                },
            )
            .await
        } else {
            retry_provider_call(
                &retry_config,
                deadline,
                || false,
                || {
                    let provider = provider.clone();
                    let messages = messages.clone();
                    let tool_defs = tool_defs.clone();
                    let provider_config = provider_config.clone();
                    async move { provider.complete(&messages, &tool_defs, &provider_config).await }
                },
            )
            .await
        };

        let completion = match call_result {
            Ok(c) => c,
            Err(provider_err) => {
                warn!(error = %provider_err, "provider call failed");
                let on_error = state
                    .config
                    .middleware
                    .run(
                        Phase::OnError,
                        MiddlewareState { messages: state.messages.clone(), error: Some(provider_err.to_string()), ..Default::default() },
                    )
                    .await?;
                state.last_error = Some(provider_err.to_string());
                state.status = match on_error {
                    PipelineResult::Halted(reason) => {
                        state.last_error = Some(format!("Halted by middleware: {reason}"));
                        Status::Halted
                    }
                    _ => Status::Error,
                };
                return Ok(());
            }
        };

        state.messages.extend(completion.messages.clone());
        state.turn_count += 1;
        state.usage.merge(&completion.usage);

        let after = state
            .config
            .middleware
            .run(Phase::AfterCompletion, MiddlewareState { messages: state.messages.clone(), ..Default::default() })
            .await?;
        if let PipelineResult::Halted(reason) = after {
            state.status = Status::Halted;
            state.last_error = Some(format!("Halted by middleware: {reason}"));
            return Ok(());
        }

        match completion.stop_reason {
            StopReason::EndTurn => {
                state.status = Status::Completed;
                info!(turns = state.turn_count, "turn engine completed");
                return Ok(());
            }
            StopReason::ToolUse => {
                let calls = extract_tool_calls(&completion.messages);
                let context = ToolContext {
                    working_directory: state.config.working_directory.clone(),
                    config: state.config.context.clone(),
                    scratchpad: Some(state.scratchpad.clone()),
                    extra: Default::default(),
                };

                let exec_result = execute_tool_calls(
                    &calls,
                    &state.config.tools,
                    &context,
                    &state.config.middleware,
                    &sequence,
                    None,
                    &correlation_id,
                    Duration::from_millis(state.config.tool_timeout_ms),
                )
                .await?;

                match exec_result {
                    ExecutorResult::Halted(reason) => {
                        state.status = Status::Halted;
                        state.last_error = Some(format!("Halted by middleware: {reason}"));
                        return Ok(());
                    }
                    ExecutorResult::Message(tool_result_message) => {
                        state.messages.push(tool_result_message);

                        let after_tools = state
                            .config
                            .middleware
                            .run(Phase::AfterToolExecution, MiddlewareState { messages: state.messages.clone(), ..Default::default() })
                            .await?;
                        if let PipelineResult::Halted(reason) = after_tools {
                            state.status = Status::Halted;
                            state.last_error = Some(format!("Halted by middleware: {reason}"));
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
