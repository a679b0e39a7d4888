//! Tool executor (spec §4.3): runs one assistant turn's `tool_use` calls in
//! parallel, each under its own timeout, emitting start/end telemetry from
//! a single shared monotonic sequence counter, and folds the results back
//! into a single synthetic tool-result message preserving input order.

use crate::message::{ContentBlock, Message};
use crate::middleware::{MiddlewareOutcome, MiddlewarePipeline, MiddlewareState, Phase, PipelineResult};
use crate::tools::{ToolContext, ToolRegistry};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One tool_start/tool_end telemetry event.
#[derive(Debug, Clone)]
pub enum ToolEvent {
    Start { id: String, name: String, input: serde_json::Value, event_seq: u64, correlation_id: String },
    End { id: String, name: String, duration_ms: u64, error: Option<String>, event_seq: u64, start_event_seq: u64, correlation_id: String },
}

pub type EventObserver = Arc<dyn Fn(ToolEvent) + Send + Sync>;

/// Monotonic counter shared across an entire run, so events from every
/// turn and every agent sort globally.
#[derive(Default)]
pub struct EventSequence(AtomicU64);

impl EventSequence {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

enum Dispatch {
    Execute { id: String, name: String, input: serde_json::Value },
    Blocked { id: String, name: String, reason: String },
}

/// Outcome of running the executor for one batch of tool calls.
pub enum ExecutorResult {
    /// A synthetic user message carrying ordered tool_result blocks.
    Message(Message),
    /// A `before_tool_call` middleware halted the whole batch.
    Halted(String),
}

/// Runs `calls` (in order) against `registry`, honoring `before_tool_call`
/// middleware per call, dispatching in parallel with per-call timeout, and
/// folding results back preserving input order.
#[allow(clippy::too_many_arguments)]
pub async fn execute_tool_calls(
    calls: &[(String, String, serde_json::Value)], // (id, name, input)
    registry: &ToolRegistry,
    context: &ToolContext,
    pipeline: &MiddlewarePipeline,
    sequence: &EventSequence,
    observer: Option<EventObserver>,
    correlation_id: &str,
    tool_timeout: Duration,
) -> crate::Result<ExecutorResult> {
    let mut tagged = Vec::with_capacity(calls.len());

    for (id, name, input) in calls {
        let mw_state = MiddlewareState {
            tool_name: Some(name.clone()),
            tool_input: Some(input.clone()),
            ..Default::default()
        };
        match pipeline.run(Phase::BeforeToolCall, mw_state).await? {
            PipelineResult::Halted(reason) => return Ok(ExecutorResult::Halted(reason)),
            PipelineResult::Blocked(reason) => {
                tagged.push(Dispatch::Blocked { id: id.clone(), name: name.clone(), reason });
            }
            PipelineResult::Continue(_) => {
                tagged.push(Dispatch::Execute { id: id.clone(), name: name.clone(), input: input.clone() });
            }
        }
    }

    let mut handles = Vec::with_capacity(tagged.len());
    for entry in tagged {
        let registry = registry.clone();
        let context = context.clone();
        let observer = observer.clone();
        let correlation_id = correlation_id.to_string();
        let start_seq = sequence.next();

        let handle: tokio::task::JoinHandle<ContentBlock> = match entry {
            Dispatch::Blocked { id, name, reason } => {
                if let Some(obs) = &observer {
                    obs(ToolEvent::Start { id: id.clone(), name: name.clone(), input: serde_json::Value::Null, event_seq: start_seq, correlation_id: correlation_id.clone() });
                    obs(ToolEvent::End { id: id.clone(), name, duration_ms: 0, error: Some(reason.clone()), event_seq: sequence.next(), start_event_seq: start_seq, correlation_id });
                }
                tokio::spawn(async move { ContentBlock::tool_result(id, format!("Blocked: {reason}"), true) })
            }
            Dispatch::Execute { id, name, input } => {
                if let Some(obs) = &observer {
                    obs(ToolEvent::Start { id: id.clone(), name: name.clone(), input: input.clone(), event_seq: start_seq, correlation_id: correlation_id.clone() });
                }
                let sequence_next = sequence.next();
                tokio::spawn(async move {
                    let tool = registry.get(&name);
                    let started = std::time::Instant::now();

                    let outcome = match tool {
                        None => Err(format!("Unknown tool: {name}")),
                        Some(tool) => {
                            let fut = tool.execute(input, context);
                            match tokio::time::timeout(tool_timeout, fut).await {
                                Ok(result) => result,
                                Err(_) => Err(format!("Tool '{name}' timed out after {}ms", tool_timeout.as_millis())),
                            }
                        }
                    };

                    let duration_ms = started.elapsed().as_millis() as u64;
                    if let Some(obs) = &observer {
                        obs(ToolEvent::End {
                            id: id.clone(),
                            name: name.clone(),
                            duration_ms,
                            error: outcome.as_ref().err().cloned(),
                            event_seq: sequence_next,
                            start_event_seq: start_seq,
                            correlation_id: correlation_id.clone(),
                        });
                    }

                    match outcome {
                        Ok(content) => ContentBlock::tool_result(id, content, false),
                        Err(message) => ContentBlock::tool_result(id, message, true),
                    }
                })
            }
        };
        handles.push(handle);
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(block) => results.push(block),
            Err(join_err) => {
                warn!("tool worker panicked: {join_err}");
                results.push(ContentBlock::tool_result("unknown", format!("Tool crashed: {join_err}"), true));
            }
        }
    }

    debug!(count = results.len(), "tool executor finished batch");
    Ok(ExecutorResult::Message(Message::tool_results(results)))
}
