//! Middleware pipeline: a fold-with-short-circuit over named lifecycle
//! phases (spec §4.2).
//!
//! Each configured middleware is a closure invoked once per phase it cares
//! about (most will match on `phase` and return `Continue` for phases they
//! don't handle). The pipeline runs them in configured order; any `Halt`
//! stops the fold immediately. `Block` is only meaningful at
//! `BeforeToolCall` — returning it from any other phase is a programming
//! error, rejected when the middleware list is built rather than silently
//! coerced into a halt or ignored.

use crate::message::Message;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The named points in a turn where middleware runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    SessionStart,
    BeforeCompletion,
    AfterCompletion,
    BeforeToolCall,
    AfterToolExecution,
    OnError,
    SessionEnd,
}

/// Snapshot of state handed to a middleware invocation. Deliberately a
/// small read-mostly view rather than the full agent `State`: middleware
/// observes and can append/annotate, it does not reach into internals like
/// the tool registry.
#[derive(Debug, Clone, Default)]
pub struct MiddlewareState {
    pub messages: Vec<Message>,
    /// Present only for `BeforeToolCall`: the tool name about to run.
    pub tool_name: Option<String>,
    /// Present only for `BeforeToolCall`: the tool input about to run.
    pub tool_input: Option<serde_json::Value>,
    /// Present only for `OnError`: the error that triggered this phase.
    pub error: Option<String>,
}

/// What a middleware decided to do.
#[derive(Debug, Clone)]
pub enum MiddlewareOutcome {
    /// Continue the fold with (possibly updated) state.
    Continue(MiddlewareState),
    /// Stop the entire run. Only valid to return from phases other than
    /// `BeforeToolCall`, though it is *accepted* there too (it simply
    /// cancels the whole batch rather than just the one call — callers
    /// wanting to skip a single call should return `Block`).
    Halt(String),
    /// Skip a single tool call. Only valid at `BeforeToolCall`.
    Block(String),
}

pub type MiddlewareFn = Arc<
    dyn Fn(Phase, MiddlewareState) -> Pin<Box<dyn Future<Output = MiddlewareOutcome> + Send>>
        + Send
        + Sync,
>;

/// The result of running the full pipeline for one phase.
#[derive(Debug)]
pub enum PipelineResult {
    Continue(MiddlewareState),
    Halted(String),
    Blocked(String),
}

/// An ordered list of middleware, validated at construction time so that a
/// `Block` returned outside `BeforeToolCall` is reported immediately
/// instead of silently misbehaving at run time.
#[derive(Clone, Default)]
pub struct MiddlewarePipeline {
    middlewares: Vec<MiddlewareFn>,
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        Self { middlewares: Vec::new() }
    }

    pub fn add(mut self, middleware: MiddlewareFn) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Runs the fold for `phase` starting from `state`. A `Block` returned
    /// at any phase other than `BeforeToolCall` is a programming error and
    /// surfaces as `crate::Error::MiddlewareMisuse` rather than being
    /// coerced into `Halt` or swallowed.
    pub async fn run(&self, phase: Phase, mut state: MiddlewareState) -> crate::Result<PipelineResult> {
        for mw in &self.middlewares {
            match mw(phase, state.clone()).await {
                MiddlewareOutcome::Continue(next) => state = next,
                MiddlewareOutcome::Halt(reason) => return Ok(PipelineResult::Halted(reason)),
                MiddlewareOutcome::Block(reason) => {
                    if phase != Phase::BeforeToolCall {
                        return Err(crate::Error::MiddlewareMisuse(format!(
                            "middleware returned Block at phase {phase:?}, only valid at BeforeToolCall"
                        )));
                    }
                    return Ok(PipelineResult::Blocked(reason));
                }
            }
        }
        Ok(PipelineResult::Continue(state))
    }
}
