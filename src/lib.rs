//! # agentflow-rt
//!
//! A streaming-first Rust runtime for driving LLM agent conversation loops
//! against local OpenAI-compatible servers (LM Studio, Ollama, llama.cpp,
//! vLLM).
//!
//! ## Key Features
//!
//! - **Turn engine**: provider call → tool execution → repeat, with
//!   max-turns/max-tokens/timeout bounds and a middleware pipeline at every
//!   phase boundary.
//! - **Retries**: full-jitter exponential backoff, deadline-bounded, with a
//!   structured retryable/non-retryable error classification.
//! - **Context compaction**: token-budget-aware history summarization when
//!   a conversation approaches its model's context window.
//! - **Streaming**: incremental content blocks via a chunk callback.
//! - **Agent server**: one actor per conversation — synchronous `chat`,
//!   fire-and-forget `send_message` over pub/sub, cancellable `stop`.
//! - **Scheduler**: named, periodic background jobs running the same turn
//!   engine, with stale-result orphaning across replace/remove.
//! - **Team**: a thin name→agent registry for coordinating more than one
//!   agent under one handle.
//!
//! ## Example
//!
//! ```rust,no_run
//! use agentflow_rt::{Agent, OpenAiProvider, RunConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Arc::new(OpenAiProvider::new());
//!     let config = RunConfig::builder()
//!         .provider(provider)
//!         .model("qwen2.5-32b-instruct")
//!         .base_url("http://localhost:1234/v1")
//!         .system_prompt("You are a helpful assistant")
//!         .build()?;
//!
//!     let agent = Agent::start(config).await?;
//!     let reply = agent.chat("What's the capital of France?").await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **message**: wire-level message/content-block/usage types.
//! - **tools**: tool definitions, JSON schema generation, the registry.
//! - **middleware**: the phase-gated before/after hook pipeline.
//! - **compactor**: token estimation and history compaction.
//! - **provider**: the `Provider` trait and the concrete OpenAI-compatible
//!   HTTP adapter.
//! - **retry**: exponential backoff with jitter, deadline-bounded.
//! - **executor**: concurrent tool-call dispatch and result aggregation.
//! - **pubsub**: the injected pub/sub bus contract plus an in-memory impl.
//! - **state**: `RunConfig`/`AgentState`/`Session` — the shared config and
//!   mutable state types other modules build on.
//! - **turn**: the turn engine (`run_loop`) tying the above together.
//! - **agent**: the Agent server — one actor per conversation.
//! - **scheduler**: periodic background jobs running the turn engine.
//! - **team**: a name-keyed registry over `Agent` handles.
//! - **config**: provider-default-URL helpers for local LLM servers.
//! - **error**: the crate's `Error`/`Result` and the provider error model.

mod message;
mod tools;
mod middleware;
mod compactor;
mod provider;
mod executor;
mod pubsub;
mod state;
mod turn;
mod agent;
mod scheduler;
mod team;

/// Provider-default-URL helpers for LM Studio, Ollama, llama.cpp, and vLLM.
mod config;

/// Error types and conversions used across the crate's public APIs.
mod error;

/// Retry utilities with exponential backoff and jitter, public as a module
/// so callers can reuse `RetryConfig`/`retry_with_backoff` for their own
/// operations.
pub mod retry;

// --- Messages, content, usage ---

pub use message::{ContentBlock, MediaKind, MediaSource, Message, MessageContent, MessageRole, Usage};

// --- Tools ---

pub use tools::{tool, Tool, ToolBuilder, ToolContext, ToolRegistry};

// --- Middleware ---

pub use middleware::{MiddlewareFn, MiddlewareOutcome, MiddlewarePipeline, MiddlewareState, Phase, PipelineResult};

// --- Context compaction ---

pub use compactor::{estimate_tokens, maybe_compact, should_compact};

// --- Provider abstraction ---

pub use provider::{ChunkCallback, CompletionResult, OpenAiProvider, Provider, ProviderConfig, StopReason};

// --- Retry classification ---

pub use retry::RetryConfig;

// --- Tool execution ---

pub use executor::{execute_tool_calls, EventObserver, EventSequence, ExecutorResult, ToolEvent};

// --- Pub/sub ---

pub use pubsub::{InMemoryPubSub, PubSub};

// --- Config, state, session ---

pub use state::{AgentState, RunConfig, RunConfigBuilder, Session, SessionMetadata, Status};

// --- Turn engine ---

pub use turn::{run_loop, TurnOptions};

// --- Agent server ---

pub use agent::{Agent, AgentHealth};

// --- Scheduler ---

pub use scheduler::{JobResult, JobSnapshot, JobSpec, ResultCallback, Scheduler};

// --- Team ---

pub use team::Team;

// --- Local-server provider defaults ---
//
// Renamed on import to `ProviderKind` in the prelude and left as
// `config::Provider` at module scope, since the trait above already claims
// the name `Provider` at the crate root.
pub use config::{get_base_url, get_model};
pub use config::Provider as ProviderKind;

// --- Errors ---

pub use error::{Error, NetworkErrorKind, ProviderError, ProviderErrorKind, Result};

/// Convenience module for typical usage: `use agentflow_rt::prelude::*;`.
pub mod prelude {
    pub use crate::{
        tool, Agent, AgentHealth, AgentState, ChunkCallback, CompletionResult, ContentBlock,
        Error, Message, MessageRole, MiddlewareOutcome, MiddlewarePipeline, OpenAiProvider,
        Phase, Provider, ProviderConfig, ProviderKind, Result, RunConfig, Scheduler, StopReason,
        Team, Tool, ToolContext, TurnOptions, Usage,
    };
}
