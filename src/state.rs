//! Shared config/state/session types (spec §3), owned in practice by one
//! Agent server (C7) but referenced by the Turn engine (C6) and Scheduler
//! (C8) too.

use crate::message::{Message, Usage};
use crate::middleware::MiddlewarePipeline;
use crate::provider::Provider;
use crate::pubsub::PubSub;
use crate::tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Terminal/non-terminal status of one Agent server's `State`. A superset
/// covering every transition the Turn engine can produce plus the
/// server-level `idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Idle,
    Running,
    Completed,
    Error,
    MaxTurns,
    Halted,
}

/// Immutable per-run configuration (spec §3/§6 — the exhaustive option
/// list). Built once via [`RunConfigBuilder`] and never mutated in place;
/// `Agent::set_model` replaces it wholesale.
#[derive(Clone)]
pub struct RunConfig {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub temperature: Option<f32>,
    pub tools: ToolRegistry,
    pub system_prompt: Option<String>,
    pub max_turns: u32,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout_ms: u64,
    pub tool_timeout_ms: u64,
    pub middleware: MiddlewarePipeline,
    pub working_directory: String,
    pub context: HashMap<String, serde_json::Value>,
    pub pubsub: Option<Arc<dyn PubSub>>,
    pub subscribe: Vec<String>,
    pub on_shutdown: Option<Arc<dyn Fn(Session) + Send + Sync>>,
}

impl RunConfig {
    pub fn session_id(&self) -> Option<&str> {
        self.context.get("session_id").and_then(|v| v.as_str())
    }
}

pub struct RunConfigBuilder {
    provider: Option<Arc<dyn Provider>>,
    model: String,
    base_url: String,
    api_key: String,
    temperature: Option<f32>,
    tools: Vec<crate::tools::Tool>,
    system_prompt: Option<String>,
    max_turns: u32,
    max_tokens: u32,
    max_retries: u32,
    retry_backoff_ms: u64,
    timeout_ms: u64,
    tool_timeout_ms: u64,
    middleware: MiddlewarePipeline,
    working_directory: String,
    context: HashMap<String, serde_json::Value>,
    pubsub: Option<Arc<dyn PubSub>>,
    subscribe: Vec<String>,
    on_shutdown: Option<Arc<dyn Fn(Session) + Send + Sync>>,
}

impl Default for RunConfigBuilder {
    fn default() -> Self {
        RunConfigBuilder {
            provider: None,
            model: String::new(),
            base_url: String::new(),
            api_key: "not-needed".to_string(),
            temperature: None,
            tools: Vec::new(),
            system_prompt: None,
            max_turns: 25,
            max_tokens: 200_000,
            max_retries: 3,
            retry_backoff_ms: 1000,
            timeout_ms: 120_000,
            tool_timeout_ms: 120_000,
            middleware: MiddlewarePipeline::new(),
            working_directory: ".".to_string(),
            context: HashMap::new(),
            pubsub: None,
            subscribe: Vec::new(),
            on_shutdown: None,
        }
    }
}

macro_rules! setter {
    ($name:ident, $ty:ty) => {
        pub fn $name(mut self, value: $ty) -> Self {
            self.$name = value;
            self
        }
    };
}

impl RunConfigBuilder {
    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn tool(mut self, tool: crate::tools::Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: Vec<crate::tools::Tool>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn middleware(mut self, middleware: MiddlewarePipeline) -> Self {
        self.middleware = middleware;
        self
    }

    pub fn pubsub(mut self, pubsub: Arc<dyn PubSub>) -> Self {
        self.pubsub = Some(pubsub);
        self
    }

    pub fn subscribe(mut self, topics: Vec<String>) -> Self {
        self.subscribe = topics;
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn on_shutdown(mut self, callback: impl Fn(Session) + Send + Sync + 'static) -> Self {
        self.on_shutdown = Some(Arc::new(callback));
        self
    }

    setter!(temperature, Option<f32>);
    setter!(max_turns, u32);
    setter!(max_tokens, u32);
    setter!(max_retries, u32);
    setter!(retry_backoff_ms, u64);
    setter!(timeout_ms, u64);
    setter!(tool_timeout_ms, u64);
    setter!(working_directory, String);

    pub fn build(self) -> crate::Result<RunConfig> {
        let provider = self
            .provider
            .ok_or_else(|| crate::Error::config("provider is required"))?;
        if self.model.trim().is_empty() {
            return Err(crate::Error::config("model is required"));
        }
        if self.base_url.trim().is_empty() {
            return Err(crate::Error::config("base_url is required"));
        }

        Ok(RunConfig {
            provider,
            model: self.model,
            base_url: self.base_url,
            api_key: self.api_key,
            temperature: self.temperature,
            tools: ToolRegistry::build(self.tools)?,
            system_prompt: self.system_prompt,
            max_turns: self.max_turns,
            max_tokens: self.max_tokens,
            max_retries: self.max_retries,
            retry_backoff_ms: self.retry_backoff_ms,
            timeout_ms: self.timeout_ms,
            tool_timeout_ms: self.tool_timeout_ms,
            middleware: self.middleware,
            working_directory: self.working_directory,
            context: self.context,
            pubsub: self.pubsub,
            subscribe: self.subscribe,
            on_shutdown: self.on_shutdown,
        })
    }
}

impl RunConfig {
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }
}

/// A running or just-completed async turn. Carries an `AbortHandle` rather
/// than the `JoinHandle` itself so the supervisor task can still own and
/// await the `JoinHandle` while `Agent::stop()` can independently cancel it.
pub struct CurrentTask {
    pub task_handle: tokio::task::AbortHandle,
    pub correlation_id: String,
}

/// Mutable state owned by exactly one Agent server.
pub struct AgentState {
    pub config: RunConfig,
    pub messages: Vec<Message>,
    pub turn_count: u32,
    pub usage: Usage,
    pub status: Status,
    pub last_error: Option<String>,
    pub scratchpad: Arc<Mutex<HashMap<String, String>>>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub agent_id: String,
    pub current_task: Option<CurrentTask>,
}

impl AgentState {
    pub fn new(config: RunConfig) -> Self {
        let agent_id = config
            .session_id()
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        AgentState {
            config,
            messages: Vec::new(),
            turn_count: 0,
            usage: Usage::default(),
            status: Status::Idle,
            last_error: None,
            scratchpad: Arc::new(Mutex::new(HashMap::new())),
            started_at: chrono::Utc::now(),
            agent_id,
            current_task: None,
        }
    }

    /// `context.session_id` if present, else the agent's own id. Derived,
    /// never stored separately, so it is always consistent with whichever
    /// config is currently installed.
    pub fn effective_session_id(&self) -> String {
        self.config.session_id().map(|s| s.to_string()).unwrap_or_else(|| self.agent_id.clone())
    }

    pub fn responses_topic(&self) -> String {
        format!("agent:{}:responses", self.effective_session_id())
    }

    pub fn is_busy(&self) -> bool {
        self.current_task.is_some()
    }
}

/// Exported conversation envelope, suitable for handing to a persistence
/// backend (spec §6 — the contract only, no concrete backend in scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
    pub usage: Usage,
    pub metadata: SessionMetadata,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub status: Status,
    pub turns: u32,
    pub provider: String,
}

impl AgentState {
    pub fn export_session(&self) -> Session {
        Session {
            id: self.effective_session_id(),
            messages: self.messages.clone(),
            usage: self.usage,
            metadata: SessionMetadata { status: self.status, turns: self.turn_count, provider: self.config.model.clone() },
            created_at: self.started_at,
            updated_at: chrono::Utc::now(),
        }
    }
}
