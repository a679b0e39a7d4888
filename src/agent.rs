//! Agent server (spec §4.6): one actor per conversation, wrapping an
//! [`AgentState`] behind a mutex so synchronous calls (`chat`) and
//! fire-and-forget async calls (`send_message`) can share the same turn
//! engine without racing each other's message history.
//!
//! Grounded in the teacher's `Client` (the `send`/`receive`/`auto_execute_loop`
//! turn-taking shape, `interrupt()` cancellation), generalized from a plain
//! owned struct into a cloneable handle over shared state so pub/sub delivery
//! and `send_message` can run turns in the background while `health`/`messages`
//! stay readable from other callers.

use crate::message::{Message, Usage};
use crate::middleware::{MiddlewareState, Phase, PipelineResult};
use crate::state::{AgentState, CurrentTask, RunConfig, Session, Status};
use crate::turn::{run_loop, TurnOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::warn;

/// Point-in-time health snapshot (spec §4.6 `health`:
/// `{status, turns, message_count, usage, uptime_ms, busy}`, plus the
/// agent's id for convenience).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHealth {
    pub agent_id: String,
    pub status: Status,
    pub busy: bool,
    pub turn_count: u32,
    pub message_count: usize,
    pub usage: Usage,
    pub uptime_ms: u64,
}

/// A running agent. Cheap to clone — clones share the same underlying state.
#[derive(Clone)]
pub struct Agent {
    state: Arc<Mutex<AgentState>>,
}

impl Agent {
    /// Builds the agent, runs `session_start` middleware (a halt here
    /// refuses to start the agent at all), and, if `config.pubsub` and
    /// `config.subscribe` are set, spawns one listener task per subscribed
    /// topic.
    pub async fn start(config: RunConfig) -> crate::Result<Self> {
        let middleware = config.middleware.clone();
        if let PipelineResult::Halted(reason) =
            middleware.run(Phase::SessionStart, MiddlewareState::default()).await?
        {
            return Err(crate::Error::Halted(reason));
        }

        let agent = Agent { state: Arc::new(Mutex::new(AgentState::new(config))) };
        agent.spawn_subscriptions();
        Ok(agent)
    }

    fn spawn_subscriptions(&self) {
        let (pubsub, topics) = {
            // No lock needed yet (state was just constructed, uncontended),
            // but go through the mutex so this stays correct if `start` is
            // ever called on state built elsewhere.
            let guard = self.state.try_lock().expect("freshly constructed agent state is never contended");
            (guard.config.pubsub.clone(), guard.config.subscribe.clone())
        };
        let Some(pubsub) = pubsub else { return };

        for topic in topics {
            let mut rx = pubsub.subscribe(&topic);
            let state = self.state.clone();
            let topic_name = topic.clone();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(value) => Self::handle_incoming(&state, &topic_name, value).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(topic = %topic_name, skipped, "subscriber lagged, dropping skipped messages");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        }
    }

    async fn handle_incoming(state: &Arc<Mutex<AgentState>>, topic: &str, value: serde_json::Value) {
        let text = value.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        if text.is_empty() {
            return;
        }

        let started = {
            let mut guard = state.lock().await;
            if guard.is_busy() {
                warn!(topic, "dropping incoming message: agent busy");
                false
            } else {
                guard.messages.push(Message::user(text));
                true
            }
        };

        if started {
            let request_id = uuid::Uuid::new_v4().simple().to_string();
            spawn_supervised_turn(state.clone(), request_id).await;
        }
    }

    /// Runs one synchronous turn to completion and returns the final
    /// assistant text. Rejects with [`crate::Error::Busy`] if an async turn
    /// (from `send_message` or a subscription) is already in flight.
    pub async fn chat(&self, text: impl Into<String>) -> crate::Result<String> {
        let mut guard = self.state.try_lock().map_err(|_| crate::Error::Busy)?;
        if guard.is_busy() {
            return Err(crate::Error::Busy);
        }
        guard.messages.push(Message::user(text.into()));
        run_loop(&mut guard, TurnOptions::default()).await?;
        Ok(guard.messages.last().map(|m| m.text()).unwrap_or_default())
    }

    /// Streaming variant of [`Agent::chat`]; `on_chunk` is invoked for every
    /// incremental content block the provider emits.
    pub async fn stream_chat(
        &self,
        text: impl Into<String>,
        on_chunk: crate::provider::ChunkCallback,
    ) -> crate::Result<String> {
        let mut guard = self.state.try_lock().map_err(|_| crate::Error::Busy)?;
        if guard.is_busy() {
            return Err(crate::Error::Busy);
        }
        guard.messages.push(Message::user(text.into()));
        run_loop(&mut guard, TurnOptions { streaming: true, on_chunk: Some(on_chunk) }).await?;
        Ok(guard.messages.last().map(|m| m.text()).unwrap_or_default())
    }

    /// Fire-and-forget: appends the message, starts the turn in the
    /// background, and returns a request id immediately. The turn's result
    /// is broadcast on `agent:<id>:responses` as `{response, result}`, where
    /// `result` carries `{text, messages, usage, status, turns, error,
    /// request_id}`, once it finishes. Requires a configured pub/sub bus.
    ///
    /// `request_id` lets the caller correlate the broadcast itself; if not
    /// supplied, one is generated.
    pub async fn send_message(
        &self,
        text: impl Into<String>,
        request_id: Option<String>,
    ) -> crate::Result<String> {
        {
            let guard = self.state.try_lock().map_err(|_| crate::Error::Busy)?;
            if guard.config.pubsub.is_none() {
                return Err(crate::Error::NoPubsub);
            }
            if guard.is_busy() {
                return Err(crate::Error::Busy);
            }
        }
        {
            let mut guard = self.state.lock().await;
            guard.messages.push(Message::user(text.into()));
        }
        let request_id = request_id.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        spawn_supervised_turn(self.state.clone(), request_id.clone()).await;
        Ok(request_id)
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.messages.clone()
    }

    pub async fn usage(&self) -> Usage {
        self.state.lock().await.usage
    }

    /// Clears history, usage, and turn count; does not touch config.
    pub async fn reset(&self) -> crate::Result<()> {
        let mut guard = self.state.try_lock().map_err(|_| crate::Error::Busy)?;
        if guard.is_busy() {
            return Err(crate::Error::Busy);
        }
        guard.messages.clear();
        guard.usage = Usage::default();
        guard.turn_count = 0;
        guard.status = Status::Idle;
        guard.last_error = None;
        Ok(())
    }

    /// Replaces the configured model, leaving history and every other
    /// config field untouched.
    pub async fn set_model(&self, model: impl Into<String>) -> crate::Result<()> {
        let mut guard = self.state.try_lock().map_err(|_| crate::Error::Busy)?;
        if guard.is_busy() {
            return Err(crate::Error::Busy);
        }
        guard.config.model = model.into();
        Ok(())
    }

    pub async fn export_session(&self) -> Session {
        self.state.lock().await.export_session()
    }

    pub async fn health(&self) -> AgentHealth {
        let guard = self.state.lock().await;
        let uptime_ms = (chrono::Utc::now() - guard.started_at).num_milliseconds().max(0) as u64;
        AgentHealth {
            agent_id: guard.agent_id.clone(),
            status: guard.status,
            busy: guard.is_busy(),
            turn_count: guard.turn_count,
            message_count: guard.messages.len(),
            usage: guard.usage,
            uptime_ms,
        }
    }

    /// Cancels any in-flight async turn, runs `session_end` middleware, and
    /// invokes the configured shutdown callback (if any) with the exported
    /// session.
    pub async fn stop(&self) -> crate::Result<()> {
        let mut guard = self.state.lock().await;
        if let Some(task) = guard.current_task.take() {
            task.task_handle.abort();
        }
        let messages = guard.messages.clone();
        let middleware = guard.config.middleware.clone();
        drop(guard);

        middleware.run(Phase::SessionEnd, MiddlewareState { messages, ..Default::default() }).await?;

        let mut guard = self.state.lock().await;
        if guard.status == Status::Running {
            guard.status = Status::Halted;
        }
        let session = guard.export_session();
        let callback = guard.config.on_shutdown.clone();
        drop(guard);

        if let Some(cb) = callback {
            cb(session);
        }
        Ok(())
    }
}

/// Spawns the turn itself plus a supervisor that clears `current_task`,
/// reconciles status on cancellation/panic, and broadcasts the outcome —
/// shared by `send_message` and incoming pub/sub delivery.
async fn spawn_supervised_turn(state: Arc<Mutex<AgentState>>, request_id: String) {
    let turn_state = state.clone();
    let inner_handle = tokio::spawn(async move {
        let mut guard = turn_state.lock().await;
        let _ = run_loop(&mut guard, TurnOptions::default()).await;
    });
    let abort_handle = inner_handle.abort_handle();

    {
        let mut guard = state.lock().await;
        guard.current_task = Some(CurrentTask { task_handle: abort_handle, correlation_id: request_id.clone() });
    }

    let supervisor_state = state.clone();
    let request_id_for_supervisor = request_id;
    tokio::spawn(async move {
        let join_result = inner_handle.await;
        let mut guard = supervisor_state.lock().await;
        guard.current_task = None;

        match &join_result {
            Ok(()) => {}
            Err(join_err) if join_err.is_cancelled() => {
                guard.status = Status::Halted;
                guard.last_error = Some("turn cancelled by stop()".to_string());
            }
            Err(join_err) => {
                guard.status = Status::Error;
                guard.last_error = Some(format!("agent task crashed: {join_err}"));
            }
        }

        let topic = guard.responses_topic();
        let text = guard.messages.last().map(|m| m.text()).unwrap_or_default();
        let result = serde_json::json!({
            "text": text,
            "messages": guard.messages,
            "usage": guard.usage,
            "status": guard.status,
            "turns": guard.turn_count,
            "error": guard.last_error,
            "request_id": request_id_for_supervisor,
        });
        let payload = serde_json::json!({ "response": text, "result": result });
        if let Some(pubsub) = guard.config.pubsub.clone() {
            pubsub.broadcast(&topic, payload);
        }
    });
}
