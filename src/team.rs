//! Team facade (spec §4 supplement): a thin name-keyed registry over
//! [`Agent`] handles, for callers coordinating more than one agent under
//! one name.
//!
//! Grounded in `sblanchard-SerialAgent`'s gateway `NodeRegistry` — a
//! thread-safe name→handle map with register/remove/list/get-by-name — cut
//! down to what a team of agents actually needs: no capability matching or
//! affinity routing, since every member is addressed by name, not by what
//! it can do.

use crate::agent::{Agent, AgentHealth};
use std::collections::HashMap;
use std::sync::RwLock;

/// A named group of agents. Cheap to clone — clones share the same
/// underlying membership.
#[derive(Clone, Default)]
pub struct Team {
    members: std::sync::Arc<RwLock<HashMap<String, Agent>>>,
}

impl Team {
    pub fn new() -> Self {
        Team::default()
    }

    /// Builds a team from an initial `(name, agent)` list.
    pub fn with_members(members: impl IntoIterator<Item = (String, Agent)>) -> Self {
        let team = Team::new();
        for (name, agent) in members {
            team.add(name, agent);
        }
        team
    }

    /// Adds a member, replacing any existing agent under the same name.
    pub fn add(&self, name: impl Into<String>, agent: Agent) {
        self.members.write().unwrap().insert(name.into(), agent);
    }

    /// Removes a member by name. Returns the removed handle, if any.
    pub fn remove(&self, name: &str) -> Option<Agent> {
        self.members.write().unwrap().remove(name)
    }

    /// Looks up a member by name.
    pub fn get(&self, name: &str) -> Option<Agent> {
        self.members.read().unwrap().get(name).cloned()
    }

    /// Names of every current member, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.members.read().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().unwrap().is_empty()
    }

    /// Runs `chat(text)` against every member concurrently, keyed by name.
    /// A member whose turn errors contributes `Err` under its own name
    /// rather than failing the whole broadcast.
    pub async fn broadcast(&self, text: impl Into<String> + Clone) -> HashMap<String, crate::Result<String>> {
        let snapshot: Vec<(String, Agent)> = self.members.read().unwrap().iter().map(|(n, a)| (n.clone(), a.clone())).collect();

        let mut tasks = Vec::with_capacity(snapshot.len());
        for (name, agent) in snapshot {
            let text = text.clone().into();
            tasks.push(async move { (name, agent.chat(text).await) });
        }

        futures::future::join_all(tasks).await.into_iter().collect()
    }

    /// Health snapshots for every member, keyed by name.
    pub async fn health(&self) -> HashMap<String, AgentHealth> {
        let snapshot: Vec<(String, Agent)> = self.members.read().unwrap().iter().map(|(n, a)| (n.clone(), a.clone())).collect();

        let mut tasks = Vec::with_capacity(snapshot.len());
        for (name, agent) in snapshot {
            tasks.push(async move { (name, agent.health().await) });
        }

        futures::future::join_all(tasks).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::provider::{CompletionResult, Provider, ProviderConfig, StopReason};
    use crate::state::RunConfig;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoProvider(&'static str);

    #[async_trait]
    impl Provider for EchoProvider {
        async fn complete(
            &self,
            messages: &[Message],
            _tool_defs: &[serde_json::Value],
            _config: &ProviderConfig,
        ) -> std::result::Result<CompletionResult, crate::error::ProviderError> {
            let reply = format!("{}: {}", self.0, messages.last().map(|m| m.text()).unwrap_or_default());
            Ok(CompletionResult { stop_reason: StopReason::EndTurn, messages: vec![Message::assistant_text(reply)], usage: Default::default() })
        }
    }

    async fn member(tag: &'static str) -> Agent {
        let config = RunConfig::builder().provider(Arc::new(EchoProvider(tag))).model("test").base_url("http://localhost:1234/v1").build().unwrap();
        Agent::start(config).await.unwrap()
    }

    #[tokio::test]
    async fn add_get_remove_roundtrip() {
        let team = Team::new();
        team.add("alpha", member("alpha").await);
        assert_eq!(team.len(), 1);
        assert!(team.get("alpha").is_some());
        assert!(team.get("missing").is_none());
        assert!(team.remove("alpha").is_some());
        assert!(team.is_empty());
    }

    #[tokio::test]
    async fn add_replaces_existing_name() {
        let team = Team::new();
        team.add("alpha", member("alpha").await);
        team.add("alpha", member("alpha").await);
        assert_eq!(team.len(), 1);
    }

    #[tokio::test]
    async fn broadcast_delivers_to_every_member() {
        let team = Team::with_members([
            ("alpha".to_string(), member("alpha").await),
            ("beta".to_string(), member("beta").await),
        ]);

        let results = team.broadcast("hi").await;
        assert_eq!(results.len(), 2);
        assert_eq!(results["alpha"].as_deref().unwrap(), "alpha: hi");
        assert_eq!(results["beta"].as_deref().unwrap(), "beta: hi");
    }

    #[tokio::test]
    async fn health_reports_every_member() {
        let team = Team::with_members([("alpha".to_string(), member("alpha").await)]);
        team.get("alpha").unwrap().chat("hello").await.unwrap();

        let health = team.health().await;
        assert_eq!(health["alpha"].turn_count, 1);
    }
}
