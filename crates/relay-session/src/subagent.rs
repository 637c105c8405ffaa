//! Sub-Agent Map (§4.K): a concurrent, depth-limited registry of child
//! sessions. Grounded on the teacher's `SubagentRegistry` (`DashMap`-backed
//! concurrent registry, recursive `kill`), collapsing its five-state
//! `Running/Paused/Complete/Failed/Killed` lifecycle into the spec's
//! `Running/Completed/Aborted/Error` and adding the depth-limit check the
//! teacher never enforced.

use crate::session::{ClosedReason, Session};
use dashmap::DashMap;
use relay_core::SubAgentStatus;
use std::sync::Arc;

struct SubAgentEntry {
    session: Arc<Session>,
    depth: usize,
}

#[derive(Debug, Clone)]
pub struct SubAgentSnapshot {
    pub id: String,
    pub status: SubAgentStatus,
    pub depth: usize,
}

#[derive(Debug, Clone)]
pub struct SubAgentOutcome {
    pub output: String,
    pub success: bool,
    pub turns_used: u32,
}

pub struct SubAgentMap {
    agents: DashMap<String, SubAgentEntry>,
    max_depth: usize,
}

impl SubAgentMap {
    pub fn new(max_depth: usize) -> Self {
        Self {
            agents: DashMap::new(),
            max_depth,
        }
    }

    /// Registers `session` under `id` at `depth`. Fails if `id` is
    /// already registered or `depth` exceeds the configured limit.
    pub fn spawn(&self, id: String, session: Arc<Session>, depth: usize) -> Result<(), String> {
        if depth > self.max_depth {
            return Err("Maximum subagent depth exceeded".to_string());
        }
        if self.agents.contains_key(&id) {
            return Err(format!("subagent '{id}' already exists"));
        }
        self.agents.insert(id, SubAgentEntry { session, depth });
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.agents.get(id).map(|e| e.session.clone())
    }

    /// Aborts the child if it is still running, marking it `Aborted`.
    /// A no-op (not an error) if the child already terminated.
    pub async fn close(&self, id: &str) -> Result<(), String> {
        let Some(entry) = self.agents.get(id) else {
            return Err(format!("subagent '{id}' not found"));
        };
        let session = entry.session.clone();
        drop(entry);
        if session.state() == relay_core::SessionState::Processing || session.state() == relay_core::SessionState::Idle
        {
            session.abort().await;
        }
        Ok(())
    }

    pub async fn close_all(&self) {
        let ids: Vec<String> = self.agents.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            let _ = self.close(&id).await;
        }
    }

    pub fn list(&self) -> Vec<SubAgentSnapshot> {
        self.agents
            .iter()
            .map(|entry| SubAgentSnapshot {
                id: entry.key().clone(),
                status: to_subagent_status(&entry.value().session),
                depth: entry.value().depth,
            })
            .collect()
    }

    /// Consumes the child's event bus until `SessionEnd`, aggregating
    /// assistant text and reporting failure if a loop was ever detected.
    pub async fn wait(&self, id: &str) -> Result<SubAgentOutcome, String> {
        let session = self.get(id).ok_or_else(|| format!("subagent '{id}' not found"))?;
        let mut rx = session.subscribe();
        let mut output = String::new();
        let mut success = true;
        let mut turns_used = 0;

        while let Some(event) = rx.recv().await {
            match event {
                relay_core::SessionEvent::AssistantTextDelta { text } => output.push_str(&text),
                relay_core::SessionEvent::LoopDetection { .. } => success = false,
                relay_core::SessionEvent::TurnLimit { .. } => turns_used += 1,
                relay_core::SessionEvent::SessionEnd { .. } => break,
                _ => {}
            }
        }

        Ok(SubAgentOutcome {
            output,
            success,
            turns_used,
        })
    }
}

/// `SessionState::Closed` alone doesn't say why; `close()` sets
/// `ClosedReason::Aborted` before aborting, and the fatal-error path in
/// `submit()` sets `ClosedReason::Error` before closing, so a `Closed`
/// session with no reason recorded terminated by plain completion.
fn to_subagent_status(session: &Session) -> SubAgentStatus {
    match session.state() {
        relay_core::SessionState::Idle | relay_core::SessionState::Processing => SubAgentStatus::Running,
        relay_core::SessionState::Closed => match session.closed_reason() {
            Some(ClosedReason::Aborted) => SubAgentStatus::Aborted,
            Some(ClosedReason::Error) => SubAgentStatus::Error,
            None => SubAgentStatus::Completed,
        },
    }
}
