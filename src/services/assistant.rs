use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{
    chatbot::generate_reply,
    orchestrator::{END_COMMAND, Orchestrator, OrchestratorError, OrchestratorResult, is_end_command},
    session_manager::{MessageRole, SessionManager},
};

pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Scripted payment-support assistant backed by an in-memory session store.
#[derive(Debug, Clone)]
pub struct PaymentAssistant {
    sessions: SessionManager,
}

impl PaymentAssistant {
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            sessions: SessionManager::new(session_ttl),
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    async fn end_session(&self, session_id: &str) -> OrchestratorResult {
        let reply = match self.sessions.end_session(session_id).await {
            Some(turns) => {
                tracing::info!(session_id, turns, "session ended");
                "Thanks for chatting! Your session has been closed."
            }
            None => {
                tracing::debug!(session_id, "end requested for unknown session");
                "There was no active session to close."
            }
        };
        result(session_id, reply, END_COMMAND, true)
    }
}

fn result(session_id: &str, reply: &str, intent: &str, ended: bool) -> OrchestratorResult {
    let mut map = OrchestratorResult::new();
    map.insert("session_id".to_string(), Value::from(session_id));
    map.insert("reply".to_string(), Value::from(reply));
    map.insert("intent".to_string(), Value::from(intent));
    map.insert("ended".to_string(), Value::from(ended));
    map
}

fn validate(message: &str, session_id: &str) -> Result<(), OrchestratorError> {
    if session_id.trim().is_empty() {
        return Err(OrchestratorError::InvalidInput(
            "session_id cannot be empty".to_string(),
        ));
    }
    if message.trim().is_empty() {
        return Err(OrchestratorError::InvalidInput(
            "message cannot be empty".to_string(),
        ));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(OrchestratorError::InvalidInput(format!(
            "message exceeds {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(())
}

#[async_trait]
impl Orchestrator for PaymentAssistant {
    async fn process_user_query(
        &self,
        message: &str,
        session_id: &str,
    ) -> Result<OrchestratorResult, OrchestratorError> {
        validate(message, session_id)?;

        if is_end_command(message) {
            return Ok(self.end_session(session_id).await);
        }

        let trimmed = message.trim();
        let mut session = self.sessions.lock_session(session_id).await;

        session.push(MessageRole::User, trimmed);
        let reply = generate_reply(&session.state, trimmed, session.data.clone());
        session.state = reply.state;
        session.data = reply.data;
        session.push(MessageRole::Bot, reply.text.as_str());

        tracing::debug!(
            session_id = %session.id,
            turns = session.messages.len(),
            intent = reply.intent.as_str(),
            state = ?session.state,
            "turn processed"
        );

        Ok(result(session_id, &reply.text, reply.intent.as_str(), false))
    }
}
