use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Message that closes a session.
pub const END_COMMAND: &str = "end";

/// Field mapping produced for one turn; its keys must match the response schema exactly.
pub type OrchestratorResult = Map<String, Value>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("session `{0}` not found")]
    SessionNotFound(String),

    #[error("{0}")]
    Internal(String),
}

/// Owns conversation and session logic behind the HTTP layer.
///
/// Implementations are shared across concurrent requests and are responsible
/// for ordering turns that target the same session.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn process_user_query(
        &self,
        message: &str,
        session_id: &str,
    ) -> Result<OrchestratorResult, OrchestratorError>;
}

pub fn is_end_command(message: &str) -> bool {
    message.trim().eq_ignore_ascii_case(END_COMMAND)
}
