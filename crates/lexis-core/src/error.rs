// crates/lexis-core/src/error.rs

use thiserror::Error;

use crate::plan::Stage;

/// Error type shared by every crate in the workspace.
#[derive(Debug, Error)]
pub enum LexisError {
    /// Storage layer error (SQLite, connection pool, schema).
    #[error("Storage error: {0}")]
    Storage(String),

    /// A tool client could not be constructed or used at all.
    /// Ordinary transport failures are recorded as status codes instead.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid or unreadable configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// Two calls in one plan share a call ID.
    #[error("Plan {plan_id}: duplicate call_id {call_id}")]
    DuplicateCallId { plan_id: String, call_id: String },

    /// A dependency edge names a call that is not part of the plan.
    #[error("Plan {plan_id}: dependency references unknown call_id {call_id}")]
    UnknownDependency { plan_id: String, call_id: String },

    /// The dependency graph contains a cycle; `pending` lists the calls that
    /// could never become ready.
    #[error("Plan {plan_id}: dependency cycle among calls {pending:?}")]
    Cycle {
        plan_id: String,
        pending: Vec<String>,
    },

    /// No client is registered for a fetch tool.
    #[error("Plan {plan_id}: no client registered for tool {tool} (call {call_id})")]
    MissingClient {
        plan_id: String,
        call_id: String,
        tool: String,
    },

    /// No handler is registered for a non-fetch tool and the registry has no stub fallback.
    #[error("Plan {plan_id}: no {stage} handler registered for tool {tool} (call {call_id})")]
    MissingHandler {
        plan_id: String,
        call_id: String,
        stage: Stage,
        tool: String,
    },

    /// A non-fetch call has no completed upstream effect to consume.
    #[error("Plan {plan_id}: call {call_id} ({stage}) has no upstream effect")]
    MissingUpstream {
        plan_id: String,
        call_id: String,
        stage: Stage,
    },

    /// A required fetch returned a non-success status.
    #[error("Plan {plan_id}: fetch {call_id} failed with status {status_code}")]
    FetchFailed {
        plan_id: String,
        call_id: String,
        status_code: i32,
    },

    /// A fetch client returned an error instead of a raw response.
    #[error("Plan {plan_id}: client for tool {tool} failed on call {call_id}: {message}")]
    ClientFailed {
        plan_id: String,
        call_id: String,
        tool: String,
        message: String,
    },

    /// An extract/derive/claim handler failed on a valid upstream effect.
    #[error("Plan {plan_id}: {stage} handler failed for call {call_id}: {message}")]
    Handler {
        plan_id: String,
        call_id: String,
        stage: Stage,
        message: String,
    },

    /// The execution deadline expired between waves.
    #[error("Plan {plan_id}: deadline exceeded after {} completed calls", completed.len())]
    Timeout {
        plan_id: String,
        completed: Vec<String>,
    },
}

impl From<serde_json::Error> for LexisError {
    fn from(e: serde_json::Error) -> Self {
        LexisError::Serialization(e.to_string())
    }
}
