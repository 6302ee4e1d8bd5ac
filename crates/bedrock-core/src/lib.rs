use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod trace;

pub use trace::{TraceEvent, TraceKind, TraceLevel};

/// Whether an agent delegates work to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaborationMode {
    #[default]
    Disabled,
    Supervisor,
}

impl CollaborationMode {
    pub fn is_supervisor(&self) -> bool {
        matches!(self, CollaborationMode::Supervisor)
    }
}

/// A sub-agent bound to a supervisor through its alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorBinding {
    pub name: String,
    pub alias_arn: String,
    pub instruction: String,
}

/// Everything needed to provision an agent resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub instructions: String,
    pub description: String,
    pub collaboration: CollaborationMode,
    pub collaborators: Vec<CollaboratorBinding>,
}

impl AgentDefinition {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            instructions: instructions.into(),
            collaboration: CollaborationMode::Disabled,
            collaborators: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn supervising(mut self, collaborators: Vec<CollaboratorBinding>) -> Self {
        self.collaboration = CollaborationMode::Supervisor;
        self.collaborators = collaborators;
        self
    }
}

/// A provisioned agent as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: String,
    pub agent_name: String,
    pub agent_arn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
}

impl AgentRecord {
    /// Alias id and ARN, required before the agent can be invoked or
    /// associated with a supervisor.
    pub fn alias(&self) -> Result<(&str, &str)> {
        match (&self.alias_id, &self.alias_arn) {
            (Some(id), Some(arn)) => Ok((id.as_str(), arn.as_str())),
            _ => Err(BedrockError::NotFound(format!(
                "agent '{}' has no invocable alias",
                self.agent_name
            ))),
        }
    }
}

/// A discrete unit of work handed to a supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub instruction: String,
    pub expected_output: String,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        instruction: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            expected_output: expected_output.into(),
        }
    }

    /// Same as [`Task::new`], named to match `Agent::direct_create`.
    pub fn direct_create(
        name: impl Into<String>,
        instruction: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        Self::new(name, instruction, expected_output)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}\nExpected output: {}",
            self.name, self.instruction, self.expected_output
        )
    }
}

/// Raw result of a single agent invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationOutput {
    pub completion: String,
    pub session_id: String,
    pub trace: Vec<TraceEvent>,
}

#[derive(Error, Debug)]
pub enum BedrockError {
    #[error("AWS authentication failed: {0}")]
    AuthError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Bedrock service error: {0}")]
    ServiceError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, BedrockError>;

/// Cloud operations the agent handles are built on.
#[async_trait::async_trait]
pub trait AgentsBackend: Send + Sync {
    /// Look up an agent by name, including its alias when one exists.
    async fn find_agent(&self, name: &str) -> Result<Option<AgentRecord>>;

    /// Provision an agent, its collaborators and an invocable alias.
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<AgentRecord>;

    /// Delete an agent by name. Missing agents are not an error.
    async fn delete_agent(&self, name: &str, delete_role: bool, verbose: bool) -> Result<()>;

    async fn invoke(
        &self,
        agent: &AgentRecord,
        input: &str,
        session_id: &str,
        enable_trace: bool,
    ) -> Result<InvocationOutput>;
}
