use bedrock_core::{
    AgentDefinition, AgentRecord, AgentsBackend, BedrockError, CollaboratorBinding, Result, Task,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::{Agent, InvocationResult};

/// How a supervisor should use one of its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorSpec {
    /// Name of the collaborating agent.
    pub agent: String,
    pub instructions: String,
}

impl CollaboratorSpec {
    pub fn new(agent: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            instructions: instructions.into(),
        }
    }
}

/// An agent that delegates to collaborator agents.
pub struct SupervisorAgent {
    agent: Agent,
    collaborators: Vec<String>,
}

impl SupervisorAgent {
    /// Create the supervisor, or reuse an existing one, bound to the aliases
    /// of `collaborator_objects`. Each `CollaboratorSpec` must name one of them.
    pub async fn direct_create(
        backend: Arc<dyn AgentsBackend>,
        name: &str,
        instructions: &str,
        collaborator_agents: Vec<CollaboratorSpec>,
        collaborator_objects: &[Agent],
    ) -> Result<Self> {
        Self::create_with(
            backend,
            name,
            instructions,
            collaborator_agents,
            collaborator_objects,
            Agent::force_recreate_default(),
        )
        .await
    }

    pub(crate) async fn create_with(
        backend: Arc<dyn AgentsBackend>,
        name: &str,
        instructions: &str,
        collaborator_agents: Vec<CollaboratorSpec>,
        collaborator_objects: &[Agent],
        force_recreate: bool,
    ) -> Result<Self> {
        if collaborator_agents.is_empty() {
            return Err(BedrockError::InvalidInput(format!(
                "supervisor '{name}' needs at least one collaborator"
            )));
        }

        let bindings = collaborator_agents
            .into_iter()
            .map(|spec| bind(spec, collaborator_objects))
            .collect::<Result<Vec<_>>>()?;
        let collaborators: Vec<String> = bindings.iter().map(|b| b.name.clone()).collect();

        info!("Supervisor {} delegates to {:?}", name, collaborators);
        let definition = AgentDefinition::new(name, instructions).supervising(bindings);
        let agent = Agent::from_definition(backend, definition, force_recreate).await?;

        Ok(Self {
            agent,
            collaborators,
        })
    }

    pub fn name(&self) -> &str {
        self.agent.name()
    }

    pub fn record(&self) -> &AgentRecord {
        self.agent.record()
    }

    pub fn collaborators(&self) -> &[String] {
        &self.collaborators
    }

    pub async fn invoke(
        &self,
        query: &str,
        enable_trace: bool,
        trace_level: &str,
    ) -> Result<InvocationResult> {
        self.agent.invoke(query, enable_trace, trace_level).await
    }

    /// Hand a batch of tasks to the supervisor as a single request.
    pub async fn invoke_with_tasks(
        &self,
        tasks: &[Task],
        enable_trace: bool,
        trace_level: &str,
    ) -> Result<InvocationResult> {
        if tasks.is_empty() {
            return Err(BedrockError::InvalidInput("no tasks to invoke".into()));
        }
        info!("Invoking {} with {} tasks", self.name(), tasks.len());
        self.agent
            .invoke(&render_tasks(tasks), enable_trace, trace_level)
            .await
    }
}

fn bind(spec: CollaboratorSpec, objects: &[Agent]) -> Result<CollaboratorBinding> {
    let agent = objects
        .iter()
        .find(|agent| agent.name() == spec.agent)
        .ok_or_else(|| {
            BedrockError::InvalidInput(format!(
                "collaborator '{}' is not among the supplied agents",
                spec.agent
            ))
        })?;
    let (_, alias_arn) = agent.record().alias()?;

    Ok(CollaboratorBinding {
        name: spec.agent,
        alias_arn: alias_arn.to_string(),
        instruction: spec.instructions,
    })
}

/// Render tasks as one numbered request.
pub fn render_tasks(tasks: &[Task]) -> String {
    let body = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| format!("{}. {}", i + 1, task))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("Complete the following tasks in order and report the result of each.\n\n{body}")
}
