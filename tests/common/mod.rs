use async_trait::async_trait;
use bedrock_core::{
    AgentDefinition, AgentRecord, AgentsBackend, InvocationOutput, Result, TraceEvent, TraceKind,
};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Find(String),
    Create(String),
    Delete(String),
    Invoke { agent: String, input: String },
}

/// In-memory backend that records every call in order.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<Call>>,
    agents: Mutex<HashMap<String, AgentRecord>>,
    definitions: Mutex<Vec<AgentDefinition>>,
}

#[allow(dead_code)]
impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agents(names: &[&str]) -> Self {
        let backend = Self::new();
        {
            let mut agents = backend.agents.lock().unwrap();
            for name in names {
                agents.insert(name.to_string(), record(name));
            }
        }
        backend
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Delete(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn creates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Create(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn invokes(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Invoke { agent, input } => Some((agent, input)),
                _ => None,
            })
            .collect()
    }

    pub fn definitions(&self) -> Vec<AgentDefinition> {
        self.definitions.lock().unwrap().clone()
    }

    /// Position of the first call matching `predicate`.
    pub fn position(&self, predicate: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls().iter().position(predicate)
    }
}

pub fn record(name: &str) -> AgentRecord {
    AgentRecord {
        agent_id: format!("{}-ID", name.to_uppercase()),
        agent_name: name.to_string(),
        agent_arn: format!("arn:aws:bedrock:us-east-1:123456789012:agent/{name}"),
        alias_id: Some("ALIAS".to_string()),
        alias_arn: Some(format!(
            "arn:aws:bedrock:us-east-1:123456789012:agent-alias/{name}/ALIAS"
        )),
        role_name: Some(format!("AmazonBedrockExecutionRoleForAgents_{name}")),
    }
}

#[async_trait]
impl AgentsBackend for RecordingBackend {
    async fn find_agent(&self, name: &str) -> Result<Option<AgentRecord>> {
        self.calls.lock().unwrap().push(Call::Find(name.to_string()));
        Ok(self.agents.lock().unwrap().get(name).cloned())
    }

    async fn create_agent(&self, definition: &AgentDefinition) -> Result<AgentRecord> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Create(definition.name.clone()));
        self.definitions.lock().unwrap().push(definition.clone());
        let created = record(&definition.name);
        self.agents
            .lock()
            .unwrap()
            .insert(definition.name.clone(), created.clone());
        Ok(created)
    }

    async fn delete_agent(&self, name: &str, _delete_role: bool, _verbose: bool) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Delete(name.to_string()));
        self.agents.lock().unwrap().remove(name);
        Ok(())
    }

    async fn invoke(
        &self,
        agent: &AgentRecord,
        input: &str,
        session_id: &str,
        enable_trace: bool,
    ) -> Result<InvocationOutput> {
        self.calls.lock().unwrap().push(Call::Invoke {
            agent: agent.agent_name.clone(),
            input: input.to_string(),
        });

        let trace = if enable_trace {
            vec![
                TraceEvent::new(TraceKind::Rationale, "Delegating to the collaborator")
                    .from_agent(agent.agent_name.clone()),
                TraceEvent::new(TraceKind::Collaboration, "delegating to hello_world_sub_agent")
                    .from_agent(agent.agent_name.clone()),
                TraceEvent::new(TraceKind::FinalResponse, "Hello World")
                    .from_agent(agent.agent_name.clone()),
            ]
        } else {
            Vec::new()
        };

        Ok(InvocationOutput {
            completion: "Hello World".to_string(),
            session_id: session_id.to_string(),
            trace,
        })
    }
}
