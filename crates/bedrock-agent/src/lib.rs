use bedrock_core::trace::filter_trace;
use bedrock_core::{AgentDefinition, AgentRecord, AgentsBackend, Result, TraceEvent, TraceLevel};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

mod supervisor;

pub use bedrock_core::Task;
pub use supervisor::{render_tasks, CollaboratorSpec, SupervisorAgent};

static FORCE_RECREATE_DEFAULT: AtomicBool = AtomicBool::new(false);

/// Handle to a provisioned agent.
pub struct Agent {
    record: AgentRecord,
    instructions: String,
    backend: Arc<dyn AgentsBackend>,
}

/// Outcome of invoking an agent.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationResult {
    pub agent_name: String,
    pub completion: String,
    pub session_id: String,
    pub trace_level: TraceLevel,
    /// Events kept at `trace_level`; empty when tracing was disabled.
    pub trace: Vec<TraceEvent>,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl fmt::Display for InvocationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.completion)
    }
}

impl Agent {
    /// Process-wide default for whether `direct_create` replaces an agent
    /// that already exists.
    pub fn set_force_recreate_default(force: bool) {
        FORCE_RECREATE_DEFAULT.store(force, Ordering::SeqCst);
    }

    pub fn force_recreate_default() -> bool {
        FORCE_RECREATE_DEFAULT.load(Ordering::SeqCst)
    }

    /// Create the agent, or reuse an existing one with the same name unless
    /// force-recreate is enabled.
    pub async fn direct_create(
        backend: Arc<dyn AgentsBackend>,
        name: &str,
        instructions: &str,
    ) -> Result<Self> {
        let definition = AgentDefinition::new(name, instructions);
        Self::from_definition(backend, definition, Self::force_recreate_default()).await
    }

    pub(crate) async fn from_definition(
        backend: Arc<dyn AgentsBackend>,
        definition: AgentDefinition,
        force_recreate: bool,
    ) -> Result<Self> {
        let record = provision(backend.as_ref(), &definition, force_recreate).await?;
        Ok(Self {
            record,
            instructions: definition.instructions,
            backend,
        })
    }

    pub fn name(&self) -> &str {
        &self.record.agent_name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn record(&self) -> &AgentRecord {
        &self.record
    }

    /// Invoke the agent in a fresh session. Unknown trace levels fall back
    /// to `core`.
    #[instrument(skip(self, input), fields(agent = %self.record.agent_name))]
    pub async fn invoke(
        &self,
        input: &str,
        enable_trace: bool,
        trace_level: &str,
    ) -> Result<InvocationResult> {
        let level = parse_trace_level(trace_level);
        let session_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();

        info!("Invoking agent {} (session {})", self.record.agent_name, session_id);
        let output = self
            .backend
            .invoke(&self.record, input, &session_id, enable_trace)
            .await?;

        let trace = if enable_trace {
            filter_trace(output.trace, level)
        } else {
            Vec::new()
        };
        debug!("Kept {} trace events at level {}", trace.len(), level);

        Ok(InvocationResult {
            agent_name: self.record.agent_name.clone(),
            completion: output.completion,
            session_id: output.session_id,
            trace_level: level,
            trace,
            started_at,
            elapsed: start.elapsed(),
        })
    }
}

fn parse_trace_level(trace_level: &str) -> TraceLevel {
    match trace_level.parse() {
        Ok(level) => level,
        Err(e) => {
            warn!("{}; using core", e);
            TraceLevel::Core
        }
    }
}

/// Find-or-create. With `force_recreate` an existing agent and its role are
/// deleted before creating it again.
pub(crate) async fn provision(
    backend: &dyn AgentsBackend,
    definition: &AgentDefinition,
    force_recreate: bool,
) -> Result<AgentRecord> {
    if let Some(existing) = backend.find_agent(&definition.name).await? {
        if !force_recreate {
            info!("Reusing existing agent {} ({})", definition.name, existing.agent_id);
            return Ok(existing);
        }
        info!("Recreating agent {}", definition.name);
        backend.delete_agent(&definition.name, true, false).await?;
    }

    backend.create_agent(definition).await
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use bedrock_core::{AgentDefinition, AgentRecord, AgentsBackend, InvocationOutput, Result};
    use mockall::mock;

    mock! {
        pub Backend {}

        #[async_trait]
        impl AgentsBackend for Backend {
            async fn find_agent(&self, name: &str) -> Result<Option<AgentRecord>>;
            async fn create_agent(&self, definition: &AgentDefinition) -> Result<AgentRecord>;
            async fn delete_agent(&self, name: &str, delete_role: bool, verbose: bool) -> Result<()>;
            async fn invoke(
                &self,
                agent: &AgentRecord,
                input: &str,
                session_id: &str,
                enable_trace: bool,
            ) -> Result<InvocationOutput>;
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
            role_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{record, MockBackend};
    use super::*;
    use bedrock_core::{InvocationOutput, TraceKind};
    use mockall::Sequence;

    #[tokio::test]
    async fn reuses_existing_agent_without_force() {
        let mut backend = MockBackend::new();
        backend
            .expect_find_agent()
            .withf(|name| name == "hello")
            .times(1)
            .returning(|name| Ok(Some(record(name))));
        backend.expect_delete_agent().never();
        backend.expect_create_agent().never();

        let agent = Agent::from_definition(
            Arc::new(backend),
            AgentDefinition::new("hello", "say hi"),
            false,
        )
        .await
        .unwrap();

        assert_eq!(agent.name(), "hello");
        assert_eq!(agent.record().agent_id, "HELLO-ID");
        assert_eq!(agent.instructions(), "say hi");
    }

    #[tokio::test]
    async fn force_recreate_deletes_before_creating() {
        let mut backend = MockBackend::new();
        let mut seq = Sequence::new();
        backend
            .expect_find_agent()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|name| Ok(Some(record(name))));
        backend
            .expect_delete_agent()
            .withf(|name, delete_role, _| name == "hello" && *delete_role)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        backend
            .expect_create_agent()
            .withf(|def| def.name == "hello" && !def.collaboration.is_supervisor())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|def| Ok(record(&def.name)));

        Agent::from_definition(Arc::new(backend), AgentDefinition::new("hello", "say hi"), true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn creates_missing_agent() {
        let mut backend = MockBackend::new();
        backend.expect_find_agent().times(1).returning(|_| Ok(None));
        backend.expect_delete_agent().never();
        backend
            .expect_create_agent()
            .times(1)
            .returning(|def| Ok(record(&def.name)));

        let agent = Agent::from_definition(
            Arc::new(backend),
            AgentDefinition::new("hello", "say hi"),
            true,
        )
        .await
        .unwrap();
        assert_eq!(agent.name(), "hello");
    }

    #[tokio::test]
    async fn invoke_filters_trace_by_level() {
        let mut backend = MockBackend::new();
        backend
            .expect_find_agent()
            .returning(|name| Ok(Some(record(name))));
        backend
            .expect_invoke()
            .withf(|_, input, _, enable_trace| input == "hi" && *enable_trace)
            .times(2)
            .returning(|_, _, session_id, _| {
                Ok(InvocationOutput {
                    completion: "Hello World".to_string(),
                    session_id: session_id.to_string(),
                    trace: vec![
                        TraceEvent::new(TraceKind::Rationale, "delegate"),
                        TraceEvent::new(TraceKind::FinalResponse, "Hello World"),
                    ],
                })
            });

        let agent = Agent::from_definition(
            Arc::new(backend),
            AgentDefinition::new("hello", "say hi"),
            false,
        )
        .await
        .unwrap();

        let core = agent.invoke("hi", true, "core").await.unwrap();
        assert_eq!(core.to_string(), "Hello World");
        assert_eq!(core.trace_level, TraceLevel::Core);
        assert_eq!(core.trace.len(), 1);
        assert!(!core.session_id.is_empty());

        let outline = agent.invoke("hi", true, "outline").await.unwrap();
        assert_eq!(outline.trace.len(), 2);
        assert_ne!(core.session_id, outline.session_id);
    }

    #[tokio::test]
    async fn disabled_trace_returns_no_events() {
        let mut backend = MockBackend::new();
        backend
            .expect_find_agent()
            .returning(|name| Ok(Some(record(name))));
        backend.expect_invoke().returning(|_, _, session_id, _| {
            Ok(InvocationOutput {
                completion: "Hello World".to_string(),
                session_id: session_id.to_string(),
                trace: vec![TraceEvent::new(TraceKind::FinalResponse, "Hello World")],
            })
        });

        let agent = Agent::from_definition(
            Arc::new(backend),
            AgentDefinition::new("hello", "say hi"),
            false,
        )
        .await
        .unwrap();

        let result = agent.invoke("hi", false, "all").await.unwrap();
        assert!(result.trace.is_empty());
    }

    #[test]
    fn unknown_trace_level_falls_back_to_core() {
        assert_eq!(parse_trace_level("outline"), TraceLevel::Outline);
        assert_eq!(parse_trace_level("everything"), TraceLevel::Core);
    }

    #[test]
    fn force_recreate_default_is_process_wide() {
        Agent::set_force_recreate_default(true);
        assert!(Agent::force_recreate_default());
        Agent::set_force_recreate_default(false);
        assert!(!Agent::force_recreate_default());
    }
}
