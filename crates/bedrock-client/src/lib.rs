use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_bedrockagent as agents;
use aws_sdk_bedrockagent::types::{
    AgentAliasStatus, AgentCollaboration, AgentDescriptor, AgentStatus, RelayConversationHistory,
};
use aws_sdk_bedrockagentruntime as runtime;
use aws_sdk_bedrockagentruntime::types::ResponseStream;
use aws_sdk_iam as iam;
use bedrock_config::{AwsSettings, BedrockAgentsConfig};
use bedrock_core::{
    AgentDefinition, AgentRecord, AgentsBackend, BedrockError, InvocationOutput, Result,
    TraceEvent,
};
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument};

mod error;
mod roles;
mod trace;

#[cfg(test)]
mod test_support;

use error::classify;
use trace::convert_trace_part;

/// Working version that collaborators are associated with before preparing.
const DRAFT_VERSION: &str = "DRAFT";

/// Bedrock Agents backed by the AWS SDK: control plane, runtime and IAM.
pub struct BedrockAgentsClient {
    agents: agents::Client,
    runtime: runtime::Client,
    iam: iam::Client,
    region: Region,
    config: Arc<BedrockAgentsConfig>,
}

impl BedrockAgentsClient {
    pub async fn new(config: BedrockAgentsConfig) -> Result<Self> {
        let aws_config = Self::build_aws_config(&config.aws).await?;
        let region = aws_config
            .region()
            .cloned()
            .unwrap_or_else(|| Region::new(config.aws.region.clone()));

        Ok(Self {
            agents: agents::Client::new(&aws_config),
            runtime: runtime::Client::new(&aws_config),
            iam: iam::Client::new(&aws_config),
            region,
            config: Arc::new(config),
        })
    }

    #[cfg(test)]
    pub(crate) fn from_clients(
        agents: agents::Client,
        runtime: runtime::Client,
        iam: iam::Client,
        config: BedrockAgentsConfig,
    ) -> Self {
        Self {
            agents,
            runtime,
            iam,
            region: Region::new(config.aws.region.clone()),
            config: Arc::new(config),
        }
    }

    async fn build_aws_config(settings: &AwsSettings) -> Result<aws_config::SdkConfig> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));

        if let Some(profile) = &settings.profile {
            info!("Using AWS profile: {}", profile);
            config_loader = config_loader.profile_name(profile);
        }

        let aws_config = config_loader.load().await;

        debug!("AWS config loaded for region: {}", settings.region);
        Ok(aws_config)
    }

    pub fn get_region(&self) -> &str {
        self.region.as_ref()
    }

    async fn find_agent_id(&self, name: &str) -> Result<Option<String>> {
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .agents
                .list_agents()
                .max_results(100)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify("ListAgents", e))?;

            if let Some(summary) = output
                .agent_summaries()
                .iter()
                .find(|summary| summary.agent_name() == name)
            {
                return Ok(Some(summary.agent_id().to_string()));
            }

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(None),
            }
        }
    }

    /// Id and ARN of the configured alias of `agent_id`, if it exists.
    async fn lookup_alias(&self, agent_id: &str) -> Result<Option<(String, String)>> {
        let output = self
            .agents
            .list_agent_aliases()
            .agent_id(agent_id)
            .max_results(100)
            .send()
            .await
            .map_err(|e| classify("ListAgentAliases", e))?;

        let Some(alias_id) = output
            .agent_alias_summaries()
            .iter()
            .find(|summary| summary.agent_alias_name() == self.config.agents.alias_name)
            .map(|summary| summary.agent_alias_id().to_string())
        else {
            return Ok(None);
        };

        let output = self
            .agents
            .get_agent_alias()
            .agent_id(agent_id)
            .agent_alias_id(&alias_id)
            .send()
            .await
            .map_err(|e| classify("GetAgentAlias", e))?;

        Ok(output
            .agent_alias()
            .map(|alias| (alias_id.clone(), alias.agent_alias_arn().to_string())))
    }

    async fn poll_until<F, Fut>(&self, what: &str, mut check: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let deadline = Instant::now() + self.config.polling.timeout();
        loop {
            if check().await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BedrockError::Timeout(what.to_string()));
            }
            sleep(self.config.polling.interval()).await;
        }
    }

    async fn wait_for_agent_status(&self, agent_id: &str, target: AgentStatus) -> Result<()> {
        let client = &self.agents;
        let target = &target;
        self.poll_until(&format!("agent {agent_id} to reach {target:?}"), move || async move {
            let output = client
                .get_agent()
                .agent_id(agent_id)
                .send()
                .await
                .map_err(|e| classify("GetAgent", e))?;
            let agent = output
                .agent()
                .ok_or_else(|| BedrockError::ServiceError("GetAgent returned no agent".into()))?;

            match agent.agent_status() {
                AgentStatus::Failed => Err(BedrockError::ServiceError(format!(
                    "agent {} failed: {}",
                    agent_id,
                    agent.failure_reasons().join("; ")
                ))),
                status => {
                    debug!("Agent {} status: {:?}", agent_id, status);
                    Ok(status == target)
                }
            }
        })
        .await
    }

    async fn wait_for_agent_deleted(&self, agent_id: &str) -> Result<()> {
        let client = &self.agents;
        self.poll_until(&format!("agent {agent_id} to be deleted"), move || async move {
            match client.get_agent().agent_id(agent_id).send().await {
                Ok(_) => Ok(false),
                Err(e) => match classify("GetAgent", e) {
                    BedrockError::NotFound(_) => Ok(true),
                    other => Err(other),
                },
            }
        })
        .await
    }

    async fn wait_for_alias(&self, agent_id: &str, alias_id: &str) -> Result<()> {
        let client = &self.agents;
        self.poll_until(&format!("alias {alias_id} of agent {agent_id}"), move || async move {
            let output = client
                .get_agent_alias()
                .agent_id(agent_id)
                .agent_alias_id(alias_id)
                .send()
                .await
                .map_err(|e| classify("GetAgentAlias", e))?;
            let alias = output.agent_alias().ok_or_else(|| {
                BedrockError::ServiceError("GetAgentAlias returned no alias".into())
            })?;

            match alias.agent_alias_status() {
                AgentAliasStatus::Failed => Err(BedrockError::ServiceError(format!(
                    "alias {alias_id} of agent {agent_id} failed to deploy"
                ))),
                status => Ok(*status == AgentAliasStatus::Prepared),
            }
        })
        .await
    }
}

fn progress(verbose: bool, message: &str) {
    if verbose {
        info!("{}", message);
    } else {
        debug!("{}", message);
    }
}

fn role_name_from_arn(arn: &str) -> Option<&str> {
    arn.rsplit('/').next().filter(|name| !name.is_empty() && *name != arn)
}

#[async_trait]
impl AgentsBackend for BedrockAgentsClient {
    #[instrument(skip(self))]
    async fn find_agent(&self, name: &str) -> Result<Option<AgentRecord>> {
        let Some(agent_id) = self.find_agent_id(name).await? else {
            debug!("No agent named {}", name);
            return Ok(None);
        };

        let output = self
            .agents
            .get_agent()
            .agent_id(&agent_id)
            .send()
            .await
            .map_err(|e| classify("GetAgent", e))?;
        let agent = output
            .agent()
            .ok_or_else(|| BedrockError::ServiceError("GetAgent returned no agent".into()))?;

        let alias = self.lookup_alias(&agent_id).await?;

        Ok(Some(AgentRecord {
            agent_id: agent_id.clone(),
            agent_name: agent.agent_name().to_string(),
            agent_arn: agent.agent_arn().to_string(),
            alias_id: alias.as_ref().map(|(id, _)| id.clone()),
            alias_arn: alias.map(|(_, arn)| arn),
            role_name: role_name_from_arn(agent.agent_resource_role_arn()).map(str::to_string),
        }))
    }

    #[instrument(skip(self, definition), fields(agent = %definition.name))]
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<AgentRecord> {
        let supervisor = definition.collaboration.is_supervisor();
        let role_name = self.config.agents.role_name(&definition.name);

        let (role_arn, role_created) =
            roles::ensure_role(&self.iam, &role_name, self.get_region(), supervisor).await?;
        if role_created {
            debug!("Waiting for role {} to propagate", role_name);
            sleep(self.config.polling.role_propagation()).await;
        }

        info!("Creating agent {}", definition.name);
        let collaboration = if supervisor {
            AgentCollaboration::Supervisor
        } else {
            AgentCollaboration::Disabled
        };
        let output = self
            .agents
            .create_agent()
            .agent_name(&definition.name)
            .agent_resource_role_arn(&role_arn)
            .foundation_model(&self.config.agents.foundation_model)
            .instruction(&definition.instructions)
            .description(&definition.description)
            .idle_session_ttl_in_seconds(self.config.agents.idle_session_ttl_secs)
            .agent_collaboration(collaboration)
            .send()
            .await
            .map_err(|e| classify("CreateAgent", e))?;
        let agent = output
            .agent()
            .ok_or_else(|| BedrockError::ServiceError("CreateAgent returned no agent".into()))?;
        let agent_id = agent.agent_id().to_string();
        let agent_arn = agent.agent_arn().to_string();

        self.wait_for_agent_status(&agent_id, AgentStatus::NotPrepared).await?;

        for collaborator in &definition.collaborators {
            info!("Associating collaborator {} with {}", collaborator.name, definition.name);
            self.agents
                .associate_agent_collaborator()
                .agent_id(&agent_id)
                .agent_version(DRAFT_VERSION)
                .agent_descriptor(
                    AgentDescriptor::builder()
                        .alias_arn(&collaborator.alias_arn)
                        .build(),
                )
                .collaborator_name(&collaborator.name)
                .collaboration_instruction(&collaborator.instruction)
                .relay_conversation_history(RelayConversationHistory::ToCollaborator)
                .send()
                .await
                .map_err(|e| classify("AssociateAgentCollaborator", e))?;
        }

        self.agents
            .prepare_agent()
            .agent_id(&agent_id)
            .send()
            .await
            .map_err(|e| classify("PrepareAgent", e))?;
        self.wait_for_agent_status(&agent_id, AgentStatus::Prepared).await?;

        let output = self
            .agents
            .create_agent_alias()
            .agent_id(&agent_id)
            .agent_alias_name(&self.config.agents.alias_name)
            .send()
            .await
            .map_err(|e| classify("CreateAgentAlias", e))?;
        let alias = output.agent_alias().ok_or_else(|| {
            BedrockError::ServiceError("CreateAgentAlias returned no alias".into())
        })?;
        let alias_id = alias.agent_alias_id().to_string();
        let alias_arn = alias.agent_alias_arn().to_string();

        self.wait_for_alias(&agent_id, &alias_id).await?;
        info!("Agent {} ready as {}/{}", definition.name, agent_id, alias_id);

        Ok(AgentRecord {
            agent_id,
            agent_name: definition.name.clone(),
            agent_arn,
            alias_id: Some(alias_id),
            alias_arn: Some(alias_arn),
            role_name: Some(role_name),
        })
    }

    #[instrument(skip(self))]
    async fn delete_agent(&self, name: &str, delete_role: bool, verbose: bool) -> Result<()> {
        let mut role_name = self.config.agents.role_name(name);

        match self.find_agent_id(name).await? {
            Some(agent_id) => {
                let output = self
                    .agents
                    .get_agent()
                    .agent_id(&agent_id)
                    .send()
                    .await
                    .map_err(|e| classify("GetAgent", e))?;
                if let Some(role) = output
                    .agent()
                    .and_then(|agent| role_name_from_arn(agent.agent_resource_role_arn()))
                {
                    role_name = role.to_string();
                }

                progress(verbose, &format!("Deleting agent {name} ({agent_id})"));
                self.agents
                    .delete_agent()
                    .agent_id(&agent_id)
                    .skip_resource_in_use_check(true)
                    .send()
                    .await
                    .map_err(|e| classify("DeleteAgent", e))?;
                self.wait_for_agent_deleted(&agent_id).await?;
                progress(verbose, &format!("Deleted agent {name}"));
            }
            None => progress(verbose, &format!("Agent {name} not found, nothing to delete")),
        }

        if delete_role {
            progress(verbose, &format!("Deleting role {role_name}"));
            roles::delete_role(&self.iam, &role_name).await?;
        }

        Ok(())
    }

    #[instrument(skip(self, agent, input), fields(agent = %agent.agent_name))]
    async fn invoke(
        &self,
        agent: &AgentRecord,
        input: &str,
        session_id: &str,
        enable_trace: bool,
    ) -> Result<InvocationOutput> {
        let (alias_id, _) = agent.alias()?;

        let mut output = self
            .runtime
            .invoke_agent()
            .agent_id(&agent.agent_id)
            .agent_alias_id(alias_id)
            .session_id(session_id)
            .input_text(input)
            .enable_trace(enable_trace)
            .send()
            .await
            .map_err(|e| classify("InvokeAgent", e))?;

        let mut response = StreamedResponse::default();
        loop {
            match output.completion.recv().await {
                Ok(Some(event)) => response.push(event),
                Ok(None) => break,
                Err(e) => return Err(classify("InvokeAgent stream", e)),
            }
        }

        response.finish(session_id)
    }
}

/// Completion bytes and trace events gathered from an `InvokeAgent` stream.
#[derive(Default)]
struct StreamedResponse {
    completion: Vec<u8>,
    trace: Vec<TraceEvent>,
}

impl StreamedResponse {
    fn push(&mut self, event: ResponseStream) {
        match event {
            ResponseStream::Chunk(chunk) => {
                if let Some(bytes) = chunk.bytes() {
                    self.completion.extend_from_slice(bytes.as_ref());
                }
            }
            ResponseStream::Trace(part) => {
                if let Some(event) = convert_trace_part(&part) {
                    debug!("Trace: {}", event);
                    self.trace.push(event);
                }
            }
            other => debug!("Ignoring stream event: {:?}", other),
        }
    }

    /// Chunks may split a code point, so the completion is decoded only once
    /// the stream has ended.
    fn finish(self, session_id: &str) -> Result<InvocationOutput> {
        let completion = String::from_utf8(self.completion).map_err(|e| {
            BedrockError::ServiceError(format!("InvokeAgent returned invalid UTF-8: {e}"))
        })?;

        Ok(InvocationOutput {
            completion,
            session_id: session_id.to_string(),
            trace: self.trace,
        })
    }
}
