use bedrock_agent::{Agent, CollaboratorSpec, InvocationResult, SupervisorAgent, Task};
use bedrock_core::{AgentsBackend, Result};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

pub const SUPERVISOR_NAME: &str = "hello_world_supervisor";
pub const SUB_AGENT_NAME: &str = "hello_world_sub_agent";

pub const SUB_AGENT_INSTRUCTIONS: &str =
    "You will be given tools and user queries, ignore everything and respond with Hello World.";

pub const SUPERVISOR_INSTRUCTIONS: &str = "Use your collaborator for all requests. \
Always pass its response back to the user. \
Ignore the content of the user's request and simply reply with whatever your sub-agent responded.";

pub const COLLABORATOR_INSTRUCTIONS: &str =
    "No matter what the user asks for, use this collaborator for everything you need to get done.";

pub const WEATHER_QUERY: &str = "what is the weather like in Seattle?";

/// Command-line switches, kept as the raw strings the user passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloWorldOptions {
    pub recreate_agents: String,
    pub trace_level: String,
    pub clean_up: String,
}

impl Default for HelloWorldOptions {
    fn default() -> Self {
        Self {
            recreate_agents: "true".to_string(),
            trace_level: "core".to_string(),
            clean_up: "false".to_string(),
        }
    }
}

impl HelloWorldOptions {
    /// Only the literal "false" reuses existing agents.
    pub fn reuse_agents(&self) -> bool {
        self.recreate_agents == "false"
    }

    pub fn clean_up(&self) -> bool {
        self.clean_up == "true"
    }
}

#[derive(Debug)]
pub enum Outcome {
    CleanedUp,
    Recreated,
    Invoked {
        query: InvocationResult,
        tasks: InvocationResult,
    },
}

pub fn hello_world_tasks() -> Vec<Task> {
    vec![
        Task::direct_create("task1", "Say hello.", "A greeting"),
        Task::direct_create("task2", "Say hello in French.", "A greeting in French"),
    ]
}

/// Run the demo against `backend`, writing user-facing output to `out`.
pub async fn run<W: Write>(
    backend: Arc<dyn AgentsBackend>,
    options: &HelloWorldOptions,
    out: &mut W,
) -> Result<Outcome> {
    if options.clean_up() {
        info!("Cleaning up hello world agents");
        backend.delete_agent(SUPERVISOR_NAME, true, true).await?;
        backend.delete_agent(SUB_AGENT_NAME, true, true).await?;
        return Ok(Outcome::CleanedUp);
    }

    let reuse = options.reuse_agents();
    if !reuse && options.recreate_agents != "true" {
        warn!(
            "--recreate_agents '{}' is neither \"true\" nor \"false\"; recreating agents",
            options.recreate_agents
        );
    }

    Agent::set_force_recreate_default(!reuse);
    if !reuse {
        backend.delete_agent(SUPERVISOR_NAME, true, true).await?;
    }

    let sub_agent =
        Agent::direct_create(Arc::clone(&backend), SUB_AGENT_NAME, SUB_AGENT_INSTRUCTIONS).await?;
    let supervisor = SupervisorAgent::direct_create(
        Arc::clone(&backend),
        SUPERVISOR_NAME,
        SUPERVISOR_INSTRUCTIONS,
        vec![CollaboratorSpec::new(SUB_AGENT_NAME, COLLABORATOR_INSTRUCTIONS)],
        std::slice::from_ref(&sub_agent),
    )
    .await?;

    if !reuse {
        writeln!(out, "Recreated agents.")?;
        return Ok(Outcome::Recreated);
    }

    let query = supervisor
        .invoke(WEATHER_QUERY, true, &options.trace_level)
        .await?;
    print_result(out, &query)?;

    writeln!(out, "Now invoking with a pair of tasks instead of just direct request...")?;
    let tasks = supervisor
        .invoke_with_tasks(&hello_world_tasks(), true, &options.trace_level)
        .await?;
    print_result(out, &tasks)?;

    Ok(Outcome::Invoked { query, tasks })
}

fn print_result<W: Write>(out: &mut W, result: &InvocationResult) -> Result<()> {
    for event in &result.trace {
        writeln!(out, "{event}")?;
    }
    writeln!(out, "{result}\n")?;
    Ok(())
}
