use bedrock_core::{BedrockError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::path::Path;
use std::time::Duration;

mod env_substitution;

pub use env_substitution::substitute_env_vars;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BedrockAgentsConfig {
    #[serde(default)]
    pub aws: AwsSettings,
    #[serde(default)]
    pub agents: AgentSettings,
    #[serde(default)]
    pub polling: PollingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsSettings {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_foundation_model")]
    pub foundation_model: String,
    #[serde(default = "default_idle_session_ttl")]
    pub idle_session_ttl_secs: i32,
    /// Alias created for every agent and used for invocation.
    #[serde(default = "default_alias_name")]
    pub alias_name: String,
    /// Execution roles are named `<role_prefix><agent name>`.
    #[serde(default = "default_role_prefix")]
    pub role_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause after creating an IAM role so Bedrock can assume it.
    #[serde(default = "default_role_propagation_secs")]
    pub role_propagation_secs: u64,
}

impl BedrockAgentsConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| BedrockError::ConfigError(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut raw: Value = serde_yaml::from_str(yaml)
            .map_err(|e| BedrockError::ConfigError(format!("Failed to parse YAML: {}", e)))?;

        // An empty document means "all defaults".
        if raw.is_null() {
            raw = Value::Object(serde_json::Map::new());
        }

        substitute_env_vars(&mut raw)?;

        let config: BedrockAgentsConfig = serde_json::from_value(raw)
            .map_err(|e| BedrockError::ConfigError(format!("Invalid configuration: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_yaml(path)
        } else {
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.aws.region.is_empty() {
            return Err(BedrockError::ConfigError("AWS region cannot be empty".into()));
        }
        if self.agents.foundation_model.is_empty() {
            return Err(BedrockError::ConfigError("Foundation model cannot be empty".into()));
        }
        if self.agents.alias_name.is_empty() {
            return Err(BedrockError::ConfigError("Alias name cannot be empty".into()));
        }
        if !(60..=5400).contains(&self.agents.idle_session_ttl_secs) {
            return Err(BedrockError::ConfigError(
                "Idle session TTL must be between 60 and 5400 seconds".into(),
            ));
        }
        if self.polling.interval_ms == 0 {
            return Err(BedrockError::ConfigError("Polling interval must be positive".into()));
        }
        if self.polling.timeout() < self.polling.interval() {
            return Err(BedrockError::ConfigError(
                "Polling timeout must be at least one polling interval".into(),
            ));
        }
        Ok(())
    }
}

impl AgentSettings {
    pub fn role_name(&self, agent_name: &str) -> String {
        format!("{}{}", self.role_prefix, agent_name)
    }
}

impl PollingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn role_propagation(&self) -> Duration {
        Duration::from_secs(self.role_propagation_secs)
    }
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            region: default_region(),
            profile: None,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            foundation_model: default_foundation_model(),
            idle_session_ttl_secs: default_idle_session_ttl(),
            alias_name: default_alias_name(),
            role_prefix: default_role_prefix(),
        }
    }
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_secs: default_timeout_secs(),
            role_propagation_secs: default_role_propagation_secs(),
        }
    }
}

fn default_region() -> String {
    env::var("AWS_REGION")
        .or_else(|_| env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-1".to_string())
}

fn default_foundation_model() -> String { "anthropic.claude-3-5-sonnet-20240620-v1:0".to_string() }
fn default_idle_session_ttl() -> i32 { 1800 }
fn default_alias_name() -> String { "v1".to_string() }
fn default_role_prefix() -> String { "AmazonBedrockExecutionRoleForAgents_".to_string() }
fn default_interval_ms() -> u64 { 2_000 }
fn default_timeout_secs() -> u64 { 300 }
fn default_role_propagation_secs() -> u64 { 10 }
